use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Feed mirrored into the post store when it is empty
    #[serde(default = "default_feed_url")]
    pub feed_url: String,
    /// SQLite connection string; `None` keeps posts in memory
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    /// Directory served for every path the API does not handle
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    /// Timeout for feed requests in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_feed_url() -> String {
    "https://rss.arxiv.org/rss/cs".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_password() -> String {
    "password".to_string()
}

fn default_static_dir() -> String {
    "../client".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: default_feed_url(),
            database_url: None,
            port: default_port(),
            admin_username: default_admin_username(),
            admin_password: default_admin_password(),
            static_dir: default_static_dir(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Load `path` if it exists, fall back to defaults otherwise, then apply
    /// environment overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let config = if path.as_ref().exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup. `lookup` is `std::env::var` in
    /// production and a map in tests.
    pub fn with_overrides<F>(mut self, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("RSS_URL") {
            self.feed_url = url;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(port) = lookup("PORT") {
            self.port = port
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid PORT '{}': {}", port, e))?;
        }
        if let Some(username) = lookup("ADMIN_USERNAME") {
            self.admin_username = username;
        }
        if let Some(password) = lookup("ADMIN_PASSWORD") {
            self.admin_password = password;
        }
        if let Some(dir) = lookup("STATIC_DIR") {
            self.static_dir = dir;
        }
        if let Some(secs) = lookup("FETCH_TIMEOUT_SECS") {
            self.fetch_timeout_secs = secs
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid FETCH_TIMEOUT_SECS '{}': {}", secs, e))?;
        }
        Ok(self)
    }
}
