use std::time::Duration;

use chrono::SecondsFormat;
use feed_rs::{model::Entry, parser};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::store::NewPost;

/// Longest snippet, in characters, before truncation.
pub const SNIPPET_MAX_CHARS: usize = 200;

/// Tags whose boundaries separate words in the plain-text snippet.
const BLOCK_TAGS: &[&str] = &[
    "p", "br", "div", "li", "ul", "ol", "tr", "td", "th", "blockquote", "pre", "hr", "h1", "h2",
    "h3", "h4", "h5", "h6",
];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to fetch feed ({})", .0.as_u16())]
    Status(StatusCode),
    #[error("failed to parse feed: {0}")]
    Parse(#[from] parser::ParseFeedError),
}

/// One entry of a fetched feed, normalized to the post shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub guid: String,
    pub title: String,
    pub link: String,
    pub content: String,
    pub content_snippet: String,
    pub pub_date: Option<String>,
}

impl From<FeedEntry> for NewPost {
    fn from(entry: FeedEntry) -> Self {
        NewPost {
            title: entry.title,
            link: entry.link,
            content: entry.content,
            content_snippet: entry.content_snippet,
            pub_date: entry.pub_date,
        }
    }
}

impl From<Entry> for FeedEntry {
    fn from(entry: Entry) -> Self {
        let title = entry
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled".to_string());

        let link = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_default();

        // content:encoded / Atom content wins over the description
        let content = entry
            .content
            .and_then(|c| c.body)
            .or_else(|| entry.summary.map(|s| s.content))
            .unwrap_or_default();

        let pub_date = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true));

        FeedEntry {
            guid: entry.id,
            title,
            content_snippet: content_snippet(&content),
            link,
            content,
            pub_date,
        }
    }
}

pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Feedpress/1.0 (RSS Mirror)")
            .build()?;

        Ok(Self { client })
    }

    /// Download `url` and parse it into entries, in feed order.
    pub async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>, FetchError> {
        info!("Fetching feed: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let bytes = response.bytes().await?;

        let entries = Self::parse(&bytes)?;
        info!("Fetched {} entries from {}", entries.len(), url);
        Ok(entries)
    }

    pub fn parse(bytes: &[u8]) -> Result<Vec<FeedEntry>, FetchError> {
        let parsed = parser::parse(bytes)?;
        Ok(parsed.entries.into_iter().map(FeedEntry::from).collect())
    }
}

/// Plain-text rendition of an HTML fragment: tags stripped, common entities
/// decoded, whitespace collapsed, cut at [`SNIPPET_MAX_CHARS`].
pub fn content_snippet(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut tag: Option<String> = None;

    for c in html.chars() {
        if let Some(name) = tag.as_mut() {
            if c == '>' {
                if is_block_tag(name) {
                    text.push(' ');
                }
                tag = None;
            } else {
                name.push(c);
            }
        } else if c == '<' {
            tag = Some(String::new());
        } else {
            text.push(c);
        }
    }

    let decoded = decode_entities(&text);
    let collapsed = decoded.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= SNIPPET_MAX_CHARS {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(SNIPPET_MAX_CHARS).collect();
    format!("{}...", cut.trim_end())
}

fn is_block_tag(tag: &str) -> bool {
    let name = tag
        .trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    BLOCK_TAGS.contains(&name.as_str())
}

fn decode_entities(text: &str) -> String {
    // &amp; last so "&amp;lt;" stays "&lt;"
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
