//! Post storage.
//!
//! [`PostStore`] is implemented by the SQLite-backed [`Database`] and the
//! process-local [`MemoryStore`]. Which one serves a process is decided once,
//! by [`connect`], and never revisited.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use tracing::{info, warn};

use crate::db::Database;
use crate::memory::MemoryStore;

/// A blog post as served by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub link: String,
    pub content: String,
    pub content_snippet: String,
    pub pub_date: Option<String>,
}

/// A post that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub link: String,
    pub content: String,
    pub content_snippet: String,
    pub pub_date: Option<String>,
}

impl NewPost {
    pub fn with_id(self, id: String) -> Post {
        Post {
            id,
            title: self.title,
            link: self.link,
            content: self.content,
            content_snippet: self.content_snippet,
            pub_date: self.pub_date,
        }
    }
}

/// Fields an update may change. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub content_snippet: Option<String>,
}

impl PostUpdate {
    pub fn apply(self, post: &mut Post) {
        if let Some(title) = self.title {
            post.title = title;
        }
        if let Some(content) = self.content {
            post.content = content;
        }
        if let Some(snippet) = self.content_snippet {
            post.content_snippet = snippet;
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("post not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    async fn list_all(&self) -> Result<Vec<Post>, StoreError>;

    /// Drop every stored post and store `posts` in their place.
    async fn replace_all(&self, posts: Vec<NewPost>) -> Result<(), StoreError>;

    async fn insert(&self, post: NewPost) -> Result<Post, StoreError>;

    async fn update_by_id(&self, id: &str, update: PostUpdate) -> Result<Post, StoreError>;

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError>;
}

/// Pick the post store for this process.
///
/// A configured database that opens and accepts the schema wins; anything
/// else falls back to memory for the life of the process.
pub async fn connect(database_url: Option<&str>) -> Arc<dyn PostStore> {
    let Some(url) = database_url else {
        info!("No database configured, keeping posts in memory");
        return Arc::new(MemoryStore::new());
    };

    match Database::connect(url).await {
        Ok(db) => {
            info!("Connected to database");
            Arc::new(db)
        }
        Err(e) => {
            warn!("Database unavailable ({}), falling back to in-memory posts", e);
            Arc::new(MemoryStore::new())
        }
    }
}
