//! Refresh-on-empty: an empty post store is refilled from the feed before
//! it is listed. Nothing else ever triggers a fetch.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::fetcher::{FetchError, Fetcher};
use crate::store::{NewPost, Post, PostStore, StoreError};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Refresher {
    store: Arc<dyn PostStore>,
    fetcher: Arc<Fetcher>,
    feed_url: String,
    refreshing: Mutex<()>,
}

impl Refresher {
    pub fn new(store: Arc<dyn PostStore>, fetcher: Arc<Fetcher>, feed_url: String) -> Self {
        Self {
            store,
            fetcher,
            feed_url,
            refreshing: Mutex::new(()),
        }
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    /// All posts, refilling the store from the feed first if it is empty.
    pub async fn list_posts(&self) -> Result<Vec<Post>, RefreshError> {
        let posts = self.store.list_all().await?;
        if !posts.is_empty() {
            return Ok(posts);
        }

        // Concurrent readers of an empty store wait here; only the first fetches
        let _guard = self.refreshing.lock().await;
        let posts = self.store.list_all().await?;
        if !posts.is_empty() {
            return Ok(posts);
        }

        let entries = self.fetcher.fetch(&self.feed_url).await?;
        info!(
            "Store empty, replacing contents with {} feed entries",
            entries.len()
        );
        let fresh: Vec<NewPost> = entries.into_iter().map(NewPost::from).collect();
        self.store.replace_all(fresh).await?;

        Ok(self.store.list_all().await?)
    }
}
