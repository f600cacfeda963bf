use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::{NewPost, Post, PostStore, PostUpdate, StoreError};

/// Posts kept in process memory, in insertion order.
///
/// Ids come from a counter that starts at 1 and only ever grows, so ids are
/// never reused even across `replace_all`.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

struct Inner {
    posts: Vec<Post>,
    next_id: u64,
}

impl Inner {
    fn assign_id(&mut self, post: NewPost) -> Post {
        let id = self.next_id;
        self.next_id += 1;
        post.with_id(id.to_string())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                posts: Vec::new(),
                next_id: 1,
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn list_all(&self) -> Result<Vec<Post>, StoreError> {
        Ok(self.inner.read().await.posts.clone())
    }

    async fn replace_all(&self, posts: Vec<NewPost>) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let fresh: Vec<Post> = posts.into_iter().map(|p| inner.assign_id(p)).collect();
        inner.posts = fresh;
        Ok(())
    }

    async fn insert(&self, post: NewPost) -> Result<Post, StoreError> {
        let mut inner = self.inner.write().await;
        let post = inner.assign_id(post);
        inner.posts.push(post.clone());
        Ok(post)
    }

    async fn update_by_id(&self, id: &str, update: PostUpdate) -> Result<Post, StoreError> {
        let mut inner = self.inner.write().await;
        let post = inner
            .posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound)?;
        update.apply(post);
        Ok(post.clone())
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let index = inner
            .posts
            .iter()
            .position(|p| p.id == id)
            .ok_or(StoreError::NotFound)?;
        inner.posts.remove(index);
        Ok(())
    }
}
