use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::store::{NewPost, Post, PostStore, PostUpdate, StoreError};

const POST_COLUMNS: &str = "id, title, link, content, content_snippet, pub_date";

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Open the pool and make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let db = Self::new(database_url).await?;
        db.initialize().await?;
        Ok(db)
    }

    pub async fn initialize(&self) -> Result<(), sqlx::Error> {
        // Ids are 12 random bytes in hex, the shape of a document-store object id
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(12)))),
                title TEXT NOT NULL,
                link TEXT NOT NULL,
                content TEXT NOT NULL,
                content_snippet TEXT NOT NULL,
                pub_date TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_posts_pub_date
            ON posts(pub_date DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn count(&self) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}

#[async_trait]
impl PostStore for Database {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn list_all(&self) -> Result<Vec<Post>, StoreError> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "SELECT {} FROM posts ORDER BY pub_date DESC NULLS LAST, rowid ASC",
            POST_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    async fn replace_all(&self, posts: Vec<NewPost>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM posts").execute(&mut *tx).await?;

        for post in &posts {
            sqlx::query(
                r#"
                INSERT INTO posts (title, link, content, content_snippet, pub_date)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&post.title)
            .bind(&post.link)
            .bind(&post.content)
            .bind(&post.content_snippet)
            .bind(&post.pub_date)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert(&self, post: NewPost) -> Result<Post, StoreError> {
        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (title, link, content, content_snippet, pub_date)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            POST_COLUMNS
        ))
        .bind(&post.title)
        .bind(&post.link)
        .bind(&post.content)
        .bind(&post.content_snippet)
        .bind(&post.pub_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(post)
    }

    async fn update_by_id(&self, id: &str, update: PostUpdate) -> Result<Post, StoreError> {
        sqlx::query_as::<_, Post>(&format!(
            r#"
            UPDATE posts
            SET title = COALESCE(?, title),
                content = COALESCE(?, content),
                content_snippet = COALESCE(?, content_snippet)
            WHERE id = ?
            RETURNING {}
            "#,
            POST_COLUMNS
        ))
        .bind(update.title)
        .bind(update.content)
        .bind(update.content_snippet)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
