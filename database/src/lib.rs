//! SQLite persistence for subreddits, saved posts, categories, cached images,
//! digests and settings.

mod categories;
mod models;
mod posts;
mod storage;
mod subreddits;


pub use models::DatabaseStats;
pub use subreddits::normalize_subreddit_name;

use explorer_core::{CoreError, DatabaseError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if missing) the SQLite database at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        debug!("Connected to database {}", database_url);
        Ok(Self { pool })
    }

    /// Applies the embedded migrations; safe to call on every start.
    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Connects and migrates in one step.
    pub async fn open(database_url: &str) -> Result<Self, CoreError> {
        let db = Self::connect(database_url).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn stats(&self) -> Result<DatabaseStats, CoreError> {
        let stats = sqlx::query_as::<_, DatabaseStats>(
            r"
            SELECT
                (SELECT COUNT(*) FROM subreddits) AS subreddits,
                (SELECT COUNT(*) FROM categories) AS categories,
                (SELECT COUNT(*) FROM saved_posts) AS saved_posts,
                (SELECT COUNT(*) FROM saved_posts WHERE is_read = 0) AS unread_posts,
                (SELECT COUNT(*) FROM saved_posts WHERE show_in_categories = 0) AS hidden_posts,
                (SELECT COUNT(*) FROM saved_posts WHERE content IS NOT NULL) AS posts_with_content,
                (SELECT COUNT(*) FROM saved_posts WHERE summary IS NOT NULL) AS posts_with_summary,
                (SELECT COUNT(*) FROM cached_images) AS cached_images
            ",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}
