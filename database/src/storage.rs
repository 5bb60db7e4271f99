use crate::models::{CachedImageRow, DigestRow};
use crate::Database;
use chrono::Utc;
use explorer_core::{CachedImage, CoreError, Digest, DigestItem, DigestWindow};

impl Database {
    pub async fn get_cached_image(&self, post_id: &str) -> Result<Option<CachedImage>, CoreError> {
        let row = sqlx::query_as::<_, CachedImageRow>(
            "SELECT post_id, image_path, created_at FROM cached_images WHERE post_id = ?",
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CachedImage::from))
    }

    /// Records the cached file for a saved post, replacing any previous entry.
    pub async fn record_cached_image(&self, post_id: &str, image_path: &str) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO cached_images (post_id, image_path, created_at) VALUES (?, ?, ?)",
        )
        .bind(post_id)
        .bind(image_path)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stores the digest for its window, replacing the previous one.
    pub async fn save_digest(&self, digest: &Digest) -> Result<(), CoreError> {
        let items = serde_json::to_string(&digest.items)?;
        sqlx::query(
            "INSERT OR REPLACE INTO digests (window_label, generated_at, items) VALUES (?, ?, ?)",
        )
        .bind(digest.window.label())
        .bind(digest.generated_at)
        .bind(items)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_digest(&self, window: DigestWindow) -> Result<Option<Digest>, CoreError> {
        let row = sqlx::query_as::<_, DigestRow>(
            "SELECT window_label, generated_at, items FROM digests WHERE window_label = ?",
        )
        .bind(window.label())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let items: Vec<DigestItem> = serde_json::from_str(&row.items)?;
                Ok(Some(Digest {
                    window: row.window_label.parse()?,
                    generated_at: row.generated_at,
                    items,
                }))
            }
            None => Ok(None),
        }
    }

    pub async fn save_setting(&self, key: &str, value: &str) -> Result<(), CoreError> {
        sqlx::query("INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?, ?, ?)")
            .bind(key)
            .bind(value)
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, CoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }
}
