use crate::models::SubredditRow;
use crate::Database;
use explorer_core::{CoreError, DatabaseError, Subreddit};
use std::collections::HashSet;
use tracing::{info, warn};

/// Trims whitespace and a leading `r/` or `/r/`.
pub fn normalize_subreddit_name(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    let stripped = trimmed
        .strip_prefix("/r/")
        .or_else(|| trimmed.strip_prefix("r/"))
        .unwrap_or(trimmed)
        .trim_matches('/')
        .trim();
    if stripped.is_empty() {
        return Err(CoreError::InvalidInput {
            message: "subreddit name must not be empty".to_string(),
        });
    }
    Ok(stripped.to_string())
}

impl Database {
    /// Adds a subreddit; returns false if one with the same name (any case) exists.
    pub async fn add_subreddit(&self, name: &str) -> Result<bool, CoreError> {
        let name = normalize_subreddit_name(name)?;
        let result = sqlx::query("INSERT OR IGNORE INTO subreddits (name) VALUES (?)")
            .bind(&name)
            .execute(&self.pool)
            .await?;

        let added = result.rows_affected() > 0;
        if added {
            info!("Added subreddit r/{}", name);
        }
        Ok(added)
    }

    /// Returns the id of the subreddit, creating it if needed.
    pub async fn ensure_subreddit(&self, name: &str) -> Result<i64, CoreError> {
        let name = normalize_subreddit_name(name)?;
        sqlx::query("INSERT OR IGNORE INTO subreddits (name) VALUES (?)")
            .bind(&name)
            .execute(&self.pool)
            .await?;

        let (id,): (i64,) = sqlx::query_as("SELECT id FROM subreddits WHERE name = ?")
            .bind(&name)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn get_subreddit(&self, name: &str) -> Result<Option<Subreddit>, CoreError> {
        let name = normalize_subreddit_name(name)?;
        let row = sqlx::query_as::<_, SubredditRow>("SELECT id, name FROM subreddits WHERE name = ?")
            .bind(&name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Subreddit::from))
    }

    pub async fn list_subreddits(&self) -> Result<Vec<Subreddit>, CoreError> {
        let rows = sqlx::query_as::<_, SubredditRow>(
            "SELECT id, name FROM subreddits ORDER BY name COLLATE NOCASE",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Subreddit::from).collect())
    }

    pub async fn rename_subreddit(&self, old_name: &str, new_name: &str) -> Result<(), CoreError> {
        let old_name = normalize_subreddit_name(old_name)?;
        let new_name = normalize_subreddit_name(new_name)?;

        let result = sqlx::query("UPDATE subreddits SET name = ? WHERE name = ?")
            .bind(&new_name)
            .bind(&old_name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound {
                resource: format!("subreddit r/{}", old_name),
            });
        }
        info!("Renamed subreddit r/{} to r/{}", old_name, new_name);
        Ok(())
    }

    /// Removes a subreddit. Refused while it has saved posts unless `purge`,
    /// which deletes those posts (and their cached images) too. Returns the
    /// number of posts deleted.
    pub async fn remove_subreddit(&self, name: &str, purge: bool) -> Result<u64, CoreError> {
        let name = normalize_subreddit_name(name)?;
        let subreddit = self
            .get_subreddit(&name)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                resource: format!("subreddit r/{}", name),
            })?;

        let mut tx = self.pool.begin().await?;

        let (post_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM saved_posts WHERE subreddit_id = ?")
                .bind(subreddit.id)
                .fetch_one(&mut *tx)
                .await?;

        if post_count > 0 && !purge {
            return Err(DatabaseError::ConstraintViolation {
                constraint: format!(
                    "r/{} still has {} saved posts; purge them to remove it",
                    subreddit.name, post_count
                ),
            }
            .into());
        }

        let deleted = sqlx::query("DELETE FROM saved_posts WHERE subreddit_id = ?")
            .bind(subreddit.id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM subreddits WHERE id = ?")
            .bind(subreddit.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if deleted > 0 {
            warn!("Removed r/{} and purged {} saved posts", subreddit.name, deleted);
        } else {
            info!("Removed r/{}", subreddit.name);
        }
        Ok(deleted)
    }

    /// Reddit ids of saved posts from a subreddit.
    pub async fn saved_ids_for_subreddit(&self, name: &str) -> Result<HashSet<String>, CoreError> {
        let name = normalize_subreddit_name(name)?;
        let rows: Vec<(String,)> = sqlx::query_as(
            r"
            SELECT p.reddit_id
            FROM saved_posts p
            JOIN subreddits s ON s.id = p.subreddit_id
            WHERE s.name = ?
            ",
        )
        .bind(&name)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
