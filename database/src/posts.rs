use crate::models::{SavedPostRow, POST_COLUMNS, POST_FROM};
use crate::Database;
use chrono::Utc;
use explorer_core::{CoreError, RedditPost, SavedPost, DEFAULT_CATEGORY, MAX_POSTS};
use tracing::{debug, info};

impl Database {
    async fn insert_post(
        &self,
        post: &RedditPost,
        content: Option<&str>,
        num_comments: i64,
    ) -> Result<bool, CoreError> {
        let subreddit_id = self.ensure_subreddit(&post.subreddit).await?;
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r"
            INSERT OR IGNORE INTO saved_posts
                (reddit_id, subreddit_id, title, url, category, is_read, show_in_categories,
                 num_comments, created_utc, saved_at, content, content_date)
            VALUES (?, ?, ?, ?, ?, 1, 1, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&post.id)
        .bind(subreddit_id)
        .bind(&post.title)
        .bind(&post.url)
        .bind(DEFAULT_CATEGORY)
        .bind(num_comments)
        .bind(post.created_utc)
        .bind(now)
        .bind(content)
        .bind(content.map(|_| now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Saves a post into the default category. Returns false if it was already saved.
    pub async fn save_post(&self, post: &RedditPost) -> Result<bool, CoreError> {
        let saved = self
            .insert_post(post, None, i64::from(post.num_comments))
            .await?;
        if saved {
            info!("Saved post {} from r/{}", post.id, post.subreddit);
        } else {
            debug!("Post {} was already saved", post.id);
        }
        Ok(saved)
    }

    /// Saves a post together with its downloaded content.
    pub async fn save_imported_post(
        &self,
        post: &RedditPost,
        content: &str,
        num_comments: i64,
    ) -> Result<bool, CoreError> {
        self.insert_post(post, Some(content), num_comments).await
    }

    pub async fn unsave_post(&self, reddit_id: &str) -> Result<bool, CoreError> {
        let result = sqlx::query("DELETE FROM saved_posts WHERE reddit_id = ?")
            .bind(reddit_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn is_saved(&self, reddit_id: &str) -> Result<bool, CoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM saved_posts WHERE reddit_id = ?")
            .bind(reddit_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn get_saved_post(&self, reddit_id: &str) -> Result<Option<SavedPost>, CoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE p.reddit_id = ?",
            POST_COLUMNS, POST_FROM
        );
        let row = sqlx::query_as::<_, SavedPostRow>(&sql)
            .bind(reddit_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(SavedPost::from))
    }

    /// Like `get_saved_post` but a missing post is an error.
    pub async fn require_saved_post(&self, reddit_id: &str) -> Result<SavedPost, CoreError> {
        self.get_saved_post(reddit_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                resource: format!("saved post {}", reddit_id),
            })
    }

    async fn update_flag(&self, sql: &str, value: bool, reddit_id: &str) -> Result<(), CoreError> {
        let result = sqlx::query(sql)
            .bind(value)
            .bind(reddit_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound {
                resource: format!("saved post {}", reddit_id),
            });
        }
        Ok(())
    }

    pub async fn set_visibility(&self, reddit_id: &str, visible: bool) -> Result<(), CoreError> {
        self.update_flag(
            "UPDATE saved_posts SET show_in_categories = ? WHERE reddit_id = ?",
            visible,
            reddit_id,
        )
        .await
    }

    pub async fn set_read(&self, reddit_id: &str, read: bool) -> Result<(), CoreError> {
        self.update_flag(
            "UPDATE saved_posts SET is_read = ? WHERE reddit_id = ?",
            read,
            reddit_id,
        )
        .await
    }

    /// Moves a post to an existing category.
    pub async fn set_post_category(&self, reddit_id: &str, category: &str) -> Result<(), CoreError> {
        if !self.category_exists(category).await? {
            return Err(CoreError::NotFound {
                resource: format!("category '{}'", category),
            });
        }

        let result = sqlx::query("UPDATE saved_posts SET category = ? WHERE reddit_id = ?")
            .bind(category)
            .bind(reddit_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound {
                resource: format!("saved post {}", reddit_id),
            });
        }
        Ok(())
    }

    pub async fn set_content(&self, reddit_id: &str, content: &str) -> Result<(), CoreError> {
        sqlx::query("UPDATE saved_posts SET content = ?, content_date = ? WHERE reddit_id = ?")
            .bind(content)
            .bind(Utc::now().timestamp())
            .bind(reddit_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_summary(&self, reddit_id: &str, summary: &str) -> Result<(), CoreError> {
        sqlx::query("UPDATE saved_posts SET summary = ? WHERE reddit_id = ?")
            .bind(summary)
            .bind(reddit_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_category_and_summary(
        &self,
        reddit_id: &str,
        category: &str,
        summary: &str,
    ) -> Result<(), CoreError> {
        sqlx::query("UPDATE saved_posts SET category = ?, summary = ? WHERE reddit_id = ?")
            .bind(category)
            .bind(summary)
            .bind(reddit_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch_posts(&self, filter: &str, bind: Option<&str>) -> Result<Vec<SavedPost>, CoreError> {
        let sql = format!("SELECT {} FROM {} WHERE {}", POST_COLUMNS, POST_FROM, filter);
        let mut query = sqlx::query_as::<_, SavedPostRow>(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(SavedPost::from).collect())
    }

    /// Visible posts in a category, most recently saved first.
    pub async fn posts_in_category(&self, category: &str) -> Result<Vec<SavedPost>, CoreError> {
        self.fetch_posts(
            "p.category = ? AND p.show_in_categories = 1 ORDER BY p.saved_at DESC, p.id DESC",
            Some(category),
        )
        .await
    }

    pub async fn posts_missing_content(&self, category: &str) -> Result<Vec<SavedPost>, CoreError> {
        self.fetch_posts(
            "p.category = ? AND p.content IS NULL ORDER BY p.saved_at DESC, p.id DESC",
            Some(category),
        )
        .await
    }

    pub async fn posts_with_content(&self, category: &str) -> Result<Vec<SavedPost>, CoreError> {
        self.fetch_posts(
            "p.category = ? AND p.content IS NOT NULL ORDER BY p.saved_at DESC, p.id DESC",
            Some(category),
        )
        .await
    }

    /// Saved posts whose Reddit creation time is at or after `since` (unix seconds).
    pub async fn posts_created_since(&self, since: i64) -> Result<Vec<SavedPost>, CoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE p.created_utc >= ? ORDER BY p.created_utc DESC, p.id DESC",
            POST_COLUMNS, POST_FROM
        );
        let rows = sqlx::query_as::<_, SavedPostRow>(&sql)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(SavedPost::from).collect())
    }

    /// Case-insensitive substring search over title, content and summary.
    pub async fn search(&self, term: &str, visible_only: bool) -> Result<Vec<SavedPost>, CoreError> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let visibility = if visible_only {
            " AND p.show_in_categories = 1"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {} FROM {} \
             WHERE (p.title LIKE ?1 ESCAPE '\\' OR p.content LIKE ?1 ESCAPE '\\' \
             OR p.summary LIKE ?1 ESCAPE '\\'){} \
             ORDER BY p.saved_at DESC, p.id DESC LIMIT {}",
            POST_COLUMNS, POST_FROM, visibility, MAX_POSTS
        );
        let pattern = format!("%{}%", escape_like(term));

        let rows = sqlx::query_as::<_, SavedPostRow>(&sql)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await?;
        debug!("Search for '{}' matched {} posts", term, rows.len());
        Ok(rows.into_iter().map(SavedPost::from).collect())
    }
}

/// Escapes LIKE wildcards so `term` matches literally under `ESCAPE '\'`.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
