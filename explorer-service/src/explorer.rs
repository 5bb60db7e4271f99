use crate::images::ImageCache;
use crate::importer::LinkImporter;
use database::{Database, DatabaseStats};
use explorer_core::{
    AppConfig, BrowsedPost, CategorizeReport, CoreError, Digest, DigestWindow, LlmError,
    RedditPost, RetryConfig, RetryExecutor, SavedPost,
};
use llm_interface::{AiAssistant, DigestSource, LlmProvider, OpenAiProvider, PostToCategorize};
use reddit_client::{
    latest_posts, posts_since_last_saved, ApiMetrics, PostDetails, RateLimitStatus,
    RedditApiClient, RedditClientConfig, BROWSE_LIMIT,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Front door for every user action: browsing, saving, organizing and the AI features.
pub struct Explorer<P = OpenAiProvider> {
    db: Database,
    reddit: Arc<RedditApiClient>,
    assistant: Option<AiAssistant<P>>,
    retry: RetryExecutor,
    config: AppConfig,
}

impl Explorer<OpenAiProvider> {
    /// Opens the database in the configured data directory and builds the
    /// clients. The assistant is only available when an API key is configured.
    pub async fn from_config(config: AppConfig) -> Result<Self, CoreError> {
        tokio::fs::create_dir_all(config.data_dir()).await?;
        let db = Database::open(&config.database_url()).await?;
        let reddit = RedditApiClient::new(RedditClientConfig::from(&config.reddit))?;

        let assistant = if config.ai.is_configured() {
            let provider = OpenAiProvider::from_config(&config.ai)?;
            let assistant = AiAssistant::new(provider);
            Some(if config.ai.suggest_categories {
                assistant.with_suggestions(config.suggestions_path())
            } else {
                assistant
            })
        } else {
            debug!("No OpenAI API key configured; AI features disabled");
            None
        };

        Ok(Self::new(config, db, Arc::new(reddit), assistant))
    }
}

impl<P: LlmProvider> Explorer<P> {
    pub fn new(
        config: AppConfig,
        db: Database,
        reddit: Arc<RedditApiClient>,
        assistant: Option<AiAssistant<P>>,
    ) -> Self {
        Self {
            db,
            reddit,
            assistant,
            retry: RetryExecutor::new(RetryConfig::reddit()),
            config,
        }
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = RetryExecutor::new(config);
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn reddit(&self) -> &RedditApiClient {
        &self.reddit
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn importer(&self) -> LinkImporter {
        LinkImporter::new(self.db.clone(), Arc::clone(&self.reddit))
    }

    pub fn image_cache(&self) -> ImageCache {
        ImageCache::new(
            self.db.clone(),
            Arc::clone(&self.reddit),
            self.config.image_cache_dir(),
        )
    }

    fn assistant(&self) -> Result<&AiAssistant<P>, CoreError> {
        self.assistant
            .as_ref()
            .ok_or(CoreError::Llm(LlmError::NotConfigured))
    }

    pub(crate) async fn fetch_recent(&self, subreddit: &str) -> Result<Vec<RedditPost>, CoreError> {
        self.retry
            .execute(&format!("fetch r/{}", subreddit), || {
                self.reddit.fetch_recent_posts(subreddit)
            })
            .await
    }

    async fn fetch_details(&self, subreddit: &str, post_id: &str) -> Result<PostDetails, CoreError> {
        self.retry
            .execute(&format!("fetch post {}", post_id), || {
                self.reddit.fetch_post_details(subreddit, post_id)
            })
            .await
    }

    /// Newest posts of a subreddit, oldest first.
    ///
    /// Without `count` the listing runs back to (and includes) the most
    /// recent post already saved from it, capped at [`BROWSE_LIMIT`].
    pub async fn browse(
        &self,
        subreddit: &str,
        count: Option<usize>,
    ) -> Result<Vec<BrowsedPost>, CoreError> {
        let subreddit = database::normalize_subreddit_name(subreddit)?;
        let posts = self.fetch_recent(&subreddit).await?;
        let saved_ids = self.db.saved_ids_for_subreddit(&subreddit).await?;

        let selected = match count {
            Some(count) => latest_posts(&posts, count),
            None => posts_since_last_saved(&posts, &saved_ids, BROWSE_LIMIT),
        };
        info!("Showing {} posts from r/{}", selected.len(), subreddit);

        Ok(selected
            .into_iter()
            .map(|post| {
                let saved = saved_ids.contains(&post.id);
                BrowsedPost { post, saved }
            })
            .collect())
    }

    /// Saves a post, fetching it from Reddit first. Returns false if it was already saved.
    pub async fn save(&self, subreddit: &str, post_id: &str) -> Result<bool, CoreError> {
        if self.db.is_saved(post_id).await? {
            debug!("Post {} is already saved", post_id);
            return Ok(false);
        }

        let subreddit = database::normalize_subreddit_name(subreddit)?;
        let details = self.fetch_details(&subreddit, post_id).await?;
        self.db.save_post(&details.post).await
    }

    pub async fn unsave(&self, post_id: &str) -> Result<bool, CoreError> {
        let removed = self.db.unsave_post(post_id).await?;
        if removed {
            info!("Unsaved post {}", post_id);
        }
        Ok(removed)
    }

    pub async fn set_visibility(&self, post_id: &str, visible: bool) -> Result<(), CoreError> {
        self.db.set_visibility(post_id, visible).await
    }

    pub async fn mark_read(&self, post_id: &str, read: bool) -> Result<(), CoreError> {
        self.db.set_read(post_id, read).await
    }

    pub async fn move_to_category(&self, post_id: &str, category: &str) -> Result<(), CoreError> {
        self.db.set_post_category(post_id, category.trim()).await?;
        info!("Moved post {} to '{}'", post_id, category.trim());
        Ok(())
    }

    /// Stored content of a saved post, downloading and storing it first when missing.
    pub async fn ensure_content(&self, post: &SavedPost) -> Result<String, CoreError> {
        if let Some(content) = post.content.as_ref().filter(|c| !c.is_empty()) {
            return Ok(content.clone());
        }

        let details = self.fetch_details(&post.subreddit, &post.reddit_id).await?;
        let content = details.to_markdown();
        self.db.set_content(&post.reddit_id, &content).await?;
        debug!("Downloaded content for post {}", post.reddit_id);
        Ok(content)
    }

    /// A saved post with its content, marking it read.
    pub async fn view(&self, post_id: &str) -> Result<(SavedPost, String), CoreError> {
        let post = self.db.require_saved_post(post_id).await?;
        let content = self.ensure_content(&post).await?;
        if !post.is_read {
            self.db.set_read(post_id, true).await?;
        }
        Ok((post, content))
    }

    /// Downloads content for every post in the category that has none yet.
    /// Failures are logged and skipped; returns the number downloaded.
    pub async fn download_category(&self, category: &str) -> Result<usize, CoreError> {
        let posts = self.db.posts_missing_content(category).await?;
        if posts.is_empty() {
            debug!("All posts in '{}' already have content", category);
            return Ok(0);
        }

        info!("Downloading content for {} posts in '{}'", posts.len(), category);
        let mut downloaded = 0;
        for post in &posts {
            match self.ensure_content(post).await {
                Ok(_) => downloaded += 1,
                Err(e) => warn!("Failed to download post {}: {}", post.reddit_id, e),
            }
        }

        info!("Downloaded {}/{} posts in '{}'", downloaded, posts.len(), category);
        Ok(downloaded)
    }

    /// Downloads missing content, then lets the assistant re-file every post
    /// in the category.
    pub async fn auto_categorize(&self, category: &str) -> Result<CategorizeReport, CoreError> {
        let assistant = self.assistant()?;
        if !self.db.category_exists(category).await? {
            return Err(CoreError::NotFound {
                resource: format!("category '{}'", category),
            });
        }

        let mut report = CategorizeReport {
            downloaded: self.download_category(category).await?,
            ..CategorizeReport::default()
        };

        let categories = self.db.list_categories().await?;
        let posts = self.db.posts_with_content(category).await?;
        info!("Categorizing {} posts from '{}'", posts.len(), category);

        for post in &posts {
            let Some(content) = post.content.as_deref() else {
                continue;
            };
            let input = PostToCategorize {
                title: &post.title,
                subreddit: &post.subreddit,
                content,
            };

            let (new_category, summary) = match assistant
                .categorize_post(&input, &categories, post.summary.as_deref())
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    warn!("Failed to categorize post {}: {}", post.reddit_id, e);
                    continue;
                }
            };
            report.processed += 1;

            let changed = new_category != post.category;
            if changed || post.summary.is_none() {
                self.db
                    .set_category_and_summary(&post.reddit_id, &new_category, &summary)
                    .await?;
            }
            if changed {
                info!(
                    "Moved '{}' from '{}' to '{}'",
                    post.title, post.category, new_category
                );
                report.moved += 1;
            }
        }

        Ok(report)
    }

    /// Summarizes a saved post and stores the summary.
    pub async fn summarize_post(&self, post_id: &str) -> Result<String, CoreError> {
        let assistant = self.assistant()?;
        let post = self.db.require_saved_post(post_id).await?;
        let content = self.ensure_content(&post).await?;

        let summary = assistant.summarize_post(&content).await?;
        self.db.set_summary(post_id, &summary).await?;
        Ok(summary)
    }

    /// The digest for a window. The stored one is returned unless `refresh`
    /// is set or none exists yet.
    pub async fn digest(&self, window: DigestWindow, refresh: bool) -> Result<Digest, CoreError> {
        if !refresh {
            if let Some(cached) = self.db.get_digest(window).await? {
                debug!("Using cached {} digest", window);
                return Ok(cached);
            }
        }

        let assistant = self.assistant()?;
        let since = window.start(chrono::Utc::now());
        let posts = self.db.posts_created_since(since).await?;
        info!("Building {} digest from {} saved posts", window, posts.len());

        let mut sources = Vec::with_capacity(posts.len());
        for post in &posts {
            let summary = match post.summary.as_ref().filter(|s| !s.is_empty()) {
                Some(summary) => summary.clone(),
                None => match self.summarize_for_digest(assistant, post).await {
                    Ok(summary) => summary,
                    Err(e) => {
                        warn!("Skipping post {} in digest: {}", post.reddit_id, e);
                        continue;
                    }
                },
            };
            sources.push(DigestSource {
                post_id: post.reddit_id.clone(),
                subreddit: post.subreddit.clone(),
                title: post.title.clone(),
                summary,
            });
        }

        let digest = assistant.build_digest(window, &sources).await?;
        self.db.save_digest(&digest).await?;
        Ok(digest)
    }

    async fn summarize_for_digest(
        &self,
        assistant: &AiAssistant<P>,
        post: &SavedPost,
    ) -> Result<String, CoreError> {
        let content = self.ensure_content(post).await?;
        let summary = assistant.summarize_post(&content).await?;
        self.db.set_summary(&post.reddit_id, &summary).await?;
        Ok(summary)
    }

    pub(crate) async fn saved_ids(&self, subreddit: &str) -> Result<HashSet<String>, CoreError> {
        self.db.saved_ids_for_subreddit(subreddit).await
    }

    pub async fn stats(&self) -> Result<DatabaseStats, CoreError> {
        self.db.stats().await
    }

    pub async fn api_metrics(&self) -> ApiMetrics {
        self.reddit.get_metrics().await
    }

    pub async fn rate_limit_status(&self) -> RateLimitStatus {
        self.reddit.get_rate_limit_status().await
    }
}
