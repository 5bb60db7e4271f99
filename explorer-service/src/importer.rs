use database::Database;
use explorer_core::{CoreError, ImportReport, RetryConfig, RetryExecutor};
use reddit_client::{parse_reddit_url, RedditApiClient};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Imports saved posts from a text file holding one Reddit post URL per line.
pub struct LinkImporter {
    db: Database,
    reddit: Arc<RedditApiClient>,
    retry: RetryExecutor,
}

impl LinkImporter {
    pub fn new(db: Database, reddit: Arc<RedditApiClient>) -> Self {
        Self {
            db,
            reddit,
            retry: RetryExecutor::new(RetryConfig::link_import()),
        }
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = RetryExecutor::new(config);
        self
    }

    /// Imports the links in `path`, looking at no more than `max_links` lines.
    ///
    /// Every line counts as processed. Blank lines are ignored, posts that
    /// are already saved are skipped, and failures are collected in the
    /// report instead of aborting the import.
    pub async fn import_file(
        &self,
        path: &Path,
        max_links: Option<usize>,
    ) -> Result<ImportReport, CoreError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let lines: Vec<&str> = raw.lines().collect();
        info!("Processing {} links from {}", lines.len(), path.display());

        let limit = max_links.unwrap_or(lines.len());
        let mut report = ImportReport::default();

        for line in lines.into_iter().take(limit) {
            report.processed += 1;
            let link = line.trim();
            if link.is_empty() {
                continue;
            }

            let Some(target) = parse_reddit_url(link) else {
                report.errors.push(format!("Invalid Reddit URL: {}", link));
                continue;
            };

            if self.db.is_saved(&target.post_id).await? {
                report.skipped += 1;
                continue;
            }

            info!("Processing r/{} post {}", target.subreddit, target.post_id);
            match self.import_one(&target.subreddit, &target.post_id).await {
                Ok(true) => {
                    report.imported += 1;
                    info!("Imported post {} ({} so far)", target.post_id, report.imported);
                }
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!("Failed to import {}: {}", link, e);
                    report.errors.push(format!("Error processing {}: {}", link, e));
                }
            }
        }

        Ok(report)
    }

    async fn import_one(&self, subreddit: &str, post_id: &str) -> Result<bool, CoreError> {
        let details = self
            .retry
            .execute(&format!("import post {}", post_id), || {
                self.reddit.fetch_post_details(subreddit, post_id)
            })
            .await?;

        let content = details.to_markdown();
        let num_comments = i64::try_from(details.comment_count()).unwrap_or(i64::MAX);
        self.db
            .save_imported_post(&details.post, &content, num_comments)
            .await
    }
}
