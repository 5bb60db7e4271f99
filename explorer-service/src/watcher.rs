use crate::Explorer;
use database::normalize_subreddit_name;
use explorer_core::{CoreError, RedditPost};
use llm_interface::LlmProvider;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

const LAST_SEEN_PREFIX: &str = "watch.last_seen.";

/// New posts found for one subreddit in one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchUpdate {
    pub subreddit: String,
    pub new_posts: usize,
}

/// Periodically polls followed subreddits and reports how many posts appeared
/// since the last saved or last seen one.
pub struct Watcher<'a, P> {
    explorer: &'a Explorer<P>,
    polling_interval: Duration,
}

/// Posts newer than the first one that is saved or was seen last time.
pub fn count_new_posts(
    posts: &[RedditPost],
    saved_ids: &HashSet<String>,
    last_seen: Option<&str>,
) -> usize {
    posts
        .iter()
        .take_while(|post| !saved_ids.contains(&post.id) && Some(post.id.as_str()) != last_seen)
        .count()
}

impl<'a, P: LlmProvider> Watcher<'a, P> {
    pub fn new(explorer: &'a Explorer<P>, polling_interval_minutes: u64) -> Self {
        Self {
            explorer,
            polling_interval: Duration::from_secs(polling_interval_minutes.max(1) * 60),
        }
    }

    pub fn polling_interval(&self) -> Duration {
        self.polling_interval
    }

    async fn watched_subreddits(&self) -> Result<Vec<String>, CoreError> {
        let configured = &self.explorer.config().watch.subreddits;
        if !configured.is_empty() {
            let mut names: Vec<String> = Vec::with_capacity(configured.len());
            for entry in configured {
                match normalize_subreddit_name(entry) {
                    Ok(name) if !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) => {
                        names.push(name)
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Ignoring watch entry '{}': {}", entry, e),
                }
            }
            return Ok(names);
        }
        let followed = self.explorer.db().list_subreddits().await?;
        Ok(followed.into_iter().map(|s| s.name).collect())
    }

    /// Polls every watched subreddit once, remembering the newest post seen.
    pub async fn poll_once(&self) -> Result<Vec<WatchUpdate>, CoreError> {
        let subreddits = self.watched_subreddits().await?;
        let mut updates = Vec::with_capacity(subreddits.len());

        for subreddit in subreddits {
            let posts = match self.explorer.fetch_recent(&subreddit).await {
                Ok(posts) => posts,
                Err(e) => {
                    warn!("Failed to poll r/{}: {}", subreddit, e);
                    continue;
                }
            };

            let key = format!("{}{}", LAST_SEEN_PREFIX, subreddit.to_lowercase());
            let last_seen = self.explorer.db().get_setting(&key).await?;
            let saved_ids = self.explorer.saved_ids(&subreddit).await?;
            let new_posts = count_new_posts(&posts, &saved_ids, last_seen.as_deref());

            if let Some(newest) = posts.first() {
                self.explorer.db().save_setting(&key, &newest.id).await?;
            }
            if new_posts > 0 {
                info!("r/{}: {} new posts", subreddit, new_posts);
            }
            updates.push(WatchUpdate {
                subreddit,
                new_posts,
            });
        }

        Ok(updates)
    }

    /// Polls until ctrl-c is pressed.
    pub async fn run(&self) -> Result<(), CoreError> {
        info!(
            "Watching for new posts every {} minutes (ctrl-c to stop)",
            self.polling_interval.as_secs() / 60
        );

        let mut ticker = interval(self.polling_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!("Watch poll failed: {}", e);
                    }
                }
                result = tokio::signal::ctrl_c() => {
                    result?;
                    info!("Stopping watcher");
                    return Ok(());
                }
            }
        }
    }
}
