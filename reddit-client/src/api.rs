use crate::links::is_image_url;
use crate::metrics::{ApiMetrics, MetricsCollector, RequestMetrics};
use crate::post_details::PostDetails;
use crate::rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
use explorer_core::{CoreError, RedditApiError, RedditConfig, RedditPost, MAX_POSTS};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Posts per listing page; Reddit's maximum.
pub const PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub author: Option<String>,
    pub subreddit: String,
    pub url: Option<String>,
    pub permalink: Option<String>,
    pub created_utc: f64,
    #[serde(default)]
    pub num_comments: u32,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub over_18: bool,
    #[serde(default)]
    pub is_self: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditCommentData {
    pub author: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub created_utc: f64,
    /// Either an empty string or a nested listing.
    #[serde(default)]
    pub replies: Value,
}

impl From<RedditPostData> for RedditPost {
    fn from(post_data: RedditPostData) -> Self {
        Self {
            id: post_data.id,
            title: post_data.title,
            url: post_data.url,
            subreddit: post_data.subreddit,
            created_utc: post_data.created_utc as i64,
            num_comments: post_data.num_comments,
            selftext: post_data.selftext,
            author: post_data.author,
            permalink: post_data.permalink,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedditClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub rate_limit: RateLimitConfig,
    pub max_posts: usize,
}

impl Default for RedditClientConfig {
    fn default() -> Self {
        Self::from(&RedditConfig::default())
    }
}

impl From<&RedditConfig> for RedditClientConfig {
    fn from(config: &RedditConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(30),
            rate_limit: RateLimitConfig::reddit_public(config.requests_per_minute, config.burst),
            max_posts: config.max_posts,
        }
    }
}

/// What a 404 from a given endpoint means.
enum Missing<'a> {
    Subreddit(&'a str),
    Post(&'a str),
    Resource(&'a str),
}

impl Missing<'_> {
    fn into_error(self) -> RedditApiError {
        match self {
            Missing::Subreddit(subreddit) => RedditApiError::SubredditNotFound {
                subreddit: subreddit.to_string(),
            },
            Missing::Post(post_id) => RedditApiError::PostNotFound {
                post_id: post_id.to_string(),
            },
            Missing::Resource(endpoint) => RedditApiError::EndpointUnavailable {
                endpoint: endpoint.to_string(),
            },
        }
    }
}

/// Client for Reddit's public, unauthenticated JSON endpoints.
#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: RateLimiter,
    metrics: MetricsCollector,
    config: RedditClientConfig,
}

impl RedditApiClient {
    pub fn new(config: RedditClientConfig) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::new(config.rate_limit.clone()),
            metrics: MetricsCollector::new(),
            config,
        })
    }

    pub fn config(&self) -> &RedditClientConfig {
        &self.config
    }

    /// Sends a GET through the rate limiter, records metrics and maps error statuses.
    async fn get(
        &self,
        endpoint_kind: &str,
        url: &str,
        missing: Missing<'_>,
    ) -> Result<Response, CoreError> {
        let start_time = Instant::now();
        let _permit = self.rate_limiter.acquire_permit().await?;
        debug!("Acquired rate limit permit for GET {}", url);

        let outcome = match self.http_client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    Ok(response)
                } else {
                    error!("Request failed with status: {} for {}", status, url);
                    Err((Some(status.as_u16()), status_to_error(&response, missing)))
                }
            }
            Err(e) => {
                error!("Network error for GET {}: {}", url, e);
                if e.is_timeout() {
                    Err((None, CoreError::RedditApi(RedditApiError::RequestTimeout)))
                } else {
                    Err((None, CoreError::Network(e)))
                }
            }
        };

        let (status_code, success, rate_limited, error_type) = match &outcome {
            Ok(response) => (Some(response.status().as_u16()), true, false, None),
            Err((status_code, err)) => (
                *status_code,
                false,
                matches!(
                    err,
                    CoreError::RedditApi(RedditApiError::RateLimitExceeded { .. })
                ),
                Some(error_kind(err)),
            ),
        };

        if rate_limited {
            self.rate_limiter.record_rate_limited().await;
        }
        self.metrics
            .record_request(RequestMetrics {
                endpoint: endpoint_kind.to_string(),
                status_code,
                response_time: start_time.elapsed(),
                success,
                rate_limited,
                error_type,
            })
            .await;

        outcome.map_err(|(_, err)| err)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint_kind: &str,
        url: &str,
        missing: Missing<'_>,
    ) -> Result<T, CoreError> {
        let response = self.get(endpoint_kind, url, missing).await?;
        response.json::<T>().await.map_err(|e| {
            error!("Failed to decode {} response: {}", endpoint_kind, e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("could not decode {} response: {}", endpoint_kind, e),
            })
        })
    }

    /// One page of a subreddit's newest posts.
    pub async fn fetch_subreddit_page(
        &self,
        subreddit: &str,
        after: Option<&str>,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let mut url = format!(
            "{}/r/{}/new.json?limit={}",
            self.config.base_url, subreddit, PAGE_SIZE
        );
        if let Some(after) = after {
            url.push_str("&after=");
            url.push_str(after);
        }

        let listing: RedditListing<RedditPostData> = self
            .get_json("listing", &url, Missing::Subreddit(subreddit))
            .await?;
        debug!(
            "Retrieved {} posts from r/{} (after: {:?})",
            listing.data.children.len(),
            subreddit,
            after
        );
        Ok(listing)
    }

    /// Newest posts of a subreddit, newest first, paging until an empty page or `max_posts`.
    pub async fn fetch_all_subreddit_posts(
        &self,
        subreddit: &str,
        max_posts: usize,
    ) -> Result<Vec<RedditPost>, CoreError> {
        let mut all_posts: Vec<RedditPost> = Vec::new();
        let mut after: Option<String> = None;

        while all_posts.len() < max_posts {
            let listing = self.fetch_subreddit_page(subreddit, after.as_deref()).await?;
            if listing.data.children.is_empty() {
                break;
            }

            all_posts.extend(listing.data.children.into_iter().map(|c| RedditPost::from(c.data)));

            match all_posts.last() {
                Some(last) => after = Some(format!("t3_{}", last.id)),
                None => break,
            }
        }

        all_posts.truncate(max_posts);
        info!("Fetched {} posts from r/{}", all_posts.len(), subreddit);
        Ok(all_posts)
    }

    /// Same as `fetch_all_subreddit_posts` with the configured maximum.
    pub async fn fetch_recent_posts(&self, subreddit: &str) -> Result<Vec<RedditPost>, CoreError> {
        let max = if self.config.max_posts == 0 {
            MAX_POSTS
        } else {
            self.config.max_posts
        };
        self.fetch_all_subreddit_posts(subreddit, max).await
    }

    pub async fn fetch_post_details(
        &self,
        subreddit: &str,
        post_id: &str,
    ) -> Result<PostDetails, CoreError> {
        let url = format!(
            "{}/r/{}/comments/{}/.json?limit={}",
            self.config.base_url, subreddit, post_id, PAGE_SIZE
        );

        let listings: Vec<RedditListing<Value>> = self
            .get_json("comments", &url, Missing::Post(post_id))
            .await?;
        let details = PostDetails::from_listings(post_id, listings)?;
        debug!(
            "Retrieved post {} with {} comments",
            post_id,
            details.comment_count()
        );
        Ok(details)
    }

    /// Downloads an image; returns `None` for URLs without an image extension.
    pub async fn download_image(&self, url: &str) -> Result<Option<Vec<u8>>, CoreError> {
        if !is_image_url(url) {
            debug!("Skipping non-image URL {}", url);
            return Ok(None);
        }

        let response = self.get("image", url, Missing::Resource(url)).await?;
        let bytes = response.bytes().await?;
        debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(Some(bytes.to_vec()))
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.get_metrics().await
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limiter.get_rate_limit_status().await
    }
}

fn status_to_error(response: &Response, missing: Missing<'_>) -> CoreError {
    let status = response.status();
    let error = match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(60);
            warn!("Rate limited, retry after {} seconds", retry_after);
            RedditApiError::RateLimitExceeded { retry_after }
        }
        StatusCode::UNAUTHORIZED => RedditApiError::Unauthorized,
        StatusCode::FORBIDDEN => RedditApiError::Forbidden {
            resource: response.url().path().to_string(),
        },
        StatusCode::NOT_FOUND => missing.into_error(),
        s if s.is_server_error() => RedditApiError::ServerError {
            status_code: s.as_u16(),
        },
        s => RedditApiError::InvalidResponse {
            details: format!("unexpected status {}", s),
        },
    };
    CoreError::RedditApi(error)
}

fn error_kind(error: &CoreError) -> String {
    match error {
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { .. }) => "rate_limited",
        CoreError::RedditApi(RedditApiError::Unauthorized) => "unauthorized",
        CoreError::RedditApi(RedditApiError::Forbidden { .. }) => "forbidden",
        CoreError::RedditApi(
            RedditApiError::SubredditNotFound { .. } | RedditApiError::PostNotFound { .. },
        ) => "not_found",
        CoreError::RedditApi(RedditApiError::ServerError { .. }) => "server_error",
        CoreError::RedditApi(RedditApiError::RequestTimeout) => "timeout",
        _ => "network_error",
    }
    .to_string()
}
