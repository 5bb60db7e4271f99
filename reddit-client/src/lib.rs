pub mod api;
pub mod browse;
pub mod links;
pub mod metrics;
pub mod post_details;
pub mod rate_limiter;

mod tests;

pub use api::{RedditApiClient, RedditClientConfig, RedditListing, RedditPostData, PAGE_SIZE};
pub use browse::{latest_posts, posts_since_last_saved, BROWSE_LIMIT};
pub use links::{image_extension, is_image_url, parse_reddit_url, PostLink};
pub use metrics::{ApiMetrics, EndpointMetrics, MetricsCollector};
pub use post_details::{Comment, PostDetails};
pub use rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
