use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of the category every saved post starts in. It cannot be renamed or removed.
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// Upper bound on posts fetched per subreddit and on search results.
pub const MAX_POSTS: usize = 400;

/// A post as returned by Reddit's listing endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub subreddit: String,
    pub created_utc: i64,
    pub num_comments: u32,
    pub selftext: String,
    pub author: Option<String>,
    pub permalink: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subreddit {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPost {
    pub id: i64,
    pub reddit_id: String,
    pub subreddit_id: i64,
    pub subreddit: String,
    pub title: String,
    pub url: Option<String>,
    pub category: String,
    pub is_read: bool,
    pub show_in_categories: bool,
    pub num_comments: i64,
    pub created_utc: i64,
    pub saved_at: i64,
    pub content: Option<String>,
    pub content_date: Option<i64>,
    pub summary: Option<String>,
}

impl SavedPost {
    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// Number of visible saved posts in a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: i64,
}

/// A browse result: an upstream post plus whether it is already saved.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowsedPost {
    pub post: RedditPost,
    pub saved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestWindow {
    Day,
    ThreeDays,
}

impl DigestWindow {
    pub fn label(&self) -> &'static str {
        match self {
            DigestWindow::Day => "24h",
            DigestWindow::ThreeDays => "3d",
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        match self {
            DigestWindow::Day => chrono::Duration::hours(24),
            DigestWindow::ThreeDays => chrono::Duration::hours(72),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DigestWindow::Day => "the last 24 hours",
            DigestWindow::ThreeDays => "the last 3 days",
        }
    }

    /// Unix timestamp of the start of the window ending at `now`.
    pub fn start(&self, now: DateTime<Utc>) -> i64 {
        (now - self.duration()).timestamp()
    }
}

impl fmt::Display for DigestWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DigestWindow {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "24h" | "day" | "1d" => Ok(DigestWindow::Day),
            "3d" | "72h" | "three-days" => Ok(DigestWindow::ThreeDays),
            other => Err(crate::CoreError::InvalidInput {
                message: format!("unknown digest window '{}', expected 24h or 3d", other),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestItem {
    pub text: String,
    pub post_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    pub window: DigestWindow,
    pub generated_at: i64,
    pub items: Vec<DigestItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedImage {
    pub post_id: String,
    pub image_path: String,
    pub created_at: i64,
}

/// Outcome of importing a file of post links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub processed: usize,
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorizeReport {
    pub downloaded: usize,
    pub processed: usize,
    pub moved: usize,
}

pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_default()
}

/// Formats a unix timestamp the way posts and comments are labelled.
pub fn format_timestamp(ts: i64) -> String {
    timestamp_to_datetime(ts)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_window_parses_labels() {
        assert_eq!("24h".parse::<DigestWindow>().unwrap(), DigestWindow::Day);
        assert_eq!("3D".parse::<DigestWindow>().unwrap(), DigestWindow::ThreeDays);
        assert!("week".parse::<DigestWindow>().is_err());
        assert_eq!(DigestWindow::ThreeDays.to_string(), "3d");
    }

    #[test]
    fn digest_window_start() {
        let now = timestamp_to_datetime(1_000_000);
        assert_eq!(DigestWindow::Day.start(now), 1_000_000 - 86_400);
        assert_eq!(DigestWindow::ThreeDays.start(now), 1_000_000 - 3 * 86_400);
    }

    #[test]
    fn formats_timestamps_in_utc() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00");
        assert_eq!(format_timestamp(1_700_000_000), "2023-11-14 22:13:20");
    }
}
