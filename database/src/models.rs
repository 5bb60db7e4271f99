use explorer_core::{CachedImage, Category, CategoryCount, SavedPost, Subreddit};
use sqlx::FromRow;

/// Column list matching [`SavedPostRow`]; expects `saved_posts p JOIN subreddits s`.
pub(crate) const POST_COLUMNS: &str = "p.id, p.reddit_id, p.subreddit_id, s.name AS subreddit, \
     p.title, p.url, p.category, p.is_read, p.show_in_categories, p.num_comments, \
     p.created_utc, p.saved_at, p.content, p.content_date, p.summary";

pub(crate) const POST_FROM: &str = "saved_posts p JOIN subreddits s ON s.id = p.subreddit_id";

#[derive(Debug, FromRow)]
pub(crate) struct SavedPostRow {
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

impl From<SavedPostRow> for SavedPost {
    fn from(row: SavedPostRow) -> Self {
        Self {
            id: row.id,
            reddit_id: row.reddit_id,
            subreddit_id: row.subreddit_id,
            subreddit: row.subreddit,
            title: row.title,
            url: row.url,
            category: row.category,
            is_read: row.is_read,
            show_in_categories: row.show_in_categories,
            num_comments: row.num_comments,
            created_utc: row.created_utc,
            saved_at: row.saved_at,
            content: row.content,
            content_date: row.content_date,
            summary: row.summary,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct SubredditRow {
    pub id: i64,
    pub name: String,
}

impl From<SubredditRow> for Subreddit {
    fn from(row: SubredditRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct CategoryRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct CategoryCountRow {
    pub name: String,
    pub count: i64,
}

impl From<CategoryCountRow> for CategoryCount {
    fn from(row: CategoryCountRow) -> Self {
        Self {
            name: row.name,
            count: row.count,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct CachedImageRow {
    pub post_id: String,
    pub image_path: String,
    pub created_at: i64,
}

impl From<CachedImageRow> for CachedImage {
    fn from(row: CachedImageRow) -> Self {
        Self {
            post_id: row.post_id,
            image_path: row.image_path,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct DigestRow {
    pub window_label: String,
    pub generated_at: i64,
    pub items: String,
}

/// Row counts shown by the `stats` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow)]
pub struct DatabaseStats {
    pub subreddits: i64,
    pub categories: i64,
    pub saved_posts: i64,
    pub unread_posts: i64,
    pub hidden_posts: i64,
    pub posts_with_content: i64,
    pub posts_with_summary: i64,
    pub cached_images: i64,
}
