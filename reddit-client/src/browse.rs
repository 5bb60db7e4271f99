use explorer_core::RedditPost;
use std::collections::HashSet;

/// Most posts shown when browsing back to the last saved post.
pub const BROWSE_LIMIT: usize = 200;

/// Walks `posts` (newest first) up to and including the first saved one, at
/// most `limit` posts, and returns them oldest first.
pub fn posts_since_last_saved(
    posts: &[RedditPost],
    saved_ids: &HashSet<String>,
    limit: usize,
) -> Vec<RedditPost> {
    let mut selected = Vec::new();
    for post in posts.iter().take(limit) {
        selected.push(post.clone());
        if saved_ids.contains(&post.id) {
            break;
        }
    }
    selected.reverse();
    selected
}

/// The newest `count` posts, oldest first.
pub fn latest_posts(posts: &[RedditPost], count: usize) -> Vec<RedditPost> {
    let mut selected: Vec<RedditPost> = posts.iter().take(count).cloned().collect();
    selected.reverse();
    selected
}
