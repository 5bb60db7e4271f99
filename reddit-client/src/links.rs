use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Extensions the image cache accepts.
pub const IMAGE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".gif"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostLink {
    pub subreddit: String,
    pub post_id: String,
}

fn post_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"reddit\.com/r/([^/?#\s]+)/comments/([^/?#\s]+)")
            .expect("post url pattern is valid")
    })
}

/// Extracts the subreddit and post id from a Reddit post URL.
pub fn parse_reddit_url(url: &str) -> Option<PostLink> {
    let captures = post_url_regex().captures(url.trim())?;
    Some(PostLink {
        subreddit: captures.get(1)?.as_str().to_string(),
        post_id: captures.get(2)?.as_str().to_string(),
    })
}

/// Returns the image extension of `url` (lowercase, with dot) if it is one the cache accepts.
pub fn image_extension(url: &str) -> Option<&'static str> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        Err(_) => url.to_ascii_lowercase(),
    };
    IMAGE_EXTENSIONS
        .iter()
        .copied()
        .find(|ext| path.ends_with(ext))
}

pub fn is_image_url(url: &str) -> bool {
    image_extension(url).is_some()
}
