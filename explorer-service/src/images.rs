use database::Database;
use explorer_core::CoreError;
use reddit_client::{image_extension, RedditApiClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Downloads images linked by saved posts into the cache directory.
pub struct ImageCache {
    db: Database,
    reddit: Arc<RedditApiClient>,
    cache_dir: PathBuf,
}

impl ImageCache {
    pub fn new(db: Database, reddit: Arc<RedditApiClient>, cache_dir: PathBuf) -> Self {
        Self {
            db,
            reddit,
            cache_dir,
        }
    }

    pub fn cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }

    /// File name for a cached image: md5 of the URL plus its extension.
    pub fn file_name(url: &str) -> Option<String> {
        image_extension(url).map(|ext| format!("{:x}{}", md5::compute(url.as_bytes()), ext))
    }

    /// Path of the cached image for `post_id`, downloading it on first use.
    /// Returns `None` when `url` does not point at an image.
    pub async fn cache(&self, post_id: &str, url: &str) -> Result<Option<PathBuf>, CoreError> {
        let Some(file_name) = Self::file_name(url) else {
            debug!("Post {} does not link an image", post_id);
            return Ok(None);
        };

        if let Some(cached) = self.db.get_cached_image(post_id).await? {
            let path = PathBuf::from(cached.image_path);
            if tokio::fs::try_exists(&path).await? {
                return Ok(Some(path));
            }
            debug!("Cached image {} is gone, downloading again", path.display());
        }

        let Some(bytes) = self.reddit.download_image(url).await? else {
            return Ok(None);
        };

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let path = self.cache_dir.join(file_name);
        tokio::fs::write(&path, &bytes).await?;
        self.db
            .record_cached_image(post_id, &path.to_string_lossy())
            .await?;

        info!("Cached image for post {} at {}", post_id, path.display());
        Ok(Some(path))
    }

    /// Caches the image of a saved post.
    pub async fn cache_saved_post(&self, post_id: &str) -> Result<Option<PathBuf>, CoreError> {
        let post = self.db.require_saved_post(post_id).await?;
        match post.url.as_deref() {
            Some(url) => self.cache(post_id, url).await,
            None => Ok(None),
        }
    }
}
