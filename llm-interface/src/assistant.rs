use crate::prompts;
use crate::{CompletionRequest, LlmProvider};
use chrono::Utc;
use explorer_core::{
    Category, CoreError, Digest, DigestItem, DigestWindow, DEFAULT_CATEGORY,
};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Temperature for summaries and categorization; low for consistent answers.
const PRECISE_TEMPERATURE: f32 = 0.2;
const DIGEST_TEMPERATURE: f32 = 0.3;

fn category_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<category>(.*?)</category>").expect("category tag pattern is valid"))
}

fn suggested_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<suggested_category>(.*?)</suggested_category>")
            .expect("suggestion tag pattern is valid")
    })
}

fn bullet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-*•]\s+(.+)$").expect("bullet pattern is valid"))
}

fn post_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[post:\s*([^\]\s]+)\s*\]").expect("post tag pattern is valid"))
}

/// The parts of a post the categorizer looks at.
#[derive(Debug, Clone, Copy)]
pub struct PostToCategorize<'a> {
    pub title: &'a str,
    pub subreddit: &'a str,
    pub content: &'a str,
}

/// A summarized post that goes into a digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestSource {
    pub post_id: String,
    pub subreddit: String,
    pub title: String,
    pub summary: String,
}

/// Summarizes, categorizes and digests posts through an [`LlmProvider`].
#[derive(Debug)]
pub struct AiAssistant<P> {
    provider: P,
    suggest_mode: bool,
    suggestions_path: Option<PathBuf>,
}

impl<P: LlmProvider> AiAssistant<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            suggest_mode: false,
            suggestions_path: None,
        }
    }

    /// Enables suggest mode; suggested category names are appended to `path`.
    pub fn with_suggestions(mut self, path: impl Into<PathBuf>) -> Self {
        self.suggest_mode = true;
        self.suggestions_path = Some(path.into());
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn suggest_mode(&self) -> bool {
        self.suggest_mode
    }

    pub async fn summarize_post(&self, content: &str) -> Result<String, CoreError> {
        if content.trim().is_empty() {
            return Err(CoreError::InvalidInput {
                message: "post has no content to summarize".to_string(),
            });
        }

        let request = CompletionRequest::new(prompts::SUMMARIZE_SYSTEM, prompts::summarize_prompt(content))
            .with_temperature(PRECISE_TEMPERATURE);
        let summary = self.provider.complete(&request).await?;
        Ok(summary.trim().to_string())
    }

    /// Picks a category for `post`, returning it with the summary used.
    ///
    /// A summary is generated first when none is given. Replies naming a
    /// category that does not exist fall back to the default category.
    pub async fn categorize_post(
        &self,
        post: &PostToCategorize<'_>,
        categories: &[Category],
        summary: Option<&str>,
    ) -> Result<(String, String), CoreError> {
        let summary = match summary.filter(|s| !s.trim().is_empty()) {
            Some(existing) => existing.to_string(),
            None => self.summarize_post(post.content).await?,
        };

        let request = CompletionRequest::new(
            prompts::categorize_system(self.suggest_mode),
            prompts::categorize_prompt(categories, post.title, post.subreddit, &summary),
        )
        .with_temperature(PRECISE_TEMPERATURE);

        let response = self.provider.complete(&request).await?;
        debug!("Categorization reply for '{}': {}", post.title, response);

        if self.suggest_mode {
            if let Some(suggestion) = parse_suggested_category(&response) {
                let known = categories.iter().any(|c| c.name == suggestion);
                if !known {
                    if let Some(path) = &self.suggestions_path {
                        if let Err(e) = record_suggestion(path, &suggestion).await {
                            warn!("Could not save category suggestion '{}': {}", suggestion, e);
                        }
                    }
                }
            }
        }

        let category = parse_category_tag(&response, categories);
        Ok((category, summary))
    }

    /// Builds a digest of `posts`; an empty input gives an empty digest without a model call.
    pub async fn build_digest(
        &self,
        window: DigestWindow,
        posts: &[DigestSource],
    ) -> Result<Digest, CoreError> {
        let generated_at = Utc::now().timestamp();
        if posts.is_empty() {
            return Ok(Digest {
                window,
                generated_at,
                items: Vec::new(),
            });
        }

        let request = CompletionRequest::new(prompts::DIGEST_SYSTEM, prompts::digest_prompt(window, posts))
            .with_temperature(DIGEST_TEMPERATURE);
        let response = self.provider.complete(&request).await?;

        let known: HashSet<&str> = posts.iter().map(|p| p.post_id.as_str()).collect();
        let items = parse_digest_items(&response, &known);
        info!(
            "Built {} digest with {} items from {} posts",
            window,
            items.len(),
            posts.len()
        );

        Ok(Digest {
            window,
            generated_at,
            items,
        })
    }
}

/// First `<category>` tag if it names a known category, else the default category.
pub fn parse_category_tag(response: &str, categories: &[Category]) -> String {
    category_re()
        .captures(response)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|name| categories.iter().any(|c| c.name == *name))
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
}

pub fn parse_suggested_category(response: &str) -> Option<String> {
    suggested_re()
        .captures(response)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Bullet lines (`-`, `*` or `•` followed by whitespace) become items; a
/// trailing `[post:<id>]` tag links the item when the id is one of `known_ids`.
/// Markdown rules (`---`) and bold openers (`**Note:**`) are not bullets.
pub fn parse_digest_items(response: &str, known_ids: &HashSet<&str>) -> Vec<DigestItem> {
    response
        .lines()
        .map(str::trim)
        .filter_map(|line| bullet_re().captures(line).and_then(|c| c.get(1)))
        .map(|m| m.as_str())
        .filter_map(|rest| {
            let post_id = post_tag_re()
                .captures_iter(rest)
                .last()
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())
                .filter(|id| known_ids.contains(id))
                .map(str::to_string);
            let text = post_tag_re().replace_all(rest, "").trim().to_string();
            if text.is_empty() {
                None
            } else {
                Some(DigestItem { text, post_id })
            }
        })
        .collect()
}

/// Appends `name` to the suggestions file unless an identical line exists.
/// Returns whether it was added.
pub async fn record_suggestion(path: &Path, name: &str) -> Result<bool, CoreError> {
    let existing = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    if existing.lines().any(|line| line.trim() == name) {
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(format!("{}\n", name).as_bytes()).await?;
    file.flush().await?;
    info!("Recorded category suggestion '{}'", name);
    Ok(true)
}
