#[cfg(test)]
mod tests {
    use crate::{count_new_posts, Explorer, WatchUpdate, Watcher};
    use database::Database;
    use explorer_core::{
        AppConfig, CoreError, DigestWindow, LlmError, RedditPost, RetryConfig, DEFAULT_CATEGORY,
    };
    use llm_interface::{AiAssistant, OpenAiProvider};
    use reddit_client::{RateLimitConfig, RedditApiClient, RedditClientConfig};
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use std::env;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SUMMARIZE_MARKER: &str = "expert content summarizer";
    const CATEGORIZE_MARKER: &str = "expert content categorizer";
    const DIGEST_MARKER: &str = "writes short digests";

    fn no_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 1,
            base_delay_ms: 1,
            max_delay_ms: 1,
            jitter_factor: 0.0,
            ..RetryConfig::default()
        }
    }

    struct Harness {
        explorer: Explorer<OpenAiProvider>,
        _data_dir: TempDir,
    }

    async fn setup(reddit: &MockServer, openai: Option<&MockServer>) -> Harness {
        setup_with_retry(reddit, openai, no_retry()).await
    }

    async fn setup_with_retry(
        reddit: &MockServer,
        openai: Option<&MockServer>,
        retry: RetryConfig,
    ) -> Harness {
        setup_with_config(reddit, openai, retry, AppConfig::default()).await
    }

    async fn setup_with_config(
        reddit: &MockServer,
        openai: Option<&MockServer>,
        retry: RetryConfig,
        mut config: AppConfig,
    ) -> Harness {
        let data_dir = TempDir::new().unwrap();
        config.storage.data_dir = Some(data_dir.path().to_path_buf());

        let db_path = env::temp_dir().join(format!(
            "test_reddit_explorer_service_{}.db",
            uuid::Uuid::new_v4()
        ));
        let db = Database::open(&format!("sqlite://{}", db_path.display()))
            .await
            .unwrap();

        let client = RedditApiClient::new(RedditClientConfig {
            base_url: reddit.uri(),
            user_agent: "reddit-explorer-tests/1.0".to_string(),
            timeout: Duration::from_secs(5),
            rate_limit: RateLimitConfig::reddit_public(6000, 10),
            max_posts: 400,
        })
        .unwrap();

        let assistant = openai.map(|server| {
            let provider = OpenAiProvider::new("test-key", server.uri(), "gpt-4o")
                .unwrap()
                .with_retry_config(no_retry());
            AiAssistant::new(provider)
        });

        let explorer =
            Explorer::new(config, db, Arc::new(client), assistant).with_retry_config(retry);
        Harness {
            explorer,
            _data_dir: data_dir,
        }
    }

    fn post_data(id: &str, url: &str, created_utc: i64) -> Value {
        json!({
            "id": id,
            "title": format!("Post {}", id),
            "selftext": "Body text",
            "author": "someone",
            "subreddit": "rust",
            "url": url,
            "permalink": format!("/r/rust/comments/{}/post/", id),
            "created_utc": created_utc as f64,
            "num_comments": 1
        })
    }

    fn listing(ids: &[&str]) -> Value {
        json!({
            "kind": "Listing",
            "data": {
                "children": ids
                    .iter()
                    .map(|id| json!({
                        "kind": "t3",
                        "data": post_data(id, &format!("https://example.com/{}", id), 1_700_000_000)
                    }))
                    .collect::<Vec<_>>(),
                "after": null
            }
        })
    }

    fn details(id: &str, url: &str, created_utc: i64) -> Value {
        json!([
            {
                "kind": "Listing",
                "data": { "children": [{ "kind": "t3", "data": post_data(id, url, created_utc) }] }
            },
            {
                "kind": "Listing",
                "data": {
                    "children": [{
                        "kind": "t1",
                        "data": {
                            "author": "commenter",
                            "body": "Nice post",
                            "created_utc": 1_700_000_100.0,
                            "replies": ""
                        }
                    }]
                }
            }
        ])
    }

    fn reddit_post(id: &str, created_utc: i64) -> RedditPost {
        RedditPost {
            id: id.to_string(),
            title: format!("Post {}", id),
            url: Some(format!("https://example.com/{}", id)),
            subreddit: "rust".to_string(),
            created_utc,
            num_comments: 1,
            selftext: String::new(),
            author: Some("someone".to_string()),
            permalink: None,
        }
    }

    fn completion(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        }))
    }

    async fn mount_listing(server: &MockServer, ids: &[&str]) {
        let last = format!("t3_{}", ids.last().copied().unwrap_or_default());
        Mock::given(method("GET"))
            .and(path("/r/rust/new.json"))
            .and(query_param("after", last.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(&[])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/rust/new.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(ids)))
            .mount(server)
            .await;
    }

    async fn mount_missing(server: &MockServer, id: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/r/rust/comments/{}/.json", id)))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_details(server: &MockServer, id: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/r/rust/comments/{}/.json", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(details(
                id,
                &format!("https://example.com/{}", id),
                1_700_000_000,
            )))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_browse_runs_back_to_last_saved_post() {
        let reddit = MockServer::start().await;
        mount_listing(&reddit, &["c", "b", "a"]).await;
        let h = setup(&reddit, None).await;
        h.explorer.db().save_post(&reddit_post("b", 1)).await.unwrap();

        let browsed = h.explorer.browse("r/rust", None).await.unwrap();
        let ids: Vec<_> = browsed.iter().map(|b| b.post.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert!(browsed[0].saved);
        assert!(!browsed[1].saved);
    }

    #[tokio::test]
    async fn test_browse_with_count_returns_latest_posts() {
        let reddit = MockServer::start().await;
        mount_listing(&reddit, &["c", "b", "a"]).await;
        let h = setup(&reddit, None).await;

        let browsed = h.explorer.browse("rust", Some(2)).await.unwrap();
        let ids: Vec<_> = browsed.iter().map(|b| b.post.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert!(browsed.iter().all(|b| !b.saved));
    }

    #[tokio::test]
    async fn test_save_fetches_post_once() {
        let reddit = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/r/rust/comments/abc/.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(details(
                "abc",
                "https://example.com/abc",
                1_700_000_000,
            )))
            .expect(1)
            .mount(&reddit)
            .await;
        let h = setup(&reddit, None).await;

        assert!(h.explorer.save("rust", "abc").await.unwrap());
        assert!(!h.explorer.save("rust", "abc").await.unwrap());

        let saved = h.explorer.db().get_saved_post("abc").await.unwrap().unwrap();
        assert_eq!(saved.title, "Post abc");
        assert_eq!(saved.category, DEFAULT_CATEGORY);

        assert!(h.explorer.unsave("abc").await.unwrap());
        assert!(!h.explorer.db().is_saved("abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_missing_post_fails() {
        let reddit = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/r/rust/comments/gone/.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&reddit)
            .await;
        let h = setup(&reddit, None).await;

        let err = h.explorer.save("rust", "gone").await.unwrap_err();
        assert!(matches!(err, CoreError::RedditApi(_)));
        assert!(!h.explorer.db().is_saved("gone").await.unwrap());
    }

    #[tokio::test]
    async fn test_download_category_skips_failures() {
        let reddit = MockServer::start().await;
        mount_details(&reddit, "ok").await;
        Mock::given(method("GET"))
            .and(path("/r/rust/comments/bad/.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&reddit)
            .await;
        let h = setup(&reddit, None).await;
        let db = h.explorer.db();
        db.save_post(&reddit_post("ok", 1)).await.unwrap();
        db.save_post(&reddit_post("bad", 2)).await.unwrap();

        let downloaded = h.explorer.download_category(DEFAULT_CATEGORY).await.unwrap();
        assert_eq!(downloaded, 1);

        let content = db.get_saved_post("ok").await.unwrap().unwrap().content.unwrap();
        assert!(content.starts_with("# Post ok\n\n"));
        assert!(content.contains("**u/commenter**"));
        assert!(db.get_saved_post("bad").await.unwrap().unwrap().content.is_none());
    }

    #[tokio::test]
    async fn test_download_category_continues_after_many_missing_posts() {
        let reddit = MockServer::start().await;
        mount_details(&reddit, "good").await;
        let missing = ["gone1", "gone2", "gone3", "gone4"];
        for id in missing {
            mount_missing(&reddit, id).await;
        }
        let h = setup_with_retry(&reddit, None, RetryConfig::reddit()).await;
        let db = h.explorer.db();
        // Newest saves are downloaded first, so the good post comes last.
        db.save_post(&reddit_post("good", 1)).await.unwrap();
        for id in missing {
            db.save_post(&reddit_post(id, 2)).await.unwrap();
        }

        let downloaded = h.explorer.download_category(DEFAULT_CATEGORY).await.unwrap();
        assert_eq!(downloaded, 1);
        assert!(db.get_saved_post("good").await.unwrap().unwrap().has_content());

        // A later single save still reaches Reddit.
        mount_details(&reddit, "later").await;
        assert!(h.explorer.save("rust", "later").await.unwrap());
    }

    #[tokio::test]
    async fn test_auto_categorize_moves_posts_and_stores_summaries() {
        let reddit = MockServer::start().await;
        mount_details(&reddit, "p1").await;
        let openai = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains(SUMMARIZE_MARKER))
            .respond_with(completion("A short summary."))
            .mount(&openai)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains(CATEGORIZE_MARKER))
            .respond_with(completion("It is about code. <category>Tech</category>"))
            .mount(&openai)
            .await;

        let h = setup(&reddit, Some(&openai)).await;
        let db = h.explorer.db();
        db.add_category("Tech").await.unwrap();
        db.save_post(&reddit_post("p1", 1)).await.unwrap();
        db.save_post(&reddit_post("p2", 2)).await.unwrap();
        db.set_content("p2", "# Post p2\n\nAlready downloaded").await.unwrap();
        db.set_summary("p2", "Existing summary").await.unwrap();

        let report = h.explorer.auto_categorize(DEFAULT_CATEGORY).await.unwrap();
        assert_eq!(report.downloaded, 1);
        assert_eq!(report.processed, 2);
        assert_eq!(report.moved, 2);

        let p1 = db.get_saved_post("p1").await.unwrap().unwrap();
        assert_eq!(p1.category, "Tech");
        assert_eq!(p1.summary.as_deref(), Some("A short summary."));
        let p2 = db.get_saved_post("p2").await.unwrap().unwrap();
        assert_eq!(p2.category, "Tech");
        assert_eq!(p2.summary.as_deref(), Some("Existing summary"));
    }

    #[tokio::test]
    async fn test_auto_categorize_keeps_category_but_stores_summary() {
        let reddit = MockServer::start().await;
        let openai = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains(SUMMARIZE_MARKER))
            .respond_with(completion("Summary."))
            .mount(&openai)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains(CATEGORIZE_MARKER))
            .respond_with(completion("<category>Made Up</category>"))
            .mount(&openai)
            .await;

        let h = setup(&reddit, Some(&openai)).await;
        let db = h.explorer.db();
        db.save_post(&reddit_post("p1", 1)).await.unwrap();
        db.set_content("p1", "# Post p1").await.unwrap();

        let report = h.explorer.auto_categorize(DEFAULT_CATEGORY).await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.moved, 0);

        let p1 = db.get_saved_post("p1").await.unwrap().unwrap();
        assert_eq!(p1.category, DEFAULT_CATEGORY);
        assert_eq!(p1.summary.as_deref(), Some("Summary."));
    }

    #[tokio::test]
    async fn test_ai_features_require_api_key() {
        let reddit = MockServer::start().await;
        let h = setup(&reddit, None).await;
        h.explorer.db().save_post(&reddit_post("p1", 1)).await.unwrap();

        let err = h.explorer.summarize_post("p1").await.unwrap_err();
        assert!(matches!(err, CoreError::Llm(LlmError::NotConfigured)));
        let err = h.explorer.auto_categorize(DEFAULT_CATEGORY).await.unwrap_err();
        assert!(matches!(err, CoreError::Llm(LlmError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_summarize_post_downloads_and_stores() {
        let reddit = MockServer::start().await;
        mount_details(&reddit, "p1").await;
        let openai = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("Nice post"))
            .respond_with(completion("  Summary of p1.  "))
            .expect(1)
            .mount(&openai)
            .await;

        let h = setup(&reddit, Some(&openai)).await;
        h.explorer.db().save_post(&reddit_post("p1", 1)).await.unwrap();

        let summary = h.explorer.summarize_post("p1").await.unwrap();
        assert_eq!(summary, "Summary of p1.");
        let saved = h.explorer.db().get_saved_post("p1").await.unwrap().unwrap();
        assert_eq!(saved.summary.as_deref(), Some("Summary of p1."));
        assert!(saved.content.is_some());
    }

    #[tokio::test]
    async fn test_digest_is_cached_per_window() {
        let reddit = MockServer::start().await;
        let openai = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains(DIGEST_MARKER))
            .respond_with(completion(
                "- Rust release notes [post:recent]\n- Something invented [post:zzz]",
            ))
            .expect(2)
            .mount(&openai)
            .await;

        let h = setup(&reddit, Some(&openai)).await;
        let db = h.explorer.db();
        let now = chrono::Utc::now().timestamp();
        db.save_post(&reddit_post("recent", now - 3600)).await.unwrap();
        db.set_summary("recent", "Release notes").await.unwrap();
        db.save_post(&reddit_post("old", now - 10 * 86_400)).await.unwrap();

        let digest = h.explorer.digest(DigestWindow::Day, false).await.unwrap();
        assert_eq!(digest.items.len(), 2);
        assert_eq!(digest.items[0].text, "Rust release notes");
        assert_eq!(digest.items[0].post_id.as_deref(), Some("recent"));
        assert_eq!(digest.items[1].post_id, None);

        let cached = h.explorer.digest(DigestWindow::Day, false).await.unwrap();
        assert_eq!(cached, digest);

        let refreshed = h.explorer.digest(DigestWindow::Day, true).await.unwrap();
        assert_eq!(refreshed.items.len(), 2);
    }

    #[tokio::test]
    async fn test_import_file_reports_each_outcome() {
        let reddit = MockServer::start().await;
        mount_details(&reddit, "new1").await;
        Mock::given(method("GET"))
            .and(path("/r/rust/comments/gone/.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&reddit)
            .await;
        let h = setup(&reddit, None).await;
        h.explorer.db().save_post(&reddit_post("old1", 1)).await.unwrap();

        let dir = TempDir::new().unwrap();
        let links = dir.path().join("links.txt");
        std::fs::write(
            &links,
            "https://www.reddit.com/r/rust/comments/new1/title/\n\
             \n\
             https://example.com/not-reddit\n\
             https://www.reddit.com/r/rust/comments/old1/title/\n\
             https://www.reddit.com/r/rust/comments/gone/title/\n\
             https://www.reddit.com/r/rust/comments/never/title/\n",
        )
        .unwrap();

        let importer = h.explorer.importer().with_retry_config(no_retry());
        let report = importer.import_file(&links, Some(5)).await.unwrap();
        assert_eq!(report.processed, 5);
        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors[0].starts_with("Invalid Reddit URL"));

        let imported = h.explorer.db().get_saved_post("new1").await.unwrap().unwrap();
        assert!(imported.is_read);
        assert_eq!(imported.category, DEFAULT_CATEGORY);
        assert_eq!(imported.num_comments, 1);
        assert!(imported.content.unwrap().starts_with("# Post new1"));
        assert!(!h.explorer.db().is_saved("never").await.unwrap());
    }

    #[tokio::test]
    async fn test_import_file_continues_after_many_missing_posts() {
        let reddit = MockServer::start().await;
        mount_details(&reddit, "good").await;
        let missing = ["gone1", "gone2", "gone3", "gone4", "gone5", "gone6"];
        for id in missing {
            mount_missing(&reddit, id).await;
        }
        let h = setup(&reddit, None).await;

        let dir = TempDir::new().unwrap();
        let links = dir.path().join("links.txt");
        let mut body: String = missing
            .iter()
            .map(|id| format!("https://www.reddit.com/r/rust/comments/{}/title/\n", id))
            .collect();
        body.push_str("https://www.reddit.com/r/rust/comments/good/title/\n");
        std::fs::write(&links, body).unwrap();

        let report = h.explorer.importer().import_file(&links, None).await.unwrap();
        assert_eq!(report.processed, 7);
        assert_eq!(report.imported, 1);
        assert_eq!(report.errors.len(), 6);
        assert!(report
            .errors
            .iter()
            .all(|e| e.starts_with("Error processing") && !e.contains("Circuit breaker")));
        assert!(h.explorer.db().is_saved("good").await.unwrap());
    }

    #[tokio::test]
    async fn test_import_missing_file_fails() {
        let reddit = MockServer::start().await;
        let h = setup(&reddit, None).await;
        let result = h
            .explorer
            .importer()
            .import_file(std::path::Path::new("/definitely/not/here.txt"), None)
            .await;
        assert!(matches!(result, Err(CoreError::Io(_))));
    }

    #[tokio::test]
    async fn test_image_cache_downloads_once() {
        let reddit = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/cat.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .expect(1)
            .mount(&reddit)
            .await;
        let h = setup(&reddit, None).await;

        let image_url = format!("{}/img/cat.png", reddit.uri());
        let mut post = reddit_post("pic", 1);
        post.url = Some(image_url.clone());
        h.explorer.db().save_post(&post).await.unwrap();

        let cache = h.explorer.image_cache();
        let path = cache.cache_saved_post("pic").await.unwrap().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![1u8, 2, 3]);
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            format!("{:x}.png", md5::compute(image_url.as_bytes()))
        );
        assert!(path.starts_with(cache.cache_dir()));

        let again = cache.cache_saved_post("pic").await.unwrap().unwrap();
        assert_eq!(again, path);
    }

    #[tokio::test]
    async fn test_image_cache_ignores_non_images() {
        let reddit = MockServer::start().await;
        let h = setup(&reddit, None).await;
        h.explorer.db().save_post(&reddit_post("text", 1)).await.unwrap();

        let cached = h.explorer.image_cache().cache_saved_post("text").await.unwrap();
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn test_watcher_counts_new_posts_and_remembers_last_seen() {
        let reddit = MockServer::start().await;
        mount_listing(&reddit, &["c", "b", "a"]).await;
        let h = setup(&reddit, None).await;
        h.explorer.db().save_post(&reddit_post("a", 1)).await.unwrap();

        let watcher = Watcher::new(&h.explorer, 5);
        assert_eq!(watcher.polling_interval(), Duration::from_secs(300));

        let first = watcher.poll_once().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].subreddit, "rust");
        assert_eq!(first[0].new_posts, 2);

        let second = watcher.poll_once().await.unwrap();
        assert_eq!(second[0].new_posts, 0);
        assert_eq!(
            h.explorer.db().get_setting("watch.last_seen.rust").await.unwrap(),
            Some("c".to_string())
        );
    }

    #[tokio::test]
    async fn test_watcher_normalizes_configured_subreddits() {
        let reddit = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/r/rust/new.json"))
            .and(query_param("after", "t3_a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(&[])))
            .mount(&reddit)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/rust/new.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(&["b", "a"])))
            .expect(1)
            .mount(&reddit)
            .await;
        let mut config = AppConfig::default();
        config.watch.subreddits = vec![
            "r/rust".to_string(),
            " /r/Rust/ ".to_string(),
            "  ".to_string(),
        ];
        let h = setup_with_config(&reddit, None, no_retry(), config).await;

        let updates = Watcher::new(&h.explorer, 1).poll_once().await.unwrap();
        assert_eq!(
            updates,
            vec![WatchUpdate {
                subreddit: "rust".to_string(),
                new_posts: 2,
            }]
        );
        assert_eq!(
            h.explorer.db().get_setting("watch.last_seen.rust").await.unwrap(),
            Some("b".to_string())
        );
    }

    #[test]
    fn test_count_new_posts_stops_at_saved_or_seen() {
        let posts: Vec<RedditPost> = ["d", "c", "b", "a"]
            .iter()
            .map(|id| reddit_post(id, 1))
            .collect();
        let saved: HashSet<String> = ["b".to_string()].into_iter().collect();

        assert_eq!(count_new_posts(&posts, &saved, None), 2);
        assert_eq!(count_new_posts(&posts, &saved, Some("c")), 1);
        assert_eq!(count_new_posts(&posts, &HashSet::new(), None), 4);
    }
}
