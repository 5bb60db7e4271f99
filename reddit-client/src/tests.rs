#[cfg(test)]
mod tests {
    use crate::{RateLimitConfig, RedditApiClient, RedditClientConfig};
    use explorer_core::{CoreError, RedditApiError};
    use serde_json::{json, Value};
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> RedditApiClient {
        let config = RedditClientConfig {
            base_url: server.uri(),
            user_agent: "reddit-explorer-tests/1.0".to_string(),
            timeout: Duration::from_secs(5),
            rate_limit: RateLimitConfig::reddit_public(6000, 10),
            max_posts: 400,
        };
        RedditApiClient::new(config).unwrap()
    }

    fn post_json(id: &str) -> Value {
        json!({
            "kind": "t3",
            "data": {
                "id": id,
                "title": format!("Post {}", id),
                "selftext": "",
                "author": "someone",
                "subreddit": "rust",
                "url": format!("https://example.com/{}", id),
                "permalink": format!("/r/rust/comments/{}/post/", id),
                "created_utc": 1700000000.0,
                "num_comments": 1
            }
        })
    }

    fn listing(ids: &[&str]) -> Value {
        json!({
            "kind": "Listing",
            "data": {
                "children": ids.iter().map(|id| post_json(id)).collect::<Vec<_>>(),
                "after": null
            }
        })
    }

    #[tokio::test]
    async fn test_pagination_stops_on_empty_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/r/rust/new.json"))
            .and(query_param("after", "t3_c"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(&[])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/rust/new.json"))
            .and(query_param("after", "t3_b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(&["c"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/rust/new.json"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(&["a", "b"])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let posts = client.fetch_all_subreddit_posts("rust", 400).await.unwrap();

        let ids: Vec<_> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let metrics = client.get_metrics().await;
        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.requests_by_endpoint["listing"].success_count, 3);
    }

    #[tokio::test]
    async fn test_pagination_truncates_to_max_posts() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/r/rust/new.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(&["a", "b", "c"])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let posts = client.fetch_all_subreddit_posts("rust", 2).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].id, "b");
    }

    #[tokio::test]
    async fn test_rate_limit_maps_retry_after() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/r/rust/new.json"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "17"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.fetch_subreddit_page("rust", None).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 17 })
        ));

        let metrics = client.get_metrics().await;
        assert_eq!(metrics.rate_limited_requests, 1);
        assert_eq!(client.get_rate_limit_status().await.rate_limited_in_window, 1);
    }

    #[tokio::test]
    async fn test_missing_subreddit_and_post() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/r/nope/new.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/rust/comments/gone/.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);

        let err = client.fetch_subreddit_page("nope", None).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::RedditApi(RedditApiError::SubredditNotFound { ref subreddit }) if subreddit == "nope"
        ));

        let err = client.fetch_post_details("rust", "gone").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::RedditApi(RedditApiError::PostNotFound { ref post_id }) if post_id == "gone"
        ));
    }

    #[tokio::test]
    async fn test_server_error_and_bad_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/r/down/new.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/weird/new.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);

        let err = client.fetch_subreddit_page("down", None).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 })
        ));

        let err = client.fetch_subreddit_page("weird", None).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::RedditApi(RedditApiError::InvalidResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_post_details_renders_markdown() {
        let server = MockServer::start().await;

        let body = json!([
            listing(&["abc"]),
            {
                "kind": "Listing",
                "data": {
                    "children": [{
                        "kind": "t1",
                        "data": {
                            "author": "bob",
                            "body": "Nice",
                            "created_utc": 1700000060.0,
                            "replies": ""
                        }
                    }]
                }
            }
        ]);

        Mock::given(method("GET"))
            .and(path("/r/rust/comments/abc/.json"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let details = client.fetch_post_details("rust", "abc").await.unwrap();

        assert_eq!(details.comment_count(), 1);
        let markdown = details.to_markdown();
        assert!(markdown.starts_with("# Post abc\n\n**Posted by u/someone on 2023-11-14 22:13:20**"));
        assert!(markdown.contains("[Link](https://example.com/abc)"));
        assert!(markdown.contains("**u/bob** on 2023-11-14 22:14:20\n\nNice\n\n"));
    }

    #[tokio::test]
    async fn test_download_image_only_for_image_urls() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/img/cat.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let client = client_for(&server);

        let bytes = client
            .download_image(&format!("{}/img/cat.png", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, Some(vec![1, 2, 3]));

        let none = client
            .download_image(&format!("{}/article.html", server.uri()))
            .await
            .unwrap();
        assert!(none.is_none());

        let metrics = client.get_metrics().await;
        assert_eq!(metrics.requests_by_endpoint["image"].request_count, 1);
    }
}
