use crate::api::{RedditCommentData, RedditListing, RedditPostData};
use explorer_core::{format_timestamp, RedditApiError, RedditPost};
use serde_json::Value;
use std::fmt::Write;

const REDDIT_WEB_BASE: &str = "https://www.reddit.com";
const DELETED_AUTHOR: &str = "[deleted]";

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub created_utc: i64,
    pub replies: Vec<Comment>,
}

impl Comment {
    fn count(&self) -> usize {
        1 + self.replies.iter().map(Comment::count).sum::<usize>()
    }
}

/// A post together with its comment tree, as served by the comments endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDetails {
    pub post: RedditPost,
    pub comments: Vec<Comment>,
}

impl PostDetails {
    /// Builds details from the two-listing array the comments endpoint returns.
    pub fn from_listings(
        post_id: &str,
        listings: Vec<RedditListing<Value>>,
    ) -> Result<Self, RedditApiError> {
        let mut listings = listings.into_iter();
        let post_listing = listings.next().ok_or_else(|| RedditApiError::InvalidResponse {
            details: "comments response is empty".to_string(),
        })?;

        let post_child = post_listing
            .data
            .children
            .into_iter()
            .next()
            .ok_or_else(|| RedditApiError::PostNotFound {
                post_id: post_id.to_string(),
            })?;
        let post_data: RedditPostData =
            serde_json::from_value(post_child.data).map_err(|e| {
                RedditApiError::InvalidResponse {
                    details: format!("post {} has unexpected shape: {}", post_id, e),
                }
            })?;

        let comments = listings
            .next()
            .map(|listing| parse_comments(listing.data.children))
            .unwrap_or_default();

        Ok(Self {
            post: post_data.into(),
            comments,
        })
    }

    /// Number of comments that appear in the rendered markdown.
    pub fn comment_count(&self) -> usize {
        self.comments.iter().map(Comment::count).sum()
    }

    pub fn to_markdown(&self) -> String {
        let post = &self.post;
        let mut markdown = String::new();

        let _ = write!(markdown, "# {}\n\n", post.title);
        let _ = write!(
            markdown,
            "**Posted by u/{} on {}**\n\n",
            post.author.as_deref().unwrap_or(DELETED_AUTHOR),
            format_timestamp(post.created_utc)
        );

        if !post.selftext.is_empty() {
            let _ = write!(markdown, "{}\n\n", post.selftext);
        }

        if let Some(url) = post.url.as_deref().filter(|u| !u.is_empty()) {
            let self_link = format!(
                "{}{}",
                REDDIT_WEB_BASE,
                post.permalink.as_deref().unwrap_or_default()
            );
            if url != self_link {
                let _ = write!(markdown, "[Link]({})\n\n", url);
            }
        }

        markdown.push_str("---\n\n");
        markdown.push_str("## Comments\n\n");

        for comment in &self.comments {
            render_comment(&mut markdown, comment, 0);
        }

        markdown
    }
}

fn render_comment(out: &mut String, comment: &Comment, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = write!(
        out,
        "{indent}**u/{}** on {}\n\n",
        comment.author,
        format_timestamp(comment.created_utc)
    );
    let _ = write!(out, "{indent}{}\n\n", comment.body);

    for reply in &comment.replies {
        render_comment(out, reply, depth + 1);
    }
}

/// Keeps `t1` children with a body; "more" stubs and removed comments are dropped.
fn parse_comments(children: Vec<crate::api::RedditListingChild<Value>>) -> Vec<Comment> {
    children
        .into_iter()
        .filter(|child| child.kind == "t1")
        .filter_map(|child| serde_json::from_value::<RedditCommentData>(child.data).ok())
        .filter_map(|data| {
            let body = data.body?;
            let replies = match data.replies {
                Value::Object(_) => serde_json::from_value::<RedditListing<Value>>(data.replies)
                    .map(|listing| parse_comments(listing.data.children))
                    .unwrap_or_default(),
                _ => Vec::new(),
            };
            Some(Comment {
                author: data.author.unwrap_or_else(|| DELETED_AUTHOR.to_string()),
                body,
                created_utc: data.created_utc as i64,
                replies,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listings(value: Value) -> Vec<RedditListing<Value>> {
        serde_json::from_value(value).unwrap()
    }

    fn sample() -> Value {
        json!([
            {
                "kind": "Listing",
                "data": {
                    "children": [{
                        "kind": "t3",
                        "data": {
                            "id": "abc",
                            "title": "Hello",
                            "selftext": "Body text",
                            "author": "alice",
                            "subreddit": "rust",
                            "url": "https://example.com/article",
                            "permalink": "/r/rust/comments/abc/hello/",
                            "created_utc": 0.0,
                            "num_comments": 3
                        }
                    }],
                    "after": null
                }
            },
            {
                "kind": "Listing",
                "data": {
                    "children": [
                        {
                            "kind": "t1",
                            "data": {
                                "author": "bob",
                                "body": "First!",
                                "created_utc": 60.0,
                                "replies": {
                                    "kind": "Listing",
                                    "data": {
                                        "children": [{
                                            "kind": "t1",
                                            "data": {
                                                "author": "carol",
                                                "body": "Reply",
                                                "created_utc": 120.0,
                                                "replies": ""
                                            }
                                        }]
                                    }
                                }
                            }
                        },
                        {
                            "kind": "t1",
                            "data": { "author": "dave", "created_utc": 90.0, "replies": "" }
                        },
                        { "kind": "more", "data": { "count": 4, "children": ["x"] } }
                    ]
                }
            }
        ])
    }

    #[test]
    fn renders_post_and_nested_comments() {
        let details = PostDetails::from_listings("abc", listings(sample())).unwrap();

        let expected = "# Hello\n\n\
            **Posted by u/alice on 1970-01-01 00:00:00**\n\n\
            Body text\n\n\
            [Link](https://example.com/article)\n\n\
            ---\n\n\
            ## Comments\n\n\
            **u/bob** on 1970-01-01 00:01:00\n\n\
            First!\n\n  \
            **u/carol** on 1970-01-01 00:02:00\n\n  \
            Reply\n\n";

        assert_eq!(details.to_markdown(), expected);
        assert_eq!(details.comment_count(), 2);
        assert_eq!(details.post.id, "abc");
    }

    #[test]
    fn omits_link_to_self_post() {
        let value = json!([
            {
                "kind": "Listing",
                "data": {
                    "children": [{
                        "kind": "t3",
                        "data": {
                            "id": "s1",
                            "title": "Self post",
                            "subreddit": "rust",
                            "url": "https://www.reddit.com/r/rust/comments/s1/self_post/",
                            "permalink": "/r/rust/comments/s1/self_post/",
                            "created_utc": 0
                        }
                    }]
                }
            },
            { "kind": "Listing", "data": { "children": [] } }
        ]);

        let markdown = PostDetails::from_listings("s1", listings(value))
            .unwrap()
            .to_markdown();
        assert!(!markdown.contains("[Link]"));
        assert!(markdown.contains("**Posted by u/[deleted] on"));
        assert!(markdown.ends_with("## Comments\n\n"));
    }

    #[test]
    fn empty_post_listing_is_not_found() {
        let value = json!([{ "kind": "Listing", "data": { "children": [] } }]);
        let err = PostDetails::from_listings("gone", listings(value)).unwrap_err();
        assert!(matches!(err, RedditApiError::PostNotFound { .. }));
    }
}
