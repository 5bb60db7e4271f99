use crate::assistant::DigestSource;
use explorer_core::{Category, DigestWindow};
use std::fmt::Write;

pub const SUMMARIZE_SYSTEM: &str = "You are an expert content summarizer. Your task is to create a concise but informative summary of Reddit posts.
The summary should capture the key points and context while being brief.

Rules:
1. Keep summaries between 2-4 sentences
2. Focus on the main topic and key details
3. Include relevant context from the subreddit if applicable
4. Be objective and factual
5. Preserve any important technical details or specifications
6. Output just the summary text with no additional formatting";

const CATEGORIZE_SYSTEM_HEAD: &str = "You are an expert content categorizer for Reddit posts. Your task is to analyze posts and assign them to the most appropriate category based on their content, title, and source subreddit.

Rules:
1. You must choose from the provided categories only
2. Use 'Uncategorized' if no category is a good fit or if you're uncertain
3. Consider the category descriptions when provided
4. Output your choice between XML-like tags, e.g. <category>Technology</category>
5. Choose only ONE category
6. Be consistent with category names - use exact matches only
7. Go step by step through your reasoning and then output your choice between <category></category> tags, always give your reasoning before outputting the category.
";

const SUGGEST_RULE: &str = "8. If you would have preferred to choose a non-existing category, output the category name you would have chosen between <suggested_category></suggested_category> tags as well.
";

const CATEGORIZE_SYSTEM_TAIL: &str = "
Example output: <category>Gaming</category>";

pub const DIGEST_SYSTEM: &str = "You are an assistant that writes short digests of a reader's saved Reddit posts.

Rules:
1. Write one bullet point per post or per group of closely related posts
2. Start every bullet with \"- \" and keep each bullet on a single line
3. End every bullet with the tag of the post it describes, e.g. [post:abc123]
4. Keep each bullet to one or two sentences
5. Be objective and factual
6. Output only the bullet list with no heading or closing remarks";

pub fn summarize_prompt(content: &str) -> String {
    format!(
        "Please create a concise summary of this Reddit post:\n\n{}",
        content
    )
}

pub fn categorize_system(suggest_mode: bool) -> String {
    let mut system = String::from(CATEGORIZE_SYSTEM_HEAD);
    if suggest_mode {
        system.push_str(SUGGEST_RULE);
    }
    system.push_str(CATEGORIZE_SYSTEM_TAIL);
    system
}

pub fn category_list(categories: &[Category]) -> String {
    let mut info = String::from("Available categories:\n");
    for category in categories {
        match category.description.as_deref().filter(|d| !d.is_empty()) {
            Some(description) => {
                let _ = writeln!(info, "- {}: {}", category.name, description);
            }
            None => {
                let _ = writeln!(info, "- {}", category.name);
            }
        }
    }
    info
}

pub fn categorize_prompt(
    categories: &[Category],
    title: &str,
    subreddit: &str,
    summary: &str,
) -> String {
    format!(
        "{}\n\nPost to categorize:\nTitle: {}\nSubreddit: r/{}\nSummary: {}\n\n\nBased on the above information, which category best fits this post? Remember to output your choice between <category></category> tags.",
        category_list(categories),
        title,
        subreddit,
        summary
    )
}

/// One line per post: its tag, subreddit, title and summary.
pub fn digest_prompt(window: DigestWindow, posts: &[DigestSource]) -> String {
    let mut prompt = format!(
        "Here are the posts I saved during {}:\n\n",
        window.description()
    );
    for post in posts {
        let _ = write!(
            prompt,
            "[post:{}] r/{} | {}\nSummary: {}\n\n",
            post.post_id, post.subreddit, post.title, post.summary
        );
    }
    prompt.push_str("Write the digest as a bullet list following the rules.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(name: &str, description: Option<&str>) -> Category {
        Category {
            id: 0,
            name: name.to_string(),
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn category_list_includes_descriptions() {
        let list = category_list(&[
            category("Uncategorized", None),
            category("Rust", Some("Posts about Rust")),
            category("Empty", Some("")),
        ]);
        assert_eq!(
            list,
            "Available categories:\n- Uncategorized\n- Rust: Posts about Rust\n- Empty\n"
        );
    }

    #[test]
    fn suggest_rule_only_in_suggest_mode() {
        assert!(!categorize_system(false).contains("<suggested_category>"));
        let with_suggest = categorize_system(true);
        assert!(with_suggest.contains("8. If you would have preferred"));
        assert!(with_suggest.ends_with("Example output: <category>Gaming</category>"));
    }

    #[test]
    fn categorize_prompt_layout() {
        let prompt = categorize_prompt(&[category("Rust", None)], "Title", "rust", "A summary");
        assert!(prompt.starts_with("Available categories:\n- Rust\n"));
        assert!(prompt.contains("Title: Title\nSubreddit: r/rust\nSummary: A summary"));
        assert!(prompt.ends_with("between <category></category> tags."));
    }

    #[test]
    fn digest_prompt_tags_posts() {
        let prompt = digest_prompt(
            DigestWindow::Day,
            &[DigestSource {
                post_id: "abc".to_string(),
                subreddit: "rust".to_string(),
                title: "Title".to_string(),
                summary: "Summary".to_string(),
            }],
        );
        assert!(prompt.contains("the last 24 hours"));
        assert!(prompt.contains("[post:abc] r/rust | Title\nSummary: Summary"));
    }
}
