use database::DatabaseStats;
use explorer_core::{
    format_timestamp, BrowsedPost, CategorizeReport, Category, CategoryCount, Digest,
    ImportReport, SavedPost, Subreddit,
};
use reddit_client::{ApiMetrics, RateLimitStatus};

pub fn subreddits(list: &[Subreddit]) {
    if list.is_empty() {
        println!("No subreddits followed yet.");
        return;
    }
    for subreddit in list {
        println!("r/{}", subreddit.name);
    }
}

pub fn browsed(subreddit: &str, posts: &[BrowsedPost]) {
    if posts.is_empty() {
        println!("No new posts in r/{}.", subreddit);
        return;
    }
    for entry in posts {
        let marker = if entry.saved { "*" } else { " " };
        println!(
            "{} {:<8} {}  {} ({} comments)",
            marker,
            entry.post.id,
            format_timestamp(entry.post.created_utc),
            entry.post.title,
            entry.post.num_comments
        );
    }
}

pub fn saved_posts(posts: &[SavedPost]) {
    if posts.is_empty() {
        println!("No posts.");
        return;
    }
    for post in posts {
        let mut flags = String::new();
        if !post.is_read {
            flags.push('N');
        }
        if !post.show_in_categories {
            flags.push('H');
        }
        if post.has_content() {
            flags.push('C');
        }
        if post.summary.is_some() {
            flags.push('S');
        }
        println!(
            "{:<8} [{:<4}] r/{} | {} | {}",
            post.reddit_id,
            flags,
            post.subreddit,
            post.category,
            post.title
        );
    }
}

pub fn post(post: &SavedPost, content: &str) {
    println!(
        "r/{} | {} | saved {}",
        post.subreddit,
        post.category,
        format_timestamp(post.saved_at)
    );
    if let Some(summary) = &post.summary {
        println!("Summary: {}", summary);
    }
    println!();
    println!("{}", content);
}

pub fn categories(list: &[Category], counts: &[CategoryCount]) {
    for category in list {
        let count = counts
            .iter()
            .find(|c| c.name == category.name)
            .map_or(0, |c| c.count);
        match category.description.as_deref() {
            Some(description) => println!("{} ({}): {}", category.name, count, description),
            None => println!("{} ({})", category.name, count),
        }
    }
}

pub fn categorize_report(category: &str, report: &CategorizeReport) {
    println!(
        "'{}': downloaded {}, categorized {}, moved {}",
        category, report.downloaded, report.processed, report.moved
    );
}

pub fn digest(digest: &Digest) {
    println!(
        "Digest for {} (generated {})",
        digest.window.description(),
        format_timestamp(digest.generated_at)
    );
    if digest.items.is_empty() {
        println!("Nothing was saved in this window.");
        return;
    }
    for item in &digest.items {
        match &item.post_id {
            Some(id) => println!("- {} [{}]", item.text, id),
            None => println!("- {}", item.text),
        }
    }
}

pub fn import_report(report: &ImportReport) {
    println!(
        "Processed {} lines: {} imported, {} already saved, {} errors",
        report.processed,
        report.imported,
        report.skipped,
        report.errors.len()
    );
    for error in &report.errors {
        println!("  {}", error);
    }
}

pub fn stats(stats: &DatabaseStats, metrics: &ApiMetrics, rate_limit: &RateLimitStatus) {
    println!("Subreddits:          {}", stats.subreddits);
    println!("Categories:          {}", stats.categories);
    println!("Saved posts:         {}", stats.saved_posts);
    println!("  unread:            {}", stats.unread_posts);
    println!("  hidden:            {}", stats.hidden_posts);
    println!("  with content:      {}", stats.posts_with_content);
    println!("  with summary:      {}", stats.posts_with_summary);
    println!("Cached images:       {}", stats.cached_images);
    println!(
        "Reddit requests:     {} ({:.0}% ok, avg {:?})",
        metrics.total_requests,
        metrics.success_rate() * 100.0,
        metrics.average_response_time()
    );
    println!(
        "Rate limit:          {}/{} tokens, {} req/min",
        rate_limit.available_tokens, rate_limit.max_tokens, rate_limit.requests_per_minute
    );
}
