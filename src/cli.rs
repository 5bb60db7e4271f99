use clap::{Parser, Subcommand};
use explorer_core::DigestWindow;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reddit-explorer")]
#[command(version)]
#[command(about = "Follow subreddits, save and organize posts, and summarize them with an LLM")]
#[command(after_help = "EXAMPLES:\n    \
    reddit-explorer subreddit add rust\n    \
    reddit-explorer browse rust --count 20\n    \
    reddit-explorer save rust 1abcde\n    \
    reddit-explorer categorize Uncategorized\n    \
    reddit-explorer digest 24h --refresh")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to reddit_explorer.toml
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage followed subreddits
    Subreddit {
        #[command(subcommand)]
        action: SubredditAction,
    },

    /// List a subreddit's newest posts, back to the last saved one
    Browse {
        subreddit: String,
        /// Show exactly this many of the newest posts instead
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Save a post
    Save {
        subreddit: String,
        #[arg(value_name = "POST_ID")]
        post_id: String,
    },

    /// Remove a saved post
    Unsave {
        #[arg(value_name = "POST_ID")]
        post_id: String,
    },

    /// Hide a saved post from its category
    Hide {
        #[arg(value_name = "POST_ID")]
        post_id: String,
    },

    /// Show a hidden post in its category again
    Show {
        #[arg(value_name = "POST_ID")]
        post_id: String,
    },

    /// Mark a saved post as read
    Read {
        #[arg(value_name = "POST_ID")]
        post_id: String,
        /// Mark as unread instead
        #[arg(long)]
        unread: bool,
    },

    /// Move a saved post to another category
    Move {
        #[arg(value_name = "POST_ID")]
        post_id: String,
        category: String,
    },

    /// Manage categories
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },

    /// List the visible posts in a category
    Posts { category: String },

    /// Print a saved post with its comments
    View {
        #[arg(value_name = "POST_ID")]
        post_id: String,
    },

    /// Download content for every post in a category that lacks it
    Download { category: String },

    /// Let the AI assistant re-file the posts of a category
    Categorize { category: String },

    /// Summarize a saved post
    Summarize {
        #[arg(value_name = "POST_ID")]
        post_id: String,
    },

    /// Digest of posts saved in the last 24 hours or 3 days
    Digest {
        #[arg(value_name = "WINDOW", value_parser = parse_window)]
        window: DigestWindow,
        /// Rebuild instead of showing the stored digest
        #[arg(long)]
        refresh: bool,
    },

    /// Search saved posts by title, content and summary
    Search {
        term: String,
        /// Leave out hidden posts
        #[arg(long)]
        visible_only: bool,
    },

    /// Import posts from a file with one Reddit link per line
    Import {
        file: PathBuf,
        /// Only look at the first N lines
        #[arg(long, value_name = "N")]
        max: Option<usize>,
    },

    /// Download and cache the image a saved post links to
    Image {
        #[arg(value_name = "POST_ID")]
        post_id: String,
    },

    /// Poll followed subreddits for new posts until ctrl-c
    Watch {
        /// Minutes between polls
        #[arg(short, long, value_name = "MINUTES")]
        interval: Option<u64>,
    },

    /// Show database and API statistics
    Stats,
}

#[derive(Subcommand)]
pub enum SubredditAction {
    /// Follow a subreddit
    Add { name: String },
    /// Stop following a subreddit
    Remove {
        name: String,
        /// Also delete its saved posts
        #[arg(long)]
        purge: bool,
    },
    /// Rename a subreddit
    Rename { old: String, new: String },
    /// List followed subreddits
    List,
}

#[derive(Subcommand)]
pub enum CategoryAction {
    /// Create a category
    Add { name: String },
    /// Rename a category and move its posts along
    Rename { old: String, new: String },
    /// Delete a category, moving its posts to Uncategorized
    Remove { name: String },
    /// Set the description the categorizer sees; empty clears it
    Describe { name: String, description: String },
    /// Move every post of a category to Uncategorized
    Clear { name: String },
    /// List categories with their visible post counts
    List,
}

fn parse_window(raw: &str) -> Result<DigestWindow, String> {
    raw.parse::<DigestWindow>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_digest_window() {
        let cli = Cli::parse_from(["reddit-explorer", "digest", "3d", "--refresh"]);
        match cli.command {
            Command::Digest { window, refresh } => {
                assert_eq!(window, DigestWindow::ThreeDays);
                assert!(refresh);
            }
            _ => panic!("expected digest command"),
        }
        assert!(Cli::try_parse_from(["reddit-explorer", "digest", "week"]).is_err());
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "reddit-explorer",
            "subreddit",
            "remove",
            "rust",
            "--purge",
            "--verbose",
            "--config",
            "custom.toml",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(
            cli.command,
            Command::Subreddit {
                action: SubredditAction::Remove { purge: true, .. }
            }
        ));
    }
}
