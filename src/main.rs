mod cli;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{CategoryAction, Cli, Command, SubredditAction};
use explorer_core::{AppConfig, CoreError, ErrorExt, ErrorReporter, DEFAULT_CATEGORY};
use explorer_service::{Explorer, Watcher};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    let filter = if cli.verbose {
        "reddit_explorer=debug,explorer_service=debug,database=debug,reddit_client=debug,llm_interface=debug,explorer_core=debug"
    } else {
        "reddit_explorer=info,explorer_service=info,database=warn,reddit_client=warn,llm_interface=warn,explorer_core=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<CoreError>() {
                Some(core) => {
                    ErrorReporter::new()
                        .with_error_reporting(verbose)
                        .report_error(core);
                    eprintln!("Error: {} [{}]", core.user_friendly_message(), core.error_code());
                    tracing::debug!("{:#}", err);
                }
                None => eprintln!("Error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    tracing::debug!("Using data directory {}", config.data_dir().display());

    let explorer = Explorer::from_config(config).await?;
    let result = dispatch(&explorer, cli.command).await;
    explorer.db().close().await;
    result
}

async fn dispatch(explorer: &Explorer, command: Command) -> Result<()> {
    let db = explorer.db();

    match command {
        Command::Subreddit { action } => match action {
            SubredditAction::Add { name } => {
                let name = database::normalize_subreddit_name(&name)?;
                if db.add_subreddit(&name).await? {
                    println!("Following r/{}", name);
                } else {
                    println!("Already following r/{}", name);
                }
            }
            SubredditAction::Remove { name, purge } => {
                let deleted = db.remove_subreddit(&name, purge).await?;
                println!("Removed r/{} ({} saved posts deleted)", name, deleted);
            }
            SubredditAction::Rename { old, new } => {
                db.rename_subreddit(&old, &new).await?;
                println!("Renamed r/{} to r/{}", old, new);
            }
            SubredditAction::List => output::subreddits(&db.list_subreddits().await?),
        },

        Command::Browse { subreddit, count } => {
            let posts = explorer.browse(&subreddit, count).await?;
            output::browsed(&subreddit, &posts);
        }

        Command::Save { subreddit, post_id } => {
            if explorer.save(&subreddit, &post_id).await? {
                println!("Saved {}", post_id);
            } else {
                println!("{} is already saved", post_id);
            }
        }

        Command::Unsave { post_id } => {
            if explorer.unsave(&post_id).await? {
                println!("Removed {}", post_id);
            } else {
                println!("{} was not saved", post_id);
            }
        }

        Command::Hide { post_id } => {
            explorer.set_visibility(&post_id, false).await?;
            println!("Hid {}", post_id);
        }

        Command::Show { post_id } => {
            explorer.set_visibility(&post_id, true).await?;
            println!("{} is visible again", post_id);
        }

        Command::Read { post_id, unread } => {
            explorer.mark_read(&post_id, !unread).await?;
            println!(
                "Marked {} as {}",
                post_id,
                if unread { "unread" } else { "read" }
            );
        }

        Command::Move { post_id, category } => {
            explorer.move_to_category(&post_id, &category).await?;
            println!("Moved {} to '{}'", post_id, category.trim());
        }

        Command::Category { action } => match action {
            CategoryAction::Add { name } => {
                if db.add_category(&name).await? {
                    println!("Created category '{}'", name.trim());
                } else {
                    println!("Category '{}' already exists", name.trim());
                }
            }
            CategoryAction::Rename { old, new } => {
                let moved = db.rename_category(&old, &new).await?;
                println!("Renamed '{}' to '{}' ({} posts)", old, new, moved);
            }
            CategoryAction::Remove { name } => {
                let moved = db.remove_category(&name).await?;
                println!(
                    "Removed '{}', {} posts moved to {}",
                    name, moved, DEFAULT_CATEGORY
                );
            }
            CategoryAction::Describe { name, description } => {
                db.set_category_description(&name, &description).await?;
                println!("Updated description of '{}'", name);
            }
            CategoryAction::Clear { name } => {
                let moved = db.uncategorize_posts(&name).await?;
                println!("Moved {} posts from '{}' to {}", moved, name, DEFAULT_CATEGORY);
            }
            CategoryAction::List => {
                let categories = db.list_categories().await?;
                let counts = db.category_counts().await?;
                output::categories(&categories, &counts);
            }
        },

        Command::Posts { category } => output::saved_posts(&db.posts_in_category(&category).await?),

        Command::View { post_id } => {
            let (post, content) = explorer.view(&post_id).await?;
            output::post(&post, &content);
        }

        Command::Download { category } => {
            let downloaded = explorer.download_category(&category).await?;
            println!("Downloaded {} posts in '{}'", downloaded, category);
        }

        Command::Categorize { category } => {
            let report = explorer.auto_categorize(&category).await?;
            output::categorize_report(&category, &report);
        }

        Command::Summarize { post_id } => {
            println!("{}", explorer.summarize_post(&post_id).await?);
        }

        Command::Digest { window, refresh } => {
            output::digest(&explorer.digest(window, refresh).await?);
        }

        Command::Search { term, visible_only } => {
            output::saved_posts(&db.search(&term, visible_only).await?);
        }

        Command::Import { file, max } => {
            let report = explorer
                .importer()
                .import_file(&file, max)
                .await
                .with_context(|| format!("importing links from {}", file.display()))?;
            output::import_report(&report);
        }

        Command::Image { post_id } => match explorer.image_cache().cache_saved_post(&post_id).await? {
            Some(path) => println!("{}", path.display()),
            None => println!("{} does not link an image", post_id),
        },

        Command::Watch { interval } => {
            let minutes = interval.unwrap_or(explorer.config().watch.interval_minutes);
            Watcher::new(explorer, minutes).run().await?;
        }

        Command::Stats => {
            let stats = explorer.stats().await?;
            let metrics = explorer.api_metrics().await;
            let rate_limit = explorer.rate_limit_status().await;
            output::stats(&stats, &metrics, &rate_limit);
        }
    }

    Ok(())
}
