pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::DEFAULT_CATEGORY;

#[derive(Parser)]
#[command(name = "newsbite")]
#[command(about = "An offline-first news reader", long_about = None)]
pub struct Cli {
    /// Path to the SQLite database (defaults to the data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct FeedArgs {
    /// News category, e.g. technology, sports, business
    #[arg(short, long, default_value = DEFAULT_CATEGORY)]
    pub category: String,

    /// Search for a keyword instead of browsing the category
    #[arg(short, long)]
    pub query: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show top headlines, falling back to the cache when offline
    Headlines {
        #[command(flatten)]
        feed: FeedArgs,

        /// Ignore a fresh cache and always ask the network
        #[arg(short, long)]
        refresh: bool,
    },
    /// Page through a feed
    Browse {
        #[command(flatten)]
        feed: FeedArgs,

        /// Number of pages to show
        #[arg(short, long, default_value_t = 3)]
        pages: usize,
    },
    /// Toggle the bookmark on a cached article
    Bookmark {
        /// URL of the article
        url: String,
    },
    /// List bookmarks, newest first
    Bookmarks,
    /// Remove a bookmark
    Unbookmark {
        /// URL of the bookmarked article
        url: String,
    },
    /// Summarize a cached or bookmarked article
    Summarize {
        /// URL of the article
        url: String,
    },
    /// Show or change the theme preference
    Theme {
        #[arg(long, conflicts_with_all = ["light", "toggle"])]
        dark: bool,

        #[arg(long, conflicts_with = "toggle")]
        light: bool,

        #[arg(long)]
        toggle: bool,
    },
    /// Remove all cached articles (bookmarks are kept)
    ClearCache,
}
