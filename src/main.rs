use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newsbite::app::AppContext;
use newsbite::cli::{commands, Cli, Commands};
use newsbite::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let ctx = AppContext::new(&config, cli.db)?;

    match cli.command {
        Commands::Headlines { feed, refresh } => {
            commands::headlines(&ctx, &feed, refresh).await?;
        }
        Commands::Browse { feed, pages } => {
            commands::browse(&ctx, &feed, pages).await?;
        }
        Commands::Bookmark { url } => {
            commands::toggle_bookmark(&ctx, &url)?;
        }
        Commands::Bookmarks => {
            commands::list_bookmarks(&ctx)?;
        }
        Commands::Unbookmark { url } => {
            commands::remove_bookmark(&ctx, &url)?;
        }
        Commands::Summarize { url } => {
            commands::summarize(&ctx, &url).await?;
        }
        Commands::Theme {
            dark,
            light,
            toggle,
        } => {
            commands::theme(&ctx, dark, light, toggle)?;
        }
        Commands::ClearCache => {
            commands::clear_cache(&ctx)?;
        }
    }

    Ok(())
}
