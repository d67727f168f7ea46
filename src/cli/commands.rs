use crate::app::{AppContext, NewsError, Result};
use crate::cli::FeedArgs;
use crate::domain::Article;
use crate::paging::LoadState;
use crate::store::ArticleCache;

pub async fn headlines(ctx: &AppContext, feed: &FeedArgs, refresh: bool) -> Result<()> {
    let articles = ctx
        .news
        .get_top_headlines(Some(&feed.category), feed.query.as_deref(), refresh)
        .await?;

    for article in &articles {
        print_article(ctx, article)?;
    }
    println!("{} articles", articles.len());
    Ok(())
}

pub async fn browse(ctx: &AppContext, feed: &FeedArgs, pages: usize) -> Result<()> {
    let mut pager = ctx.news.pager(&feed.category, feed.query.as_deref());
    let mut shown = 0;
    let mut interrupted = false;

    while shown < pages {
        let page = match pager.next_page().await {
            Ok(Some(page)) => page,
            Ok(None) => break,
            Err(e) if e.is_recoverable() => {
                eprintln!("Could not load more from the network: {}", e);
                interrupted = true;
                break;
            }
            Err(e) => return Err(e),
        };
        shown += 1;

        println!("--- Page {} ---", shown);
        for article in page.items.into_iter().map(Article::from) {
            print_article(ctx, &article)?;
        }
    }

    let states = pager.load_states();
    if let LoadState::Error(detail) = &states.refresh {
        if shown > 0 {
            eprintln!("Could not refresh from the network: {}", detail);
        }
    }
    if shown == 0 && !interrupted {
        println!("No articles available");
    } else if states.append.end_of_pagination_reached() {
        println!("End of feed");
    }
    Ok(())
}

pub fn toggle_bookmark(ctx: &AppContext, url: &str) -> Result<()> {
    let bookmarked = match ctx.store.get_article(url)? {
        Some(cached) => ctx.bookmarks.toggle(&cached.to_article())?,
        None if ctx.bookmarks.is_bookmarked(url)? => !ctx.bookmarks.remove(url)?,
        None => {
            return Err(NewsError::InvalidArticle(format!(
                "{} is not in the cache",
                url
            )))
        }
    };

    if bookmarked {
        println!("Bookmarked: {}", url);
    } else {
        println!("Removed bookmark: {}", url);
    }
    Ok(())
}

pub fn list_bookmarks(ctx: &AppContext) -> Result<()> {
    let bookmarks = ctx.bookmarks.list_all()?;

    if bookmarks.is_empty() {
        println!("No bookmarks");
        return Ok(());
    }

    for bookmark in bookmarks {
        let title = bookmark.title.as_deref().unwrap_or("(Untitled)");
        println!(
            "{} - {} ({})",
            bookmark.bookmarked_at.format("%Y-%m-%d %H:%M"),
            title,
            bookmark.url
        );
    }
    Ok(())
}

pub fn remove_bookmark(ctx: &AppContext, url: &str) -> Result<()> {
    if ctx.bookmarks.remove(url)? {
        println!("Removed bookmark: {}", url);
    } else {
        println!("Not bookmarked: {}", url);
    }
    Ok(())
}

pub async fn summarize(ctx: &AppContext, url: &str) -> Result<()> {
    let summarizer = ctx.summarizer()?;

    let article = match ctx.store.get_article(url)? {
        Some(cached) => cached.to_article(),
        None => ctx
            .bookmarks
            .list_all()?
            .into_iter()
            .find(|b| b.url == url)
            .map(|b| b.to_article())
            .ok_or_else(|| NewsError::InvalidArticle(format!("{} is not cached or bookmarked", url)))?,
    };

    let summary = summarizer
        .summarize(
            article.display_title(),
            article.description.as_deref(),
            article.content.as_deref(),
        )
        .await?;

    println!("{}", article.display_title());
    println!();
    println!("{}", summary);
    Ok(())
}

pub fn theme(ctx: &AppContext, dark: bool, light: bool, toggle: bool) -> Result<()> {
    let dark_mode = if toggle {
        ctx.theme.toggle()?
    } else if dark || light {
        ctx.theme.set_dark_mode(dark)?;
        dark
    } else {
        ctx.theme.is_dark_mode()?
    };

    println!("Theme: {}", if dark_mode { "dark" } else { "light" });
    Ok(())
}

pub fn clear_cache(ctx: &AppContext) -> Result<()> {
    ctx.news.clear_cache()?;
    println!("Cache cleared");
    Ok(())
}

fn print_article(ctx: &AppContext, article: &Article) -> Result<()> {
    let marker = match article.url.as_deref() {
        Some(url) if ctx.bookmarks.is_bookmarked(url)? => "*",
        _ => " ",
    };

    println!("{} {}", marker, article.display_title());
    if let Some(source) = article.source_name() {
        println!("    {}", source);
    }
    if let Some(url) = &article.url {
        println!("    {}", url);
    }
    Ok(())
}
