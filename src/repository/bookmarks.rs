use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::app::{NewsError, Result};
use crate::domain::{Article, BookmarkedArticle};
use crate::store::{BookmarkStore, ChangeTracking, Subscription, Table};

pub type BookmarkListener = Arc<dyn Fn(&[BookmarkedArticle]) + Send + Sync>;

pub struct BookmarkRepository<S> {
    store: Arc<S>,
}

impl<S> BookmarkRepository<S>
where
    S: BookmarkStore + ChangeTracking + Send + Sync + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Saves the article, or removes it if already saved. Returns whether
    /// the article is bookmarked afterwards.
    pub fn toggle(&self, article: &Article) -> Result<bool> {
        let bookmark = BookmarkedArticle::from_article(article, Utc::now()).ok_or_else(|| {
            NewsError::InvalidArticle(format!(
                "'{}' has no URL to bookmark",
                article.display_title()
            ))
        })?;
        self.store.toggle_bookmark(&bookmark)
    }

    pub fn remove(&self, url: &str) -> Result<bool> {
        self.store.delete_bookmark(url)
    }

    /// Newest first.
    pub fn list_all(&self) -> Result<Vec<BookmarkedArticle>> {
        self.store.all_bookmarks()
    }

    pub fn is_bookmarked(&self, url: &str) -> Result<bool> {
        self.store.is_bookmarked(url)
    }

    /// Calls `listener` with the current bookmarks now and after every change.
    pub fn observe(&self, listener: BookmarkListener) -> Result<Subscription> {
        listener(&self.store.all_bookmarks()?);

        let store = Arc::clone(&self.store);
        Ok(self.store.subscribe(
            &[Table::Bookmarks],
            Arc::new(move |_| match store.all_bookmarks() {
                Ok(bookmarks) => listener(&bookmarks),
                Err(e) => warn!("Failed to reload bookmarks: {}", e),
            }),
        ))
    }
}
