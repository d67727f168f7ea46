pub mod observer;
pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::{BookmarkedArticle, CachedArticle, FeedKey, PageKey};

pub use observer::{ChangeCallback, InvalidationTracker, Subscription, Table};
pub use sqlite::SqliteStore;

/// One remote page to reconcile into the cache.
///
/// Applied atomically: the optional partition wipe, the article rows and
/// their page keys commit together or not at all.
#[derive(Debug, Clone)]
pub struct PageWrite {
    pub partition: String,
    /// Delete the partition's rows and keys before inserting (refresh).
    pub replace_partition: bool,
    pub page: u32,
    pub prev_key: Option<u32>,
    pub next_key: Option<u32>,
    pub articles: Vec<CachedArticle>,
}

impl PageWrite {
    pub fn page_keys(&self) -> Vec<PageKey> {
        self.articles
            .iter()
            .enumerate()
            .map(|(position, article)| PageKey {
                article_url: article.url.clone(),
                prev_key: self.prev_key,
                next_key: self.next_key,
                category: self.partition.clone(),
                page: self.page,
                position: position as u32,
            })
            .collect()
    }
}

pub trait ArticleCache {
    fn upsert_articles(&self, articles: &[CachedArticle]) -> Result<usize>;
    fn get_article(&self, url: &str) -> Result<Option<CachedArticle>>;
    /// Rows visible for a feed, in display order. `limit == None` returns all.
    fn list_articles(
        &self,
        key: &FeedKey,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<CachedArticle>>;
    /// Case-insensitive substring match over title and description.
    fn search_articles(&self, query: &str) -> Result<Vec<CachedArticle>>;
    fn delete_by_category(&self, category: &str) -> Result<usize>;
    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
    fn clear_all(&self) -> Result<()>;
    fn last_cache_time(&self, category: &str) -> Result<Option<DateTime<Utc>>>;
    fn has_articles(&self, category: &str) -> Result<bool>;
}

pub trait PageKeyStore {
    fn upsert_page_keys(&self, keys: &[PageKey]) -> Result<usize>;
    fn page_key(&self, article_url: &str) -> Result<Option<PageKey>>;
    fn clear_page_keys(&self, category: &str) -> Result<usize>;
}

pub trait ChangeTracking {
    fn subscribe(&self, tables: &[Table], callback: ChangeCallback) -> Subscription;
}

/// Store contract the paging pipeline runs against.
pub trait PagingStore: ArticleCache + PageKeyStore + ChangeTracking + Send + Sync {
    /// Returns the number of article rows written.
    fn apply_page(&self, write: &PageWrite) -> Result<usize>;
}

pub trait BookmarkStore {
    fn insert_bookmark(&self, bookmark: &BookmarkedArticle) -> Result<()>;
    fn delete_bookmark(&self, url: &str) -> Result<bool>;
    fn is_bookmarked(&self, url: &str) -> Result<bool>;
    /// Newest first.
    fn all_bookmarks(&self) -> Result<Vec<BookmarkedArticle>>;
    /// Inserts when absent, removes when present. Returns the new state.
    fn toggle_bookmark(&self, bookmark: &BookmarkedArticle) -> Result<bool>;
}

pub trait PreferenceStore {
    fn get_preference(&self, namespace: &str, key: &str) -> Result<Option<String>>;
    fn set_preference(&self, namespace: &str, key: &str, value: &str) -> Result<()>;
}
