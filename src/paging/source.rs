use std::sync::Arc;

use crate::app::Result;
use crate::domain::{CachedArticle, FeedKey};
use crate::paging::PagingSource;
use crate::store::{PagingStore, Subscription, Table};

/// Reads a feed's rows from the article cache in display order.
pub struct CachePagingSource<S> {
    store: Arc<S>,
    key: FeedKey,
}

impl<S: PagingStore> CachePagingSource<S> {
    pub fn new(store: Arc<S>, key: FeedKey) -> Self {
        Self { store, key }
    }

    pub fn key(&self) -> &FeedKey {
        &self.key
    }
}

impl<S: PagingStore> PagingSource for CachePagingSource<S> {
    type Item = CachedArticle;

    fn load(&self, offset: usize, limit: usize) -> Result<Vec<CachedArticle>> {
        self.store.list_articles(&self.key, offset, Some(limit))
    }

    fn is_same_item(&self, a: &CachedArticle, b: &CachedArticle) -> bool {
        a.url == b.url
    }

    fn register_invalidation(&self, callback: Arc<dyn Fn() + Send + Sync>) -> Subscription {
        self.store.subscribe(
            &[Table::CachedArticles, Table::PageKeys],
            Arc::new(move |_| callback()),
        )
    }
}
