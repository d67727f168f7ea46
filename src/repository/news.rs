use std::sync::Arc;

use chrono::Utc;
use futures::{Stream, TryStreamExt};
use tracing::{debug, info, warn};

use crate::app::{NewsError, Result};
use crate::domain::{Article, CachePolicy, FeedKey, DEFAULT_CATEGORY};
use crate::fetcher::{NewsSource, PageRequest};
use crate::normalizer::Normalizer;
use crate::paging::{
    CachePagingSource, NewsRemoteMediator, Page, Pager, PagingConfig, SessionRegistry,
    STARTING_PAGE_INDEX,
};
use crate::store::{PageWrite, PagingStore};

pub type NewsPager<S> = Pager<CachePagingSource<S>, NewsRemoteMediator<S>>;

/// Entry point for headlines: paged sessions and a one-shot fetch with
/// cache fallback.
pub struct NewsRepository<S> {
    source: Arc<dyn NewsSource>,
    store: Arc<S>,
    normalizer: Normalizer,
    policy: CachePolicy,
    paging: PagingConfig,
    sessions: Arc<SessionRegistry>,
}

impl<S: PagingStore + 'static> NewsRepository<S> {
    pub fn new(
        source: Arc<dyn NewsSource>,
        store: Arc<S>,
        policy: CachePolicy,
        paging: PagingConfig,
    ) -> Self {
        Self {
            source,
            store,
            normalizer: Normalizer::new(),
            policy,
            paging,
            sessions: SessionRegistry::new(),
        }
    }

    /// Opens a new paging session. Any earlier session for the same
    /// category or query is superseded and can no longer write.
    pub fn pager(&self, category: &str, query: Option<&str>) -> NewsPager<S> {
        let key = FeedKey::new(category, query);
        let session = self.sessions.begin(&key);
        let mediator = NewsRemoteMediator::new(
            key.clone(),
            Arc::clone(&self.source),
            Arc::clone(&self.store),
            self.policy,
            self.paging.page_size,
            session,
        );

        Pager::new(
            CachePagingSource::new(Arc::clone(&self.store), key),
            mediator,
            self.paging,
        )
    }

    pub fn get_paged_news(
        &self,
        category: &str,
        query: Option<&str>,
    ) -> impl Stream<Item = Result<Page<Article>>> {
        self.pager(category, query)
            .into_stream()
            .map_ok(|page| page.map(Article::from))
    }

    /// Fetches the first page of a feed, falling back to whatever is cached.
    ///
    /// A fresh cache is served without a request unless `force_refresh` is
    /// set. Fails only when neither the network nor the cache has articles.
    pub async fn get_top_headlines(
        &self,
        category: Option<&str>,
        query: Option<&str>,
        force_refresh: bool,
    ) -> Result<Vec<Article>> {
        let key = FeedKey::new(category.unwrap_or(DEFAULT_CATEGORY), query);
        let partition = key.partition();

        if !force_refresh
            && self
                .policy
                .is_fresh(self.store.last_cache_time(&partition)?, Utc::now())
        {
            let cached = self.cached_articles(&key)?;
            if !cached.is_empty() {
                debug!("Serving {} cached articles for {}", cached.len(), key);
                return Ok(cached);
            }
        }

        let request = PageRequest::for_key(&key, STARTING_PAGE_INDEX, self.paging.page_size);
        let failure = match self.source.fetch_page(&request).await {
            Ok(response) if !response.articles.is_empty() => {
                self.write_through(&partition, &response.articles);
                return Ok(response.articles);
            }
            Ok(_) => match key.query() {
                Some(query) => format!("No articles found for '{}'", query),
                None => "No articles found".to_string(),
            },
            Err(e) if e.is_transport() => {
                warn!("Network unavailable for {}: {}", key, e);
                "No internet connection and no cached data available".to_string()
            }
            Err(e) => {
                warn!("Fetching {} failed: {}", key, e);
                format!("Failed to load news: {}", e)
            }
        };

        let cached = self.cached_articles(&key)?;
        if cached.is_empty() {
            return Err(NewsError::Unavailable(failure));
        }

        info!("Falling back to {} cached articles for {}", cached.len(), key);
        Ok(cached)
    }

    /// Removes every cached article and page key. Bookmarks are kept.
    pub fn clear_cache(&self) -> Result<()> {
        self.store.clear_all()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn cached_articles(&self, key: &FeedKey) -> Result<Vec<Article>> {
        Ok(self
            .store
            .list_articles(key, 0, None)?
            .into_iter()
            .map(Article::from)
            .collect())
    }

    /// A failed cache write never fails the fetch that produced it.
    fn write_through(&self, partition: &str, articles: &[Article]) {
        let now = Utc::now();
        let write = PageWrite {
            partition: partition.to_string(),
            replace_partition: true,
            page: STARTING_PAGE_INDEX,
            prev_key: None,
            next_key: Some(STARTING_PAGE_INDEX + 1),
            articles: self.normalizer.to_cached(articles, partition, now),
        };

        if let Err(e) = self.store.apply_page(&write) {
            warn!("Failed to cache articles for {}: {}", partition, e);
            return;
        }

        if let Err(e) = self
            .store
            .delete_older_than(self.policy.retention_cutoff(now))
        {
            warn!("Age sweep failed: {}", e);
        }
    }
}
