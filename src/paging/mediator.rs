use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::app::{NewsError, Result};
use crate::domain::{CachePolicy, CachedArticle, FeedKey, PageKey};
use crate::fetcher::{NewsSource, PageRequest};
use crate::normalizer::Normalizer;
use crate::paging::{
    InitializeAction, LoadType, MediatorSuccess, PagingState, RemoteMediator, SessionToken,
};
use crate::store::{PageWrite, PagingStore};

pub const STARTING_PAGE_INDEX: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageTarget {
    Fetch(u32),
    EndReached,
}

/// Backfills one feed partition from the news API.
///
/// Instances are bound to a single [`FeedKey`] and session; a new session
/// gets a new mediator.
pub struct NewsRemoteMediator<S> {
    key: FeedKey,
    partition: String,
    source: Arc<dyn NewsSource>,
    store: Arc<S>,
    normalizer: Normalizer,
    policy: CachePolicy,
    page_size: usize,
    session: SessionToken,
}

impl<S: PagingStore> NewsRemoteMediator<S> {
    pub fn new(
        key: FeedKey,
        source: Arc<dyn NewsSource>,
        store: Arc<S>,
        policy: CachePolicy,
        page_size: usize,
        session: SessionToken,
    ) -> Self {
        Self {
            partition: key.partition(),
            key,
            source,
            store,
            normalizer: Normalizer::new(),
            policy,
            page_size,
            session,
        }
    }

    pub fn key(&self) -> &FeedKey {
        &self.key
    }

    pub fn initialize_at(&self, now: DateTime<Utc>) -> Result<InitializeAction> {
        let last = self.store.last_cache_time(&self.partition)?;
        if self.policy.is_fresh(last, now) {
            Ok(InitializeAction::SkipInitialRefresh)
        } else {
            Ok(InitializeAction::LaunchInitialRefresh)
        }
    }

    /// Key of `article`, provided it belongs to this session's partition.
    /// Search listings also carry text matches from other categories.
    fn own_key(&self, article: Option<&CachedArticle>) -> Result<Option<PageKey>> {
        let Some(article) = article.filter(|a| a.category == self.partition) else {
            return Ok(None);
        };
        let key = self.store.page_key(&article.url)?;
        Ok(key.filter(|k| k.category == self.partition))
    }

    fn resolve_page(
        &self,
        load_type: LoadType,
        state: &PagingState<CachedArticle>,
    ) -> Result<PageTarget> {
        let mut own_items = state
            .pages
            .iter()
            .flat_map(|p| p.items.iter())
            .filter(|a| a.category == self.partition);

        let target = match load_type {
            LoadType::Refresh => {
                let anchor = state
                    .anchor_position
                    .and_then(|p| state.closest_item_to_position(p));
                let key = self.own_key(anchor)?;
                PageTarget::Fetch(key.map(|k| k.page).unwrap_or(STARTING_PAGE_INDEX))
            }
            LoadType::Prepend => match self.own_key(own_items.next())?.and_then(|k| k.prev_key) {
                Some(prev) => PageTarget::Fetch(prev),
                None => PageTarget::EndReached,
            },
            LoadType::Append => match self.own_key(own_items.next_back())?.and_then(|k| k.next_key)
            {
                Some(next) => PageTarget::Fetch(next),
                None => PageTarget::EndReached,
            },
        };
        Ok(target)
    }

    fn sweep(&self, now: DateTime<Utc>) {
        match self
            .store
            .delete_older_than(self.policy.retention_cutoff(now))
        {
            Ok(0) => {}
            Ok(n) => debug!("Age sweep removed {} cached articles", n),
            Err(e) => warn!("Age sweep failed: {}", e),
        }
    }
}

#[async_trait]
impl<S: PagingStore + 'static> RemoteMediator for NewsRemoteMediator<S> {
    type Item = CachedArticle;

    async fn initialize(&self) -> Result<InitializeAction> {
        self.initialize_at(Utc::now())
    }

    async fn load(
        &self,
        load_type: LoadType,
        state: &PagingState<CachedArticle>,
    ) -> Result<MediatorSuccess> {
        let page = match self.resolve_page(load_type, state)? {
            PageTarget::Fetch(page) => page,
            PageTarget::EndReached => {
                debug!("{:?} for {}: end of pagination", load_type, self.key);
                return Ok(MediatorSuccess {
                    end_of_pagination_reached: true,
                });
            }
        };

        if !self.session.is_current() {
            return Err(NewsError::SessionSuperseded);
        }

        let request = PageRequest::for_key(&self.key, page, self.page_size);
        let response = self.source.fetch_page(&request).await?;
        let end_of_pagination_reached = response.articles.is_empty();

        let now = Utc::now();
        let write = PageWrite {
            partition: self.partition.clone(),
            replace_partition: load_type == LoadType::Refresh,
            page,
            prev_key: (page != STARTING_PAGE_INDEX).then(|| page - 1),
            next_key: (!end_of_pagination_reached).then(|| page + 1),
            articles: self
                .normalizer
                .to_cached(&response.articles, &self.partition, now),
        };

        if write.replace_partition || !write.articles.is_empty() {
            let written = self.session.commit(|| self.store.apply_page(&write))?;
            info!(
                "{:?} page {} of {}: cached {} articles",
                load_type, page, self.key, written
            );
        }

        if load_type == LoadType::Refresh {
            self.sweep(now);
        }

        Ok(MediatorSuccess {
            end_of_pagination_reached,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::scripted::{sample_articles, ScriptedSource};
    use crate::paging::{Page, PagingConfig, SessionRegistry};
    use crate::store::{ArticleCache, PageKeyStore, SqliteStore};
    use chrono::TimeDelta;
    use tokio_test::assert_err;

    struct Fixture {
        store: Arc<SqliteStore>,
        source: Arc<ScriptedSource>,
        sessions: Arc<SessionRegistry>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: Arc::new(SqliteStore::in_memory().unwrap()),
                source: Arc::new(ScriptedSource::new()),
                sessions: SessionRegistry::new(),
            }
        }

        fn mediator(&self, key: FeedKey) -> NewsRemoteMediator<SqliteStore> {
            let session = self.sessions.begin(&key);
            NewsRemoteMediator::new(
                key,
                Arc::clone(&self.source) as Arc<dyn NewsSource>,
                Arc::clone(&self.store),
                CachePolicy::default(),
                20,
                session,
            )
        }

        fn state(&self, key: &FeedKey, anchor: Option<usize>) -> PagingState<CachedArticle> {
            let items = self.store.list_articles(key, 0, None).unwrap();
            PagingState {
                pages: vec![Page { offset: 0, items }],
                anchor_position: anchor,
                config: PagingConfig::default(),
            }
        }
    }

    fn empty_state() -> PagingState<CachedArticle> {
        PagingState {
            pages: vec![],
            anchor_position: None,
            config: PagingConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_refresh_first_page_then_append_requests_page_two() {
        let fx = Fixture::new();
        let key = FeedKey::new("technology", None);
        let mediator = fx.mediator(key.clone());
        fx.source.push_articles(sample_articles("tech", 20));
        fx.source.push_articles(sample_articles("tech-2", 20));

        let result = mediator.load(LoadType::Refresh, &empty_state()).await.unwrap();
        assert!(!result.end_of_pagination_reached);

        let rows = fx.store.list_articles(&key, 0, None).unwrap();
        assert_eq!(rows.len(), 20);
        for row in &rows {
            let page_key = fx.store.page_key(&row.url).unwrap().unwrap();
            assert_eq!(page_key.prev_key, None);
            assert_eq!(page_key.next_key, Some(2));
            assert_eq!(page_key.category, "technology");
        }

        mediator
            .load(LoadType::Append, &fx.state(&key, None))
            .await
            .unwrap();
        let requests = fx.source.requests();
        assert_eq!(requests[0].page, 1);
        assert_eq!(requests[0].category, "technology");
        assert_eq!(requests[1].page, 2);
        assert_eq!(fx.store.list_articles(&key, 0, None).unwrap().len(), 40);

        let second = fx
            .store
            .page_key("https://news.example/tech-2/0")
            .unwrap()
            .unwrap();
        assert_eq!(second.prev_key, Some(1));
        assert_eq!(second.next_key, Some(3));
    }

    #[tokio::test]
    async fn test_empty_append_reaches_end_without_writes() {
        let fx = Fixture::new();
        let key = FeedKey::new("technology", None);
        let mediator = fx.mediator(key.clone());
        fx.source.push_articles(sample_articles("tech", 20));
        fx.source.push_articles(vec![]);

        mediator.load(LoadType::Refresh, &empty_state()).await.unwrap();
        let result = mediator
            .load(LoadType::Append, &fx.state(&key, None))
            .await
            .unwrap();

        assert!(result.end_of_pagination_reached);
        assert_eq!(fx.store.list_articles(&key, 0, None).unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_null_keys_end_edges_without_network() {
        let fx = Fixture::new();
        let key = FeedKey::new("technology", None);
        let mediator = fx.mediator(key.clone());
        fx.source.push_articles(sample_articles("tech", 5));
        fx.source.push_articles(vec![]);

        mediator.load(LoadType::Refresh, &empty_state()).await.unwrap();
        mediator
            .load(LoadType::Append, &fx.state(&key, None))
            .await
            .unwrap();
        assert_eq!(fx.source.request_count(), 2);

        // Page 1 has no previous page
        for _ in 0..3 {
            let result = mediator
                .load(LoadType::Prepend, &fx.state(&key, None))
                .await
                .unwrap();
            assert!(result.end_of_pagination_reached);
        }
        assert_eq!(fx.source.request_count(), 2);

        // Nothing loaded yet at either edge
        let result = mediator.load(LoadType::Append, &empty_state()).await.unwrap();
        assert!(result.end_of_pagination_reached);
        assert_eq!(fx.source.request_count(), 2);
    }

    #[tokio::test]
    async fn test_last_page_append_stays_at_end() {
        let fx = Fixture::new();
        let key = FeedKey::new("science", None);
        let mediator = fx.mediator(key.clone());
        fx.source.push_articles(vec![]);

        let result = mediator.load(LoadType::Refresh, &empty_state()).await.unwrap();
        assert!(result.end_of_pagination_reached);

        fx.store
            .apply_page(&PageWrite {
                partition: "science".into(),
                replace_partition: false,
                page: 3,
                prev_key: Some(2),
                next_key: None,
                articles: vec![CachedArticle::new("https://news.example/last", "science")],
            })
            .unwrap();

        for _ in 0..3 {
            let result = mediator
                .load(LoadType::Append, &fx.state(&key, None))
                .await
                .unwrap();
            assert!(result.end_of_pagination_reached);
        }
        assert_eq!(fx.source.request_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_uses_page_of_anchor() {
        let fx = Fixture::new();
        let key = FeedKey::new("technology", None);
        let mediator = fx.mediator(key.clone());
        fx.source.push_articles(sample_articles("p1", 20));
        fx.source.push_articles(sample_articles("p2", 20));
        fx.source.push_articles(sample_articles("p2-again", 20));

        mediator.load(LoadType::Refresh, &empty_state()).await.unwrap();
        mediator
            .load(LoadType::Append, &fx.state(&key, None))
            .await
            .unwrap();

        mediator
            .load(LoadType::Refresh, &fx.state(&key, Some(25)))
            .await
            .unwrap();

        assert_eq!(fx.source.requests()[2].page, 2);
        let rows = fx.store.list_articles(&key, 0, None).unwrap();
        assert_eq!(rows.len(), 20);
        assert!(rows.iter().all(|r| r.url.contains("p2-again")));
        let page_key = fx.store.page_key(&rows[0].url).unwrap().unwrap();
        assert_eq!(page_key.prev_key, Some(1));
    }

    #[tokio::test]
    async fn test_prepend_fetches_previous_page_and_sorts_first() {
        let fx = Fixture::new();
        let key = FeedKey::new("business", None);
        let mediator = fx.mediator(key.clone());

        fx.store
            .apply_page(&PageWrite {
                partition: "business".into(),
                replace_partition: true,
                page: 3,
                prev_key: Some(2),
                next_key: Some(4),
                articles: vec![CachedArticle::new("https://news.example/p3", "business")],
            })
            .unwrap();
        fx.source.push_articles(sample_articles("p2", 2));

        let result = mediator
            .load(LoadType::Prepend, &fx.state(&key, None))
            .await
            .unwrap();
        assert!(!result.end_of_pagination_reached);
        assert_eq!(fx.source.requests()[0].page, 2);

        let rows = fx.store.list_articles(&key, 0, None).unwrap();
        let urls: Vec<&str> = rows.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://news.example/p2/0",
                "https://news.example/p2/1",
                "https://news.example/p3"
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_leaves_cache_intact() {
        let fx = Fixture::new();
        let key = FeedKey::new("technology", None);
        let mediator = fx.mediator(key.clone());
        fx.source.push_articles(sample_articles("tech", 20));
        fx.source.push_offline();
        fx.source.push(Err(NewsError::Protocol {
            status: 500,
            detail: "upstream".into(),
        }));

        mediator.load(LoadType::Refresh, &empty_state()).await.unwrap();

        let err = assert_err!(mediator.load(LoadType::Refresh, &empty_state()).await);
        assert!(err.is_transport());
        let err = assert_err!(mediator.load(LoadType::Refresh, &empty_state()).await);
        assert!(matches!(err, NewsError::Protocol { status: 500, .. }));

        assert_eq!(fx.store.list_articles(&key, 0, None).unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_store_failure_is_load_error_and_atomic() {
        let fx = Fixture::new();
        let key = FeedKey::new("technology", None);
        let mediator = fx.mediator(key.clone());
        fx.source.push_articles(sample_articles("old", 3));
        fx.source.push_articles(sample_articles("new", 3));

        mediator.load(LoadType::Refresh, &empty_state()).await.unwrap();
        fx.store
            .execute_raw(
                "CREATE TRIGGER crash_on_key BEFORE INSERT ON page_keys
                 WHEN NEW.article_url LIKE '%/new/2'
                 BEGIN SELECT RAISE(ABORT, 'simulated crash'); END;",
            )
            .unwrap();

        let err = assert_err!(mediator.load(LoadType::Refresh, &empty_state()).await);
        assert!(matches!(err, NewsError::Database(_)));

        let rows = fx.store.list_articles(&key, 0, None).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.url.contains("/old/")));
        for row in &rows {
            assert!(fx.store.page_key(&row.url).unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_superseded_session_does_not_write() {
        let fx = Fixture::new();
        let key = FeedKey::new("technology", None);
        let stale = fx.mediator(key.clone());
        let _current = fx.mediator(key.clone());
        fx.source.push_articles(sample_articles("tech", 5));

        let err = assert_err!(stale.load(LoadType::Refresh, &empty_state()).await);
        assert!(matches!(err, NewsError::SessionSuperseded));
        assert!(!fx.store.has_articles("technology").unwrap());
        assert_eq!(fx.source.request_count(), 0);
    }

    #[tokio::test]
    async fn test_search_fetches_query_into_own_partition() {
        let fx = Fixture::new();
        fx.store
            .apply_page(&PageWrite {
                partition: "general".into(),
                replace_partition: true,
                page: 1,
                prev_key: None,
                next_key: Some(2),
                articles: vec![CachedArticle::new("https://news.example/browse", "general")],
            })
            .unwrap();

        let key = FeedKey::new("general", Some("Mars"));
        let mediator = fx.mediator(key.clone());
        fx.source.push_articles(sample_articles("mars", 3));

        mediator.load(LoadType::Refresh, &empty_state()).await.unwrap();

        let request = &fx.source.requests()[0];
        assert_eq!(request.query.as_deref(), Some("Mars"));
        assert!(fx.store.has_articles("search:mars").unwrap());
        assert!(fx.store.has_articles("general").unwrap());
    }

    #[tokio::test]
    async fn test_search_append_ignores_keys_of_text_matches() {
        let fx = Fixture::new();
        let mut rover = CachedArticle::new("https://news.example/rover", "general");
        rover.title = Some("mars rover news".into());
        fx.store
            .apply_page(&PageWrite {
                partition: "general".into(),
                replace_partition: true,
                page: 5,
                prev_key: Some(4),
                next_key: Some(6),
                articles: vec![rover],
            })
            .unwrap();

        let key = FeedKey::new("general", Some("mars"));
        let mediator = fx.mediator(key.clone());
        fx.source.push_articles(sample_articles("mars", 3));
        fx.source.push_articles(sample_articles("mars-2", 3));

        mediator.load(LoadType::Refresh, &empty_state()).await.unwrap();
        let state = fx.state(&key, Some(2));
        assert_eq!(
            state.last_item().map(|a| a.url.as_str()),
            Some("https://news.example/rover")
        );

        mediator.load(LoadType::Append, &state).await.unwrap();
        let pages: Vec<u32> = fx.source.requests().iter().map(|r| r.page).collect();
        assert_eq!(pages, vec![1, 2]);

        // The text match is not ours either at the leading edge
        let result = mediator
            .load(LoadType::Prepend, &fx.state(&key, None))
            .await
            .unwrap();
        assert!(result.end_of_pagination_reached);
        assert_eq!(fx.source.request_count(), 2);
    }

    #[test]
    fn test_initialize_by_cache_age() {
        let fx = Fixture::new();
        let key = FeedKey::new("technology", None);
        let mediator = fx.mediator(key);
        let now = Utc::now();

        assert_eq!(
            mediator.initialize_at(now).unwrap(),
            InitializeAction::LaunchInitialRefresh
        );

        let mut stale = CachedArticle::new("https://news.example/stale", "technology");
        stale.cached_at = now - TimeDelta::minutes(20);
        fx.store.upsert_articles(&[stale]).unwrap();
        assert_eq!(
            mediator.initialize_at(now).unwrap(),
            InitializeAction::LaunchInitialRefresh
        );

        let mut fresh = CachedArticle::new("https://news.example/fresh", "technology");
        fresh.cached_at = now - TimeDelta::minutes(5);
        fx.store.upsert_articles(&[fresh]).unwrap();
        assert_eq!(
            mediator.initialize_at(now).unwrap(),
            InitializeAction::SkipInitialRefresh
        );
    }

    #[tokio::test]
    async fn test_refresh_sweeps_expired_rows_of_any_category() {
        let fx = Fixture::new();
        let mut expired = CachedArticle::new("https://news.example/expired", "sports");
        expired.cached_at = Utc::now() - TimeDelta::hours(30);
        fx.store.upsert_articles(&[expired]).unwrap();

        let mediator = fx.mediator(FeedKey::new("technology", None));
        fx.source.push_articles(sample_articles("tech", 2));
        mediator.load(LoadType::Refresh, &empty_state()).await.unwrap();

        assert!(fx
            .store
            .get_article("https://news.example/expired")
            .unwrap()
            .is_none());
    }
}
