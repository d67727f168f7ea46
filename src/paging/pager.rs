use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, Stream};
use tracing::{debug, warn};

use crate::app::{NewsError, Result};
use crate::paging::{
    InitializeAction, LoadState, LoadStates, LoadType, Page, PagingConfig, PagingSource,
    PagingState, RemoteMediator,
};
use crate::store::Subscription;

pub type LoadStateListener = Arc<dyn Fn(&LoadStates) + Send + Sync>;

/// One paging session over a local source, backfilled by a mediator.
///
/// Remote failures are recorded in [`LoadStates`] for the failing edge and
/// recoverable ones can be replayed with [`Pager::retry`]. They only become
/// an `Err` from [`Pager::next_page`] once they leave nothing to emit.
pub struct Pager<P, M>
where
    P: PagingSource,
    M: RemoteMediator<Item = P::Item>,
{
    source: P,
    mediator: M,
    config: PagingConfig,
    pages: Vec<Page<P::Item>>,
    anchor: Option<usize>,
    load_states: LoadStates,
    local_end: bool,
    remote_prepend_end: bool,
    remote_append_end: bool,
    last_failed: Option<LoadType>,
    failures: HashMap<LoadType, NewsError>,
    invalidated: Arc<AtomicBool>,
    listeners: Vec<LoadStateListener>,
    started: bool,
    /// Display positions already handed out by `next_page`.
    emitted: Range<usize>,
    _subscription: Subscription,
}

impl<P, M> Pager<P, M>
where
    P: PagingSource,
    M: RemoteMediator<Item = P::Item>,
{
    pub fn new(source: P, mediator: M, config: PagingConfig) -> Self {
        let invalidated = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&invalidated);
        let subscription = source.register_invalidation(Arc::new(move || {
            flag.store(true, Ordering::SeqCst);
        }));

        Self {
            source,
            mediator,
            config,
            pages: Vec::new(),
            anchor: None,
            load_states: LoadStates::default(),
            local_end: false,
            remote_prepend_end: false,
            remote_append_end: false,
            last_failed: None,
            failures: HashMap::new(),
            invalidated,
            listeners: Vec::new(),
            started: false,
            emitted: 0..0,
            _subscription: subscription,
        }
    }

    pub fn config(&self) -> &PagingConfig {
        &self.config
    }

    pub fn load_states(&self) -> &LoadStates {
        &self.load_states
    }

    pub fn add_load_state_listener(&mut self, listener: LoadStateListener) {
        listener(&self.load_states);
        self.listeners.push(listener);
    }

    /// Every item currently materialized, in display order.
    pub fn snapshot(&self) -> Vec<P::Item> {
        self.pages
            .iter()
            .flat_map(|p| p.items.iter().cloned())
            .collect()
    }

    pub fn loaded_count(&self) -> usize {
        self.pages.iter().map(|p| p.items.len()).sum()
    }

    /// Runs the mediator's initialization check and the first local load.
    /// Later calls do nothing.
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;

        match self.mediator.initialize().await? {
            InitializeAction::LaunchInitialRefresh => {
                self.remote_load(LoadType::Refresh).await;
            }
            InitializeAction::SkipInitialRefresh => {
                debug!("Cache is fresh, skipping initial refresh");
            }
        }

        self.reload()
    }

    /// Pull-to-refresh within this session. Emission restarts from the top.
    pub async fn refresh(&mut self) -> Result<bool> {
        self.start().await?;
        let ok = self.remote_load(LoadType::Refresh).await;
        self.emitted = 0..0;
        self.reload()?;
        Ok(ok)
    }

    /// Replays the last recoverable edge failure, if any.
    pub async fn retry(&mut self) -> Result<bool> {
        let Some(load_type) = self.last_failed else {
            return Ok(false);
        };

        let ok = self.remote_load(load_type).await;
        if ok {
            self.after_remote_success(load_type)?;
        }
        Ok(ok)
    }

    /// Reports that the reader looked at `index`, loading toward whichever
    /// edge it is within the prefetch distance of.
    pub async fn access(&mut self, index: usize) -> Result<()> {
        self.start().await?;
        self.anchor = Some(index);
        self.sync()?;

        if index + self.config.prefetch_distance >= self.loaded_count() {
            let loaded_locally = !self.local_end && self.load_after()?;
            if !loaded_locally
                && self.can_load_remote(LoadType::Append)
                && self.remote_load(LoadType::Append).await
            {
                self.after_remote_success(LoadType::Append)?;
            }
        }

        if index < self.config.prefetch_distance
            && self.can_load_remote(LoadType::Prepend)
            && self.remote_load(LoadType::Prepend).await
        {
            self.after_remote_success(LoadType::Prepend)?;
        }

        Ok(())
    }

    /// The next unseen page of the session.
    ///
    /// Rows that arrived above the emitted range (a prepend) are emitted
    /// first, walking upward. `Ok(None)` means local data and remote
    /// pagination are both exhausted; a failed edge that leaves nothing to
    /// emit is returned as its error.
    pub async fn next_page(&mut self) -> Result<Option<Page<P::Item>>> {
        self.start().await?;
        self.sync()?;
        let page_size = self.config.page_size.max(1);

        if self.emitted.start > 0 {
            let end = self.emitted.start;
            let offset = end.saturating_sub(page_size);
            let page = Page {
                offset,
                items: self.items_in(offset..end),
            };
            self.emitted.start = offset;
            self.access(offset).await?;
            return Ok(Some(page));
        }

        let offset = self.emitted.end;
        while self.loaded_count() < offset + page_size && !self.local_end {
            if !self.load_after()? {
                break;
            }
        }

        if offset >= self.loaded_count()
            && self.can_load_remote(LoadType::Append)
            && self.remote_load(LoadType::Append).await
        {
            self.after_remote_success(LoadType::Append)?;
        }

        let end = (offset + page_size).min(self.loaded_count());
        if offset >= end {
            return match self.take_edge_failure() {
                Some(e) => Err(e),
                None => Ok(None),
            };
        }

        let page = Page {
            offset,
            items: self.items_in(offset..end),
        };
        self.emitted.end = end;
        self.access(end - 1).await?;
        Ok(Some(page))
    }

    /// The session as a lazy stream of pages. An edge failure that ends
    /// the session early is its last item.
    pub fn into_stream(self) -> impl Stream<Item = Result<Page<P::Item>>>
    where
        P: 'static,
        M: 'static,
    {
        stream::try_unfold(self, |mut pager| async move {
            let page = pager.next_page().await?;
            Ok(page.map(|page| (page, pager)))
        })
    }

    fn can_load_remote(&self, load_type: LoadType) -> bool {
        let ended = match load_type {
            LoadType::Refresh => false,
            LoadType::Prepend => self.remote_prepend_end,
            LoadType::Append => self.remote_append_end,
        };
        !ended && !self.load_states.get(load_type).is_error()
    }

    async fn remote_load(&mut self, load_type: LoadType) -> bool {
        self.set_load_state(load_type, LoadState::Loading);

        let state = PagingState {
            pages: self.pages.clone(),
            anchor_position: self.anchor,
            config: self.config,
        };

        match self.mediator.load(load_type, &state).await {
            Ok(success) => {
                let end = success.end_of_pagination_reached;
                match load_type {
                    LoadType::Refresh => {
                        self.remote_prepend_end = end;
                        self.remote_append_end = end;
                        let edge = LoadState::NotLoading {
                            end_of_pagination_reached: end,
                        };
                        self.load_states.prepend = edge.clone();
                        self.load_states.append = edge;
                        self.failures.clear();
                        self.last_failed = None;
                    }
                    LoadType::Prepend => self.remote_prepend_end = end,
                    LoadType::Append => self.remote_append_end = end,
                }
                self.failures.remove(&load_type);
                if self.last_failed == Some(load_type) {
                    self.last_failed = None;
                }
                self.set_load_state(
                    load_type,
                    LoadState::NotLoading {
                        end_of_pagination_reached: end,
                    },
                );
                true
            }
            Err(e) => {
                warn!("{:?} load failed: {}", load_type, e);
                if e.is_recoverable() {
                    self.last_failed = Some(load_type);
                }
                self.set_load_state(load_type, LoadState::Error(e.to_string()));
                self.failures.insert(load_type, e);
                false
            }
        }
    }

    /// The failure that leaves `next_page` with nothing to emit: the
    /// trailing edge, or a refresh that left the session empty.
    fn take_edge_failure(&mut self) -> Option<NewsError> {
        let edge = if self.load_states.append.is_error() {
            LoadType::Append
        } else if self.loaded_count() == 0 && self.load_states.refresh.is_error() {
            LoadType::Refresh
        } else {
            return None;
        };

        let detail = match self.load_states.get(edge) {
            LoadState::Error(detail) => detail.clone(),
            _ => return None,
        };
        Some(
            self.failures
                .remove(&edge)
                .unwrap_or(NewsError::Other(detail)),
        )
    }

    fn after_remote_success(&mut self, load_type: LoadType) -> Result<()> {
        match load_type {
            LoadType::Refresh => {
                self.emitted = 0..0;
                self.reload()
            }
            LoadType::Prepend => self.reload(),
            LoadType::Append => {
                self.sync()?;
                self.local_end = false;
                self.load_after()?;
                Ok(())
            }
        }
    }

    fn sync(&mut self) -> Result<()> {
        if self.invalidated.load(Ordering::SeqCst) {
            self.reload()?;
        }
        Ok(())
    }

    /// Rebuilds the pages from the top of the source, keeping at least as
    /// many items as were loaded before. The emitted range follows its
    /// first item when rows were inserted above it.
    fn reload(&mut self) -> Result<()> {
        self.invalidated.store(false, Ordering::SeqCst);
        let first_emitted = if self.emitted.is_empty() {
            None
        } else {
            self.items_in(self.emitted.start..self.emitted.start + 1)
                .into_iter()
                .next()
        };

        let count = self.loaded_count().max(self.config.initial_load_size);
        let items = self.source.load(0, count)?;
        self.local_end = items.len() < count;

        let page_size = self.config.page_size.max(1);
        self.pages = items
            .chunks(page_size)
            .enumerate()
            .map(|(i, chunk)| Page {
                offset: i * page_size,
                items: chunk.to_vec(),
            })
            .collect();

        if let Some(first) = first_emitted {
            if let Some(position) = self.position_of(&first)? {
                let len = self.emitted.len();
                self.emitted = position..position + len;
            }
        }
        if self.local_end {
            let total = self.loaded_count();
            self.emitted.end = self.emitted.end.min(total);
            self.emitted.start = self.emitted.start.min(self.emitted.end);
        }

        debug!(
            "Reloaded {} items in {} pages",
            self.loaded_count(),
            self.pages.len()
        );
        Ok(())
    }

    /// Display position of `item`, loading further local pages until it is
    /// found or the source runs out.
    fn position_of(&mut self, item: &P::Item) -> Result<Option<usize>> {
        loop {
            let found = self
                .pages
                .iter()
                .flat_map(|p| p.items.iter())
                .position(|i| self.source.is_same_item(i, item));
            if found.is_some() || self.local_end || !self.load_after()? {
                return Ok(found);
            }
        }
    }

    fn items_in(&self, range: Range<usize>) -> Vec<P::Item> {
        self.pages
            .iter()
            .flat_map(|p| p.items.iter())
            .skip(range.start)
            .take(range.len())
            .cloned()
            .collect()
    }

    fn load_after(&mut self) -> Result<bool> {
        let offset = self.loaded_count();
        let items = self.source.load(offset, self.config.page_size)?;

        if items.len() < self.config.page_size {
            self.local_end = true;
        }
        if items.is_empty() {
            return Ok(false);
        }

        self.pages.push(Page { offset, items });
        Ok(true)
    }

    fn set_load_state(&mut self, load_type: LoadType, state: LoadState) {
        self.load_states.set(load_type, state);
        for listener in &self.listeners {
            listener(&self.load_states);
        }
    }
}
