//! Offline-first incremental paging.
//!
//! The local cache is the system of record for display. A [`Pager`] reads
//! pages from a [`PagingSource`] and asks a [`RemoteMediator`] to backfill
//! the cache whenever the reader nears an edge of what is materialized.

pub mod mediator;
pub mod pager;
pub mod session;
pub mod source;

use std::sync::Arc;

use async_trait::async_trait;

use crate::app::Result;
use crate::store::Subscription;

pub use mediator::{NewsRemoteMediator, STARTING_PAGE_INDEX};
pub use pager::{LoadStateListener, Pager};
pub use session::{SessionRegistry, SessionToken};
pub use source::CachePagingSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadType {
    /// Initial load or pull-to-refresh.
    Refresh,
    /// Toward the first page.
    Prepend,
    /// Toward later pages.
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    NotLoading { end_of_pagination_reached: bool },
    Loading,
    Error(String),
}

impl LoadState {
    pub fn is_error(&self) -> bool {
        matches!(self, LoadState::Error(_))
    }

    pub fn end_of_pagination_reached(&self) -> bool {
        matches!(
            self,
            LoadState::NotLoading {
                end_of_pagination_reached: true
            }
        )
    }
}

impl Default for LoadState {
    fn default() -> Self {
        LoadState::NotLoading {
            end_of_pagination_reached: false,
        }
    }
}

/// Per-edge load state of one paging session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStates {
    pub refresh: LoadState,
    pub prepend: LoadState,
    pub append: LoadState,
}

impl LoadStates {
    pub fn get(&self, load_type: LoadType) -> &LoadState {
        match load_type {
            LoadType::Refresh => &self.refresh,
            LoadType::Prepend => &self.prepend,
            LoadType::Append => &self.append,
        }
    }

    pub fn set(&mut self, load_type: LoadType, state: LoadState) {
        match load_type {
            LoadType::Refresh => self.refresh = state,
            LoadType::Prepend => self.prepend = state,
            LoadType::Append => self.append = state,
        }
    }

    pub fn is_loading(&self) -> bool {
        [&self.refresh, &self.prepend, &self.append]
            .iter()
            .any(|s| matches!(s, LoadState::Loading))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializeAction {
    LaunchInitialRefresh,
    SkipInitialRefresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediatorSuccess {
    pub end_of_pagination_reached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingConfig {
    pub page_size: usize,
    /// Distance from an edge, in items, at which the next load starts.
    pub prefetch_distance: usize,
    pub initial_load_size: usize,
    /// Always false: only loaded items are emitted.
    pub enable_placeholders: bool,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            prefetch_distance: 5,
            initial_load_size: 60,
            enable_placeholders: false,
        }
    }
}

/// A contiguous run of items starting at `offset` in the local listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub offset: usize,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            offset: self.offset,
            items: self.items.into_iter().map(f).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// What the mediator sees of a session when it is asked to load.
#[derive(Debug, Clone)]
pub struct PagingState<T> {
    pub pages: Vec<Page<T>>,
    pub anchor_position: Option<usize>,
    pub config: PagingConfig,
}

impl<T> PagingState<T> {
    pub fn first_item(&self) -> Option<&T> {
        self.pages.iter().find_map(|p| p.items.first())
    }

    pub fn last_item(&self) -> Option<&T> {
        self.pages.iter().rev().find_map(|p| p.items.last())
    }

    /// Item at `position`, clamped to the last loaded item.
    pub fn closest_item_to_position(&self, position: usize) -> Option<&T> {
        self.pages
            .iter()
            .flat_map(|p| p.items.iter())
            .take(position + 1)
            .last()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| p.items.is_empty())
    }
}

/// Local, display-ordered data a pager reads from.
pub trait PagingSource: Send + Sync {
    type Item: Clone + Send + Sync;

    fn load(&self, offset: usize, limit: usize) -> Result<Vec<Self::Item>>;

    /// Whether `a` and `b` are the same record, possibly in different versions.
    fn is_same_item(&self, a: &Self::Item, b: &Self::Item) -> bool;

    /// `callback` runs whenever the underlying data changes.
    fn register_invalidation(&self, callback: Arc<dyn Fn() + Send + Sync>) -> Subscription;
}

/// Fills the local source from the network at the edges of a session.
#[async_trait]
pub trait RemoteMediator: Send + Sync {
    type Item: Send + Sync;

    async fn initialize(&self) -> Result<InitializeAction>;

    async fn load(
        &self,
        load_type: LoadType,
        state: &PagingState<Self::Item>,
    ) -> Result<MediatorSuccess>;
}
