//! # NewsBite
//!
//! An offline-first news reader with incremental, cache-first paging.
//!
//! ## Architecture
//!
//! The local cache is the system of record; the network only fills it:
//!
//! ```text
//! NewsSource → Normalizer → Store ← Pager ← Repository → CLI
//!                  ↑                  │
//!                  └── RemoteMediator ┘
//! ```
//!
//! - [`fetcher`]: News API client
//! - [`paging`]: Pager, remote mediator and session registry
//! - [`store`]: SQLite persistence with change notification
//! - [`repository`]: Facades for headlines, bookmarks and theme
//!
//! ## Quick Start
//!
//! ```bash
//! # Top headlines, from cache when offline
//! newsbite headlines --category technology
//!
//! # Page through search results
//! newsbite browse --query "rust" --pages 2
//!
//! # Bookmark and summarize
//! newsbite bookmark https://example.com/story
//! newsbite summarize https://example.com/story
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components:
/// store, news source, repositories and summarizer.
pub mod app;

/// Configuration management.
///
/// Loads from `~/.config/newsbite/config.toml`; API keys can come from
/// `NEWS_API_KEY` and `GEMINI_API_KEY`.
pub mod config;

/// Command-line interface using clap.
pub mod cli;

/// Core domain models.
///
/// - [`Article`](domain::Article): Wire and public article shape
/// - [`CachedArticle`](domain::CachedArticle): Cached row tagged with its partition
/// - [`PageKey`](domain::PageKey): Continuation tokens per cached article
/// - [`FeedKey`](domain::FeedKey): Category or search parameters of a session
pub mod domain;

/// Remote news source.
///
/// - [`NewsSource`](fetcher::NewsSource): Async trait for page fetches
/// - [`NewsApiClient`](fetcher::NewsApiClient): reqwest-based implementation
pub mod fetcher;

/// Conversion of wire articles into cache rows.
pub mod normalizer;

/// Offline-first paging engine.
pub mod paging;

/// Repositories over the store and the news source.
pub mod repository;

/// SQLite persistence layer.
///
/// - [`PagingStore`](store::PagingStore), [`BookmarkStore`](store::BookmarkStore),
///   [`PreferenceStore`](store::PreferenceStore): Storage traits
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;

/// Article summarization.
///
/// - [`Summarizer`](ai::Summarizer): Async trait
/// - [`GeminiSummarizer`](ai::GeminiSummarizer): Generative-language API client
pub mod ai;
