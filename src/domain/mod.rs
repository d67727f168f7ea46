pub mod article;
pub mod bookmark;
pub mod cache_policy;
pub mod feed_key;
pub mod page_key;

pub use article::{Article, CachedArticle, NewsResponse, Source};
pub use bookmark::BookmarkedArticle;
pub use cache_policy::CachePolicy;
pub use feed_key::{FeedKey, DEFAULT_CATEGORY};
pub use page_key::PageKey;
