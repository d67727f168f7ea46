pub mod http_fetcher;
#[cfg(test)]
pub(crate) mod scripted;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::{FeedKey, NewsResponse};

pub use http_fetcher::NewsApiClient;

/// One page of a category listing or a keyword search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub category: String,
    /// When set the request is a search and `category` is not sent.
    pub query: Option<String>,
    pub page: u32,
    pub page_size: usize,
}

impl PageRequest {
    pub fn for_key(key: &FeedKey, page: u32, page_size: usize) -> Self {
        Self {
            category: key.category().to_string(),
            query: key.query().map(String::from),
            page,
            page_size,
        }
    }
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<NewsResponse>;
}
