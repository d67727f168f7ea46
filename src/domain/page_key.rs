use serde::{Deserialize, Serialize};

/// Continuation tokens recorded for one cached article.
///
/// Every article written from the same remote page shares the same
/// `prev_key`/`next_key`. `prev_key == None` marks the first page and
/// `next_key == None` the end of pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageKey {
    pub article_url: String,
    pub prev_key: Option<u32>,
    pub next_key: Option<u32>,
    pub category: String,
    /// Remote page number that produced the article.
    pub page: u32,
    /// Index of the article within its remote page.
    pub position: u32,
}

impl PageKey {
    /// Keys for a page fetched with the given number.
    pub fn for_page(
        article_url: impl Into<String>,
        category: impl Into<String>,
        page: u32,
        position: u32,
        first_page: u32,
        end_of_pagination: bool,
    ) -> Self {
        Self {
            article_url: article_url.into(),
            prev_key: (page != first_page).then(|| page.saturating_sub(1)),
            next_key: (!end_of_pagination).then(|| page + 1),
            category: category.into(),
            page,
            position,
        }
    }
}
