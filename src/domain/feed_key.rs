use std::fmt;

pub const DEFAULT_CATEGORY: &str = "general";
const SEARCH_PARTITION_PREFIX: &str = "search:";

/// Parameters of one feed: a browsed category or a search query.
///
/// A search is cached under its own pseudo-category so that refreshing a
/// search never wipes a browsed category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedKey {
    Category(String),
    Search { category: String, query: String },
}

impl FeedKey {
    /// Blank categories fall back to `general`; a blank query means browsing.
    pub fn new(category: &str, query: Option<&str>) -> Self {
        let category = match category.trim() {
            "" => DEFAULT_CATEGORY.to_string(),
            c => c.to_string(),
        };

        match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(query) => FeedKey::Search {
                category,
                query: query.to_string(),
            },
            None => FeedKey::Category(category),
        }
    }

    pub fn category(&self) -> &str {
        match self {
            FeedKey::Category(category) => category,
            FeedKey::Search { category, .. } => category,
        }
    }

    pub fn query(&self) -> Option<&str> {
        match self {
            FeedKey::Category(_) => None,
            FeedKey::Search { query, .. } => Some(query),
        }
    }

    /// Cache partition the feed's rows and page keys are written under.
    pub fn partition(&self) -> String {
        match self {
            FeedKey::Category(category) => category.clone(),
            FeedKey::Search { query, .. } => {
                format!("{}{}", SEARCH_PARTITION_PREFIX, query.to_lowercase())
            }
        }
    }
}

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedKey::Category(category) => write!(f, "category '{}'", category),
            FeedKey::Search { query, .. } => write!(f, "search '{}'", query),
        }
    }
}
