use thiserror::Error;

#[derive(Error, Debug)]
pub enum NewsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("News API returned {status}: {detail}")]
    Protocol { status: u16, detail: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Summarization failed: {0}")]
    Summarization(String),

    #[error("Invalid article: {0}")]
    InvalidArticle(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Paging session was superseded by a newer one")]
    SessionSuperseded,

    #[error("{0}")]
    Other(String),
}

impl NewsError {
    /// Errors a consumer may retry for the same paging edge.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            NewsError::Http(_)
                | NewsError::Io(_)
                | NewsError::Protocol { .. }
                | NewsError::Json(_)
                | NewsError::Database(_)
        )
    }

    /// True for failures that never reached an HTTP response.
    pub fn is_transport(&self) -> bool {
        match self {
            NewsError::Http(e) => !e.is_status(),
            NewsError::Io(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, NewsError>;
