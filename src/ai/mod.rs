pub mod summarizer;

use async_trait::async_trait;

use crate::app::Result;

pub use summarizer::GeminiSummarizer;

/// Produces a short bullet-point summary of an article.
///
/// A blank model response is an error, never an empty summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        title: &str,
        description: Option<&str>,
        content: Option<&str>,
    ) -> Result<String>;
}
