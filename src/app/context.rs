use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::ai::{GeminiSummarizer, Summarizer};
use crate::app::error::{NewsError, Result};
use crate::config::Config;
use crate::fetcher::{NewsApiClient, NewsSource};
use crate::repository::{BookmarkRepository, NewsRepository, ThemeManager};
use crate::store::sqlite::SqliteStore;

pub struct AppContext {
    pub store: Arc<SqliteStore>,
    pub news: NewsRepository<SqliteStore>,
    pub bookmarks: BookmarkRepository<SqliteStore>,
    pub theme: ThemeManager<SqliteStore>,
    /// `None` when no generative-language API key is configured.
    pub summarizer: Option<Arc<dyn Summarizer>>,
}

impl AppContext {
    pub fn new(config: &Config, db_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_path.or_else(|| config.database_path.clone()) {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        let source: Arc<dyn NewsSource> = Arc::new(NewsApiClient::new(&config.api)?);
        Self::assemble(config, store, source)
    }

    pub fn in_memory(config: &Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        let source: Arc<dyn NewsSource> = Arc::new(NewsApiClient::new(&config.api)?);
        Self::assemble(config, store, source)
    }

    /// In-memory context around any news source.
    pub fn with_source(config: &Config, source: Arc<dyn NewsSource>) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::assemble(config, store, source)
    }

    pub fn summarizer(&self) -> Result<&Arc<dyn Summarizer>> {
        self.summarizer.as_ref().ok_or_else(|| {
            NewsError::Config("No Gemini API key configured (set GEMINI_API_KEY)".into())
        })
    }

    fn assemble(
        config: &Config,
        store: Arc<SqliteStore>,
        source: Arc<dyn NewsSource>,
    ) -> Result<Self> {
        let summarizer: Option<Arc<dyn Summarizer>> = if config.ai.api_key.trim().is_empty() {
            debug!("Summarization disabled: no API key");
            None
        } else {
            Some(Arc::new(GeminiSummarizer::new(&config.ai)?))
        };

        Ok(Self {
            news: NewsRepository::new(
                source,
                Arc::clone(&store),
                config.cache_policy(),
                config.paging_config(),
            ),
            bookmarks: BookmarkRepository::new(Arc::clone(&store)),
            theme: ThemeManager::new(Arc::clone(&store)),
            summarizer,
            store,
        })
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| NewsError::Config("Could not find data directory".into()))?;
        let newsbite_dir = data_dir.join("newsbite");
        std::fs::create_dir_all(&newsbite_dir)?;
        Ok(newsbite_dir.join("newsbite.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::scripted::{sample_articles, ScriptedSource};

    #[tokio::test]
    async fn test_components_share_one_store() {
        let source = Arc::new(ScriptedSource::new());
        source.push_articles(sample_articles("tech", 2));
        let ctx = AppContext::with_source(&Config::default(), source).unwrap();

        let articles = ctx
            .news
            .get_top_headlines(Some("technology"), None, false)
            .await
            .unwrap();
        assert!(ctx.bookmarks.toggle(&articles[0]).unwrap());
        ctx.news.clear_cache().unwrap();

        assert_eq!(ctx.bookmarks.list_all().unwrap().len(), 1);
        assert!(ctx.summarizer.is_none());
        assert!(ctx.summarizer().is_err());
    }

    #[test]
    fn test_summarizer_enabled_by_key() {
        let mut config = Config::default();
        config.ai.api_key = "key".into();
        let ctx = AppContext::in_memory(&config).unwrap();
        assert!(ctx.summarizer.is_some());
    }

    #[test]
    fn test_explicit_database_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.db");
        AppContext::new(&Config::default(), Some(path.clone())).unwrap();
        assert!(path.exists());
    }
}
