use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Article, Source};

/// A user-saved article. Snapshotted at bookmark time and never touched
/// by cache maintenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkedArticle {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub source_name: Option<String>,
    pub published_at: Option<String>,
    pub bookmarked_at: DateTime<Utc>,
}

impl BookmarkedArticle {
    /// Returns `None` when the article has no URL to key the bookmark on.
    pub fn from_article(article: &Article, bookmarked_at: DateTime<Utc>) -> Option<Self> {
        let url = article.url.as_deref().filter(|u| !u.trim().is_empty())?;
        Some(Self {
            url: url.to_string(),
            title: article.title.clone(),
            description: article.description.clone(),
            image_url: article.url_to_image.clone(),
            source_name: article.source_name().map(String::from),
            published_at: article.published_at.clone(),
            bookmarked_at,
        })
    }

    pub fn to_article(&self) -> Article {
        Article {
            title: self.title.clone(),
            description: self.description.clone(),
            url: Some(self.url.clone()),
            url_to_image: self.image_url.clone(),
            published_at: self.published_at.clone(),
            content: None,
            source: Some(Source {
                id: None,
                name: self.source_name.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_article_requires_url() {
        let article = Article {
            title: Some("t".into()),
            ..Default::default()
        };
        assert!(BookmarkedArticle::from_article(&article, Utc::now()).is_none());

        let blank = Article {
            url: Some("  ".into()),
            ..Default::default()
        };
        assert!(BookmarkedArticle::from_article(&blank, Utc::now()).is_none());
    }

    #[test]
    fn test_snapshot_round_trips_display_fields() {
        let article = Article {
            title: Some("Title".into()),
            url: Some("https://example.com/x".into()),
            url_to_image: Some("https://example.com/x.png".into()),
            source: Some(Source {
                id: Some("wire".into()),
                name: Some("Wire".into()),
            }),
            ..Default::default()
        };
        let bookmark = BookmarkedArticle::from_article(&article, Utc::now()).unwrap();
        assert_eq!(bookmark.source_name.as_deref(), Some("Wire"));

        let back = bookmark.to_article();
        assert_eq!(back.url, article.url);
        assert_eq!(back.url_to_image, article.url_to_image);
        assert_eq!(back.source_name(), Some("Wire"));
    }
}
