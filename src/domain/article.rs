use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Publisher of an article as reported by the news API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Public article shape, shared by the wire format and every consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    pub source: Option<Source>,
}

impl Article {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(Untitled)")
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.name.as_deref())
    }
}

/// Body of a `top-headlines` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsResponse {
    pub status: String,
    #[serde(default)]
    pub total_results: u32,
    #[serde(default)]
    pub articles: Vec<Article>,
}

/// A cached copy of an article, tagged with the partition that produced it.
///
/// The URL is the identity: writing the same URL again replaces the row,
/// even when the new write comes from another category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedArticle {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub source_name: Option<String>,
    pub published_at: Option<String>,
    pub content: Option<String>,
    pub category: String,
    pub cached_at: DateTime<Utc>,
}

impl CachedArticle {
    pub fn new(url: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            description: None,
            image_url: None,
            source_name: None,
            published_at: None,
            content: None,
            category: category.into(),
            cached_at: Utc::now(),
        }
    }

    pub fn to_article(&self) -> Article {
        Article::from(self.clone())
    }
}

impl From<CachedArticle> for Article {
    fn from(cached: CachedArticle) -> Self {
        Article {
            title: cached.title,
            description: cached.description,
            url: Some(cached.url),
            url_to_image: cached.image_url,
            published_at: cached.published_at,
            content: cached.content,
            source: Some(Source {
                id: None,
                name: cached.source_name,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{
        "status": "ok",
        "totalResults": 2,
        "articles": [
            {
                "source": {"id": "the-verge", "name": "The Verge"},
                "author": "Someone",
                "title": "Chips get faster",
                "description": "A look at new silicon",
                "url": "https://example.com/chips",
                "urlToImage": "https://example.com/chips.jpg",
                "publishedAt": "2024-01-01T00:00:00Z",
                "content": "Full text [+1200 chars]"
            },
            {
                "source": {"id": null, "name": "Wire"},
                "title": "No link here",
                "description": null,
                "url": null,
                "urlToImage": null,
                "publishedAt": null
            }
        ]
    }"#;

    #[test]
    fn test_deserialize_news_response() {
        let response: NewsResponse = serde_json::from_str(RESPONSE).unwrap();
        assert_eq!(response.status, "ok");
        assert_eq!(response.total_results, 2);
        assert_eq!(response.articles.len(), 2);

        let first = &response.articles[0];
        assert_eq!(first.url.as_deref(), Some("https://example.com/chips"));
        assert_eq!(
            first.url_to_image.as_deref(),
            Some("https://example.com/chips.jpg")
        );
        assert_eq!(first.source_name(), Some("The Verge"));
        assert_eq!(first.content.as_deref(), Some("Full text [+1200 chars]"));

        assert!(response.articles[1].url.is_none());
        assert!(response.articles[1].content.is_none());
    }

    #[test]
    fn test_error_body_without_articles() {
        let body = r#"{"status":"error","code":"apiKeyInvalid","message":"Your API key is invalid"}"#;
        let response: NewsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.status, "error");
        assert!(response.articles.is_empty());
    }

    #[test]
    fn test_cached_article_maps_to_public_shape() {
        let mut cached = CachedArticle::new("https://example.com/a", "technology");
        cached.title = Some("Title".into());
        cached.source_name = Some("Wire".into());
        cached.image_url = Some("https://example.com/a.png".into());

        let article = cached.to_article();
        assert_eq!(article.url.as_deref(), Some("https://example.com/a"));
        assert_eq!(article.display_title(), "Title");
        assert_eq!(article.source_name(), Some("Wire"));
        assert_eq!(
            article.url_to_image.as_deref(),
            Some("https://example.com/a.png")
        );
        assert!(article.source.unwrap().id.is_none());
    }

    #[test]
    fn test_display_title_without_title() {
        assert_eq!(Article::default().display_title(), "(Untitled)");
    }
}
