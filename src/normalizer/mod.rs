use std::collections::HashSet;

use chrono::{DateTime, Utc};
use html_escape::decode_html_entities;
use tracing::debug;

use crate::domain::{Article, CachedArticle};

/// Turns wire articles into cache rows for one partition.
#[derive(Clone)]
pub struct Normalizer;

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Articles without a URL are dropped, as are repeats of a URL already
    /// seen earlier in the same page. Order is otherwise preserved.
    pub fn to_cached(
        &self,
        articles: &[Article],
        partition: &str,
        now: DateTime<Utc>,
    ) -> Vec<CachedArticle> {
        let mut seen = HashSet::new();
        let mut cached = Vec::with_capacity(articles.len());

        for article in articles {
            let Some(url) = article
                .url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
            else {
                debug!("Skipping article without URL: {}", article.display_title());
                continue;
            };

            if !seen.insert(url.to_string()) {
                continue;
            }

            cached.push(CachedArticle {
                url: url.to_string(),
                title: decode(&article.title),
                description: decode(&article.description),
                image_url: article.url_to_image.clone(),
                source_name: article.source_name().map(|s| decode_html_entities(s).to_string()),
                published_at: article.published_at.clone(),
                content: decode(&article.content),
                category: partition.to_string(),
                cached_at: now,
            });
        }

        cached
    }
}

fn decode(text: &Option<String>) -> Option<String> {
    text.as_deref().map(|t| decode_html_entities(t).to_string())
}
