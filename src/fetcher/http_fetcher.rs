use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::app::{NewsError, Result};
use crate::config::ApiConfig;
use crate::domain::NewsResponse;
use crate::fetcher::{NewsSource, PageRequest};

/// Error body returned by the news API alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    message: Option<String>,
}

pub struct NewsApiClient {
    client: Client,
    base_url: Url,
    api_key: String,
    language: String,
}

impl NewsApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .user_agent("newsbite/0.1.0")
            .build()?;

        // Url::join drops the last segment unless the base ends with '/'
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            api_key: config.api_key.clone(),
            language: config.language.clone(),
        })
    }

    fn build_url(&self, request: &PageRequest) -> Result<Url> {
        let mut url = self.base_url.join("top-headlines")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("apiKey", &self.api_key);
            pairs.append_pair("language", &self.language);
            match &request.query {
                Some(query) => pairs.append_pair("q", query),
                None => pairs.append_pair("category", &request.category),
            };
            pairs.append_pair("page", &request.page.to_string());
            pairs.append_pair("pageSize", &request.page_size.to_string());
        }
        Ok(url)
    }
}

fn protocol_error(status: u16, body: &str) -> NewsError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.code))
        .unwrap_or_else(|| body.trim().to_string());
    NewsError::Protocol { status, detail }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<NewsResponse> {
        let url = self.build_url(request)?;
        debug!(
            "Fetching page {} of {} ({:?})",
            request.page, request.category, request.query
        );

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(protocol_error(status.as_u16(), &body));
        }

        let parsed: NewsResponse = serde_json::from_str(&body)?;
        if parsed.status != "ok" {
            return Err(protocol_error(status.as_u16(), &body));
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> NewsApiClient {
        let config = ApiConfig {
            base_url: "https://newsapi.example/v2".into(),
            api_key: "secret".into(),
            ..ApiConfig::default()
        };
        NewsApiClient::new(&config).unwrap()
    }

    #[test]
    fn test_category_url() {
        let request = PageRequest {
            category: "technology".into(),
            query: None,
            page: 2,
            page_size: 20,
        };
        let url = client().build_url(&request).unwrap();

        assert_eq!(url.path(), "/v2/top-headlines");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("apiKey".into(), "secret".into())));
        assert!(pairs.contains(&("language".into(), "en".into())));
        assert!(pairs.contains(&("category".into(), "technology".into())));
        assert!(pairs.contains(&("page".into(), "2".into())));
        assert!(pairs.contains(&("pageSize".into(), "20".into())));
        assert!(!pairs.iter().any(|(k, _)| k == "q"));
    }

    #[test]
    fn test_search_url_sends_query_instead_of_category() {
        let request = PageRequest {
            category: "general".into(),
            query: Some("rust & wasm".into()),
            page: 1,
            page_size: 20,
        };
        let url = client().build_url(&request).unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("q".into(), "rust & wasm".into())));
        assert!(!pairs.iter().any(|(k, _)| k == "category"));
    }

    #[test]
    fn test_protocol_error_prefers_api_message() {
        let err = protocol_error(
            401,
            r#"{"status":"error","code":"apiKeyInvalid","message":"Your API key is invalid"}"#,
        );
        assert_eq!(
            err.to_string(),
            "News API returned 401: Your API key is invalid"
        );

        let err = protocol_error(502, "Bad Gateway\n");
        assert_eq!(err.to_string(), "News API returned 502: Bad Gateway");
    }
}
