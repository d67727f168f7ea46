use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::ai::Summarizer;
use crate::app::{NewsError, Result};
use crate::config::AiConfig;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

/// Summarizes articles with the Gemini `generateContent` endpoint.
pub struct GeminiSummarizer {
    client: Client,
    endpoint: Url,
    api_key: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiSummarizer {
    pub fn new(config: &AiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(NewsError::Config(
                "No Gemini API key configured (set GEMINI_API_KEY)".into(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let endpoint =
            Url::parse(&base)?.join(&format!("models/{}:generateContent", config.model))?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(
        &self,
        title: &str,
        description: Option<&str>,
        content: Option<&str>,
    ) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(build_prompt(title, description, content)),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        debug!("Requesting summary for '{}'", title);
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(request_failed)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.map_err(request_failed)?;
            warn!("Summarization request failed with {}", status);
            return Err(NewsError::Summarization(format!(
                "API error {}: {}",
                status.as_u16(),
                error_text.trim()
            )));
        }

        let body: GenerateResponse = response.json().await.map_err(request_failed)?;
        extract_text(body)
    }
}

fn request_failed(e: reqwest::Error) -> NewsError {
    warn!("Summarization request failed: {}", e);
    if e.is_decode() {
        NewsError::Summarization(format!("Unreadable response: {}", e))
    } else {
        NewsError::Summarization(format!("Request failed: {}", e))
    }
}

pub(crate) fn build_prompt(title: &str, description: Option<&str>, content: Option<&str>) -> String {
    let mut article = format!("Title: {}\n", title);
    if let Some(description) = description.filter(|d| !d.trim().is_empty()) {
        article.push_str(&format!("Description: {}\n", description));
    }
    if let Some(content) = content.filter(|c| !c.trim().is_empty()) {
        article.push_str(&format!("Content: {}\n", content));
    }

    format!(
        "You are a helpful news summarizer. Summarize the following news article in 3-4 concise bullet points.\n\
         Focus on the key facts and main takeaways. Keep it brief and informative.\n\
         \n\
         {}\n\
         Provide the summary in bullet points format:",
        article
    )
}

fn extract_text(response: GenerateResponse) -> Result<String> {
    let text = response
        .candidates
        .into_iter()
        .next()
        .map(|c| {
            c.content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(NewsError::Summarization("Empty response from AI".into()));
    }
    Ok(text)
}
