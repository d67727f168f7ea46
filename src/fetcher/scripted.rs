use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::app::{NewsError, Result};
use crate::domain::{Article, NewsResponse, Source};
use crate::fetcher::{NewsSource, PageRequest};

/// In-process [`NewsSource`] that replays queued outcomes and records requests.
///
/// An exhausted script answers with a transport failure, so unexpected
/// extra fetches surface in tests.
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<NewsResponse>>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_articles(&self, articles: Vec<Article>) {
        self.push(Ok(NewsResponse {
            status: "ok".into(),
            total_results: articles.len() as u32,
            articles,
        }));
    }

    pub fn push_offline(&self) {
        self.push(Err(offline()));
    }

    pub fn push(&self, outcome: Result<NewsResponse>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(outcome);
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

fn offline() -> NewsError {
    NewsError::Io(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "network unreachable",
    ))
}

#[async_trait]
impl NewsSource for ScriptedSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<NewsResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(offline()))
    }
}

/// `count` distinct articles whose URLs start with `prefix`.
pub fn sample_articles(prefix: &str, count: usize) -> Vec<Article> {
    (0..count)
        .map(|i| Article {
            title: Some(format!("{} headline {}", prefix, i)),
            description: Some(format!("About {} {}", prefix, i)),
            url: Some(format!("https://news.example/{}/{}", prefix, i)),
            url_to_image: None,
            published_at: Some("2024-05-01T12:00:00Z".into()),
            content: None,
            source: Some(Source {
                id: None,
                name: Some("Example Wire".into()),
            }),
        })
        .collect()
}
