// src/profile_analysis/crawler.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::{guard, Credential, ServiceClient};
use crate::error::{PipelineError, PipelineResult};
use crate::utils::non_empty;

const CONTENTS_ENDPOINT: &str = "/contents";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentsRequest {
    pub ids: Vec<String>,
    pub text: TextOptions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOptions {
    pub max_characters: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentsResponse {
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub results: Option<Vec<ContentResult>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentResult {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Remote content-fetch capability. Returns the raw body so the adapter can
/// report its shape when nothing usable comes back.
#[async_trait]
pub trait CrawlService: Send + Sync {
    async fn fetch_contents(&self, request: &ContentsRequest) -> PipelineResult<Value>;
}

pub struct ExaCrawlService {
    client: ServiceClient,
}

impl ExaCrawlService {
    pub fn new(base_url: &str, api_key: &str) -> PipelineResult<Self> {
        Ok(Self {
            client: ServiceClient::new("Crawler", base_url, Credential::ApiKeyHeader(api_key))?,
        })
    }
}

#[async_trait]
impl CrawlService for ExaCrawlService {
    async fn fetch_contents(&self, request: &ContentsRequest) -> PipelineResult<Value> {
        self.client.post_json(CONTENTS_ENDPOINT, request).await
    }
}

pub struct ProfileCrawler {
    service: Arc<dyn CrawlService>,
    max_characters: usize,
    deadline: Duration,
}

impl ProfileCrawler {
    pub fn new(service: Arc<dyn CrawlService>, max_characters: usize, deadline: Duration) -> Self {
        Self {
            service,
            max_characters,
            deadline,
        }
    }

    /// Fetch one profile as plain text. Never returns an empty string.
    pub async fn crawl_profile(&self, profile_url: &str) -> PipelineResult<String> {
        info!("Crawling profile: {}", profile_url);

        let request = ContentsRequest {
            ids: vec![profile_url.to_string()],
            text: TextOptions {
                max_characters: self.max_characters,
            },
        };

        let raw = guard(
            self.service.fetch_contents(&request),
            self.deadline,
            format!(
                "Crawl request timed out after {}ms",
                self.deadline.as_millis()
            ),
        )
        .await?;

        let text = extract_profile_text(&raw)?;
        info!("Crawled {} characters of profile text", text.chars().count());
        Ok(text)
    }
}

/// Picks the profile text out of a crawl response, in priority order:
/// aggregated `context`, then the first result's `text`, then every
/// result's title/text/summary joined by newlines.
pub fn extract_profile_text(raw: &Value) -> PipelineResult<String> {
    let response: ContentsResponse =
        serde_json::from_value(raw.clone()).map_err(|e| PipelineError::InvalidResponse {
            service: "Crawler",
            message: e.to_string(),
        })?;

    if let Some(context) = non_empty(response.context.as_deref()) {
        return Ok(context.to_string());
    }

    let results = response.results.unwrap_or_default();

    if let Some(text) = results
        .first()
        .and_then(|first| non_empty(first.text.as_deref()))
    {
        return Ok(text.to_string());
    }

    let combined = results
        .iter()
        .flat_map(|result| {
            [
                result.title.as_deref(),
                result.text.as_deref(),
                result.summary.as_deref(),
            ]
        })
        .filter_map(non_empty)
        .collect::<Vec<_>>()
        .join("\n");

    if !combined.is_empty() {
        return Ok(combined);
    }

    let keys: Vec<String> = raw
        .as_object()
        .map(|object| object.keys().cloned().collect())
        .unwrap_or_default();
    warn!("Crawl response had no usable text, keys: {:?}", keys);
    Err(PipelineError::CrawlFailure { keys })
}
