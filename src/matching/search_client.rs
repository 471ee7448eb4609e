// src/matching/search_client.rs
//! People-search service: one-shot search and poll-based webset jobs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{Credential, ServiceClient};
use crate::error::PipelineResult;

const SEARCH_ENDPOINT: &str = "/search";
const WEBSETS_ENDPOINT: &str = "/websets/v0/websets";

// ===== Synchronous search =====

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    pub num_results: usize,
    pub category: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub results: Option<Vec<SearchHit>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

// ===== Webset jobs =====

#[derive(Debug, Clone, Serialize)]
pub struct CreateWebsetRequest {
    pub query: String,
    pub count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub criteria: Vec<WebsetCriterion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<WebsetEntity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebsetCriterion {
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebsetEntity {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebsetStatus {
    Created,
    Running,
    Idle,
    /// Anything else the service reports (e.g. `paused`) keeps the job polling
    #[serde(other)]
    Unknown,
}

/// Creation reply and poll reply. Polls may omit `id`, so the caller keeps the
/// id from the creation reply.
#[derive(Debug, Clone, Deserialize)]
pub struct Webset {
    #[serde(default)]
    pub id: String,
    pub status: WebsetStatus,
    #[serde(default)]
    pub searches: Option<Vec<WebsetSearch>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebsetSearch {
    #[serde(default)]
    pub progress: Option<SearchProgress>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SearchProgress {
    #[serde(default)]
    pub found: Option<u64>,
    #[serde(default)]
    pub analyzed: Option<u64>,
    #[serde(default)]
    pub completion: Option<f64>,
}

impl Webset {
    /// Profiles found so far across every search in the job
    pub fn found(&self) -> u64 {
        self.progress_iter().map(|p| p.found.unwrap_or(0)).sum()
    }

    pub fn analyzed(&self) -> u64 {
        self.progress_iter().map(|p| p.analyzed.unwrap_or(0)).sum()
    }

    pub fn completion(&self) -> f64 {
        self.progress_iter()
            .filter_map(|p| p.completion)
            .fold(0.0, f64::max)
    }

    fn progress_iter(&self) -> impl Iterator<Item = &SearchProgress> {
        self.searches
            .iter()
            .flatten()
            .filter_map(|search| search.progress.as_ref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebsetItemsResponse {
    #[serde(default, alias = "data")]
    pub items: Option<Vec<WebsetItem>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebsetItem {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub properties: Option<ItemProperties>,
    #[serde(default)]
    pub enrichments: Option<Vec<Enrichment>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemProperties {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub person: Option<PersonProperties>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonProperties {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub company: Option<CompanyProperties>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyProperties {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Enrichment {
    #[serde(default)]
    pub value: Option<String>,
}

#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> PipelineResult<SearchResponse>;
    async fn create_webset(&self, request: &CreateWebsetRequest) -> PipelineResult<Webset>;
    async fn get_webset(&self, id: &str) -> PipelineResult<Webset>;
    async fn list_webset_items(&self, id: &str) -> PipelineResult<WebsetItemsResponse>;
}

pub struct ExaSearchService {
    client: ServiceClient,
}

impl ExaSearchService {
    pub fn new(base_url: &str, api_key: &str) -> PipelineResult<Self> {
        Ok(Self {
            client: ServiceClient::new(
                "Search service",
                base_url,
                Credential::ApiKeyHeader(api_key),
            )?,
        })
    }
}

#[async_trait]
impl SearchService for ExaSearchService {
    async fn search(&self, request: &SearchRequest) -> PipelineResult<SearchResponse> {
        self.client.post_json(SEARCH_ENDPOINT, request).await
    }

    async fn create_webset(&self, request: &CreateWebsetRequest) -> PipelineResult<Webset> {
        self.client.post_json(WEBSETS_ENDPOINT, request).await
    }

    async fn get_webset(&self, id: &str) -> PipelineResult<Webset> {
        self.client
            .get(&format!("{}/{}", WEBSETS_ENDPOINT, id))
            .await
    }

    async fn list_webset_items(&self, id: &str) -> PipelineResult<WebsetItemsResponse> {
        self.client
            .get(&format!("{}/{}/items", WEBSETS_ENDPOINT, id))
            .await
    }
}
