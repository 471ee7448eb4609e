// src/dispatcher.rs
//! Request entry point: validates the inbound shape and runs the matching pipeline stages

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::core::{AppConfig, TokioSleeper};
use crate::error::{PipelineError, PipelineResult};
use crate::matching::match_finder::SearchDeadlines;
use crate::matching::{ExaSearchService, MatchFinder, MatchedProfile, PollPolicy, WebsetPoller};
use crate::profile_analysis::{
    CareerCriteria, CriteriaExtractor, ExaCrawlService, HttpInferenceService, InterestType,
    PointOfInterest, ProfileCrawler,
};

/// Number of points a match request must carry
pub const REQUIRED_SELECTED_POINTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerRequest {
    Analyze {
        linkedin_url: String,
    },
    Match {
        career_goal: String,
        selected_points: Vec<PointOfInterest>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWorkerRequest {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    linkedin_url: Option<String>,
    #[serde(default)]
    career_goal: Option<String>,
    #[serde(default)]
    selected_points: Option<Vec<RawPoint>>,
}

#[derive(Debug, Deserialize)]
struct RawPoint {
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WorkerResponse {
    Analyze {
        criteria: CareerCriteria,
    },
    Match {
        #[serde(rename = "matchedProfiles")]
        matched_profiles: Vec<MatchedProfile>,
    },
}

impl WorkerRequest {
    /// Parses and validates a raw body. Nothing here touches the network.
    pub fn parse(body: &str) -> PipelineResult<Self> {
        let raw: RawWorkerRequest = serde_json::from_str(body)
            .map_err(|e| PipelineError::validation(format!("Invalid JSON body: {}", e)))?;

        match raw.mode.as_deref().map(str::trim).unwrap_or("analyze") {
            "analyze" => {
                let url = raw
                    .linkedin_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| PipelineError::validation("linkedinUrl is required"))?;
                validate_profile_url(url)?;
                Ok(Self::Analyze {
                    linkedin_url: url.to_string(),
                })
            }
            "match" => {
                let goal = raw
                    .career_goal
                    .as_deref()
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .ok_or_else(|| PipelineError::validation("careerGoal is required"))?;

                let points = raw.selected_points.unwrap_or_default();
                if points.len() != REQUIRED_SELECTED_POINTS {
                    return Err(PipelineError::validation(format!(
                        "selectedPoints must contain exactly {} points, got {}",
                        REQUIRED_SELECTED_POINTS,
                        points.len()
                    )));
                }

                let selected_points = points
                    .into_iter()
                    .enumerate()
                    .map(|(index, point)| point.into_point(index))
                    .collect::<PipelineResult<Vec<_>>>()?;

                Ok(Self::Match {
                    career_goal: goal.to_string(),
                    selected_points,
                })
            }
            other => Err(PipelineError::validation(format!(
                "Unknown mode '{}', expected 'analyze' or 'match'",
                other
            ))),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Analyze { .. } => "analyze",
            Self::Match { .. } => "match",
        }
    }
}

impl RawPoint {
    fn into_point(self, index: usize) -> PipelineResult<PointOfInterest> {
        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                PipelineError::validation(format!(
                    "selectedPoints[{}].description is required",
                    index
                ))
            })?
            .to_string();

        let kind = self
            .kind
            .filter(|k| !k.trim().is_empty())
            .map(InterestType::from)
            .unwrap_or(InterestType::Background);

        Ok(PointOfInterest { description, kind })
    }
}

fn validate_profile_url(url: &str) -> PipelineResult<()> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|_| PipelineError::validation(format!("linkedinUrl is not a valid URL: {}", url)))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(PipelineError::validation(format!(
            "linkedinUrl must be an http(s) URL: {}",
            url
        )));
    }
    Ok(())
}

pub struct Dispatcher {
    crawler: ProfileCrawler,
    extractor: CriteriaExtractor,
    matcher: MatchFinder,
}

impl Dispatcher {
    pub fn new(crawler: ProfileCrawler, extractor: CriteriaExtractor, matcher: MatchFinder) -> Self {
        Self {
            crawler,
            extractor,
            matcher,
        }
    }

    /// Wire the HTTP-backed services from a validated configuration
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let crawl_service = ExaCrawlService::new(&config.crawler.base_url, &config.crawler.api_key)
            .context("Failed to create crawler client")?;
        let inference_service =
            HttpInferenceService::new(&config.inference.base_url, &config.inference.api_token)
                .context("Failed to create inference client")?;
        let search_service: Arc<ExaSearchService> = Arc::new(
            ExaSearchService::new(&config.search.base_url, &config.search.api_key)
                .context("Failed to create search client")?,
        );

        let search = &config.search;
        let poller = WebsetPoller::new(
            search_service.clone(),
            Arc::new(TokioSleeper),
            PollPolicy {
                interval: search.poll_interval(),
                max_attempts: search.max_attempts,
                early_exit_min_attempts: search.early_exit_min_attempts,
                early_exit_min_found: search.early_exit_min_found,
            },
            Duration::from_millis(search.poll_timeout_ms),
        );

        let matcher = MatchFinder::new(
            search_service,
            poller,
            search.mode,
            SearchDeadlines {
                sync: Duration::from_millis(search.sync_timeout_ms),
                create: Duration::from_millis(search.create_timeout_ms),
                items: Duration::from_millis(search.items_timeout_ms),
            },
        )
        .with_result_count(search.result_count)
        .with_webset_count(search.webset_count)
        .with_entity(search.entity.clone());

        Ok(Self::new(
            ProfileCrawler::new(
                Arc::new(crawl_service),
                config.crawler.max_characters,
                config.crawler.deadline(),
            ),
            CriteriaExtractor::new(
                Arc::new(inference_service),
                config.inference.model.clone(),
                config.inference.profile_char_budget,
                config.inference.deadline(),
            ),
            matcher,
        ))
    }

    /// Parse, validate and run one raw request body
    pub async fn dispatch(&self, body: &str) -> PipelineResult<WorkerResponse> {
        let request_id = Uuid::new_v4();
        let span = info_span!("request", id = %request_id);

        async {
            let outcome = match WorkerRequest::parse(body) {
                Ok(request) => self.run(request).await,
                Err(e) => Err(e),
            };
            if let Err(e) = &outcome {
                error!("Request failed [{}]: {}", e.kind(), e);
            }
            outcome
        }
        .instrument(span)
        .await
    }

    pub async fn run(&self, request: WorkerRequest) -> PipelineResult<WorkerResponse> {
        info!("Handling {} request", request.mode());

        match request {
            WorkerRequest::Analyze { linkedin_url } => {
                let criteria = self.analyze(&linkedin_url).await?;
                Ok(WorkerResponse::Analyze { criteria })
            }
            WorkerRequest::Match {
                career_goal,
                selected_points,
            } => {
                let matched_profiles = self
                    .matcher
                    .find_matches(&career_goal, &selected_points)
                    .await?;
                Ok(WorkerResponse::Match { matched_profiles })
            }
        }
    }

    /// Crawl then extract, strictly in sequence
    pub async fn analyze(&self, profile_url: &str) -> PipelineResult<CareerCriteria> {
        let profile_text = self.crawler.crawl_profile(profile_url).await?;
        self.extractor.extract_criteria(&profile_text).await
    }
}
