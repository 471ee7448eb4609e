// src/matching/match_finder.rs
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::search_client::{
    CreateWebsetRequest, SearchRequest, SearchService, WebsetCriterion, WebsetEntity,
};
use super::webset_poller::WebsetPoller;
use super::{build_query, MatchedProfile};
use crate::core::{guard, SearchMode};
use crate::error::{PipelineError, PipelineResult};
use crate::profile_analysis::PointOfInterest;

const SEARCH_CATEGORY: &str = "linkedin profile";

#[derive(Debug, Clone, Copy)]
pub struct SearchDeadlines {
    pub sync: Duration,
    pub create: Duration,
    pub items: Duration,
}

pub struct MatchFinder {
    service: Arc<dyn SearchService>,
    poller: WebsetPoller,
    mode: SearchMode,
    deadlines: SearchDeadlines,
    result_count: usize,
    webset_count: usize,
    entity: String,
}

impl MatchFinder {
    pub fn new(
        service: Arc<dyn SearchService>,
        poller: WebsetPoller,
        mode: SearchMode,
        deadlines: SearchDeadlines,
    ) -> Self {
        Self {
            service,
            poller,
            mode,
            deadlines,
            result_count: 5,
            webset_count: 10,
            entity: "person".to_string(),
        }
    }

    pub fn with_result_count(mut self, count: usize) -> Self {
        self.result_count = count;
        self
    }

    pub fn with_webset_count(mut self, count: usize) -> Self {
        self.webset_count = count;
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = entity.into();
        self
    }

    pub async fn find_matches(
        &self,
        career_goal: &str,
        points: &[PointOfInterest],
    ) -> PipelineResult<Vec<MatchedProfile>> {
        let query = build_query(career_goal, points);
        info!("Finding matches ({:?} mode): {}", self.mode, query);

        let profiles = match self.mode {
            SearchMode::Sync => self.search_once(query).await?,
            SearchMode::Webset => self.search_with_webset(query, points).await?,
        };

        info!("Matched {} profiles", profiles.len());
        Ok(profiles)
    }

    async fn search_once(&self, query: String) -> PipelineResult<Vec<MatchedProfile>> {
        let request = SearchRequest {
            query,
            num_results: self.result_count,
            category: SEARCH_CATEGORY.to_string(),
        };

        let response = guard(
            self.service.search(&request),
            self.deadlines.sync,
            format!(
                "Search request timed out after {}ms",
                self.deadlines.sync.as_millis()
            ),
        )
        .await?;

        debug!("Search reported {:?} total results", response.total);
        Ok(response
            .results
            .unwrap_or_default()
            .iter()
            .filter_map(MatchedProfile::from_hit)
            .take(self.result_count)
            .collect())
    }

    async fn search_with_webset(
        &self,
        query: String,
        points: &[PointOfInterest],
    ) -> PipelineResult<Vec<MatchedProfile>> {
        let request = CreateWebsetRequest {
            query,
            count: self.webset_count,
            criteria: points
                .iter()
                .map(|p| WebsetCriterion {
                    description: p.description.clone(),
                })
                .collect(),
            entity: Some(WebsetEntity {
                kind: self.entity.clone(),
            }),
        };

        let created = guard(
            self.service.create_webset(&request),
            self.deadlines.create,
            format!(
                "Search job creation timed out after {}ms",
                self.deadlines.create.as_millis()
            ),
        )
        .await?;

        if created.id.trim().is_empty() {
            return Err(PipelineError::InvalidResponse {
                service: "Search service",
                message: "search job creation reply carried no id".to_string(),
            });
        }

        let state = self.poller.wait_for_completion(&created).await?;
        if !state.has_items() {
            return Ok(Vec::new());
        }

        let items = guard(
            self.service.list_webset_items(&created.id),
            self.deadlines.items,
            format!(
                "Fetching search job items timed out after {}ms",
                self.deadlines.items.as_millis()
            ),
        )
        .await?;

        Ok(items
            .items
            .unwrap_or_default()
            .iter()
            .filter_map(MatchedProfile::from_item)
            .take(self.result_count)
            .collect())
    }
}
