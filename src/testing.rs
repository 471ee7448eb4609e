// src/testing.rs
//! In-process stand-ins for the remote services, used by unit tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::core::Sleeper;
use crate::error::{PipelineError, PipelineResult};
use crate::matching::search_client::{
    CreateWebsetRequest, SearchRequest, SearchResponse, SearchService, Webset,
    WebsetItemsResponse, WebsetStatus,
};
use crate::profile_analysis::crawler::{ContentsRequest, CrawlService};
use crate::profile_analysis::inference::{ChatMessage, InferenceService};

async fn maybe_delay(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

pub struct FakeCrawl {
    response: Value,
    delay: Option<Duration>,
    requests: Mutex<Vec<ContentsRequest>>,
}

impl FakeCrawl {
    pub fn returning(response: Value) -> Self {
        Self {
            response,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<ContentsRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CrawlService for FakeCrawl {
    async fn fetch_contents(&self, request: &ContentsRequest) -> PipelineResult<Value> {
        self.requests.lock().unwrap().push(request.clone());
        maybe_delay(self.delay).await;
        Ok(self.response.clone())
    }
}

pub struct FakeInference {
    output: Value,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, Vec<ChatMessage>)>>,
}

impl FakeInference {
    pub fn returning(output: Value) -> Self {
        Self {
            output,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Option<(String, Vec<ChatMessage>)> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl InferenceService for FakeInference {
    async fn generate(&self, model: &str, messages: &[ChatMessage]) -> PipelineResult<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), messages.to_vec()));
        maybe_delay(self.delay).await;
        Ok(self.output.clone())
    }
}

/// Scripted search service. Poll replies are served in order and the last
/// one repeats once the script runs out.
pub struct FakeSearch {
    search_response: SearchResponse,
    search_error: Mutex<Option<PipelineError>>,
    created: Webset,
    polls: Mutex<VecDeque<Webset>>,
    poll_delay: Option<Duration>,
    items: WebsetItemsResponse,
    searches: Mutex<Vec<SearchRequest>>,
    creates: Mutex<Vec<CreateWebsetRequest>>,
    poll_count: AtomicUsize,
    items_for: Mutex<Option<String>>,
}

impl Default for FakeSearch {
    fn default() -> Self {
        Self {
            search_response: SearchResponse::default(),
            search_error: Mutex::new(None),
            created: Webset {
                id: "ws_fake".to_string(),
                status: WebsetStatus::Idle,
                searches: None,
            },
            polls: Mutex::new(VecDeque::new()),
            poll_delay: None,
            items: WebsetItemsResponse::default(),
            searches: Mutex::new(Vec::new()),
            creates: Mutex::new(Vec::new()),
            poll_count: AtomicUsize::new(0),
            items_for: Mutex::new(None),
        }
    }
}

impl FakeSearch {
    pub fn with_search(mut self, response: SearchResponse) -> Self {
        self.search_response = response;
        self
    }

    pub fn failing_search(self, error: PipelineError) -> Self {
        *self.search_error.lock().unwrap() = Some(error);
        self
    }

    pub fn with_created(mut self, webset: Webset) -> Self {
        self.created = webset;
        self
    }

    pub fn with_polls(self, polls: Vec<Webset>) -> Self {
        *self.polls.lock().unwrap() = polls.into();
        self
    }

    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = Some(delay);
        self
    }

    pub fn with_items(mut self, items: WebsetItemsResponse) -> Self {
        self.items = items;
        self
    }

    pub fn last_search(&self) -> Option<SearchRequest> {
        self.searches.lock().unwrap().last().cloned()
    }

    pub fn last_create(&self) -> Option<CreateWebsetRequest> {
        self.creates.lock().unwrap().last().cloned()
    }

    pub fn poll_count(&self) -> usize {
        self.poll_count.load(Ordering::SeqCst)
    }

    pub fn items_fetched_for(&self) -> Option<String> {
        self.items_for.lock().unwrap().clone()
    }

    /// Every upstream call this fake has served
    pub fn calls(&self) -> usize {
        self.searches.lock().unwrap().len()
            + self.creates.lock().unwrap().len()
            + self.poll_count()
            + usize::from(self.items_fetched_for().is_some())
    }
}

#[async_trait]
impl SearchService for FakeSearch {
    async fn search(&self, request: &SearchRequest) -> PipelineResult<SearchResponse> {
        self.searches.lock().unwrap().push(request.clone());
        if let Some(error) = self.search_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(self.search_response.clone())
    }

    async fn create_webset(&self, request: &CreateWebsetRequest) -> PipelineResult<Webset> {
        self.creates.lock().unwrap().push(request.clone());
        Ok(self.created.clone())
    }

    async fn get_webset(&self, id: &str) -> PipelineResult<Webset> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        maybe_delay(self.poll_delay).await;

        let next = {
            let mut polls = self.polls.lock().unwrap();
            if polls.len() > 1 {
                polls.pop_front()
            } else {
                polls.front().cloned()
            }
        };
        next.ok_or_else(|| PipelineError::InvalidResponse {
            service: "Search service",
            message: format!("no scripted poll reply for {}", id),
        })
    }

    async fn list_webset_items(&self, id: &str) -> PipelineResult<WebsetItemsResponse> {
        *self.items_for.lock().unwrap() = Some(id.to_string());
        Ok(self.items.clone())
    }
}

/// Records requested delays instead of sleeping
#[derive(Default)]
pub struct RecordingSleeper {
    total: Mutex<Duration>,
}

impl RecordingSleeper {
    pub fn total(&self) -> Duration {
        *self.total.lock().unwrap()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        *self.total.lock().unwrap() += duration;
    }
}
