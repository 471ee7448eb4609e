// src/matching/webset_poller.rs
//! Drives an asynchronous webset job until its items can be fetched.
//!
//! ```text
//! Created ──► Running ──► Idle
//!                 │  ├──► EarlyExit            (enough found after enough polls)
//!                 │  └──► TimeoutWithResults   (attempts spent, something found)
//!                 └─────► TimeoutNoResults     (attempts spent, nothing found)
//! ```
//!
//! Every state except `TimeoutNoResults` leads to item retrieval.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use super::search_client::{SearchService, Webset, WebsetStatus};
use crate::core::{guard, Sleeper};
use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JobState {
    Created,
    Running { attempt: u32, found: u64 },
    Idle { found: u64 },
    EarlyExit { attempt: u32, found: u64 },
    TimeoutWithResults { attempts: u32, found: u64 },
    TimeoutNoResults { attempts: u32 },
}

impl JobState {
    /// Terminal states whose items are worth fetching
    pub fn has_items(&self) -> bool {
        matches!(
            self,
            Self::Idle { .. } | Self::EarlyExit { .. } | Self::TimeoutWithResults { .. }
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    /// Early exit is only considered from this attempt on
    pub early_exit_min_attempts: u32,
    pub early_exit_min_found: u64,
}

impl PollPolicy {
    /// Next state after observing `webset` on poll number `attempt` (0 = creation reply)
    pub fn observe(&self, attempt: u32, webset: &Webset) -> JobState {
        let found = webset.found();

        if webset.status == WebsetStatus::Idle {
            return JobState::Idle { found };
        }
        if attempt >= self.early_exit_min_attempts && found >= self.early_exit_min_found {
            return JobState::EarlyExit { attempt, found };
        }
        if attempt >= self.max_attempts {
            return self.out_of_time(attempt, found);
        }
        JobState::Running { attempt, found }
    }

    /// State once polling has to stop before the job went idle
    pub fn out_of_time(&self, attempts: u32, found: u64) -> JobState {
        if found > 0 {
            JobState::TimeoutWithResults { attempts, found }
        } else {
            JobState::TimeoutNoResults { attempts }
        }
    }

    /// Wall-clock budget for the whole poll loop, poll latency included
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

pub struct WebsetPoller {
    service: Arc<dyn SearchService>,
    sleeper: Arc<dyn Sleeper>,
    policy: PollPolicy,
    poll_deadline: Duration,
}

impl WebsetPoller {
    pub fn new(
        service: Arc<dyn SearchService>,
        sleeper: Arc<dyn Sleeper>,
        policy: PollPolicy,
        poll_deadline: Duration,
    ) -> Self {
        Self {
            service,
            sleeper,
            policy,
            poll_deadline,
        }
    }

    /// Polls until a terminal state or until `max_wait` has elapsed. Fails with
    /// `MatchTimeout` when polling stops and nothing was found; any other failed
    /// poll fails the whole run.
    pub async fn wait_for_completion(&self, created: &Webset) -> PipelineResult<JobState> {
        let job_id = created.id.as_str();
        let started = Instant::now();
        let budget = self.policy.max_wait();
        info!("Webset {} created with status {:?}", job_id, created.status);

        let mut state = self.transition(job_id, JobState::Created, 0, created);

        while let JobState::Running { attempt, found } = state {
            let remaining = budget.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                warn!("Webset {} polling budget spent after {} polls", job_id, attempt);
                state = self.policy.out_of_time(attempt, found);
                break;
            }
            self.sleeper.sleep(self.policy.interval.min(remaining)).await;

            let attempt = attempt + 1;
            let deadline = self
                .poll_deadline
                .min(budget.saturating_sub(started.elapsed()));
            let polled = guard(
                self.service.get_webset(job_id),
                deadline,
                format!(
                    "Search job poll {} timed out after {}ms",
                    attempt,
                    deadline.as_millis()
                ),
            )
            .await;

            let webset = match polled {
                Ok(webset) => webset,
                // The budget, not the per-poll deadline, cut this poll short
                Err(PipelineError::Timeout { .. }) if deadline < self.poll_deadline => {
                    warn!("Webset {} polling budget spent during poll {}", job_id, attempt);
                    state = self.policy.out_of_time(attempt, found);
                    break;
                }
                Err(e) => return Err(e),
            };

            info!(
                "Webset {} poll {}/{}: status {:?}, found {}, analyzed {}, completion {:.0}%",
                job_id,
                attempt,
                self.policy.max_attempts,
                webset.status,
                webset.found(),
                webset.analyzed(),
                webset.completion()
            );

            state = self.transition(job_id, state, attempt, &webset);
        }

        match state {
            JobState::TimeoutNoResults { attempts } => {
                warn!("Webset {} found nothing after {} polls", job_id, attempts);
                Err(PipelineError::MatchTimeout {
                    job_id: job_id.to_string(),
                    attempts,
                })
            }
            JobState::EarlyExit { attempt, found } => {
                info!(
                    "Webset {} early exit at poll {} with {} found",
                    job_id, attempt, found
                );
                Ok(state)
            }
            JobState::TimeoutWithResults { attempts, found } => {
                warn!(
                    "Webset {} still running after {} polls, continuing with {} found",
                    job_id, attempts, found
                );
                Ok(state)
            }
            _ => Ok(state),
        }
    }

    fn transition(&self, job_id: &str, from: JobState, attempt: u32, webset: &Webset) -> JobState {
        let to = self.policy.observe(attempt, webset);
        tracing::debug!("Webset {} {:?} -> {:?}", job_id, from, to);
        to
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::search_client::{SearchProgress, WebsetSearch};
    use crate::testing::{FakeSearch, RecordingSleeper};

    fn policy() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(2000),
            max_attempts: 30,
            early_exit_min_attempts: 15,
            early_exit_min_found: 3,
        }
    }

    fn webset(status: WebsetStatus, found: u64) -> Webset {
        Webset {
            id: "ws_test".to_string(),
            status,
            searches: Some(vec![WebsetSearch {
                progress: Some(SearchProgress {
                    found: Some(found),
                    analyzed: Some(found * 4),
                    completion: Some(50.0),
                }),
            }]),
        }
    }

    fn poller(search: Arc<FakeSearch>, sleeper: Arc<RecordingSleeper>) -> WebsetPoller {
        WebsetPoller::new(search, sleeper, policy(), Duration::from_secs(1))
    }

    #[test]
    fn test_observe_transitions() {
        let p = policy();
        assert_eq!(
            p.observe(0, &webset(WebsetStatus::Idle, 4)),
            JobState::Idle { found: 4 }
        );
        assert_eq!(
            p.observe(3, &webset(WebsetStatus::Running, 5)),
            JobState::Running {
                attempt: 3,
                found: 5
            }
        );
        assert_eq!(
            p.observe(15, &webset(WebsetStatus::Running, 3)),
            JobState::EarlyExit {
                attempt: 15,
                found: 3
            }
        );
        assert_eq!(
            p.observe(30, &webset(WebsetStatus::Running, 1)),
            JobState::TimeoutWithResults {
                attempts: 30,
                found: 1
            }
        );
        assert_eq!(
            p.observe(30, &webset(WebsetStatus::Created, 0)),
            JobState::TimeoutNoResults { attempts: 30 }
        );
    }

    #[test]
    fn test_state_classification() {
        assert!(!JobState::Created.has_items());
        assert!(JobState::Idle { found: 0 }.has_items());
        assert!(JobState::TimeoutWithResults { attempts: 1, found: 1 }.has_items());
        assert!(!JobState::TimeoutNoResults { attempts: 1 }.has_items());
    }

    #[tokio::test]
    async fn test_idle_on_creation_skips_polling() {
        let search = Arc::new(FakeSearch::default());
        let sleeper = Arc::new(RecordingSleeper::default());

        let state = poller(search.clone(), sleeper.clone())
            .wait_for_completion(&webset(WebsetStatus::Idle, 2))
            .await
            .unwrap();

        assert_eq!(state, JobState::Idle { found: 2 });
        assert_eq!(search.poll_count(), 0);
        assert_eq!(sleeper.total(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_polls_until_idle() {
        let search = Arc::new(FakeSearch::default().with_polls(vec![
            webset(WebsetStatus::Running, 0),
            webset(WebsetStatus::Running, 1),
            webset(WebsetStatus::Idle, 2),
        ]));
        let sleeper = Arc::new(RecordingSleeper::default());

        let state = poller(search.clone(), sleeper.clone())
            .wait_for_completion(&webset(WebsetStatus::Created, 0))
            .await
            .unwrap();

        assert_eq!(state, JobState::Idle { found: 2 });
        assert_eq!(search.poll_count(), 3);
        assert_eq!(sleeper.total(), Duration::from_millis(6000));
    }

    #[tokio::test]
    async fn test_early_exit_once_enough_found() {
        let search = Arc::new(FakeSearch::default().with_polls(
            (0..30).map(|_| webset(WebsetStatus::Running, 4)).collect(),
        ));
        let sleeper = Arc::new(RecordingSleeper::default());

        let state = poller(search.clone(), sleeper)
            .wait_for_completion(&webset(WebsetStatus::Running, 0))
            .await
            .unwrap();

        assert_eq!(
            state,
            JobState::EarlyExit {
                attempt: 15,
                found: 4
            }
        );
        assert_eq!(search.poll_count(), 15);
    }

    #[tokio::test]
    async fn test_exhausted_with_results_proceeds() {
        let search = Arc::new(FakeSearch::default().with_polls(
            (0..40).map(|_| webset(WebsetStatus::Running, 1)).collect(),
        ));
        let sleeper = Arc::new(RecordingSleeper::default());

        let state = poller(search.clone(), sleeper.clone())
            .wait_for_completion(&webset(WebsetStatus::Running, 0))
            .await
            .unwrap();

        assert_eq!(
            state,
            JobState::TimeoutWithResults {
                attempts: 30,
                found: 1
            }
        );
        assert_eq!(search.poll_count(), 30);
        assert!(sleeper.total() <= policy().max_wait());
    }

    #[tokio::test]
    async fn test_exhausted_without_results_fails() {
        // Fewer scripted replies than attempts: the fake repeats its last one
        let search = Arc::new(
            FakeSearch::default().with_polls(vec![webset(WebsetStatus::Running, 0)]),
        );
        let sleeper = Arc::new(RecordingSleeper::default());

        let err = poller(search.clone(), sleeper.clone())
            .wait_for_completion(&webset(WebsetStatus::Created, 0))
            .await
            .unwrap_err();

        match err {
            PipelineError::MatchTimeout { job_id, attempts } => {
                assert_eq!(job_id, "ws_test");
                assert_eq!(attempts, 30);
            }
            other => panic!("expected match timeout, got {:?}", other),
        }
        assert_eq!(search.poll_count(), 30);
        assert_eq!(sleeper.total(), policy().max_wait());
    }

    #[tokio::test]
    async fn test_poll_timeout_fails_run() {
        let search = Arc::new(
            FakeSearch::default()
                .with_polls(vec![webset(WebsetStatus::Running, 0)])
                .with_poll_delay(Duration::from_secs(5)),
        );
        let sleeper = Arc::new(RecordingSleeper::default());
        let poller = WebsetPoller::new(search, sleeper, policy(), Duration::from_millis(10));

        match poller
            .wait_for_completion(&webset(WebsetStatus::Running, 0))
            .await
        {
            Err(PipelineError::Timeout { message }) => assert!(message.contains("poll 1")),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    fn slow_poller(search: Arc<FakeSearch>) -> WebsetPoller {
        WebsetPoller::new(
            search,
            Arc::new(crate::core::TokioSleeper),
            PollPolicy {
                interval: Duration::from_millis(20),
                max_attempts: 5,
                early_exit_min_attempts: 5,
                early_exit_min_found: 100,
            },
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_slow_polls_stay_within_wall_budget() {
        let search = Arc::new(
            FakeSearch::default()
                .with_polls(vec![webset(WebsetStatus::Running, 1)])
                .with_poll_delay(Duration::from_millis(30)),
        );
        let budget = Duration::from_millis(100);

        let started = std::time::Instant::now();
        let state = slow_poller(search.clone())
            .wait_for_completion(&webset(WebsetStatus::Running, 0))
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(
            matches!(state, JobState::TimeoutWithResults { found: 1, .. }),
            "{:?}",
            state
        );
        assert!(search.poll_count() < 5);
        assert!(
            elapsed < budget + Duration::from_millis(75),
            "took {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_slow_polls_with_nothing_found_time_out() {
        let search = Arc::new(
            FakeSearch::default()
                .with_polls(vec![webset(WebsetStatus::Running, 0)])
                .with_poll_delay(Duration::from_millis(30)),
        );

        let started = std::time::Instant::now();
        let err = slow_poller(search)
            .wait_for_completion(&webset(WebsetStatus::Running, 0))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::MatchTimeout { .. }), "{:?}", err);
        assert!(started.elapsed() < Duration::from_millis(175));
    }
}
