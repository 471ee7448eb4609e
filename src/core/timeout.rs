// src/core/timeout.rs
//! Deadline guard for single upstream calls

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{PipelineError, PipelineResult};

/// Races `operation` against `deadline`.
///
/// When the deadline fires first the operation future is dropped, which aborts any
/// in-flight `reqwest` request it owns, and a `Timeout` carrying `message` is returned.
/// Otherwise the operation's own outcome is returned untouched.
pub async fn guard<F, T>(
    operation: F,
    deadline: Duration,
    message: impl Into<String>,
) -> PipelineResult<T>
where
    F: Future<Output = PipelineResult<T>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(outcome) => outcome,
        Err(_) => {
            let message = message.into();
            warn!("{} (deadline {}ms)", message, deadline.as_millis());
            Err(PipelineError::Timeout { message })
        }
    }
}
