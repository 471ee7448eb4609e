// src/error.rs
//! Typed failures for the crawl → extract → match pipeline

use rocket::http::Status;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Malformed or missing request fields, raised before any upstream call
    #[error("{0}")]
    Validation(String),

    #[error("Crawler returned no usable text (response keys: [{}])", keys.join(", "))]
    CrawlFailure { keys: Vec<String> },

    #[error("Failed to extract career criteria: {0}")]
    ExtractionFailure(String),

    #[error("Search job {job_id} found no profiles after {attempts} polling attempts")]
    MatchTimeout { job_id: String, attempts: u32 },

    #[error("{service} returned error {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{message}")]
    Timeout { message: String },

    #[error("Failed to reach {service}: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    #[error("Unexpected response from {service}: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status_code(&self) -> Status {
        match self {
            Self::Validation(_) => Status::BadRequest,
            _ => Status::InternalServerError,
        }
    }

    /// Short machine-readable tag used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::CrawlFailure { .. } => "CRAWL_FAILURE",
            Self::ExtractionFailure(_) => "EXTRACTION_FAILURE",
            Self::MatchTimeout { .. } => "MATCH_TIMEOUT",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::InvalidResponse { .. } => "INVALID_RESPONSE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = PipelineError::validation("careerGoal is required");
        assert_eq!(err.status_code(), Status::BadRequest);
        assert_eq!(err.to_string(), "careerGoal is required");
    }

    #[test]
    fn test_downstream_failures_map_to_internal_error() {
        let errors = vec![
            PipelineError::CrawlFailure { keys: vec![] },
            PipelineError::ExtractionFailure("no points".to_string()),
            PipelineError::MatchTimeout {
                job_id: "ws_1".to_string(),
                attempts: 30,
            },
            PipelineError::Timeout {
                message: "Inference request timed out".to_string(),
            },
        ];
        for err in errors {
            assert_eq!(err.status_code(), Status::InternalServerError);
        }
    }

    #[test]
    fn test_crawl_failure_names_keys() {
        let err = PipelineError::CrawlFailure {
            keys: vec!["requestId".to_string(), "statuses".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Crawler returned no usable text (response keys: [requestId, statuses])"
        );
    }

    #[test]
    fn test_upstream_message_carries_status_and_body() {
        let err = PipelineError::Upstream {
            service: "Search service",
            status: 429,
            body: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "Search service returned error 429: rate limited");
    }
}
