// src/web/types.rs

use rocket::http::{Header, Status};
use rocket::serde::json::Json;
use rocket::serde::Serialize;

use crate::error::PipelineError;

#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ErrorResponse {
    pub error: String,
}

/// What every failed request renders: an HTTP status plus `{error}`
pub type ApiError = (Status, Json<ErrorResponse>);

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    pub fn with_status(status: Status, error: impl Into<String>) -> ApiError {
        (status, Json(Self::new(error)))
    }
}

impl From<PipelineError> for ErrorResponse {
    fn from(err: PipelineError) -> Self {
        Self::new(err.to_string())
    }
}

/// Cross-origin headers, built once at startup and shared by every response
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "POST, OPTIONS".to_string(),
            allow_headers: "Content-Type".to_string(),
        }
    }
}

impl CorsPolicy {
    pub fn headers(&self) -> [Header<'static>; 3] {
        [
            Header::new("Access-Control-Allow-Origin", self.allow_origin.clone()),
            Header::new("Access-Control-Allow-Methods", self.allow_methods.clone()),
            Header::new("Access-Control-Allow-Headers", self.allow_headers.clone()),
        ]
    }
}
