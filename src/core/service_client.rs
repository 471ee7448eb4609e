// src/core/service_client.rs
//! Shared JSON-over-HTTP client for the crawl, inference and search services

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use tracing::{debug, error};

use crate::error::{PipelineError, PipelineResult};

/// How a service expects its credential
#[derive(Debug, Clone, Copy)]
pub enum Credential<'a> {
    Bearer(&'a str),
    ApiKeyHeader(&'a str),
}

pub struct ServiceClient {
    client: reqwest::Client,
    base_url: String,
    service: &'static str,
}

impl ServiceClient {
    /// Per-call deadlines are enforced by the timeout guard, not by the client
    pub fn new(
        service: &'static str,
        base_url: &str,
        credential: Credential<'_>,
    ) -> PipelineResult<Self> {
        let mut headers = HeaderMap::new();
        match credential {
            Credential::Bearer(token) => {
                headers.insert(AUTHORIZATION, header_value(service, &format!("Bearer {}", token))?);
            }
            Credential::ApiKeyHeader(key) => {
                headers.insert(HeaderName::from_static("x-api-key"), header_value(service, key)?);
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PipelineError::Transport {
                service,
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service,
        })
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// POST a JSON body, decode a JSON reply
    pub async fn post_json<T, R>(&self, endpoint: &str, payload: &T) -> PipelineResult<R>
    where
        T: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let url = self.url(endpoint);
        debug!("POST {} ({})", url, self.service);

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.decode(response).await
    }

    pub async fn get<R>(&self, endpoint: &str) -> PipelineResult<R>
    where
        R: serde::de::DeserializeOwned,
    {
        let url = self.url(endpoint);
        debug!("GET {} ({})", url, self.service);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.decode(response).await
    }

    async fn decode<R>(&self, response: reqwest::Response) -> PipelineResult<R>
    where
        R: serde::de::DeserializeOwned,
    {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            error!("{} error {}: {}", self.service, status, body);
            return Err(PipelineError::Upstream {
                service: self.service,
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<R>(&body).map_err(|e| PipelineError::InvalidResponse {
            service: self.service,
            message: format!("{} (body: {})", e, crate::utils::truncate_chars(&body, 200)),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> PipelineError {
        error!("{} request failed: {}", self.service, e);
        PipelineError::Transport {
            service: self.service,
            message: e.to_string(),
        }
    }
}

fn header_value(service: &'static str, value: &str) -> PipelineResult<HeaderValue> {
    let mut value = HeaderValue::from_str(value).map_err(|_| PipelineError::Transport {
        service,
        message: "Credential contains characters not allowed in a header".to_string(),
    })?;
    value.set_sensitive(true);
    Ok(value)
}
