// src/profile_analysis/inference.rs
//! Text-generation capability and the rules for finding text in its opaque replies

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::core::{Credential, ServiceClient};
use crate::error::PipelineResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    messages: &'a [ChatMessage],
}

/// A model runner. The returned value is whatever the service produced.
#[async_trait]
pub trait InferenceService: Send + Sync {
    async fn generate(&self, model: &str, messages: &[ChatMessage]) -> PipelineResult<Value>;
}

/// Workers-AI style REST runner: `POST {base}/{model}` with `{messages}`
pub struct HttpInferenceService {
    client: ServiceClient,
}

impl HttpInferenceService {
    pub fn new(base_url: &str, api_token: &str) -> PipelineResult<Self> {
        Ok(Self {
            client: ServiceClient::new("Inference service", base_url, Credential::Bearer(api_token))?,
        })
    }
}

#[async_trait]
impl InferenceService for HttpInferenceService {
    async fn generate(&self, model: &str, messages: &[ChatMessage]) -> PipelineResult<Value> {
        let endpoint = format!("/{}", model.trim_start_matches('/'));
        info!("Running model {} with {} messages", model, messages.len());

        let body: Value = self
            .client
            .post_json(&endpoint, &GenerateRequest { messages })
            .await?;

        // REST envelopes wrap the model output in `result`
        Ok(match body {
            Value::Object(mut object) if object.contains_key("result") => {
                object.remove("result").unwrap_or(Value::Null)
            }
            other => other,
        })
    }
}

type PayloadStrategy = fn(&Value) -> Option<String>;

/// Ordered rules for locating the generated text inside an opaque reply
const PAYLOAD_STRATEGIES: &[(&str, PayloadStrategy)] = &[
    ("plain_string", plain_string),
    ("response_field", response_field),
    ("text_field", text_field),
    ("content_field", content_field),
    ("message_field", message_field),
];

/// Returns the model's text, falling back to the whole value serialized
pub fn payload_text(output: &Value) -> String {
    for (name, strategy) in PAYLOAD_STRATEGIES {
        if let Some(text) = strategy(output) {
            debug!("Located inference payload via {}", name);
            return text;
        }
    }
    debug!("Inference payload not found in known fields, using full output");
    output.to_string()
}

fn plain_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn response_field(value: &Value) -> Option<String> {
    string_field(value, "response")
}

fn text_field(value: &Value) -> Option<String> {
    string_field(value, "text")
}

fn content_field(value: &Value) -> Option<String> {
    string_field(value, "content")
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// `message` may be a string or a chat message object
fn message_field(value: &Value) -> Option<String> {
    let message = value.get("message")?;
    message
        .as_str()
        .or_else(|| message.get("content").and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}
