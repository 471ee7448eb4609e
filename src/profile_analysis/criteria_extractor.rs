// src/profile_analysis/criteria_extractor.rs
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::inference::{payload_text, ChatMessage, InferenceService};
use super::{CareerCriteria, InterestType, PointOfInterest, MAX_POINTS_OF_INTEREST};
use crate::core::guard;
use crate::error::{PipelineError, PipelineResult};
use crate::utils::truncate_chars;

pub struct CriteriaExtractor {
    service: Arc<dyn InferenceService>,
    model: String,
    char_budget: usize,
    deadline: Duration,
}

impl CriteriaExtractor {
    pub fn new(
        service: Arc<dyn InferenceService>,
        model: impl Into<String>,
        char_budget: usize,
        deadline: Duration,
    ) -> Self {
        Self {
            service,
            model: model.into(),
            char_budget,
            deadline,
        }
    }

    pub async fn extract_criteria(&self, profile_text: &str) -> PipelineResult<CareerCriteria> {
        if profile_text.trim().is_empty() {
            return Err(PipelineError::ExtractionFailure(
                "profile text is empty".to_string(),
            ));
        }

        let excerpt = truncate_chars(profile_text, self.char_budget);
        let messages = vec![ChatMessage::user(build_prompt(excerpt))];

        info!(
            "Extracting criteria from {} characters with {}",
            excerpt.chars().count(),
            self.model
        );

        let output = guard(
            self.service.generate(&self.model, &messages),
            self.deadline,
            format!(
                "Inference request timed out after {}ms while extracting career criteria",
                self.deadline.as_millis()
            ),
        )
        .await?;

        let text = payload_text(&output);
        let points = parse_points_of_interest(&text)?;

        info!("Extracted {} points of interest", points.len());
        Ok(CareerCriteria {
            points_of_interest: points,
        })
    }
}

fn build_prompt(profile_text: &str) -> String {
    format!(
        r#"You are a career analyst. Read the professional profile below and identify the 3 to 10 most distinctive points of interest that would help find people with a similar career path.

Each point of interest must have:
- "description": one short, specific sentence (e.g. "Studied Computer Science at Stanford")
- "type": one of "education", "experience", "skill", "achievement", "background"

Order the points from most to least impactful.

Respond ONLY with a JSON array, no prose and no markdown, like:
[{{"description": "...", "type": "education"}}]

PROFILE:
{}"#,
        profile_text
    )
}

type ParseStrategy = fn(&str) -> Option<Vec<Value>>;

/// Tried in order; the first one that yields an array wins
const PARSE_STRATEGIES: &[(&str, ParseStrategy)] = &[
    ("whole_response", parse_whole_response),
    ("bracketed_array", parse_bracketed_array),
    ("fenced_block", parse_fenced_block),
];

pub fn parse_points_of_interest(text: &str) -> PipelineResult<Vec<PointOfInterest>> {
    let entries = PARSE_STRATEGIES
        .iter()
        .find_map(|(name, strategy)| {
            let entries = strategy(text)?;
            debug!("Parsed model output with {} strategy", name);
            Some(entries)
        })
        .ok_or_else(|| {
            warn!(
                "Unparsable model output: {}",
                truncate_chars(text, 300)
            );
            PipelineError::ExtractionFailure("model output contained no JSON array".to_string())
        })?;

    let candidates = entries.len();
    let points: Vec<PointOfInterest> = entries
        .iter()
        .filter_map(validate_entry)
        .take(MAX_POINTS_OF_INTEREST)
        .collect();

    if points.is_empty() {
        return Err(PipelineError::ExtractionFailure(format!(
            "none of the {} entries returned by the model was a valid point of interest",
            candidates
        )));
    }

    Ok(points)
}

fn validate_entry(entry: &Value) -> Option<PointOfInterest> {
    let description = entry.get("description")?.as_str()?.trim();
    let kind = entry.get("type")?.as_str()?.trim();
    if description.is_empty() || kind.is_empty() {
        return None;
    }
    Some(PointOfInterest {
        description: description.to_string(),
        kind: InterestType::from(kind.to_string()),
    })
}

/// Arrays are taken as-is; objects are unwrapped via `pointsOfInterest` or `results`
fn as_entries(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut object) => ["pointsOfInterest", "results"]
            .iter()
            .find_map(|key| match object.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            }),
        _ => None,
    }
}

fn parse_whole_response(text: &str) -> Option<Vec<Value>> {
    serde_json::from_str::<Value>(text.trim())
        .ok()
        .and_then(as_entries)
}

fn parse_bracketed_array(text: &str) -> Option<Vec<Value>> {
    text.match_indices('[').find_map(|(start, _)| {
        let end = matching_bracket_end(text, start)?;
        serde_json::from_str::<Vec<Value>>(&text[start..end]).ok()
    })
}

/// Byte index one past the `]` closing the `[` at `start`, ignoring brackets in strings
fn matching_bracket_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_fenced_block(text: &str) -> Option<Vec<Value>> {
    // Odd segments sit between a pair of fences
    text.split("```").skip(1).step_by(2).find_map(|block| {
        let body = match block.split_once('\n') {
            Some((tag, rest)) if is_language_tag(tag) => rest,
            _ => block,
        };
        serde_json::from_str::<Value>(body.trim())
            .ok()
            .and_then(as_entries)
    })
}

fn is_language_tag(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeInference;
    use serde_json::json;

    #[test]
    fn test_parses_plain_array() {
        let points = parse_points_of_interest(
            r#"[{"description":"Studied at Stanford","type":"education"}]"#,
        )
        .unwrap();
        assert_eq!(
            points,
            vec![PointOfInterest {
                description: "Studied at Stanford".to_string(),
                kind: InterestType::Education,
            }]
        );
    }

    #[test]
    fn test_unwraps_object_wrappers() {
        let wrapped = r#"{"pointsOfInterest":[{"description":"Led a team","type":"experience"}]}"#;
        assert_eq!(parse_points_of_interest(wrapped).unwrap().len(), 1);

        let results = r#"{"results":[{"description":"Rust","type":"skill"}]}"#;
        assert_eq!(
            parse_points_of_interest(results).unwrap()[0].kind,
            InterestType::Skill
        );
    }

    #[test]
    fn test_finds_array_inside_prose() {
        let text = r#"Sure! Here are the points [as requested]:
[{"description":"Won a hackathon [2019]","type":"achievement"}]
Hope this helps."#;
        let points = parse_points_of_interest(text).unwrap();
        assert_eq!(points[0].description, "Won a hackathon [2019]");
    }

    #[test]
    fn test_fenced_block_parses_when_whole_response_fails() {
        let text = "Here you go:\n```json\n[{\"description\":\"Grew up in Lagos\",\"type\":\"background\"}]\n```";
        assert!(parse_whole_response(text).is_none());
        assert_eq!(parse_fenced_block(text).unwrap().len(), 1);
        assert_eq!(
            parse_points_of_interest(text).unwrap()[0].kind,
            InterestType::Background
        );
    }

    #[test]
    fn test_fenced_object_wrapper() {
        let text = "```\n{\"pointsOfInterest\": [{\"description\":\"x\",\"type\":\"skill\"}]}\n```";
        assert_eq!(parse_fenced_block(text).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_entries_are_dropped() {
        let text = r#"[
            {"description":"","type":"skill"},
            {"description":"Kept","type":"experience"},
            {"description":"No type"},
            {"description":"Odd type","type":"hobby"},
            "not an object"
        ]"#;
        let points = parse_points_of_interest(text).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].description, "Kept");
        assert_eq!(points[1].kind, InterestType::Other("hobby".to_string()));
    }

    #[test]
    fn test_caps_at_ten_in_response_order() {
        let entries: Vec<Value> = (0..14)
            .map(|i| json!({"description": format!("point {}", i), "type": "skill"}))
            .collect();
        let points = parse_points_of_interest(&Value::Array(entries).to_string()).unwrap();
        assert_eq!(points.len(), MAX_POINTS_OF_INTEREST);
        assert_eq!(points[0].description, "point 0");
        assert_eq!(points[9].description, "point 9");
    }

    #[test]
    fn test_no_array_is_extraction_failure() {
        let err = parse_points_of_interest("I could not find anything useful.").unwrap_err();
        assert!(matches!(err, PipelineError::ExtractionFailure(_)));
    }

    #[test]
    fn test_all_invalid_entries_is_extraction_failure() {
        let err = parse_points_of_interest(r#"[{"description":"  ","type":"skill"}]"#).unwrap_err();
        assert!(matches!(err, PipelineError::ExtractionFailure(_)));
    }

    #[tokio::test]
    async fn test_extracts_from_canned_response() {
        let fake = Arc::new(FakeInference::returning(json!({
            "response": r#"[{"description":"Studied at Stanford","type":"education"}]"#
        })));
        let extractor = CriteriaExtractor::new(fake.clone(), "test-model", 20, Duration::from_secs(1));

        let criteria = extractor
            .extract_criteria("Jane Doe, Stanford '20, ex-Google, now building startups")
            .await
            .unwrap();

        assert_eq!(criteria.points_of_interest.len(), 1);
        assert_eq!(criteria.points_of_interest[0].kind, InterestType::Education);

        let (model, messages) = fake.last_call().unwrap();
        assert_eq!(model, "test-model");
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.contains("Jane Doe, Stanford '"));
        assert!(!messages[0].content.contains("ex-Google"));
    }

    #[tokio::test]
    async fn test_inference_timeout_identifies_stage() {
        let fake = Arc::new(FakeInference::returning(json!("[]")).delayed(Duration::from_secs(5)));
        let extractor = CriteriaExtractor::new(fake, "m", 100, Duration::from_millis(10));

        match extractor.extract_criteria("profile").await {
            Err(PipelineError::Timeout { message }) => assert!(message.contains("Inference")),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_profile_never_reaches_model() {
        let fake = Arc::new(FakeInference::returning(json!("[]")));
        let extractor = CriteriaExtractor::new(fake.clone(), "m", 100, Duration::from_secs(1));

        assert!(extractor.extract_criteria("   ").await.is_err());
        assert_eq!(fake.calls(), 0);
    }
}
