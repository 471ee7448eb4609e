// src/matching/mod.rs
use serde::{Deserialize, Serialize};

pub mod match_finder;
pub mod search_client;
pub mod webset_poller;

pub use match_finder::MatchFinder;
pub use search_client::{ExaSearchService, SearchService};
pub use webset_poller::{JobState, PollPolicy, WebsetPoller};

use crate::profile_analysis::PointOfInterest;
use crate::utils::{non_empty, truncate_with_ellipsis};
use search_client::{SearchHit, WebsetItem};

pub const SNIPPET_PLACEHOLDER: &str = "No additional details available";
const SNIPPET_DESCRIPTION_CHARS: usize = 160;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedProfile {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

/// Flattened view of whatever a raw hit or webset item carries
#[derive(Debug, Default)]
struct ProfileFields<'a> {
    url: Option<&'a str>,
    name: Option<&'a str>,
    role: Option<&'a str>,
    company: Option<&'a str>,
    location: Option<&'a str>,
    description: Option<&'a str>,
}

impl<'a> From<&'a SearchHit> for ProfileFields<'a> {
    fn from(hit: &'a SearchHit) -> Self {
        Self {
            url: non_empty(hit.url.as_deref()),
            name: non_empty(hit.title.as_deref()).or(non_empty(hit.name.as_deref())),
            role: non_empty(hit.role.as_deref()).or(non_empty(hit.position.as_deref())),
            company: non_empty(hit.company.as_deref()),
            location: non_empty(hit.location.as_deref()),
            description: non_empty(hit.description.as_deref())
                .or(non_empty(hit.summary.as_deref()))
                .or(non_empty(hit.text.as_deref())),
        }
    }
}

impl<'a> From<&'a WebsetItem> for ProfileFields<'a> {
    fn from(item: &'a WebsetItem) -> Self {
        let properties = item.properties.as_ref();
        let person = properties.and_then(|p| p.person.as_ref());
        let enrichment = item
            .enrichments
            .iter()
            .flatten()
            .find_map(|e| non_empty(e.value.as_deref()));

        Self {
            url: non_empty(item.url.as_deref())
                .or_else(|| non_empty(properties.and_then(|p| p.url.as_deref()))),
            name: non_empty(item.title.as_deref())
                .or_else(|| non_empty(person.and_then(|p| p.name.as_deref()))),
            role: non_empty(person.and_then(|p| p.position.as_deref())),
            company: non_empty(
                person
                    .and_then(|p| p.company.as_ref())
                    .and_then(|c| c.name.as_deref()),
            ),
            location: non_empty(person.and_then(|p| p.location.as_deref())),
            description: non_empty(properties.and_then(|p| p.description.as_deref()))
                .or(enrichment),
        }
    }
}

impl MatchedProfile {
    /// URL and name are required, everything else feeds the snippet
    fn from_fields(fields: ProfileFields<'_>) -> Option<Self> {
        let url = fields.url?;
        let title = fields.name?;
        Some(Self {
            url: url.to_string(),
            title: title.to_string(),
            snippet: build_snippet(
                fields.role,
                fields.company,
                fields.location,
                fields.description,
            ),
        })
    }

    pub fn from_hit(hit: &SearchHit) -> Option<Self> {
        Self::from_fields(ProfileFields::from(hit))
    }

    pub fn from_item(item: &WebsetItem) -> Option<Self> {
        Self::from_fields(ProfileFields::from(item))
    }
}

pub fn build_snippet(
    role: Option<&str>,
    company: Option<&str>,
    location: Option<&str>,
    description: Option<&str>,
) -> String {
    let mut parts = Vec::new();

    match (role, company) {
        (Some(role), Some(company)) => parts.push(format!("{} at {}", role, company)),
        (Some(only), None) | (None, Some(only)) => parts.push(only.to_string()),
        (None, None) => {}
    }
    if let Some(location) = location {
        parts.push(location.to_string());
    }
    if let Some(description) = description {
        parts.push(truncate_with_ellipsis(description, SNIPPET_DESCRIPTION_CHARS));
    }

    if parts.is_empty() {
        SNIPPET_PLACEHOLDER.to_string()
    } else {
        parts.join(" • ")
    }
}

/// Goal first, then the chosen points, as one natural-language query
pub fn build_query(career_goal: &str, points: &[PointOfInterest]) -> String {
    let goal = career_goal.trim().trim_end_matches('.');
    let descriptions = points
        .iter()
        .map(|p| p.description.trim())
        .filter(|d| !d.is_empty())
        .collect::<Vec<_>>();

    if descriptions.is_empty() {
        goal.to_string()
    } else {
        format!(
            "{}. Professionals whose background includes: {}",
            goal,
            descriptions.join("; ")
        )
    }
}
