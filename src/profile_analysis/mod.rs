// src/profile_analysis/mod.rs
use serde::{Deserialize, Serialize};

pub mod crawler;
pub mod criteria_extractor;
pub mod inference;

pub use crawler::{CrawlService, ExaCrawlService, ProfileCrawler};
pub use criteria_extractor::CriteriaExtractor;
pub use inference::{ChatMessage, HttpInferenceService, InferenceService};

/// Maximum number of points kept from one extraction
pub const MAX_POINTS_OF_INTEREST: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InterestType {
    Education,
    Experience,
    Skill,
    Achievement,
    Background,
    /// Model output outside the known set is carried through as-is
    Other(String),
}

impl From<String> for InterestType {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "education" => Self::Education,
            "experience" => Self::Experience,
            "skill" => Self::Skill,
            "achievement" => Self::Achievement,
            "background" => Self::Background,
            _ => Self::Other(value),
        }
    }
}

impl From<InterestType> for String {
    fn from(value: InterestType) -> Self {
        value.as_str().to_string()
    }
}

impl InterestType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Education => "education",
            Self::Experience => "experience",
            Self::Skill => "skill",
            Self::Achievement => "achievement",
            Self::Background => "background",
            Self::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub description: String,
    #[serde(rename = "type")]
    pub kind: InterestType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerCriteria {
    /// Most impactful first, as returned by the model
    pub points_of_interest: Vec<PointOfInterest>,
}
