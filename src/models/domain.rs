use serde::{Deserialize, Serialize};
use validator::Validate;

/// Per-criterion sub-scores reported by the scoring backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Validate)]
pub struct CriteriaScores {
    #[validate(range(min = 0, max = 100))]
    pub skills: i64,
    #[validate(range(min = 0, max = 100))]
    pub experience: i64,
    #[validate(range(min = 0, max = 100))]
    pub location: i64,
    #[validate(range(min = 0, max = 100))]
    pub education: i64,
    #[validate(range(min = 0, max = 100))]
    pub certifications: i64,
}

impl CriteriaScores {
    /// All five criteria at zero, used by error results
    pub fn zeroed() -> Self {
        Self::default()
    }
}

/// Outcome of matching one CV against one job description
///
/// `cached` and `processing_time_ms` describe the call that produced the value,
/// not the stored record: they are set by the matcher after scoring or lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MatchResult {
    #[serde(rename = "match")]
    pub is_match: bool,
    #[validate(range(min = 0, max = 100))]
    pub overall_score: i64,
    #[validate(nested)]
    pub criteria_scores: CriteriaScores,
    pub explanation: String,
    #[serde(default)]
    pub cached: bool,
    #[serde(default)]
    pub processing_time_ms: Option<u64>,
    #[serde(default)]
    pub error: bool,
}

impl MatchResult {
    /// Fresh successful result as returned by the backend
    pub fn scored(
        is_match: bool,
        overall_score: i64,
        criteria_scores: CriteriaScores,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            is_match,
            overall_score,
            criteria_scores,
            explanation: explanation.into(),
            cached: false,
            processing_time_ms: None,
            error: false,
        }
    }

    /// In-band failure result: no match, every score zero
    pub fn failure(explanation: impl Into<String>) -> Self {
        Self {
            is_match: false,
            overall_score: 0,
            criteria_scores: CriteriaScores::zeroed(),
            explanation: explanation.into(),
            cached: false,
            processing_time_ms: None,
            error: true,
        }
    }
}

/// A stored cache row
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub raw_cv_text: String,
    pub raw_job_text: String,
    pub serialized_result: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// An uploaded document before text extraction
#[derive(Debug, Clone)]
pub struct Document {
    pub bytes: Vec<u8>,
    /// MIME type or filename
    pub declared_type: String,
}

impl Document {
    pub fn new(bytes: impl Into<Vec<u8>>, declared_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            declared_type: declared_type.into(),
        }
    }
}
