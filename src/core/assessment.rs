use crate::models::{CriteriaScores, MatchResult};
use serde::Deserialize;
use thiserror::Error;
use validator::Validate;

/// Errors raised while turning raw backend output into a [`MatchResult`]
#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error("Invalid JSON in model output: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Model output failed validation: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Wire shape expected from the model
#[derive(Debug, Deserialize, Validate)]
struct Assessment {
    #[serde(rename = "match")]
    is_match: bool,
    #[validate(range(min = 0, max = 100))]
    overall_score: i64,
    #[validate(nested)]
    criteria_scores: CriteriaScores,
    explanation: String,
}

const FENCE: &str = "```";

/// Remove a markdown code fence wrapped around a payload
///
/// Handles each side independently:
/// - leading fence, optionally followed by a language tag (```` ```json ````)
/// - trailing fence
///
/// Text without a fence is returned trimmed and otherwise untouched.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix(FENCE) {
        let tag_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        text = &rest[tag_len..];
    }

    if let Some(rest) = text.strip_suffix(FENCE) {
        text = rest;
    }

    text.trim()
}

/// Parse and validate backend output into a fresh, uncached result
pub fn parse_assessment(raw: &str) -> Result<MatchResult, AssessmentError> {
    let assessment: Assessment = serde_json::from_str(strip_code_fence(raw))?;
    assessment.validate()?;

    Ok(MatchResult::scored(
        assessment.is_match,
        assessment.overall_score,
        assessment.criteria_scores,
        assessment.explanation,
    ))
}
