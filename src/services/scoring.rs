use crate::core::assessment::{parse_assessment, AssessmentError};
use crate::models::MatchResult;
use crate::services::backend::{BackendError, CompletionBackend};
use std::sync::Arc;
use thiserror::Error;

/// Default prompt; `{cv_text}` and `{job_text}` are substituted per request
pub const MATCH_PROMPT: &str = include_str!("../../prompts/match_prompt.txt");

/// Why a scoring attempt did not produce a valid assessment
#[derive(Debug, Error)]
pub enum ScoringFault {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Invalid JSON in model output: {0}")]
    Malformed(serde_json::Error),

    #[error("Model output failed validation: {0}")]
    Validation(validator::ValidationErrors),
}

impl From<AssessmentError> for ScoringFault {
    fn from(err: AssessmentError) -> Self {
        match err {
            AssessmentError::Malformed(e) => ScoringFault::Malformed(e),
            AssessmentError::Validation(e) => ScoringFault::Validation(e),
        }
    }
}

/// Scores a CV against a job description through a completion backend
///
/// [`ScoringService::score`] never fails: backend and validation faults come
/// back as a [`MatchResult`] with `error` set.
pub struct ScoringService {
    backend: Arc<dyn CompletionBackend>,
    template: String,
}

impl ScoringService {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self::with_template(backend, MATCH_PROMPT)
    }

    pub fn with_template(backend: Arc<dyn CompletionBackend>, template: impl Into<String>) -> Self {
        Self {
            backend,
            template: template.into(),
        }
    }

    /// Run the backend and validate its output
    pub async fn assess(&self, cv_text: &str, job_text: &str) -> Result<MatchResult, ScoringFault> {
        let prompt = render_prompt(&self.template, cv_text, job_text);
        let output = self.backend.complete(&prompt).await?;
        Ok(parse_assessment(&output)?)
    }

    /// Score a pair, folding any fault into an error result
    pub async fn score(&self, cv_text: &str, job_text: &str) -> MatchResult {
        match self.assess(cv_text, job_text).await {
            Ok(result) => result,
            Err(fault) => {
                tracing::error!("Error in LLM matching: {}", fault);
                MatchResult::failure(format!("Error processing match: {}", fault))
            }
        }
    }

    /// Whether the backend currently answers its reachability probe
    pub async fn is_available(&self) -> bool {
        match self.backend.probe().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Scoring backend unavailable: {}", e);
                false
            }
        }
    }
}

/// Substitute `{cv_text}` and `{job_text}` in a single left-to-right pass
///
/// Inserted text is never rescanned, so a CV that happens to contain
/// `{job_text}` stays verbatim. Other braces pass through untouched.
pub fn render_prompt(template: &str, cv_text: &str, job_text: &str) -> String {
    let mut out = String::with_capacity(template.len() + cv_text.len() + job_text.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        if let Some(after) = tail.strip_prefix("{cv_text}") {
            out.push_str(cv_text);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{job_text}") {
            out.push_str(job_text);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}
