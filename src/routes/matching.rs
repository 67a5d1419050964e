use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use futures::TryStreamExt;
use thiserror::Error;

use crate::core::{ExtractError, Matcher};
use crate::models::{Document, ErrorResponse, HealthResponse, RootResponse, StatsResponse};
use crate::services::CacheError;

/// Largest accepted upload per document
pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

const CV_FIELD: &str = "cv";
const JOB_FIELD: &str = "job_description";

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub matcher: Matcher,
}

/// Errors surfaced to HTTP clients
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} file is required")]
    MissingDocument(&'static str),

    #[error("Invalid multipart upload: {0}")]
    Upload(#[from] MultipartError),

    #[error("{0} file exceeds {max} bytes", max = MAX_DOCUMENT_BYTES)]
    DocumentTooLarge(String),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Cache store unavailable: {0}")]
    CacheUnavailable(#[from] CacheError),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::MissingDocument(_) => "missing_document",
            ApiError::Upload(_) => "invalid_upload",
            ApiError::DocumentTooLarge(_) => "document_too_large",
            ApiError::Extract(ExtractError::UnsupportedFormat(_)) => "unsupported_format",
            ApiError::Extract(_) => "unreadable_document",
            ApiError::CacheUnavailable(_) => "cache_unavailable",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::DocumentTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::CacheUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        })
    }
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/stats", web::get().to(stats))
        .route("/match", web::post().to(match_documents));
}

/// Root endpoint
pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(RootResponse {
        message: "CV Match API".to_string(),
        docs: "/api/v1/match".to_string(),
        health: "/api/v1/health".to_string(),
    })
}

/// Health check endpoint
///
/// Reports `degraded` when the scoring backend does not answer its probe.
async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let llm_available = state.matcher.is_healthy().await;
    let status = if llm_available { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        llm_available,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Cache statistics endpoint
async fn stats(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let match_cache_size = state.matcher.cache_size().await?;
    Ok(HttpResponse::Ok().json(StatsResponse { match_cache_size }))
}

/// Match a CV against a job description
///
/// POST /api/v1/match
///
/// Multipart form with two file parts, `cv` and `job_description`. Each
/// part's content type (or, failing that, its filename) selects the
/// extractor. Backend failures still answer 200 with `error: true`.
async fn match_documents(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let mut cv = None;
    let mut job = None;

    while let Some(field) = payload.try_next().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(CV_FIELD) => cv = Some(read_document(field, CV_FIELD).await?),
            Some(JOB_FIELD) => job = Some(read_document(field, JOB_FIELD).await?),
            other => tracing::debug!("Ignoring multipart field {:?}", other),
        }
    }

    let cv = cv.ok_or(ApiError::MissingDocument("CV"))?;
    let job = job.ok_or(ApiError::MissingDocument("Job description"))?;

    tracing::info!(
        "Matching CV ({}, {} bytes) against job ({}, {} bytes)",
        cv.declared_type,
        cv.bytes.len(),
        job.declared_type,
        job.bytes.len()
    );

    let result = state.matcher.match_documents(&cv, &job).await.map_err(|e| {
        tracing::info!("Rejecting match request: {}", e);
        e
    })?;

    Ok(HttpResponse::Ok().json(result))
}

async fn read_document(mut field: Field, name: &str) -> Result<Document, ApiError> {
    let content_type = field.content_type().map(|m| m.essence_str().to_string());
    let filename = field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .map(str::to_string);

    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        if bytes.len() + chunk.len() > MAX_DOCUMENT_BYTES {
            return Err(ApiError::DocumentTooLarge(name.to_string()));
        }
        bytes.extend_from_slice(&chunk);
    }

    let declared_type = declared_type(content_type.as_deref(), filename.as_deref())
        .ok_or(ApiError::MissingDocument(if name == CV_FIELD { "CV" } else { "Job description" }))?;

    Ok(Document::new(bytes, declared_type))
}

/// Pick the declared type of an uploaded part
///
/// The content type wins unless it is the generic `application/octet-stream`,
/// in which case the filename is used.
fn declared_type(content_type: Option<&str>, filename: Option<&str>) -> Option<String> {
    match (content_type, filename) {
        (Some(ct), Some(name)) if ct.eq_ignore_ascii_case("application/octet-stream") => {
            Some(name.to_string())
        }
        (Some(ct), _) => Some(ct.to_string()),
        (None, Some(name)) => Some(name.to_string()),
        (None, None) => None,
    }
}
