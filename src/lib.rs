//! CV Match - LLM-backed CV to job-description matching
//!
//! This library provides the match pipeline behind the CV Match service:
//! content-addressed caching of model assessments in front of an
//! OpenAI-compatible scoring backend.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{content_key, CacheKey, Matcher, TextExtractor};
pub use models::{CriteriaScores, Document, MatchResult};
pub use services::{CompletionBackend, OpenAiBackend, ResultCache, ScoringService, SqliteCache};
