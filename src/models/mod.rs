// Model exports
pub mod domain;
pub mod responses;

pub use domain::{CacheEntry, CriteriaScores, Document, MatchResult};
pub use responses::{ErrorResponse, HealthResponse, RootResponse, StatsResponse};
