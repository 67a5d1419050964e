// Service exports
pub mod backend;
pub mod cache;
pub mod scoring;

pub use backend::{BackendError, CompletionBackend, CompletionOptions, OpenAiBackend};
pub use cache::{CacheError, ResultCache, SqliteCache};
pub use scoring::{ScoringFault, ScoringService};
