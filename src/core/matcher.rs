use crate::core::extract::{ExtractError, TextExtractor};
use crate::core::identity::content_key;
use crate::models::{Document, MatchResult};
use crate::services::cache::{CacheError, ResultCache};
use crate::services::scoring::ScoringService;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Match orchestrator - caches backend assessments by content identity
///
/// # Pipeline Stages
/// 1. Content identity of the (CV, job) text pair
/// 2. Cache lookup, returning immediately on a hit
/// 3. Backend scoring on a miss
/// 4. Cache write for successful results only
///
/// Cache faults never fail a match: a failed read counts as a miss and a
/// failed write is logged and dropped.
#[derive(Clone)]
pub struct Matcher {
    cache: Arc<dyn ResultCache>,
    scorer: Arc<ScoringService>,
    extractor: TextExtractor,
}

impl Matcher {
    pub fn new(cache: Arc<dyn ResultCache>, scorer: Arc<ScoringService>) -> Self {
        Self::with_extractor(cache, scorer, TextExtractor::default())
    }

    pub fn with_extractor(
        cache: Arc<dyn ResultCache>,
        scorer: Arc<ScoringService>,
        extractor: TextExtractor,
    ) -> Self {
        Self {
            cache,
            scorer,
            extractor,
        }
    }

    /// Match two uploaded documents
    ///
    /// Extraction failures are returned before any cache or backend work.
    /// Processing time includes extraction.
    pub async fn match_documents(
        &self,
        cv: &Document,
        job: &Document,
    ) -> Result<MatchResult, ExtractError> {
        let start = Instant::now();

        let cv_text = self.extractor.extract_text(&cv.bytes, &cv.declared_type)?;
        let job_text = self.extractor.extract_text(&job.bytes, &job.declared_type)?;

        Ok(self.match_since(start, &cv_text, &job_text).await)
    }

    /// Match already extracted texts
    pub async fn match_texts(&self, cv_text: &str, job_text: &str) -> MatchResult {
        self.match_since(Instant::now(), cv_text, job_text).await
    }

    async fn match_since(&self, start: Instant, cv_text: &str, job_text: &str) -> MatchResult {
        let key = content_key(cv_text, job_text);

        match self.cache.get(&key).await {
            Ok(Some(mut cached)) => {
                tracing::info!("Returning cached match result");
                cached.cached = true;
                cached.processing_time_ms = Some(elapsed_ms(start));
                return cached;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Cache lookup failed for {}, treating as miss: {}", key, e);
            }
        }

        tracing::info!("Using LLM to match CV against job");
        let mut result = self.scorer.score(cv_text, job_text).await;
        result.processing_time_ms = Some(elapsed_ms(start));

        if result.error {
            tracing::warn!("Not caching error result");
        } else if let Err(e) = self.cache.put(&key, cv_text, job_text, &result).await {
            tracing::warn!("Failed to cache match result for {}: {}", key, e);
        }

        result
    }

    /// Whether the scoring backend is reachable
    pub async fn is_healthy(&self) -> bool {
        self.scorer.is_available().await
    }

    /// Remove cache entries older than `ttl`
    pub async fn sweep_cache(&self, ttl: Duration) -> Result<u64, CacheError> {
        self.cache.sweep(ttl).await
    }

    pub async fn cache_size(&self) -> Result<u64, CacheError> {
        self.cache.len().await
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
