use sha2::{Digest, Sha256};
use std::fmt;

/// Content-addressed key for a (CV text, job text) pair
///
/// A lowercase hex SHA-256 digest of the CV text followed by the job text.
/// No normalization is applied, so a hit means the exact same extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compute the cache key for a CV/job pair. Argument order matters.
pub fn content_key(cv_text: &str, job_text: &str) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(cv_text.as_bytes());
    hasher.update(job_text.as_bytes());
    CacheKey(hex::encode(hasher.finalize()))
}
