use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Central error type for the resolution engine.
/// Every module returns `Result<T, ResolverError>`.
///
/// Only [`ResolverError::CapacityTimeout`] is meant to reach the caller of a
/// resolution; everything else is absorbed at the nearest boundary and turned
/// into absent data.
#[derive(Debug, Error)]
pub enum ResolverError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request failed for {url}: HTTP {status}")]
    UnexpectedStatus { url: String, status: u16 },

    // ── Maven ───────────────────────────────────────────
    #[error("Invalid Maven coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("POM parse error: {0}")]
    PomParse(String),

    // ── XML ─────────────────────────────────────────────
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::DeError),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Capacity ────────────────────────────────────────
    #[error("No effective-POM slot freed up within {waited:?} (ceiling {ceiling})")]
    CapacityTimeout { waited: Duration, ceiling: u32 },

    #[error("Capacity store error: {0}")]
    CapacityStore(String),

    // ── External tool ───────────────────────────────────
    #[error("Effective POM tool failed: {0}")]
    Tool(String),

    #[error("Effective POM tool timed out after {0:?}")]
    ToolTimeout(Duration),

    // ── Config ──────────────────────────────────────────
    #[error("Config error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the crate.
pub type ResolverResult<T> = Result<T, ResolverError>;

impl ResolverError {
    /// Errors that must escape a resolution instead of degrading it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ResolverError::CapacityTimeout { .. })
    }
}

impl From<std::io::Error> for ResolverError {
    fn from(source: std::io::Error) -> Self {
        ResolverError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl From<redis::RedisError> for ResolverError {
    fn from(err: redis::RedisError) -> Self {
        ResolverError::CapacityStore(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_capacity_timeout_is_fatal() {
        let timeout = ResolverError::CapacityTimeout {
            waited: Duration::from_secs(1),
            ceiling: 2,
        };
        assert!(timeout.is_fatal());
        assert!(!ResolverError::PomParse("bad".into()).is_fatal());
        assert!(!ResolverError::UnexpectedStatus {
            url: "https://repo.example/x".into(),
            status: 500,
        }
        .is_fatal());
    }
}
