//! Error taxonomy for the collector.
//!
//! Only `InvalidPayload` ever reaches a caller. Storage failures are
//! absorbed by the ingestion and query paths — warn-logged and degraded,
//! never propagated, so a slow or broken disk cannot fail an ingest.

use thiserror::Error;

/// Failure appending to, reading from, or truncating the event log.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("io: {0}")]
    Io(String),
}

/// Caller-visible ingestion failure.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Request body is not parsable as JSON. Nothing was processed.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl CollectError {
    /// HTTP status for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidPayload(_) => 400,
        }
    }
}
