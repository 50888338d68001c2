//! Append-only NDJSON event log.
//!
//! Every fully-resolved event is appended as a single JSON line, append
//! order = arrival order. Appends are result-bearing so the caller decides
//! what a failed write means; the collector warn-logs and drops it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::LogError;

/// Storage seam for the event log.
#[async_trait::async_trait]
pub trait EventLog: Send + Sync {
    /// Append one serialized event as its own line.
    async fn append(&self, line: &str) -> Result<(), LogError>;

    /// Every line currently persisted, in append order.
    async fn read_all(&self) -> Result<Vec<String>, LogError>;

    /// Drop all persisted content (reset).
    async fn truncate(&self) -> Result<(), LogError>;
}

// ── NdjsonEventLog (filesystem) ──────────────────────────────────

/// Append-only NDJSON log on the local filesystem, one file per collector.
pub struct NdjsonEventLog {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl NdjsonEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_parent(&self) -> Result<(), LogError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| LogError::Io(e.to_string()))?;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EventLog for NdjsonEventLog {
    async fn append(&self, line: &str) -> Result<(), LogError> {
        let mut record = line.to_string();
        record.push('\n');

        let _guard = self.lock.lock().await;
        self.ensure_parent().await?;
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| LogError::Io(e.to_string()))?
            .write_all(record.as_bytes())
            .await
            .map_err(|e| LogError::Io(e.to_string()))?;
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<String>, LogError> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(text.lines().map(str::to_string).collect()),
            // A log that was never written to reads as empty, not as broken.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(LogError::Io(e.to_string())),
        }
    }

    async fn truncate(&self) -> Result<(), LogError> {
        let _guard = self.lock.lock().await;
        self.ensure_parent().await?;
        tokio::fs::write(&self.path, b"")
            .await
            .map_err(|e| LogError::Io(e.to_string()))
    }
}

// ── InMemoryEventLog (tests, embedded use) ───────────────────────

/// Vec-backed log. Same contract, no disk.
pub struct InMemoryEventLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self {
            lines: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.lines.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.lines.lock().await.is_empty()
    }
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, line: &str) -> Result<(), LogError> {
        self.lines.lock().await.push(line.to_string());
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<String>, LogError> {
        Ok(self.lines.lock().await.clone())
    }

    async fn truncate(&self) -> Result<(), LogError> {
        self.lines.lock().await.clear();
        Ok(())
    }
}
