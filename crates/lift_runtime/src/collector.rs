//! The ingestion pipeline and query layer, as one service object.
//!
//! `Collector` owns the label cache, the cohort aggregates and the event
//! log; it is constructed once at startup and shared behind `Arc` by the
//! transport layer. There is no cross-store transactionality: concurrent
//! batches interleave at item boundaries, and a concurrent reset can land
//! between one item's cache write and its aggregate update. Accepted —
//! this is best-effort telemetry.

use std::sync::Arc;
use std::time::Duration;

use lift_types::{Event, EventClass};
use serde_json::Value;
use tracing::{debug, warn};

use crate::aggregate::{LiftAggregator, MetricsReport};
use crate::error::CollectError;
use crate::label_cache::{LabelCache, DEFAULT_GRACE};
use crate::log_store::EventLog;

/// Tail size when the caller does not specify one.
pub const DEFAULT_TAIL: i64 = 20;
/// Hard bound on a single tail read.
pub const MAX_TAIL: i64 = 1000;

/// Outcome of one `collect` call. Callers get 204 either way; this feeds
/// the operator log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollectSummary {
    /// Items processed through the pipeline.
    pub accepted: usize,
    /// Non-object items dropped from the batch.
    pub skipped: usize,
}

pub struct Collector {
    cache: LabelCache,
    aggregates: LiftAggregator,
    log: Arc<dyn EventLog>,
}

impl Collector {
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self::with_grace(log, DEFAULT_GRACE)
    }

    pub fn with_grace(log: Arc<dyn EventLog>, grace: Duration) -> Self {
        Self {
            cache: LabelCache::with_grace(grace),
            aggregates: LiftAggregator::new(),
            log,
        }
    }

    /// The label cache, exposed so the host can drive the periodic sweep.
    pub fn cache(&self) -> &LabelCache {
        &self.cache
    }

    /// Ingest a request body: one event or an array of events, processed in
    /// order. The only caller-visible failure is an unparsable body — past
    /// that point every item is handled best-effort. A batch item that is
    /// not a JSON object is skipped, not fatal to its siblings.
    pub async fn collect(&self, body: &[u8]) -> Result<CollectSummary, CollectError> {
        let parsed: Value = serde_json::from_slice(body)
            .map_err(|e| CollectError::InvalidPayload(e.to_string()))?;
        let items = match parsed {
            Value::Array(items) => items,
            single => vec![single],
        };

        let mut summary = CollectSummary::default();
        for item in items {
            match Event::from_value(item) {
                Some(event) => {
                    self.ingest_one(event).await;
                    summary.accepted += 1;
                }
                None => {
                    warn!("dropping non-object batch item");
                    summary.skipped += 1;
                }
            }
        }
        debug!(
            accepted = summary.accepted,
            skipped = summary.skipped,
            "batch ingested"
        );
        Ok(summary)
    }

    async fn ingest_one(&self, mut event: Event) {
        let auction_id = event.auction_id().map(str::to_string);

        // Resolve labels: the event's own, then the producer's args, then
        // whatever this auction cached earlier.
        let mut labels = event.own_labels().or_else(|| event.arg_labels()).cloned();
        if labels.is_none() {
            if let Some(id) = auction_id.as_deref() {
                labels = self.cache.get(id).await;
            }
        }
        let labels = labels.unwrap_or_default();

        // Remember non-empty labels so later events in the auction inherit them.
        if !labels.is_empty() {
            if let Some(id) = auction_id.as_deref() {
                self.cache.insert(id, labels.clone()).await;
            }
        }
        event.set_labels(labels);

        self.aggregates.record_event().await;
        if let EventClass::Summary(figures) = event.classify() {
            self.aggregates
                .record_summary(
                    figures.cohort,
                    figures.baseline_cpm,
                    figures.treatment_cpm,
                    figures.incremental_cpm,
                )
                .await;
        }

        match serde_json::to_string(&event) {
            Ok(line) => {
                if let Err(e) = self.log.append(&line).await {
                    warn!(error = %e, "event log append failed; record dropped");
                }
            }
            Err(e) => warn!(error = %e, "event failed to serialize; record dropped"),
        }

        if event.is_auction_end() {
            if let Some(id) = auction_id.as_deref() {
                self.cache.expire_after_grace(id).await;
            }
        }
    }

    /// Last `n` parsed log records, oldest first. `n` defaults to
    /// [`DEFAULT_TAIL`] and clamps to `[1, MAX_TAIL]`. A read failure
    /// degrades to an empty result; unparsable lines are skipped.
    pub async fn tail(&self, n: Option<i64>) -> Vec<Value> {
        let n = n.unwrap_or(DEFAULT_TAIL).clamp(1, MAX_TAIL) as usize;

        let lines = match self.log.read_all().await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(error = %e, "event log read failed; returning empty tail");
                return Vec::new();
            }
        };

        let mut records: Vec<Value> = lines
            .iter()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        if records.len() > n {
            records.drain(..records.len() - n);
        }
        records
    }

    /// The aggregator snapshot, verbatim.
    pub async fn metrics(&self) -> MetricsReport {
        self.aggregates.snapshot().await
    }

    /// Zero every store. Best-effort: a failed log truncate is warn-logged
    /// and the in-memory stores are cleared regardless.
    pub async fn reset(&self) {
        if let Err(e) = self.log.truncate().await {
            warn!(error = %e, "event log truncate failed");
        }
        self.aggregates.reset().await;
        self.cache.clear().await;
    }
}
