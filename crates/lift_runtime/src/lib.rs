//! Core of the lift collector: the label cache, the cohort aggregates, the
//! append-only event log, and the ingestion pipeline that ties them together.
//!
//! Everything here is best-effort telemetry by design — the only failure a
//! caller ever sees is an unparsable request body.

pub mod aggregate;
pub mod collector;
pub mod error;
pub mod label_cache;
pub mod log_store;

pub use aggregate::{ByCohort, CohortSnapshot, GlobalLift, LiftAggregator, MetricsReport, Totals};
pub use collector::{CollectSummary, Collector, DEFAULT_TAIL, MAX_TAIL};
pub use error::{CollectError, LogError};
pub use label_cache::{LabelCache, DEFAULT_GRACE};
pub use log_store::{EventLog, InMemoryEventLog, NdjsonEventLog};
