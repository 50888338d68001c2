//! Wire-level event model for the lift collector.
//!
//! Telemetry events are schema-free JSON objects. The collector recognizes a
//! handful of fields — labels, auction id, cohort, the CPM figures on summary
//! events — and passes everything else through to the log untouched. This
//! crate owns the typed extraction of those fields out of the raw object.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Label mapping attached to events: experiment-run-name → module descriptors.
///
/// Descriptor shape is owned by the producer; the collector only ever checks
/// for emptiness and copies the map around.
pub type LabelSet = Map<String, Value>;

/// Event `type` tag that marks a per-auction summary event.
pub const SUMMARY_EVENT_TYPE: &str = "lift_auction";

/// `eventType` value that closes an auction lifecycle.
pub const AUCTION_END_EVENT: &str = "auctionEnd";

/// Experiment arm an auction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cohort {
    Control,
    Test,
}

impl Cohort {
    /// Case-insensitive parse. Anything unrecognized — including an absent
    /// cohort — folds into `Test`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::to_ascii_lowercase).as_deref() {
            Some("control") => Self::Control,
            _ => Self::Test,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Test => "test",
        }
    }
}

/// CPM figures carried by a summary event, already coerced to numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryFigures {
    pub cohort: Cohort,
    pub baseline_cpm: f64,
    pub treatment_cpm: f64,
    pub incremental_cpm: f64,
}

/// What the pipeline does with an event once the recognized fields are out.
#[derive(Debug, Clone, PartialEq)]
pub enum EventClass {
    /// `type == "lift_auction"` — feeds the cohort aggregates.
    Summary(SummaryFigures),
    /// Everything else — resolved, logged, and otherwise opaque.
    Generic,
}

/// One telemetry event as received on the wire.
///
/// Wraps the raw JSON object so unrecognized fields survive to the log
/// verbatim; the accessors extract only what the pipeline acts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    fields: Map<String, Value>,
}

impl Event {
    /// Only JSON objects are events; anything else has nowhere to carry a
    /// resolved label set and is rejected at the batch boundary.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Auction the event belongs to: `args.auctionId`, falling back to
    /// `payload.auctionId`. Absence is valid — label hoisting is skipped.
    pub fn auction_id(&self) -> Option<&str> {
        self.nested_str("args", "auctionId")
            .or_else(|| self.nested_str("payload", "auctionId"))
    }

    /// The event's own `labels`, if a non-empty object.
    pub fn own_labels(&self) -> Option<&LabelSet> {
        non_empty_object(self.fields.get("labels"))
    }

    /// Producer-injected `args.labels`, if a non-empty object.
    pub fn arg_labels(&self) -> Option<&LabelSet> {
        non_empty_object(self.fields.get("args").and_then(|args| args.get("labels")))
    }

    /// Overwrite `labels` with the resolved set. Every logged copy carries
    /// the resolved value, never the raw one.
    pub fn set_labels(&mut self, labels: LabelSet) {
        self.fields
            .insert("labels".to_string(), Value::Object(labels));
    }

    pub fn event_type(&self) -> Option<&str> {
        self.fields.get("eventType")?.as_str()
    }

    pub fn is_auction_end(&self) -> bool {
        self.event_type() == Some(AUCTION_END_EVENT)
    }

    /// Classify by the `type` tag and pull the summary figures if present.
    pub fn classify(&self) -> EventClass {
        if self.fields.get("type").and_then(Value::as_str) == Some(SUMMARY_EVENT_TYPE) {
            EventClass::Summary(SummaryFigures {
                cohort: Cohort::parse(self.fields.get("cohort").and_then(Value::as_str)),
                baseline_cpm: coerce_cpm(self.fields.get("baselineCpm")),
                treatment_cpm: coerce_cpm(self.fields.get("treatmentCpm")),
                incremental_cpm: coerce_cpm(self.fields.get("incrementalCpm")),
            })
        } else {
            EventClass::Generic
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// `self.fields[outer][inner]` as a string slice, if present and a string.
    fn nested_str(&self, outer: &str, inner: &str) -> Option<&str> {
        self.fields
            .get(outer)
            .and_then(|v| v.get(inner))
            .and_then(Value::as_str)
    }
}

impl Serialize for Event {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.fields.serialize(serializer)
    }
}

/// Coerce a CPM field to a number: JSON numbers pass through, numeric
/// strings parse, anything else (missing, malformed, non-numeric) is 0.0.
/// Malformed figures are never an error on the ingest path.
pub fn coerce_cpm(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn non_empty_object(value: Option<&Value>) -> Option<&LabelSet> {
    match value {
        Some(Value::Object(map)) if !map.is_empty() => Some(map),
        _ => None,
    }
}
