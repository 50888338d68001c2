//! Running cohort aggregates for `lift_auction` summary events.
//!
//! Two buckets (`control`, `test`) accumulate per-auction CPM sums plus a
//! global event counter covering every ingested event. `snapshot` derives
//! the averages and the cross-cohort lift in the collector's wire format.

use lift_types::Cohort;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Running sums for one experiment arm. Monotone between resets.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct CohortBucket {
    auctions: u64,
    baseline: f64,
    treatment: f64,
    incremental: f64,
}

impl CohortBucket {
    fn snapshot(&self) -> CohortSnapshot {
        let auctions = self.auctions;
        let avg = |sum: f64| if auctions > 0 { sum / auctions as f64 } else { 0.0 };
        CohortSnapshot {
            auctions,
            avg_baseline: avg(self.baseline),
            avg_treatment: avg(self.treatment),
            avg_incremental: avg(self.incremental),
        }
    }
}

#[derive(Debug, Default)]
struct AggState {
    events: u64,
    control: CohortBucket,
    test: CohortBucket,
}

/// The aggregation engine. One instance per collector.
#[derive(Debug, Default)]
pub struct LiftAggregator {
    state: RwLock<AggState>,
}

impl LiftAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one ingested event, summary or not.
    pub async fn record_event(&self) {
        self.state.write().await.events += 1;
    }

    /// Fold one summary event into its cohort bucket. Inputs arrive already
    /// coerced; malformed figures were zeroed upstream.
    pub async fn record_summary(
        &self,
        cohort: Cohort,
        baseline: f64,
        treatment: f64,
        incremental: f64,
    ) {
        let mut state = self.state.write().await;
        let bucket = match cohort {
            Cohort::Control => &mut state.control,
            Cohort::Test => &mut state.test,
        };
        bucket.auctions += 1;
        bucket.baseline += baseline;
        bucket.treatment += treatment;
        bucket.incremental += incremental;
    }

    pub async fn snapshot(&self) -> MetricsReport {
        let state = self.state.read().await;
        let control = state.control.snapshot();
        let test = state.test.snapshot();

        let lift_abs = test.avg_treatment - control.avg_treatment;
        // null, not zero: "no lift" and "undefined against a zero baseline"
        // are different answers.
        let lift_pct = if control.avg_treatment != 0.0 {
            Some(lift_abs / control.avg_treatment)
        } else {
            None
        };

        MetricsReport {
            totals: Totals {
                events: state.events,
                auctions: state.control.auctions + state.test.auctions,
            },
            by_cohort: ByCohort { control, test },
            global: GlobalLift {
                incremental_lift_abs: lift_abs,
                incremental_lift_pct: lift_pct,
            },
        }
    }

    /// Zero both buckets and the event counter.
    pub async fn reset(&self) {
        *self.state.write().await = AggState::default();
    }
}

// ── wire format ──────────────────────────────────────────────────

/// Snapshot of the collector's aggregates, serialized with the wire keys
/// clients already consume (`byCohort`, `avgBaseline`, …).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub totals: Totals,
    #[serde(rename = "byCohort")]
    pub by_cohort: ByCohort,
    pub global: GlobalLift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub events: u64,
    pub auctions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ByCohort {
    pub control: CohortSnapshot,
    pub test: CohortSnapshot,
}

/// Per-cohort averages; all zero when the bucket saw no auctions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortSnapshot {
    pub auctions: u64,
    pub avg_baseline: f64,
    pub avg_treatment: f64,
    pub avg_incremental: f64,
}

/// Cross-cohort lift. `incremental_lift_pct` serializes as `null` when the
/// control arm's average treatment CPM is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalLift {
    pub incremental_lift_abs: f64,
    pub incremental_lift_pct: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn averages_divide_sums_by_auction_count() {
        let agg = LiftAggregator::new();
        agg.record_summary(Cohort::Control, 4.0, 14.0, 8.0).await;
        agg.record_summary(Cohort::Control, 6.0, 16.0, 12.0).await;

        let report = agg.snapshot().await;
        let control = report.by_cohort.control;
        assert_eq!(control.auctions, 2);
        assert_eq!(control.avg_baseline, 5.0);
        assert_eq!(control.avg_treatment, 15.0);
        assert_eq!(control.avg_incremental, 10.0);
    }

    #[tokio::test]
    async fn empty_bucket_averages_are_zero_not_nan() {
        let agg = LiftAggregator::new();
        let report = agg.snapshot().await;
        assert_eq!(report.by_cohort.control.avg_treatment, 0.0);
        assert_eq!(report.by_cohort.test.avg_baseline, 0.0);
        assert_eq!(report.totals.auctions, 0);
    }

    #[tokio::test]
    async fn lift_pct_is_null_against_a_zero_control_baseline() {
        let agg = LiftAggregator::new();
        agg.record_summary(Cohort::Test, 0.0, 5.0, 5.0).await;

        let report = agg.snapshot().await;
        assert_eq!(report.global.incremental_lift_abs, 5.0);
        assert_eq!(report.global.incremental_lift_pct, None);
    }

    #[tokio::test]
    async fn lift_pct_is_relative_to_control_treatment() {
        let agg = LiftAggregator::new();
        agg.record_summary(Cohort::Control, 0.0, 4.0, 0.0).await;
        agg.record_summary(Cohort::Test, 0.0, 5.0, 1.0).await;

        let report = agg.snapshot().await;
        assert_eq!(report.global.incremental_lift_abs, 1.0);
        assert_eq!(report.global.incremental_lift_pct, Some(0.25));
    }

    #[tokio::test]
    async fn totals_count_every_event_but_auctions_only_summaries() {
        let agg = LiftAggregator::new();
        agg.record_event().await;
        agg.record_event().await;
        agg.record_event().await;
        agg.record_summary(Cohort::Test, 1.0, 2.0, 1.0).await;

        let report = agg.snapshot().await;
        assert_eq!(report.totals.events, 3);
        assert_eq!(report.totals.auctions, 1);
    }

    #[tokio::test]
    async fn reset_zeroes_buckets_and_counter() {
        let agg = LiftAggregator::new();
        agg.record_event().await;
        agg.record_summary(Cohort::Control, 1.0, 2.0, 3.0).await;
        agg.reset().await;

        let report = agg.snapshot().await;
        assert_eq!(report.totals.events, 0);
        assert_eq!(report.totals.auctions, 0);
        assert_eq!(report.by_cohort.control.auctions, 0);
    }

    #[test]
    fn report_serializes_with_wire_keys() {
        let report = MetricsReport {
            totals: Totals {
                events: 2,
                auctions: 1,
            },
            by_cohort: ByCohort {
                control: CohortSnapshot {
                    auctions: 0,
                    avg_baseline: 0.0,
                    avg_treatment: 0.0,
                    avg_incremental: 0.0,
                },
                test: CohortSnapshot {
                    auctions: 1,
                    avg_baseline: 1.0,
                    avg_treatment: 2.0,
                    avg_incremental: 1.0,
                },
            },
            global: GlobalLift {
                incremental_lift_abs: 2.0,
                incremental_lift_pct: None,
            },
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"byCohort\""));
        assert!(json.contains("\"avgBaseline\""));
        assert!(json.contains("\"incrementalLiftAbs\""));
        assert!(json.contains("\"incrementalLiftPct\":null"));
    }
}
