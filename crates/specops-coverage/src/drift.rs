//! Drift reporting
//!
//! A [`DriftReport`] is derived from a [`CoverageSnapshot`]; building one never
//! touches tracker state.

use crate::state::CoverageState;
use crate::tracker::{CoverageRecord, CoverageSnapshot, CoverageTracker, ShadowEvidence, UndocumentedMethod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use specops_model::HttpMethod;
use std::fmt;

/// Declared operation listed in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDrift {
    pub operation_id: String,
    pub method: HttpMethod,
    pub path: String,
    pub state: CoverageState,
    pub passive_hits: u64,
    pub synthesized_hits: u64,
}

impl From<&CoverageRecord> for OperationDrift {
    fn from(record: &CoverageRecord) -> Self {
        Self {
            operation_id: record.operation_id.clone(),
            method: record.method,
            path: record.path.clone(),
            state: record.state,
            passive_hits: record.passive_hits,
            synthesized_hits: record.synthesized_hits,
        }
    }
}

/// Per-state counts and overall coverage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftTotals {
    pub operations: usize,
    pub undiscovered: usize,
    pub observed: usize,
    pub tested: usize,
    /// Share of operations no longer Undiscovered, `0.0` when none are declared
    pub coverage_ratio: f64,
}

/// Differences between the declared surface and observed traffic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub generated_at: DateTime<Utc>,
    /// Paths no template matched
    pub shadow_endpoints: Vec<ShadowEvidence>,
    /// Methods used on templates that do not declare them
    pub undocumented_methods: Vec<UndocumentedMethod>,
    /// Operations still Undiscovered
    pub uncovered_operations: Vec<OperationDrift>,
    /// Operations no passive client used
    pub stale_operations: Vec<OperationDrift>,
    pub totals: DriftTotals,
    /// Unmatched requests left out once evidence was full
    #[serde(default, skip_serializing_if = "is_zero")]
    pub evidence_dropped: u64,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl DriftReport {
    /// Build report from a snapshot
    #[must_use]
    pub fn from_snapshot(snapshot: &CoverageSnapshot) -> Self {
        let mut uncovered: Vec<OperationDrift> = snapshot
            .records
            .iter()
            .filter(|r| r.state == CoverageState::Undiscovered)
            .map(OperationDrift::from)
            .collect();
        let mut stale: Vec<OperationDrift> = snapshot
            .records
            .iter()
            .filter(|r| r.is_stale())
            .map(OperationDrift::from)
            .collect();
        // Stable sort: operations sharing path and method keep declaration order.
        uncovered.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.method.cmp(&b.method)));
        stale.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.method.cmp(&b.method)));

        let operations = snapshot.records.len();
        let undiscovered = snapshot.count(CoverageState::Undiscovered);
        let coverage_ratio = if operations == 0 {
            0.0
        } else {
            (operations - undiscovered) as f64 / operations as f64
        };

        Self {
            generated_at: snapshot.taken_at,
            shadow_endpoints: snapshot.shadows.clone(),
            undocumented_methods: snapshot.undocumented.clone(),
            uncovered_operations: uncovered,
            stale_operations: stale,
            totals: DriftTotals {
                operations,
                undiscovered,
                observed: snapshot.count(CoverageState::Observed),
                tested: snapshot.count(CoverageState::Tested),
                coverage_ratio,
            },
            evidence_dropped: snapshot.evidence_dropped,
        }
    }

    /// Whether traffic and declaration agree completely
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.shadow_endpoints.is_empty()
            && self.undocumented_methods.is_empty()
            && self.uncovered_operations.is_empty()
    }

    /// Pretty JSON
    ///
    /// # Errors
    ///
    /// Serialization failure from `serde_json`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Plain-text summary, same as the `Display` output
    #[must_use]
    pub fn render_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DriftReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.totals;
        writeln!(
            f,
            "Coverage: {:.1}% of {} operations ({} tested, {} observed, {} undiscovered)",
            t.coverage_ratio * 100.0,
            t.operations,
            t.tested,
            t.observed,
            t.undiscovered
        )?;

        writeln!(f, "\nShadow endpoints ({}):", self.shadow_endpoints.len())?;
        for shadow in &self.shadow_endpoints {
            writeln!(f, "  {} {}  [{} hits]", shadow.method, shadow.path, shadow.hits)?;
        }
        if self.evidence_dropped > 0 {
            writeln!(f, "  ... {} more unmatched requests not kept", self.evidence_dropped)?;
        }
        writeln!(f, "\nUndocumented methods ({}):", self.undocumented_methods.len())?;
        for entry in &self.undocumented_methods {
            writeln!(
                f,
                "  {} {}  (e.g. {}) [{} hits]",
                entry.method, entry.template, entry.example_path, entry.hits
            )?;
        }
        writeln!(f, "\nUncovered operations ({}):", self.uncovered_operations.len())?;
        for op in &self.uncovered_operations {
            writeln!(f, "  {} {}  {}", op.method, op.path, op.operation_id)?;
        }
        writeln!(f, "\nStale operations ({}):", self.stale_operations.len())?;
        for op in &self.stale_operations {
            writeln!(
                f,
                "  {} {}  {} [{}, {} synthesized hits]",
                op.method, op.path, op.operation_id, op.state, op.synthesized_hits
            )?;
        }
        Ok(())
    }
}

/// Builds drift reports from a tracker
#[derive(Debug, Clone, Copy)]
pub struct DriftReporter<'a> {
    tracker: &'a CoverageTracker,
}

impl<'a> DriftReporter<'a> {
    /// Create reporter over a tracker
    #[inline]
    #[must_use]
    pub fn new(tracker: &'a CoverageTracker) -> Self {
        Self { tracker }
    }

    /// Report on the tracker's current state
    #[must_use]
    pub fn report(&self) -> DriftReport {
        let report = DriftReport::from_snapshot(&self.tracker.snapshot());
        tracing::debug!(
            "Drift report: {} shadow, {} undocumented, {} uncovered, {} stale",
            report.shadow_endpoints.len(),
            report.undocumented_methods.len(),
            report.uncovered_operations.len(),
            report.stale_operations.len()
        );
        report
    }
}
