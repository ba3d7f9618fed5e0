//! Concurrent coverage tracker
//!
//! Per-operation records live in a sharded [`DashMap`], so hits on different
//! operations update in parallel while hits on the same operation serialize
//! on its entry lock. A reader/writer gate gives [`CoverageTracker::snapshot`]
//! a consistent view: recorders share the gate, snapshots and resets take it
//! exclusively.
//!
//! Shadow and undocumented-method evidence is keyed by concrete path, so a
//! client walking many ids would grow it without bound. Each map stops
//! accepting new keys at [`CoverageConfig::max_evidence_entries`]; further
//! distinct keys are counted in `evidence_dropped` instead. Concurrent
//! inserts may overshoot the limit by up to one entry per recording thread.

use crate::error::{CoverageError, CoverageResult};
use crate::state::{validate_transition, CoverageState};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use specops_matcher::{MatchKind, MatchResult};
use specops_model::{HttpMethod, OperationId, RequestOrigin, Specification};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Tracker settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Distinct shadow paths, and separately undocumented methods, kept
    pub max_evidence_entries: usize,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            max_evidence_entries: 10_000,
        }
    }
}

impl CoverageConfig {
    /// With evidence limit
    #[inline]
    #[must_use]
    pub fn with_max_evidence_entries(mut self, max: usize) -> Self {
        self.max_evidence_entries = max;
        self
    }
}

/// Coverage of one declared operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRecord {
    pub operation: OperationId,
    pub operation_id: String,
    pub method: HttpMethod,
    pub path: String,
    pub state: CoverageState,
    pub passive_hits: u64,
    pub synthesized_hits: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<u16>,
}

impl CoverageRecord {
    fn undiscovered(operation: OperationId, operation_id: String, method: HttpMethod, path: String) -> Self {
        Self {
            operation,
            operation_id,
            method,
            path,
            state: CoverageState::Undiscovered,
            passive_hits: 0,
            synthesized_hits: 0,
            first_seen: None,
            last_seen: None,
            last_status: None,
        }
    }

    fn clear(&mut self) {
        self.state = CoverageState::Undiscovered;
        self.passive_hits = 0;
        self.synthesized_hits = 0;
        self.first_seen = None;
        self.last_seen = None;
        self.last_status = None;
    }

    /// Never seen in passive traffic
    #[inline]
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.passive_hits == 0
    }
}

/// Concrete path no template matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowEvidence {
    pub method: String,
    pub path: String,
    pub hits: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Method used on a template that does not declare it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndocumentedMethod {
    pub method: String,
    pub template: String,
    /// First concrete path seen with this method
    pub example_path: String,
    pub hits: u64,
}

/// Point-in-time copy of everything the tracker holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageSnapshot {
    pub taken_at: DateTime<Utc>,
    /// In operation declaration order
    pub records: Vec<CoverageRecord>,
    /// Sorted by path, then method
    pub shadows: Vec<ShadowEvidence>,
    /// Sorted by template, then method
    pub undocumented: Vec<UndocumentedMethod>,
    /// Distinct unmatched requests not kept because evidence was full
    #[serde(default)]
    pub evidence_dropped: u64,
}

impl CoverageSnapshot {
    /// State per operation
    #[must_use]
    pub fn states(&self) -> BTreeMap<OperationId, CoverageState> {
        self.records.iter().map(|r| (r.operation, r.state)).collect()
    }

    /// Number of operations in a state
    #[must_use]
    pub fn count(&self, state: CoverageState) -> usize {
        self.records.iter().filter(|r| r.state == state).count()
    }
}

/// Coverage state of every declared operation, plus unmatched evidence
#[derive(Debug)]
pub struct CoverageTracker {
    spec: Arc<Specification>,
    records: DashMap<OperationId, CoverageRecord>,
    /// Keyed by (path, method)
    shadows: DashMap<(String, String), ShadowEvidence>,
    /// Keyed by (template, method)
    undocumented: DashMap<(String, String), UndocumentedMethod>,
    evidence_dropped: AtomicU64,
    config: CoverageConfig,
    gate: RwLock<()>,
}

impl CoverageTracker {
    /// Create tracker with every operation Undiscovered
    #[must_use]
    pub fn new(spec: Arc<Specification>) -> Self {
        Self::with_config(spec, CoverageConfig::default())
    }

    /// Create tracker with explicit settings
    #[must_use]
    pub fn with_config(spec: Arc<Specification>, config: CoverageConfig) -> Self {
        let records = DashMap::with_capacity(spec.operation_count());
        for op in spec.operations() {
            records.insert(
                op.id,
                CoverageRecord::undiscovered(op.id, op.operation_id.clone(), op.method, op.path.clone()),
            );
        }
        Self {
            spec,
            records,
            shadows: DashMap::new(),
            undocumented: DashMap::new(),
            evidence_dropped: AtomicU64::new(0),
            config,
            gate: RwLock::new(()),
        }
    }

    /// Tracked specification
    #[inline]
    #[must_use]
    pub fn specification(&self) -> &Arc<Specification> {
        &self.spec
    }

    /// Record one match result
    ///
    /// Returns the operation's state after the hit, or `None` when the
    /// request did not bind to an operation. Passive misses are kept as
    /// shadow or undocumented-method evidence; synthesized misses are only
    /// logged, since they say nothing about what real clients call.
    /// Recording the same result again leaves the state unchanged.
    ///
    /// # Errors
    ///
    /// `UnknownOperation` when the result names an operation outside the
    /// tracked specification.
    pub fn record(&self, result: &MatchResult) -> CoverageResult<Option<CoverageState>> {
        let _shared = self.gate.read();
        let at = result.observed_at.unwrap_or_else(Utc::now);

        match (result.kind(), result.operation, &result.template) {
            (MatchKind::Matched, Some(operation), _) => {
                let mut record = self
                    .records
                    .get_mut(&operation)
                    .ok_or(CoverageError::UnknownOperation(operation.0))?;
                let next = record.state.advance(result.origin);
                validate_transition(record.state, next)?;
                if next != record.state {
                    tracing::debug!("{} {} -> {}", record.operation_id, record.state, next);
                    record.state = next;
                }
                match result.origin {
                    RequestOrigin::Passive => record.passive_hits += 1,
                    RequestOrigin::Synthesized(_) => record.synthesized_hits += 1,
                }
                record.first_seen.get_or_insert(at);
                record.last_seen = Some(at);
                if result.status.is_some() {
                    record.last_status = result.status;
                }
                Ok(Some(next))
            }
            (kind, _, _) if result.origin.is_synthesized() => {
                tracing::debug!("Synthesized {} {} not matched ({:?})", result.method, result.path, kind);
                Ok(None)
            }
            (MatchKind::MethodNotDeclared, _, Some(template)) => {
                let key = (template.path.clone(), result.method.clone());
                if self.undocumented.contains_key(&key) || self.has_room(self.undocumented.len()) {
                    self.undocumented.entry(key).and_modify(|entry| entry.hits += 1).or_insert_with(|| {
                        tracing::info!("Undocumented method {} on {}", result.method, template.path);
                        UndocumentedMethod {
                            method: result.method.clone(),
                            template: template.path.clone(),
                            example_path: result.path.clone(),
                            hits: 1,
                        }
                    });
                }
                Ok(None)
            }
            _ => {
                let key = (result.path.clone(), result.method.clone());
                if self.shadows.contains_key(&key) || self.has_room(self.shadows.len()) {
                    self.shadows
                        .entry(key)
                        .and_modify(|entry| {
                            entry.hits += 1;
                            entry.last_seen = entry.last_seen.max(at);
                            entry.first_seen = entry.first_seen.min(at);
                        })
                        .or_insert_with(|| {
                            tracing::info!("Shadow endpoint {} {}", result.method, result.path);
                            ShadowEvidence {
                                method: result.method.clone(),
                                path: result.path.clone(),
                                hits: 1,
                                first_seen: at,
                                last_seen: at,
                            }
                        });
                }
                Ok(None)
            }
        }
    }

    /// Whether an evidence map of `len` keys may take another; counts the drop otherwise
    fn has_room(&self, len: usize) -> bool {
        if len < self.config.max_evidence_entries {
            return true;
        }
        if self.evidence_dropped.fetch_add(1, Ordering::Relaxed) == 0 {
            tracing::warn!(
                "Unmatched evidence reached {} entries; new paths are counted, not kept",
                self.config.max_evidence_entries
            );
        }
        false
    }

    /// Current state of one operation
    #[must_use]
    pub fn state(&self, operation: OperationId) -> Option<CoverageState> {
        self.records.get(&operation).map(|record| record.state)
    }

    /// Consistent point-in-time copy
    #[must_use]
    pub fn snapshot(&self) -> CoverageSnapshot {
        let _exclusive = self.gate.write();
        let mut records: Vec<CoverageRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by_key(|r| r.operation);

        let mut shadows: Vec<ShadowEvidence> =
            self.shadows.iter().map(|entry| entry.value().clone()).collect();
        shadows.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.method.cmp(&b.method)));

        let mut undocumented: Vec<UndocumentedMethod> =
            self.undocumented.iter().map(|entry| entry.value().clone()).collect();
        undocumented.sort_by(|a, b| a.template.cmp(&b.template).then_with(|| a.method.cmp(&b.method)));

        CoverageSnapshot {
            taken_at: Utc::now(),
            records,
            shadows,
            undocumented,
            evidence_dropped: self.evidence_dropped.load(Ordering::Relaxed),
        }
    }

    /// Return every operation to Undiscovered and drop unmatched evidence
    pub fn reset(&self) {
        let _exclusive = self.gate.write();
        for mut entry in self.records.iter_mut() {
            entry.value_mut().clear();
        }
        self.shadows.clear();
        self.undocumented.clear();
        self.evidence_dropped.store(0, Ordering::Relaxed);
        tracing::info!("Coverage reset for {} operations", self.records.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specops_matcher::{MatcherConfig, PathMatcher};
    use specops_model::{ObservedResponse, SynthesisStrategy};
    use specops_test_utils::{get, spec_with_paths, synthesized};

    fn setup() -> (PathMatcher, CoverageTracker) {
        let spec = spec_with_paths(&[("/users/{id}", &["get"]), ("/health", &["get"])]);
        (
            PathMatcher::new(Arc::clone(&spec), MatcherConfig::default()),
            CoverageTracker::new(spec),
        )
    }

    #[test]
    fn passive_then_synthesized() {
        let (matcher, tracker) = setup();
        let passive = matcher.match_request(&get("/users/1"));
        assert_eq!(tracker.record(&passive), Ok(Some(CoverageState::Observed)));
        assert_eq!(tracker.record(&passive), Ok(Some(CoverageState::Observed)));

        let request = matcher.match_request(&synthesized("GET", "/users/2", SynthesisStrategy::Valid));
        assert_eq!(tracker.record(&request), Ok(Some(CoverageState::Tested)));
        assert_eq!(tracker.record(&passive), Ok(Some(CoverageState::Tested)));

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.records[0].passive_hits, 3);
        assert_eq!(snapshot.records[0].synthesized_hits, 1);
        assert_eq!(snapshot.records[1].state, CoverageState::Undiscovered);
    }

    #[test]
    fn unmatched_evidence_kept_apart() {
        let (matcher, tracker) = setup();
        assert_eq!(tracker.record(&matcher.match_request(&get("/users/1/profile"))), Ok(None));
        assert_eq!(
            tracker.record(&matcher.match_request(&specops_model::ObservedRequest::new("DELETE", "/health"))),
            Ok(None)
        );
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.shadows.len(), 1);
        assert_eq!(snapshot.shadows[0].path, "/users/1/profile");
        assert_eq!(snapshot.undocumented.len(), 1);
        assert_eq!(snapshot.undocumented[0].template, "/health");
        assert_eq!(snapshot.count(CoverageState::Undiscovered), 2);
    }

    #[test]
    fn synthesized_misses_are_not_client_evidence() {
        let (matcher, tracker) = setup();
        let miss = matcher.match_request(&synthesized("GET", "/users/", SynthesisStrategy::Boundary));
        assert_eq!(tracker.record(&miss), Ok(None));
        let wrong_method = matcher.match_request(&synthesized("DELETE", "/health", SynthesisStrategy::Malformed));
        assert_eq!(tracker.record(&wrong_method), Ok(None));
        let snapshot = tracker.snapshot();
        assert!(snapshot.shadows.is_empty());
        assert!(snapshot.undocumented.is_empty());
    }

    #[test]
    fn evidence_stops_growing_at_limit() {
        let spec = spec_with_paths(&[("/health", &["get"])]);
        let matcher = PathMatcher::new(Arc::clone(&spec), MatcherConfig::default());
        let tracker = CoverageTracker::with_config(spec, CoverageConfig::default().with_max_evidence_entries(3));
        for n in 0..10 {
            tracker.record(&matcher.match_request(&get(&format!("/items/{n}")))).unwrap();
        }
        // Known keys still count hits after the limit.
        tracker.record(&matcher.match_request(&get("/items/0"))).unwrap();

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.shadows.len(), 3);
        assert_eq!(snapshot.evidence_dropped, 7);
        let first = snapshot.shadows.iter().find(|s| s.path == "/items/0").unwrap();
        assert_eq!(first.hits, 2);

        tracker.reset();
        assert_eq!(tracker.snapshot().evidence_dropped, 0);
    }

    #[test]
    fn status_is_remembered() {
        let (matcher, tracker) = setup();
        let request = get("/health").with_response(ObservedResponse::status(503));
        tracker.record(&matcher.match_request(&request)).unwrap();
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.records[1].last_status, Some(503));
        assert!(snapshot.records[1].first_seen.is_some());
    }

    #[test]
    fn foreign_operation_rejected() {
        let (matcher, tracker) = setup();
        let mut result = matcher.match_request(&get("/health"));
        result.operation = Some(OperationId(99));
        assert_eq!(tracker.record(&result), Err(CoverageError::UnknownOperation(99)));
    }

    #[test]
    fn reset_clears_everything() {
        let (matcher, tracker) = setup();
        tracker.record(&matcher.match_request(&get("/users/1"))).unwrap();
        tracker.record(&matcher.match_request(&get("/nowhere"))).unwrap();
        tracker.reset();
        let snapshot = tracker.snapshot();
        assert!(snapshot.shadows.is_empty());
        assert!(snapshot
            .records
            .iter()
            .all(|r| r.state == CoverageState::Undiscovered && r.passive_hits == 0));
    }

    #[test]
    fn concurrent_recording() {
        let (matcher, tracker) = setup();
        let tracker = Arc::new(tracker);
        let matcher = Arc::new(matcher);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                let matcher = Arc::clone(&matcher);
                std::thread::spawn(move || {
                    for n in 0..50 {
                        let target = if i % 2 == 0 { format!("/users/{n}") } else { "/health".to_string() };
                        tracker.record(&matcher.match_request(&get(&target))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.records[0].passive_hits, 200);
        assert_eq!(snapshot.records[1].passive_hits, 200);
    }
}
