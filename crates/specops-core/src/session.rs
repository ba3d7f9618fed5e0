//! Assessment sessions
//!
//! A session owns the coverage state for one specification. Matching and
//! synthesis are pure over the shared specification; only the tracker
//! mutates, and it is safe to feed from many threads at once.

use crate::config::SessionConfig;
use crate::error::SessionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use specops_coverage::{CoverageSnapshot, CoverageState, CoverageTracker, DriftReport, DriftReporter};
use specops_matcher::{MatchResult, PathMatcher};
use specops_model::{ObservedRequest, ObservedResponse, OperationId, Specification, SynthesisStrategy};
use specops_normalizer::{FormatHint, SpecNormalizer};
use specops_synth::{
    BatchOutcome, ParameterStore, SchemaRequestSynthesizer, SynthesisSequence, SynthesizedRequest,
};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a fresh random id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of feeding one request into a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// How the request bound
    pub result: MatchResult,
    /// Operation state after the hit; absent for unmatched traffic
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<CoverageState>,
}

/// Coverage assessment of one specification
#[derive(Debug)]
pub struct AssessmentSession {
    id: SessionId,
    created_at: DateTime<Utc>,
    config: SessionConfig,
    matcher: PathMatcher,
    synthesizer: SchemaRequestSynthesizer,
    tracker: CoverageTracker,
    store: Arc<ParameterStore>,
}

impl AssessmentSession {
    /// Create session over an already loaded specification
    #[must_use]
    pub fn new(spec: Arc<Specification>, config: SessionConfig) -> Self {
        let id = SessionId::new();
        tracing::info!(
            "Session {} opened for '{}' ({} operations)",
            id,
            spec.info.title,
            spec.operation_count()
        );
        let store = Arc::new(ParameterStore::new());
        Self {
            id,
            created_at: Utc::now(),
            matcher: PathMatcher::new(Arc::clone(&spec), config.matcher),
            synthesizer: SchemaRequestSynthesizer::new(Arc::clone(&spec), config.synthesis.clone())
                .with_store(Arc::clone(&store)),
            tracker: CoverageTracker::with_config(spec, config.coverage),
            store,
            config,
        }
    }

    /// Load a document and open a session on it
    ///
    /// # Errors
    ///
    /// `Spec` when the document does not load.
    pub fn from_document(document: &[u8], hint: FormatHint, config: SessionConfig) -> SessionResult<Self> {
        let spec = SpecNormalizer::new(config.normalizer).load(document, hint)?;
        Ok(Self::new(Arc::new(spec), config))
    }

    /// Session id
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Creation time
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Specification under assessment
    #[inline]
    #[must_use]
    pub fn specification(&self) -> &Arc<Specification> {
        self.matcher.specification()
    }

    /// Values synthesized requests reuse; filled from passive traffic
    #[inline]
    #[must_use]
    pub fn parameter_store(&self) -> &Arc<ParameterStore> {
        &self.store
    }

    /// Match one request and record it
    ///
    /// Matched passive requests also fill empty parameter store entries,
    /// skipping parameters that failed validation.
    ///
    /// # Errors
    ///
    /// `Coverage` if the tracker rejects the match result.
    pub fn observe(&self, request: &ObservedRequest) -> SessionResult<Observation> {
        let result = self.matcher.match_request(request);
        let state = self.tracker.record(&result)?;
        if let Some(entry) = result.operation.and_then(|id| self.specification().operation(id)) {
            self.store.harvest(entry, request, |location, name| {
                result
                    .issues
                    .iter()
                    .any(|issue| issue.location == location && issue.name.eq_ignore_ascii_case(name))
            });
        }
        Ok(Observation { result, state })
    }

    /// Match and record a batch of requests, returning how many bound to an operation
    ///
    /// # Errors
    ///
    /// First tracker error; earlier requests stay recorded.
    pub fn observe_all<'r>(&self, requests: impl IntoIterator<Item = &'r ObservedRequest>) -> SessionResult<usize> {
        let mut matched = 0;
        for request in requests {
            if self.observe(request)?.result.is_matched() {
                matched += 1;
            }
        }
        Ok(matched)
    }

    /// Record the outcome of sending a synthesized request
    ///
    /// # Errors
    ///
    /// Same as [`Self::observe`].
    pub fn record_synthesized(&self, request: &SynthesizedRequest, status: Option<u16>) -> SessionResult<Observation> {
        let mut observed = request.to_observed().observed_at(Utc::now());
        if let Some(status) = status {
            observed = observed.with_response(ObservedResponse::status(status));
        }
        self.observe(&observed)
    }

    /// Requests for one operation
    ///
    /// # Errors
    ///
    /// `Synthesis` for unknown operations and unsatisfiable schemas.
    pub fn synthesize(&self, operation: OperationId, strategy: SynthesisStrategy) -> SessionResult<SynthesisSequence> {
        Ok(self.synthesizer.synthesize(operation, strategy)?)
    }

    /// Requests for one operation by `operationId`
    ///
    /// # Errors
    ///
    /// Same as [`Self::synthesize`].
    pub fn synthesize_named(&self, operation_id: &str, strategy: SynthesisStrategy) -> SessionResult<SynthesisSequence> {
        Ok(self.synthesizer.synthesize_named(operation_id, strategy)?)
    }

    /// Requests for every operation; per-operation failures are collected
    #[must_use]
    pub fn synthesize_all(&self, strategy: SynthesisStrategy) -> BatchOutcome {
        self.synthesizer.synthesize_all(strategy)
    }

    /// Point-in-time coverage
    #[must_use]
    pub fn coverage(&self) -> CoverageSnapshot {
        self.tracker.snapshot()
    }

    /// Drift between declaration and traffic so far
    #[must_use]
    pub fn drift_report(&self) -> DriftReport {
        DriftReporter::new(&self.tracker).report()
    }

    /// Forget all recorded traffic; parameter store values stay
    pub fn reset(&self) {
        tracing::info!("Session {} reset", self.id);
        self.tracker.reset();
    }
}
