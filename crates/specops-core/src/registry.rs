//! Session registry
//!
//! Holds independent sessions side by side. Sessions opened on identical
//! documents share one normalized specification through the document cache,
//! but never share coverage state.

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::session::{AssessmentSession, SessionId};
use dashmap::DashMap;
use specops_model::Specification;
use specops_normalizer::{CacheStats, FormatHint, SpecCache, SpecNormalizer};
use std::sync::Arc;

/// Concurrent set of open sessions
#[derive(Debug)]
pub struct SessionRegistry {
    config: SessionConfig,
    normalizer: SpecNormalizer,
    cache: SpecCache,
    sessions: DashMap<SessionId, Arc<AssessmentSession>>,
}

impl SessionRegistry {
    /// Create empty registry
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            normalizer: SpecNormalizer::new(config.normalizer),
            cache: SpecCache::new(config.cache.max_documents),
            sessions: DashMap::new(),
            config,
        }
    }

    /// Load a document (through the cache) and open a session on it
    ///
    /// # Errors
    ///
    /// `Spec` when the document does not load.
    pub fn open(&self, document: &[u8], hint: FormatHint) -> SessionResult<Arc<AssessmentSession>> {
        let spec = self.normalizer.load_cached(&self.cache, document, hint)?;
        Ok(self.open_with(spec))
    }

    /// Open a session on an already loaded specification
    pub fn open_with(&self, spec: Arc<Specification>) -> Arc<AssessmentSession> {
        let session = Arc::new(AssessmentSession::new(spec, self.config.clone()));
        self.sessions.insert(session.id(), Arc::clone(&session));
        session
    }

    /// Look up an open session
    ///
    /// # Errors
    ///
    /// `SessionNotFound` for closed or unknown ids.
    pub fn get(&self, id: SessionId) -> SessionResult<Arc<AssessmentSession>> {
        self.sessions
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(SessionError::SessionNotFound(id))
    }

    /// Close a session, discarding its coverage
    ///
    /// # Errors
    ///
    /// `SessionNotFound` for closed or unknown ids.
    pub fn close(&self, id: SessionId) -> SessionResult<()> {
        self.sessions
            .remove(&id)
            .map(|_| tracing::info!("Session {} closed", id))
            .ok_or(SessionError::SessionNotFound(id))
    }

    /// Reset one session's coverage
    ///
    /// # Errors
    ///
    /// `SessionNotFound` for closed or unknown ids.
    pub fn reset(&self, id: SessionId) -> SessionResult<()> {
        self.get(id)?.reset();
        Ok(())
    }

    /// Ids of open sessions, sorted
    #[must_use]
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    /// Number of open sessions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are open
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Document cache statistics
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specops_coverage::CoverageState;
    use specops_test_utils::{get, USERS_ORDERS_V3};

    #[test]
    fn sessions_are_isolated_but_share_the_model() {
        let registry = SessionRegistry::default();
        let a = registry.open(USERS_ORDERS_V3.as_bytes(), FormatHint::Yaml).unwrap();
        let b = registry.open(USERS_ORDERS_V3.as_bytes(), FormatHint::Yaml).unwrap();
        assert!(Arc::ptr_eq(a.specification(), b.specification()));

        a.observe(&get("/v1/users")).unwrap();
        assert_eq!(a.coverage().count(CoverageState::Observed), 1);
        assert_eq!(b.coverage().count(CoverageState::Observed), 0);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn close_and_lookup() {
        let registry = SessionRegistry::default();
        let session = registry.open(USERS_ORDERS_V3.as_bytes(), FormatHint::Auto).unwrap();
        let id = session.id();
        assert!(registry.get(id).is_ok());
        registry.close(id).unwrap();
        assert!(matches!(registry.get(id), Err(SessionError::SessionNotFound(missing)) if missing == id));
        assert!(registry.close(id).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn bad_document_is_spec_error() {
        let registry = SessionRegistry::default();
        let err = registry.open(b"openapi: [", FormatHint::Yaml).unwrap_err();
        assert!(err.is_spec_error());
    }
}
