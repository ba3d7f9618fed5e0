use pretty_assertions::assert_eq;
use specops_core::{AssessmentSession, SessionConfig, SessionRegistry};
use specops_coverage::CoverageState;
use specops_model::{ObservedRequest, SynthesisStrategy};
use specops_normalizer::FormatHint;
use specops_synth::SynthesisConfig;
use specops_test_utils::{get, request, PETSTORE_V2, USERS_ORDERS_V3};
use std::sync::Arc;
use std::thread;

fn session() -> AssessmentSession {
    AssessmentSession::from_document(USERS_ORDERS_V3.as_bytes(), FormatHint::Yaml, SessionConfig::default())
        .unwrap()
}

#[test]
fn passive_traffic_then_synthesis_closes_the_gap() {
    let session = session();
    let matched = session
        .observe_all(&[get("/v1/users"), get("/v1/users/3"), get("/v1/metrics")])
        .unwrap();
    assert_eq!(matched, 2);

    let before = session.drift_report();
    assert_eq!(before.totals.undiscovered, 5);
    assert_eq!(before.shadow_endpoints.len(), 1);

    let batch = session.synthesize_all(SynthesisStrategy::Valid);
    assert!(batch.is_complete());
    for request in &batch.requests {
        session.record_synthesized(request, Some(200)).unwrap();
    }

    let after = session.drift_report();
    assert!(after.uncovered_operations.is_empty());
    assert_eq!(after.totals.tested, 7);
    assert_eq!(after.stale_operations.len(), 5);
    // Synthesized requests are matched traffic; the shadow list only grows from real clients.
    assert_eq!(after.shadow_endpoints.len(), 1);
}

#[test]
fn reset_returns_to_undiscovered() {
    let session = session();
    session.observe(&get("/v1/users")).unwrap();
    session.observe(&request("PUT", "/v1/users/me")).unwrap();
    session.reset();
    let report = session.drift_report();
    assert_eq!(report.totals.undiscovered, 7);
    assert!(report.undocumented_methods.is_empty());
}

#[test]
fn concurrent_sessions_stay_isolated() {
    let registry = Arc::new(SessionRegistry::default());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let session = registry.open(PETSTORE_V2.as_bytes(), FormatHint::Json).unwrap();
                for n in 0..=i {
                    session.observe(&ObservedRequest::new("GET", format!("/api/pets/{n}"))).unwrap();
                }
                (session.id(), i + 1)
            })
        })
        .collect();

    for handle in handles {
        let (id, hits) = handle.join().unwrap();
        let session = registry.get(id).unwrap();
        let snapshot = session.coverage();
        let get_pet = snapshot
            .records
            .iter()
            .find(|r| r.operation_id == "getPet")
            .unwrap();
        assert_eq!(get_pet.passive_hits, hits);
        assert_eq!(get_pet.state, CoverageState::Observed);
    }
    assert_eq!(registry.len(), 4);
    assert_eq!(registry.cache_stats().misses + registry.cache_stats().hits, 4);
}

#[test]
fn seed_from_config_drives_synthesis() {
    let config = SessionConfig::new().with_synthesis(SynthesisConfig::default().with_seed(1).with_malformed_cap(3));
    let a = AssessmentSession::from_document(USERS_ORDERS_V3.as_bytes(), FormatHint::Auto, config.clone()).unwrap();
    let b = AssessmentSession::from_document(USERS_ORDERS_V3.as_bytes(), FormatHint::Auto, config).unwrap();
    let first: Vec<_> = a.synthesize_named("createUser", SynthesisStrategy::Malformed).unwrap().collect();
    let second: Vec<_> = b.synthesize_named("createUser", SynthesisStrategy::Malformed).unwrap().collect();
    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
}

const ITEMS_V3: &str = r#"
openapi: 3.0.3
info: {title: items, version: "1"}
paths:
  /items/{code}:
    get:
      operationId: getItem
      parameters:
        - name: code
          in: path
          required: true
          schema: {type: string, minLength: 1, maxLength: 4}
      responses:
        "200": {description: ok}
"#;

#[test]
fn boundary_requests_leave_no_shadow_endpoints() {
    let session = AssessmentSession::from_document(ITEMS_V3.as_bytes(), FormatHint::Yaml, SessionConfig::default())
        .unwrap();
    let batch = session.synthesize_all(SynthesisStrategy::Boundary);
    assert!(batch.is_complete());
    assert!(!batch.requests.is_empty());
    assert!(batch.requests.iter().all(|r| r.path != "/items/"));
    for request in &batch.requests {
        session.record_synthesized(request, Some(400)).unwrap();
    }
    let report = session.drift_report();
    assert!(report.shadow_endpoints.is_empty());
    assert_eq!(report.totals.tested, 1);
}
