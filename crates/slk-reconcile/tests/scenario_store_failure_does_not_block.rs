mod common;

use std::sync::Arc;

use common::*;
use slk_reconcile::{EngineOutcome, ReconcileEngine};
use slk_schemas::ProcessStatus;

fn engine_with_failing_store(
    backend: Arc<MockBackend>,
) -> (ReconcileEngine, Arc<RecordingNotifier>) {
    let notifier = RecordingNotifier::new();
    let engine = ReconcileEngine::new(
        test_config(),
        Box::new(SharedBackend(Arc::clone(&backend))),
        Box::new(FailingStore),
        Box::new(SharedNotifier(Arc::clone(&notifier))),
    );
    (engine, notifier)
}

#[test]
fn scenario_store_read_failure_degrades_to_creation() {
    let backend = MockBackend::new();
    let (engine, notifier) = engine_with_failing_store(Arc::clone(&backend));

    let EngineOutcome::Single(result) = engine.process_value(&confirmed_event(), fixed_now())
    else {
        panic!("expected a single outcome");
    };

    // The unavailable store is treated as "no record": the engine creates
    // and reports success even though the write also fails.
    assert_eq!(result.status, ProcessStatus::Accepted);
    assert_eq!(backend.create_calls().len(), 1);
    assert_eq!(notifier.sent().len(), 1);
}

#[test]
fn scenario_store_failure_during_cancellation_still_deletes_by_search() {
    let backend = MockBackend::with_codes(vec![remote_code(
        "ac-1",
        "5309",
        Some("2026-03-01T17:30:00Z"),
        Some("2026-03-04T18:00:00Z"),
    )]);
    let (engine, _) = engine_with_failing_store(Arc::clone(&backend));

    let EngineOutcome::Single(result) = engine.process_value(&cancellation_event(), fixed_now())
    else {
        panic!("expected a single outcome");
    };
    assert_eq!(result.status, ProcessStatus::Accepted);
    assert_eq!(result.message, "deleted 1 access code(s)");
}
