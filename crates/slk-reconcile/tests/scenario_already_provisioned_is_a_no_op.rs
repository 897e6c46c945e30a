mod common;

use common::*;
use slk_reconcile::EngineOutcome;
use slk_schemas::ProcessStatus;

#[test]
fn scenario_reprocessing_identical_booking_makes_zero_gateway_calls() {
    let h = harness(test_config(), MockBackend::new());
    h.store.seed(&provisioned_record());

    let outcome = h.engine.process_value(&confirmed_event(), fixed_now());

    let EngineOutcome::Single(result) = outcome else {
        panic!("expected a single outcome");
    };
    assert_eq!(result.status, ProcessStatus::Accepted);
    assert_eq!(result.message, "access code already up to date");

    // No list, create, or delete calls at all.
    assert!(h.backend.calls().is_empty());
    assert!(h.notifier.sent().is_empty());

    // Record untouched.
    assert_eq!(
        h.store.record("bk-1001").unwrap().access_code_id.as_deref(),
        Some("ac-old")
    );
}

#[test]
fn scenario_record_within_tolerance_still_counts_as_up_to_date() {
    let h = harness(test_config(), MockBackend::new());
    let mut record = provisioned_record();
    // 5 minutes of drift on each edge, inside the 15-minute tolerance.
    record.starts_at = "2026-03-01T12:35:00-05:00".parse().unwrap();
    record.ends_at = "2026-03-04T13:05:00-05:00".parse().unwrap();
    h.store.seed(&record);

    let outcome = h.engine.process_value(&confirmed_event(), fixed_now());
    assert!(outcome.is_fully_accepted());
    assert!(h.backend.calls().is_empty());
}
