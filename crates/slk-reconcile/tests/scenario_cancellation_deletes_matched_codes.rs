mod common;

use common::*;
use slk_reconcile::EngineOutcome;
use slk_schemas::ProcessStatus;

#[test]
fn scenario_cancellation_with_record_deletes_by_stored_remote_id() {
    let h = harness(test_config(), MockBackend::new());
    h.store.seed(&provisioned_record());

    let EngineOutcome::Single(result) = h.engine.process_value(&cancellation_event(), fixed_now())
    else {
        panic!("expected a single outcome");
    };
    assert_eq!(result.status, ProcessStatus::Accepted);
    assert_eq!(result.message, "deleted access code from idempotency record");

    assert_eq!(
        h.backend.calls(),
        vec![GatewayCall::Delete {
            access_code_id: "ac-old".to_string(),
        }]
    );
    assert!(h.store.record("bk-1001").is_none());
}

#[test]
fn scenario_stale_remote_id_already_gone_still_counts_as_success() {
    let backend = MockBackend::new();
    backend.script_delete(vec![slk_gateway::DeleteOutcome::AlreadyGone]);
    let h = harness(test_config(), backend);
    h.store.seed(&provisioned_record());

    let outcome = h.engine.process_value(&cancellation_event(), fixed_now());
    assert!(outcome.is_fully_accepted());
    assert!(h.store.record("bk-1001").is_none());
}

#[test]
fn scenario_recordless_cancellation_deletes_window_matched_codes() {
    // Desired checkout instant: 2026-03-04T13:00-05:00 == 18:00Z.
    let backend = MockBackend::with_codes(vec![
        // End edge 5 minutes off: matches.
        remote_code(
            "ac-1",
            "5309",
            Some("2026-03-01T17:30:00Z"),
            Some("2026-03-04T18:05:00Z"),
        ),
        // Different code value: skipped.
        remote_code(
            "ac-2",
            "1111",
            Some("2026-03-01T17:30:00Z"),
            Some("2026-03-04T18:00:00Z"),
        ),
        // Same code but a different stay entirely: skipped.
        remote_code(
            "ac-3",
            "5309",
            Some("2026-04-01T17:30:00Z"),
            Some("2026-04-04T18:00:00Z"),
        ),
    ]);
    let h = harness(test_config(), backend);

    let EngineOutcome::Single(result) = h.engine.process_value(&cancellation_event(), fixed_now())
    else {
        panic!("expected a single outcome");
    };
    assert_eq!(result.status, ProcessStatus::Accepted);
    assert_eq!(result.message, "deleted 1 access code(s)");

    assert_eq!(
        h.backend.delete_calls(),
        vec![GatewayCall::Delete {
            access_code_id: "ac-1".to_string(),
        }]
    );
}

#[test]
fn scenario_zero_matches_is_an_accept_not_an_error() {
    let h = harness(test_config(), MockBackend::new());

    let EngineOutcome::Single(result) = h.engine.process_value(&cancellation_event(), fixed_now())
    else {
        panic!("expected a single outcome");
    };
    assert_eq!(result.status, ProcessStatus::Accepted);
    assert_eq!(result.message, "no matching access code found");
    assert!(h.backend.delete_calls().is_empty());
}

#[test]
fn scenario_escape_hatch_relaxes_to_code_value_only() {
    // Same code digits, but weeks away from the cancelled stay's window.
    let off_window = remote_code(
        "ac-legacy",
        "5309",
        Some("2026-05-01T17:30:00Z"),
        Some("2026-05-04T18:00:00Z"),
    );

    // Hatch off: nothing deleted.
    let h = harness(
        test_config(),
        MockBackend::with_codes(vec![off_window.clone()]),
    );
    let EngineOutcome::Single(result) = h.engine.process_value(&cancellation_event(), fixed_now())
    else {
        panic!("expected a single outcome");
    };
    assert_eq!(result.message, "no matching access code found");
    assert!(h.backend.delete_calls().is_empty());

    // Hatch on: the code-value-only fallback deletes it.
    let h = harness(
        config_from("matching:\n  allow_code_only: true\n"),
        MockBackend::with_codes(vec![off_window]),
    );
    let EngineOutcome::Single(result) = h.engine.process_value(&cancellation_event(), fixed_now())
    else {
        panic!("expected a single outcome");
    };
    assert_eq!(result.message, "deleted 1 access code(s)");
    assert_eq!(
        h.backend.delete_calls(),
        vec![GatewayCall::Delete {
            access_code_id: "ac-legacy".to_string(),
        }]
    );
}

#[test]
fn scenario_action_keyword_alone_triggers_cancellation() {
    let h = harness(test_config(), MockBackend::new());
    h.store.seed(&provisioned_record());

    let event = serde_json::json!({
        "action": "booking.cancel_request",
        "booking": {
            "id": "bk-1001",
            "property_id": "464082",
            "status": "modified",
            "date_arrival": "2026-03-01",
            "date_departure": "2026-03-04"
        }
    });
    let outcome = h.engine.process_value(&event, fixed_now());
    assert!(outcome.is_fully_accepted());
    assert_eq!(h.backend.delete_calls().len(), 1);
}

#[test]
fn scenario_unmanaged_codes_are_never_touched() {
    let mut unmanaged = remote_code(
        "ac-unmanaged",
        "5309",
        Some("2026-03-01T17:30:00Z"),
        Some("2026-03-04T18:00:00Z"),
    );
    unmanaged.is_managed = Some(false);

    let h = harness(test_config(), MockBackend::with_codes(vec![unmanaged]));
    let EngineOutcome::Single(result) = h.engine.process_value(&cancellation_event(), fixed_now())
    else {
        panic!("expected a single outcome");
    };
    assert_eq!(result.message, "no matching access code found");
    assert!(h.backend.delete_calls().is_empty());
}
