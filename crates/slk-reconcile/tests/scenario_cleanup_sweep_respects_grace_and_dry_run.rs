mod common;

use common::*;
use slk_reconcile::EngineOutcome;
use slk_schemas::ProcessStatus;

fn sweep_codes() -> Vec<slk_gateway::RemoteCode> {
    vec![
        // Ended Mar 4; with now = Mar 10 and a 1-day grace this is expired.
        remote_code(
            "ac-expired",
            "5309",
            Some("2026-03-01T17:30:00Z"),
            Some("2026-03-04T18:00:00Z"),
        ),
        // Ends Mar 20: still live.
        remote_code(
            "ac-live",
            "2222",
            Some("2026-03-15T17:30:00Z"),
            Some("2026-03-20T18:00:00Z"),
        ),
        // Ended within the grace period: left alone.
        remote_code(
            "ac-graced",
            "3333",
            Some("2026-03-08T17:30:00Z"),
            Some("2026-03-09T20:00:00Z"),
        ),
        // No end timestamp: never touched by the sweep.
        remote_code("ac-endless", "4444", None, None),
    ]
}

#[test]
fn scenario_sweep_deletes_only_codes_past_the_grace_period() {
    let h = harness(test_config(), MockBackend::with_codes(sweep_codes()));

    let EngineOutcome::Single(result) = h
        .engine
        .process_value(&serde_json::json!({"mode": "cleanup"}), fixed_now())
    else {
        panic!("expected a single outcome");
    };
    assert_eq!(result.status, ProcessStatus::Accepted);
    // Both mapped devices list the same scripted codes.
    assert_eq!(result.message, "cleanup complete: checked=8 deleted=2");

    let deletes = h.backend.delete_calls();
    assert_eq!(deletes.len(), 2);
    assert!(deletes.iter().all(|c| matches!(
        c,
        GatewayCall::Delete { access_code_id } if access_code_id == "ac-expired"
    )));
}

#[test]
fn scenario_dry_run_reports_without_deleting() {
    let h = harness(
        config_from("cleanup:\n  dry_run: true\n"),
        MockBackend::with_codes(sweep_codes()),
    );

    let EngineOutcome::Single(result) = h
        .engine
        .process_value(&serde_json::json!({"mode": "cleanup"}), fixed_now())
    else {
        panic!("expected a single outcome");
    };
    assert_eq!(result.message, "cleanup dry run: checked=8 would_delete=2");
    assert!(h.backend.delete_calls().is_empty());
}

#[test]
fn scenario_scheduler_source_marker_triggers_the_sweep() {
    let h = harness(
        config_from("events:\n  scheduler_source: \"aws.events\"\n"),
        MockBackend::with_codes(sweep_codes()),
    );

    let outcome = h
        .engine
        .process_value(&serde_json::json!({"source": "aws.events"}), fixed_now());
    assert!(outcome.is_fully_accepted());
    // Two devices listed.
    let lists: Vec<_> = h
        .backend
        .calls()
        .into_iter()
        .filter(|c| matches!(c, GatewayCall::List { .. }))
        .collect();
    assert_eq!(lists.len(), 2);
}

#[test]
fn scenario_longer_grace_keeps_recent_codes() {
    // A 7-day grace keeps even the Mar-4 code.
    let h = harness(
        config_from("cleanup:\n  grace_days: 7\n"),
        MockBackend::with_codes(sweep_codes()),
    );

    let EngineOutcome::Single(result) = h
        .engine
        .process_value(&serde_json::json!({"mode": "cleanup"}), fixed_now())
    else {
        panic!("expected a single outcome");
    };
    assert_eq!(result.message, "cleanup complete: checked=8 deleted=0");
}
