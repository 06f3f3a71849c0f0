use gatehouse_core::{DocSync, GateId, Issue, Report, RunId, Snapshot, SnapshotPayload, Verdict};
use serde_json::json;

#[test]
fn test_gate_report_ids_round_trip() {
    for gate in GateId::ALL {
        assert_eq!(GateId::from_report_id(gate.report_id()), Some(gate));
    }
    assert_eq!(GateId::from_report_id("DRIFT_GUARD.json"), Some(GateId::Drift));
    assert_eq!(GateId::from_report_id("NOPE"), None);
}

#[test]
fn test_run_id_new() {
    let a = RunId::new();
    let b = RunId::new();
    assert_ne!(a, b);
}

#[test]
fn test_snapshot_payload_defaults_missing_fields() {
    let r = Report::new("REALITY_TEST", json!({"snapshot": {"endpoints_count": 3}}));
    let payload: SnapshotPayload = r.payload_as().unwrap();
    assert_eq!(payload.snapshot.endpoints_count, 3);
    assert_eq!(payload.snapshot.tests_count, 0);
    assert_eq!(payload.snapshot, Snapshot { endpoints_count: 3, ..Default::default() });
}

#[test]
fn test_verdict_exit_codes() {
    assert_eq!(Verdict::Pass.exit_code(), 0);
    assert_eq!(Verdict::Warn.exit_code(), 0);
    assert_eq!(Verdict::Fail.exit_code(), 1);
}

#[test]
fn test_soft_issues_never_fail() {
    let mut r = Report::new("X", json!(null));
    for i in 0..5 {
        r.push(Issue::soft(format!("k{i}"), i, 0));
    }
    assert!(r.passed());
    assert_eq!(r.verdict(), Verdict::Warn);
}

#[test]
fn test_doc_sync_in_sync() {
    let mut d = DocSync { index: "studies/INDEX.md".into(), ..Default::default() };
    assert!(d.is_in_sync());
    d.orphan.insert("studies/x.md".into());
    assert!(!d.is_in_sync());
}
