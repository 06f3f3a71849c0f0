use std::fs;
use std::path::Path;

use gatehouse_core::{EnvOverrides, GateId, Verdict};
use gatehouse_runner::{Runner, SummaryPayload};

fn write(root: &Path, rel: &str, body: &str) {
    let p = root.join(rel);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(p, body).unwrap();
}

fn seed_repo(root: &Path) {
    write(root, "src/backend/main.py", "@app.get('/a')\ndef a(): pass\n@app.post('/b')\ndef b(): pass\n");
    write(root, "tests/test_a.py", "def test_one(): pass\ndef test_two(): pass\n");
    write(root, "studies/MASTER_STUDIES_INDEX.md", "# Studies\n\n- [Guide](guide.md)\n");
    write(root, "studies/guide.md", "# Guide\n");
    write(root, "README.md", "# demo\n");
}

fn runner(root: &Path) -> Runner {
    Runner::init_repo(root).unwrap();
    Runner::open(root.to_path_buf()).unwrap().with_env(EnvOverrides::default())
}

#[test]
fn pipeline_writes_every_report_and_a_summary() {
    let dir = tempfile::tempdir().unwrap();
    seed_repo(dir.path());
    let r = runner(dir.path());

    let outcome = r.pipeline().unwrap();
    assert_eq!(outcome.runs.len(), 7);
    for id in [
        GateId::Snapshot,
        GateId::DocMap,
        GateId::Preflight,
        GateId::Runtime,
        GateId::Claims,
        GateId::Drift,
        GateId::Budget,
        GateId::Summary,
    ] {
        assert!(
            dir.path().join("reports").join(format!("{}.json", id.report_id())).is_file(),
            "missing {}",
            id
        );
    }

    let payload: SummaryPayload = outcome.summary.payload_as().unwrap();
    assert_eq!(payload.gates.len(), 7);
    assert!(!payload.gates.iter().any(|g| g.errored));
    // Runtime and budget have no metric snapshots here, so they degrade to warnings at worst.
    for g in &payload.gates {
        if g.gate == "RUNTIME_GUARD" || g.gate == "BUDGET_SENTINEL" {
            assert_ne!(g.verdict, Verdict::Fail, "{} failed", g.gate);
        }
    }
}

#[test]
fn broken_gate_config_fails_only_that_gate() {
    let dir = tempfile::tempdir().unwrap();
    seed_repo(dir.path());
    let r = runner(dir.path());
    write(dir.path(), "governance/budget.sentinel.config.json", "{ nope");

    let outcome = r.pipeline().unwrap();
    let budget = outcome.runs.iter().find(|run| run.gate == GateId::Budget).unwrap();
    assert!(budget.errored);
    assert_eq!(budget.report.issues_hard[0].key, "gate_error");
    assert_eq!(outcome.runs.iter().filter(|run| run.errored).count(), 1);

    assert_eq!(outcome.verdict(), Verdict::Fail);
    assert!(outcome.summary.issues_hard.iter().any(|i| i.key == "BUDGET_SENTINEL"));
}

#[test]
fn promote_then_delta_drift_is_clean() {
    let dir = tempfile::tempdir().unwrap();
    seed_repo(dir.path());
    let r = runner(dir.path());
    write(dir.path(), "governance/drift_guard.config.json", r#"{"mode": "delta"}"#);

    assert!(r.promote("REALITY_TEST").is_err());
    r.run_gate(GateId::Snapshot).unwrap();
    let path = r.promote("REALITY_TEST.json").unwrap();
    assert!(path.starts_with(dir.path().join("governance").join("baseline")));

    let docmap = r.run_gate(GateId::DocMap).unwrap();
    assert!(docmap.report.issues_hard.is_empty(), "{:?}", docmap.report.issues_hard);
    let drift = r.run_gate(GateId::Drift).unwrap();
    assert!(!drift.errored);
    assert!(drift.report.issues_hard.is_empty(), "{:?}", drift.report.issues_hard);
}

#[test]
fn release_and_summary_are_not_standalone_gates() {
    let dir = tempfile::tempdir().unwrap();
    let r = runner(dir.path());
    assert!(r.run_gate(GateId::Release).is_err());
    assert!(r.run_gate(GateId::Summary).is_err());
}
