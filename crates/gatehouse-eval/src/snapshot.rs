use std::collections::{BTreeMap, BTreeSet};

use gatehouse_core::{Fact, Snapshot};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::EvalError;
use crate::evaluator::Evaluator;
use crate::kind::EvaluatorKind;

/// Evaluator params for each snapshot field; `null` keeps the evaluator defaults.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub langs: Value,
    pub endpoints: Value,
    pub tests: Value,
    pub frontend: Value,
    pub backend: Value,
    pub db: Value,
    pub ci: Value,
    pub size: Value,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            langs: Value::Null,
            endpoints: Value::Null,
            tests: Value::Null,
            frontend: Value::Null,
            backend: json!({"path": "src/backend/main.py"}),
            db: Value::Null,
            ci: Value::Null,
            size: Value::Null,
        }
    }
}

/// A snapshot input that produced only the neutral value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvidenceGap {
    pub key: &'static str,
    pub expected: &'static str,
}

pub fn scan_snapshot(ev: &Evaluator, cfg: &SnapshotConfig) -> Result<(Snapshot, Vec<EvidenceGap>), EvalError> {
    let langs_files: BTreeMap<String, u64> = match ev.evaluate(EvaluatorKind::LangsFiles, &cfg.langs)? {
        Fact::Map(m) => m.into_iter().map(|(k, v)| (k, v.max(0) as u64)).collect(),
        _ => BTreeMap::new(),
    };
    let snapshot = Snapshot {
        langs_files,
        endpoints_count: int(ev.evaluate(EvaluatorKind::BackendEndpointCount, &cfg.endpoints)?),
        tests_count: int(ev.evaluate(EvaluatorKind::TestsCount, &cfg.tests)?),
        frontend: boolean(ev.evaluate(EvaluatorKind::FrontendFrameworkPresent, &cfg.frontend)?),
        backend: boolean(ev.evaluate(EvaluatorKind::FileExists, &cfg.backend)?),
        db: boolean(ev.evaluate(EvaluatorKind::DbLayerPresent, &cfg.db)?),
        ci_gates: set(ev.evaluate(EvaluatorKind::CiGatesPresent, &cfg.ci)?),
        repo_size_mb: int(ev.evaluate(EvaluatorKind::RepoSizeMegabytes, &cfg.size)?),
    };

    let mut gaps = vec![];
    if snapshot.langs_files.is_empty() {
        gaps.push(EvidenceGap { key: "no_source_files", expected: "at least one governed source file" });
    }
    if snapshot.tests_count == 0 {
        gaps.push(EvidenceGap { key: "no_tests_found", expected: "test files matching the configured globs" });
    }
    if snapshot.ci_gates.is_empty() {
        gaps.push(EvidenceGap { key: "no_ci_scanners", expected: "security scanners in CI workflows" });
    }
    Ok((snapshot, gaps))
}

fn int(f: Fact) -> u64 {
    match f {
        Fact::Int(n) => n.max(0) as u64,
        _ => 0,
    }
}

fn boolean(f: Fact) -> bool {
    matches!(f, Fact::Bool(true))
}

fn set(f: Fact) -> BTreeSet<String> {
    match f {
        Fact::Set(s) => s,
        _ => BTreeSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &std::path::Path, rel: &str, body: &str) {
        let p = root.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, body).unwrap();
    }

    #[test]
    fn scans_small_repo() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "src/backend/main.py", "@app.get('/')\n@app.post('/a')\n@router.delete('/b')\n");
        write(root, "src/frontend/package.json", r#"{"dependencies": {"next": "14"}}"#);
        write(root, "src/frontend/app.tsx", "");
        write(root, "tests/test_api.py", "");
        write(root, ".github/workflows/sec.yml", "steps:\n  - run: safety check\n");

        let (snap, gaps) = scan_snapshot(&Evaluator::new(root), &SnapshotConfig::default()).unwrap();
        assert_eq!(snap.endpoints_count, 3);
        assert_eq!(snap.tests_count, 1);
        assert!(snap.frontend);
        assert!(snap.backend);
        assert!(!snap.db);
        assert_eq!(snap.langs_files.get("py"), Some(&2));
        assert_eq!(snap.langs_files.get("ts"), Some(&1));
        assert!(snap.ci_gates.contains("safety"));
        assert!(gaps.is_empty());
    }

    #[test]
    fn empty_repo_reports_gaps_not_errors() {
        let dir = tempdir().unwrap();
        let (snap, gaps) = scan_snapshot(&Evaluator::new(dir.path()), &SnapshotConfig::default()).unwrap();
        assert_eq!(snap, Snapshot::default());
        let keys: Vec<_> = gaps.iter().map(|g| g.key).collect();
        assert_eq!(keys, vec!["no_source_files", "no_tests_found", "no_ci_scanners"]);
    }
}
