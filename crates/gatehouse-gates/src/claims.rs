use std::collections::BTreeSet;

use anyhow::Result;
use gatehouse_core::{Fact, GateError, GateId, Issue, Report, Severity};
use gatehouse_eval::{EvalError, Evaluator};
use gatehouse_store::{cell, table, ReportStore};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::load_first_config;
use crate::context::GateContext;
use crate::Gate;

pub const CONFIG_FILE: &str = "claims.config.json";
pub const CONFIG_FILE_YAML: &str = "claims.config.yaml";

/// Pseudo-evaluator reading a value out of another gate's report. Only the claims engine may do this.
pub const REPORT_FIELD: &str = "report-field";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimMode {
    #[default]
    #[serde(rename = "hard_fail", alias = "hard")]
    HardFail,
    #[serde(rename = "soft_fail", alias = "soft")]
    SoftFail,
}

impl ClaimMode {
    pub fn severity(self) -> Severity {
        match self {
            ClaimMode::HardFail => Severity::Hard,
            ClaimMode::SoftFail => Severity::Soft,
        }
    }
}

/// Expected value of a claim; the comparison is chosen by the fact type the evaluator returns.
/// Written as a single-key object: `{"min": 5}`, `{"superset": ["bandit"]}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "ExpectationRepr")]
pub enum Expectation {
    Equals(bool),
    Min(i64),
    Max(i64),
    Superset(BTreeSet<String>),
    Subset(BTreeSet<String>),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ExpectationRepr {
    equals: Option<bool>,
    min: Option<i64>,
    max: Option<i64>,
    superset: Option<BTreeSet<String>>,
    subset: Option<BTreeSet<String>>,
}

impl TryFrom<ExpectationRepr> for Expectation {
    type Error = String;

    fn try_from(r: ExpectationRepr) -> Result<Self, Self::Error> {
        let mut found = vec![];
        if let Some(v) = r.equals {
            found.push(Expectation::Equals(v));
        }
        if let Some(v) = r.min {
            found.push(Expectation::Min(v));
        }
        if let Some(v) = r.max {
            found.push(Expectation::Max(v));
        }
        if let Some(v) = r.superset {
            found.push(Expectation::Superset(v));
        }
        if let Some(v) = r.subset {
            found.push(Expectation::Subset(v));
        }
        match found.len() {
            1 => Ok(found.remove(0)),
            0 => Err("expected one of equals, min, max, superset, subset".into()),
            _ => Err("expected exactly one comparison".into()),
        }
    }
}

impl Expectation {
    /// Bool: equals. Int: min/max. Set: superset/subset/max (cardinality). Map: superset/subset over
    /// keys, min/max over the total. Anything else is a mismatch and fails.
    pub fn check(&self, fact: &Fact) -> bool {
        match (self, fact) {
            (Expectation::Equals(want), Fact::Bool(got)) => got == want,
            (Expectation::Min(n), Fact::Int(got)) => got >= n,
            (Expectation::Max(n), Fact::Int(got)) => got <= n,
            (Expectation::Max(n), Fact::Set(got)) => (got.len() as i64) <= *n,
            (Expectation::Superset(want), Fact::Set(got)) => got.is_superset(want),
            (Expectation::Subset(want), Fact::Set(got)) => got.is_subset(want),
            (Expectation::Superset(want), Fact::Map(got)) => want.iter().all(|k| got.contains_key(k)),
            (Expectation::Subset(want), Fact::Map(got)) => got.keys().all(|k| want.contains(k)),
            (Expectation::Min(n), Fact::Map(got)) => got.values().sum::<i64>() >= *n,
            (Expectation::Max(n), Fact::Map(got)) => got.values().sum::<i64>() <= *n,
            _ => false,
        }
    }

    /// Report values need not be integral: numeric bounds also apply to floats.
    fn check_value(&self, value: &Value) -> bool {
        if let Some(fact) = Fact::from_json(value) {
            return self.check(&fact);
        }
        match (self, value.as_f64()) {
            (Expectation::Min(n), Some(v)) => v >= *n as f64,
            (Expectation::Max(n), Some(v)) => v <= *n as f64,
            _ => false,
        }
    }

    fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub evaluator: String,
    #[serde(default)]
    pub params: Value,
    pub expected: Expectation,
    #[serde(default, alias = "severity")]
    pub mode: ClaimMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimsConfig {
    pub claims: Vec<Claim>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClaimOutcome {
    pub id: String,
    pub evaluator: String,
    pub mode: ClaimMode,
    pub expected: Expectation,
    pub ok: bool,
    pub actual: Value,
}

/// Per-claim outcomes in declaration order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EvidenceReport {
    pub overall_pass: bool,
    pub hard_fail: bool,
    pub claims: Vec<ClaimOutcome>,
}

impl EvidenceReport {
    pub fn issues(&self) -> Vec<Issue> {
        self.claims
            .iter()
            .filter(|c| !c.ok)
            .map(|c| Issue::new(c.mode.severity(), c.id.clone(), c.actual.clone(), c.expected.to_value()))
            .collect()
    }
}

#[derive(Deserialize)]
struct ReportFieldParams {
    report: String,
    #[serde(default)]
    pointer: String,
}

/// Evaluates every claim; a bad claim degrades to `ok=false` with the reason as its actual value.
pub fn evaluate_claims(ev: &Evaluator, store: &dyn ReportStore, claims: &[Claim]) -> EvidenceReport {
    let outcomes: Vec<ClaimOutcome> = claims.iter().map(|c| evaluate_claim(ev, store, c)).collect();
    let hard_fail = outcomes.iter().any(|o| !o.ok && o.mode == ClaimMode::HardFail);
    EvidenceReport {
        overall_pass: !hard_fail,
        hard_fail,
        claims: outcomes,
    }
}

fn evaluate_claim(ev: &Evaluator, store: &dyn ReportStore, claim: &Claim) -> ClaimOutcome {
    let (ok, actual) = if claim.evaluator == REPORT_FIELD {
        report_field(store, claim)
    } else {
        match ev.evaluate_named(&claim.evaluator, &claim.params) {
            Ok(fact) => (claim.expected.check(&fact), Value::from(fact)),
            Err(EvalError::UnknownEvaluator(name)) => {
                tracing::warn!(claim = %claim.id, evaluator = %name, "unknown evaluator");
                (false, json!("unknown evaluator"))
            }
            Err(err) => {
                tracing::warn!(claim = %claim.id, error = %err, "evaluator failed");
                (false, json!(format!("evaluator error: {}", err)))
            }
        }
    };
    ClaimOutcome {
        id: claim.id.clone(),
        evaluator: claim.evaluator.clone(),
        mode: claim.mode,
        expected: claim.expected.clone(),
        ok,
        actual,
    }
}

fn report_field(store: &dyn ReportStore, claim: &Claim) -> (bool, Value) {
    let params: ReportFieldParams = match serde_json::from_value(claim.params.clone()) {
        Ok(p) => p,
        Err(e) => return (false, json!(format!("invalid params: {}", e))),
    };
    let report = match store.load(&params.report) {
        Ok(Some(r)) => r,
        Ok(None) => return (false, json!(format!("report {} not found", params.report))),
        Err(e) => return (false, json!(format!("report {} unreadable: {:#}", params.report, e))),
    };
    match report.payload.pointer(&params.pointer) {
        Some(value) => (claim.expected.check_value(value), value.clone()),
        None => (false, json!(format!("{}{} not present", params.report, params.pointer))),
    }
}

pub struct ClaimsGate;

impl ClaimsGate {
    fn load(ctx: &GateContext) -> Result<ClaimsConfig, GateError> {
        let json = ctx.config_path(CONFIG_FILE);
        let yaml = ctx.config_path(CONFIG_FILE_YAML);
        load_first_config(&[json.as_path(), yaml.as_path()])
    }
}

impl Gate for ClaimsGate {
    fn id(&self) -> GateId {
        GateId::Claims
    }

    fn check_config(&self, ctx: &GateContext) -> Result<(), GateError> {
        Self::load(ctx).map(|_| ())
    }

    fn evaluate(&self, ctx: &GateContext) -> Result<Report> {
        let cfg = Self::load(ctx)?;
        tracing::debug!(claims = cfg.claims.len(), "evaluating claims");
        let evidence = evaluate_claims(&ctx.evaluator(), ctx.store.as_ref(), &cfg.claims);
        let mut report = Report::with_payload(self.id().report_id(), &evidence)?;
        report.extend(evidence.issues());
        Ok(report)
    }

    fn render_body(&self, report: &Report) -> String {
        let Ok(evidence) = report.payload_as::<EvidenceReport>() else {
            return String::new();
        };
        let rows: Vec<Vec<String>> = evidence
            .claims
            .iter()
            .enumerate()
            .map(|(i, c)| {
                vec![
                    (i + 1).to_string(),
                    format!("`{}`", c.id),
                    c.evaluator.clone(),
                    match c.mode {
                        ClaimMode::HardFail => "hard".to_string(),
                        ClaimMode::SoftFail => "soft".to_string(),
                    },
                    cell(&c.expected.to_value()),
                    cell(&c.actual),
                    if c.ok { "yes".to_string() } else { "**no**".to_string() },
                ]
            })
            .collect();
        format!(
            "Overall: **{}**\n\n{}",
            if evidence.overall_pass { "pass" } else { "fail" },
            table(&["#", "claim", "evaluator", "mode", "expected", "actual", "ok"], &rows)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_store::FsReportStore;
    use tempfile::tempdir;

    fn claim(id: &str, evaluator: &str, params: Value, expected: Expectation, mode: ClaimMode) -> Claim {
        Claim {
            id: id.into(),
            evaluator: evaluator.into(),
            params,
            expected,
            mode,
            description: None,
        }
    }

    #[test]
    fn expectation_shapes() {
        assert!(Expectation::Equals(true).check(&Fact::Bool(true)));
        assert!(Expectation::Min(5).check(&Fact::Int(12)));
        assert!(!Expectation::Min(5).check(&Fact::Int(2)));
        assert!(Expectation::Superset(["bandit".to_string()].into()).check(&Fact::set(["bandit", "safety"])));
        assert!(!Expectation::Subset(["bandit".to_string()].into()).check(&Fact::set(["bandit", "safety"])));
        assert!(Expectation::Max(0).check(&Fact::set(Vec::<String>::new())));
        assert!(!Expectation::Equals(true).check(&Fact::Int(1)));
        let m: Expectation = serde_json::from_value(json!({"superset": ["py"]})).unwrap();
        assert_eq!(m, Expectation::Superset(["py".to_string()].into()));
        assert_eq!(serde_json::to_value(&m).unwrap(), json!({"superset": ["py"]}));
        assert!(serde_json::from_value::<Expectation>(json!({"min": 1, "max": 2})).is_err());
    }

    #[test]
    fn hard_failure_fails_run_soft_failures_never_do() {
        let dir = tempdir().unwrap();
        let store = FsReportStore::new(dir.path().join("reports"));
        let ev = Evaluator::new(dir.path());
        let mut claims: Vec<Claim> = (0..5)
            .map(|i| claim(&format!("soft{i}"), "tests-count", Value::Null, Expectation::Min(100), ClaimMode::SoftFail))
            .collect();
        let soft_only = evaluate_claims(&ev, &store, &claims);
        assert!(soft_only.overall_pass);
        assert_eq!(soft_only.issues().len(), 5);
        assert!(soft_only.issues().iter().all(|i| i.severity == Severity::Soft));

        claims.push(claim("fe", "frontend-framework-present", Value::Null, Expectation::Equals(true), ClaimMode::HardFail));
        let with_hard = evaluate_claims(&ev, &store, &claims);
        assert!(!with_hard.overall_pass);
        assert!(with_hard.hard_fail);
        assert_eq!(with_hard.claims.last().unwrap().actual, json!(false));
    }

    #[test]
    fn unknown_evaluator_is_reported_not_raised_and_order_is_kept() {
        let dir = tempdir().unwrap();
        let store = FsReportStore::new(dir.path().join("reports"));
        let ev = Evaluator::new(dir.path());
        let claims = vec![
            claim("z_first", "no-such-evaluator", Value::Null, Expectation::Equals(true), ClaimMode::SoftFail),
            claim("a_second", "tests-count", Value::Null, Expectation::Max(0), ClaimMode::HardFail),
        ];
        let r = evaluate_claims(&ev, &store, &claims);
        assert_eq!(r.claims[0].id, "z_first");
        assert!(!r.claims[0].ok);
        assert_eq!(r.claims[0].actual, json!("unknown evaluator"));
        assert!(r.claims[1].ok);
        assert!(r.overall_pass);
    }

    #[test]
    fn report_field_reads_through_store() {
        let dir = tempdir().unwrap();
        let store = FsReportStore::new(dir.path().join("reports"));
        let ev = Evaluator::new(dir.path());
        let runtime = Report::new("RUNTIME_GUARD", json!({"metrics": {"success_rate_pct": 99.5}}));
        store.write(&runtime, "").unwrap();
        let params = json!({"report": "RUNTIME_GUARD", "pointer": "/metrics/success_rate_pct"});
        let claims = vec![
            claim("sr", REPORT_FIELD, params.clone(), Expectation::Min(99), ClaimMode::HardFail),
            claim("gone", REPORT_FIELD, json!({"report": "NOPE"}), Expectation::Min(1), ClaimMode::SoftFail),
        ];
        let r = evaluate_claims(&ev, &store, &claims);
        assert!(r.claims[0].ok);
        assert_eq!(r.claims[0].actual, json!(99.5));
        assert!(!r.claims[1].ok);
    }

    #[test]
    fn gate_reads_yaml_config() {
        let dir = tempdir().unwrap();
        let ctx = GateContext::for_root(dir.path());
        std::fs::create_dir_all(&ctx.governance_dir).unwrap();
        std::fs::write(
            ctx.config_path(CONFIG_FILE_YAML),
            "claims:\n  - id: has_tests\n    evaluator: tests-count\n    expected: {min: 1}\n    mode: hard_fail\n",
        )
        .unwrap();
        let r = ClaimsGate.evaluate(&ctx).unwrap();
        assert_eq!(r.issues_hard.len(), 1);
        assert_eq!(r.issues_hard[0].key, "has_tests");
        assert_eq!(r.issues_hard[0].actual, json!(0));
        assert_eq!(r.issues_hard[0].limit, json!({"min": 1}));
    }
}
