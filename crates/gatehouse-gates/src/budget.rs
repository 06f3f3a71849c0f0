use std::collections::BTreeSet;

use anyhow::Result;
use gatehouse_core::{GateError, GateId, Issue, Report};
use gatehouse_store::table;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::load_config;
use crate::context::GateContext;
use crate::slo::{classify, load_metric_snapshot, number, round2, Bound, MetricSource, Threshold};
use crate::upstream::{read_upstream, Upstream};
use crate::Gate;

pub const CONFIG_FILE: &str = "budget.sentinel.config.json";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CostBudgets {
    pub gpu_usd_max: f64,
    pub api_usd_max: f64,
    pub storage_usd_max: f64,
}

impl Default for CostBudgets {
    fn default() -> Self {
        Self {
            gpu_usd_max: 500.0,
            api_usd_max: 200.0,
            storage_usd_max: 50.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ErrorBudget {
    pub window_days: u32,
    pub allowed_error_pct: f64,
}

impl Default for ErrorBudget {
    fn default() -> Self {
        Self {
            window_days: 30,
            allowed_error_pct: 1.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BudgetConfig {
    pub period: String,
    pub snapshot_file: String,
    pub budgets: CostBudgets,
    pub error_budget: ErrorBudget,
    pub hard_fail: BTreeSet<String>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            period: "monthly".into(),
            snapshot_file: "reports/finance/costs.json".into(),
            budgets: CostBudgets::default(),
            error_budget: ErrorBudget::default(),
            hard_fail: ["gpu", "api", "storage", "error_budget"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CostActuals {
    pub gpu_usd: f64,
    pub api_usd: f64,
    pub storage_usd: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorRateSource {
    RuntimeGuard,
    Env,
    Assumed,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BudgetPayload {
    pub period: String,
    pub costs: CostActuals,
    pub limits: CostBudgets,
    pub error_budget: ErrorBudget,
    pub actual_error_pct: f64,
    pub cost_source: MetricSource,
    pub error_source: ErrorRateSource,
}

pub struct BudgetGate;

impl Gate for BudgetGate {
    fn id(&self) -> GateId {
        GateId::Budget
    }

    fn check_config(&self, ctx: &GateContext) -> Result<(), GateError> {
        load_config::<BudgetConfig>(&ctx.config_path(CONFIG_FILE)).map(|_| ())
    }

    fn evaluate(&self, ctx: &GateContext) -> Result<Report> {
        let cfg: BudgetConfig = load_config(&ctx.config_path(CONFIG_FILE))?;
        let (snap, cost_source) =
            load_metric_snapshot(ctx, "BUDGET_SNAPSHOT_JSON", "BUDGET_SNAPSHOT_FILE", &cfg.snapshot_file)?;
        let costs = snap.as_ref().map(costs_from).unwrap_or_default();
        let runtime_id = GateId::Runtime.report_id();
        let runtime = read_upstream::<Value>(ctx.store.as_ref(), runtime_id);
        let runtime_unreadable = match &runtime {
            Upstream::Unreadable(reason) => Some(reason.clone()),
            Upstream::Absent | Upstream::Ready(_) => None,
        };
        let (error_pct, error_source) = error_rate(ctx, runtime.ready().as_ref())?;

        let payload = BudgetPayload {
            period: cfg.period.clone(),
            costs,
            limits: cfg.budgets.clone(),
            error_budget: cfg.error_budget.clone(),
            actual_error_pct: round2(error_pct),
            cost_source,
            error_source,
        };
        let mut report = Report::with_payload(self.id().report_id(), &payload)?;
        if snap.is_none() {
            report.push(Issue::soft("missing_snapshot", "absent", cfg.snapshot_file.clone()));
        }
        if let Some(reason) = runtime_unreadable {
            report.push(Issue::soft("runtime_unreadable", reason, format!("readable {}", runtime_id)));
        }
        if payload.error_source == ErrorRateSource::Assumed {
            report.push(Issue::soft("missing_error_rate", "absent", "RUNTIME_GUARD or ERROR_RATE_PCT"));
        }
        report.extend(classify(&thresholds(&payload), &cfg.hard_fail));
        Ok(report)
    }

    fn render_body(&self, report: &Report) -> String {
        let Ok(p) = report.payload_as::<BudgetPayload>() else {
            return String::new();
        };
        let rows: Vec<Vec<String>> = thresholds(&p)
            .into_iter()
            .map(|t| vec![t.key, format!("{:.2}", t.actual), format!("max {:.2}", t.limit)])
            .collect();
        format!(
            "Period: {} (error window {} days)\n\n{}",
            p.period,
            p.error_budget.window_days,
            table(&["budget", "actual", "limit"], &rows)
        )
    }
}

fn costs_from(doc: &Value) -> CostActuals {
    CostActuals {
        gpu_usd: number(doc, "gpu_usd"),
        api_usd: number(doc, "api_usd"),
        storage_usd: number(doc, "storage_usd"),
    }
}

fn thresholds(p: &BudgetPayload) -> Vec<Threshold> {
    vec![
        Threshold::new("gpu", p.costs.gpu_usd, p.limits.gpu_usd_max, Bound::Max),
        Threshold::new("api", p.costs.api_usd, p.limits.api_usd_max, Bound::Max),
        Threshold::new("storage", p.costs.storage_usd, p.limits.storage_usd_max, Bound::Max),
        Threshold::new("error_budget", p.actual_error_pct, p.error_budget.allowed_error_pct, Bound::Max),
    ]
}

/// RUNTIME_GUARD's measured error rate, else `ERROR_RATE_PCT`, else an assumed 0.
/// RUNTIME_GUARD's measured rate, else `ERROR_RATE_PCT`, else 0.
fn error_rate(ctx: &GateContext, runtime: Option<&Value>) -> Result<(f64, ErrorRateSource)> {
    let measured = runtime.and_then(|p| p.pointer("/metrics/error_rate_pct")).and_then(Value::as_f64);
    if let Some(pct) = measured {
        return Ok((pct, ErrorRateSource::RuntimeGuard));
    }
    if let Some(raw) = ctx.env.get("ERROR_RATE_PCT") {
        let pct = raw.trim().parse::<f64>().map_err(|e| GateError::InvalidOverride {
            name: "ERROR_RATE_PCT".into(),
            message: e.to_string(),
        })?;
        return Ok((pct, ErrorRateSource::Env));
    }
    Ok((0.0, ErrorRateSource::Assumed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::EnvOverrides;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn no_data_passes_with_soft_issues() {
        let dir = tempdir().unwrap();
        let ctx = GateContext::for_root(dir.path());
        let r = BudgetGate.evaluate(&ctx).unwrap();
        assert!(r.passed());
        let soft: Vec<_> = r.issues_soft.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(soft, vec!["missing_snapshot", "missing_error_rate"]);
    }

    #[test]
    fn over_budget_and_error_rate_from_runtime_report() {
        let dir = tempdir().unwrap();
        let env = EnvOverrides::from_pairs([
            ("BUDGET_SNAPSHOT_JSON", r#"{"gpu_usd": 900.5, "api_usd": 10, "storage_usd": 1}"#),
            ("ERROR_RATE_PCT", "0.1"),
        ]);
        let ctx = GateContext::for_root(dir.path()).with_env(env);
        let runtime = Report::new("RUNTIME_GUARD", json!({"metrics": {"error_rate_pct": 4.5}}));
        ctx.store.write(&runtime, "").unwrap();

        let r = BudgetGate.evaluate(&ctx).unwrap();
        let hard: Vec<_> = r.issues_hard.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(hard, vec!["gpu", "error_budget"]);
        let p: BudgetPayload = r.payload_as().unwrap();
        assert_eq!(p.error_source, ErrorRateSource::RuntimeGuard);
        assert_eq!(p.actual_error_pct, 4.5);
        assert!(r.issues_soft.is_empty());
    }

    #[test]
    fn corrupt_runtime_report_falls_back_to_env() {
        let dir = tempdir().unwrap();
        let env = EnvOverrides::from_pairs([("BUDGET_SNAPSHOT_JSON", "{}"), ("ERROR_RATE_PCT", "0.5")]);
        let ctx = GateContext::for_root(dir.path()).with_env(env);
        std::fs::create_dir_all(ctx.store.json_path("RUNTIME_GUARD").parent().unwrap()).unwrap();
        std::fs::write(ctx.store.json_path("RUNTIME_GUARD"), "{ truncated").unwrap();

        let r = BudgetGate.evaluate(&ctx).unwrap();
        assert!(r.passed());
        let p: BudgetPayload = r.payload_as().unwrap();
        assert_eq!(p.error_source, ErrorRateSource::Env);
        assert_eq!(p.actual_error_pct, 0.5);
        let soft: Vec<_> = r.issues_soft.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(soft, vec!["runtime_unreadable"]);
    }

    #[test]
    fn soft_classification_when_key_not_hard() {
        let dir = tempdir().unwrap();
        let ctx = GateContext::for_root(dir.path())
            .with_env(EnvOverrides::from_pairs([("BUDGET_SNAPSHOT_JSON", r#"{"api_usd": 250}"#), ("ERROR_RATE_PCT", "0")]));
        std::fs::create_dir_all(&ctx.governance_dir).unwrap();
        std::fs::write(ctx.config_path(CONFIG_FILE), r#"{"hard_fail": ["gpu"]}"#).unwrap();
        let r = BudgetGate.evaluate(&ctx).unwrap();
        assert!(r.passed());
        assert_eq!(r.issues_soft.len(), 1);
        assert_eq!(r.issues_soft[0].key, "api");
    }
}
