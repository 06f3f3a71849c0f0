use std::collections::BTreeSet;

use anyhow::Result;
use gatehouse_core::{GateError, GateId, Issue, Report};
use gatehouse_store::table;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::load_config;
use crate::context::GateContext;
use crate::slo::{classify, load_metric_snapshot, number, round2, Bound, MetricSource, Threshold};
use crate::Gate;

pub const CONFIG_FILE: &str = "runtime.guard.config.json";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Slos {
    pub success_rate_min_pct: f64,
    pub error_rate_max_pct: f64,
    pub p95_latency_ms_max: f64,
    pub p99_latency_ms_max: f64,
    pub min_rps_ci: f64,
}

impl Default for Slos {
    fn default() -> Self {
        Self {
            success_rate_min_pct: 99.0,
            error_rate_max_pct: 1.0,
            p95_latency_ms_max: 500.0,
            p99_latency_ms_max: 1000.0,
            min_rps_ci: 0.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub env: String,
    pub perf_file: String,
    pub slos: Slos,
    pub hard_fail: BTreeSet<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            env: "ci".into(),
            perf_file: "reports/runtime/perf.json".into(),
            slos: Slos::default(),
            hard_fail: ["success_rate", "error_rate"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RuntimeMetrics {
    pub success_rate_pct: f64,
    pub error_rate_pct: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub rps: f64,
}

impl RuntimeMetrics {
    /// From a `{total, ok, err, p95, p99, rps}` perf summary. Zero requests means best case.
    pub fn from_perf(perf: &Value) -> Self {
        let total = number(perf, "total");
        let (success, error) = if total > 0.0 {
            (number(perf, "ok") / total * 100.0, number(perf, "err") / total * 100.0)
        } else {
            (100.0, 0.0)
        };
        Self {
            success_rate_pct: round2(success),
            error_rate_pct: round2(error),
            p95_ms: number(perf, "p95"),
            p99_ms: number(perf, "p99"),
            rps: number(perf, "rps"),
        }
    }

    pub fn thresholds(&self, slos: &Slos) -> Vec<Threshold> {
        vec![
            Threshold::new("success_rate", self.success_rate_pct, slos.success_rate_min_pct, Bound::Min),
            Threshold::new("error_rate", self.error_rate_pct, slos.error_rate_max_pct, Bound::Max),
            Threshold::new("p95_latency", self.p95_ms, slos.p95_latency_ms_max, Bound::Max),
            Threshold::new("p99_latency", self.p99_ms, slos.p99_latency_ms_max, Bound::Max),
            Threshold::new("rps_ci", self.rps, slos.min_rps_ci, Bound::Min),
        ]
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RuntimePayload {
    pub env: String,
    pub source: MetricSource,
    pub metrics: RuntimeMetrics,
    pub slos: Slos,
}

pub struct RuntimeGate;

impl Gate for RuntimeGate {
    fn id(&self) -> GateId {
        GateId::Runtime
    }

    fn check_config(&self, ctx: &GateContext) -> Result<(), GateError> {
        load_config::<RuntimeConfig>(&ctx.config_path(CONFIG_FILE)).map(|_| ())
    }

    fn evaluate(&self, ctx: &GateContext) -> Result<Report> {
        let cfg: RuntimeConfig = load_config(&ctx.config_path(CONFIG_FILE))?;
        let (perf, source) = load_metric_snapshot(ctx, "RUNTIME_PERF_JSON", "RUNTIME_PERF_FILE", &cfg.perf_file)?;
        let metrics = perf.as_ref().map(RuntimeMetrics::from_perf).unwrap_or_else(|| RuntimeMetrics {
            success_rate_pct: 100.0,
            ..Default::default()
        });
        Ok(check_runtime(&cfg, metrics, source, perf.is_none())?)
    }

    fn render_body(&self, report: &Report) -> String {
        let Ok(p) = report.payload_as::<RuntimePayload>() else {
            return String::new();
        };
        let rows: Vec<Vec<String>> = p
            .metrics
            .thresholds(&p.slos)
            .into_iter()
            .map(|t| {
                let bound = match t.bound {
                    Bound::Min => "min",
                    Bound::Max => "max",
                };
                vec![t.key, t.actual.to_string(), format!("{} {}", bound, t.limit)]
            })
            .collect();
        format!("Environment: `{}`\n\n{}", p.env, table(&["metric", "actual", "slo"], &rows))
    }
}

pub fn check_runtime(
    cfg: &RuntimeConfig,
    metrics: RuntimeMetrics,
    source: MetricSource,
    degraded: bool,
) -> serde_json::Result<Report> {
    let issues = classify(&metrics.thresholds(&cfg.slos), &cfg.hard_fail);
    let payload = RuntimePayload {
        env: cfg.env.clone(),
        source: source.clone(),
        metrics,
        slos: cfg.slos.clone(),
    };
    let mut report = Report::with_payload(GateId::Runtime.report_id(), &payload)?;
    if degraded {
        let wanted = match &source {
            MetricSource::Absent(file) => file.clone(),
            _ => cfg.perf_file.clone(),
        };
        report.push(Issue::soft("missing_perf_snapshot", "absent", wanted));
    }
    report.extend(issues);
    Ok(report)
}
