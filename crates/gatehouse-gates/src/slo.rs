//! Threshold classification shared by the runtime and budget guards.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use gatehouse_core::{GateError, Issue, Severity};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::GateContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    /// actual must be >= limit
    Min,
    /// actual must be <= limit
    Max,
}

impl Bound {
    pub fn holds(self, actual: f64, limit: f64) -> bool {
        match self {
            Bound::Min => actual >= limit,
            Bound::Max => actual <= limit,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub key: String,
    pub actual: f64,
    pub limit: f64,
    pub bound: Bound,
}

impl Threshold {
    pub fn new(key: &str, actual: f64, limit: f64, bound: Bound) -> Self {
        Self {
            key: key.to_string(),
            actual,
            limit,
            bound,
        }
    }
}

/// One issue per violated threshold: hard when its key is in `hard_keys`, soft otherwise.
pub fn classify(thresholds: &[Threshold], hard_keys: &BTreeSet<String>) -> Vec<Issue> {
    thresholds
        .iter()
        .filter(|t| !t.bound.holds(t.actual, t.limit))
        .map(|t| {
            let severity = if hard_keys.contains(&t.key) { Severity::Hard } else { Severity::Soft };
            Issue::new(severity, t.key.clone(), t.actual, t.limit)
        })
        .collect()
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Where an externally supplied metric snapshot came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum MetricSource {
    Env(String),
    File(String),
    Absent(String),
}

/// Resolves a metric snapshot: inline JSON env var, then file named by env var, then the configured
/// default file. Absence is `Ok(None)`; a malformed inline value is a configuration error.
pub fn load_metric_snapshot(
    ctx: &GateContext,
    json_var: &str,
    file_var: &str,
    default_file: &str,
) -> Result<(Option<Value>, MetricSource)> {
    if let Some(raw) = ctx.env.get(json_var) {
        let value = serde_json::from_str(raw).map_err(|e| GateError::InvalidOverride {
            name: json_var.to_string(),
            message: e.to_string(),
        })?;
        return Ok((Some(value), MetricSource::Env(json_var.to_string())));
    }
    let file = ctx.env.get(file_var).unwrap_or(default_file).to_string();
    let path: PathBuf = ctx.resolve(&file);
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "metric snapshot absent");
        return Ok((None, MetricSource::Absent(file)));
    }
    let bytes = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
    let value = serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))?;
    Ok((Some(value), MetricSource::File(file)))
}

pub fn number(doc: &Value, key: &str) -> f64 {
    doc.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::EnvOverrides;
    use tempfile::tempdir;

    #[test]
    fn classify_by_table_membership() {
        let hard: BTreeSet<String> = ["error_rate".to_string()].into_iter().collect();
        let issues = classify(
            &[
                Threshold::new("success_rate", 90.0, 99.0, Bound::Min),
                Threshold::new("error_rate", 5.0, 1.0, Bound::Max),
                Threshold::new("p95_latency", 100.0, 500.0, Bound::Max),
            ],
            &hard,
        );
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].key, "success_rate");
        assert_eq!(issues[0].severity, Severity::Soft);
        assert_eq!(issues[1].key, "error_rate");
        assert_eq!(issues[1].severity, Severity::Hard);
    }

    #[test]
    fn env_json_beats_file_and_bad_json_is_config_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("perf.json"), r#"{"total": 1}"#).unwrap();
        let ctx = GateContext::for_root(dir.path());
        let (v, src) = load_metric_snapshot(&ctx, "RUNTIME_PERF_JSON", "RUNTIME_PERF_FILE", "perf.json").unwrap();
        assert_eq!(v.unwrap()["total"], 1);
        assert_eq!(src, MetricSource::File("perf.json".into()));

        let ctx = ctx.with_env(EnvOverrides::from_pairs([("RUNTIME_PERF_JSON", r#"{"total": 9}"#)]));
        let (v, _) = load_metric_snapshot(&ctx, "RUNTIME_PERF_JSON", "RUNTIME_PERF_FILE", "perf.json").unwrap();
        assert_eq!(v.unwrap()["total"], 9);

        let ctx = ctx.with_env(EnvOverrides::from_pairs([("RUNTIME_PERF_JSON", "{oops")]));
        let err = load_metric_snapshot(&ctx, "RUNTIME_PERF_JSON", "RUNTIME_PERF_FILE", "perf.json").unwrap_err();
        assert!(err.downcast_ref::<GateError>().is_some());
    }
}
