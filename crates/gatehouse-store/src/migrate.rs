use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use gatehouse_core::{Issue, Report, Severity, REPORT_SCHEMA_VERSION};
use serde_json::{Map, Value};

/// Upgrades any report document found on disk to the current schema.
///
/// Version-less documents are the flat shapes older tooling wrote (e.g. `{"snapshot": {...}}` or
/// `{"issues_hard": ["text", ...], "overall_pass": false}`): everything except the issue lists and the
/// derived pass flag becomes the payload.
pub fn migrate_report(id: &str, value: Value) -> Result<Report> {
    let version = value.get("schema_version").and_then(Value::as_u64);
    match version {
        Some(v) if v == u64::from(REPORT_SCHEMA_VERSION) => Ok(serde_json::from_value(value)?),
        Some(v) => Err(anyhow!("unsupported report schema_version {v} (max {REPORT_SCHEMA_VERSION})")),
        None => migrate_legacy(id, value),
    }
}

fn migrate_legacy(id: &str, value: Value) -> Result<Report> {
    let Value::Object(mut obj) = value else {
        return Err(anyhow!("legacy report must be a JSON object"));
    };
    let issues_hard = take_issues(&mut obj, "issues_hard", Severity::Hard);
    let issues_soft = take_issues(&mut obj, "issues_soft", Severity::Soft);
    obj.remove("overall_pass");
    let generated_at = obj
        .get("generated_at")
        .or_else(|| obj.get("timestamp"))
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    obj.remove("generated_at");

    Ok(Report {
        schema_version: REPORT_SCHEMA_VERSION,
        id: id.to_string(),
        generated_at,
        payload: Value::Object(obj),
        issues_hard,
        issues_soft,
    })
}

fn take_issues(obj: &mut Map<String, Value>, field: &str, severity: Severity) -> Vec<Issue> {
    let Some(Value::Array(items)) = obj.remove(field) else {
        return vec![];
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(o) => {
                let key = o.get("key").and_then(Value::as_str).unwrap_or("legacy").to_string();
                let actual = o.get("actual").or_else(|| o.get("note")).cloned().unwrap_or(Value::Null);
                let limit = o.get("limit").cloned().unwrap_or(Value::Null);
                Issue::new(severity, key, actual, limit)
            }
            other => Issue::new(severity, "legacy", other, Value::Null),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn current_version_passes_through() {
        let r = Report::new("X", json!({"a": 1}));
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(migrate_report("X", v).unwrap(), r);
    }

    #[test]
    fn legacy_drift_report_is_lifted() {
        let legacy = json!({
            "issues_hard": ["Tests below minimum: 2 < 5"],
            "issues_soft": [{"key": "missing_snapshot", "note": "No cost snapshot provided."}],
            "overall_pass": false
        });
        let r = migrate_report("DRIFT_GUARD", legacy).unwrap();
        assert_eq!(r.id, "DRIFT_GUARD");
        assert_eq!(r.issues_hard.len(), 1);
        assert_eq!(r.issues_hard[0].key, "legacy");
        assert_eq!(r.issues_soft[0].key, "missing_snapshot");
        assert_eq!(r.issues_soft[0].actual, json!("No cost snapshot provided."));
        assert_eq!(r.payload, json!({}));
    }

    #[test]
    fn legacy_snapshot_keeps_payload() {
        let legacy = json!({"snapshot": {"tests_count": 12}});
        let r = migrate_report("REALITY_TEST", legacy).unwrap();
        assert_eq!(r.payload["snapshot"]["tests_count"], json!(12));
        assert!(r.passed());
    }

    #[test]
    fn future_version_is_rejected() {
        assert!(migrate_report("X", json!({"schema_version": 99})).is_err());
    }
}
