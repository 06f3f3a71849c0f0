use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Severity, Verdict};

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// One violated rule together with the evidence pair that produced it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    pub key: String,
    pub actual: Value,
    pub limit: Value,
    pub severity: Severity,
}

impl Issue {
    pub fn new(severity: Severity, key: impl Into<String>, actual: impl Into<Value>, limit: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            actual: actual.into(),
            limit: limit.into(),
            severity,
        }
    }

    pub fn hard(key: impl Into<String>, actual: impl Into<Value>, limit: impl Into<Value>) -> Self {
        Self::new(Severity::Hard, key, actual, limit)
    }

    pub fn soft(key: impl Into<String>, actual: impl Into<Value>, limit: impl Into<Value>) -> Self {
        Self::new(Severity::Soft, key, actual, limit)
    }
}

/// The single artifact a gate produces per run. Replaced wholesale on every run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub schema_version: u32,
    pub id: String,
    pub generated_at: DateTime<Utc>,
    pub payload: Value,
    #[serde(default)]
    pub issues_hard: Vec<Issue>,
    #[serde(default)]
    pub issues_soft: Vec<Issue>,
}

impl Report {
    pub fn new(id: impl Into<String>, payload: Value) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            id: id.into(),
            generated_at: Utc::now(),
            payload,
            issues_hard: vec![],
            issues_soft: vec![],
        }
    }

    /// Builds a report from a typed payload. Payload types are plain structs so serialization cannot fail
    /// short of non-string map keys, which none of them use.
    pub fn with_payload<T: Serialize>(id: impl Into<String>, payload: &T) -> serde_json::Result<Self> {
        Ok(Self::new(id, serde_json::to_value(payload)?))
    }

    /// Routes the issue into the list matching its severity, keeping insertion order.
    pub fn push(&mut self, issue: Issue) {
        match issue.severity {
            Severity::Hard => self.issues_hard.push(issue),
            Severity::Soft => self.issues_soft.push(issue),
        }
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = Issue>) {
        for issue in issues {
            self.push(issue);
        }
    }

    pub fn verdict(&self) -> Verdict {
        if !self.issues_hard.is_empty() {
            Verdict::Fail
        } else if !self.issues_soft.is_empty() {
            Verdict::Warn
        } else {
            Verdict::Pass
        }
    }

    pub fn passed(&self) -> bool {
        self.issues_hard.is_empty()
    }

    pub fn payload_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.payload.clone())
    }
}
