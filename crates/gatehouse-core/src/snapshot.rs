use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Fixed-shape description of the repository, produced by the reality scan and compared by the drift guard.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    #[serde(default)]
    pub langs_files: BTreeMap<String, u64>,
    #[serde(default)]
    pub endpoints_count: u64,
    #[serde(default)]
    pub tests_count: u64,
    #[serde(default)]
    pub frontend: bool,
    #[serde(default)]
    pub backend: bool,
    #[serde(default)]
    pub db: bool,
    #[serde(default)]
    pub ci_gates: BTreeSet<String>,
    #[serde(default)]
    pub repo_size_mb: u64,
}

/// Payload of the reality-scan report.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotPayload {
    pub snapshot: Snapshot,
}

/// Result of diffing the paths an index document references against the files that exist under its tree.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocSync {
    pub index: String,
    #[serde(default)]
    pub referenced: BTreeSet<String>,
    #[serde(default)]
    pub actual: BTreeSet<String>,
    #[serde(default)]
    pub missing: BTreeSet<String>,
    #[serde(default)]
    pub orphan: BTreeSet<String>,
}

impl DocSync {
    pub fn is_in_sync(&self) -> bool {
        self.missing.is_empty() && self.orphan.is_empty()
    }
}
