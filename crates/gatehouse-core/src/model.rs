use std::fmt;

use serde::{Deserialize, Serialize};

/// Every report-producing step of the pipeline. The report id is the stable file stem under the reports dir.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum GateId {
    Snapshot,
    DocMap,
    Preflight,
    Claims,
    Drift,
    Runtime,
    Budget,
    Release,
    Summary,
}

impl GateId {
    pub const ALL: [GateId; 9] = [
        GateId::Snapshot,
        GateId::DocMap,
        GateId::Preflight,
        GateId::Claims,
        GateId::Drift,
        GateId::Runtime,
        GateId::Budget,
        GateId::Release,
        GateId::Summary,
    ];

    pub fn report_id(self) -> &'static str {
        match self {
            GateId::Snapshot => "REALITY_TEST",
            GateId::DocMap => "DOCMAP_SYNC",
            GateId::Preflight => "CLEAN_RELEASE_REPORT",
            GateId::Claims => "CLAIMS_EVIDENCE",
            GateId::Drift => "DRIFT_GUARD",
            GateId::Runtime => "RUNTIME_GUARD",
            GateId::Budget => "BUDGET_SENTINEL",
            GateId::Release => "RELEASE_PACK",
            GateId::Summary => "GOVERNANCE_SUMMARY",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            GateId::Snapshot => "Reality Test",
            GateId::DocMap => "Doc Map Sync",
            GateId::Preflight => "Clean Release Preflight",
            GateId::Claims => "Claims Evidence",
            GateId::Drift => "Drift Guard",
            GateId::Runtime => "Runtime Guard",
            GateId::Budget => "Budget Sentinel",
            GateId::Release => "Release Pack",
            GateId::Summary => "Governance Summary",
        }
    }

    pub fn from_report_id(id: &str) -> Option<Self> {
        let stem = id.strip_suffix(".json").unwrap_or(id);
        Self::ALL.into_iter().find(|g| g.report_id() == stem)
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.report_id())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Hard,
    Soft,
}

/// Run-level outcome of one report: any hard issue fails, soft-only warns.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}

impl Verdict {
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Fail => 1,
            Verdict::Pass | Verdict::Warn => 0,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("PASS"),
            Verdict::Warn => f.write_str("WARN"),
            Verdict::Fail => f.write_str("FAIL"),
        }
    }
}
