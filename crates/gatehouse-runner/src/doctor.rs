use serde::Serialize;

use gatehouse_gates::{gate_for, GateContext};
use gatehouse_release::{ReleaseConfig, ReleaseError, CONFIG_FILE as RELEASE_CONFIG_FILE};

use crate::pipeline::STAGES;
use crate::util::git_commit;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum CheckStatus {
    Ok,
    /// Not configured; the dependent step falls back or is unavailable.
    Absent(String),
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DoctorCheck {
    pub name: String,
    pub status: CheckStatus,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct DoctorReport {
    pub checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    pub fn healthy(&self) -> bool {
        !self.checks.iter().any(|c| matches!(c.status, CheckStatus::Invalid(_)))
    }
}

/// Parses every gate config and the release config without evaluating anything.
pub fn doctor(ctx: &GateContext) -> DoctorReport {
    let mut checks = Vec::new();

    for id in STAGES.iter().flat_map(|s| s.iter().copied()) {
        let Some(gate) = gate_for(id) else { continue };
        let status = match gate.check_config(ctx) {
            Ok(()) => CheckStatus::Ok,
            Err(err) => CheckStatus::Invalid(err.to_string()),
        };
        checks.push(DoctorCheck { name: id.report_id().to_string(), status });
    }

    let release = match ReleaseConfig::load_from(&ctx.config_path(RELEASE_CONFIG_FILE)) {
        Ok(_) => CheckStatus::Ok,
        Err(ReleaseError::MissingConfig(path)) => {
            CheckStatus::Absent(format!("{} not found; release pack unavailable", path.display()))
        }
        Err(err) => CheckStatus::Invalid(err.to_string()),
    };
    checks.push(DoctorCheck { name: "RELEASE_PACK".to_string(), status: release });

    let git = match git_commit(&ctx.root) {
        Some(_) => CheckStatus::Ok,
        None => CheckStatus::Absent("not a git checkout; release build info omits commit".to_string()),
    };
    checks.push(DoctorCheck { name: "git".to_string(), status: git });

    for c in &checks {
        if let CheckStatus::Invalid(detail) = &c.status {
            tracing::warn!(check = %c.name, %detail, "doctor check failed");
        }
    }
    DoctorReport { checks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn status<'a>(report: &'a DoctorReport, name: &str) -> &'a CheckStatus {
        &report.checks.iter().find(|c| c.name == name).unwrap().status
    }

    #[test]
    fn empty_repo_is_healthy_without_release_config() {
        let dir = tempdir().unwrap();
        let ctx = GateContext::for_root(dir.path());
        let report = doctor(&ctx);
        assert!(report.healthy());
        assert_eq!(status(&report, "DRIFT_GUARD"), &CheckStatus::Ok);
        assert!(matches!(status(&report, "RELEASE_PACK"), CheckStatus::Absent(_)));
    }

    #[test]
    fn malformed_configs_are_reported() {
        let dir = tempdir().unwrap();
        let gov = dir.path().join("governance");
        std::fs::create_dir_all(&gov).unwrap();
        std::fs::write(gov.join("drift_guard.config.json"), "{ not json").unwrap();
        std::fs::write(gov.join(RELEASE_CONFIG_FILE), r#"{"include": []}"#).unwrap();

        let ctx = GateContext::for_root(dir.path());
        let report = doctor(&ctx);
        assert!(!report.healthy());
        assert!(matches!(status(&report, "DRIFT_GUARD"), CheckStatus::Invalid(_)));
        assert!(matches!(status(&report, "RELEASE_PACK"), CheckStatus::Invalid(_)));
        assert_eq!(status(&report, "RUNTIME_GUARD"), &CheckStatus::Ok);
    }
}
