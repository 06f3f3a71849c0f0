use std::path::PathBuf;

use anyhow::Result;

use gatehouse_core::{GateId, Report};
use gatehouse_gates::{write_error_report, GateContext};
use gatehouse_release::{
    sign_release, verify_release, Packager, Provenance, ReleaseBundle, ReleaseConfig, ReleaseError, ReleaseTarget,
    SourceInfo, VerifyOutcome, CONFIG_FILE,
};
use gatehouse_store::{bullet_list, render_report};

use crate::util::{git_branch, git_commit};

/// Explicit arguments win; otherwise `REL_CHANNEL` / `REL_VERSION` from the captured environment.
pub fn release_target(ctx: &GateContext, channel: Option<&str>, version: Option<&str>) -> Result<ReleaseTarget, ReleaseError> {
    let channel = channel
        .or_else(|| ctx.env.get("REL_CHANNEL"))
        .ok_or_else(|| ReleaseError::InvalidChannel(String::new()))?;
    let version = version
        .or_else(|| ctx.env.get("REL_VERSION"))
        .ok_or_else(|| ReleaseError::InvalidVersion(String::new()))?;
    ReleaseTarget::new(channel, version)
}

pub fn source_info(ctx: &GateContext) -> SourceInfo {
    SourceInfo {
        git_commit: git_commit(&ctx.root),
        git_branch: git_branch(&ctx.root),
        source_date_epoch: ctx.env.source_date_epoch(),
        ..SourceInfo::default()
    }
}

pub fn release_config(ctx: &GateContext) -> Result<ReleaseConfig, ReleaseError> {
    ReleaseConfig::load_from(&ctx.config_path(CONFIG_FILE))
}

pub fn release_dir(ctx: &GateContext, target: &ReleaseTarget) -> Result<PathBuf, ReleaseError> {
    Ok(target.out_dir(&ctx.root, &release_config(ctx)?))
}

/// Packs the release and records the outcome as the RELEASE_PACK report, success or not.
pub fn pack_release(ctx: &GateContext, target: &ReleaseTarget) -> Result<ReleaseBundle> {
    let packed = release_config(ctx)
        .map_err(anyhow::Error::from)
        .and_then(|cfg| Packager::new(&ctx.root, ctx.store.as_ref(), &cfg).pack(target, &source_info(ctx)));
    match packed {
        Ok(bundle) => {
            let report = Report::with_payload(GateId::Release.report_id(), &bundle)?;
            let body = bullet_list(bundle.checksums.iter().map(|c| format!("`{}` {}", c.sha256, c.name)));
            let md = render_report(GateId::Release.title(), &report, &body);
            ctx.store.write(&report, &md)?;
            Ok(bundle)
        }
        Err(err) => {
            write_error_report(ctx, GateId::Release, &err)?;
            Err(err)
        }
    }
}

pub fn sign(ctx: &GateContext, target: &ReleaseTarget) -> Result<Provenance> {
    let dir = release_dir(ctx, target)?;
    sign_release(&dir, target, &ctx.env)
}

pub fn verify(ctx: &GateContext, target: &ReleaseTarget) -> Result<VerifyOutcome> {
    let dir = release_dir(ctx, target)?;
    verify_release(&dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::EnvOverrides;
    use tempfile::tempdir;

    #[test]
    fn target_falls_back_to_environment() {
        let dir = tempdir().unwrap();
        let ctx = GateContext::for_root(dir.path())
            .with_env(EnvOverrides::from_pairs([("REL_CHANNEL", "ga"), ("REL_VERSION", "2.0.0")]));
        let t = release_target(&ctx, None, None).unwrap();
        assert_eq!(t.version, "2.0.0");
        let t = release_target(&ctx, Some("rc"), Some("2.1.0-rc.1")).unwrap();
        assert_eq!(t.channel.as_str(), "rc");
    }

    #[test]
    fn missing_target_is_an_error() {
        let dir = tempdir().unwrap();
        let ctx = GateContext::for_root(dir.path());
        assert!(matches!(release_target(&ctx, None, Some("1.0.0")), Err(ReleaseError::InvalidChannel(_))));
        assert!(matches!(release_target(&ctx, Some("rc"), None), Err(ReleaseError::InvalidVersion(_))));
    }

    #[test]
    fn failed_pack_leaves_error_report() {
        let dir = tempdir().unwrap();
        let ctx = GateContext::for_root(dir.path());
        let target = ReleaseTarget::new("rc", "0.1.0").unwrap();
        assert!(pack_release(&ctx, &target).is_err());
        let report = ctx.store.load("RELEASE_PACK").unwrap().unwrap();
        assert_eq!(report.issues_hard[0].key, "gate_error");
        assert!(!dir.path().join("dist").exists());
    }
}
