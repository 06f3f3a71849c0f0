use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use gatehouse_store::ReportStore;
use serde::{Deserialize, Serialize};

use crate::archive::{write_tar_gz, write_zip};
use crate::config::{ReleaseConfig, ReleaseTarget};
use crate::error::ReleaseError;
use crate::manifest::{sha256_file, BuildInfo, ReleaseManifest, SbomLite};
use crate::select::select_files;

pub const MANIFEST_FILE: &str = "MANIFEST.json";
pub const SBOM_FILE: &str = "SBOM_LITE.json";
pub const CHECKSUMS_FILE: &str = "CHECKSUMS.sha256";
pub const NOTES_FILE: &str = "RELEASE_NOTES.md";
pub const README_FILE: &str = "README_RELEASE.md";

const MIB: f64 = 1024.0 * 1024.0;

/// Where the build came from. Everything here lands in the checksummed metadata, so it must be stable
/// across rebuilds of the same tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceInfo {
    pub builder: String,
    pub git_commit: Option<String>,
    pub git_branch: Option<String>,
    pub source_date_epoch: i64,
}

impl Default for SourceInfo {
    fn default() -> Self {
        Self {
            builder: "gatehouse".into(),
            git_commit: None,
            git_branch: None,
            source_date_epoch: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumLine {
    pub sha256: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReleaseBundle {
    pub target: ReleaseTarget,
    pub out_dir: PathBuf,
    pub zip: String,
    pub tar_gz: String,
    pub file_count: usize,
    pub total_bytes: u64,
    pub checksums: Vec<ChecksumLine>,
}

pub struct Packager<'a> {
    root: &'a Path,
    store: &'a dyn ReportStore,
    config: &'a ReleaseConfig,
}

impl<'a> Packager<'a> {
    pub fn new(root: &'a Path, store: &'a dyn ReportStore, config: &'a ReleaseConfig) -> Self {
        Self { root, store, config }
    }

    /// Every precondition (required reports, selection, size budget) is checked before the output
    /// directory is created, so a failed pack leaves nothing behind.
    pub fn pack(&self, target: &ReleaseTarget, source: &SourceInfo) -> Result<ReleaseBundle> {
        self.check_required_reports()?;

        let mut skip = vec![".git".to_string()];
        if let Some(first) = Path::new(&self.config.out_dir).components().next() {
            skip.push(first.as_os_str().to_string_lossy().to_string());
        }
        let files = select_files(self.root, &self.config.include, &self.config.exclude, &skip)
            .context("select release files")?;
        let total_bytes: u64 = files.iter().map(|f| f.size).sum();
        let total_mb = total_bytes as f64 / MIB;
        if let Some(max_mb) = self.config.checks.max_total_mb {
            if total_mb > max_mb {
                return Err(ReleaseError::SizeBudgetExceeded { actual_mb: total_mb, max_mb }.into());
            }
        }
        tracing::info!(files = files.len(), total_bytes, "release selection");

        let out_dir = target.out_dir(self.root, self.config);
        std::fs::create_dir_all(&out_dir).with_context(|| format!("create {}", out_dir.display()))?;
        let base = target.base_name(self.config);

        let build = BuildInfo {
            channel: target.channel.to_string(),
            version: target.version.clone(),
            builder: source.builder.clone(),
            git_commit: source.git_commit.clone(),
            git_branch: source.git_branch.clone(),
            source_date_epoch: source.source_date_epoch,
        };
        let manifest = ReleaseManifest::build(&base, &files, build).context("hash release files")?;
        let sbom = SbomLite::from_manifest(&manifest);
        write_json(&out_dir.join(MANIFEST_FILE), &manifest)?;
        write_json(&out_dir.join(SBOM_FILE), &sbom)?;

        let zip_name = format!("{base}.zip");
        let tgz_name = format!("{base}.tar.gz");
        write_zip(&out_dir.join(&zip_name), &files)?;
        write_tar_gz(&out_dir.join(&tgz_name), &files)?;

        let mut checksums = vec![];
        for name in [zip_name.as_str(), tgz_name.as_str(), MANIFEST_FILE, SBOM_FILE] {
            let path = out_dir.join(name);
            let sha256 = sha256_file(&path).with_context(|| format!("hash {}", path.display()))?;
            checksums.push(ChecksumLine {
                sha256,
                name: name.to_string(),
            });
        }
        let body: String = checksums.iter().map(|c| format!("{}  {}\n", c.sha256, c.name)).collect();
        let sums = out_dir.join(CHECKSUMS_FILE);
        std::fs::write(&sums, body).with_context(|| format!("write {}", sums.display()))?;

        let bundle = ReleaseBundle {
            target: target.clone(),
            out_dir: out_dir.clone(),
            zip: zip_name,
            tar_gz: tgz_name,
            file_count: files.len(),
            total_bytes,
            checksums,
        };
        self.write_notes(&bundle, &manifest)?;
        tracing::info!(out_dir = %out_dir.display(), "release pack ready");
        Ok(bundle)
    }

    fn check_required_reports(&self) -> Result<()> {
        let checks = &self.config.checks;
        let max_age = checks.max_report_age_hours.map(Duration::hours);
        for id in &checks.require_reports {
            let Some(report) = self.store.load(id)? else {
                return Err(ReleaseError::MissingReport(id.clone()).into());
            };
            let hard = report.issues_hard.len();
            if hard > 0 {
                if checks.require_passing {
                    return Err(ReleaseError::FailingReport { id: id.clone(), hard }.into());
                }
                tracing::warn!(report = %id, hard, "required report has hard issues");
            }
            if let Some(max_age) = max_age {
                if self.store.is_stale(id, max_age)? {
                    tracing::warn!(report = %id, hours = max_age.num_hours(), "required report is stale");
                }
            }
        }
        Ok(())
    }

    /// Human-facing notes. The only pack outputs allowed to carry wall-clock time.
    fn write_notes(&self, bundle: &ReleaseBundle, manifest: &ReleaseManifest) -> Result<()> {
        let t = &bundle.target;
        let reports = if self.config.checks.require_reports.is_empty() {
            "none required".to_string()
        } else {
            self.config.checks.require_reports.join(" / ")
        };
        let notes = format!(
            "# Release Notes - {} {}\n\n- Build Time: {}\n- Commit: {}\n- Files: {} ({} bytes)\n- Reports: {}\n",
            t.channel.as_str().to_uppercase(),
            t.version,
            Utc::now().to_rfc3339(),
            manifest.build.git_commit.as_deref().unwrap_or("unknown"),
            bundle.file_count,
            bundle.total_bytes,
            reports
        );
        let readme = format!(
            "# Verify & Unpack\n\n## Verify checksums\n\n    sha256sum -c {sums}\n\n## Verify signature\n\n    gatehouse release verify --channel {ch} --version {v}\n\n## Unpack\n\n    unzip {zip} -d ./unpacked_zip\n    mkdir -p ./unpacked_tgz && tar -xzf {tgz} -C ./unpacked_tgz\n",
            sums = CHECKSUMS_FILE,
            ch = t.channel,
            v = t.version,
            zip = bundle.zip,
            tgz = bundle.tar_gz
        );
        std::fs::write(bundle.out_dir.join(NOTES_FILE), notes).context("write release notes")?;
        std::fs::write(bundle.out_dir.join(README_FILE), readme).context("write release readme")?;
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    std::fs::write(path, bytes).with_context(|| format!("write {}", path.display()))
}

/// Parses `<sha256>  <name>` lines.
pub fn read_checksums(path: &Path) -> Result<Vec<ChecksumLine>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(text
        .lines()
        .filter_map(|line| line.split_once("  "))
        .map(|(sha256, name)| ChecksumLine {
            sha256: sha256.trim().to_string(),
            name: name.trim().to_string(),
        })
        .collect())
}
