use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gatehouse_core::EnvOverrides;
use gatehouse_gates::GateContext;
use gatehouse_store::{BaselineStore, FsReportStore};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub project: ProjectConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProjectConfig {
    pub id: String,
}

/// Repo-relative unless absolute; `~` is expanded.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub reports_dir: String,
    pub baseline_dir: String,
    pub governance_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            reports_dir: "reports".to_string(),
            baseline_dir: "governance/baseline".to_string(),
            governance_dir: "governance".to_string(),
        }
    }
}

impl Config {
    pub fn default_for_repo(project_id: &str) -> Self {
        Self {
            project: ProjectConfig { id: project_id.to_string() },
            paths: PathsConfig::default(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    /// The file when present, otherwise defaults named after the repo directory. Never writes.
    pub fn load_or_default(repo_root: &Path) -> Result<Self> {
        let path = Self::config_path(repo_root);
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default_for_repo(&project_id_for(repo_root)))
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize gatehouse.toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    pub fn config_path(repo_root: &Path) -> PathBuf {
        repo_root.join("governance").join("gatehouse.toml")
    }

    pub fn reports_dir(&self, repo_root: &Path) -> PathBuf {
        resolve(repo_root, &self.paths.reports_dir)
    }

    pub fn baseline_dir(&self, repo_root: &Path) -> PathBuf {
        resolve(repo_root, &self.paths.baseline_dir)
    }

    pub fn governance_dir(&self, repo_root: &Path) -> PathBuf {
        resolve(repo_root, &self.paths.governance_dir)
    }

    /// Fresh per-run context (new run id) over the configured directories.
    pub fn context(&self, repo_root: &Path, env: EnvOverrides) -> GateContext {
        GateContext::new(
            repo_root.to_path_buf(),
            self.governance_dir(repo_root),
            Arc::new(FsReportStore::new(self.reports_dir(repo_root))),
            BaselineStore::new(self.baseline_dir(repo_root)),
            env,
        )
    }
}

pub fn project_id_for(repo_root: &Path) -> String {
    repo_root
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("repo")
        .to_string()
}

fn resolve(repo_root: &Path, value: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(value).to_string());
    if expanded.is_absolute() {
        expanded
    } else {
        repo_root.join(expanded)
    }
}
