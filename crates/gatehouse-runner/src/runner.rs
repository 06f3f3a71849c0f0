use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gatehouse_core::{EnvOverrides, GateId};
use gatehouse_gates::GateContext;

use crate::doctor::{doctor, DoctorReport};
use crate::pipeline::{run_one, run_pipeline, GateRun, PipelineOutcome};
use crate::Config;

/// Entry point for one repository: its project config plus the environment captured at startup.
pub struct Runner {
    pub repo_root: PathBuf,
    pub cfg: Config,
    pub env: EnvOverrides,
}

impl Runner {
    pub fn open(repo_root: PathBuf) -> Result<Self> {
        let cfg = Config::load_or_default(&repo_root)?;
        Ok(Self {
            repo_root,
            cfg,
            env: EnvOverrides::capture(),
        })
    }

    pub fn with_env(mut self, env: EnvOverrides) -> Self {
        self.env = env;
        self
    }

    /// Writes the default project config (if absent) and creates the report and governance directories.
    pub fn init_repo(repo_root: &Path) -> Result<PathBuf> {
        let cfg_path = Config::config_path(repo_root);
        let cfg = if cfg_path.exists() {
            Config::load_from(&cfg_path)?
        } else {
            let cfg = Config::default_for_repo(&crate::project_id_for(repo_root));
            cfg.save_to(&cfg_path)?;
            cfg
        };
        for dir in [
            cfg.reports_dir(repo_root),
            cfg.governance_dir(repo_root),
            cfg.baseline_dir(repo_root),
        ] {
            std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        }
        Ok(cfg_path)
    }

    /// A fresh context per call, so every run gets its own run id.
    pub fn context(&self) -> GateContext {
        self.cfg.context(&self.repo_root, self.env.clone())
    }

    pub fn run_gate(&self, id: GateId) -> Result<GateRun> {
        run_one(&self.context(), id)
    }

    pub fn pipeline(&self) -> Result<PipelineOutcome> {
        run_pipeline(&self.context())
    }

    pub fn doctor(&self) -> DoctorReport {
        doctor(&self.context())
    }

    /// Copies the current report `id` (`.json` suffix optional) into the baseline store.
    pub fn promote(&self, id: &str) -> Result<PathBuf> {
        let ctx = self.context();
        let id = id.strip_suffix(".json").unwrap_or(id);
        ctx.baseline.promote(ctx.store.as_ref(), id)
    }
}
