use std::path::{Path, PathBuf};
use std::sync::Arc;

use gatehouse_core::{EnvOverrides, RunId};
use gatehouse_eval::Evaluator;
use gatehouse_store::{BaselineStore, FsReportStore, ReportStore};

/// Everything a gate may consult during one run. Built once per run and shared read-only across gates.
#[derive(Clone)]
pub struct GateContext {
    pub run_id: RunId,
    pub root: PathBuf,
    pub governance_dir: PathBuf,
    pub store: Arc<dyn ReportStore>,
    pub baseline: BaselineStore,
    pub env: EnvOverrides,
}

impl GateContext {
    pub fn new(
        root: PathBuf,
        governance_dir: PathBuf,
        store: Arc<dyn ReportStore>,
        baseline: BaselineStore,
        env: EnvOverrides,
    ) -> Self {
        Self {
            run_id: RunId::new(),
            root,
            governance_dir,
            store,
            baseline,
            env,
        }
    }

    /// Default layout under `root`: `reports/`, `governance/`, `governance/baseline/`; empty environment.
    pub fn for_root(root: &Path) -> Self {
        Self::new(
            root.to_path_buf(),
            root.join("governance"),
            Arc::new(FsReportStore::new(root.join("reports"))),
            BaselineStore::new(root.join("governance").join("baseline")),
            EnvOverrides::default(),
        )
    }

    pub fn with_env(mut self, env: EnvOverrides) -> Self {
        self.env = env;
        self
    }

    pub fn evaluator(&self) -> Evaluator {
        Evaluator::new(self.root.clone())
    }

    pub fn config_path(&self, file: &str) -> PathBuf {
        self.governance_dir.join(file)
    }

    /// Root-relative unless already absolute.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }
}

impl std::fmt::Debug for GateContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateContext")
            .field("run_id", &self.run_id)
            .field("root", &self.root)
            .field("governance_dir", &self.governance_dir)
            .finish_non_exhaustive()
    }
}
