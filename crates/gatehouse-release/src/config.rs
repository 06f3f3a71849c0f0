use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::ReleaseError;

pub const CONFIG_FILE: &str = "release_pack.config.json";

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReleaseChecks {
    /// report ids (`REALITY_TEST` or `REALITY_TEST.json`) that must exist before packing
    pub require_reports: Vec<String>,
    pub max_total_mb: Option<f64>,
    /// warn when a required report is older than this
    pub max_report_age_hours: Option<i64>,
    /// refuse required reports with hard issues instead of warning about them
    pub require_passing: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReleaseConfig {
    pub out_dir: String,
    pub name_prefix: String,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub checks: ReleaseChecks,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            out_dir: "dist".into(),
            name_prefix: "release".into(),
            include: vec![],
            exclude: vec![],
            checks: ReleaseChecks::default(),
        }
    }
}

impl ReleaseConfig {
    /// Unlike gate configs there are no fallback defaults: a missing file is an error.
    pub fn load_from(path: &Path) -> Result<Self, ReleaseError> {
        if !path.is_file() {
            return Err(ReleaseError::MissingConfig(path.to_path_buf()));
        }
        let invalid = |message: String| ReleaseError::InvalidConfig {
            path: path.to_path_buf(),
            message,
        };
        let s = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let cfg: ReleaseConfig = serde_json::from_str(&s).map_err(|e| invalid(e.to_string()))?;
        if cfg.include.is_empty() {
            return Err(invalid("include must list at least one glob".into()));
        }
        Ok(cfg)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Rc,
    Ga,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Rc => "rc",
            Channel::Ga => "ga",
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rc" => Ok(Channel::Rc),
            "ga" => Ok(Channel::Ga),
            _ => Err(ReleaseError::InvalidChannel(s.to_string())),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel plus version; the pair names the output directory `<out_dir>/<channel>/<version>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseTarget {
    pub channel: Channel,
    pub version: String,
}

impl ReleaseTarget {
    pub fn new(channel: &str, version: &str) -> Result<Self, ReleaseError> {
        let channel = channel.parse()?;
        let v = version.trim();
        let mut parts = Path::new(v).components();
        let single_name = matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None));
        if !single_name || v.contains('/') || v.contains('\\') || v.contains("..") {
            return Err(ReleaseError::InvalidVersion(version.to_string()));
        }
        Ok(Self {
            channel,
            version: v.to_string(),
        })
    }

    pub fn out_dir(&self, root: &Path, cfg: &ReleaseConfig) -> std::path::PathBuf {
        root.join(&cfg.out_dir).join(self.channel.as_str()).join(&self.version)
    }

    pub fn base_name(&self, cfg: &ReleaseConfig) -> String {
        format!("{}_{}_{}", cfg.name_prefix, self.channel, self.version)
    }
}
