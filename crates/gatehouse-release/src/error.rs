use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("release config {} not found", .0.display())]
    MissingConfig(PathBuf),

    #[error("invalid release config {}: {message}", path.display())]
    InvalidConfig { path: PathBuf, message: String },

    #[error("required report `{0}` is missing")]
    MissingReport(String),

    #[error("required report `{id}` has {hard} hard issue(s)")]
    FailingReport { id: String, hard: usize },

    #[error("bundle size {actual_mb:.2} MiB exceeds budget {max_mb:.2} MiB")]
    SizeBudgetExceeded { actual_mb: f64, max_mb: f64 },

    #[error("invalid channel `{0}` (expected rc or ga)")]
    InvalidChannel(String),

    #[error("invalid version `{0}`")]
    InvalidVersion(String),

    #[error("signing key not provided (set RELEASE_SIGNING_KEY or RELEASE_SIGNING_KEY_FILE)")]
    MissingSigningKey,

    #[error("invalid signing key: {0}")]
    InvalidSigningKey(String),

    #[error("release material `{0}` is missing")]
    MissingMaterial(String),
}
