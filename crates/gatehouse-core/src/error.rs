use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid config {}: {message}", path.display())]
    InvalidConfig { path: PathBuf, message: String },

    #[error("required report `{0}` is missing")]
    MissingReport(String),

    #[error("unknown gate `{0}`")]
    UnknownGate(String),

    #[error("invalid environment override {name}: {message}")]
    InvalidOverride { name: String, message: String },
}
