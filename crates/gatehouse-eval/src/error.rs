use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("unknown evaluator `{0}`")]
    UnknownEvaluator(String),

    #[error("invalid params for {evaluator}: {source}")]
    InvalidParams {
        evaluator: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EvalError {
    pub fn pattern(pattern: &str, err: impl std::fmt::Display) -> Self {
        EvalError::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        }
    }
}
