use thiserror::Error;

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown CFR algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Tree construction failed: {0}")]
    TreeBuild(String),

    #[error("Malformed tree file: {0}")]
    TreeFormat(String),

    #[error("Bucket file {path} declares {declared} entries, expected {expected}")]
    BucketCountMismatch {
        path: String,
        declared: u64,
        expected: u64,
    },

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SolverResult<T> = Result<T, SolverError>;
