use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Input that is neither a single record nor a table of records.
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Invalid threshold rule for '{field}': {reason}")]
    InvalidThreshold { field: String, reason: String },

    #[error("Invalid anomaly pattern '{id}': {reason}")]
    InvalidPattern { id: String, reason: String },

    #[error("Invalid detection config: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
