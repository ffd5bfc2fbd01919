use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("snapshot version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: String, expected: String },

    #[error("state store unavailable: {0}")]
    Storage(String),
}
