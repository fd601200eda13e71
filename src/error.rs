use thiserror::Error;

/// Main error type for impact-trace operations
#[derive(Error, Debug)]
pub enum ImpactError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid method signature '{signature}': {reason}")]
    InvalidSignature { signature: String, reason: String },

    #[error("Program model error: {0}")]
    Model(String),
}

impl ImpactError {
    pub fn invalid_signature(signature: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSignature {
            signature: signature.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImpactError>;
