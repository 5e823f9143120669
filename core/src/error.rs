//! Error types for the core library

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Capability disabled: {0}")]
    CapabilityDisabled(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Upstream provider error: {0}")]
    Upstream(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream(err.to_string())
    }
}
