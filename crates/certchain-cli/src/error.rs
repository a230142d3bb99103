//! Error types for the CLI

use certchain_core::{BackendError, ResourceKind};

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("provisioning failed: {0}")]
    Provision(#[from] certchain_core::Error),

    #[error("cluster connection failed: {0}")]
    Connect(#[from] BackendError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Step at which a provisioning run stopped, if it got that far
    pub fn failed_step(&self) -> Option<ResourceKind> {
        match self {
            Error::Provision(e) => e.step(),
            _ => None,
        }
    }
}
