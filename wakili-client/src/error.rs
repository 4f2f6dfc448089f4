//! Process-level errors for the client and the `wakili` binary.

use crate::config::ConfigError;
use wakili_core::{AuthError, RemoteError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
