//! Backend error types

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Backend timed out after {0:?}")]
    Timeout(Duration),
}
