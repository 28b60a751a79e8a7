//! Core error types

use std::time::Duration;
use thiserror::Error;
use wayfinder_session::TabId;

/// Failures of a single routed request.
///
/// Never escapes the router: each one becomes a `{success: false, error}`
/// response or a `STREAM_ERROR` message.
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Unknown message type")]
    UnknownMessageType(String),

    #[error("No website analysis found for this tab")]
    SessionNotFound(TabId),

    #[error("{0}")]
    BackendUnavailable(String),

    #[error("Action dispatch failed: {0}")]
    ActionDispatchFailed(String),

    #[error("Settings store failed: {0}")]
    SettingsStoreFailed(String),

    #[error("Invalid {kind} payload: {reason}")]
    InvalidPayload { kind: String, reason: String },

    #[error("{0} requires a sender tab")]
    MissingTab(&'static str),
}

impl From<wayfinder_backend::BackendError> for RouterError {
    fn from(e: wayfinder_backend::BackendError) -> Self {
        RouterError::BackendUnavailable(e.to_string())
    }
}

impl From<ActionError> for RouterError {
    fn from(e: ActionError) -> Self {
        RouterError::ActionDispatchFailed(e.to_string())
    }
}

impl From<SettingsError> for RouterError {
    fn from(e: SettingsError) -> Self {
        RouterError::SettingsStoreFailed(e.to_string())
    }
}

/// The tab's execution context could not be reached
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("No content script listening in tab {0}")]
    NoListener(TabId),

    #[error("Tab {0} went away before replying")]
    Dropped(TabId),

    #[error("Tab {0} did not reply within {1:?}")]
    TimedOut(TabId, Duration),
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Storage error: {0}")]
    Storage(#[from] wayfinder_storage::StorageError),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] wayfinder_storage::StorageError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}
