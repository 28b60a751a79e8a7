//! Wayfinder Core
//!
//! Background coordination for the Wayfinder browser assistant: routes one-shot
//! messages from pages, drives streaming answers over persistent connections,
//! and keeps per-tab analysis sessions in step with tab lifecycle events.

mod actions;
mod config;
mod error;
mod message;
mod router;
mod service;
mod settings;
mod stream;

pub use actions::{ActionDispatcher, ActionEnvelope, ActionRequest, TabChannels, TabExecutor};
pub use config::Config;
pub use error::{ActionError, CoreError, RouterError, SettingsError};
pub use message::{
    ChunkData, FollowUpAction, HighlightTarget, MessageType, PortMessage, PortMessageType,
    RequestId, Response, RuntimeMessage, StreamMessage,
};
pub use router::{derive_actions, Dispatch, MessageRouter};
pub use service::{BackgroundService, InstallAction, InstallReason};
pub use settings::{GuidanceMode, Settings, SettingsStore, SqliteSettingsStore};
pub use stream::{StreamCoordinator, StreamProgress, StreamState};

// Re-export the pieces hosts need to drive the service
pub use wayfinder_backend::{BackendClient, SimulatedBackend};
pub use wayfinder_context::{Context, PageType};
pub use wayfinder_session::{LoadStatus, SessionRecord, SessionStore, TabId};
pub use wayfinder_storage::{Database, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
///
/// Logs go to stderr so stdout stays free for the host protocol.
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
