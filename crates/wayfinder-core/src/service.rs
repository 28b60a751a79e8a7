//! Background service
//!
//! Owns the session store and wires the router, stream coordinators and
//! lifecycle hooks to the same state. One instance per extension process.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use wayfinder_backend::{BackendClient, SimulatedBackend};
use wayfinder_session::{LoadStatus, SessionStore, TabEvent, TabId};
use wayfinder_storage::Database;

use crate::actions::{ActionDispatcher, TabExecutor};
use crate::config::Config;
use crate::message::{PortMessage, Response, RuntimeMessage};
use crate::router::{Dispatch, MessageRouter};
use crate::settings::{SettingsStore, SqliteSettingsStore};
use crate::stream::StreamCoordinator;
use crate::Result;

/// Why the host fired the installed event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallReason {
    Install,
    Update,
    ChromeUpdate,
    SharedModuleUpdate,
    #[serde(other)]
    Other,
}

/// Side effect the host should carry out after an installed event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstallAction {
    OpenTab { url: String },
}

pub struct BackgroundService {
    config: Config,
    sessions: SessionStore,
    backend: Arc<dyn BackendClient>,
    settings: Arc<dyn SettingsStore>,
    router: MessageRouter,
}

impl BackgroundService {
    /// Open the settings database and use the simulated backend
    pub fn open(config: Config, executor: Arc<dyn TabExecutor>) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&config.database_path)?;
        let backend = SimulatedBackend::new(config.response_delay(), config.chunk_delay());

        tracing::info!(database = %config.database_path.display(), "Opened settings database");

        Ok(Self::with_parts(
            config,
            Arc::new(backend),
            executor,
            Arc::new(SqliteSettingsStore::new(db)),
        ))
    }

    pub fn with_parts(
        config: Config,
        backend: Arc<dyn BackendClient>,
        executor: Arc<dyn TabExecutor>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        let sessions = SessionStore::new();
        let router = MessageRouter::new(
            sessions.clone(),
            Arc::clone(&backend),
            ActionDispatcher::new(executor),
            Arc::clone(&settings),
        )
        .with_backend_timeout(config.backend_timeout());

        Self {
            config,
            sessions,
            backend,
            settings,
            router,
        }
    }

    /// Seed default settings on first start
    pub async fn initialize(&self) -> Result<()> {
        let seeded = self.settings.initialize().await?;
        tracing::info!(seeded, "Background service ready");
        Ok(())
    }

    pub async fn handle_message(&self, tab: Option<TabId>, message: RuntimeMessage) -> Response {
        self.router.handle(tab, message).await
    }

    /// Apply a message's session changes now; see [`MessageRouter::dispatch`]
    pub fn dispatch_message(&self, tab: Option<TabId>, message: RuntimeMessage) -> Dispatch {
        self.router.dispatch(tab, message)
    }

    /// Open a coordinator for a new persistent connection
    pub fn connect(
        &self,
        name: Option<String>,
        outbound: mpsc::UnboundedSender<PortMessage>,
    ) -> StreamCoordinator {
        tracing::debug!(port = ?name, "Connection opened");
        StreamCoordinator::new(name, Arc::clone(&self.backend), outbound)
    }

    pub fn on_tab_removed(&self, tab: TabId) -> bool {
        self.sessions.apply(tab, &TabEvent::Removed)
    }

    pub fn on_tab_updated(&self, tab: TabId, status: Option<LoadStatus>, url: Option<String>) -> bool {
        let dropped = self.sessions.apply(tab, &TabEvent::Updated { status, url });
        if dropped {
            tracing::info!(tab_id = %tab, "Navigation complete, session dropped");
        }
        dropped
    }

    pub fn on_installed(&self, reason: InstallReason) -> Option<InstallAction> {
        tracing::info!(reason = ?reason, "Extension installed");

        match reason {
            InstallReason::Install => Some(InstallAction::OpenTab {
                url: self.config.welcome_page.clone(),
            }),
            _ => None,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
