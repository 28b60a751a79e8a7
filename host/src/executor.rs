//! Tab actions relayed through the host process

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use wayfinder_core::{ActionError, ActionRequest, TabExecutor, TabId};

use crate::protocol::Outbound;

struct PendingAction {
    tab_id: TabId,
    reply: oneshot::Sender<Value>,
}

/// Writes `tab_action` lines and waits for the matching `action_result`
pub struct StdioTabExecutor {
    outbound: mpsc::UnboundedSender<Outbound>,
    pending: Arc<Mutex<HashMap<String, PendingAction>>>,
    timeout: Duration,
}

impl StdioTabExecutor {
    pub fn new(outbound: mpsc::UnboundedSender<Outbound>, timeout: Duration) -> Self {
        Self {
            outbound,
            pending: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    /// Deliver a tab's answer. Returns false for unknown or expired actions.
    pub fn resolve(&self, action_id: &str, result: Value) -> bool {
        let Some(action) = self.pending.lock().remove(action_id) else {
            tracing::warn!(action_id = %action_id, "Result for unknown action");
            return false;
        };
        action.reply.send(result).is_ok()
    }

    /// The tab closed: its outstanding actions can never be answered
    pub fn fail_tab(&self, tab_id: TabId) -> usize {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|_, action| action.tab_id != tab_id);
        let failed = before - pending.len();

        if failed > 0 {
            tracing::debug!(tab_id = %tab_id, failed, "Dropped pending actions for closed tab");
        }
        failed
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

#[async_trait]
impl TabExecutor for StdioTabExecutor {
    async fn send_action(&self, tab_id: TabId, request: ActionRequest) -> Result<Value, ActionError> {
        let action_id = uuid::Uuid::new_v4().to_string();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().insert(
            action_id.clone(),
            PendingAction {
                tab_id,
                reply: reply_tx,
            },
        );

        let sent = self.outbound.send(Outbound::TabAction {
            action_id: action_id.clone(),
            tab_id,
            request,
        });
        if sent.is_err() {
            self.pending.lock().remove(&action_id);
            return Err(ActionError::NoListener(tab_id));
        }

        let outcome = tokio::time::timeout(self.timeout, reply_rx).await;
        self.pending.lock().remove(&action_id);

        match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(ActionError::Dropped(tab_id)),
            Err(_) => Err(ActionError::TimedOut(tab_id, self.timeout)),
        }
    }
}

impl Clone for StdioTabExecutor {
    fn clone(&self) -> Self {
        Self {
            outbound: self.outbound.clone(),
            pending: Arc::clone(&self.pending),
            timeout: self.timeout,
        }
    }
}
