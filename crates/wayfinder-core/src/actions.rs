//! Action dispatch
//!
//! Actions run inside the tab (the content script). The background only
//! forwards the request and relays whatever the tab answers.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use wayfinder_session::TabId;

use crate::error::ActionError;

const LISTENER_CAPACITY: usize = 16;

/// Message delivered to the tab's execution context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub action: String,
    pub target: Value,
    pub parameters: Value,
}

impl ActionRequest {
    pub fn new(action: impl Into<String>, target: Value, parameters: Value) -> Self {
        Self {
            kind: "EXECUTE_ACTION".to_string(),
            action: action.into(),
            target,
            parameters,
        }
    }
}

/// Transport to a tab's execution context
#[async_trait]
pub trait TabExecutor: Send + Sync {
    async fn send_action(&self, tab_id: TabId, request: ActionRequest) -> Result<Value, ActionError>;
}

pub struct ActionDispatcher {
    executor: Arc<dyn TabExecutor>,
}

impl ActionDispatcher {
    pub fn new(executor: Arc<dyn TabExecutor>) -> Self {
        Self { executor }
    }

    /// Run an action in a tab and return the tab's reply untouched
    pub async fn execute(
        &self,
        tab_id: TabId,
        action: &str,
        target: Value,
        parameters: Value,
    ) -> Result<Value, ActionError> {
        tracing::info!(tab_id = %tab_id, action = %action, "Executing action");

        let request = ActionRequest::new(action, target, parameters);
        match self.executor.send_action(tab_id, request).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                tracing::warn!(tab_id = %tab_id, action = %action, error = %e, "Action failed");
                Err(e)
            }
        }
    }
}

impl Clone for ActionDispatcher {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
        }
    }
}

/// An action waiting for the tab's answer
#[derive(Debug)]
pub struct ActionEnvelope {
    pub request: ActionRequest,
    reply: oneshot::Sender<Value>,
}

impl ActionEnvelope {
    /// Send the tab's result back. Returns false if the caller stopped waiting.
    pub fn respond(self, result: Value) -> bool {
        self.reply.send(result).is_ok()
    }
}

/// In-process executor: each tab registers a listener channel.
///
/// Dropping a listener makes its tab unreachable; the stale sender is pruned
/// on the next delivery attempt.
pub struct TabChannels {
    listeners: Arc<RwLock<HashMap<TabId, mpsc::Sender<ActionEnvelope>>>>,
    reply_timeout: Duration,
}

impl TabChannels {
    pub fn new(reply_timeout: Duration) -> Self {
        Self {
            listeners: Arc::new(RwLock::new(HashMap::new())),
            reply_timeout,
        }
    }

    /// Attach a listener for a tab, replacing any previous one
    pub fn register(&self, tab_id: TabId) -> mpsc::Receiver<ActionEnvelope> {
        let (tx, rx) = mpsc::channel(LISTENER_CAPACITY);
        self.listeners.write().insert(tab_id, tx);
        tracing::debug!(tab_id = %tab_id, "Registered action listener");
        rx
    }

    pub fn unregister(&self, tab_id: TabId) -> bool {
        self.listeners.write().remove(&tab_id).is_some()
    }

    pub fn is_registered(&self, tab_id: TabId) -> bool {
        self.listeners
            .read()
            .get(&tab_id)
            .is_some_and(|tx| !tx.is_closed())
    }

    fn prune(&self, tab_id: TabId, stale: &mpsc::Sender<ActionEnvelope>) {
        let mut listeners = self.listeners.write();
        if listeners.get(&tab_id).is_some_and(|tx| tx.same_channel(stale)) {
            listeners.remove(&tab_id);
        }
    }
}

#[async_trait]
impl TabExecutor for TabChannels {
    async fn send_action(&self, tab_id: TabId, request: ActionRequest) -> Result<Value, ActionError> {
        let sender = self
            .listeners
            .read()
            .get(&tab_id)
            .cloned()
            .ok_or(ActionError::NoListener(tab_id))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = ActionEnvelope {
            request,
            reply: reply_tx,
        };

        if sender.send(envelope).await.is_err() {
            self.prune(tab_id, &sender);
            return Err(ActionError::NoListener(tab_id));
        }

        match tokio::time::timeout(self.reply_timeout, reply_rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(ActionError::Dropped(tab_id)),
            Err(_) => Err(ActionError::TimedOut(tab_id, self.reply_timeout)),
        }
    }
}

impl Clone for TabChannels {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
            reply_timeout: self.reply_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dispatcher(channels: &TabChannels) -> ActionDispatcher {
        ActionDispatcher::new(Arc::new(channels.clone()))
    }

    #[tokio::test]
    async fn test_reply_relayed_verbatim() {
        let channels = TabChannels::new(Duration::from_secs(5));
        let mut listener = channels.register(TabId(4));

        tokio::spawn(async move {
            while let Some(envelope) = listener.recv().await {
                assert_eq!(envelope.request.kind, "EXECUTE_ACTION");
                let reply = json!({
                    "success": true,
                    "clicked": envelope.request.target,
                    "extra": [1, 2, 3]
                });
                envelope.respond(reply);
            }
        });

        let reply = dispatcher(&channels)
            .execute(TabId(4), "click", json!("#checkout"), json!({}))
            .await
            .unwrap();

        assert_eq!(
            reply,
            json!({ "success": true, "clicked": "#checkout", "extra": [1, 2, 3] })
        );
    }

    #[tokio::test]
    async fn test_unregistered_tab_unreachable() {
        let channels = TabChannels::new(Duration::from_secs(5));
        let result = dispatcher(&channels)
            .execute(TabId(9), "scroll", Value::Null, Value::Null)
            .await;
        assert!(matches!(result, Err(ActionError::NoListener(TabId(9)))));
    }

    #[tokio::test]
    async fn test_dropped_listener_is_pruned() {
        let channels = TabChannels::new(Duration::from_secs(5));
        let listener = channels.register(TabId(2));
        drop(listener);

        assert!(!channels.is_registered(TabId(2)));
        let result = dispatcher(&channels)
            .execute(TabId(2), "click", Value::Null, Value::Null)
            .await;
        assert!(matches!(result, Err(ActionError::NoListener(_))));
        assert!(!channels.unregister(TabId(2)));
    }

    #[tokio::test]
    async fn test_listener_drops_request() {
        let channels = TabChannels::new(Duration::from_secs(5));
        let mut listener = channels.register(TabId(3));

        tokio::spawn(async move {
            // Navigated away mid-action: the envelope is dropped unanswered
            let _ = listener.recv().await;
        });

        let result = dispatcher(&channels)
            .execute(TabId(3), "fill", Value::Null, Value::Null)
            .await;
        assert!(matches!(result, Err(ActionError::Dropped(TabId(3)))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_listener_times_out() {
        let channels = TabChannels::new(Duration::from_millis(500));
        let mut listener = channels.register(TabId(5));

        let held = tokio::spawn(async move {
            let envelope = listener.recv().await;
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(envelope);
        });

        let result = dispatcher(&channels)
            .execute(TabId(5), "click", Value::Null, Value::Null)
            .await;
        assert!(matches!(result, Err(ActionError::TimedOut(TabId(5), _))));
        held.abort();
    }
}
