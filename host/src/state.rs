//! Host state: the background service plus the connections it has open
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use wayfinder_core::{
    BackgroundService, Config, Dispatch, InstallAction, PortMessage, Result, StreamCoordinator,
};

use crate::executor::StdioTabExecutor;
use crate::protocol::{Inbound, Outbound};

pub struct HostState {
    service: Arc<BackgroundService>,
    executor: StdioTabExecutor,
    ports: Arc<Mutex<HashMap<String, StreamCoordinator>>>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl HostState {
    pub fn new(config: Config, outbound: mpsc::UnboundedSender<Outbound>) -> Result<Self> {
        let executor = StdioTabExecutor::new(outbound.clone(), config.action_timeout());
        let service = BackgroundService::open(config, Arc::new(executor.clone()))?;
        Ok(Self::with_service(service, executor, outbound))
    }

    pub fn with_service(
        service: BackgroundService,
        executor: StdioTabExecutor,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        Self {
            service: Arc::new(service),
            executor,
            ports: Arc::new(Mutex::new(HashMap::new())),
            outbound,
        }
    }

    pub async fn initialize(&self) -> Result<()> {
        self.service.initialize().await
    }

    /// Act on one inbound line.
    ///
    /// Session reads and writes for a one-shot message happen here, in line
    /// order. Only the awaited part of an answer moves to a spawned task,
    /// whose handle is returned, so a slow query never blocks tab events or
    /// cancellations.
    pub fn dispatch(&self, inbound: Inbound) -> Option<JoinHandle<()>> {
        match inbound {
            Inbound::Message {
                id,
                tab_id,
                message,
            } => match self.service.dispatch_message(tab_id, message) {
                Dispatch::Ready(response) => {
                    self.reply(Outbound::Response {
                        id,
                        response: response.to_json(),
                    });
                    None
                }
                Dispatch::Pending(answer) => {
                    let outbound = self.outbound.clone();
                    Some(tokio::spawn(async move {
                        let response = answer.await;
                        let _ = outbound.send(Outbound::Response {
                            id,
                            response: response.to_json(),
                        });
                    }))
                }
            },
            Inbound::Connect { port_id, name } => Some(self.connect(port_id, name)),
            Inbound::PortMessage { port_id, message } => {
                let port = self.ports.lock().get(&port_id).cloned();
                match port {
                    Some(port) => {
                        port.handle(message);
                    }
                    None => tracing::warn!(port_id = %port_id, "Message for unknown port"),
                }
                None
            }
            Inbound::Disconnect { port_id } => {
                if let Some(port) = self.ports.lock().remove(&port_id) {
                    port.close();
                }
                None
            }
            Inbound::ActionResult { action_id, result } => {
                self.executor.resolve(&action_id, result);
                None
            }
            Inbound::TabRemoved { tab_id } => {
                self.service.on_tab_removed(tab_id);
                self.executor.fail_tab(tab_id);
                None
            }
            Inbound::TabUpdated {
                tab_id,
                status,
                url,
            } => {
                self.service.on_tab_updated(tab_id, status, url);
                None
            }
            Inbound::Installed { reason } => {
                if let Some(InstallAction::OpenTab { url }) = self.service.on_installed(reason) {
                    let _ = self.outbound.send(Outbound::OpenTab { url });
                }
                None
            }
        }
    }

    /// Queue a line for the browser side
    pub fn reply(&self, line: Outbound) {
        if self.outbound.send(line).is_err() {
            tracing::warn!("Output channel closed, dropping line");
        }
    }

    /// Register a connection and forward its messages until it closes
    fn connect(&self, port_id: String, name: Option<String>) -> JoinHandle<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<PortMessage>();
        let coordinator = self.service.connect(name, tx);

        if let Some(previous) = self.ports.lock().insert(port_id.clone(), coordinator) {
            tracing::warn!(port_id = %port_id, "Port reconnected, closing previous connection");
            previous.close();
        }

        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let line = Outbound::PortMessage {
                    port_id: port_id.clone(),
                    message,
                };
                if outbound.send(line).is_err() {
                    break;
                }
            }
        })
    }

    /// Close every connection, cancelling their streams
    pub fn shutdown(&self) {
        let ports: Vec<StreamCoordinator> = self.ports.lock().drain().map(|(_, p)| p).collect();
        for port in &ports {
            port.close();
        }
        tracing::info!(ports = ports.len(), "Host shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use std::time::Duration;
    use wayfinder_core::{Database, SimulatedBackend, SqliteSettingsStore};

    use crate::protocol::parse_line;

    fn host() -> (HostState, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let executor = StdioTabExecutor::new(tx.clone(), Duration::from_secs(5));
        let settings = SqliteSettingsStore::new(Database::open_in_memory().unwrap());

        let service = BackgroundService::with_parts(
            Config::new(PathBuf::from("/unused")),
            Arc::new(SimulatedBackend::immediate().with_streamed_text("step one then two")),
            Arc::new(executor.clone()),
            Arc::new(settings),
        );
        (HostState::with_service(service, executor, tx), rx)
    }

    fn line(json: Value) -> Inbound {
        parse_line(&json.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_message_answered_with_id() {
        let (host, mut rx) = host();

        let task = host.dispatch(line(json!({
            "kind": "message",
            "id": "m1",
            "tabId": 1,
            "message": { "type": "ANALYZE_WEBSITE", "data": { "url": "https://example.com" } }
        })));
        assert!(task.is_none());

        let Some(Outbound::Response { id, response }) = rx.recv().await else {
            panic!("expected response");
        };
        assert_eq!(id, json!("m1"));
        assert_eq!(response["success"], true);
    }

    #[tokio::test]
    async fn test_tab_events_follow_message_order() {
        let (host, mut rx) = host();

        // Analyze then close: the close must win
        host.dispatch(line(json!({
            "kind": "message",
            "id": 1,
            "tabId": 4,
            "message": { "type": "ANALYZE_WEBSITE", "data": { "url": "https://a.example" } }
        })));
        host.dispatch(line(json!({ "kind": "tab_removed", "tabId": 4 })));
        assert!(host.service.sessions().is_empty());

        let Some(Outbound::Response { id, response }) = rx.recv().await else {
            panic!("expected response");
        };
        assert_eq!(id, json!(1));
        assert_eq!(response["success"], true);

        // Analyze then read back in the same breath
        host.dispatch(line(json!({
            "kind": "message",
            "id": 2,
            "tabId": 5,
            "message": { "type": "ANALYZE_WEBSITE", "data": { "url": "https://b.example" } }
        })));
        host.dispatch(line(json!({
            "kind": "message",
            "id": 3,
            "tabId": 5,
            "message": { "type": "GET_SESSION_DATA" }
        })));
        rx.recv().await;
        let Some(Outbound::Response { id, response }) = rx.recv().await else {
            panic!("expected response");
        };
        assert_eq!(id, json!(3));
        assert_eq!(response["url"], "https://b.example");
    }

    #[tokio::test]
    async fn test_closed_tab_fails_pending_action() {
        let (host, mut rx) = host();

        let task = host
            .dispatch(line(json!({
                "kind": "message",
                "id": 8,
                "tabId": 6,
                "message": { "type": "EXECUTE_ACTION", "data": { "action": "click", "target": "#x" } }
            })))
            .unwrap();
        let Some(Outbound::TabAction { tab_id, .. }) = rx.recv().await else {
            panic!("expected tab action");
        };
        assert_eq!(tab_id.0, 6);

        host.dispatch(line(json!({ "kind": "tab_removed", "tabId": 6 })));
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();

        let Some(Outbound::Response { id, response }) = rx.recv().await else {
            panic!("expected response");
        };
        assert_eq!(id, json!(8));
        assert_eq!(response["success"], false);
    }

    #[tokio::test]
    async fn test_action_round_trip() {
        let (host, mut rx) = host();

        let task = host
            .dispatch(line(json!({
                "kind": "message",
                "id": 2,
                "tabId": 9,
                "message": { "type": "EXECUTE_ACTION", "data": { "action": "click", "target": "#buy" } }
            })))
            .unwrap();

        let Some(Outbound::TabAction { action_id, tab_id, request }) = rx.recv().await else {
            panic!("expected tab action");
        };
        assert_eq!(tab_id.0, 9);
        assert_eq!(request.target, json!("#buy"));

        host.dispatch(line(json!({
            "kind": "action_result",
            "actionId": action_id,
            "result": { "success": true, "clicked": true }
        })));
        task.await.unwrap();

        let Some(Outbound::Response { response, .. }) = rx.recv().await else {
            panic!("expected response");
        };
        assert_eq!(response, json!({ "success": true, "clicked": true }));
    }

    #[tokio::test]
    async fn test_port_stream_is_forwarded() {
        let (host, mut rx) = host();

        host.dispatch(line(json!({ "kind": "connect", "portId": "p1", "name": "sidepanel" })));
        host.dispatch(line(json!({
            "kind": "port_message",
            "portId": "p1",
            "message": { "type": "STREAM_AI_RESPONSE", "data": { "query": "how?", "requestId": "r1" } }
        })));

        let mut kinds = Vec::new();
        while let Some(Outbound::PortMessage { port_id, message }) = rx.recv().await {
            assert_eq!(port_id, "p1");
            let value = serde_json::to_value(&message).unwrap();
            let kind = value["type"].as_str().unwrap_or_default().to_string();
            let done = kind == "STREAM_COMPLETE";
            kinds.push(kind);
            if done {
                break;
            }
        }

        assert_eq!(kinds.len(), 5);
        assert_eq!(kinds.last().map(String::as_str), Some("STREAM_COMPLETE"));
    }

    #[tokio::test]
    async fn test_lifecycle_and_install() {
        let (host, mut rx) = host();

        host.dispatch(line(json!({
            "kind": "message",
            "id": 1,
            "tabId": 4,
            "message": { "type": "ANALYZE_WEBSITE", "data": {} }
        })));
        rx.recv().await;

        host.dispatch(line(json!({ "kind": "tab_updated", "tabId": 4, "status": "complete", "url": "https://b.example" })));
        assert!(host.service.sessions().is_empty());

        host.dispatch(line(json!({ "kind": "installed", "reason": "install" })));
        let Some(Outbound::OpenTab { url }) = rx.recv().await else {
            panic!("expected open_tab");
        };
        assert_eq!(url, "docs/welcome.html");

        host.dispatch(line(json!({ "kind": "installed", "reason": "update" })));
        assert!(rx.try_recv().is_err());
    }
}
