//! Host protocol
//!
//! One JSON object per line in each direction, discriminated by `kind`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wayfinder_core::{ActionRequest, InstallReason, LoadStatus, PortMessage, RuntimeMessage, TabId};

/// Events and requests from the browser side
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inbound {
    Message {
        id: Value,
        #[serde(rename = "tabId", default)]
        tab_id: Option<TabId>,
        message: RuntimeMessage,
    },
    Connect {
        #[serde(rename = "portId")]
        port_id: String,
        #[serde(default)]
        name: Option<String>,
    },
    PortMessage {
        #[serde(rename = "portId")]
        port_id: String,
        message: RuntimeMessage,
    },
    Disconnect {
        #[serde(rename = "portId")]
        port_id: String,
    },
    ActionResult {
        #[serde(rename = "actionId")]
        action_id: String,
        #[serde(default)]
        result: Value,
    },
    TabRemoved {
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },
    TabUpdated {
        #[serde(rename = "tabId")]
        tab_id: TabId,
        #[serde(default)]
        status: Option<LoadStatus>,
        #[serde(default)]
        url: Option<String>,
    },
    Installed {
        reason: InstallReason,
    },
}

/// Everything written back to the browser side
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outbound {
    Response {
        id: Value,
        response: Value,
    },
    PortMessage {
        #[serde(rename = "portId")]
        port_id: String,
        message: PortMessage,
    },
    TabAction {
        #[serde(rename = "actionId")]
        action_id: String,
        #[serde(rename = "tabId")]
        tab_id: TabId,
        request: ActionRequest,
    },
    OpenTab {
        url: String,
    },
}

pub fn parse_line(line: &str) -> serde_json::Result<Inbound> {
    serde_json::from_str(line)
}

/// Answer for a `message` line that failed to parse, so its sender is not
/// left waiting. `None` when the line carries no request id to answer.
pub fn malformed_response(line: &str, error: &serde_json::Error) -> Option<Outbound> {
    let value: Value = serde_json::from_str(line).ok()?;
    if value.get("kind").and_then(Value::as_str) != Some("message") {
        return None;
    }
    let id = value.get("id")?.clone();

    Some(Outbound::Response {
        id,
        response: serde_json::json!({
            "success": false,
            "error": format!("Malformed message: {}", error),
        }),
    })
}

pub fn encode(message: &Outbound) -> serde_json::Result<String> {
    serde_json::to_string(message)
}
