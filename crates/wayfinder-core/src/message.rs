//! Wire messages
//!
//! Everything crossing the extension messaging boundary: one-shot runtime
//! messages and their responses, and the messages exchanged over a persistent
//! streaming connection.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use wayfinder_backend::{QueryResponse, StreamChunk};
use wayfinder_context::Context;
use wayfinder_session::{AnalysisInput, SessionRecord};

use crate::error::RouterError;
use crate::settings::Settings;

/// `{type, data}` envelope used on both delivery mechanisms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMessage {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl RuntimeMessage {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    pub fn message_type(&self) -> Option<MessageType> {
        self.kind.parse().ok()
    }

    /// Decode `data` into the payload type for this message
    pub(crate) fn payload<T: DeserializeOwned>(&self) -> Result<T, RouterError> {
        let data = if self.data.is_null() {
            Value::Object(Default::default())
        } else {
            self.data.clone()
        };

        serde_json::from_value(data).map_err(|e| RouterError::InvalidPayload {
            kind: self.kind.clone(),
            reason: e.to_string(),
        })
    }
}

/// One-shot request types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    AnalyzeWebsite,
    ProcessAiQuery,
    ExecuteAction,
    GetSettings,
    UpdateSettings,
    GetSessionData,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::AnalyzeWebsite => "ANALYZE_WEBSITE",
            MessageType::ProcessAiQuery => "PROCESS_AI_QUERY",
            MessageType::ExecuteAction => "EXECUTE_ACTION",
            MessageType::GetSettings => "GET_SETTINGS",
            MessageType::UpdateSettings => "UPDATE_SETTINGS",
            MessageType::GetSessionData => "GET_SESSION_DATA",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ANALYZE_WEBSITE" => Ok(MessageType::AnalyzeWebsite),
            "PROCESS_AI_QUERY" => Ok(MessageType::ProcessAiQuery),
            "EXECUTE_ACTION" => Ok(MessageType::ExecuteAction),
            "GET_SETTINGS" => Ok(MessageType::GetSettings),
            "UPDATE_SETTINGS" => Ok(MessageType::UpdateSettings),
            "GET_SESSION_DATA" => Ok(MessageType::GetSessionData),
            _ => Err(format!("Unknown message type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryPayload {
    pub query: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionPayload {
    pub action: String,
    #[serde(default)]
    pub target: Value,
    #[serde(default)]
    pub parameters: Value,
}

/// Highlight targets the panel knows how to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightTarget {
    Navigation,
    Forms,
}

/// Follow-up the panel should offer after a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FollowUpAction {
    Highlight { target: HighlightTarget },
    SuggestAutomation,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub success: bool,
    pub analysis: AnalysisInput,
    pub context: Context,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub success: bool,
    pub response: QueryResponse,
    pub actions: Vec<FollowUpAction>,
    pub context: Context,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unrecognized {
    pub error: String,
}

/// Exactly one of these answers every one-shot message
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Response {
    Analysis(AnalysisOutcome),
    Query(QueryOutcome),
    /// Relayed verbatim from the tab's execution context
    Action(Value),
    Settings(Settings),
    SettingsUpdated(UpdateOutcome),
    /// Serializes as the record or `null`
    Session(Option<SessionRecord>),
    Failure(Failure),
    Unrecognized(Unrecognized),
}

impl Response {
    pub fn failure(error: &RouterError) -> Self {
        Response::Failure(Failure {
            success: false,
            error: error.to_string(),
        })
    }

    pub fn unrecognized() -> Self {
        Response::Unrecognized(Unrecognized {
            error: RouterError::UnknownMessageType(String::new()).to_string(),
        })
    }

    /// Error text carried by the response, if any
    pub fn error(&self) -> Option<&str> {
        match self {
            Response::Failure(f) => Some(&f.error),
            Response::Unrecognized(u) => Some(&u.error),
            Response::SettingsUpdated(u) => u.error.as_deref(),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Response::Analysis(a) => a.success,
            Response::Query(q) => q.success,
            Response::SettingsUpdated(u) => u.success,
            Response::Failure(_) | Response::Unrecognized(_) => false,
            Response::Action(_) | Response::Settings(_) | Response::Session(_) => true,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "success": false, "error": e.to_string() })
        })
    }
}

/// Correlates a streaming request with its cancellation.
///
/// Page scripts send either strings or numbers; both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(RequestId(s)),
            Value::Number(n) => Ok(RequestId(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "requestId must be a string or number, got {}",
                other
            ))),
        }
    }
}

/// Connection message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortMessageType {
    StreamAiResponse,
    CancelAiRequest,
}

impl PortMessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortMessageType::StreamAiResponse => "STREAM_AI_RESPONSE",
            PortMessageType::CancelAiRequest => "CANCEL_AI_REQUEST",
        }
    }
}

impl std::str::FromStr for PortMessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STREAM_AI_RESPONSE" => Ok(PortMessageType::StreamAiResponse),
            "CANCEL_AI_REQUEST" => Ok(PortMessageType::CancelAiRequest),
            _ => Err(format!("Unknown port message type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub context: Value,
    #[serde(default)]
    pub request_id: Option<RequestId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub request_id: RequestId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkData {
    pub request_id: RequestId,
    pub text: String,
    pub complete: bool,
    pub word_count: usize,
    pub total_words: Option<usize>,
}

impl ChunkData {
    pub fn new(request_id: &RequestId, chunk: &StreamChunk, complete: bool) -> Self {
        Self {
            request_id: request_id.clone(),
            text: chunk.text.clone(),
            complete,
            word_count: chunk.word_count,
            total_words: chunk.total_words,
        }
    }
}

/// Streaming updates sent back over a connection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamMessage {
    StreamChunk {
        data: ChunkData,
    },
    StreamComplete {
        data: ChunkData,
    },
    StreamError {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        error: String,
    },
}

/// Anything the background posts on a connection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PortMessage {
    Stream(StreamMessage),
    Rejected { error: String },
}

impl PortMessage {
    pub fn chunk(request_id: &RequestId, chunk: &StreamChunk) -> Self {
        PortMessage::Stream(StreamMessage::StreamChunk {
            data: ChunkData::new(request_id, chunk, false),
        })
    }

    pub fn complete(request_id: &RequestId, chunk: &StreamChunk) -> Self {
        PortMessage::Stream(StreamMessage::StreamComplete {
            data: ChunkData::new(request_id, chunk, true),
        })
    }

    pub fn error(request_id: &RequestId, error: impl Into<String>) -> Self {
        PortMessage::Stream(StreamMessage::StreamError {
            request_id: request_id.clone(),
            error: error.into(),
        })
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        PortMessage::Rejected {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_type_round_trip() {
        for kind in [
            MessageType::AnalyzeWebsite,
            MessageType::ProcessAiQuery,
            MessageType::ExecuteAction,
            MessageType::GetSettings,
            MessageType::UpdateSettings,
            MessageType::GetSessionData,
        ] {
            assert_eq!(kind.as_str().parse::<MessageType>().unwrap(), kind);
        }
        assert!("analyze_website".parse::<MessageType>().is_err());
    }

    #[test]
    fn test_runtime_message_defaults() {
        let message: RuntimeMessage = serde_json::from_value(json!({ "type": "GET_SETTINGS" })).unwrap();
        assert_eq!(message.message_type(), Some(MessageType::GetSettings));
        assert!(message.data.is_null());

        let missing: RuntimeMessage = serde_json::from_value(json!({})).unwrap();
        assert_eq!(missing.message_type(), None);
    }

    #[test]
    fn test_payload_errors_name_the_message() {
        let message = RuntimeMessage::new("PROCESS_AI_QUERY", json!({ "query": 5 }));
        let err = message.payload::<QueryPayload>().unwrap_err();
        assert!(err.to_string().contains("PROCESS_AI_QUERY"));
    }

    #[test]
    fn test_follow_up_action_wire_format() {
        let actions = vec![
            FollowUpAction::Highlight {
                target: HighlightTarget::Navigation,
            },
            FollowUpAction::SuggestAutomation,
        ];
        assert_eq!(
            serde_json::to_value(&actions).unwrap(),
            json!([
                { "type": "highlight", "target": "navigation" },
                { "type": "suggest_automation" }
            ])
        );
    }

    #[test]
    fn test_request_id_accepts_numbers() {
        let cancel: CancelRequest = serde_json::from_value(json!({ "requestId": 42 })).unwrap();
        assert_eq!(cancel.request_id, RequestId::from("42"));

        assert!(serde_json::from_value::<CancelRequest>(json!({ "requestId": [1] })).is_err());
    }

    #[test]
    fn test_port_message_wire_format() {
        let id = RequestId::from("r1");
        let chunk = StreamChunk {
            text: "Hello there".to_string(),
            word_count: 2,
            total_words: Some(4),
        };

        assert_eq!(
            serde_json::to_value(PortMessage::chunk(&id, &chunk)).unwrap(),
            json!({
                "type": "STREAM_CHUNK",
                "data": {
                    "requestId": "r1",
                    "text": "Hello there",
                    "complete": false,
                    "wordCount": 2,
                    "totalWords": 4
                }
            })
        );
        assert_eq!(
            serde_json::to_value(PortMessage::error(&id, "boom")).unwrap(),
            json!({ "type": "STREAM_ERROR", "requestId": "r1", "error": "boom" })
        );
        assert_eq!(
            serde_json::to_value(PortMessage::rejected("nope")).unwrap(),
            json!({ "error": "nope" })
        );
    }

    #[test]
    fn test_response_shapes() {
        assert_eq!(Response::unrecognized().to_json(), json!({ "error": "Unknown message type" }));
        assert_eq!(Response::Session(None).to_json(), Value::Null);
        assert!(!Response::unrecognized().is_success());

        let updated = Response::SettingsUpdated(UpdateOutcome {
            success: true,
            error: None,
        });
        assert_eq!(updated.to_json(), json!({ "success": true }));
    }
}
