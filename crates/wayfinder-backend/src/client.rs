//! Backend client interface

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use wayfinder_context::Context;

use crate::Result;

/// What the backend thinks the user is trying to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Navigation,
    Form,
    Assistance,
    #[serde(other)]
    Other,
}

/// Answer to a one-shot query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub text: String,
    /// Always within `0.0..=1.0`
    pub confidence: f64,
    pub intent: Intent,
    #[serde(default)]
    pub suggested_actions: Vec<String>,
}

impl QueryResponse {
    pub fn new(text: impl Into<String>, confidence: f64, intent: Intent) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        Self {
            text: text.into(),
            confidence,
            intent,
            suggested_actions: Vec::new(),
        }
    }

    pub fn with_suggested_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for action in actions {
            let action = action.into();
            if !self.suggested_actions.contains(&action) {
                self.suggested_actions.push(action);
            }
        }
        self
    }
}

/// Partial output of a streaming query. `text` is cumulative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamChunk {
    pub text: String,
    pub word_count: usize,
    /// Known up front for canned answers, may be absent for live generation
    pub total_words: Option<usize>,
}

/// Item of a streaming query.
///
/// A well-formed stream is zero or more `Chunk`s followed by exactly one of
/// the terminal markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(StreamChunk),
    Done,
    Failed(String),
    Cancelled,
}

pub type EventStream = BoxStream<'static, StreamEvent>;

#[async_trait]
pub trait BackendClient: Send + Sync {
    /// One-shot query. Failures are never retried by the caller.
    async fn query(&self, text: &str, context: &Context) -> Result<QueryResponse>;

    /// Streaming query.
    ///
    /// Implementations must check `cancel` between chunks: once it fires no
    /// further chunks are produced and the stream ends with
    /// [`StreamEvent::Cancelled`].
    fn stream_query(&self, text: &str, context: &Value, cancel: CancellationToken) -> EventStream;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(QueryResponse::new("hi", 1.7, Intent::Form).confidence, 1.0);
        assert_eq!(QueryResponse::new("hi", -0.2, Intent::Form).confidence, 0.0);
        assert_eq!(QueryResponse::new("hi", f64::NAN, Intent::Form).confidence, 0.0);
    }

    #[test]
    fn test_intent_wire_format() {
        let intent: Intent = serde_json::from_str("\"navigation\"").unwrap();
        assert_eq!(intent, Intent::Navigation);

        let unknown: Intent = serde_json::from_str("\"purchase\"").unwrap();
        assert_eq!(unknown, Intent::Other);
        assert_eq!(serde_json::to_string(&Intent::Other).unwrap(), "\"other\"");
    }

    #[test]
    fn test_suggested_actions_deduplicated() {
        let response = QueryResponse::new("ok", 0.5, Intent::Assistance)
            .with_suggested_actions(["highlight", "guide", "highlight"]);
        assert_eq!(response.suggested_actions, vec!["highlight", "guide"]);

        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["suggestedActions"][1], "guide");
    }
}
