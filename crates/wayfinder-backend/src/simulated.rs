//! Simulated backend
//!
//! Answers from a fixed set of replies and streams a fixed guidance paragraph
//! word by word. Reply selection is derived from the query text so the same
//! question always gets the same answer.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wayfinder_context::Context;

use crate::client::{BackendClient, EventStream, Intent, QueryResponse, StreamChunk, StreamEvent};
use crate::Result;

const REPLIES: [&str; 5] = [
    "I can help you with that. Let me guide you through the process step by step.",
    "Based on the website structure, I can see several ways to accomplish this task.",
    "I'll highlight the relevant elements on the page for you to interact with.",
    "This appears to be a multi-step process. Would you like me to guide you through each step?",
    "I can perform this action for you. Please confirm you'd like me to proceed.",
];

const GUIDANCE: &str = "I'll help you navigate this website. Let me analyze the current page \
structure and provide you with the best guidance. I can highlight important elements, guide you \
through forms, or perform actions on your behalf.";

const REPLY_CONFIDENCE: f64 = 0.85;
const SUGGESTED_ACTIONS: [&str; 3] = ["highlight", "guide", "explain"];

#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    response_delay: Duration,
    chunk_delay: Duration,
    streamed_text: String,
}

impl SimulatedBackend {
    pub fn new(response_delay: Duration, chunk_delay: Duration) -> Self {
        Self {
            response_delay,
            chunk_delay,
            streamed_text: GUIDANCE.to_string(),
        }
    }

    /// No artificial delays
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Replace the paragraph streamed back for every streaming query
    pub fn with_streamed_text(mut self, text: impl Into<String>) -> Self {
        self.streamed_text = text.into();
        self
    }

    fn reply_for(query: &str) -> &'static str {
        let seed = query
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        REPLIES[seed % REPLIES.len()]
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_millis(100))
    }
}

#[async_trait]
impl BackendClient for SimulatedBackend {
    async fn query(&self, text: &str, context: &Context) -> Result<QueryResponse> {
        tracing::debug!(
            page_type = %context.page_type,
            complexity = context.complexity_score,
            "Simulated query"
        );

        if !self.response_delay.is_zero() {
            tokio::time::sleep(self.response_delay).await;
        }

        Ok(
            QueryResponse::new(Self::reply_for(text), REPLY_CONFIDENCE, Intent::Assistance)
                .with_suggested_actions(SUGGESTED_ACTIONS),
        )
    }

    fn stream_query(&self, text: &str, _context: &Value, cancel: CancellationToken) -> EventStream {
        tracing::debug!(query_len = text.len(), "Simulated streaming query");

        let words: Vec<String> = self
            .streamed_text
            .split_whitespace()
            .map(str::to_string)
            .collect();

        WordStream {
            total: words.len(),
            words: words.into_iter(),
            emitted: 0,
            text: String::new(),
            delay: self.chunk_delay,
            cancel,
            finished: false,
        }
        .into_stream()
    }
}

/// Cumulative word-by-word emitter
struct WordStream {
    words: std::vec::IntoIter<String>,
    total: usize,
    emitted: usize,
    text: String,
    delay: Duration,
    cancel: CancellationToken,
    finished: bool,
}

impl WordStream {
    fn into_stream(self) -> EventStream {
        stream::unfold(self, |mut state| async move {
            let event = state.advance().await?;
            Some((event, state))
        })
        .boxed()
    }

    async fn advance(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }

        if self.cancel.is_cancelled() {
            return Some(self.finish(StreamEvent::Cancelled));
        }

        // Pace between chunks, waking early on cancellation
        if self.emitted > 0 && !self.delay.is_zero() {
            let cancel = self.cancel.clone();
            let interrupted = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(self.delay) => false,
            };
            if interrupted {
                return Some(self.finish(StreamEvent::Cancelled));
            }
        }

        let Some(word) = self.words.next() else {
            return Some(self.finish(StreamEvent::Done));
        };

        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(&word);
        self.emitted += 1;

        Some(StreamEvent::Chunk(StreamChunk {
            text: self.text.clone(),
            word_count: self.emitted,
            total_words: Some(self.total),
        }))
    }

    fn finish(&mut self, event: StreamEvent) -> StreamEvent {
        self.finished = true;
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wayfinder_session::{AnalysisInput, SessionRecord};

    fn context() -> Context {
        wayfinder_context::build(&SessionRecord::new(AnalysisInput::default()))
    }

    #[tokio::test]
    async fn test_query_is_deterministic() {
        let backend = SimulatedBackend::immediate();
        let first = backend.query("where is checkout?", &context()).await.unwrap();
        let second = backend.query("where is checkout?", &context()).await.unwrap();

        assert_eq!(first, second);
        assert!(REPLIES.contains(&first.text.as_str()));
        assert_eq!(first.intent, Intent::Assistance);
        assert_eq!(first.confidence, REPLY_CONFIDENCE);
        assert_eq!(first.suggested_actions, SUGGESTED_ACTIONS);
    }

    #[tokio::test]
    async fn test_stream_words_then_done() {
        let backend = SimulatedBackend::immediate().with_streamed_text("one two  three");
        let events: Vec<_> = backend
            .stream_query("q", &json!({}), CancellationToken::new())
            .collect()
            .await;

        assert_eq!(events.len(), 4);
        assert_eq!(
            events[2],
            StreamEvent::Chunk(StreamChunk {
                text: "one two three".to_string(),
                word_count: 3,
                total_words: Some(3),
            })
        );
        assert_eq!(events[3], StreamEvent::Done);
    }

    #[tokio::test]
    async fn test_default_paragraph_length() {
        let backend = SimulatedBackend::immediate();
        let events: Vec<_> = backend
            .stream_query("q", &Value::Null, CancellationToken::new())
            .collect()
            .await;

        let total = GUIDANCE.split_whitespace().count();
        assert_eq!(events.len(), total + 1);
        for (i, event) in events[..total].iter().enumerate() {
            match event {
                StreamEvent::Chunk(chunk) => {
                    assert_eq!(chunk.word_count, i + 1);
                    assert_eq!(chunk.total_words, Some(total));
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_cancel_stops_stream() {
        let backend = SimulatedBackend::immediate().with_streamed_text("a b c d e");
        let cancel = CancellationToken::new();
        let mut stream = backend.stream_query("q", &Value::Null, cancel.clone());

        assert!(matches!(stream.next().await, Some(StreamEvent::Chunk(_))));
        assert!(matches!(stream.next().await, Some(StreamEvent::Chunk(_))));
        cancel.cancel();

        assert_eq!(stream.next().await, Some(StreamEvent::Cancelled));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_pacing() {
        let backend = SimulatedBackend::new(Duration::ZERO, Duration::from_secs(60))
            .with_streamed_text("slow words here");
        let cancel = CancellationToken::new();
        let mut stream = backend.stream_query("q", &Value::Null, cancel.clone());

        assert!(matches!(stream.next().await, Some(StreamEvent::Chunk(_))));

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        assert_eq!(stream.next().await, Some(StreamEvent::Cancelled));
    }

    #[tokio::test]
    async fn test_empty_text_completes_immediately() {
        let backend = SimulatedBackend::immediate().with_streamed_text("   ");
        let events: Vec<_> = backend
            .stream_query("q", &Value::Null, CancellationToken::new())
            .collect()
            .await;
        assert_eq!(events, vec![StreamEvent::Done]);
    }
}
