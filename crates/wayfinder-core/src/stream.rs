//! Stream coordination
//!
//! One [`StreamCoordinator`] per persistent connection. Each
//! `STREAM_AI_RESPONSE` spawns a task that forwards backend chunks to the
//! connection until the stream completes, fails or is cancelled.

use futures_util::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use wayfinder_backend::{BackendClient, CancellationToken, EventStream, StreamChunk, StreamEvent};

use crate::message::{CancelRequest, PortMessage, PortMessageType, RequestId, RuntimeMessage, StreamRequest};

const UNKNOWN_PORT_MESSAGE: &str = "Unknown port message type";
const DUPLICATE_REQUEST: &str = "A stream with this requestId is already in progress";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    Idle,
    Streaming,
    Completed,
    Cancelled,
    Errored,
}

impl StreamState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamState::Idle => "idle",
            StreamState::Streaming => "streaming",
            StreamState::Completed => "completed",
            StreamState::Cancelled => "cancelled",
            StreamState::Errored => "errored",
        }
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress of a live stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamProgress {
    pub state: StreamState,
    pub word_count: usize,
    pub text_len: usize,
}

struct ActiveStream {
    cancel: CancellationToken,
    generation: u64,
    progress: StreamProgress,
}

type StreamTable = Arc<Mutex<HashMap<RequestId, ActiveStream>>>;

pub struct StreamCoordinator {
    name: Option<String>,
    backend: Arc<dyn BackendClient>,
    outbound: mpsc::UnboundedSender<PortMessage>,
    streams: StreamTable,
    generation: Arc<AtomicU64>,
}

impl StreamCoordinator {
    pub fn new(
        name: Option<String>,
        backend: Arc<dyn BackendClient>,
        outbound: mpsc::UnboundedSender<PortMessage>,
    ) -> Self {
        Self {
            name,
            backend,
            outbound,
            streams: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Handle one inbound connection message.
    ///
    /// Returns the task driving a newly started stream, if any.
    pub fn handle(&self, message: RuntimeMessage) -> Option<JoinHandle<StreamState>> {
        let Ok(kind) = message.kind.parse::<PortMessageType>() else {
            tracing::warn!(port = ?self.name, message_type = %message.kind, "Unknown port message type");
            self.post(PortMessage::rejected(UNKNOWN_PORT_MESSAGE));
            return None;
        };

        match kind {
            PortMessageType::StreamAiResponse => match message.payload::<StreamRequest>() {
                Ok(request) => self.start(request),
                Err(e) => {
                    self.post(PortMessage::rejected(e.to_string()));
                    None
                }
            },
            PortMessageType::CancelAiRequest => {
                match message.payload::<CancelRequest>() {
                    Ok(request) => {
                        self.cancel(&request.request_id);
                    }
                    Err(e) => self.post(PortMessage::rejected(e.to_string())),
                }
                None
            }
        }
    }

    /// Start streaming a response; `None` if the request id is already live
    pub fn start(&self, request: StreamRequest) -> Option<JoinHandle<StreamState>> {
        let request_id = request.request_id.unwrap_or_else(RequestId::generate);
        let cancel = CancellationToken::new();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);

        {
            let mut streams = self.streams.lock();
            if streams.contains_key(&request_id) {
                drop(streams);
                tracing::warn!(request_id = %request_id, "Duplicate stream request");
                self.post(PortMessage::rejected(DUPLICATE_REQUEST));
                return None;
            }
            streams.insert(
                request_id.clone(),
                ActiveStream {
                    cancel: cancel.clone(),
                    generation,
                    progress: StreamProgress {
                        state: StreamState::Streaming,
                        word_count: 0,
                        text_len: 0,
                    },
                },
            );
        }

        tracing::info!(
            request_id = %request_id,
            query_len = request.query.len(),
            "Starting stream"
        );

        let events = self
            .backend
            .stream_query(&request.query, &request.context, cancel.clone());

        let task = StreamTask {
            request_id,
            generation,
            events,
            cancel,
            outbound: self.outbound.clone(),
            streams: Arc::clone(&self.streams),
        };

        Some(tokio::spawn(task.run()))
    }

    /// Fire the token for a live stream. Unknown or finished ids are ignored.
    pub fn cancel(&self, request_id: &RequestId) -> bool {
        let Some(stream) = self.streams.lock().remove(request_id) else {
            tracing::debug!(request_id = %request_id, "Cancel for inactive stream ignored");
            return false;
        };

        stream.cancel.cancel();
        tracing::info!(request_id = %request_id, "Cancelled stream");
        true
    }

    /// The connection went away: cancel everything without notifying anyone
    pub fn close(&self) -> usize {
        let streams: Vec<ActiveStream> = self.streams.lock().drain().map(|(_, s)| s).collect();
        for stream in &streams {
            stream.cancel.cancel();
        }

        if !streams.is_empty() {
            tracing::info!(port = ?self.name, cancelled = streams.len(), "Connection closed");
        }
        streams.len()
    }

    pub fn active_streams(&self) -> Vec<RequestId> {
        let mut ids: Vec<RequestId> = self.streams.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_streaming(&self, request_id: &RequestId) -> bool {
        self.streams.lock().contains_key(request_id)
    }

    pub fn progress(&self, request_id: &RequestId) -> Option<StreamProgress> {
        self.streams.lock().get(request_id).map(|s| s.progress)
    }

    fn post(&self, message: PortMessage) {
        if self.outbound.send(message).is_err() {
            tracing::debug!(port = ?self.name, "Connection already closed");
        }
    }
}

impl Clone for StreamCoordinator {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            backend: Arc::clone(&self.backend),
            outbound: self.outbound.clone(),
            streams: Arc::clone(&self.streams),
            generation: Arc::clone(&self.generation),
        }
    }
}

struct StreamTask {
    request_id: RequestId,
    generation: u64,
    events: EventStream,
    cancel: CancellationToken,
    outbound: mpsc::UnboundedSender<PortMessage>,
    streams: StreamTable,
}

impl StreamTask {
    async fn run(mut self) -> StreamState {
        let mut last: Option<StreamChunk> = None;

        let state = loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break StreamState::Cancelled,
                event = self.events.next() => event,
            };

            // Chunk boundary: nothing is forwarded after the token fires
            if self.cancel.is_cancelled() {
                break StreamState::Cancelled;
            }

            match event {
                Some(StreamEvent::Chunk(chunk)) => {
                    if !self.send(PortMessage::chunk(&self.request_id, &chunk)) {
                        break StreamState::Cancelled;
                    }
                    self.record(&chunk);
                    last = Some(chunk);
                }
                Some(StreamEvent::Done) | None => {
                    let chunk = last.take().unwrap_or_else(empty_chunk);
                    self.send(PortMessage::complete(&self.request_id, &chunk));
                    break StreamState::Completed;
                }
                Some(StreamEvent::Failed(error)) => {
                    tracing::warn!(request_id = %self.request_id, error = %error, "Stream failed");
                    self.send(PortMessage::error(&self.request_id, error));
                    break StreamState::Errored;
                }
                Some(StreamEvent::Cancelled) => break StreamState::Cancelled,
            }
        };

        self.release();
        tracing::info!(request_id = %self.request_id, state = %state, "Stream finished");
        state
    }

    /// A closed connection counts as a cancellation
    fn send(&self, message: PortMessage) -> bool {
        if self.outbound.send(message).is_ok() {
            return true;
        }
        tracing::debug!(request_id = %self.request_id, "Connection closed mid-stream");
        self.cancel.cancel();
        false
    }

    fn record(&self, chunk: &StreamChunk) {
        if let Some(stream) = self.own_entry(&mut self.streams.lock()) {
            stream.progress.word_count = chunk.word_count;
            stream.progress.text_len = chunk.text.len();
        }
    }

    fn own_entry<'a>(
        &self,
        streams: &'a mut HashMap<RequestId, ActiveStream>,
    ) -> Option<&'a mut ActiveStream> {
        streams
            .get_mut(&self.request_id)
            .filter(|s| s.generation == self.generation)
    }

    fn release(&self) {
        let mut streams = self.streams.lock();
        if self.own_entry(&mut streams).is_some() {
            streams.remove(&self.request_id);
        }
    }
}

fn empty_chunk() -> StreamChunk {
    StreamChunk {
        text: String::new(),
        word_count: 0,
        total_words: Some(0),
    }
}
