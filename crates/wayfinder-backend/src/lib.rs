//! Wayfinder Backend
//!
//! The assistant backend is an external collaborator. This crate defines the
//! seam the core talks to ([`BackendClient`]) and ships a simulated backend
//! that answers from canned text.

mod client;
mod error;
mod simulated;

pub use client::{BackendClient, EventStream, Intent, QueryResponse, StreamChunk, StreamEvent};
pub use error::BackendError;
pub use simulated::SimulatedBackend;

pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, BackendError>;
