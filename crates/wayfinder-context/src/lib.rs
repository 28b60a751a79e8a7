//! Wayfinder Context Builder
//!
//! Turns a tab's session record into the read-only summary sent to the backend
//! alongside every query. Pure and deterministic: no shared state, no I/O.

mod builder;
mod page_type;

pub use builder::{build, complexity_score, Context, PRIMARY_ELEMENT_LIMIT};
pub use page_type::PageType;
