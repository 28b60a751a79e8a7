//! Wayfinder Session Management
//!
//! - A session is the last analyzed snapshot of one tab's page
//! - At most one session per tab; a new analysis replaces the old one whole
//! - Closing the tab or completing a navigation in it drops the session
//! - Sessions live in memory only and never outlast the process

mod lifecycle;
mod record;
mod store;
mod tab;

pub use lifecycle::{LoadStatus, TabEvent};
pub use record::{AnalysisInput, ElementDescriptor, PageStructure, SessionRecord};
pub use store::SessionStore;
pub use tab::TabId;
