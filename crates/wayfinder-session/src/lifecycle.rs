//! Tab lifecycle events consumed from the host
//!
//! ```text
//! Updated { status: complete, url } ─┐
//!                                    ├─> session dropped
//! Removed ───────────────────────────┘
//! ```
//!
//! Every completed navigation drops the session, including same-page updates.
//! There is no finer diffing of what actually changed.

use serde::{Deserialize, Serialize};

/// Page load status reported with a tab update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Loading,
    Complete,
    #[serde(other)]
    Unknown,
}

impl LoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStatus::Loading => "loading",
            LoadStatus::Complete => "complete",
            LoadStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabEvent {
    /// The tab was closed
    Removed,
    /// The tab's load status or address changed
    Updated {
        status: Option<LoadStatus>,
        url: Option<String>,
    },
}

impl TabEvent {
    /// Whether this event ends the tab's current session
    pub fn invalidates_session(&self) -> bool {
        match self {
            TabEvent::Removed => true,
            TabEvent::Updated { status, url } => {
                *status == Some(LoadStatus::Complete) && url.as_deref().is_some_and(|u| !u.is_empty())
            }
        }
    }
}
