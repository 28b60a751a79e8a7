//! Session Store
//!
//! In-memory map from tab to its latest analysis.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::lifecycle::TabEvent;
use crate::record::SessionRecord;
use crate::tab::TabId;

/// Owner of every tab's session record.
///
/// Records are held behind `Arc` and swapped whole, so a reader either sees the
/// previous record or the new one, never a mix. Cloning the store shares the map.
pub struct SessionStore {
    records: Arc<RwLock<HashMap<TabId, Arc<SessionRecord>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store a record for a tab, replacing any previous one
    pub fn put(&self, tab_id: TabId, record: SessionRecord) {
        let replaced = self
            .records
            .write()
            .insert(tab_id, Arc::new(record))
            .is_some();

        tracing::debug!(tab_id = %tab_id, replaced, "Stored session");
    }

    /// Get the current record for a tab
    pub fn get(&self, tab_id: TabId) -> Option<Arc<SessionRecord>> {
        self.records.read().get(&tab_id).cloned()
    }

    /// Drop a tab's record. Missing tabs are fine.
    pub fn delete(&self, tab_id: TabId) -> bool {
        let removed = self.records.write().remove(&tab_id).is_some();
        if removed {
            tracing::debug!(tab_id = %tab_id, "Dropped session");
        }
        removed
    }

    /// Apply a host lifecycle event. Returns true if a session was dropped.
    pub fn apply(&self, tab_id: TabId, event: &TabEvent) -> bool {
        if event.invalidates_session() {
            self.delete(tab_id)
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Tabs that currently hold a session, in ascending order
    pub fn tab_ids(&self) -> Vec<TabId> {
        let mut ids: Vec<TabId> = self.records.read().keys().copied().collect();
        ids.sort();
        ids
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SessionStore {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}
