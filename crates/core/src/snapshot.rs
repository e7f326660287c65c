use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::enriched::EnrichedTable;
use crate::errors::NoDataError;

/// Single-slot holder for the most recently completed run.
///
/// A reader that took a snapshot keeps seeing it even after a later run
/// replaces the slot.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    latest: RwLock<Option<Arc<EnrichedTable>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `table` atomically and returns the handle now stored.
    pub fn replace(&self, table: EnrichedTable) -> Arc<EnrichedTable> {
        let table = Arc::new(table);
        let mut slot = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::clone(&table));
        table
    }

    pub fn latest(&self) -> Option<Arc<EnrichedTable>> {
        self.latest.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn require_latest(&self) -> Result<Arc<EnrichedTable>, NoDataError> {
        self.latest().ok_or(NoDataError)
    }
}
