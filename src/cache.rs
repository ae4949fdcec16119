use crate::models::Snapshot;
use std::sync::{Arc, PoisonError, RwLock};

/// Holds the last committed snapshot.
///
/// A refresh builds its snapshot off to the side and only takes the write
/// lock to swap the pointer, so readers never wait on scraping and never
/// see a half-built snapshot.
#[derive(Debug, Default)]
pub struct CacheStore {
    current: RwLock<Arc<Snapshot>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot; `{listings: [], fetched_at: None}` before the first commit.
    pub fn read(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace the current snapshot as a whole.
    pub fn write(&self, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = snapshot;
    }
}
