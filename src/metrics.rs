//! Counters for created and deleted files
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

pub const FILES_CREATED: &str = "ach_files_created";
pub const FILES_DELETED: &str = "ach_files_deleted";

/// Observability port held by the lifecycle service.
pub trait FileMetrics: Send + Sync {
    fn file_created(&self, origin: &str, destination: &str);
    fn file_deleted(&self);
}

/// Discards every increment.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl FileMetrics for NoopMetrics {
    fn file_created(&self, _origin: &str, _destination: &str) {}
    fn file_deleted(&self) {}
}

/// In-process counters, readable by a collector or a test.
#[derive(Debug, Default)]
pub struct CounterMetrics {
    created: Mutex<HashMap<(String, String), u64>>,
    deleted: AtomicU64,
}

impl CounterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files created for one (origin, destination) pair.
    pub fn files_created(&self, origin: &str, destination: &str) -> u64 {
        let created = self.created.lock().unwrap_or_else(PoisonError::into_inner);
        created
            .get(&(origin.to_string(), destination.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_created(&self) -> u64 {
        let created = self.created.lock().unwrap_or_else(PoisonError::into_inner);
        created.values().sum()
    }

    pub fn files_deleted(&self) -> u64 {
        self.deleted.load(Ordering::Relaxed)
    }
}

impl FileMetrics for CounterMetrics {
    fn file_created(&self, origin: &str, destination: &str) {
        let mut created = self.created.lock().unwrap_or_else(PoisonError::into_inner);
        *created
            .entry((origin.to_string(), destination.to_string()))
            .or_insert(0) += 1;
        tracing::trace!(counter = FILES_CREATED, origin, destination, "increment");
    }

    fn file_deleted(&self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = FILES_DELETED, "increment");
    }
}
