//! In-memory store for tests and dry runs.
//!
//! Clones share state, so a test can keep one handle and give the other to a
//! [`StoreSink`](super::StoreSink).

use super::{Point, TimeSeriesStore};
use crate::error::TeleinfoError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    databases: Vec<String>,
    batches: Vec<(String, Vec<Point>)>,
    unreachable_for: u32,
    failing_writes: u32,
    list_calls: u32,
    create_calls: u32,
}

/// A `TimeSeriesStore` kept in memory, with injectable failures.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pre-creates a database.
    pub fn with_database(self, name: &str) -> Self {
        self.inner().databases.push(name.to_string());
        self
    }

    /// The next `attempts` database listings fail as unreachable.
    pub fn unreachable_for(&self, attempts: u32) {
        self.inner().unreachable_for = attempts;
    }

    /// The next `writes` batch writes fail as unreachable.
    pub fn fail_writes(&self, writes: u32) {
        self.inner().failing_writes = writes;
    }

    pub fn databases(&self) -> Vec<String> {
        self.inner().databases.clone()
    }

    /// Every accepted batch, in order, with its database.
    pub fn batches(&self) -> Vec<(String, Vec<Point>)> {
        self.inner().batches.clone()
    }

    pub fn list_calls(&self) -> u32 {
        self.inner().list_calls
    }

    pub fn create_calls(&self) -> u32 {
        self.inner().create_calls
    }
}

#[async_trait::async_trait]
impl TimeSeriesStore for MemoryStore {
    async fn list_databases(&self) -> Result<Vec<String>, TeleinfoError> {
        let mut inner = self.inner();
        inner.list_calls += 1;
        if inner.unreachable_for > 0 {
            inner.unreachable_for -= 1;
            return Err(TeleinfoError::StoreUnreachable("connection refused".into()));
        }
        Ok(inner.databases.clone())
    }

    async fn create_database(&self, name: &str) -> Result<(), TeleinfoError> {
        let mut inner = self.inner();
        inner.create_calls += 1;
        if !inner.databases.iter().any(|d| d == name) {
            inner.databases.push(name.to_string());
        }
        Ok(())
    }

    async fn write_points(&self, database: &str, points: &[Point]) -> Result<(), TeleinfoError> {
        let mut inner = self.inner();
        if inner.failing_writes > 0 {
            inner.failing_writes -= 1;
            return Err(TeleinfoError::StoreUnreachable("connection reset".into()));
        }
        if !inner.databases.iter().any(|d| d == database) {
            return Err(TeleinfoError::StoreRejected(format!(
                "database not found: {database}"
            )));
        }
        inner.batches.push((database.to_string(), points.to_vec()));
        Ok(())
    }
}
