use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::AppError;
use crate::services::table::Table;

#[derive(Debug, Default)]
struct Datasets {
    raw: Option<Arc<Table>>,
    cleaned: Option<Arc<Table>>,
}

/// Consistent view of both tables taken under one read lock.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub raw: Arc<Table>,
    pub cleaned: Option<Arc<Table>>,
}

impl Snapshot {
    /// Cleaned table when present, else raw.
    pub fn active(&self) -> Arc<Table> {
        self.cleaned.clone().unwrap_or_else(|| self.raw.clone())
    }
}

/// The single loaded dataset and its cleaned counterpart.
///
/// Handlers clone `Arc` snapshots out of the lock and compute without holding
/// it, so a long analysis never blocks a new upload.
#[derive(Debug, Default)]
pub struct DatasetStore {
    inner: RwLock<Datasets>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the raw table and drops any cleaned table derived from the
    /// previous one.
    pub fn load(&self, table: Table) -> Arc<Table> {
        let table = Arc::new(table);
        let mut guard = self.inner.write();
        guard.raw = Some(table.clone());
        guard.cleaned = None;
        table
    }

    /// Stores `table` as the cleaned counterpart of `source`. Fails when the
    /// raw table was replaced after `source` was read.
    pub fn commit_cleaned(&self, source: &Arc<Table>, table: Table) -> Result<Arc<Table>, AppError> {
        let mut guard = self.inner.write();
        match &guard.raw {
            Some(raw) if Arc::ptr_eq(raw, source) => {
                let table = Arc::new(table);
                guard.cleaned = Some(table.clone());
                Ok(table)
            }
            _ => Err(AppError::InvalidInput("Dataset changed during cleaning".to_string())),
        }
    }

    pub fn raw(&self) -> Result<Arc<Table>, AppError> {
        self.inner
            .read()
            .raw
            .clone()
            .ok_or_else(|| AppError::NotFound("No data loaded".to_string()))
    }

    pub fn cleaned(&self) -> Result<Arc<Table>, AppError> {
        self.inner
            .read()
            .cleaned
            .clone()
            .ok_or_else(|| AppError::NotFound("No cleaned data available. Run cleaning first.".to_string()))
    }

    pub fn active(&self) -> Result<Arc<Table>, AppError> {
        self.snapshot().map(|s| s.active())
    }

    pub fn snapshot(&self) -> Result<Snapshot, AppError> {
        let guard = self.inner.read();
        let raw = guard
            .raw
            .clone()
            .ok_or_else(|| AppError::NotFound("No data available".to_string()))?;
        Ok(Snapshot {
            raw,
            cleaned: guard.cleaned.clone(),
        })
    }

    pub fn has_cleaned(&self) -> bool {
        self.inner.read().cleaned.is_some()
    }
}
