//! In-memory snapshot store for dry runs and tests

use super::{SnapshotFilter, SnapshotStore};
use crate::error::StoreError;
use crate::models::EnrichedSnapshotRecord;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Snapshot store holding rows in insertion order
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    rows: RwLock<Vec<EnrichedSnapshotRecord>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn insert(&self, record: &EnrichedSnapshotRecord) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let existing = rows.iter_mut().find(|row| {
            row.recorded_date == record.recorded_date && row.resource_id == record.resource_id
        });

        match existing {
            Some(row) => *row = record.clone(),
            None => rows.push(record.clone()),
        }
        Ok(())
    }

    async fn scan(&self, filter: &SnapshotFilter) -> Result<Vec<EnrichedSnapshotRecord>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|row| filter.matches(row)).cloned().collect())
    }
}
