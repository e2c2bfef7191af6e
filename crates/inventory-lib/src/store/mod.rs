//! Dated snapshot storage
//!
//! Snapshots are keyed by (recorded date, resource id). Writing the same key
//! twice replaces the earlier row: a re-run for the same day overwrites its
//! own output instead of failing on a duplicate key.

mod dynamodb;
mod memory;

pub use dynamodb::{DynamoSnapshotStore, DEFAULT_TABLE_NAME};
pub use memory::InMemorySnapshotStore;

use crate::error::StoreError;
use crate::models::EnrichedSnapshotRecord;
use async_trait::async_trait;

/// Exact-match filter on recorded date and name tag (logical AND).
///
/// An unset side matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotFilter {
    pub recorded_date: Option<String>,
    pub nametag: Option<String>,
}

impl SnapshotFilter {
    pub fn new(recorded_date: impl Into<String>, nametag: impl Into<String>) -> Self {
        Self {
            recorded_date: Some(recorded_date.into()),
            nametag: Some(nametag.into()),
        }
    }

    pub fn for_date(recorded_date: impl Into<String>) -> Self {
        Self {
            recorded_date: Some(recorded_date.into()),
            nametag: None,
        }
    }

    pub fn matches(&self, record: &EnrichedSnapshotRecord) -> bool {
        let date_matches = self
            .recorded_date
            .as_deref()
            .map_or(true, |date| record.recorded_date == date);
        let tag_matches = self
            .nametag
            .as_deref()
            .map_or(true, |tag| record.nametag.as_deref() == Some(tag));
        date_matches && tag_matches
    }
}

/// Trait for snapshot store implementations
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Write one record, replacing any row with the same date and resource id
    async fn insert(&self, record: &EnrichedSnapshotRecord) -> Result<(), StoreError>;

    /// All rows matching `filter`, with every field intact
    async fn scan(&self, filter: &SnapshotFilter) -> Result<Vec<EnrichedSnapshotRecord>, StoreError>;
}
