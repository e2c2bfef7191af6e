//! CLI command implementations

pub mod cmdb;
pub mod compare;
pub mod snapshots;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use inventory_lib::compare::DATE_FORMAT;
use inventory_lib::credentials::ClientFactory;
use inventory_lib::store::DynamoSnapshotStore;

/// Snapshot table and region resolved from flags and the config file
#[derive(Debug, Clone)]
pub struct StoreTarget {
    pub table: String,
    pub region: Option<String>,
}

impl StoreTarget {
    pub async fn connect(&self) -> DynamoSnapshotStore {
        let factory = ClientFactory::from_env(self.region.as_deref()).await;
        DynamoSnapshotStore::new(factory.dynamodb_client(), self.table.clone())
    }
}

/// Parse a `YYYY-MM-DD` date, defaulting to today's UTC date
pub fn parse_date(date: Option<&str>) -> Result<NaiveDate> {
    match date {
        Some(text) => NaiveDate::parse_from_str(text, DATE_FORMAT)
            .with_context(|| format!("Invalid date {text:?}, expected YYYY-MM-DD")),
        None => Ok(chrono::Utc::now().date_naive()),
    }
}
