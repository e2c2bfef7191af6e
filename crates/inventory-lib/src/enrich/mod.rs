//! Inventory enrichment
//!
//! Joins a raw index record with instance-type capabilities, the SSM OS
//! inventory and attached EBS volumes into one snapshot record. Every
//! failure here is scoped to the record being enriched.

pub mod decimal;
mod payload;


pub use payload::{
    parse_os_inventory, parse_raw_record, parse_volume, OsInventory, FQDN_NOT_REPORTED,
};

use crate::capability::CapabilityMap;
use crate::error::{EnrichError, IndexError};
use crate::index::{os_inventory_query, volume_query, ResourceIndexQuery};
use crate::models::{EnrichedSnapshotRecord, RawResourceRecord};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Per-resource auxiliary lookups
#[async_trait]
pub trait AuxiliaryLookups: Send + Sync {
    /// OS inventory rows for the instance; the first row wins
    async fn os_inventory(&self, resource_id: &str) -> Result<Vec<String>, IndexError>;

    /// Volume rows attached to the instance
    async fn volumes(&self, resource_id: &str) -> Result<Vec<String>, IndexError>;
}

/// Lookups served by templated index queries
#[derive(Clone)]
pub struct IndexLookups {
    query: ResourceIndexQuery,
}

impl IndexLookups {
    pub fn new(query: ResourceIndexQuery) -> Self {
        Self { query }
    }
}

#[async_trait]
impl AuxiliaryLookups for IndexLookups {
    async fn os_inventory(&self, resource_id: &str) -> Result<Vec<String>, IndexError> {
        self.query.run(&os_inventory_query(resource_id)?).await
    }

    async fn volumes(&self, resource_id: &str) -> Result<Vec<String>, IndexError> {
        self.query.run(&volume_query(resource_id)?).await
    }
}

/// Optional enrichment behaviour
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichOptions {
    /// Persist the number of Windows update entries for Windows hosts
    pub capture_windows_updates: bool,
}

/// Builds [`EnrichedSnapshotRecord`]s from raw records
#[derive(Clone)]
pub struct InventoryEnricher {
    lookups: Arc<dyn AuxiliaryLookups>,
    options: EnrichOptions,
}

impl InventoryEnricher {
    pub fn new(lookups: Arc<dyn AuxiliaryLookups>) -> Self {
        Self {
            lookups,
            options: EnrichOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EnrichOptions) -> Self {
        self.options = options;
        self
    }

    /// Enrich one raw record for `recorded_date`.
    ///
    /// The capability entry is checked before any sub-query is issued; a
    /// missing entry fails the record rather than defaulting its fields.
    pub async fn enrich(
        &self,
        raw: &RawResourceRecord,
        capabilities: &CapabilityMap,
        recorded_date: &str,
    ) -> Result<EnrichedSnapshotRecord, EnrichError> {
        let resource_id = raw.resource_id.as_str();
        let instance_type = raw
            .instance_type
            .as_deref()
            .ok_or_else(|| EnrichError::MissingInstanceType(resource_id.to_string()))?;
        let capability = capabilities
            .get(instance_type)
            .ok_or_else(|| EnrichError::MissingCapability(instance_type.to_string()))?;

        let (os_rows, volume_rows) = tokio::try_join!(
            self.lookups.os_inventory(resource_id),
            self.lookups.volumes(resource_id)
        )?;

        let os = match os_rows.first() {
            Some(row) => parse_os_inventory(resource_id, row)?,
            None => OsInventory::default(),
        };

        let disks = volume_rows
            .iter()
            .map(|row| parse_volume(resource_id, row))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            resource_id = %resource_id,
            platform = %os.platform_name,
            volumes = disks.len(),
            "Enriched resource"
        );

        let windows_update_count = if self.options.capture_windows_updates {
            os.windows_update_count
        } else {
            None
        };

        Ok(EnrichedSnapshotRecord {
            recorded_date: recorded_date.to_string(),
            resource_id: resource_id.to_string(),
            arn: raw.arn.clone(),
            availability_zone: raw.availability_zone.clone(),
            account_id: raw.account_id.clone(),
            state_name: raw.state_name.clone(),
            instance_type: instance_type.to_string(),
            resource_creation_time: raw.resource_creation_time.clone(),
            private_ip_address: raw.private_ip_address.clone(),
            public_ip_address: raw.public_ip_address.clone(),
            cpu: capability.vcpus,
            memory: capability.memory_gib,
            tags: raw.tags.clone(),
            platform_name: os.platform_name,
            fqdn: os.fqdn,
            disks,
            nametag: raw.name_tag().map(str::to_string),
            windows_update_count,
        })
    }
}
