//! Inventory library for the daily EC2 reconciliation job
//!
//! This crate provides the core functionality for:
//! - Querying the AWS Config aggregator for compute inventory
//! - Resolving instance-type capabilities in bulk
//! - Enriching instances with OS inventory and attached volumes
//! - Persisting dated snapshots and comparing them day over day
//! - Failure reporting, notification and CMDB payload mapping

pub mod capability;
pub mod cmdb;
pub mod compare;
pub mod credentials;
pub mod enrich;
pub mod error;
pub mod index;
pub mod models;
pub mod notify;
pub mod observability;
pub mod report;
pub mod run;
pub mod store;

#[cfg(test)]
mod testing;

pub use error::{
    CapabilityError, CmdbError, CompareError, EnrichError, IndexError, NotifyError, RunError,
    StoreError,
};
pub use models::*;
pub use observability::{RunMetrics, StructuredLogger};
