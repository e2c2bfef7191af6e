//! Error types for the reconciliation pipeline
//!
//! Errors are split by scope: index and capability failures abort a run,
//! enrichment and store failures are recorded per resource.

use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while querying the resource index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The index service rejected the call or could not be reached.
    #[error("resource index query failed: {0}")]
    Transport(String),

    /// A page request did not complete within the configured timeout.
    #[error("resource index query timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// A value interpolated into a query template was rejected.
    #[error("invalid query parameter: {0:?}")]
    InvalidParameter(String),
}

/// Errors raised while resolving instance-type capabilities.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("instance type lookup failed: {0}")]
    Transport(String),
}

/// Per-record enrichment failures.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("invalid JSON in index payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("index record has no resourceId")]
    MissingResourceId,

    #[error("malformed {source_name} payload for {resource_id}: {detail}")]
    MalformedPayload {
        source_name: &'static str,
        resource_id: String,
        detail: String,
    },

    #[error("no instance type reported for {0}")]
    MissingInstanceType(String),

    #[error("no capability data for instance type {0}")]
    MissingCapability(String),

    #[error("sub-query failed: {0}")]
    SubQuery(#[from] IndexError),

    #[error("enrichment timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// Errors raised by the snapshot store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store refused the write or scan.
    #[error("snapshot store rejected request: {0}")]
    Rejected(String),

    /// A stored item could not be mapped back to a snapshot record.
    #[error("could not decode stored snapshot: {0}")]
    Decode(String),
}

/// Errors raised by the day-over-day comparator.
#[derive(Debug, Error)]
pub enum CompareError {
    #[error("cannot go back {day_offset} days from {as_of}")]
    OffsetOutOfRange { as_of: NaiveDate, day_offset: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised when dispatching a failure report.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("could not build notification: {0}")]
    Build(String),

    #[error("notification dispatch failed: {0}")]
    Transport(String),
}

/// Errors from the CMDB REST client.
#[derive(Debug, Error)]
pub enum CmdbError {
    #[error("invalid CMDB URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not encode CMDB request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("CMDB returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("CMDB response missing access token")]
    MissingToken,
}

/// Run-aborting failures. Nothing else escapes a reconciliation run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("base inventory query failed: {0}")]
    Index(#[from] IndexError),

    #[error("capability resolution failed: {0}")]
    Capability(#[from] CapabilityError),
}
