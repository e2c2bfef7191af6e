//! Core data models for the reconciliation pipeline

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Platform name recorded when no OS inventory entry exists
pub const UNKNOWN_PLATFORM: &str = "unknown";

/// Tag key holding the user-assigned display name
pub const NAME_TAG_KEY: &str = "Name";

/// Key/value tag attached to a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// One compute resource as reported by the index at query time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResourceRecord {
    pub resource_id: String,
    pub arn: Option<String>,
    pub availability_zone: Option<String>,
    pub account_id: Option<String>,
    pub state_name: Option<String>,
    pub instance_type: Option<String>,
    pub resource_creation_time: Option<String>,
    /// From the first network interface only
    pub private_ip_address: Option<String>,
    pub public_ip_address: Option<String>,
    pub tags: Vec<Tag>,
}

impl RawResourceRecord {
    /// Value of the first `Name` tag, if any
    pub fn name_tag(&self) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.key == NAME_TAG_KEY)
            .map(|tag| tag.value.as_str())
    }
}

/// Capability attributes of an instance type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRecord {
    pub instance_type: String,
    pub vcpus: i32,
    /// Sum across attached GPU devices, zero if none
    pub gpus: i32,
    pub memory_mib: i64,
    /// Exact `memory_mib / 1024`
    pub memory_gib: Decimal,
    pub sustained_clock_speed_ghz: Option<Decimal>,
}

/// One attached storage volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRecord {
    pub volume_id: String,
    pub volume_type: Option<String>,
    pub size: Option<Decimal>,
    pub iops: Option<Decimal>,
}

/// The unit of persistence: one dated, enriched view of a resource.
///
/// Attribute names match the snapshot table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedSnapshotRecord {
    pub recorded_date: String,
    #[serde(rename = "resourceid")]
    pub resource_id: String,
    pub arn: Option<String>,
    #[serde(rename = "availabilityZone")]
    pub availability_zone: Option<String>,
    #[serde(rename = "accountId")]
    pub account_id: Option<String>,
    #[serde(rename = "stateName")]
    pub state_name: Option<String>,
    #[serde(rename = "instanceType")]
    pub instance_type: String,
    #[serde(rename = "resourceCreationTime")]
    pub resource_creation_time: Option<String>,
    #[serde(rename = "privateIpAddress")]
    pub private_ip_address: Option<String>,
    #[serde(rename = "publicIpAddress")]
    pub public_ip_address: Option<String>,
    pub cpu: i32,
    /// Memory in GiB
    pub memory: Decimal,
    pub tags: Vec<Tag>,
    #[serde(rename = "PlatformName")]
    pub platform_name: String,
    #[serde(rename = "FQDN")]
    pub fqdn: Option<String>,
    #[serde(rename = "disk")]
    pub disks: Vec<VolumeRecord>,
    pub nametag: Option<String>,
    #[serde(
        rename = "windowsUpdateCount",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub windows_update_count: Option<u32>,
}

impl EnrichedSnapshotRecord {
    /// Name tag with surrounding whitespace removed, `None` when absent or blank
    pub fn usable_name_tag(&self) -> Option<&str> {
        self.nametag
            .as_deref()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
    }
}

/// A per-record failure as shown in the failure report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub resourceid: String,
    pub message: String,
    #[serde(rename = "AZ")]
    pub az: Option<String>,
    pub accountid: Option<String>,
}

/// Aggregate result of one reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub recorded_date: String,
    pub update_count: usize,
    pub error: usize,
    pub failures: Vec<FailureEntry>,
}

impl RunSummary {
    /// The contract exposed to the job's caller
    pub fn outcome(&self) -> RunOutcome {
        RunOutcome {
            update_count: self.update_count,
            error: self.error,
        }
    }
}

/// `{ update_count, error }` as returned by the job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub update_count: usize,
    pub error: usize,
}
