//! CMDB configuration-item mapping
//!
//! Turns stored snapshots into the `ConfigItem` documents accepted by the
//! CMDB generic interface. The daily run does not call the CMDB; the CLI
//! exports or pushes these payloads on demand.

mod client;

pub use client::CmdbClient;

use crate::models::EnrichedSnapshotRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name-tag prefixes that mark a production server
pub const PRODUCTION_PREFIXES: [&str; 5] = ["prd", "prod", "production", "mc", "ss"];

/// Name-tag prefix to criticality tier, first match wins
pub const CRITICALITY_TIERS: [(&str, &str); 5] = [
    ("mc", "Mission Critical"),
    ("dr", "Disaster Recovery"),
    ("ss", "Support Systems"),
    ("pc", "proof of concept"),
    ("td", "Test & Development"),
];

pub const SERVER_CLASS: &str = "Server";
pub const OPERATIONAL: &str = "Operational";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentState {
    Production,
    #[serde(rename = "Test/QA")]
    TestQa,
}

impl DeploymentState {
    pub fn from_name_tag(nametag: &str) -> Self {
        let lower = nametag.to_lowercase();
        if PRODUCTION_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            DeploymentState::Production
        } else {
            DeploymentState::TestQa
        }
    }
}

/// Criticality label for a name tag, empty when no prefix matches
pub fn criticality(nametag: &str) -> &'static str {
    let lower = nametag.to_lowercase();
    CRITICALITY_TIERS
        .iter()
        .find(|(prefix, _)| lower.starts_with(prefix))
        .map(|(_, label)| *label)
        .unwrap_or("")
}

/// Body of a `Create` or `Update` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigItemPayload {
    #[serde(rename = "AccessToken")]
    pub access_token: Option<String>,
    #[serde(rename = "ConfigItem")]
    pub config_item: ConfigItem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigItem {
    pub class: String,
    pub name: Option<String>,
    pub depl_state: DeploymentState,
    pub inci_state: String,
    #[serde(rename = "CIXMLData")]
    pub data: CiData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiData {
    #[serde(rename = "SerialNumber")]
    pub serial_number: String,
    #[serde(rename = "FQDN")]
    pub fqdn: Option<String>,
    #[serde(rename = "Criticality")]
    pub criticality: String,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "CPU")]
    pub cpu: i32,
    #[serde(rename = "OperatingSystem")]
    pub operating_system: String,
    #[serde(rename = "BackupIsActive")]
    pub backup_is_active: String,
    #[serde(rename = "Memory")]
    pub memory: Decimal,
    #[serde(rename = "IP")]
    pub ip: Option<String>,
    #[serde(rename = "Note")]
    pub note: Option<String>,
    #[serde(rename = "Location")]
    pub location: Option<String>,
    /// `Disk::1`, `Disk::2`, ... as `<volumeId>:<size>`
    #[serde(flatten)]
    pub disks: BTreeMap<String, String>,
}

impl ConfigItemPayload {
    pub fn from_snapshot(record: &EnrichedSnapshotRecord, access_token: Option<String>) -> Self {
        let nametag = record.nametag.clone().unwrap_or_default();

        let disks = record
            .disks
            .iter()
            .enumerate()
            .map(|(i, volume)| {
                let size = volume.size.map(|s| s.to_string()).unwrap_or_default();
                (format!("Disk::{}", i + 1), format!("{}:{}", volume.volume_id, size))
            })
            .collect();

        Self {
            access_token,
            config_item: ConfigItem {
                class: SERVER_CLASS.to_string(),
                name: record.nametag.clone(),
                depl_state: DeploymentState::from_name_tag(&nametag),
                inci_state: OPERATIONAL.to_string(),
                data: CiData {
                    serial_number: record.resource_id.clone(),
                    fqdn: record.fqdn.clone(),
                    criticality: criticality(&nametag).to_string(),
                    kind: "Virtual".to_string(),
                    cpu: record.cpu,
                    operating_system: record.platform_name.clone(),
                    backup_is_active: "No".to_string(),
                    memory: record.memory,
                    ip: record.private_ip_address.clone(),
                    note: record.state_name.clone(),
                    location: record.availability_zone.clone(),
                    disks,
                },
            },
        }
    }
}

/// Body of a `Search` call for one server by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(rename = "ConfigItem")]
    pub config_item: SearchCriteria,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchCriteria {
    pub access_token: Option<String>,
    pub class: String,
    pub name: String,
    pub inci_state: String,
}

impl SearchRequest {
    pub fn by_name(name: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            config_item: SearchCriteria {
                access_token,
                class: SERVER_CLASS.to_string(),
                name: name.into(),
                inci_state: OPERATIONAL.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VolumeRecord;
    use crate::testing::snapshot;
    use std::str::FromStr;

    #[test]
    fn test_deployment_state_prefixes() {
        assert_eq!(DeploymentState::from_name_tag("PRD-web01"), DeploymentState::Production);
        assert_eq!(DeploymentState::from_name_tag("mc-core"), DeploymentState::Production);
        assert_eq!(DeploymentState::from_name_tag("ss-backup"), DeploymentState::Production);
        assert_eq!(DeploymentState::from_name_tag("dev-web01"), DeploymentState::TestQa);
        assert_eq!(DeploymentState::from_name_tag(""), DeploymentState::TestQa);
    }

    #[test]
    fn test_criticality_first_match() {
        assert_eq!(criticality("mc-ledger"), "Mission Critical");
        assert_eq!(criticality("DR-site"), "Disaster Recovery");
        assert_eq!(criticality("td-sandbox"), "Test & Development");
        assert_eq!(criticality("prd-web"), "");
    }

    #[test]
    fn test_payload_from_snapshot() {
        let mut record = snapshot("2024-05-01", "i-0abc", Some("mc-ledger01"));
        record.fqdn = Some("ledger01.example.org".to_string());
        record.disks.push(VolumeRecord {
            volume_id: "vol-2".to_string(),
            volume_type: Some("gp3".to_string()),
            size: Some(Decimal::from_str("4500.0").unwrap()),
            iops: Some(Decimal::from_str("9000.0").unwrap()),
        });

        let payload = ConfigItemPayload::from_snapshot(&record, Some("tok".to_string()));
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["AccessToken"], "tok");
        let item = &json["ConfigItem"];
        assert_eq!(item["Class"], "Server");
        assert_eq!(item["Name"], "mc-ledger01");
        assert_eq!(item["DeplState"], "Production");
        assert_eq!(item["InciState"], "Operational");
        let data = &item["CIXMLData"];
        assert_eq!(data["SerialNumber"], "i-0abc");
        assert_eq!(data["Criticality"], "Mission Critical");
        assert_eq!(data["Type"], "Virtual");
        assert_eq!(data["BackupIsActive"], "No");
        assert_eq!(data["Memory"], "1.0");
        assert_eq!(data["Note"], "running");
        assert_eq!(data["Disk::1"], "vol-1:8.0");
        assert_eq!(data["Disk::2"], "vol-2:4500.0");
    }

    #[test]
    fn test_untagged_snapshot_is_test_qa() {
        let payload = ConfigItemPayload::from_snapshot(&snapshot("2024-05-01", "i-1", None), None);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["ConfigItem"]["DeplState"], "Test/QA");
        assert!(json["ConfigItem"]["Name"].is_null());
        assert_eq!(json["ConfigItem"]["CIXMLData"]["Criticality"], "");
    }

    #[test]
    fn test_search_request_shape() {
        let json = serde_json::to_value(SearchRequest::by_name("prd-web01", None)).unwrap();
        assert_eq!(json["ConfigItem"]["Class"], "Server");
        assert_eq!(json["ConfigItem"]["Name"], "prd-web01");
        assert_eq!(json["ConfigItem"]["InciState"], "Operational");
    }
}
