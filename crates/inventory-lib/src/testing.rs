//! Shared fakes for unit tests

use crate::capability::{memory_gib, CapabilityPage, InstanceTypeCatalog};
use crate::error::{CapabilityError, IndexError};
use crate::index::{QueryPage, ResourceIndex, EC2_INSTANCES_QUERY};
use crate::models::{CapabilityRecord, EnrichedSnapshotRecord, Tag, VolumeRecord};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory resource index keyed by query kind and resource id
#[derive(Default)]
pub struct StaticIndex {
    pub instances: Vec<String>,
    pub os_rows: HashMap<String, Vec<String>>,
    pub volume_rows: HashMap<String, Vec<String>>,
    pub fail_base_query: bool,
    pub fail_lookups_for: HashSet<String>,
    pub sub_queries: AtomicUsize,
}

impl StaticIndex {
    pub fn with_instances(instances: Vec<String>) -> Self {
        Self {
            instances,
            ..Default::default()
        }
    }

    pub fn sub_query_count(&self) -> usize {
        self.sub_queries.load(Ordering::SeqCst)
    }

    fn rows_for(
        &self,
        rows: &HashMap<String, Vec<String>>,
        expression: &str,
    ) -> Result<Vec<String>, IndexError> {
        self.sub_queries.fetch_add(1, Ordering::SeqCst);
        let id = expression
            .rsplit('\'')
            .nth(1)
            .unwrap_or_default()
            .to_string();
        if self.fail_lookups_for.contains(&id) {
            return Err(IndexError::Transport(format!("lookup refused for {id}")));
        }
        Ok(rows.get(&id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ResourceIndex for StaticIndex {
    async fn select_page(
        &self,
        expression: &str,
        _aggregator: &str,
        _limit: i32,
        _next_token: Option<String>,
    ) -> Result<QueryPage, IndexError> {
        let results = if expression == EC2_INSTANCES_QUERY {
            if self.fail_base_query {
                return Err(IndexError::Transport("access denied".to_string()));
            }
            self.instances.clone()
        } else if expression.contains("AWS::SSM::ManagedInstanceInventory") {
            self.rows_for(&self.os_rows, expression)?
        } else if expression.contains("AWS::EC2::Volume") {
            self.rows_for(&self.volume_rows, expression)?
        } else {
            Vec::new()
        };

        Ok(QueryPage {
            results,
            next_token: None,
        })
    }
}

/// Catalog backed by a fixed list of records
#[derive(Default)]
pub struct StaticCatalog {
    pub records: Vec<CapabilityRecord>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl StaticCatalog {
    pub fn new(records: Vec<CapabilityRecord>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }
}

#[async_trait]
impl InstanceTypeCatalog for StaticCatalog {
    async fn describe_page(
        &self,
        instance_types: &[String],
        _next_token: Option<String>,
    ) -> Result<CapabilityPage, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CapabilityError::Transport("throttled".to_string()));
        }
        Ok(CapabilityPage {
            records: self
                .records
                .iter()
                .filter(|r| instance_types.contains(&r.instance_type))
                .cloned()
                .collect(),
            next_token: None,
        })
    }
}

pub fn capability(instance_type: &str, vcpus: i32, memory_mib: i64) -> CapabilityRecord {
    CapabilityRecord {
        instance_type: instance_type.to_string(),
        vcpus,
        gpus: 0,
        memory_mib,
        memory_gib: memory_gib(memory_mib),
        sustained_clock_speed_ghz: None,
    }
}

/// Base-query row for an instance with one network interface
pub fn instance_blob(resource_id: &str, instance_type: &str, name: Option<&str>) -> String {
    let tags: Vec<_> = name
        .map(|n| json!({"key": "Name", "value": n}))
        .into_iter()
        .collect();

    json!({
        "resourceId": resource_id,
        "arn": format!("arn:aws:ec2:us-east-1:111122223333:instance/{resource_id}"),
        "availabilityZone": "us-east-1a",
        "accountId": "111122223333",
        "resourceCreationTime": "2024-03-01T10:00:00.000Z",
        "configuration": {
            "state": {"name": "running"},
            "instanceType": instance_type,
            "networkInterfaces": [{"privateIpAddress": "10.0.0.5"}]
        },
        "tags": tags
    })
    .to_string()
}

pub fn os_row(resource_id: &str, platform: &str, computer_name: &str) -> String {
    json!({
        "resourceId": resource_id,
        "configuration": {
            "AWS:InstanceInformation": {
                "Content": {
                    resource_id: {"PlatformName": platform, "ComputerName": computer_name}
                }
            }
        }
    })
    .to_string()
}

pub fn volume_row(volume_id: &str, size: &str) -> String {
    format!(
        r#"{{"resourceId": "{volume_id}", "configuration": {{"volumeType": "gp3", "size": {size}, "iops": 3000.0}}}}"#
    )
}

/// A fully populated snapshot row
pub fn snapshot(date: &str, id: &str, nametag: Option<&str>) -> EnrichedSnapshotRecord {
    EnrichedSnapshotRecord {
        recorded_date: date.to_string(),
        resource_id: id.to_string(),
        arn: Some(format!("arn:aws:ec2:us-east-1:1:instance/{id}")),
        availability_zone: Some("us-east-1a".to_string()),
        account_id: Some("111122223333".to_string()),
        state_name: Some("running".to_string()),
        instance_type: "t3.micro".to_string(),
        resource_creation_time: None,
        private_ip_address: Some("10.0.0.5".to_string()),
        public_ip_address: None,
        cpu: 2,
        memory: Decimal::from_str("1.0").unwrap(),
        tags: nametag
            .map(|n| Tag {
                key: "Name".to_string(),
                value: n.to_string(),
            })
            .into_iter()
            .collect(),
        platform_name: "unknown".to_string(),
        fqdn: None,
        disks: vec![VolumeRecord {
            volume_id: "vol-1".to_string(),
            volume_type: Some("gp3".to_string()),
            size: Some(Decimal::from_str("8.0").unwrap()),
            iops: None,
        }],
        nametag: nametag.map(str::to_string),
        windows_update_count: None,
    }
}
