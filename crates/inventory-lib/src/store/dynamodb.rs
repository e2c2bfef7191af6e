//! DynamoDB backed snapshot store
//!
//! The table is keyed on `resourceid` (partition) and `recorded_date`
//! (sort), so `PutItem` gives last-write-wins per day. Numeric fields are
//! written as `N` values from their decimal text and read back the same way.

use super::{SnapshotFilter, SnapshotStore};
use crate::capability::gib_scale;
use crate::error::StoreError;
use crate::models::{EnrichedSnapshotRecord, Tag, VolumeRecord};
use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

/// Default snapshot table
pub const DEFAULT_TABLE_NAME: &str = "ec2_inventory_history";

type Item = HashMap<String, AttributeValue>;

#[derive(Debug, Clone)]
pub struct DynamoSnapshotStore {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
}

impl DynamoSnapshotStore {
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl SnapshotStore for DynamoSnapshotStore {
    async fn insert(&self, record: &EnrichedSnapshotRecord) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(to_item(record)))
            .send()
            .await
            .map_err(|e| StoreError::Rejected(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn scan(&self, filter: &SnapshotFilter) -> Result<Vec<EnrichedSnapshotRecord>, StoreError> {
        let (expression, values) = filter_expression(filter);
        let mut records = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_filter_expression(expression.clone())
                .set_expression_attribute_values(values.clone())
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| StoreError::Rejected(DisplayErrorContext(&e).to_string()))?;

            for item in output.items() {
                records.push(from_item(item)?);
            }

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        debug!(
            table = %self.table_name,
            rows = records.len(),
            "Snapshot scan complete"
        );
        Ok(records)
    }
}

fn filter_expression(filter: &SnapshotFilter) -> (Option<String>, Option<Item>) {
    let mut clauses = Vec::new();
    let mut values = Item::new();

    if let Some(date) = &filter.recorded_date {
        clauses.push("recorded_date = :recorded_date");
        values.insert(":recorded_date".to_string(), AttributeValue::S(date.clone()));
    }
    if let Some(tag) = &filter.nametag {
        clauses.push("nametag = :nametag");
        values.insert(":nametag".to_string(), AttributeValue::S(tag.clone()));
    }

    if clauses.is_empty() {
        (None, None)
    } else {
        (Some(clauses.join(" AND ")), Some(values))
    }
}

/// Map a snapshot to its DynamoDB item
pub fn to_item(record: &EnrichedSnapshotRecord) -> Item {
    let mut item = Item::new();
    item.insert("recorded_date".into(), s(&record.recorded_date));
    item.insert("resourceid".into(), s(&record.resource_id));
    item.insert("arn".into(), opt_s(&record.arn));
    item.insert("availabilityZone".into(), opt_s(&record.availability_zone));
    item.insert("accountId".into(), opt_s(&record.account_id));
    item.insert("stateName".into(), opt_s(&record.state_name));
    item.insert("instanceType".into(), s(&record.instance_type));
    item.insert(
        "resourceCreationTime".into(),
        opt_s(&record.resource_creation_time),
    );
    item.insert("privateIpAddress".into(), opt_s(&record.private_ip_address));
    item.insert("publicIpAddress".into(), opt_s(&record.public_ip_address));
    item.insert("cpu".into(), AttributeValue::N(record.cpu.to_string()));
    item.insert("memory".into(), n(&record.memory));
    item.insert(
        "tags".into(),
        AttributeValue::L(
            record
                .tags
                .iter()
                .map(|tag| {
                    AttributeValue::M(HashMap::from([
                        ("key".to_string(), s(&tag.key)),
                        ("value".to_string(), s(&tag.value)),
                    ]))
                })
                .collect(),
        ),
    );
    item.insert("PlatformName".into(), s(&record.platform_name));
    item.insert("FQDN".into(), opt_s(&record.fqdn));
    item.insert(
        "disk".into(),
        AttributeValue::L(record.disks.iter().map(volume_to_attribute).collect()),
    );
    item.insert("nametag".into(), opt_s(&record.nametag));
    if let Some(count) = record.windows_update_count {
        item.insert(
            "windowsUpdateCount".into(),
            AttributeValue::N(count.to_string()),
        );
    }
    item
}

/// Map a DynamoDB item back to a snapshot
pub fn from_item(item: &Item) -> Result<EnrichedSnapshotRecord, StoreError> {
    Ok(EnrichedSnapshotRecord {
        recorded_date: required_s(item, "recorded_date")?,
        resource_id: required_s(item, "resourceid")?,
        arn: optional_s(item, "arn")?,
        availability_zone: optional_s(item, "availabilityZone")?,
        account_id: optional_s(item, "accountId")?,
        state_name: optional_s(item, "stateName")?,
        instance_type: required_s(item, "instanceType")?,
        resource_creation_time: optional_s(item, "resourceCreationTime")?,
        private_ip_address: optional_s(item, "privateIpAddress")?,
        public_ip_address: optional_s(item, "publicIpAddress")?,
        cpu: required_n::<i32>(item, "cpu")?,
        // DynamoDB normalises numbers, so 16.0 comes back as 16
        memory: gib_scale(required_decimal(item, "memory")?),
        tags: list(item, "tags")?
            .iter()
            .map(tag_from_attribute)
            .collect::<Result<_, _>>()?,
        platform_name: required_s(item, "PlatformName")?,
        fqdn: optional_s(item, "FQDN")?,
        disks: list(item, "disk")?
            .iter()
            .map(volume_from_attribute)
            .collect::<Result<_, _>>()?,
        nametag: optional_s(item, "nametag")?,
        windows_update_count: match item.get("windowsUpdateCount") {
            Some(_) => Some(required_n::<u32>(item, "windowsUpdateCount")?),
            None => None,
        },
    })
}

fn volume_to_attribute(volume: &VolumeRecord) -> AttributeValue {
    let mut configuration = Item::new();
    configuration.insert("volumeType".into(), opt_s(&volume.volume_type));
    configuration.insert("size".into(), opt_n(&volume.size));
    configuration.insert("iops".into(), opt_n(&volume.iops));

    AttributeValue::M(HashMap::from([
        ("resourceId".to_string(), s(&volume.volume_id)),
        ("configuration".to_string(), AttributeValue::M(configuration)),
    ]))
}

fn volume_from_attribute(value: &AttributeValue) -> Result<VolumeRecord, StoreError> {
    let map = value
        .as_m()
        .map_err(|_| StoreError::Decode("disk entry is not a map".to_string()))?;
    let empty = Item::new();
    let configuration = match map.get("configuration") {
        Some(value) => value
            .as_m()
            .map_err(|_| StoreError::Decode("disk configuration is not a map".to_string()))?,
        None => &empty,
    };

    Ok(VolumeRecord {
        volume_id: required_s(map, "resourceId")?,
        volume_type: optional_s(configuration, "volumeType")?,
        size: optional_decimal(configuration, "size")?,
        iops: optional_decimal(configuration, "iops")?,
    })
}

fn tag_from_attribute(value: &AttributeValue) -> Result<Tag, StoreError> {
    let map = value
        .as_m()
        .map_err(|_| StoreError::Decode("tag is not a map".to_string()))?;
    Ok(Tag {
        key: required_s(map, "key")?,
        value: optional_s(map, "value")?.unwrap_or_default(),
    })
}

fn s(value: &str) -> AttributeValue {
    AttributeValue::S(value.to_string())
}

fn opt_s(value: &Option<String>) -> AttributeValue {
    match value {
        Some(text) => AttributeValue::S(text.clone()),
        None => AttributeValue::Null(true),
    }
}

fn n(value: &Decimal) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

fn opt_n(value: &Option<Decimal>) -> AttributeValue {
    match value {
        Some(number) => n(number),
        None => AttributeValue::Null(true),
    }
}

fn optional_s(item: &Item, key: &str) -> Result<Option<String>, StoreError> {
    match item.get(key) {
        None | Some(AttributeValue::Null(_)) => Ok(None),
        Some(AttributeValue::S(text)) => Ok(Some(text.clone())),
        Some(other) => Err(StoreError::Decode(format!(
            "{key} should be a string, found {other:?}"
        ))),
    }
}

fn required_s(item: &Item, key: &str) -> Result<String, StoreError> {
    optional_s(item, key)?.ok_or_else(|| StoreError::Decode(format!("{key} is missing")))
}

fn optional_decimal(item: &Item, key: &str) -> Result<Option<Decimal>, StoreError> {
    match item.get(key) {
        None | Some(AttributeValue::Null(_)) => Ok(None),
        Some(AttributeValue::N(text)) | Some(AttributeValue::S(text)) => Decimal::from_str(text)
            .map(Some)
            .map_err(|e| StoreError::Decode(format!("{key}: {e}"))),
        Some(other) => Err(StoreError::Decode(format!(
            "{key} should be a number, found {other:?}"
        ))),
    }
}

fn required_decimal(item: &Item, key: &str) -> Result<Decimal, StoreError> {
    optional_decimal(item, key)?.ok_or_else(|| StoreError::Decode(format!("{key} is missing")))
}

fn required_n<T: FromStr>(item: &Item, key: &str) -> Result<T, StoreError> {
    match item.get(key) {
        Some(AttributeValue::N(text)) => text
            .parse()
            .map_err(|_| StoreError::Decode(format!("{key} is not an integer: {text}"))),
        _ => Err(StoreError::Decode(format!("{key} is missing or not a number"))),
    }
}

fn list<'a>(item: &'a Item, key: &str) -> Result<&'a [AttributeValue], StoreError> {
    match item.get(key) {
        None | Some(AttributeValue::Null(_)) => Ok(&[]),
        Some(AttributeValue::L(values)) => Ok(values.as_slice()),
        Some(other) => Err(StoreError::Decode(format!(
            "{key} should be a list, found {other:?}"
        ))),
    }
}
