//! Parsers for the JSON rows returned by the resource index

use super::decimal::{coerce_floats, decimal_from_value};
use crate::error::EnrichError;
use crate::models::{RawResourceRecord, Tag, VolumeRecord, UNKNOWN_PLATFORM};
use serde_json::Value;

/// FQDN recorded when an inventory entry exists without a computer name
pub const FQDN_NOT_REPORTED: &str = "none";

const INSTANCE_INFORMATION: &str = "AWS:InstanceInformation";
const WINDOWS_UPDATE: &str = "AWS:WindowsUpdate";

/// Parse one base-query row into a raw record
pub fn parse_raw_record(blob: &str) -> Result<RawResourceRecord, EnrichError> {
    let value = parse_row(blob)?;

    let resource_id = text_at(&value, "/resourceId")
        .filter(|id| !id.is_empty())
        .ok_or(EnrichError::MissingResourceId)?;

    let interface = value.pointer("/configuration/networkInterfaces/0");
    let private_ip_address = interface.and_then(|i| text_at(i, "/privateIpAddress"));
    let public_ip_address = interface.and_then(|i| {
        text_at(i, "/publicIpAddress").or_else(|| text_at(i, "/association/publicIp"))
    });

    let tags = value
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|tag| {
                    Some(Tag {
                        key: text_at(tag, "/key")?,
                        value: text_at(tag, "/value").unwrap_or_default(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(RawResourceRecord {
        resource_id,
        arn: text_at(&value, "/arn"),
        availability_zone: text_at(&value, "/availabilityZone"),
        account_id: text_at(&value, "/accountId"),
        state_name: text_at(&value, "/configuration/state/name"),
        instance_type: text_at(&value, "/configuration/instanceType"),
        resource_creation_time: text_at(&value, "/resourceCreationTime"),
        private_ip_address,
        public_ip_address,
        tags,
    })
}

/// What the OS inventory says about one instance
#[derive(Debug, Clone, PartialEq)]
pub struct OsInventory {
    pub platform_name: String,
    pub fqdn: Option<String>,
    /// Entries in the Windows update block, read only for Windows platforms
    pub windows_update_count: Option<u32>,
}

impl Default for OsInventory {
    fn default() -> Self {
        Self {
            platform_name: UNKNOWN_PLATFORM.to_string(),
            fqdn: None,
            windows_update_count: None,
        }
    }
}

/// Parse an OS inventory row for `resource_id`
pub fn parse_os_inventory(resource_id: &str, row: &str) -> Result<OsInventory, EnrichError> {
    let value = parse_row(row)?;
    let configuration = value
        .get("configuration")
        .filter(|c| c.is_object())
        .ok_or_else(|| EnrichError::MalformedPayload {
            source_name: "OS inventory",
            resource_id: resource_id.to_string(),
            detail: "configuration is missing or not an object".to_string(),
        })?;

    let Some(entry) = configuration
        .get(INSTANCE_INFORMATION)
        .and_then(|info| info.get("Content"))
        .and_then(|content| content.get(resource_id))
    else {
        return Ok(OsInventory::default());
    };

    let platform_name =
        text_at(entry, "/PlatformName").unwrap_or_else(|| UNKNOWN_PLATFORM.to_string());
    let fqdn = text_at(entry, "/ComputerName").unwrap_or_else(|| FQDN_NOT_REPORTED.to_string());

    let windows_update_count = if platform_name.to_lowercase().contains("windows") {
        configuration
            .get(WINDOWS_UPDATE)
            .and_then(|update| update.get("Content"))
            .and_then(|content| match content {
                Value::Object(map) => Some(map.len()),
                Value::Array(list) => Some(list.len()),
                _ => None,
            })
            .map(|count| count as u32)
    } else {
        None
    };

    Ok(OsInventory {
        platform_name,
        fqdn: Some(fqdn),
        windows_update_count,
    })
}

/// Parse a volume row attached to `resource_id`
pub fn parse_volume(resource_id: &str, row: &str) -> Result<VolumeRecord, EnrichError> {
    let value = parse_row(row)?;
    let volume_id = text_at(&value, "/resourceId").ok_or_else(|| EnrichError::MalformedPayload {
        source_name: "volume",
        resource_id: resource_id.to_string(),
        detail: "volume row has no resourceId".to_string(),
    })?;

    Ok(VolumeRecord {
        volume_id,
        volume_type: text_at(&value, "/configuration/volumeType"),
        size: value
            .pointer("/configuration/size")
            .and_then(decimal_from_value),
        iops: value
            .pointer("/configuration/iops")
            .and_then(decimal_from_value),
    })
}

fn parse_row(row: &str) -> Result<Value, EnrichError> {
    let mut value: Value = serde_json::from_str(row)?;
    coerce_floats(&mut value);
    Ok(value)
}

fn text_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
