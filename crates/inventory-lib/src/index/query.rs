//! Query templates for the Config advanced-query language

use crate::error::IndexError;

/// All EC2 instances with the fields needed for a snapshot
pub const EC2_INSTANCES_QUERY: &str = "SELECT \
    resourceId, \
    arn, \
    availabilityZone, \
    accountId, \
    configuration.state.name, \
    configuration.instanceType, \
    configuration.networkInterfaces.networkInterfaceId, \
    configuration.networkInterfaces, \
    resourceCreationTime, \
    tags.value, \
    tags \
    WHERE resourceType = 'AWS::EC2::Instance'";

/// SSM managed-instance inventory item for one instance
pub fn os_inventory_query(resource_id: &str) -> Result<String, IndexError> {
    let id = literal(resource_id)?;
    Ok(format!(
        "SELECT resourceId, configuration \
         WHERE resourceType = 'AWS::SSM::ManagedInstanceInventory' \
         AND resourceId = '{id}'"
    ))
}

/// EBS volumes attached to one instance
pub fn volume_query(resource_id: &str) -> Result<String, IndexError> {
    let id = literal(resource_id)?;
    Ok(format!(
        "SELECT resourceId, configuration.volumeType, configuration.size, configuration.iops \
         WHERE resourceType = 'AWS::EC2::Volume' \
         AND configuration.attachments.instanceId = '{id}'"
    ))
}

/// The query language has no bind parameters, so identifiers are restricted
/// to the characters AWS resource ids can contain.
fn literal(value: &str) -> Result<&str, IndexError> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));

    if valid {
        Ok(value)
    } else {
        Err(IndexError::InvalidParameter(value.to_string()))
    }
}
