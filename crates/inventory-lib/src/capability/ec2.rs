//! EC2 `DescribeInstanceTypes` backed catalog

use super::{decimal_from_f64, memory_gib, CapabilityPage, InstanceTypeCatalog};
use crate::error::CapabilityError;
use crate::models::CapabilityRecord;
use async_trait::async_trait;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::{InstanceType, InstanceTypeInfo};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Ec2InstanceTypeCatalog {
    client: aws_sdk_ec2::Client,
}

impl Ec2InstanceTypeCatalog {
    pub fn new(client: aws_sdk_ec2::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl InstanceTypeCatalog for Ec2InstanceTypeCatalog {
    async fn describe_page(
        &self,
        instance_types: &[String],
        next_token: Option<String>,
    ) -> Result<CapabilityPage, CapabilityError> {
        let filter: Vec<InstanceType> = instance_types
            .iter()
            .map(|t| InstanceType::from(t.as_str()))
            .collect();

        let output = self
            .client
            .describe_instance_types()
            .set_instance_types(Some(filter))
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| CapabilityError::Transport(DisplayErrorContext(&e).to_string()))?;

        let records = output
            .instance_types()
            .iter()
            .filter_map(capability_from_info)
            .collect();

        Ok(CapabilityPage {
            records,
            next_token: output.next_token().map(str::to_string),
        })
    }
}

/// Entries without vCPU or memory data are dropped rather than defaulted
fn capability_from_info(info: &InstanceTypeInfo) -> Option<CapabilityRecord> {
    let instance_type = info.instance_type()?.as_str().to_string();

    let vcpus = info.v_cpu_info().and_then(|v| v.default_v_cpus());
    let memory_mib = info.memory_info().and_then(|m| m.size_in_mib());
    let (Some(vcpus), Some(memory_mib)) = (vcpus, memory_mib) else {
        warn!(
            instance_type = %instance_type,
            "Instance type is missing vCPU or memory information"
        );
        return None;
    };

    let gpus = info
        .gpu_info()
        .map(|g| g.gpus().iter().filter_map(|d| d.count()).sum())
        .unwrap_or(0);

    let sustained_clock_speed_ghz = info
        .processor_info()
        .and_then(|p| p.sustained_clock_speed_in_ghz())
        .and_then(decimal_from_f64);

    Some(CapabilityRecord {
        instance_type,
        vcpus,
        gpus,
        memory_mib,
        memory_gib: memory_gib(memory_mib),
        sustained_clock_speed_ghz,
    })
}
