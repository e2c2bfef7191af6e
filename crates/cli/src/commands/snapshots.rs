//! Snapshot listing

use anyhow::Result;
use inventory_lib::store::{SnapshotFilter, SnapshotStore};
use inventory_lib::EnrichedSnapshotRecord;
use serde::Serialize;
use tabled::Tabled;

use super::StoreTarget;
use crate::output::{color_state, or_dash, print_info, print_table, OutputFormat};

/// Row for snapshot table
#[derive(Tabled, Serialize)]
struct SnapshotRow {
    #[tabled(rename = "Resource")]
    resource_id: String,
    #[tabled(rename = "Name")]
    nametag: String,
    #[tabled(rename = "Type")]
    instance_type: String,
    #[tabled(rename = "vCPU")]
    cpu: i32,
    #[tabled(rename = "Memory (GiB)")]
    memory: String,
    #[tabled(rename = "Platform")]
    platform: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Zone")]
    zone: String,
    #[tabled(rename = "Disks")]
    disks: usize,
}

impl From<&EnrichedSnapshotRecord> for SnapshotRow {
    fn from(record: &EnrichedSnapshotRecord) -> Self {
        Self {
            resource_id: record.resource_id.clone(),
            nametag: or_dash(record.nametag.as_deref()),
            instance_type: record.instance_type.clone(),
            cpu: record.cpu,
            memory: record.memory.to_string(),
            platform: record.platform_name.clone(),
            state: color_state(record.state_name.as_deref().unwrap_or("-")),
            zone: or_dash(record.availability_zone.as_deref()),
            disks: record.disks.len(),
        }
    }
}

/// List the snapshots stored for one date
pub async fn list_snapshots(
    target: &StoreTarget,
    date: &str,
    nametag: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let store = target.connect().await;
    let filter = SnapshotFilter {
        recorded_date: Some(date.to_string()),
        nametag,
    };

    let mut records = store.scan(&filter).await?;
    records.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        OutputFormat::Table => {
            let rows: Vec<SnapshotRow> = records.iter().map(SnapshotRow::from).collect();
            print_table(&rows, format);
            print_info(&format!("{} snapshot(s) in {} for {}", rows.len(), target.table, date));
        }
    }

    Ok(())
}
