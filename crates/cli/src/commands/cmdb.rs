//! CMDB export and push commands

use anyhow::{Context, Result};
use inventory_lib::cmdb::{CmdbClient, ConfigItemPayload};
use inventory_lib::store::{SnapshotFilter, SnapshotStore};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tabled::Tabled;

use super::StoreTarget;
use crate::output::{print_error, print_info, print_success, print_table, OutputFormat};

/// Row for push results table
#[derive(Tabled, Serialize)]
struct PushRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Resource")]
    resource_id: String,
    #[tabled(rename = "Result")]
    result: String,
}

/// Where to find the CMDB and how to authenticate
#[derive(Debug, Clone)]
pub struct CmdbTarget {
    pub url: String,
    pub credentials: PathBuf,
}

async fn tagged_payloads(
    target: &StoreTarget,
    date: &str,
    nametag: Option<String>,
    access_token: Option<String>,
) -> Result<Vec<ConfigItemPayload>> {
    let store = target.connect().await;
    let filter = SnapshotFilter {
        recorded_date: Some(date.to_string()),
        nametag,
    };
    let records = store.scan(&filter).await?;

    Ok(records
        .iter()
        .filter(|record| record.usable_name_tag().is_some())
        .map(|record| ConfigItemPayload::from_snapshot(record, access_token.clone()))
        .collect())
}

/// Write CMDB payloads for one date as JSON
pub async fn export(
    target: &StoreTarget,
    date: &str,
    nametag: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let payloads = tagged_payloads(target, date, nametag, None).await?;
    let json = serde_json::to_string_pretty(&payloads)?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!(
                "Exported {} configuration item(s) to {}",
                payloads.len(),
                path.display()
            ));
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Read the CMDB service credentials (a flat JSON object)
pub fn read_credentials(path: &Path) -> Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read credentials from {}", path.display()))?;
    let value: Value = serde_json::from_str(&content).context("Credentials file is not JSON")?;

    match value {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("Credentials file must contain a JSON object"),
    }
}

/// Send every tagged snapshot of one date to the CMDB
pub async fn push(
    target: &StoreTarget,
    cmdb: &CmdbTarget,
    date: &str,
    nametag: Option<String>,
    create: bool,
    format: OutputFormat,
) -> Result<()> {
    let client = CmdbClient::new(&cmdb.url, read_credentials(&cmdb.credentials)?)?;
    let token = client.access_token().await.context("CMDB authentication failed")?;
    print_info("Authenticated with CMDB");

    let payloads = tagged_payloads(target, date, nametag, Some(token)).await?;
    let mut rows = Vec::with_capacity(payloads.len());
    let mut failed = 0usize;

    for payload in &payloads {
        let result = if create {
            client.create(payload).await
        } else {
            client.update(payload).await
        };

        let outcome = match result {
            Ok(_) => "ok".to_string(),
            Err(e) => {
                failed += 1;
                e.to_string()
            }
        };
        rows.push(PushRow {
            name: payload.config_item.name.clone().unwrap_or_default(),
            resource_id: payload.config_item.data.serial_number.clone(),
            result: outcome,
        });
    }

    print_table(&rows, format);
    if failed > 0 {
        print_error(&format!("{} of {} item(s) failed", failed, rows.len()));
        anyhow::bail!("CMDB push incomplete");
    }
    print_success(&format!("Pushed {} configuration item(s)", rows.len()));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmdb.json");
        std::fs::write(&path, r#"{"UserLogin": "svc", "Password": "pw"}"#).unwrap();

        let credentials = read_credentials(&path).unwrap();
        assert_eq!(credentials["UserLogin"], "svc");
    }

    #[test]
    fn test_read_credentials_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmdb.json");
        std::fs::write(&path, r#"["svc", "pw"]"#).unwrap();

        assert!(read_credentials(&path).is_err());
    }
}
