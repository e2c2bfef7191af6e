//! EC2 reconciler - daily inventory snapshot job
//!
//! Queries the organisation's Config aggregator for every EC2 instance,
//! enriches each one and writes a dated snapshot to DynamoDB. Prints the
//! run outcome as JSON on stdout.

use anyhow::{Context, Result};
use inventory_lib::{
    capability::{Ec2InstanceTypeCatalog, InstanceCapabilityLookup},
    credentials::ClientFactory,
    enrich::{EnrichOptions, IndexLookups, InventoryEnricher},
    index::{ConfigAggregatorIndex, ResourceIndexQuery},
    notify::SesNotifier,
    run::{NotificationSettings, ReconciliationRunBuilder},
    store::{DynamoSnapshotStore, InMemorySnapshotStore, SnapshotStore},
    RunMetrics,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let config = config::ReconcilerConfig::load()?;
    let recorded_date = config.recorded_date().format("%Y-%m-%d").to_string();
    info!(
        recorded_date = %recorded_date,
        table = %config.table_name,
        aggregator = %config.aggregator_name,
        dry_run = config.dry_run,
        "Reconciler configured"
    );

    let region = config.region.as_deref();
    let local = ClientFactory::from_env(region).await;
    let delegated = match &config.index_role_arn {
        Some(role_arn) => ClientFactory::assume_role(role_arn, &config.role_session_name, region).await,
        None => local.clone(),
    };

    let query = ResourceIndexQuery::new(
        Arc::new(ConfigAggregatorIndex::new(delegated.config_client())),
        config.aggregator_name.clone(),
    )
    .with_page_size(config.page_size)
    .with_call_timeout(Duration::from_secs(config.query_timeout_secs));

    let capabilities =
        InstanceCapabilityLookup::new(Arc::new(Ec2InstanceTypeCatalog::new(delegated.ec2_client())));

    let enricher = InventoryEnricher::new(Arc::new(IndexLookups::new(query.clone()))).with_options(
        EnrichOptions {
            capture_windows_updates: config.capture_windows_updates,
        },
    );

    let store: Arc<dyn SnapshotStore> = if config.dry_run {
        Arc::new(InMemorySnapshotStore::new())
    } else {
        Arc::new(DynamoSnapshotStore::new(
            local.dynamodb_client(),
            config.table_name.clone(),
        ))
    };

    let mut builder = ReconciliationRunBuilder::new()
        .query(query)
        .capabilities(capabilities)
        .enricher(enricher)
        .store(store)
        .concurrency(config.concurrency)
        .record_timeout(Duration::from_secs(config.record_timeout_secs))
        .notification(NotificationSettings {
            from: config.notify_from.clone().unwrap_or_default(),
            to: config.notify_to.clone(),
            table_name: config.table_name.clone(),
            header: config.report_header.clone(),
        });

    match &config.notify_from {
        Some(_) if !config.dry_run => {
            builder = builder.notifier(Arc::new(SesNotifier::new(local.ses_client())));
        }
        _ => info!("Failure notifications disabled"),
    }

    let run = builder.build()?;
    let summary = run
        .execute(&recorded_date)
        .await
        .context("Reconciliation run aborted")?;

    println!("{}", serde_json::to_string(&summary.outcome())?);

    if let Some(path) = &config.metrics_textfile {
        if let Err(e) = RunMetrics::new().write_textfile(path) {
            warn!(path = %path.display(), error = %e, "Failed to write metrics textfile");
        }
    }

    Ok(())
}
