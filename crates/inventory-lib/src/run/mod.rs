//! Reconciliation run orchestration
//!
//! One run takes the whole EC2 inventory from the resource index, resolves
//! capabilities for every instance type in a single bulk pass, then enriches
//! and stores each record on a bounded worker pool. Per-record failures are
//! collected into the run summary; only the base query and the capability
//! resolution can abort a run.

#[cfg(test)]
mod tests;

use crate::capability::{CapabilityMap, InstanceCapabilityLookup};
use crate::enrich::{parse_raw_record, InventoryEnricher};
use crate::error::{EnrichError, RunError};
use crate::index::{ResourceIndexQuery, EC2_INSTANCES_QUERY};
use crate::models::{EnrichedSnapshotRecord, FailureEntry, RawResourceRecord, RunSummary};
use crate::notify::{Notification, Notifier};
use crate::observability::{FailureReason, RunMetrics, StructuredLogger};
use crate::report::{render_failure_report, report_subject, DEFAULT_HEADER};
use crate::store::{SnapshotStore, DEFAULT_TABLE_NAME};
use anyhow::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Failure message for records without a usable `Name` tag
pub const MISSING_NAME_TAG: &str = "insert Failed due to missing name tag";

/// Resource id recorded when a raw blob cannot be parsed
pub const UNKNOWN_RESOURCE: &str = "unknown";

/// Worker pool settings
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Records enriched at the same time (default: 8)
    pub concurrency: usize,
    /// Upper bound on enriching and storing one record (default: 60 seconds)
    pub record_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            record_timeout: Duration::from_secs(60),
        }
    }
}

/// Where and how the failure report is sent
#[derive(Debug, Clone)]
pub struct NotificationSettings {
    pub from: String,
    pub to: Vec<String>,
    /// Table name shown in the subject line
    pub table_name: String,
    pub header: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            from: String::new(),
            to: Vec::new(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            header: DEFAULT_HEADER.to_string(),
        }
    }
}

/// What happened to one record
enum RecordOutcome {
    Inserted,
    Failed(FailureEntry, FailureReason),
}

/// One daily reconciliation pass
pub struct ReconciliationRun {
    query: ResourceIndexQuery,
    capabilities: InstanceCapabilityLookup,
    enricher: InventoryEnricher,
    store: Arc<dyn SnapshotStore>,
    notifier: Option<Arc<dyn Notifier>>,
    notification: NotificationSettings,
    config: RunConfig,
    logger: StructuredLogger,
    metrics: RunMetrics,
}

impl ReconciliationRun {
    /// Run the pipeline for `recorded_date` (`YYYY-MM-DD`)
    pub async fn execute(&self, recorded_date: &str) -> Result<RunSummary, RunError> {
        let started = Instant::now();
        self.logger
            .log_run_started(recorded_date, self.query.aggregator());

        let blobs = match self.query.run(EC2_INSTANCES_QUERY).await {
            Ok(blobs) => blobs,
            Err(e) => {
                self.logger.log_run_aborted(recorded_date, &e.to_string());
                return Err(e.into());
            }
        };
        self.metrics.add_processed(blobs.len());

        let mut failures: Vec<(usize, FailureEntry)> = Vec::new();
        let mut records: Vec<(usize, RawResourceRecord)> = Vec::with_capacity(blobs.len());
        for (position, blob) in blobs.iter().enumerate() {
            match parse_raw_record(blob) {
                Ok(raw) => records.push((position, raw)),
                Err(e) => {
                    let entry = FailureEntry {
                        resourceid: UNKNOWN_RESOURCE.to_string(),
                        message: e.to_string(),
                        az: None,
                        accountid: None,
                    };
                    self.record_failure(&entry, FailureReason::Parse);
                    failures.push((position, entry));
                }
            }
        }

        let instance_types: BTreeSet<&str> = records
            .iter()
            .filter_map(|(_, raw)| raw.instance_type.as_deref())
            .collect();
        self.logger
            .log_inventory_loaded(records.len(), instance_types.len());

        let capabilities = match self.capabilities.resolve(instance_types).await {
            Ok(map) => Arc::new(map),
            Err(e) => {
                self.logger.log_run_aborted(recorded_date, &e.to_string());
                return Err(e.into());
            }
        };

        let mut update_count = 0usize;
        let outcomes = self.fan_out(records, capabilities, recorded_date).await;
        for (position, outcome) in outcomes {
            match outcome {
                RecordOutcome::Inserted => {
                    self.metrics.inc_inserted();
                    update_count += 1;
                }
                RecordOutcome::Failed(entry, reason) => {
                    self.record_failure(&entry, reason);
                    failures.push((position, entry));
                }
            }
        }

        // Report rows follow index order regardless of completion order
        failures.sort_by_key(|(position, _)| *position);
        let failures: Vec<FailureEntry> = failures.into_iter().map(|(_, entry)| entry).collect();

        let summary = RunSummary {
            recorded_date: recorded_date.to_string(),
            update_count,
            error: failures.len(),
            failures,
        };

        if summary.error > 0 {
            self.notify(&summary).await;
        }

        let elapsed = started.elapsed().as_secs_f64();
        self.metrics
            .set_run_completed(elapsed, chrono::Utc::now().timestamp());
        self.logger
            .log_run_completed(recorded_date, summary.update_count, summary.error, elapsed);

        Ok(summary)
    }

    /// Enrich and store every record on the worker pool.
    ///
    /// Each task reports its own outcome; nothing is shared between tasks
    /// besides the read-only capability map.
    async fn fan_out(
        &self,
        records: Vec<(usize, RawResourceRecord)>,
        capabilities: Arc<CapabilityMap>,
        recorded_date: &str,
    ) -> Vec<(usize, RecordOutcome)> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut identities = Vec::with_capacity(records.len());
        let mut tasks = JoinSet::new();

        for (position, raw) in records {
            identities.push((position, failure_for(&raw, String::new())));

            let semaphore = semaphore.clone();
            let enricher = self.enricher.clone();
            let store = self.store.clone();
            let capabilities = capabilities.clone();
            let metrics = self.metrics.clone();
            let recorded_date = recorded_date.to_string();
            let record_timeout = self.config.record_timeout;

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        let entry = failure_for(&raw, e.to_string());
                        return (position, RecordOutcome::Failed(entry, FailureReason::Enrichment));
                    }
                };

                let started = Instant::now();
                let outcome = match tokio::time::timeout(
                    record_timeout,
                    process_record(&enricher, store.as_ref(), &raw, &capabilities, &recorded_date),
                )
                .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        let message = EnrichError::Timeout(record_timeout).to_string();
                        RecordOutcome::Failed(failure_for(&raw, message), FailureReason::Timeout)
                    }
                };
                metrics.observe_enrichment_latency(started.elapsed().as_secs_f64());

                (position, outcome)
            });
        }

        let mut outcomes = Vec::with_capacity(identities.len());
        let mut reported = BTreeSet::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, outcome)) => {
                    reported.insert(position);
                    outcomes.push((position, outcome));
                }
                Err(e) => warn!(error = %e, "Enrichment task did not complete"),
            }
        }

        // A task that panicked or was cancelled still counts against its record
        for (position, mut entry) in identities {
            if !reported.contains(&position) {
                entry.message = "enrichment task did not complete".to_string();
                outcomes.push((position, RecordOutcome::Failed(entry, FailureReason::Enrichment)));
            }
        }

        outcomes
    }

    async fn notify(&self, summary: &RunSummary) {
        let Some(notifier) = &self.notifier else {
            debug!("No notifier configured, skipping failure report");
            return;
        };
        if self.notification.to.is_empty() {
            warn!("Failure report has no recipients, skipping");
            return;
        }

        let notification = Notification {
            subject: report_subject(&self.notification.table_name, &summary.recorded_date),
            html_body: render_failure_report(summary, &self.notification.header),
            from: self.notification.from.clone(),
            to: self.notification.to.clone(),
        };

        match notifier.send(&notification).await {
            Ok(()) => self.logger.log_notification(notification.to.len(), None),
            Err(e) => self
                .logger
                .log_notification(notification.to.len(), Some(&e.to_string())),
        }
    }

    fn record_failure(&self, entry: &FailureEntry, reason: FailureReason) {
        self.metrics.inc_failure(reason);
        self.logger.log_record_failed(
            &entry.resourceid,
            reason,
            entry.az.as_deref(),
            &entry.message,
        );
    }
}

async fn process_record(
    enricher: &InventoryEnricher,
    store: &dyn SnapshotStore,
    raw: &RawResourceRecord,
    capabilities: &CapabilityMap,
    recorded_date: &str,
) -> RecordOutcome {
    let record: EnrichedSnapshotRecord = match enricher.enrich(raw, capabilities, recorded_date).await {
        Ok(record) => record,
        Err(e) => {
            return RecordOutcome::Failed(failure_for(raw, e.to_string()), FailureReason::Enrichment)
        }
    };

    if record.usable_name_tag().is_none() {
        return RecordOutcome::Failed(
            failure_for(raw, MISSING_NAME_TAG.to_string()),
            FailureReason::MissingNameTag,
        );
    }

    match store.insert(&record).await {
        Ok(()) => {
            info!(resource_id = %record.resource_id, nametag = ?record.nametag, "Snapshot stored");
            RecordOutcome::Inserted
        }
        Err(e) => RecordOutcome::Failed(failure_for(raw, e.to_string()), FailureReason::Store),
    }
}

fn failure_for(raw: &RawResourceRecord, message: String) -> FailureEntry {
    FailureEntry {
        resourceid: raw.resource_id.clone(),
        message,
        az: raw.availability_zone.clone(),
        accountid: raw.account_id.clone(),
    }
}

/// Builder for [`ReconciliationRun`]
pub struct ReconciliationRunBuilder {
    query: Option<ResourceIndexQuery>,
    capabilities: Option<InstanceCapabilityLookup>,
    enricher: Option<InventoryEnricher>,
    store: Option<Arc<dyn SnapshotStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    notification: NotificationSettings,
    config: RunConfig,
}

impl ReconciliationRunBuilder {
    pub fn new() -> Self {
        Self {
            query: None,
            capabilities: None,
            enricher: None,
            store: None,
            notifier: None,
            notification: NotificationSettings::default(),
            config: RunConfig::default(),
        }
    }

    /// Set the query runner used for the base inventory query
    pub fn query(mut self, query: ResourceIndexQuery) -> Self {
        self.query = Some(query);
        self
    }

    pub fn capabilities(mut self, capabilities: InstanceCapabilityLookup) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn enricher(mut self, enricher: InventoryEnricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn notification(mut self, settings: NotificationSettings) -> Self {
        self.notification = settings;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn record_timeout(mut self, timeout: Duration) -> Self {
        self.config.record_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<ReconciliationRun> {
        let query = self
            .query
            .ok_or_else(|| anyhow::anyhow!("Index query is required"))?;
        let capabilities = self
            .capabilities
            .ok_or_else(|| anyhow::anyhow!("Capability lookup is required"))?;
        let enricher = self
            .enricher
            .ok_or_else(|| anyhow::anyhow!("Enricher is required"))?;
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("Snapshot store is required"))?;

        Ok(ReconciliationRun {
            query,
            capabilities,
            enricher,
            store,
            notifier: self.notifier,
            logger: StructuredLogger::new(self.notification.table_name.clone()),
            notification: self.notification,
            config: self.config,
            metrics: RunMetrics::new(),
        })
    }
}

impl Default for ReconciliationRunBuilder {
    fn default() -> Self {
        Self::new()
    }
}
