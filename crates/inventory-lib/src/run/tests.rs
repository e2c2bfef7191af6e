//! End-to-end run tests over in-memory fakes

use super::*;
use crate::enrich::IndexLookups;
use crate::error::StoreError;
use crate::index::DEFAULT_AGGREGATOR;
use crate::notify::fake::RecordingNotifier;
use crate::store::{InMemorySnapshotStore, SnapshotFilter};
use crate::testing::{capability, instance_blob, StaticCatalog, StaticIndex};
use async_trait::async_trait;
use std::sync::atomic::Ordering;

const DATE: &str = "2024-05-01";

/// Store that refuses every write
struct RejectingStore;

#[async_trait]
impl SnapshotStore for RejectingStore {
    async fn insert(&self, _record: &EnrichedSnapshotRecord) -> Result<(), StoreError> {
        Err(StoreError::Rejected("ProvisionedThroughputExceededException".to_string()))
    }

    async fn scan(&self, _filter: &SnapshotFilter) -> Result<Vec<EnrichedSnapshotRecord>, StoreError> {
        Ok(Vec::new())
    }
}

struct Harness {
    index: Arc<StaticIndex>,
    catalog: Arc<StaticCatalog>,
    notifier: Arc<RecordingNotifier>,
}

impl Harness {
    fn new(index: StaticIndex) -> Self {
        Self::with_catalog(index, StaticCatalog::new(vec![capability("t3.micro", 2, 1024)]))
    }

    fn with_catalog(index: StaticIndex, catalog: StaticCatalog) -> Self {
        Self {
            index: Arc::new(index),
            catalog: Arc::new(catalog),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    fn run(&self, store: Arc<dyn SnapshotStore>) -> ReconciliationRun {
        self.builder(store).build().unwrap()
    }

    fn builder(&self, store: Arc<dyn SnapshotStore>) -> ReconciliationRunBuilder {
        let query = ResourceIndexQuery::new(self.index.clone(), DEFAULT_AGGREGATOR);
        ReconciliationRunBuilder::new()
            .query(query.clone())
            .capabilities(InstanceCapabilityLookup::new(self.catalog.clone()))
            .enricher(InventoryEnricher::new(Arc::new(IndexLookups::new(query))))
            .store(store)
            .notifier(self.notifier.clone())
            .notification(NotificationSettings {
                from: "inventory@example.org".to_string(),
                to: vec!["ops@example.org".to_string()],
                ..Default::default()
            })
            .concurrency(4)
    }
}

/// Store that stalls on one resource and accepts the rest
struct StallingStore {
    stall_on: &'static str,
    inner: InMemorySnapshotStore,
}

#[async_trait]
impl SnapshotStore for StallingStore {
    async fn insert(&self, record: &EnrichedSnapshotRecord) -> Result<(), StoreError> {
        if record.resource_id == self.stall_on {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        self.inner.insert(record).await
    }

    async fn scan(&self, filter: &SnapshotFilter) -> Result<Vec<EnrichedSnapshotRecord>, StoreError> {
        self.inner.scan(filter).await
    }
}

fn inserted_total(metrics: &RunMetrics) -> u64 {
    metrics
        .render()
        .unwrap()
        .lines()
        .find_map(|line| line.strip_prefix("ec2_reconciler_records_inserted_total "))
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_tagged_record_is_stored() {
    let harness = Harness::new(StaticIndex::with_instances(vec![instance_blob(
        "i-1",
        "t3.micro",
        Some("prd-app1"),
    )]));
    let store = Arc::new(InMemorySnapshotStore::new());

    let summary = harness.run(store.clone()).execute(DATE).await.unwrap();

    assert_eq!(summary.outcome(), crate::models::RunOutcome { update_count: 1, error: 0 });
    let rows = store.scan(&SnapshotFilter::new(DATE, "prd-app1")).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].platform_name, "unknown");
    assert_eq!(rows[0].fqdn, None);
    assert_eq!(rows[0].memory.to_string(), "1.0");
    assert_eq!(rows[0].cpu, 2);
    assert!(harness.notifier.sent.lock().await.is_empty());
}

#[tokio::test]
async fn test_inserted_records_are_counted_in_metrics() {
    let harness = Harness::new(StaticIndex::with_instances(vec![instance_blob(
        "i-1",
        "t3.micro",
        Some("prd-app1"),
    )]));
    let metrics = RunMetrics::new();
    let before = inserted_total(&metrics);

    harness
        .run(Arc::new(InMemorySnapshotStore::new()))
        .execute(DATE)
        .await
        .unwrap();

    // Metrics are process-wide, so other tests may add to the counter too
    assert!(inserted_total(&metrics) >= before + 1);
}

#[tokio::test]
async fn test_record_timeout_fails_only_that_record() {
    let harness = Harness::new(StaticIndex::with_instances(vec![
        instance_blob("i-1", "t3.micro", Some("prd-app1")),
        instance_blob("i-slow", "t3.micro", Some("prd-app2")),
        instance_blob("i-3", "t3.micro", Some("prd-app3")),
    ]));
    let store = Arc::new(StallingStore {
        stall_on: "i-slow",
        inner: InMemorySnapshotStore::new(),
    });

    let summary = harness
        .builder(store.clone())
        .record_timeout(Duration::from_millis(200))
        .build()
        .unwrap()
        .execute(DATE)
        .await
        .unwrap();

    assert_eq!(summary.update_count, 2);
    assert_eq!(summary.error, 1);
    assert_eq!(summary.failures[0].resourceid, "i-slow");
    assert_eq!(summary.failures[0].message, "enrichment timed out after 200ms");
    assert_eq!(store.inner.len().await, 2);
}

#[tokio::test]
async fn test_missing_or_blank_name_tag_is_reported() {
    let harness = Harness::new(StaticIndex::with_instances(vec![
        instance_blob("i-1", "t3.micro", None),
        instance_blob("i-2", "t3.micro", Some("   ")),
    ]));
    let store = Arc::new(InMemorySnapshotStore::new());

    let summary = harness.run(store.clone()).execute(DATE).await.unwrap();

    assert_eq!(summary.update_count, 0);
    assert_eq!(summary.error, 2);
    assert!(summary.failures.iter().all(|f| f.message == MISSING_NAME_TAG));
    assert_eq!(summary.failures[0].resourceid, "i-1");
    assert_eq!(summary.failures[0].az.as_deref(), Some("us-east-1a"));
    assert_eq!(summary.failures[0].accountid.as_deref(), Some("111122223333"));
    assert!(store.is_empty().await);

    let sent = harness.notifier.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Insert Failed: ec2_inventory_history: 2024-05-01");
    assert!(sent[0].html_body.contains(MISSING_NAME_TAG));
}

#[tokio::test]
async fn test_unknown_instance_type_fails_record_only() {
    let harness = Harness::new(StaticIndex::with_instances(vec![
        instance_blob("i-1", "t3.micro", Some("prd-app1")),
        instance_blob("i-2", "x9.huge", Some("prd-app2")),
    ]));
    let store = Arc::new(InMemorySnapshotStore::new());

    let summary = harness.run(store.clone()).execute(DATE).await.unwrap();

    assert_eq!(summary.update_count, 1);
    assert_eq!(summary.error, 1);
    assert_eq!(summary.failures[0].resourceid, "i-2");
    assert!(summary.failures[0].message.contains("x9.huge"));
    assert_eq!(harness.catalog.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rerun_overwrites_same_day() {
    let harness = Harness::new(StaticIndex::with_instances(vec![instance_blob(
        "i-1",
        "t3.micro",
        Some("prd-app1"),
    )]));
    let store = Arc::new(InMemorySnapshotStore::new());
    let run = harness.run(store.clone());

    run.execute(DATE).await.unwrap();
    let first = store.scan(&SnapshotFilter::for_date(DATE)).await.unwrap();
    run.execute(DATE).await.unwrap();
    let second = store.scan(&SnapshotFilter::for_date(DATE)).await.unwrap();

    assert_eq!(store.len().await, 1);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_base_query_failure_aborts() {
    let mut index = StaticIndex::default();
    index.fail_base_query = true;
    let harness = Harness::new(index);

    let result = harness
        .run(Arc::new(InMemorySnapshotStore::new()))
        .execute(DATE)
        .await;

    assert!(matches!(result, Err(RunError::Index(_))));
    assert_eq!(harness.catalog.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_capability_failure_aborts_before_enrichment() {
    let mut catalog = StaticCatalog::new(vec![]);
    catalog.fail = true;
    let harness = Harness::with_catalog(
        StaticIndex::with_instances(vec![instance_blob("i-1", "t3.micro", Some("prd-app1"))]),
        catalog,
    );

    let result = harness
        .run(Arc::new(InMemorySnapshotStore::new()))
        .execute(DATE)
        .await;

    assert!(matches!(result, Err(RunError::Capability(_))));
    assert_eq!(harness.index.sub_query_count(), 0);
}

#[tokio::test]
async fn test_store_rejection_is_counted() {
    let harness = Harness::new(StaticIndex::with_instances(vec![instance_blob(
        "i-1",
        "t3.micro",
        Some("prd-app1"),
    )]));

    let summary = harness.run(Arc::new(RejectingStore)).execute(DATE).await.unwrap();

    assert_eq!(summary.update_count, 0);
    assert_eq!(summary.error, 1);
    assert!(summary.failures[0]
        .message
        .contains("ProvisionedThroughputExceededException"));
}

#[tokio::test]
async fn test_unparseable_blob_is_reported_as_unknown() {
    let harness = Harness::new(StaticIndex::with_instances(vec![
        "{not json".to_string(),
        instance_blob("i-1", "t3.micro", Some("prd-app1")),
    ]));

    let summary = harness
        .run(Arc::new(InMemorySnapshotStore::new()))
        .execute(DATE)
        .await
        .unwrap();

    assert_eq!(summary.update_count, 1);
    assert_eq!(summary.error, 1);
    assert_eq!(summary.failures[0].resourceid, UNKNOWN_RESOURCE);
    assert_eq!(summary.failures[0].az, None);
}

#[tokio::test]
async fn test_notifier_failure_does_not_change_counts() {
    let mut harness = Harness::new(StaticIndex::with_instances(vec![
        instance_blob("i-1", "t3.micro", Some("prd-app1")),
        instance_blob("i-2", "t3.micro", None),
    ]));
    harness.notifier = Arc::new(RecordingNotifier {
        fail: true,
        ..Default::default()
    });

    let summary = harness
        .run(Arc::new(InMemorySnapshotStore::new()))
        .execute(DATE)
        .await
        .unwrap();

    assert_eq!(summary.outcome().update_count, 1);
    assert_eq!(summary.outcome().error, 1);
}

#[tokio::test]
async fn test_failures_follow_index_order() {
    let instances = (0..12)
        .map(|i| instance_blob(&format!("i-{i:02}"), "t3.micro", None))
        .collect();
    let harness = Harness::new(StaticIndex::with_instances(instances));

    let summary = harness
        .run(Arc::new(InMemorySnapshotStore::new()))
        .execute(DATE)
        .await
        .unwrap();

    let ids: Vec<_> = summary.failures.iter().map(|f| f.resourceid.as_str()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids.len(), 12);
    assert_eq!(ids, sorted);
}

#[test]
fn test_builder_requires_store() {
    let index = Arc::new(StaticIndex::default());
    let query = ResourceIndexQuery::new(index, DEFAULT_AGGREGATOR);
    let result = ReconciliationRunBuilder::new()
        .query(query.clone())
        .capabilities(InstanceCapabilityLookup::new(Arc::new(StaticCatalog::default())))
        .enricher(InventoryEnricher::new(Arc::new(IndexLookups::new(query))))
        .build();

    assert!(result.is_err());
}
