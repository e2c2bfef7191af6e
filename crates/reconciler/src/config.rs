//! Job configuration

use anyhow::{Context, Result};
use chrono::NaiveDate;
use config::{Environment, File};
use inventory_lib::index::DEFAULT_AGGREGATOR;
use inventory_lib::report::DEFAULT_HEADER;
use inventory_lib::store::DEFAULT_TABLE_NAME;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the optional config file
pub const CONFIG_PATH_VAR: &str = "RECON_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "reconciler.toml";
const ENV_PREFIX: &str = "RECON";

/// Reconciler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    /// Config aggregator holding organisation-wide inventory
    #[serde(default = "default_aggregator")]
    pub aggregator_name: String,

    /// Role to assume for index and capability queries
    #[serde(default)]
    pub index_role_arn: Option<String>,

    #[serde(default = "default_session_name")]
    pub role_session_name: String,

    #[serde(default)]
    pub region: Option<String>,

    /// Snapshot table
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Index page size, capped at 100
    #[serde(default = "default_page_size")]
    pub page_size: i32,

    /// Records enriched concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_record_timeout")]
    pub record_timeout_secs: u64,

    /// Per-page timeout for index queries
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    #[serde(default)]
    pub notify_from: Option<String>,

    #[serde(default)]
    pub notify_to: Vec<String>,

    #[serde(default = "default_report_header")]
    pub report_header: String,

    /// node-exporter textfile written at the end of the run
    #[serde(default)]
    pub metrics_textfile: Option<PathBuf>,

    /// Snapshot date override; today's UTC date when unset
    #[serde(default)]
    pub as_of: Option<NaiveDate>,

    #[serde(default)]
    pub capture_windows_updates: bool,

    /// Keep snapshots in memory instead of writing the table
    #[serde(default)]
    pub dry_run: bool,
}

fn default_aggregator() -> String {
    DEFAULT_AGGREGATOR.to_string()
}

fn default_session_name() -> String {
    "ec2-inventory-reconciler".to_string()
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

fn default_page_size() -> i32 {
    100
}

fn default_concurrency() -> usize {
    8
}

fn default_record_timeout() -> u64 {
    60
}

fn default_query_timeout() -> u64 {
    30
}

fn default_report_header() -> String {
    DEFAULT_HEADER.to_string()
}

impl ReconcilerConfig {
    /// Load configuration from the optional config file and environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_sources(Path::new(&path), environment())
    }

    /// Layer `environment` over the file at `path`; a missing file is skipped
    pub fn from_sources(path: &Path, environment: Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(environment)
            .build()
            .context("Failed to read reconciler configuration")?;

        config
            .try_deserialize()
            .context("Invalid reconciler configuration")
    }

    /// Date stamped on every snapshot of this run
    pub fn recorded_date(&self) -> NaiveDate {
        self.as_of
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("notify_to")
}
