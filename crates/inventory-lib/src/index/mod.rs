//! Resource index queries
//!
//! This module runs declarative queries against the multi-account resource
//! configuration aggregator. Result sets are token-paginated and collected
//! eagerly: the orchestrator needs every record before capability
//! resolution can start.

mod config_aggregator;
mod query;

pub use config_aggregator::ConfigAggregatorIndex;
pub use query::{os_inventory_query, volume_query, EC2_INSTANCES_QUERY};

use crate::error::IndexError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Largest page the aggregator accepts per call
pub const MAX_PAGE_SIZE: i32 = 100;

/// Default aggregator for organisation-wide Config data
pub const DEFAULT_AGGREGATOR: &str = "aws-controltower-ConfigAggregatorForOrganizations";

/// One page of JSON-encoded result rows
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    pub results: Vec<String>,
    pub next_token: Option<String>,
}

/// Trait for resource index implementations
#[async_trait]
pub trait ResourceIndex: Send + Sync {
    /// Fetch a single page of results for `expression`
    async fn select_page(
        &self,
        expression: &str,
        aggregator: &str,
        limit: i32,
        next_token: Option<String>,
    ) -> Result<QueryPage, IndexError>;
}

/// Paginating query runner bound to one aggregator
#[derive(Clone)]
pub struct ResourceIndexQuery {
    index: Arc<dyn ResourceIndex>,
    aggregator: String,
    page_size: i32,
    call_timeout: Option<Duration>,
}

impl ResourceIndexQuery {
    pub fn new(index: Arc<dyn ResourceIndex>, aggregator: impl Into<String>) -> Self {
        Self {
            index,
            aggregator: aggregator.into(),
            page_size: MAX_PAGE_SIZE,
            call_timeout: None,
        }
    }

    /// Set the page size, clamped to `1..=100`
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Bound every page request by `timeout`
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn aggregator(&self) -> &str {
        &self.aggregator
    }

    pub fn page_size(&self) -> i32 {
        self.page_size
    }

    /// Run `expression` against the bound aggregator
    pub async fn run(&self, expression: &str) -> Result<Vec<String>, IndexError> {
        self.execute(expression, &self.aggregator, self.page_size)
            .await
    }

    /// Run `expression` against `aggregator`, following continuation tokens
    /// until the result set is exhausted. Any failed page fails the query.
    pub async fn execute(
        &self,
        expression: &str,
        aggregator: &str,
        page_size: i32,
    ) -> Result<Vec<String>, IndexError> {
        let limit = page_size.clamp(1, MAX_PAGE_SIZE);
        let mut rows = Vec::new();
        let mut next_token = None;
        let mut pages = 0u32;

        loop {
            let page = self.fetch(expression, aggregator, limit, next_token).await?;
            pages += 1;
            rows.extend(page.results);

            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        debug!(
            aggregator = %aggregator,
            pages = pages,
            rows = rows.len(),
            "Index query complete"
        );

        Ok(rows)
    }

    async fn fetch(
        &self,
        expression: &str,
        aggregator: &str,
        limit: i32,
        next_token: Option<String>,
    ) -> Result<QueryPage, IndexError> {
        let call = self
            .index
            .select_page(expression, aggregator, limit, next_token);

        match self.call_timeout {
            Some(timeout) => tokio::time::timeout(timeout, call)
                .await
                .map_err(|_| IndexError::Timeout(timeout))?,
            None => call.await,
        }
    }
}
