//! AWS Config aggregator backed resource index

use super::{QueryPage, ResourceIndex};
use crate::error::IndexError;
use async_trait::async_trait;
use aws_sdk_config::error::DisplayErrorContext;

/// Resource index that runs `SelectAggregateResourceConfig` queries.
///
/// The client is expected to carry credentials for the aggregator account,
/// see [`crate::credentials::ClientFactory`].
#[derive(Debug, Clone)]
pub struct ConfigAggregatorIndex {
    client: aws_sdk_config::Client,
}

impl ConfigAggregatorIndex {
    pub fn new(client: aws_sdk_config::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceIndex for ConfigAggregatorIndex {
    async fn select_page(
        &self,
        expression: &str,
        aggregator: &str,
        limit: i32,
        next_token: Option<String>,
    ) -> Result<QueryPage, IndexError> {
        let output = self
            .client
            .select_aggregate_resource_config()
            .expression(expression)
            .configuration_aggregator_name(aggregator)
            .limit(limit)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| IndexError::Transport(DisplayErrorContext(&e).to_string()))?;

        Ok(QueryPage {
            results: output.results().to_vec(),
            next_token: output.next_token().map(str::to_string),
        })
    }
}
