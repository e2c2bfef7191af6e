//! Credentialed AWS client construction
//!
//! The job reads the resource index from a delegated administrator account
//! through an assumed role, while the snapshot table and mail service live
//! in the account the job runs in. Each side gets its own factory.

use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, ConfigLoader, Region, SdkConfig};
use tracing::info;

fn loader(region: Option<&str>) -> ConfigLoader {
    let loader = aws_config::defaults(BehaviorVersion::latest());
    match region {
        Some(region) => loader.region(Region::new(region.to_string())),
        None => loader,
    }
}

/// Builds service clients from one resolved SDK configuration
#[derive(Debug, Clone)]
pub struct ClientFactory {
    config: SdkConfig,
}

impl ClientFactory {
    /// Use the default credential chain of the running process
    pub async fn from_env(region: Option<&str>) -> Self {
        Self {
            config: loader(region).load().await,
        }
    }

    /// Assume `role_arn` on top of the default credential chain
    pub async fn assume_role(role_arn: &str, session_name: &str, region: Option<&str>) -> Self {
        let base = loader(region).load().await;
        let provider = AssumeRoleProvider::builder(role_arn)
            .session_name(session_name)
            .configure(&base)
            .build()
            .await;

        info!(role_arn = %role_arn, session_name = %session_name, "Using assumed role");

        Self {
            config: loader(region).credentials_provider(provider).load().await,
        }
    }

    pub fn config_client(&self) -> aws_sdk_config::Client {
        aws_sdk_config::Client::new(&self.config)
    }

    pub fn ec2_client(&self) -> aws_sdk_ec2::Client {
        aws_sdk_ec2::Client::new(&self.config)
    }

    pub fn dynamodb_client(&self) -> aws_sdk_dynamodb::Client {
        aws_sdk_dynamodb::Client::new(&self.config)
    }

    pub fn ses_client(&self) -> aws_sdk_ses::Client {
        aws_sdk_ses::Client::new(&self.config)
    }
}
