//! Failure notification dispatch

mod ses;

pub use ses::SesNotifier;

use crate::error::NotifyError;
use async_trait::async_trait;

/// A rendered report ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub html_body: String,
    pub from: String,
    pub to: Vec<String>,
}

/// Trait for notification channels
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}
