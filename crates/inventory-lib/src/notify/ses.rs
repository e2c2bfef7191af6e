use super::{Notification, Notifier};
use crate::error::NotifyError;
use async_trait::async_trait;
use aws_sdk_ses::error::DisplayErrorContext;
use aws_sdk_ses::types::{Body, Content, Destination, Message};
use tracing::info;

/// Sends HTML reports through Amazon SES
#[derive(Debug, Clone)]
pub struct SesNotifier {
    client: aws_sdk_ses::Client,
}

impl SesNotifier {
    pub fn new(client: aws_sdk_ses::Client) -> Self {
        Self { client }
    }
}

fn content(data: &str) -> Result<Content, NotifyError> {
    Content::builder()
        .data(data)
        .build()
        .map_err(|e| NotifyError::Build(e.to_string()))
}

#[async_trait]
impl Notifier for SesNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if notification.to.is_empty() {
            return Err(NotifyError::Build("no recipients configured".to_string()));
        }

        let destination = Destination::builder()
            .set_to_addresses(Some(notification.to.clone()))
            .build();
        let body = Body::builder()
            .html(content(&notification.html_body)?)
            .build();
        let message = Message::builder()
            .subject(content(&notification.subject)?)
            .body(body)
            .build()
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        let output = self
            .client
            .send_email()
            .source(&notification.from)
            .destination(destination)
            .message(message)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(DisplayErrorContext(&e).to_string()))?;

        info!(
            message_id = %output.message_id(),
            recipients = notification.to.len(),
            "Failure report sent"
        );
        Ok(())
    }
}
