//! Webhook delivery of completed conversations.

use async_trait::async_trait;
use std::time::Duration;
use vocaform_conversation::{CompletionNotifier, CompletionReport, NotifyError};

/// POSTs each [`CompletionReport`] as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CompletionNotifier for WebhookNotifier {
    async fn notify(&self, report: &CompletionReport) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(report)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }

        tracing::debug!(
            conversation_id = %report.conversation.conversation_id,
            url = %self.url,
            "completion webhook delivered"
        );
        Ok(())
    }
}
