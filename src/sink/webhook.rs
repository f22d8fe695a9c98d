// Webhook sink: POSTs each message as JSON to a configured URL.
//
// Platform "webhook". The receiving side routes by the `channel` field, so a
// single relay can serve many chat channels.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::traits::{MessageSink, SendError};
use crate::db::models::Destination;

pub const PLATFORM: &str = "webhook";

pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub channel: &'a str,
    pub bot: &'a str,
    pub content: &'a str,
}

#[async_trait]
impl MessageSink for WebhookSink {
    async fn send(&self, destination: &Destination, message: &str) -> Result<(), SendError> {
        let payload = WebhookPayload {
            channel: &destination.channel_id,
            bot: &destination.bot_id,
            content: message,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SendError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(channel = %destination.channel_id, "Webhook accepted message");
        Ok(())
    }
}
