//! Slack webhook notification manager
//!
//! Posts phase-boundary messages to a Slack-compatible webhook. Delivery is
//! best-effort: callers log failures and move on, a webhook outage never
//! changes a backup outcome.

use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::config::SlackConfig;

/// Webhook payload
#[derive(Debug, Serialize)]
struct SlackPayload<'a> {
    text: &'a str,
    channel: &'a str,
    username: &'a str,
    icon_emoji: &'a str,
}

/// Notification manager for sending Slack webhooks
pub struct Notifier {
    config: SlackConfig,
}

impl Notifier {
    pub fn new(config: SlackConfig) -> Self {
        Self { config }
    }

    /// Whether a webhook is actually configured
    pub fn is_enabled(&self) -> bool {
        !self.config.webhook.is_empty()
    }

    /// Post one message to the webhook
    pub fn send(&self, text: &str) -> Result<()> {
        if !self.is_enabled() {
            debug!("No webhook configured, skipping notification");
            return Ok(());
        }

        let payload = SlackPayload {
            text,
            channel: &self.config.channel,
            username: &self.config.username,
            icon_emoji: &self.config.icon_emoji,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let response = client
            .post(&self.config.webhook)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .context("Failed to send webhook")?;

        let status = response.status();
        if status.is_success() {
            debug!("Webhook sent successfully");
            Ok(())
        } else {
            let body = response.text().unwrap_or_default();
            anyhow::bail!("Webhook failed with status {}: {}", status, body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slack_config(webhook: &str) -> SlackConfig {
        SlackConfig {
            webhook: webhook.to_string(),
            channel: "#general".to_string(),
            username: "backhaul".to_string(),
            icon_emoji: ":shipit:".to_string(),
        }
    }

    #[test]
    fn test_disabled_when_no_webhook() {
        let notifier = Notifier::new(slack_config(""));
        assert!(!notifier.is_enabled());
        // Sending with no webhook is a quiet no-op
        assert!(notifier.send("Backup started.").is_ok());
    }

    #[test]
    fn test_enabled_with_webhook() {
        let notifier = Notifier::new(slack_config("https://hooks.slack.com/services/T/B/X"));
        assert!(notifier.is_enabled());
    }

    #[test]
    fn test_payload_shape() {
        let payload = SlackPayload {
            text: "Backup done.",
            channel: "#ops",
            username: "backhaul",
            icon_emoji: ":shipit:",
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["text"], "Backup done.");
        assert_eq!(value["channel"], "#ops");
        assert_eq!(value["username"], "backhaul");
        assert_eq!(value["icon_emoji"], ":shipit:");
    }
}
