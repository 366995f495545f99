//! Email delivery through a webhook (Zapier-style catch hook).
//!
//! One attempt per send; failures go back to the caller.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::config::DeliveryConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub status: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("no webhook URL configured")]
    NotConfigured,

    #[error("webhook request failed: {0}")]
    Request(String),

    #[error("webhook rejected the email with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    async fn deliver(&self, delivery: &Delivery) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Posts `{to, subject, html}` as JSON to the configured hook.
pub struct WebhookSender {
    client: reqwest::Client,
    hook_url: String,
}

impl WebhookSender {
    pub fn new(config: &DeliveryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build webhook HTTP client")?;

        Ok(Self {
            client,
            hook_url: config.webhook_url.clone(),
        })
    }
}

#[async_trait]
impl DeliveryAdapter for WebhookSender {
    async fn deliver(&self, delivery: &Delivery) -> Result<DeliveryReceipt, DeliveryError> {
        if self.hook_url.trim().is_empty() {
            return Err(DeliveryError::NotConfigured);
        }

        info!("Sending email to {} via webhook", delivery.to);

        let response = self
            .client
            .post(&self.hook_url)
            .json(delivery)
            .send()
            .await
            .map_err(|e| {
                error!("Webhook request error: {}", e);
                DeliveryError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Webhook failed: {} - {}", status, body);
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!("Email sent to {}: {}", delivery.to, status);
        Ok(DeliveryReceipt {
            status: "sent".to_string(),
            message: format!("Email sent to {}", delivery.to),
        })
    }
}

pub fn build_delivery(config: &DeliveryConfig) -> Result<Arc<dyn DeliveryAdapter>> {
    Ok(Arc::new(WebhookSender::new(config)?))
}
