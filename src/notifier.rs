//! Outbound customer notifications.
//!
//! Delivery itself (email, SMS) belongs to another service; this crate only
//! hands it a kind, a recipient and template data.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderConfirmation,
    OrderStatusUpdate,
    AbandonedCart,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NotificationKind::OrderConfirmation => "order_confirmation",
            NotificationKind::OrderStatusUpdate => "order_status_update",
            NotificationKind::AbandonedCart => "abandoned_cart",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: String,
    pub data: Value,
}

impl Notification {
    pub fn new(kind: NotificationKind, recipient: impl Into<String>, data: Value) -> Self {
        Self {
            kind,
            recipient: recipient.into(),
            data,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("notification rejected with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Used when no relay is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        tracing::info!(
            kind = %notification.kind,
            recipient = %notification.recipient,
            data = %notification.data,
            "notification"
        );
        Ok(())
    }
}

/// Posts each notification as JSON to a relay endpoint (e.g. an email service).
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&notification)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

pub fn from_config(webhook_url: Option<&str>) -> anyhow::Result<Arc<dyn Notifier>> {
    Ok(match webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url)?),
        None => Arc::new(LogNotifier),
    })
}

/// Fire-and-forget delivery for request paths: the caller never waits on, or
/// fails because of, the notifier.
pub fn dispatch(notifier: &Arc<dyn Notifier>, notification: Notification) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        let kind = notification.kind;
        let recipient = notification.recipient.clone();
        if let Err(err) = notifier.send(notification).await {
            tracing::warn!(error = %err, %kind, %recipient, "notification failed");
        }
    });
}
