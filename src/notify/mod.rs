//! Announcements for newly found domains
//!
//! Notifications are best effort: the scan loop logs a failed delivery and
//! moves on.

mod webhook;

pub use webhook::WebhookNotifier;

use crate::storage::FoundRecord;
use async_trait::async_trait;
use thiserror::Error;

/// Errors delivering a notification
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint returned HTTP {0}")]
    Status(u16),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Receives every new find
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, record: &FoundRecord) -> Result<(), NotifyError>;
}
