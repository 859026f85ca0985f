//! Outbound notifications for triggered rules.
//!
//! Delivery is fire-and-forget: [`Notifier::send_async`] returns immediately
//! and failures are only logged and counted.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::info;

use crate::config::SmtpConfig;

pub mod smtp;

pub use smtp::SmtpNotifier;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("invalid address '{address}': {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

pub trait Notifier: Send + Sync {
    /// Queue a message for delivery without waiting for the outcome.
    fn send_async(&self, to: Vec<String>, subject: String, body: String);
}

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_async(&self, to: Vec<String>, subject: String, body: String) {
        info!(recipients = ?to, %subject, body_len = body.len(), "Notification (log only)");
        counter!("notifications_sent_total", "channel" => "log").increment(to.len() as u64);
    }
}

/// SMTP when a host is configured, otherwise log-only delivery.
pub fn from_config(config: &SmtpConfig) -> Result<Arc<dyn Notifier>, NotificationError> {
    match config.host.as_deref() {
        Some(host) => Ok(Arc::new(SmtpNotifier::new(
            host,
            config.port,
            config.username.as_deref(),
            config.password.as_deref(),
            &config.noreply_address,
        )?)),
        None => {
            info!("SMTP host not configured; notifications will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}
