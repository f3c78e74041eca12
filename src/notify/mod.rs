//! Alert delivery abstractions and implementations.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::SmtpConfig;

pub mod smtp;

/// A rendered alert ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// One-line summary (mail `Subject`).
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Errors produced by notifier operations.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Notifier configuration is unusable.
    #[error("invalid notifier configuration: {0}")]
    Config(String),
    /// The message could not be assembled.
    #[error("failed to build message: {0}")]
    Message(String),
    /// The transport rejected or failed to deliver the message.
    #[error("delivery failed: {0}")]
    Transport(String),
}

/// Capability to deliver one alert to the configured recipients.
///
/// Callers never issue overlapping calls on the same notifier.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a single notification.
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Notifier used when alerting is switched off. Accepts and drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        debug!(subject = %notification.subject, "notifications disabled, dropping");
        Ok(())
    }
}

/// Construct the notifier for the given SMTP settings.
///
/// `password` is the already-resolved AUTH secret, if any.
///
/// # Errors
///
/// Returns [`NotifyError::Config`] when SMTP is enabled but its settings
/// cannot be turned into a transport.
pub fn build_notifier(
    config: &SmtpConfig,
    password: Option<String>,
) -> Result<Arc<dyn Notifier>, NotifyError> {
    if !config.enabled {
        return Ok(Arc::new(DisabledNotifier));
    }
    Ok(Arc::new(smtp::SmtpNotifier::from_config(config, password)?))
}
