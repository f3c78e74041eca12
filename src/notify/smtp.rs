//! Plain-text alert mail over SMTP.
//!
//! Messages are 7-bit `text/plain; charset=us-ascii`, one per alert, sent to
//! every configured recipient in a single transaction.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::{ContentTransferEncoding, ContentType};
use lettre::message::{Body, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use super::{Notification, NotifyError, Notifier};
use crate::config::{split_server, SmtpConfig, SmtpTls};

const CONTENT_TYPE: &str = "text/plain; charset=us-ascii";

/// SMTP-backed notifier.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpNotifier {
    /// Build a notifier from SMTP settings.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Config`] for an unparsable server, sender, or
    /// recipient, or when TLS parameters cannot be created.
    pub fn from_config(config: &SmtpConfig, password: Option<String>) -> Result<Self, NotifyError> {
        let (host, port) = split_server(&config.server).ok_or_else(|| {
            NotifyError::Config(format!("server '{}' is not host:port", config.server))
        })?;

        let from = parse_mailbox(&config.from)?;
        let to = config
            .to
            .iter()
            .map(|addr| parse_mailbox(addr))
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(NotifyError::Config("no recipients configured".to_owned()));
        }

        let skip_verify = config.skip_certificate_verify;
        let tls = match config.tls {
            SmtpTls::None => Tls::None,
            SmtpTls::Starttls => Tls::Required(tls_parameters(host, skip_verify)?),
            SmtpTls::Tls => Tls::Wrapper(tls_parameters(host, skip_verify)?),
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .tls(tls)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if let Some(username) = config.username.as_deref().filter(|u| !u.is_empty()) {
            builder = builder.credentials(Credentials::new(
                username.to_owned(),
                password.unwrap_or_default(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    /// Assemble the mail for a notification without sending it.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Message`] when the body is not 7-bit clean or
    /// headers cannot be set.
    pub fn build_message(&self, notification: &Notification) -> Result<Message, NotifyError> {
        let content_type = ContentType::parse(CONTENT_TYPE)
            .map_err(|e| NotifyError::Message(format!("content type: {e}")))?;
        let body = Body::new_with_encoding(
            notification.body.clone(),
            ContentTransferEncoding::SevenBit,
        )
        .map_err(|_| NotifyError::Message("body is not 7-bit clean".to_owned()))?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(notification.subject.clone())
            .header(content_type);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }

        builder
            .body(body)
            .map_err(|e| NotifyError::Message(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = self.build_message(notification)?;
        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        debug!(
            subject = %notification.subject,
            recipients = self.to.len(),
            code = %response.code(),
            "mail accepted"
        );
        Ok(())
    }
}

fn parse_mailbox(addr: &str) -> Result<Mailbox, NotifyError> {
    addr.parse::<Mailbox>()
        .map_err(|e| NotifyError::Config(format!("invalid address '{addr}': {e}")))
}

fn tls_parameters(host: &str, skip_verify: bool) -> Result<TlsParameters, NotifyError> {
    TlsParameters::builder(host.to_owned())
        .dangerous_accept_invalid_certs(skip_verify)
        .dangerous_accept_invalid_hostnames(skip_verify)
        .build_native()
        .map_err(|e| NotifyError::Config(format!("tls setup for {host}: {e}")))
}
