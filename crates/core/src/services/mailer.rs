//! Outgoing mail.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use pulse_common::{AppError, AppResult, config::MailConfig};
use std::sync::Arc;

/// Sends plain-text mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one message to `to`.
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

/// Shared handle to a mailer.
pub type MailerService = Arc<dyn Mailer>;

/// Writes mail to the log instead of delivering it.
///
/// Used when no SMTP relay is configured, e.g. in local development.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        tracing::info!(to = %to, subject = %subject, body = %body, "Mail delivery disabled, logging message");
        Ok(())
    }
}

/// Delivers mail through an SMTP relay with STARTTLS.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build a mailer from configuration. No connection is opened yet.
    pub fn new(config: &MailConfig) -> AppResult<Self> {
        let from: Mailbox = config
            .from_address
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid mail.from_address: {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| AppError::Config(format!("Invalid mail.smtp_host: {e}")))?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| AppError::BadRequest(format!("Invalid email address: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::Mail(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Mail(e.to_string()))?;

        Ok(())
    }
}

/// Pick the mailer for the given configuration.
pub fn mailer_from_config(config: Option<&MailConfig>) -> AppResult<MailerService> {
    match config {
        Some(mail) => {
            tracing::info!(host = %mail.smtp_host, port = mail.smtp_port, "Using SMTP mailer");
            Ok(Arc::new(SmtpMailer::new(mail)?))
        }
        None => {
            tracing::warn!("No mail configuration, one-time codes will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn mail_config(from: &str) -> MailConfig {
        MailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            username: Some("pulse".to_string()),
            password: Some("secret".to_string()),
            from_address: from.to_string(),
        }
    }

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        let mailer = LogMailer;
        mailer
            .send("alice@example.com", "Your code", "123456")
            .await
            .unwrap();
    }

    #[test]
    fn test_smtp_mailer_rejects_bad_sender() {
        let result = SmtpMailer::new(&mail_config("not an address"));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_mailer_from_config() {
        assert!(mailer_from_config(None).is_ok());
        assert!(mailer_from_config(Some(&mail_config("Pulse <no-reply@pulse.example>"))).is_ok());
    }
}
