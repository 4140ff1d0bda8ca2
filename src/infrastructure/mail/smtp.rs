//! SMTP delivery for account emails (activation, password reset).
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::settings::EmailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("email delivery is not configured (EMAIL_HOST is empty)")]
    NotConfigured,
    #[error("invalid address {0}: {1}")]
    Address(String, String),
    #[error("failed to build email: {0}")]
    Build(String),
    #[error("smtp error: {0}")]
    Transport(String),
}

/// A rendered email with plain text and HTML alternatives.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn create_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
        let builder = if self.config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
                .map_err(|e| MailError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
        };

        let mut builder = builder.port(self.config.port);
        if !self.config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ));
        }

        Ok(builder.build())
    }

    pub fn build_message(&self, email: &OutgoingEmail) -> Result<Message, MailError> {
        let from: Mailbox = self
            .config
            .from_email
            .parse()
            .map_err(|e: lettre::address::AddressError| {
                MailError::Address(self.config.from_email.clone(), e.to_string())
            })?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e: lettre::address::AddressError| MailError::Address(email.to.clone(), e.to_string()))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.clone())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )
            .map_err(|e| MailError::Build(e.to_string()))
    }

    pub async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        if !self.is_configured() {
            return Err(MailError::NotConfigured);
        }

        let message = self.build_message(email)?;
        let mailer = self.create_transport()?;

        mailer
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        info!("📧 Sent '{}' to {}", email.subject, email.to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str) -> EmailConfig {
        EmailConfig {
            host: host.to_string(),
            port: 1025,
            username: String::new(),
            password: String::new(),
            use_tls: false,
            from_email: "Videoflix <noreply@videoflix.test>".to_string(),
        }
    }

    fn sample() -> OutgoingEmail {
        OutgoingEmail {
            to: "anna@example.com".to_string(),
            subject: "Activate your account".to_string(),
            text_body: "plain".to_string(),
            html_body: "<p>html</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn unconfigured_host_fails_before_connecting() {
        let service = EmailService::new(config(""));
        assert!(!service.is_configured());
        assert!(matches!(service.send(&sample()).await, Err(MailError::NotConfigured)));
    }

    #[test]
    fn builds_multipart_alternative() {
        let service = EmailService::new(config("localhost"));
        let message = service.build_message(&sample()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: Activate your account"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn rejects_bad_recipient() {
        let service = EmailService::new(config("localhost"));
        let mut email = sample();
        email.to = "not an address".to_string();
        assert!(matches!(service.build_message(&email), Err(MailError::Address(_, _))));
    }
}
