// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMTP e-mail sink.

use std::sync::Arc;

use async_trait::async_trait;
use laika_config::model::EmailConfig;
use laika_core::{EmailMessage, EmailSender, LaikaError};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use super::templates::EmailTemplates;

fn email_error(e: impl std::fmt::Display) -> LaikaError {
    LaikaError::delivery("email", e.to_string())
}

fn is_local(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

/// Renders templated messages and hands them to an SMTP relay.
pub struct SmtpEmailSender {
    templates: Arc<EmailTemplates>,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for SmtpEmailSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpEmailSender").finish_non_exhaustive()
    }
}

impl SmtpEmailSender {
    /// Build the transport described by `config`. Local hosts are reached in
    /// plain text; anything else goes through STARTTLS.
    pub fn from_config(
        config: &EmailConfig,
        password: Option<SecretString>,
        templates: Arc<EmailTemplates>,
    ) -> Result<Self, LaikaError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| LaikaError::Config("email.smtp_host is not set".into()))?;
        let builder = if is_local(host) {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host).map_err(email_error)?
        };
        let mut builder = builder.port(config.smtp_port);
        if let (Some(username), Some(password)) = (&config.smtp_username, password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            ));
        }
        Ok(Self {
            templates,
            transport: builder.build(),
        })
    }

    fn build(&self, message: &EmailMessage) -> Result<Message, LaikaError> {
        let from: Mailbox = message.from.parse().map_err(email_error)?;
        let to: Mailbox = message.to.parse().map_err(email_error)?;
        let html = self.templates.render_html(message)?;
        Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                EmailTemplates::render_text(message),
                html,
            ))
            .map_err(email_error)
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    #[instrument(skip_all, fields(template = %message.template))]
    async fn send(&self, message: &EmailMessage) -> Result<(), LaikaError> {
        let email = self.build(message)?;
        self.transport.send(email).await.map_err(email_error)?;
        debug!("e-mail handed to relay");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sender() -> SmtpEmailSender {
        let config = EmailConfig {
            smtp_host: Some("localhost".into()),
            smtp_port: 2525,
            ..EmailConfig::default()
        };
        SmtpEmailSender::from_config(&config, None, Arc::new(EmailTemplates::new().unwrap())).unwrap()
    }

    #[tokio::test]
    async fn builds_a_multipart_message() {
        let message = EmailMessage {
            to: "a@x.com".into(),
            from: "no-reply@heylaika.com".into(),
            subject: "Acme have an SOC 2 Type 1 audit initiated".into(),
            template: "audit_alert".into(),
            context: json!({"audit_type": "SOC 2 Type 1", "message": "Open Laika"}),
        };
        let built = sender().build(&message).unwrap();
        let raw = String::from_utf8(built.formatted()).unwrap();
        assert!(raw.contains("Subject: Acme have an SOC 2 Type 1 audit initiated"));
        assert!(raw.contains("multipart/alternative"));
    }

    #[tokio::test]
    async fn bad_recipient_is_a_delivery_error() {
        let message = EmailMessage {
            to: "not an address".into(),
            from: "no-reply@heylaika.com".into(),
            subject: "s".into(),
            template: "generic_alert".into(),
            context: json!({}),
        };
        let err = sender().build(&message).unwrap_err();
        assert_eq!(err.code(), "delivery");
    }

    #[test]
    fn missing_host_is_a_config_error() {
        let err = SmtpEmailSender::from_config(
            &EmailConfig::default(),
            None,
            Arc::new(EmailTemplates::new().unwrap()),
        )
        .unwrap_err();
        assert_eq!(err.code(), "config");
    }
}
