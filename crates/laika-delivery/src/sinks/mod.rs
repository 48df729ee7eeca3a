// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concrete sinks behind the delivery traits.

pub mod slack;
pub mod smtp;
pub mod templates;

use async_trait::async_trait;
use laika_core::{EmailMessage, EmailSender, LaikaError};
use tracing::info;

pub use slack::SlackPoster;
pub use smtp::SmtpEmailSender;
pub use templates::EmailTemplates;

/// Stand-in used when no SMTP relay is configured: renders nothing and
/// only logs the envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), LaikaError> {
        info!(
            to = %message.to,
            template = %message.template,
            subject = %message.subject,
            "smtp not configured, e-mail logged only"
        );
        Ok(())
    }
}
