// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording sinks for deterministic delivery assertions.
//!
//! `RecordingSinks` implements all three outbound sink traits and keeps
//! everything handed to it, so tests can assert on frames, e-mails, and
//! Slack posts without a relay or a socket.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use laika_core::{
    EmailMessage, EmailSender, LaikaError, SlackMessage, SlackSender, WebsocketPublisher, WsFrame,
};
use laika_delivery::DeliverySinks;

/// One captured `chat.postMessage`.
#[derive(Debug, Clone, PartialEq)]
pub struct SlackPost {
    pub organization_id: String,
    pub receiver_email: String,
    pub message: SlackMessage,
}

#[derive(Default)]
struct Captured {
    frames: Vec<WsFrame>,
    emails: Vec<EmailMessage>,
    slack: Vec<SlackPost>,
}

/// Sinks that capture every delivery. Clones share one log.
#[derive(Clone, Default)]
pub struct RecordingSinks {
    captured: Arc<Mutex<Captured>>,
    fail_email: bool,
}

impl std::fmt::Debug for RecordingSinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSinks")
            .field("fail_email", &self.fail_email)
            .finish_non_exhaustive()
    }
}

impl RecordingSinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sinks whose e-mail relay refuses every message.
    pub fn failing_email() -> Self {
        Self {
            fail_email: true,
            ..Self::default()
        }
    }

    pub fn sinks(&self) -> DeliverySinks {
        DeliverySinks {
            websocket: Arc::new(self.clone()),
            email: Arc::new(self.clone()),
            slack: Arc::new(self.clone()),
        }
    }

    pub async fn frames(&self) -> Vec<WsFrame> {
        self.captured.lock().await.frames.clone()
    }

    pub async fn emails(&self) -> Vec<EmailMessage> {
        self.captured.lock().await.emails.clone()
    }

    /// E-mails addressed to `to`.
    pub async fn emails_to(&self, to: &str) -> Vec<EmailMessage> {
        self.captured
            .lock()
            .await
            .emails
            .iter()
            .filter(|m| m.to == to)
            .cloned()
            .collect()
    }

    pub async fn slack_posts(&self) -> Vec<SlackPost> {
        self.captured.lock().await.slack.clone()
    }

    pub async fn clear(&self) {
        let mut captured = self.captured.lock().await;
        captured.frames.clear();
        captured.emails.clear();
        captured.slack.clear();
    }
}

#[async_trait]
impl WebsocketPublisher for RecordingSinks {
    async fn publish(&self, frame: &WsFrame) -> Result<(), LaikaError> {
        self.captured.lock().await.frames.push(frame.clone());
        Ok(())
    }
}

#[async_trait]
impl EmailSender for RecordingSinks {
    async fn send(&self, message: &EmailMessage) -> Result<(), LaikaError> {
        if self.fail_email {
            return Err(LaikaError::delivery("email", "relay refused the message"));
        }
        self.captured.lock().await.emails.push(message.clone());
        Ok(())
    }
}

#[async_trait]
impl SlackSender for RecordingSinks {
    async fn post(
        &self,
        organization_id: &str,
        receiver_email: &str,
        message: &SlackMessage,
    ) -> Result<(), LaikaError> {
        self.captured.lock().await.slack.push(SlackPost {
            organization_id: organization_id.to_string(),
            receiver_email: receiver_email.to_string(),
            message: message.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laika_core::AlertType;

    fn frame() -> WsFrame {
        WsFrame {
            sender: "B".into(),
            receiver_email: "a@x.com".into(),
            room_id: "o1".into(),
            alert_id: "al1".into(),
            alert_type: AlertType::ControlMention,
        }
    }

    fn email(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.into(),
            from: "no-reply@heylaika.com".into(),
            subject: "hi".into(),
            template: "alert".into(),
            context: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn clones_share_one_log() {
        let sinks = RecordingSinks::new();
        let delivery = sinks.sinks();
        delivery.websocket.publish(&frame()).await.unwrap();
        delivery.email.send(&email("a@x.com")).await.unwrap();
        delivery.email.send(&email("b@x.com")).await.unwrap();

        assert_eq!(sinks.frames().await, vec![frame()]);
        assert_eq!(sinks.emails_to("b@x.com").await.len(), 1);

        sinks.clear().await;
        assert!(sinks.emails().await.is_empty());
    }

    #[tokio::test]
    async fn failing_relay_records_nothing() {
        let sinks = RecordingSinks::failing_email();
        let err = sinks.send(&email("a@x.com")).await.unwrap_err();
        assert_eq!(err.code(), "delivery");
        assert!(sinks.emails().await.is_empty());
    }
}
