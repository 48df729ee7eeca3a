// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound sink traits for the three delivery channels.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::alert_type::AlertType;
use crate::error::LaikaError;

/// Templated e-mail: template name plus JSON context, rendered by the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub template: String,
    pub context: serde_json::Value,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), LaikaError>;
}

/// Frame pushed to every socket subscribed to `room_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsFrame {
    pub sender: String,
    pub receiver_email: String,
    pub room_id: String,
    pub alert_id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
}

#[async_trait]
pub trait WebsocketPublisher: Send + Sync {
    async fn publish(&self, frame: &WsFrame) -> Result<(), LaikaError>;
}

/// `chat.postMessage` body minus the channel, which the sender resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackMessage {
    pub text: String,
    pub blocks: Vec<serde_json::Value>,
}

#[async_trait]
pub trait SlackSender: Send + Sync {
    /// Post `message` as a direct message to the Slack user behind
    /// `receiver_email` in the organization's workspace.
    async fn post(
        &self,
        organization_id: &str,
        receiver_email: &str,
        message: &SlackMessage,
    ) -> Result<(), LaikaError>;
}
