// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Traits at the seams between the core and its external sinks.

pub mod delivery;

pub use delivery::{
    EmailMessage, EmailSender, SlackMessage, SlackSender, WebsocketPublisher, WsFrame,
};
