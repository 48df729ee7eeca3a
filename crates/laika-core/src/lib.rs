// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Laika alerting and ingestion backbone.
//!
//! This crate provides the error taxonomy, the closed string enums persisted
//! by the store, the domain records and events shared by every other crate,
//! and the traits implemented by delivery sinks.

pub mod alert_type;
pub mod error;
pub mod events;
pub mod mention;
pub mod model;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use alert_type::{AlertFamily, AlertType, ReferenceKind};
pub use error::LaikaError;
pub use events::{DomainEvent, EventKind, MatchSubject};
pub use model::*;
pub use traits::{
    EmailMessage, EmailSender, SlackMessage, SlackSender, WebsocketPublisher, WsFrame,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_kinds_agree_with_alert_types() {
        let reference = AlertReference::Audit {
            audit_id: "a".into(),
        };
        assert_eq!(reference.kind(), AlertType::AuditInitiated.reference_kind());
        let reference = AlertReference::BackgroundCheck {
            laika_object_id: Some("o".into()),
            user_id: None,
        };
        assert_eq!(
            reference.kind(),
            AlertType::BackgroundCheckMultipleMatch.reference_kind()
        );
        assert_eq!(reference.kind().to_string(), "LOBackgroundCheckAlert");
    }
}
