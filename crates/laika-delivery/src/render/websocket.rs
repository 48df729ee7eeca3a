// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use laika_core::{User, WsFrame};
use laika_storage::AlertView;

/// Room shared by every auditor.
pub const AUDIT_GROUP: &str = "audit";

/// Auditors share one room; everyone else listens on their organization's.
pub fn websocket_group(user: &User) -> String {
    if user.role.is_auditor() {
        AUDIT_GROUP.to_string()
    } else {
        user.organization_id.clone()
    }
}

pub fn render_frame(view: &AlertView) -> WsFrame {
    WsFrame {
        sender: view.sender_name().to_string(),
        receiver_email: view.receiver.email.clone(),
        room_id: websocket_group(&view.receiver),
        alert_id: view.alert.id.clone(),
        alert_type: view.alert.alert_type,
    }
}
