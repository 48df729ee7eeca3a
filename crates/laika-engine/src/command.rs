// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound commands and their results, as they travel over the gateway.

use chrono::{DateTime, Utc};
use laika_core::{Attachment, AuditStage, BatchResult, ConnectionAccount, DiscoveryState, Role, Vendor};
use laika_vault::Credential;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum InboundCommand {
    #[serde(rename = "comment.add")]
    AddComment(NewComment),
    #[serde(rename = "comment.update")]
    UpdateComment(CommentEdit),
    #[serde(rename = "comment.resolve")]
    ResolveComment(CommentRef),
    #[serde(rename = "comment.delete")]
    DeleteComment(CommentRef),
    #[serde(rename = "reply.add")]
    AddReply(NewReply),
    #[serde(rename = "reply.delete")]
    DeleteReply(ReplyRef),
    #[serde(rename = "action_item.assign")]
    AssignActionItem(ActionItemAssignment),
    #[serde(rename = "action_item.complete")]
    CompleteActionItem(ActionItemRef),
    #[serde(rename = "audit_status.advance")]
    AdvanceAudit(AuditAdvance),
    #[serde(rename = "user.invite")]
    InviteUsers(InviteBatch),
    #[serde(rename = "user.confirm_discovery")]
    ConfirmDiscovery(DiscoveryDecision),
    #[serde(rename = "integration.connect")]
    ConnectIntegration(ConnectIntegration),
    #[serde(rename = "integration.poll_tick")]
    PollTick,
    #[serde(rename = "integration.remove")]
    RemoveConnection(ConnectionRef),
}

impl InboundCommand {
    /// The wire name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            InboundCommand::AddComment(_) => "comment.add",
            InboundCommand::UpdateComment(_) => "comment.update",
            InboundCommand::ResolveComment(_) => "comment.resolve",
            InboundCommand::DeleteComment(_) => "comment.delete",
            InboundCommand::AddReply(_) => "reply.add",
            InboundCommand::DeleteReply(_) => "reply.delete",
            InboundCommand::AssignActionItem(_) => "action_item.assign",
            InboundCommand::CompleteActionItem(_) => "action_item.complete",
            InboundCommand::AdvanceAudit(_) => "audit_status.advance",
            InboundCommand::InviteUsers(_) => "user.invite",
            InboundCommand::ConfirmDiscovery(_) => "user.confirm_discovery",
            InboundCommand::ConnectIntegration(_) => "integration.connect",
            InboundCommand::PollTick => "integration.poll_tick",
            InboundCommand::RemoveConnection(_) => "integration.remove",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub owner_id: String,
    pub attachment: Attachment,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEdit {
    pub comment_id: String,
    pub actor_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRef {
    pub comment_id: String,
    pub actor_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReply {
    pub comment_id: String,
    pub owner_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub reply_id: String,
    pub actor_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItemAssignment {
    pub action_item_id: String,
    pub assignee_id: String,
    #[serde(default)]
    pub actor_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItemRef {
    pub action_item_id: String,
    pub actor_id: String,
}

/// Move an audit forward. Without `to` the audit takes its next stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditAdvance {
    pub audit_id: String,
    #[serde(default)]
    pub actor_id: Option<String>,
    #[serde(default)]
    pub to: Option<AuditStage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::OrganizationMember
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteBatch {
    pub organization_id: String,
    pub invites: Vec<Invite>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryDecision {
    pub user_id: String,
    pub state: DiscoveryState,
}

/// Secret material for a new connection. Never echoed back.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialInput {
    ApiKey {
        key: String,
    },
    Oauth2 {
        access_token: String,
        #[serde(default)]
        refresh_token: Option<String>,
        #[serde(default)]
        expires_at: Option<DateTime<Utc>>,
    },
    Basic {
        username: String,
        password: String,
    },
}

impl std::fmt::Debug for CredentialInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            CredentialInput::ApiKey { .. } => "api_key",
            CredentialInput::Oauth2 { .. } => "oauth2",
            CredentialInput::Basic { .. } => "basic",
        };
        f.debug_struct("CredentialInput")
            .field("kind", &kind)
            .finish_non_exhaustive()
    }
}

impl CredentialInput {
    pub fn into_credential(self, connection_id: &str, vendor: Vendor) -> Credential {
        match self {
            CredentialInput::ApiKey { key } => Credential::api_key(connection_id, vendor, &key),
            CredentialInput::Oauth2 {
                access_token,
                refresh_token,
                expires_at,
            } => Credential::oauth2(
                connection_id,
                vendor,
                &access_token,
                refresh_token.as_deref(),
                expires_at,
            ),
            CredentialInput::Basic { username, password } => {
                Credential::basic(connection_id, vendor, &username, &password)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectIntegration {
    pub organization_id: String,
    pub vendor: Vendor,
    pub credential: CredentialInput,
    #[serde(default)]
    pub settings: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRef {
    pub connection_account_id: String,
}

/// A created comment or reply and the alerts it caused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posted {
    pub id: String,
    pub alert_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CommandOutput {
    Comment {
        comment_id: String,
        alert_ids: Vec<String>,
    },
    Reply {
        reply_id: String,
        alert_ids: Vec<String>,
    },
    Alerts {
        alert_ids: Vec<String>,
    },
    Done,
    Batch(BatchResult),
    Connection(ConnectionAccount),
    Removed {
        connection_account_id: String,
        removed_objects: usize,
    },
}
