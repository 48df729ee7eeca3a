// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The command engine.
//!
//! Every command runs in one store transaction. Its domain events are
//! dispatched on the bus inside that transaction, so alerts and delivery jobs
//! commit or roll back together with the change that caused them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use laika_core::{
    Attachment, BatchResult, Comment, CommentState, ConnectionAccount, ConnectionStatus,
    DiscoveryState, DomainEvent, LaikaError, Mention, MentionTarget, Reply, User, UserPreferences,
    mention, new_id,
};
use laika_storage::Database;
use laika_storage::queries::{audits, comments, connections, entities, organizations, users};
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::bus::EventBus;
use crate::command::{
    ActionItemAssignment, ActionItemRef, AuditAdvance, CommandOutput, CommentEdit, CommentRef,
    ConnectIntegration, DiscoveryDecision, InboundCommand, InviteBatch, NewComment, NewReply,
    Posted, ReplyRef,
};
use crate::correlation::correlate_user;
use crate::permission::{Target, can_receive};
use crate::poller::PollRunner;

pub struct Engine {
    db: Database,
    bus: EventBus,
    poller: Arc<PollRunner>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("bus", &self.bus)
            .field("poller", &self.poller)
            .finish_non_exhaustive()
    }
}

fn require_user(conn: &Connection, id: &str) -> Result<User, LaikaError> {
    users::get_user(conn, id)?.ok_or_else(|| LaikaError::Service(format!("user {id} does not exist")))
}

fn live_comment(conn: &Connection, id: &str) -> Result<Comment, LaikaError> {
    match comments::get_comment(conn, id)? {
        Some(comment) if !comment.is_deleted => Ok(comment),
        _ => Err(LaikaError::Service(format!("comment {id} does not exist"))),
    }
}

fn non_empty(content: &str) -> Result<&str, LaikaError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(LaikaError::Service("content must not be empty".into()));
    }
    Ok(content)
}

/// Owners edit their own content. Admins of the organization may delete it.
fn may_remove(actor: &User, owner_id: &str, organization_id: &str) -> bool {
    actor.id == owner_id
        || (actor.role.is_admin() && actor.organization_id == organization_id)
        || actor.role == laika_core::Role::SuperAdmin
}

/// Where a piece of mentioning content lives.
struct MentionSite<'a> {
    organization_id: &'a str,
    sender_id: &'a str,
    target: MentionTarget,
    comment_id: &'a str,
    attachment: &'a Attachment,
}

/// Store the mentions in `content` and return one event per newly mentioned
/// user. Mentions already recorded for the target stay silent.
fn mention_events(
    conn: &Connection,
    site: &MentionSite<'_>,
    content: &str,
    now: DateTime<Utc>,
) -> Result<Vec<DomainEvent>, LaikaError> {
    let target = &site.target;
    let mut events = Vec::new();
    for email in mention::parse_mentions(content) {
        let Some(user) = users::find_mentionable(conn, site.organization_id, &email)? else {
            debug!(%email, "mention of unknown user ignored");
            continue;
        };
        let fresh = comments::insert_mention(
            conn,
            &Mention {
                id: new_id(),
                user_id: user.id.clone(),
                target: target.clone(),
                created_at: now,
            },
        )?;
        if fresh {
            events.push(DomainEvent::Mention {
                sender_id: site.sender_id.to_string(),
                mentioned_user_id: user.id,
                target: target.clone(),
                comment_id: site.comment_id.to_string(),
                attachment: site.attachment.clone(),
            });
        }
    }
    Ok(events)
}

impl Engine {
    pub fn new(db: Database, bus: EventBus, poller: PollRunner) -> Self {
        Self {
            db,
            bus,
            poller: Arc::new(poller),
            shutdown: CancellationToken::new(),
        }
    }

    /// Share the process-wide cancellation token with vendor calls.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn poller(&self) -> &Arc<PollRunner> {
        &self.poller
    }

    /// Execute one inbound command.
    #[instrument(skip_all, fields(command = command.name()))]
    pub async fn dispatch(&self, command: InboundCommand) -> Result<CommandOutput, LaikaError> {
        let output = match command {
            InboundCommand::AddComment(input) => {
                let posted = self.add_comment(input).await?;
                CommandOutput::Comment {
                    comment_id: posted.id,
                    alert_ids: posted.alert_ids,
                }
            }
            InboundCommand::UpdateComment(input) => CommandOutput::Alerts {
                alert_ids: self.update_comment(input).await?,
            },
            InboundCommand::ResolveComment(input) => CommandOutput::Alerts {
                alert_ids: self.resolve_comment(input).await?,
            },
            InboundCommand::DeleteComment(input) => {
                self.delete_comment(input).await?;
                CommandOutput::Done
            }
            InboundCommand::AddReply(input) => {
                let posted = self.add_reply(input).await?;
                CommandOutput::Reply {
                    reply_id: posted.id,
                    alert_ids: posted.alert_ids,
                }
            }
            InboundCommand::DeleteReply(input) => {
                self.delete_reply(input).await?;
                CommandOutput::Done
            }
            InboundCommand::AssignActionItem(input) => CommandOutput::Alerts {
                alert_ids: self.assign_action_item(input).await?,
            },
            InboundCommand::CompleteActionItem(input) => CommandOutput::Alerts {
                alert_ids: self.complete_action_item(input).await?,
            },
            InboundCommand::AdvanceAudit(input) => CommandOutput::Alerts {
                alert_ids: self.advance_audit(input).await?,
            },
            InboundCommand::InviteUsers(batch) => CommandOutput::Batch(self.invite_users(batch).await?),
            InboundCommand::ConfirmDiscovery(input) => {
                self.confirm_discovery(input).await?;
                CommandOutput::Done
            }
            InboundCommand::ConnectIntegration(input) => {
                CommandOutput::Connection(self.connect_integration(input).await?)
            }
            InboundCommand::PollTick => CommandOutput::Batch(self.poll_tick().await?),
            InboundCommand::RemoveConnection(input) => {
                let removed = self.remove_connection(&input.connection_account_id).await?;
                CommandOutput::Removed {
                    connection_account_id: input.connection_account_id,
                    removed_objects: removed,
                }
            }
        };
        Ok(output)
    }

    pub async fn add_comment(&self, input: NewComment) -> Result<Posted, LaikaError> {
        let bus = self.bus.clone();
        self.db
            .transaction(move |tx| {
                let now = Utc::now();
                let content = non_empty(&input.content)?.to_string();
                let owner = require_user(tx, &input.owner_id)?;
                let target = Target::attachment(tx, &input.attachment)?;
                if !can_receive(tx, &owner, &target)? {
                    return Err(LaikaError::PermissionDenied(format!(
                        "user {} cannot comment on {} {}",
                        owner.id,
                        input.attachment.kind(),
                        input.attachment.id()
                    )));
                }
                let comment = Comment {
                    id: new_id(),
                    organization_id: target.organization_id.clone(),
                    owner_id: owner.id.clone(),
                    content,
                    attachment: input.attachment,
                    state: CommentState::Unresolved,
                    resolved_by: None,
                    resolved_at: None,
                    is_deleted: false,
                    created_at: now,
                    updated_at: now,
                };
                comments::insert_comment(tx, &comment)?;
                let site = MentionSite {
                    organization_id: &comment.organization_id,
                    sender_id: &owner.id,
                    target: MentionTarget::Comment(comment.id.clone()),
                    comment_id: &comment.id,
                    attachment: &comment.attachment,
                };
                let events = mention_events(tx, &site, &comment.content, now)?;
                let dispatched = bus.dispatch(tx, events, now)?;
                Ok(Posted {
                    id: comment.id,
                    alert_ids: dispatched.alert_ids,
                })
            })
            .await
    }

    /// Replace a comment's content. Only users mentioned for the first time
    /// are alerted.
    pub async fn update_comment(&self, input: CommentEdit) -> Result<Vec<String>, LaikaError> {
        let bus = self.bus.clone();
        self.db
            .transaction(move |tx| {
                let now = Utc::now();
                let comment = live_comment(tx, &input.comment_id)?;
                if comment.owner_id != input.actor_id {
                    return Err(LaikaError::PermissionDenied(format!(
                        "only the owner may edit comment {}",
                        comment.id
                    )));
                }
                let content = non_empty(&input.content)?;
                comments::update_comment_content(tx, &comment.id, content, now)?;
                let site = MentionSite {
                    organization_id: &comment.organization_id,
                    sender_id: &comment.owner_id,
                    target: MentionTarget::Comment(comment.id.clone()),
                    comment_id: &comment.id,
                    attachment: &comment.attachment,
                };
                let events = mention_events(tx, &site, content, now)?;
                Ok(bus.dispatch(tx, events, now)?.alert_ids)
            })
            .await
    }

    pub async fn resolve_comment(&self, input: CommentRef) -> Result<Vec<String>, LaikaError> {
        let bus = self.bus.clone();
        self.db
            .transaction(move |tx| {
                let now = Utc::now();
                let comment = live_comment(tx, &input.comment_id)?;
                if comment.state == CommentState::Resolved {
                    return Ok(Vec::new());
                }
                let actor = require_user(tx, &input.actor_id)?;
                let target = Target::attachment(tx, &comment.attachment)?;
                if !can_receive(tx, &actor, &target)? {
                    return Err(LaikaError::PermissionDenied(format!(
                        "user {} cannot resolve comment {}",
                        actor.id, comment.id
                    )));
                }
                comments::resolve_comment(tx, &comment.id, &actor.id, now)?;
                let event = DomainEvent::Resolve {
                    sender_id: actor.id,
                    comment_id: comment.id,
                    attachment: comment.attachment,
                };
                Ok(bus.dispatch(tx, vec![event], now)?.alert_ids)
            })
            .await
    }

    pub async fn delete_comment(&self, input: CommentRef) -> Result<(), LaikaError> {
        self.db
            .transaction(move |tx| {
                let comment = live_comment(tx, &input.comment_id)?;
                let actor = require_user(tx, &input.actor_id)?;
                if !may_remove(&actor, &comment.owner_id, &comment.organization_id) {
                    return Err(LaikaError::PermissionDenied(format!(
                        "user {} cannot delete comment {}",
                        actor.id, comment.id
                    )));
                }
                comments::soft_delete_comment(tx, &comment.id, Utc::now())
            })
            .await
    }

    /// Reply to a comment. The comment owner hears about it unless they
    /// wrote the reply, then anyone newly mentioned in it.
    pub async fn add_reply(&self, input: NewReply) -> Result<Posted, LaikaError> {
        let bus = self.bus.clone();
        self.db
            .transaction(move |tx| {
                let now = Utc::now();
                let content = non_empty(&input.content)?.to_string();
                let comment = live_comment(tx, &input.comment_id)?;
                let owner = require_user(tx, &input.owner_id)?;
                let target = Target::attachment(tx, &comment.attachment)?;
                if !can_receive(tx, &owner, &target)? {
                    return Err(LaikaError::PermissionDenied(format!(
                        "user {} cannot reply to comment {}",
                        owner.id, comment.id
                    )));
                }
                let reply = Reply {
                    id: new_id(),
                    comment_id: comment.id.clone(),
                    owner_id: owner.id.clone(),
                    content,
                    is_deleted: false,
                    created_at: now,
                    updated_at: now,
                };
                comments::insert_reply(tx, &reply)?;

                let mut events = vec![DomainEvent::Reply {
                    sender_id: owner.id.clone(),
                    comment_id: comment.id.clone(),
                    reply_id: reply.id.clone(),
                    attachment: comment.attachment.clone(),
                }];
                let site = MentionSite {
                    organization_id: &comment.organization_id,
                    sender_id: &owner.id,
                    target: MentionTarget::Reply(reply.id.clone()),
                    comment_id: &comment.id,
                    attachment: &comment.attachment,
                };
                events.extend(mention_events(tx, &site, &reply.content, now)?);
                let dispatched = bus.dispatch(tx, events, now)?;
                Ok(Posted {
                    id: reply.id,
                    alert_ids: dispatched.alert_ids,
                })
            })
            .await
    }

    pub async fn delete_reply(&self, input: ReplyRef) -> Result<(), LaikaError> {
        self.db
            .transaction(move |tx| {
                let reply = match comments::get_reply(tx, &input.reply_id)? {
                    Some(reply) if !reply.is_deleted => reply,
                    _ => {
                        return Err(LaikaError::Service(format!(
                            "reply {} does not exist",
                            input.reply_id
                        )));
                    }
                };
                let comment = comments::get_comment(tx, &reply.comment_id)?.ok_or_else(|| {
                    LaikaError::Service(format!("comment {} does not exist", reply.comment_id))
                })?;
                let actor = require_user(tx, &input.actor_id)?;
                if !may_remove(&actor, &reply.owner_id, &comment.organization_id) {
                    return Err(LaikaError::PermissionDenied(format!(
                        "user {} cannot delete reply {}",
                        actor.id, reply.id
                    )));
                }
                comments::soft_delete_reply(tx, &reply.id, Utc::now())
            })
            .await
    }

    pub async fn assign_action_item(
        &self,
        input: ActionItemAssignment,
    ) -> Result<Vec<String>, LaikaError> {
        let bus = self.bus.clone();
        self.db
            .transaction(move |tx| {
                let now = Utc::now();
                let item = entities::get_action_item(tx, &input.action_item_id)?.ok_or_else(|| {
                    LaikaError::NotFound {
                        resource: format!("action item {}", input.action_item_id),
                    }
                })?;
                let assignee = require_user(tx, &input.assignee_id)?;
                if assignee.organization_id != item.organization_id {
                    return Err(LaikaError::Service(format!(
                        "user {} is not a member of organization {}",
                        assignee.id, item.organization_id
                    )));
                }
                entities::assign_action_item(tx, &item.id, &assignee.id)?;
                let event = if item.control_id.is_some() {
                    DomainEvent::ControlActionItemAssignment {
                        sender_id: input.actor_id,
                        assignee_id: assignee.id,
                        action_item_id: item.id,
                    }
                } else {
                    DomainEvent::NewAssignment {
                        sender_id: input.actor_id,
                        assignee_id: assignee.id,
                        action_item_id: item.id,
                    }
                };
                Ok(bus.dispatch(tx, vec![event], now)?.alert_ids)
            })
            .await
    }

    /// Mark an action item done. Its creator is told when someone else
    /// finished it.
    pub async fn complete_action_item(&self, input: ActionItemRef) -> Result<Vec<String>, LaikaError> {
        let bus = self.bus.clone();
        self.db
            .transaction(move |tx| {
                let now = Utc::now();
                let item = entities::get_action_item(tx, &input.action_item_id)?.ok_or_else(|| {
                    LaikaError::NotFound {
                        resource: format!("action item {}", input.action_item_id),
                    }
                })?;
                if item.completed_at.is_some() {
                    return Ok(Vec::new());
                }
                entities::complete_action_item(tx, &item.id, now)?;
                let events: Vec<DomainEvent> = item
                    .created_by
                    .filter(|creator| *creator != input.actor_id)
                    .map(|creator| DomainEvent::AssignmentCompleted {
                        sender_id: input.actor_id,
                        receiver_id: creator,
                        action_item_id: item.id,
                    })
                    .into_iter()
                    .collect();
                Ok(bus.dispatch(tx, events, now)?.alert_ids)
            })
            .await
    }

    /// Move an audit strictly forward, to `to` or its next stage.
    pub async fn advance_audit(&self, input: AuditAdvance) -> Result<Vec<String>, LaikaError> {
        let bus = self.bus.clone();
        self.db
            .transaction(move |tx| {
                let now = Utc::now();
                let audit = audits::get_audit(tx, &input.audit_id)?.ok_or_else(|| {
                    LaikaError::NotFound {
                        resource: format!("audit {}", input.audit_id),
                    }
                })?;
                let from = audit.stage;
                let to = match input.to {
                    Some(to) => to,
                    None => from.next().ok_or_else(|| {
                        LaikaError::Service(format!("audit {} is already completed", audit.id))
                    })?,
                };
                if to <= from {
                    return Err(LaikaError::Service(format!(
                        "audit {} cannot move from {from} to {to}",
                        audit.id
                    )));
                }
                audits::update_stage(tx, &audit.id, to, now)?;
                info!(audit = %audit.id, %from, %to, "audit advanced");
                let event = DomainEvent::AuditStageChanged {
                    sender_id: input.actor_id,
                    audit_id: audit.id,
                    from,
                    to,
                };
                Ok(bus.dispatch(tx, vec![event], now)?.alert_ids)
            })
            .await
    }

    /// Create users one by one. A failed invite is recorded and the rest of
    /// the batch still runs.
    pub async fn invite_users(&self, batch: InviteBatch) -> Result<BatchResult, LaikaError> {
        let organization_id = batch.organization_id;
        let known = organization_id.clone();
        let exists = self
            .db
            .call(move |conn| organizations::get_organization(conn, &known))
            .await?
            .is_some();
        if !exists {
            return Err(LaikaError::NotFound {
                resource: format!("organization {organization_id}"),
            });
        }

        let mut result = BatchResult::default();
        for invite in batch.invites {
            let email = invite.email.trim().to_lowercase();
            let label = if email.is_empty() {
                invite.email.clone()
            } else {
                email.clone()
            };
            let bus = self.bus.clone();
            let org = organization_id.clone();
            let address = email.clone();
            let outcome = self
                .db
                .transaction(move |tx| {
                    let now = Utc::now();
                    if address.is_empty() {
                        return Err(LaikaError::Value("invite without an e-mail".into()));
                    }
                    if users::get_user_by_email(tx, &org, &address)?.is_some() {
                        return Err(LaikaError::Service(format!("{address} is already a member")));
                    }
                    let user = User {
                        id: new_id(),
                        organization_id: org,
                        email: address,
                        first_name: invite.first_name.trim().to_string(),
                        last_name: invite.last_name.trim().to_string(),
                        role: invite.role,
                        preferences: UserPreferences::default(),
                        discovery_state: DiscoveryState::Confirmed,
                        employment_type: None,
                        is_active: true,
                        date_joined: now,
                    };
                    users::insert_user(tx, &user)?;
                    let events: Vec<DomainEvent> = correlate_user(tx, &user, now)?.into_iter().collect();
                    bus.dispatch(tx, events, now)
                })
                .await;
            match outcome {
                Ok(dispatched) => {
                    debug!(email = %label, alerts = dispatched.alert_ids.len(), "user invited");
                    result.record_success();
                }
                Err(e) => {
                    warn!(email = %label, error = %e, "invite failed");
                    result.record_failure(label);
                }
            }
        }
        Ok(result)
    }

    pub async fn confirm_discovery(&self, input: DiscoveryDecision) -> Result<(), LaikaError> {
        if input.state == DiscoveryState::New {
            return Err(LaikaError::Value("discovery can only be confirmed or ignored".into()));
        }
        self.db
            .transaction(move |tx| {
                let user = users::get_user(tx, &input.user_id)?.ok_or_else(|| LaikaError::NotFound {
                    resource: format!("user {}", input.user_id),
                })?;
                if user.discovery_state != DiscoveryState::New {
                    return Err(LaikaError::Service(format!(
                        "user {} is not awaiting confirmation",
                        user.id
                    )));
                }
                users::update_discovery_state(tx, &user.id, input.state)?;
                Ok(())
            })
            .await
    }

    /// Register a connection, store its credential, and try it once. The
    /// returned account carries the outcome in `status`.
    pub async fn connect_integration(
        &self,
        input: ConnectIntegration,
    ) -> Result<ConnectionAccount, LaikaError> {
        self.poller.registry().get(input.vendor)?;
        let now = Utc::now();
        let settings = if input.settings.is_null() {
            serde_json::json!({})
        } else {
            input.settings
        };
        let account = ConnectionAccount {
            id: new_id(),
            organization_id: input.organization_id,
            vendor: input.vendor,
            status: ConnectionStatus::Pending,
            error_message: None,
            settings,
            since: None,
            cursor: None,
            metrics: serde_json::json!({}),
            last_run_at: None,
            created_at: now,
            updated_at: now,
        };

        let row = account.clone();
        self.db
            .call(move |conn| {
                if organizations::get_organization(conn, &row.organization_id)?.is_none() {
                    return Err(LaikaError::NotFound {
                        resource: format!("organization {}", row.organization_id),
                    });
                }
                connections::insert_connection(conn, &row)
            })
            .await?;
        self.poller
            .vault()
            .store(&input.credential.into_credential(&account.id, account.vendor))
            .await?;

        let id = account.id.clone();
        match self.poller.test_connection(&account, &self.shutdown).await {
            Ok(()) => {
                info!(connection = %id, vendor = %account.vendor, "integration connected");
                self.db
                    .call(move |conn| connections::mark_success(conn, &id, Utc::now()))
                    .await?;
            }
            Err(e) => {
                warn!(connection = %id, vendor = %account.vendor, error = %e, "credential test failed");
                let message = e.to_string();
                self.db
                    .call(move |conn| connections::mark_error(conn, &id, &message, Utc::now()))
                    .await?;
            }
        }

        let id = account.id.clone();
        self.db
            .call(move |conn| connections::get_connection(conn, &id))
            .await?
            .ok_or_else(|| LaikaError::Internal(format!("connection {} vanished", account.id)))
    }

    pub async fn poll_tick(&self) -> Result<BatchResult, LaikaError> {
        self.poller.poll_tick(&self.shutdown).await
    }

    /// Delete a connection with its objects and credential. Returns how many
    /// objects went with it.
    pub async fn remove_connection(&self, connection_id: &str) -> Result<usize, LaikaError> {
        let bus = self.bus.clone();
        let id = connection_id.to_string();
        self.db
            .transaction(move |tx| {
                let account = connections::get_connection(tx, &id)?.ok_or_else(|| {
                    LaikaError::NotFound {
                        resource: format!("connection account {id}"),
                    }
                })?;
                let removed = connections::delete_connection(tx, &account.id)?.unwrap_or(0);
                info!(connection = %account.id, removed, "connection removed");
                bus.dispatch(
                    tx,
                    vec![DomainEvent::ConnectionRemoved {
                        organization_id: account.organization_id,
                        connection_account_id: account.id,
                        removed_objects: removed,
                    }],
                    Utc::now(),
                )?;
                Ok(removed)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use laika_config::model::PollingConfig;
    use laika_connectors::{Connector, ConnectorRegistry, ConnectorSession, Page, Scope};
    use laika_core::{
        ActionItem, AlertReference, AlertType, AttachmentKind, AuditStage, Cursor, ObjectType,
        Role, Vendor,
    };
    use laika_storage::queries::{alerts, objects};
    use serde_json::json;

    use crate::command::{CredentialInput, Invite};
    use crate::testing::{engine, engine_with, seed_audit, seed_people, seed_user};

    async fn alert_rows(engine: &Engine, ids: Vec<String>) -> Vec<(laika_core::Alert, AlertReference)> {
        engine
            .database()
            .call(move |conn| {
                let mut out = Vec::new();
                for id in ids {
                    out.extend(alerts::get_alert(conn, &id)?);
                }
                Ok(out)
            })
            .await
            .unwrap()
    }

    fn comment_by(owner: &str, content: &str) -> NewComment {
        NewComment {
            owner_id: owner.into(),
            attachment: Attachment::Control("ctl".into()),
            content: content.into(),
        }
    }

    #[tokio::test]
    async fn mention_alerts_the_mentioned_user() {
        let engine = engine().await;
        seed_people(&engine).await;

        let posted = engine.add_comment(comment_by("b", "Hi @(a@x.com)")).await.unwrap();
        let rows = alert_rows(&engine, posted.alert_ids).await;
        assert_eq!(rows.len(), 1);
        let (alert, reference) = &rows[0];
        assert_eq!(alert.alert_type, AlertType::mention_for(AttachmentKind::Control));
        assert_eq!(alert.sender_id.as_deref(), Some("b"));
        assert_eq!(alert.receiver_id, "a");
        assert_eq!(
            *reference,
            AlertReference::Comment {
                comment_id: posted.id
            }
        );
    }

    #[tokio::test]
    async fn comment_preconditions() {
        let engine = engine().await;
        seed_people(&engine).await;

        let err = engine.add_comment(comment_by("b", "   ")).await.unwrap_err();
        assert_eq!(err.code(), "service_exception");

        let mut missing = comment_by("b", "hello");
        missing.attachment = Attachment::Policy("nope".into());
        let err = engine.add_comment(missing).await.unwrap_err();
        assert_eq!(err.code(), "service_exception");

        engine
            .database()
            .call(|conn| {
                crate::testing::seed_org(conn, "o2");
                seed_user(conn, "z", "o2", "z@y.com", "Z", "", Role::OrganizationMember);
                Ok(())
            })
            .await
            .unwrap();
        let err = engine.add_comment(comment_by("z", "hello")).await.unwrap_err();
        assert_eq!(err.code(), "permission_denied");
    }

    #[tokio::test]
    async fn editing_alerts_only_new_mentions() {
        let engine = engine().await;
        seed_people(&engine).await;
        let posted = engine.add_comment(comment_by("b", "Hi @(a@x.com)")).await.unwrap();

        let edit = |actor: &str, content: &str| CommentEdit {
            comment_id: posted.id.clone(),
            actor_id: actor.into(),
            content: content.into(),
        };
        let ids = engine
            .update_comment(edit("b", "Hi @(a@x.com) and @(ADM@x.com)"))
            .await
            .unwrap();
        let rows = alert_rows(&engine, ids).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.receiver_id, "adm");

        let err = engine.update_comment(edit("a", "mine now")).await.unwrap_err();
        assert_eq!(err.code(), "permission_denied");
    }

    #[tokio::test]
    async fn replying_to_your_own_comment_is_silent() {
        let engine = engine().await;
        seed_people(&engine).await;
        let posted = engine.add_comment(comment_by("a", "note to self")).await.unwrap();

        let own = engine
            .add_reply(NewReply {
                comment_id: posted.id.clone(),
                owner_id: "a".into(),
                content: "and another".into(),
            })
            .await
            .unwrap();
        assert!(own.alert_ids.is_empty());

        let other = engine
            .add_reply(NewReply {
                comment_id: posted.id.clone(),
                owner_id: "b".into(),
                content: "seen it".into(),
            })
            .await
            .unwrap();
        let rows = alert_rows(&engine, other.alert_ids).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.alert_type, AlertType::reply_for(AttachmentKind::Control));
        assert_eq!(rows[0].1, AlertReference::Reply { reply_id: other.id });
    }

    #[tokio::test]
    async fn resolve_and_delete() {
        let engine = engine().await;
        seed_people(&engine).await;
        let posted = engine.add_comment(comment_by("a", "please check")).await.unwrap();
        let target = |actor: &str| CommentRef {
            comment_id: posted.id.clone(),
            actor_id: actor.into(),
        };

        let ids = engine.resolve_comment(target("b")).await.unwrap();
        assert_eq!(alert_rows(&engine, ids).await[0].0.receiver_id, "a");
        assert!(engine.resolve_comment(target("b")).await.unwrap().is_empty());

        let id = posted.id.clone();
        let stored = engine
            .database()
            .call(move |conn| comments::get_comment(conn, &id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.state, CommentState::Resolved);
        assert_eq!(stored.resolved_by.as_deref(), Some("b"));
        assert!(stored.resolved_at.is_some());

        let err = engine.delete_comment(target("b")).await.unwrap_err();
        assert_eq!(err.code(), "permission_denied");
        engine.delete_comment(target("adm")).await.unwrap();
        let err = engine.resolve_comment(target("a")).await.unwrap_err();
        assert_eq!(err.code(), "service_exception");
    }

    #[tokio::test]
    async fn action_items_alert_assignee_then_creator() {
        let engine = engine().await;
        seed_people(&engine).await;
        engine
            .database()
            .call(|conn| {
                entities::insert_action_item(
                    conn,
                    &ActionItem {
                        id: "ai1".into(),
                        organization_id: "o1".into(),
                        name: "Rotate keys".into(),
                        control_id: Some("ctl".into()),
                        assignee_id: None,
                        created_by: Some("adm".into()),
                        due_date: None,
                        completed_at: None,
                        created_at: Utc::now(),
                    },
                )
            })
            .await
            .unwrap();

        let ids = engine
            .assign_action_item(ActionItemAssignment {
                action_item_id: "ai1".into(),
                assignee_id: "a".into(),
                actor_id: Some("adm".into()),
            })
            .await
            .unwrap();
        let rows = alert_rows(&engine, ids).await;
        assert_eq!(rows[0].0.alert_type, AlertType::ControlActionItemAssignment);
        assert_eq!(rows[0].0.receiver_id, "a");

        let done = |actor: &str| ActionItemRef {
            action_item_id: "ai1".into(),
            actor_id: actor.into(),
        };
        let ids = engine.complete_action_item(done("a")).await.unwrap();
        let rows = alert_rows(&engine, ids).await;
        assert_eq!(rows[0].0.alert_type, AlertType::AssignmentCompleted);
        assert_eq!(rows[0].0.receiver_id, "adm");
        assert!(engine.complete_action_item(done("a")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn audit_advance_alerts_team_and_admins() {
        let engine = engine().await;
        seed_people(&engine).await;
        engine
            .database()
            .call(|conn| {
                crate::testing::seed_org(conn, "firm");
                seed_audit(conn, "au1", "o1");
                for n in 1..=3 {
                    let id = format!("aud{n}");
                    seed_user(conn, &id, "firm", &format!("{id}@firm.com"), "Aud", "", Role::Auditor);
                    audits::add_team_member(conn, "au1", &id)?;
                }
                Ok(())
            })
            .await
            .unwrap();

        let advance = |to| AuditAdvance {
            audit_id: "au1".into(),
            actor_id: None,
            to,
        };
        let ids = engine.advance_audit(advance(None)).await.unwrap();
        let rows = alert_rows(&engine, ids).await;
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|(a, r)| a.alert_type == AlertType::AuditInitiated
            && *r == AlertReference::Audit { audit_id: "au1".into() }));

        let err = engine
            .advance_audit(advance(Some(AuditStage::Requested)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "service_exception");
        assert!(engine
            .advance_audit(advance(Some(AuditStage::Fieldwork)))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn invite_reports_ambiguous_background_checks() {
        let engine = engine().await;
        seed_people(&engine).await;
        engine
            .database()
            .call(|conn| {
                for id in ["bc1", "bc2"] {
                    let data = json!({"Id": id, "First Name": "Leo", "Last Name": "Messi"});
                    objects::upsert_object(
                        conn,
                        "o1",
                        ObjectType::BackgroundCheck,
                        None,
                        data.as_object().cloned().unwrap_or_default(),
                        Utc::now(),
                    )?;
                }
                Ok(())
            })
            .await
            .unwrap();

        let invite = |email: &str| Invite {
            email: email.into(),
            first_name: "Leo".into(),
            last_name: "Messi".into(),
            role: Role::OrganizationMember,
        };
        let result = engine
            .invite_users(InviteBatch {
                organization_id: "o1".into(),
                invites: vec![invite("leo@x.com"), invite("A@x.com")],
            })
            .await
            .unwrap();
        assert_eq!(result.success_count, 1);
        assert_eq!(result.failed_ids, vec!["a@x.com".to_string()]);

        let multiple = engine
            .database()
            .call(|conn| alerts::list_by_type(conn, AlertType::BackgroundCheckMultipleMatch))
            .await
            .unwrap();
        assert_eq!(multiple.len(), 1);
    }

    #[tokio::test]
    async fn discovery_confirmation_is_one_shot() {
        let engine = engine().await;
        seed_people(&engine).await;
        engine
            .database()
            .call(|conn| users::update_discovery_state(conn, "b", DiscoveryState::New).map(|_| ()))
            .await
            .unwrap();
        let decide = |state| DiscoveryDecision {
            user_id: "b".into(),
            state,
        };

        let err = engine.confirm_discovery(decide(DiscoveryState::New)).await.unwrap_err();
        assert_eq!(err.code(), "value_error");
        engine.confirm_discovery(decide(DiscoveryState::Ignored)).await.unwrap();
        let err = engine
            .confirm_discovery(decide(DiscoveryState::Confirmed))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "service_exception");
    }

    struct ScriptedConnector {
        vendor: Vendor,
        accepts: bool,
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        fn vendor(&self) -> Vendor {
            self.vendor
        }

        async fn test_credentials(&self, _session: &mut ConnectorSession<'_>) -> Result<(), LaikaError> {
            if self.accepts {
                Ok(())
            } else {
                Err(LaikaError::ConfigurationError {
                    message: "invalid api key".into(),
                })
            }
        }

        async fn discover_scope(&self, _session: &mut ConnectorSession<'_>) -> Result<Vec<Scope>, LaikaError> {
            Ok(vec![Scope::new("account", "Account")])
        }

        async fn pull(
            &self,
            _session: &mut ConnectorSession<'_>,
            _scope: &Scope,
            _since: Option<DateTime<Utc>>,
            _cursor: Option<Cursor>,
        ) -> Result<Page, LaikaError> {
            Ok(Page::empty())
        }
    }

    #[tokio::test]
    async fn connect_tests_the_credential_and_remove_cascades() {
        let mut registry = ConnectorRegistry::new();
        registry.register(Arc::new(ScriptedConnector {
            vendor: Vendor::Datadog,
            accepts: true,
        }));
        registry.register(Arc::new(ScriptedConnector {
            vendor: Vendor::Github,
            accepts: false,
        }));
        let engine = engine_with(registry, PollingConfig::default()).await;
        seed_people(&engine).await;

        let connect = |vendor| ConnectIntegration {
            organization_id: "o1".into(),
            vendor,
            credential: CredentialInput::ApiKey { key: "k".into() },
            settings: serde_json::Value::Null,
        };
        let good = engine.connect_integration(connect(Vendor::Datadog)).await.unwrap();
        assert_eq!(good.status, ConnectionStatus::Success);
        let bad = engine.connect_integration(connect(Vendor::Github)).await.unwrap();
        assert_eq!(bad.status, ConnectionStatus::Error);
        assert!(bad.error_message.unwrap().contains("invalid api key"));

        let err = engine.connect_integration(connect(Vendor::Okta)).await.unwrap_err();
        assert_eq!(err.code(), "adapter_not_found");

        let good_id = good.id.clone();
        engine
            .database()
            .call(move |conn| {
                let data = json!({"Id": "m1", "Name": "cpu"});
                objects::upsert_object(
                    conn,
                    "o1",
                    ObjectType::Monitor,
                    Some(&good_id),
                    data.as_object().cloned().unwrap_or_default(),
                    Utc::now(),
                )?;
                Ok(())
            })
            .await
            .unwrap();
        let output = engine
            .dispatch(InboundCommand::RemoveConnection(crate::command::ConnectionRef {
                connection_account_id: good.id.clone(),
            }))
            .await
            .unwrap();
        assert_eq!(
            output,
            CommandOutput::Removed {
                connection_account_id: good.id,
                removed_objects: 1
            }
        );
        let err = engine.remove_connection("nope").await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn dispatch_routes_wire_commands() {
        let engine = engine().await;
        seed_people(&engine).await;
        let command: InboundCommand = serde_json::from_value(json!({
            "command": "comment.add",
            "owner_id": "b",
            "attachment": {"kind": "control", "id": "ctl"},
            "content": "Hi @(a@x.com)"
        }))
        .unwrap();
        let CommandOutput::Comment { alert_ids, .. } = engine.dispatch(command).await.unwrap() else {
            panic!("expected a comment result");
        };
        assert_eq!(alert_ids.len(), 1);

        let tick = engine.dispatch(InboundCommand::PollTick).await.unwrap();
        assert_eq!(tick, CommandOutput::Batch(BatchResult::default()));
    }
}
