// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Who may receive an alert about what.

use laika_core::{Attachment, AttachmentKind, Audit, LaikaError, Role, User};
use laika_storage::queries::{audits, entities};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewControl,
    ViewPolicy,
    ViewActionItem,
    ViewEvidence,
    ViewRequirement,
    ViewPopulation,
    ViewDraftReport,
    ViewAudit,
    ViewUser,
}

impl Permission {
    pub fn code(self) -> &'static str {
        match self {
            Permission::ViewControl => "control.view_control",
            Permission::ViewPolicy => "policy.view_policy",
            Permission::ViewActionItem => "action_item.view_actionitem",
            Permission::ViewEvidence => "fieldwork.view_evidence",
            Permission::ViewRequirement => "fieldwork.view_requirement",
            Permission::ViewPopulation => "population.view_population",
            Permission::ViewDraftReport => "audit.view_draftreport",
            Permission::ViewAudit => "audit.view_audit",
            Permission::ViewUser => "user.view_user",
        }
    }

    pub fn for_attachment(kind: AttachmentKind) -> Self {
        match kind {
            AttachmentKind::Control => Permission::ViewControl,
            AttachmentKind::Policy => Permission::ViewPolicy,
            AttachmentKind::Task => Permission::ViewActionItem,
            AttachmentKind::Evidence => Permission::ViewEvidence,
            AttachmentKind::Requirement => Permission::ViewRequirement,
            AttachmentKind::Population => Permission::ViewPopulation,
            AttachmentKind::DraftReport => Permission::ViewDraftReport,
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

const ALL: &[Permission] = &[
    Permission::ViewControl,
    Permission::ViewPolicy,
    Permission::ViewActionItem,
    Permission::ViewEvidence,
    Permission::ViewRequirement,
    Permission::ViewPopulation,
    Permission::ViewDraftReport,
    Permission::ViewAudit,
    Permission::ViewUser,
];

const VIEWER: &[Permission] = &[
    Permission::ViewControl,
    Permission::ViewPolicy,
    Permission::ViewActionItem,
    Permission::ViewEvidence,
    Permission::ViewRequirement,
    Permission::ViewPopulation,
    Permission::ViewDraftReport,
    Permission::ViewAudit,
];

const AUDITOR: &[Permission] = &[
    Permission::ViewEvidence,
    Permission::ViewRequirement,
    Permission::ViewPopulation,
    Permission::ViewDraftReport,
    Permission::ViewAudit,
];

const SALESPERSON: &[Permission] = &[
    Permission::ViewControl,
    Permission::ViewPolicy,
    Permission::ViewActionItem,
    Permission::ViewAudit,
];

/// The role to permission matrix.
pub fn role_permissions(role: Role) -> &'static [Permission] {
    match role {
        Role::SuperAdmin | Role::OrganizationAdmin | Role::OrganizationMember => ALL,
        Role::OrganizationViewer => VIEWER,
        Role::Auditor | Role::AuditorAdmin => AUDITOR,
        Role::Salesperson => SALESPERSON,
        Role::Concierge => &[],
    }
}

/// Roles that receive alerts at all.
pub fn is_eligible(role: Role) -> bool {
    !matches!(role, Role::Concierge)
}

/// The thing an alert is about, as far as access is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub organization_id: String,
    pub audit_id: Option<String>,
    pub permission: Option<Permission>,
}

impl Target {
    pub fn organization(organization_id: impl Into<String>, permission: Option<Permission>) -> Self {
        Self {
            organization_id: organization_id.into(),
            audit_id: None,
            permission,
        }
    }

    pub fn audit(audit: &Audit) -> Self {
        Self {
            organization_id: audit.organization_id.clone(),
            audit_id: Some(audit.id.clone()),
            permission: Some(Permission::ViewAudit),
        }
    }

    /// Target for a comment attachment. The owning organization and audit
    /// come from the attached entity.
    pub fn attachment(conn: &Connection, attachment: &Attachment) -> Result<Self, LaikaError> {
        let organization_id = entities::attachment_organization(conn, attachment)?.ok_or_else(|| {
            LaikaError::Service(format!(
                "{} {} does not exist",
                attachment.kind(),
                attachment.id()
            ))
        })?;
        Ok(Self {
            organization_id,
            audit_id: entities::attachment_audit(conn, attachment)?,
            permission: Some(Permission::for_attachment(attachment.kind())),
        })
    }
}

/// Whether `user` may be told about `target`.
pub fn can_receive(conn: &Connection, user: &User, target: &Target) -> Result<bool, LaikaError> {
    if !user.is_active || !is_eligible(user.role) {
        return Ok(false);
    }
    if user.role == Role::SuperAdmin {
        return Ok(true);
    }
    if let Some(permission) = target.permission {
        if !role_permissions(user.role).contains(&permission) {
            return Ok(false);
        }
    }
    if user.role.is_auditor() {
        if let Some(audit_id) = &target.audit_id {
            return audits::is_team_member(conn, audit_id, &user.id);
        }
    }
    Ok(user.organization_id == target.organization_id)
}
