// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-channel rendering of an [`AlertView`].
//!
//! Every channel starts from the same placeholder substitution and the same
//! deep link, then shapes the result for its wire format.

pub mod email;
pub mod slack;
pub mod websocket;

use laika_config::model::UrlsConfig;
use laika_core::{AlertReference, Attachment};
use laika_storage::AlertView;

/// Deep links into the web apps.
#[derive(Debug, Clone)]
pub struct Links {
    web: String,
    audit: String,
}

impl Links {
    pub fn new(urls: &UrlsConfig) -> Self {
        Self {
            web: urls.web_redirect.trim_end_matches('/').to_string(),
            audit: urls.audit_redirect.trim_end_matches('/').to_string(),
        }
    }

    pub fn web_base(&self) -> &str {
        &self.web
    }

    /// Auditors land in the auditor app, everyone else in the customer app.
    pub fn base_for(&self, view: &AlertView) -> &str {
        if view.receiver.role.is_auditor() {
            &self.audit
        } else {
            &self.web
        }
    }

    /// `{web}/dashboard/?alertsOpen=true`
    pub fn call_to_action(&self) -> String {
        format!("{}/dashboard/?alertsOpen=true", self.web)
    }

    pub fn alert_url(&self, view: &AlertView) -> String {
        let base = self.base_for(view);
        if let Some(comment) = &view.comment {
            let audit = view.audit.as_ref().map(|a| a.id.as_str()).unwrap_or_default();
            return attachment_url(base, &comment.attachment, audit);
        }
        match &view.reference {
            AlertReference::Audit { audit_id } => format!("{base}/audits/{audit_id}"),
            AlertReference::Subtask { action_item_id } => match view
                .action_item
                .as_ref()
                .and_then(|item| item.control_id.as_deref())
            {
                Some(control) => format!("{base}/controls/{control}?activeTab=Tasks"),
                None => format!("{base}/action-items/{action_item_id}"),
            },
            AlertReference::PeopleDiscovery { .. } => format!("{base}/people?discovery=true"),
            AlertReference::VendorDiscovery { .. } => format!("{base}/vendors?discovery=true"),
            AlertReference::AccessReview { access_review_id } => {
                format!("{base}/access-review/{access_review_id}")
            }
            AlertReference::BackgroundCheck { .. } => format!("{base}/people"),
            AlertReference::Training { training_id } => format!("{base}/training/{training_id}"),
            AlertReference::Question { question_id } => format!("{base}/questions/{question_id}"),
            AlertReference::LibraryEntry { .. } => format!("{base}/library"),
            AlertReference::Comment { .. } | AlertReference::Reply { .. } => self.call_to_action(),
        }
    }
}

/// Comments tab of the entity a comment hangs off.
pub fn attachment_url(base: &str, attachment: &Attachment, audit_id: &str) -> String {
    match attachment {
        Attachment::Control(id) => format!("{base}/controls/{id}?activeTab=Comments"),
        Attachment::Policy(id) => format!("{base}/policies/{id}?activeTab=Comments"),
        Attachment::Task(id) => format!("{base}/playbooks/{id}?activeTab=Comments"),
        Attachment::Evidence(id) => {
            format!("{base}/audits/{audit_id}/evidence-detail/{id}?activeTab=Comments")
        }
        Attachment::Requirement(id) => {
            format!("{base}/audits/{audit_id}/requirement-detail/{id}?activeTab=Comments")
        }
        Attachment::Population(id) => {
            format!("{base}/audits/{audit_id}/population-detail/{id}?activeTab=Comments")
        }
        Attachment::DraftReport(audit) => format!("{base}/audits/{audit}?activeKey=Draft%20Report"),
    }
}

/// Values for the literal `[Token]` placeholders of subjects and messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    pub user: String,
    pub receiver: String,
    pub company_name: String,
    pub audit_type: String,
    pub audit_name: String,
    pub entity_name: String,
    pub task: String,
    pub subtask_group: String,
    pub quantity: String,
    pub url: String,
    pub comment: String,
}

impl Placeholders {
    pub fn from_view(view: &AlertView, links: &Links) -> Self {
        let entity_name = view.entity_name.clone().unwrap_or_default();
        let task = view
            .action_item
            .as_ref()
            .map(|item| item.name.clone())
            .unwrap_or_default();
        Self {
            user: view.sender_name().to_string(),
            receiver: view.receiver.display_name(),
            company_name: view.company_name.clone(),
            audit_type: view
                .audit
                .as_ref()
                .map(|a| a.audit_type.clone())
                .unwrap_or_default(),
            audit_name: view.audit.as_ref().map(|a| a.name.clone()).unwrap_or_default(),
            subtask_group: if entity_name.is_empty() {
                view.company_name.clone()
            } else {
                entity_name.clone()
            },
            entity_name,
            task,
            quantity: view.quantity.map(|q| q.to_string()).unwrap_or_default(),
            url: links.alert_url(view),
            comment: view.rendered_content().unwrap_or_default(),
        }
    }

    /// Replace every known token in `template`. Unknown brackets are left as is.
    pub fn fill(&self, template: &str) -> String {
        // `[Comment]` goes last so user text is never substituted.
        let pairs: [(&str, &str); 14] = [
            ("[TaskName]", self.entity_name.as_str()),
            ("[EvidenceName]", self.entity_name.as_str()),
            ("[ControlName]", self.entity_name.as_str()),
            ("[PolicyName]", self.entity_name.as_str()),
            ("[SubtaskGroup]", self.subtask_group.as_str()),
            ("[CompanyName]", self.company_name.as_str()),
            ("[AuditType]", self.audit_type.as_str()),
            ("[AuditName]", self.audit_name.as_str()),
            ("[Receiver]", self.receiver.as_str()),
            ("[Quantity]", self.quantity.as_str()),
            ("[User]", self.user.as_str()),
            ("[Task]", self.task.as_str()),
            ("[URL]", self.url.as_str()),
            ("[Comment]", self.comment.as_str()),
        ];
        pairs
            .iter()
            .fold(template.to_string(), |acc, (token, value)| acc.replace(token, value))
    }
}
