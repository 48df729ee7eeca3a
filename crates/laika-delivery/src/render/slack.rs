// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Block-kit messages for Slack direct messages.

use laika_core::{AlertType, ReferenceKind, SlackMessage};
use laika_storage::AlertView;
use serde_json::{Value, json};

use super::{Links, Placeholders};

/// Slack escapes only these three characters in mrkdwn text.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn section(text: &str) -> Value {
    json!({"type": "section", "text": {"type": "mrkdwn", "text": text}})
}

fn quote(text: &str) -> Value {
    let quoted = text
        .lines()
        .map(|line| format!("> {line}"))
        .collect::<Vec<_>>()
        .join("\n");
    section(&quoted)
}

fn button(label: &str, url: &str) -> Value {
    json!({
        "type": "actions",
        "elements": [{
            "type": "button",
            "text": {"type": "plain_text", "text": label},
            "url": url,
        }]
    })
}

fn comment_blocks(values: &Placeholders, headline: String) -> (String, Vec<Value>) {
    let mut blocks = vec![section(&headline)];
    if !values.comment.is_empty() {
        blocks.push(quote(&escape(&values.comment)));
    }
    blocks.push(button("View comment", &values.url));
    (headline, blocks)
}

fn mention(values: &Placeholders) -> (String, Vec<Value>) {
    let headline = format!(
        "*{}* mentioned you in *{}*",
        escape(&values.user),
        escape(&values.entity_name)
    );
    comment_blocks(values, headline)
}

fn reply(values: &Placeholders) -> (String, Vec<Value>) {
    let headline = format!(
        "*{}* replied to your comment in *{}*",
        escape(&values.user),
        escape(&values.entity_name)
    );
    comment_blocks(values, headline)
}

fn new_assignment(values: &Placeholders) -> (String, Vec<Value>) {
    let headline = format!(
        "*{}* assigned you *{}*",
        escape(&values.user),
        escape(&values.task)
    );
    let blocks = vec![section(&headline), button("View task", &values.url)];
    (headline, blocks)
}

fn audit(alert_type: AlertType, values: &Placeholders) -> (String, Vec<Value>) {
    let what = match alert_type {
        AlertType::AuditRequested => "was requested",
        AlertType::AuditInitiated => "has started",
        AlertType::DraftReportAvailable => "has a draft report ready for review",
        _ => "is complete",
    };
    let headline = format!(
        "The *{}* audit for {} {what}",
        escape(&values.audit_type),
        escape(&values.company_name)
    );
    let blocks = vec![
        section(&headline),
        json!({
            "type": "context",
            "elements": [{"type": "mrkdwn", "text": escape(&values.audit_name)}]
        }),
        button("Open audit", &values.url),
    ];
    (headline, blocks)
}

fn discovery(alert_type: AlertType, values: &Placeholders) -> (String, Vec<Value>) {
    let noun = if alert_type == AlertType::VendorDiscovery {
        "vendors"
    } else {
        "people"
    };
    let headline = format!(
        "Laika discovered *{}* new {noun} for {}",
        escape(&values.quantity),
        escape(&values.company_name)
    );
    let blocks = vec![section(&headline), button("Review", &values.url)];
    (headline, blocks)
}

fn generic(values: &Placeholders, subject: &str) -> (String, Vec<Value>) {
    let headline = escape(&values.fill(subject));
    let blocks = vec![section(&headline), button("Open Laika", &values.url)];
    (headline, blocks)
}

pub fn render_slack(view: &AlertView, links: &Links) -> SlackMessage {
    let values = Placeholders::from_view(view, links);
    let alert_type = view.alert.alert_type;
    let (text, blocks) = match alert_type.reference_kind() {
        ReferenceKind::CommentAlert if alert_type != AlertType::Resolve => mention(&values),
        ReferenceKind::ReplyAlert => reply(&values),
        ReferenceKind::AuditAlert => audit(alert_type, &values),
        ReferenceKind::PeopleDiscoveryAlert | ReferenceKind::VendorDiscoveryAlert => {
            discovery(alert_type, &values)
        }
        _ if alert_type == AlertType::NewAssignment => new_assignment(&values),
        _ => generic(&values, super::email::subject_template(alert_type)),
    };
    SlackMessage { text, blocks }
}
