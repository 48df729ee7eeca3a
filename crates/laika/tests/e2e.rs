// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end flows through the assembled stack: commands in, alerts
//! materialized, deliveries drained into recording sinks.

use std::sync::Arc;

use chrono::Utc;
use laika_connectors::JiraConnector;
use laika_core::{
    AlertPreference, AlertReference, AlertType, Attachment, ConnectionStatus, Role, Vendor,
};
use laika_engine::command::{AuditAdvance, ConnectIntegration, InviteBatch, NewComment, NewReply};
use laika_engine::{CommandOutput, CredentialInput, InboundCommand, Invite};
use laika_storage::queries::{alerts, objects};
use laika_test_utils::TestHarness;
use laika_test_utils::fixtures::{self, UserSpec};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Org `o1` ("Acme") with A (`a_alerts`), B the admin, and control Ctl-1.
async fn comment_harness(a_alerts: AlertPreference) -> TestHarness {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .seed(move |conn| {
            fixtures::organization(conn, "o1", "Acme")?;
            fixtures::user(
                conn,
                UserSpec::member("a", "o1", "a@x.com").named("A", "Name").alerts(a_alerts),
            )?;
            fixtures::user(
                conn,
                UserSpec::member("b", "o1", "b@x.com").named("B", "").role(Role::OrganizationAdmin),
            )?;
            fixtures::control(conn, "ctl", "o1", "Ctl-1")
        })
        .await
        .unwrap();
    harness
}

fn mention_a(owner: &str) -> InboundCommand {
    InboundCommand::AddComment(NewComment {
        owner_id: owner.into(),
        attachment: Attachment::Control("ctl".into()),
        content: "Hi @(a@x.com)".into(),
    })
}

#[tokio::test]
async fn mention_is_delivered_immediately() {
    let harness = comment_harness(AlertPreference::Immediately).await;

    let CommandOutput::Comment {
        comment_id,
        alert_ids,
    } = harness.dispatch(mention_a("b")).await.unwrap()
    else {
        panic!("expected a comment result");
    };
    assert_eq!(alert_ids.len(), 1);

    let id = alert_ids[0].clone();
    let (alert, reference) = harness
        .db
        .call(move |conn| alerts::get_alert(conn, &id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alert.alert_type, AlertType::ControlMention);
    assert_eq!(alert.sender_id.as_deref(), Some("b"));
    assert_eq!(alert.receiver_id, "a");
    assert_eq!(reference, AlertReference::Comment { comment_id });

    harness.drain().await.unwrap();

    let frames = harness.sinks.frames().await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].room_id, "o1");
    assert_eq!(frames[0].receiver_email, "a@x.com");
    assert_eq!(frames[0].alert_type, AlertType::ControlMention);

    let emails = harness.sinks.emails_to("a@x.com").await;
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].subject, "B mentioned you in a comment in Ctl-1.");
}

#[tokio::test]
async fn daily_user_gets_the_mention_in_the_digest() {
    let harness = comment_harness(AlertPreference::Daily).await;
    harness.dispatch(mention_a("b")).await.unwrap();
    harness.drain().await.unwrap();
    assert!(harness.sinks.emails_to("a@x.com").await.is_empty());

    let result = harness.run_digest(Utc::now()).await.unwrap();
    assert_eq!(result.success_count, 1);

    let emails = harness.sinks.emails_to("a@x.com").await;
    assert_eq!(emails.len(), 1);
    let context = &emails[0].context;
    assert_eq!(context["alerts"][0]["content"], "Hi @A Name");
    assert_eq!(
        context["call_to_action_url"],
        format!("{}/dashboard/?alertsOpen=true", harness.config.urls.web_redirect)
    );
}

#[tokio::test]
async fn replying_to_your_own_comment_alerts_nobody() {
    let harness = comment_harness(AlertPreference::Immediately).await;
    let CommandOutput::Comment { comment_id, .. } = harness
        .dispatch(InboundCommand::AddComment(NewComment {
            owner_id: "a".into(),
            attachment: Attachment::Control("ctl".into()),
            content: "note to self".into(),
        }))
        .await
        .unwrap()
    else {
        panic!("expected a comment result");
    };

    let out = harness
        .dispatch(InboundCommand::AddReply(NewReply {
            comment_id,
            owner_id: "a".into(),
            content: "and one more".into(),
        }))
        .await
        .unwrap();
    let CommandOutput::Reply { alert_ids, .. } = out else {
        panic!("expected a reply result");
    };
    assert!(alert_ids.is_empty());
    assert!(harness.alerts_of_type(AlertType::ControlReply).await.unwrap().is_empty());

    harness.drain().await.unwrap();
    assert!(harness.sinks.frames().await.is_empty());
}

#[tokio::test]
async fn ambiguous_background_checks_raise_one_alert() {
    let harness = comment_harness(AlertPreference::Immediately).await;
    harness
        .seed(|conn| {
            fixtures::background_check(conn, "o1", "bc1", "Leo", "Messi", None)?;
            fixtures::background_check(conn, "o1", "bc2", "Leo", "Messi", None)?;
            Ok(())
        })
        .await
        .unwrap();

    let out = harness
        .dispatch(InboundCommand::InviteUsers(InviteBatch {
            organization_id: "o1".into(),
            invites: vec![Invite {
                email: "leo@x.com".into(),
                first_name: "Leo".into(),
                last_name: "Messi".into(),
                role: Role::OrganizationMember,
            }],
        }))
        .await
        .unwrap();
    let CommandOutput::Batch(result) = out else {
        panic!("expected a batch result");
    };
    assert_eq!(result.success_count, 1);

    let multiple = harness
        .alerts_of_type(AlertType::BackgroundCheckMultipleMatch)
        .await
        .unwrap();
    assert_eq!(multiple.len(), 1);
    assert!(harness
        .alerts_of_type(AlertType::BackgroundCheckSingleMatch)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn jira_repoll_changes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/3/myself"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accountId": "5b10"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/3/project/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [{"key": "SEC", "name": "Security"}], "isLast": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/3/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "startAt": 0, "maxResults": 50, "total": 2, "issues": [
                {"id": "10001", "key": "SEC-1", "fields": {"summary": "Rotate keys"}},
                {"id": "10002", "key": "SEC-2", "fields": {"summary": "Enable MFA"}}
            ]
        })))
        .mount(&server)
        .await;

    let harness = TestHarness::builder()
        .with_connector(Arc::new(JiraConnector::new().with_api_base(server.uri())))
        .build()
        .await
        .unwrap();
    harness
        .seed(|conn| {
            fixtures::organization(conn, "o1", "Acme")?;
            fixtures::user(conn, UserSpec::member("adm", "o1", "adm@x.com").role(Role::OrganizationAdmin))?;
            Ok(())
        })
        .await
        .unwrap();

    let out = harness
        .dispatch(InboundCommand::ConnectIntegration(ConnectIntegration {
            organization_id: "o1".into(),
            vendor: Vendor::Jira,
            credential: CredentialInput::Basic {
                username: "bot@acme.com".into(),
                password: "jira-token".into(),
            },
            settings: serde_json::Value::Null,
        }))
        .await
        .unwrap();
    let CommandOutput::Connection(account) = out else {
        panic!("expected a connection result");
    };
    assert_eq!(account.status, ConnectionStatus::Success);

    let cancel = CancellationToken::new();
    let poller = harness.engine.poller();
    let first = poller.poll_connection(&account.id, &cancel).await.unwrap();
    assert_eq!(first.created, 2);

    let second = poller.poll_connection(&account.id, &cancel).await.unwrap();
    assert_eq!((second.created, second.events), (0, 0));

    let id = account.id.clone();
    let count = harness
        .db
        .call(move |conn| objects::count_by_connection(conn, &id))
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn audit_initiation_reaches_team_and_client_admin() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .seed(|conn| {
            fixtures::organization(conn, "o1", "Acme")?;
            fixtures::organization(conn, "firm", "Audit Firm")?;
            fixtures::user(conn, UserSpec::member("adm", "o1", "adm@x.com").role(Role::OrganizationAdmin))?;
            for id in ["aud1", "aud2", "aud3"] {
                let email = format!("{id}@firm.com");
                fixtures::user(conn, UserSpec::member(id, "firm", &email).role(Role::Auditor))?;
            }
            fixtures::audit(conn, "au1", "o1", "SOC 2 Type 1", &["aud1", "aud2", "aud3"])?;
            Ok(())
        })
        .await
        .unwrap();

    let out = harness
        .dispatch(InboundCommand::AdvanceAudit(AuditAdvance {
            audit_id: "au1".into(),
            actor_id: None,
            to: None,
        }))
        .await
        .unwrap();
    let CommandOutput::Alerts { alert_ids } = out else {
        panic!("expected an alerts result");
    };
    assert_eq!(alert_ids.len(), 4);
    assert_eq!(harness.alerts_of_type(AlertType::AuditInitiated).await.unwrap().len(), 4);

    harness.drain().await.unwrap();
    let emails = harness.sinks.emails().await;
    assert_eq!(emails.len(), 4);
    assert!(emails.iter().all(|e| e.subject.contains("SOC 2 Type 1")));
    let mut receivers: Vec<&str> = emails.iter().map(|e| e.to.as_str()).collect();
    receivers.sort_unstable();
    assert_eq!(
        receivers,
        ["adm@x.com", "aud1@firm.com", "aud2@firm.com", "aud3@firm.com"]
    );
}
