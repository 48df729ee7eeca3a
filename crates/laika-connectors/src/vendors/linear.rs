// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Linear GraphQL: teams as scopes, issues as change requests.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use laika_core::{Cursor, LaikaError, ObjectType, Vendor};
use laika_http::{RateLimitHeaders, VendorRequest};
use serde_json::{Value, json};
use tracing::{instrument, warn};

use crate::connector::{Connector, ConnectorSession, Page, Record, Scope};
use crate::normalize::{RecordBuilder, str_at};
use crate::vendors::resolve_base;

const DEFAULT_BASE: &str = "https://api.linear.app";
const PAGE_SIZE: u32 = 100;

const VIEWER_QUERY: &str = "query { viewer { id } }";

const TEAMS_QUERY: &str = "query Teams($after: String) {
  teams(first: 100, after: $after) {
    nodes { id key name }
    pageInfo { hasNextPage endCursor }
  }
}";

const ISSUES_QUERY: &str = "query Issues($team: String!, $after: String, $first: Int!, $since: DateTimeOrDuration) {
  issues(first: $first, after: $after, orderBy: updatedAt,
         filter: { team: { id: { eq: $team } }, updatedAt: { gte: $since } }) {
    nodes {
      id identifier title url createdAt updatedAt completedAt
      state { name } priorityLabel assignee { email } creator { email }
    }
    pageInfo { hasNextPage endCursor }
  }
}";

/// GraphQL error codes meaning the token cannot see this team.
const SKIPPABLE_CODES: [&str; 2] = ["FORBIDDEN", "INPUT_ERROR"];

#[derive(Debug, Clone, Default)]
pub struct LinearConnector {
    api_base: Option<String>,
}

enum GraphqlOutcome {
    Data(Value),
    Skipped(String),
}

impl LinearConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_base(self, base: impl Into<String>) -> Self {
        Self {
            api_base: Some(base.into()),
        }
    }

    pub fn with_api_base_opt(self, base: Option<String>) -> Self {
        Self { api_base: base }
    }

    async fn graphql(
        &self,
        session: &mut ConnectorSession<'_>,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<GraphqlOutcome, LaikaError> {
        let base = resolve_base(session, self.api_base.as_deref(), || Ok(DEFAULT_BASE.to_string()))?;
        let request = VendorRequest::post_json(
            format!("{base}/graphql"),
            json!({"query": query, "variables": variables}),
        )
        .endpoint(format!("graphql.{operation}"))
        .rate_limit(RateLimitHeaders::linear());
        let body: Value = session.send(request).await?.json()?;

        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if let Some(first) = errors.first() {
                let message = str_at(first, "/message").unwrap_or_default();
                let code = str_at(first, "/extensions/code").unwrap_or_default();
                if SKIPPABLE_CODES.contains(&code.as_str()) {
                    return Ok(GraphqlOutcome::Skipped(message));
                }
                return Err(LaikaError::Value(format!("linear {operation} failed: {code} {message}")));
            }
        }
        Ok(GraphqlOutcome::Data(body.get("data").cloned().unwrap_or(Value::Null)))
    }

    fn issue_record(scope: &Scope, node: &Value) -> Option<Record> {
        let id = str_at(node, "/id")?;
        Some(
            RecordBuilder::new(ObjectType::ChangeRequest, id)
                .field("Project", scope.name.clone())
                .opt("Key", str_at(node, "/identifier"))
                .opt("Title", str_at(node, "/title"))
                .opt("Status", str_at(node, "/state/name"))
                .opt("Priority", str_at(node, "/priorityLabel"))
                .opt("Assignee", str_at(node, "/assignee/email"))
                .opt("Reporter", str_at(node, "/creator/email"))
                .opt("Url", str_at(node, "/url"))
                .opt("Created At", str_at(node, "/createdAt"))
                .opt("Updated At", str_at(node, "/updatedAt"))
                .opt("Resolved At", str_at(node, "/completedAt"))
                .build(),
        )
    }
}

/// `endCursor` when `hasNextPage` is set.
fn next_cursor(connection: &Value) -> Option<Cursor> {
    let info = connection.get("pageInfo")?;
    if info.get("hasNextPage").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    str_at(info, "/endCursor").map(Cursor::Token)
}

#[async_trait]
impl Connector for LinearConnector {
    fn vendor(&self) -> Vendor {
        Vendor::Linear
    }

    async fn test_credentials(&self, session: &mut ConnectorSession<'_>) -> Result<(), LaikaError> {
        match self.graphql(session, "viewer", VIEWER_QUERY, json!({})).await? {
            GraphqlOutcome::Data(_) => Ok(()),
            GraphqlOutcome::Skipped(message) => Err(LaikaError::BadCredentials { message }),
        }
    }

    #[instrument(skip_all, fields(vendor = "linear"))]
    async fn discover_scope(&self, session: &mut ConnectorSession<'_>) -> Result<Vec<Scope>, LaikaError> {
        let mut scopes = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let data = match self
                .graphql(session, "teams", TEAMS_QUERY, json!({"after": after}))
                .await?
            {
                GraphqlOutcome::Data(data) => data,
                GraphqlOutcome::Skipped(_) => break,
            };
            let teams = &data["teams"];
            if let Some(nodes) = teams.get("nodes").and_then(Value::as_array) {
                scopes.extend(nodes.iter().filter_map(|team| {
                    let id = str_at(team, "/id")?;
                    Some(Scope::new(id, str_at(team, "/name").unwrap_or_default()))
                }));
            }
            match next_cursor(teams) {
                Some(Cursor::Token(token)) => after = Some(token),
                _ => break,
            }
        }
        Ok(scopes)
    }

    #[instrument(skip_all, fields(vendor = "linear", scope = %scope.id))]
    async fn pull(
        &self,
        session: &mut ConnectorSession<'_>,
        scope: &Scope,
        since: Option<DateTime<Utc>>,
        cursor: Option<Cursor>,
    ) -> Result<Page, LaikaError> {
        let after = match cursor {
            Some(Cursor::Token(token)) => Some(token),
            _ => None,
        };
        let variables = json!({
            "team": scope.id,
            "after": after,
            "first": PAGE_SIZE,
            "since": since.map(|s| s.to_rfc3339_opts(SecondsFormat::Secs, true)),
        });
        let data = match self.graphql(session, "issues", ISSUES_QUERY, variables).await? {
            GraphqlOutcome::Data(data) => data,
            GraphqlOutcome::Skipped(message) => {
                warn!(team = %scope.id, %message, "team not readable, skipping");
                return Ok(Page::empty());
            }
        };
        let issues = &data["issues"];
        let records = issues
            .get("nodes")
            .and_then(Value::as_array)
            .map(|nodes| nodes.iter().filter_map(|n| Self::issue_record(scope, n)).collect())
            .unwrap_or_default();
        Ok(Page::new(records, next_cursor(issues)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laika_http::AccessSecret;
    use secrecy::SecretString;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::vendors::test_support::Fixture;

    fn fixture() -> Fixture {
        Fixture::new("linear", AccessSecret::bearer(SecretString::from("lin_api")))
    }

    #[tokio::test]
    async fn issues_page_with_end_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({"variables": {"team": "T1", "after": "c1"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"issues": {
                "nodes": [{"id": "i1", "identifier": "ENG-1", "title": "Ship",
                           "state": {"name": "Done"}, "assignee": {"email": "a@acme.com"}}],
                "pageInfo": {"hasNextPage": true, "endCursor": "c2"}
            }}})))
            .mount(&server)
            .await;

        let connector = LinearConnector::new().with_api_base(server.uri());
        let mut fx = fixture();
        let page = connector
            .pull(
                &mut fx.session(),
                &Scope::new("T1", "Engineering"),
                None,
                Some(Cursor::Token("c1".into())),
            )
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].data["Key"], "ENG-1");
        assert_eq!(page.records[0].data["Project"], "Engineering");
        assert_eq!(page.next, Some(Cursor::Token("c2".into())));
    }

    #[tokio::test]
    async fn forbidden_team_yields_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{"message": "not allowed", "extensions": {"code": "FORBIDDEN"}}]
            })))
            .mount(&server)
            .await;
        let connector = LinearConnector::new().with_api_base(server.uri());
        let mut fx = fixture();
        let page = connector
            .pull(&mut fx.session(), &Scope::new("T9", "Secret"), None, None)
            .await
            .unwrap();
        assert_eq!(page, Page::empty());
    }

    #[tokio::test]
    async fn other_graphql_errors_surface() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{"message": "boom", "extensions": {"code": "INTERNAL_SERVER_ERROR"}}]
            })))
            .mount(&server)
            .await;
        let connector = LinearConnector::new().with_api_base(server.uri());
        let mut fx = fixture();
        let err = connector
            .pull(&mut fx.session(), &Scope::new("T1", "Eng"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LaikaError::Value(ref m) if m.contains("boom")));
    }
}
