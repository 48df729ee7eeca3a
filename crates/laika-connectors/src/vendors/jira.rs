// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Jira Cloud: projects as scopes, issues as change requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use laika_core::{Cursor, LaikaError, ObjectType, Vendor};
use laika_http::{RateLimitHeaders, VendorRequest};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::connector::{Connector, ConnectorSession, Page, Record, Scope};
use crate::normalize::{RecordBuilder, str_at};
use crate::vendors::{resolve_base, tenant_base};

const PAGE_SIZE: u64 = 50;
const ISSUE_FIELDS: &str = "summary,status,issuetype,priority,assignee,reporter,created,updated,resolutiondate";

#[derive(Debug, Clone, Default)]
pub struct JiraConnector {
    api_base: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage {
    #[serde(default)]
    start_at: u64,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    issues: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectPage {
    #[serde(default)]
    values: Vec<Value>,
    #[serde(default)]
    is_last: bool,
    #[serde(default)]
    next_page: Option<String>,
}

impl JiraConnector {
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

    fn base(&self, session: &ConnectorSession<'_>) -> Result<String, LaikaError> {
        resolve_base(session, self.api_base.as_deref(), || {
            tenant_base(session, "atlassian.net")
        })
    }

    fn request(url: impl Into<String>, endpoint: &str) -> VendorRequest {
        VendorRequest::get(url)
            .header("accept", "application/json")
            .endpoint(endpoint)
            .rate_limit(RateLimitHeaders::retry_after_only())
    }

    /// JQL for one project, newest first, bounded below by `since`.
    pub fn jql(project_key: &str, since: Option<DateTime<Utc>>) -> String {
        let mut jql = format!("project = \"{project_key}\"");
        if let Some(since) = since {
            jql.push_str(&format!(" AND updated >= \"{}\"", since.format("%Y/%m/%d %H:%M")));
        }
        jql.push_str(" ORDER BY updated DESC");
        jql
    }

    fn issue_record(scope: &Scope, issue: &Value) -> Option<Record> {
        let id = str_at(issue, "/id")?;
        Some(
            RecordBuilder::new(ObjectType::ChangeRequest, id)
                .field("Project", scope.id.clone())
                .opt("Key", str_at(issue, "/key"))
                .opt("Title", str_at(issue, "/fields/summary"))
                .opt("Status", str_at(issue, "/fields/status/name"))
                .opt("Issue Type", str_at(issue, "/fields/issuetype/name"))
                .opt("Priority", str_at(issue, "/fields/priority/name"))
                .opt("Assignee", str_at(issue, "/fields/assignee/emailAddress"))
                .opt("Reporter", str_at(issue, "/fields/reporter/emailAddress"))
                .opt("Created At", str_at(issue, "/fields/created"))
                .opt("Updated At", str_at(issue, "/fields/updated"))
                .opt("Resolved At", str_at(issue, "/fields/resolutiondate"))
                .build(),
        )
    }
}

#[async_trait]
impl Connector for JiraConnector {
    fn vendor(&self) -> Vendor {
        Vendor::Jira
    }

    async fn test_credentials(&self, session: &mut ConnectorSession<'_>) -> Result<(), LaikaError> {
        let base = self.base(session)?;
        session
            .send(Self::request(format!("{base}/rest/api/3/myself"), "myself"))
            .await?;
        Ok(())
    }

    #[instrument(skip_all, fields(vendor = "jira"))]
    async fn discover_scope(&self, session: &mut ConnectorSession<'_>) -> Result<Vec<Scope>, LaikaError> {
        let base = self.base(session)?;
        let mut url = Some(format!("{base}/rest/api/3/project/search?maxResults={PAGE_SIZE}"));
        let mut scopes = Vec::new();
        while let Some(next) = url.take() {
            let page: ProjectPage = session
                .send(Self::request(next, "project.search"))
                .await?
                .json()?;
            scopes.extend(page.values.iter().filter_map(|p| {
                let key = str_at(p, "/key")?;
                let name = str_at(p, "/name").unwrap_or_else(|| key.clone());
                Some(Scope::new(key, name))
            }));
            if !page.is_last {
                url = page.next_page;
            }
        }
        Ok(scopes)
    }

    #[instrument(skip_all, fields(vendor = "jira", scope = %scope.id))]
    async fn pull(
        &self,
        session: &mut ConnectorSession<'_>,
        scope: &Scope,
        since: Option<DateTime<Utc>>,
        cursor: Option<Cursor>,
    ) -> Result<Page, LaikaError> {
        let base = self.base(session)?;
        let start_at = match cursor {
            Some(Cursor::Offset(n)) => n,
            _ => 0,
        };
        let request = Self::request(format!("{base}/rest/api/3/search"), "search")
            .query("jql", Self::jql(&scope.id, since))
            .query("startAt", start_at.to_string())
            .query("maxResults", PAGE_SIZE.to_string())
            .query("fields", ISSUE_FIELDS);
        let page: SearchPage = session.send(request).await?.json()?;

        let records: Vec<Record> = page
            .issues
            .iter()
            .filter_map(|issue| Self::issue_record(scope, issue))
            .collect();
        let fetched = page.start_at + page.issues.len() as u64;
        let next = (!page.issues.is_empty() && fetched < page.total).then_some(Cursor::Offset(fetched));
        Ok(Page::new(records, next))
    }
}
