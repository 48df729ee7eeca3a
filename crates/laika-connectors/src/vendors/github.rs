// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! GitHub: repositories and their pull requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use laika_core::{Cursor, LaikaError, ObjectType, Vendor};
use laika_http::{RateLimitHeaders, VendorRequest};
use serde_json::Value;
use tracing::instrument;

use crate::connector::{Connector, ConnectorSession, Page, Record, Scope};
use crate::normalize::{RecordBuilder, reached_since, str_at};
use crate::vendors::resolve_base;

const DEFAULT_BASE: &str = "https://api.github.com";
const PER_PAGE: &str = "100";

#[derive(Debug, Clone, Default)]
pub struct GithubConnector {
    api_base: Option<String>,
}

impl GithubConnector {
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
        resolve_base(session, self.api_base.as_deref(), || Ok(DEFAULT_BASE.to_string()))
    }

    fn request(url: impl Into<String>, endpoint: &str) -> VendorRequest {
        VendorRequest::get(url)
            .header("accept", "application/vnd.github+json")
            .header("x-github-api-version", "2022-11-28")
            .endpoint(endpoint)
            .rate_limit(RateLimitHeaders::github())
    }

    fn repository_record(repo: &Value) -> Option<Record> {
        let id = str_at(repo, "/id")?;
        Some(
            RecordBuilder::new(ObjectType::Repository, id)
                .opt("Name", str_at(repo, "/name"))
                .opt("Full Name", str_at(repo, "/full_name"))
                .opt("Private", repo.get("private").and_then(Value::as_bool))
                .opt("Default Branch", str_at(repo, "/default_branch"))
                .opt("Url", str_at(repo, "/html_url"))
                .opt("Created At", str_at(repo, "/created_at"))
                .build(),
        )
    }

    fn pull_request_record(scope: &Scope, pr: &Value) -> Option<Record> {
        let id = str_at(pr, "/id")?;
        Some(
            RecordBuilder::new(ObjectType::PullRequest, id)
                .field("Repository", scope.id.clone())
                .opt("Number", str_at(pr, "/number"))
                .opt("Title", str_at(pr, "/title"))
                .opt("State", str_at(pr, "/state"))
                .opt("Author", str_at(pr, "/user/login"))
                .opt("Url", str_at(pr, "/html_url"))
                .opt("Created At", str_at(pr, "/created_at"))
                .opt("Updated At", str_at(pr, "/updated_at"))
                .opt("Merged At", str_at(pr, "/merged_at"))
                .build(),
        )
    }
}

#[async_trait]
impl Connector for GithubConnector {
    fn vendor(&self) -> Vendor {
        Vendor::Github
    }

    async fn test_credentials(&self, session: &mut ConnectorSession<'_>) -> Result<(), LaikaError> {
        let base = self.base(session)?;
        session.send(Self::request(format!("{base}/user"), "user")).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(vendor = "github"))]
    async fn discover_scope(&self, session: &mut ConnectorSession<'_>) -> Result<Vec<Scope>, LaikaError> {
        let base = self.base(session)?;
        let mut url = Some(format!("{base}/user/repos?per_page={PER_PAGE}&affiliation=owner,organization_member"));
        let mut scopes = Vec::new();
        while let Some(next) = url.take() {
            let response = session.send(Self::request(next, "user.repos")).await?;
            let repos: Vec<Value> = response.json()?;
            scopes.extend(repos.iter().filter_map(|repo| {
                let full_name = str_at(repo, "/full_name")?;
                Some(Scope::new(full_name.clone(), full_name))
            }));
            url = response.next_link();
        }
        Ok(scopes)
    }

    #[instrument(skip_all, fields(vendor = "github", scope = %scope.id))]
    async fn pull(
        &self,
        session: &mut ConnectorSession<'_>,
        scope: &Scope,
        since: Option<DateTime<Utc>>,
        cursor: Option<Cursor>,
    ) -> Result<Page, LaikaError> {
        let base = self.base(session)?;
        let mut records = Vec::new();

        let url = match cursor {
            Some(Cursor::Url(url)) => url,
            _ => {
                let repo = session
                    .send(Self::request(format!("{base}/repos/{}", scope.id), "repos.get"))
                    .await?;
                let repo: Value = repo.json()?;
                records.extend(Self::repository_record(&repo));
                format!(
                    "{base}/repos/{}/pulls?state=all&sort=updated&direction=desc&per_page={PER_PAGE}",
                    scope.id
                )
            }
        };

        let response = session.send(Self::request(url, "repos.pulls")).await?;
        let pulls: Vec<Value> = response.json()?;
        records.extend(pulls.iter().filter_map(|pr| Self::pull_request_record(scope, pr)));

        let older_seen = reached_since(
            since,
            pulls.iter().map(|pr| pr.get("updated_at").and_then(Value::as_str)),
        );
        let next = if older_seen {
            None
        } else {
            response.next_link().map(Cursor::Url)
        };
        Ok(Page::new(records, next))
    }
}
