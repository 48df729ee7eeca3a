// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AWS assume-role as a token refresher.
//!
//! The stored credential holds the customer's role ARN. Each renewal assumes
//! the role with the platform's base keys, stores the temporary session with
//! the STS `Expiration` as `expires_at`, and re-probes the configured regions.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use laika_core::LaikaError;
use laika_http::{HttpClient, IntegrationContext, RequestBody, VendorRequest};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::credential::{AwsSession, Credential};
use crate::refresh::{RefreshedTokens, TokenRefresher};
use crate::sigv4::{self, SigningInput};

const STS_VERSION: &str = "2011-06-15";
const SESSION_NAME: &str = "laika-integration";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

static XML_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(AccessKeyId|SecretAccessKey|SessionToken|Expiration)>([^<]*)</").unwrap()
});

#[derive(Debug, Clone)]
pub struct AssumedRole {
    pub session: AwsSession,
    pub expiration: DateTime<Utc>,
}

#[async_trait]
pub trait AssumeRoleProvider: Send + Sync {
    async fn assume_role(
        &self,
        role_arn: &str,
        external_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AssumedRole, LaikaError>;
}

#[async_trait]
pub trait RegionProbe: Send + Sync {
    /// Whether a cheap regional call succeeds with `session`.
    async fn is_reachable(
        &self,
        session: &AwsSession,
        region: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, LaikaError>;
}

/// Minimal STS client signing its own requests.
pub struct StsClient {
    http: HttpClient,
    access_key_id: String,
    secret_access_key: SecretString,
    endpoint_override: Option<String>,
}

impl StsClient {
    pub fn new(http: HttpClient, access_key_id: impl Into<String>, secret_access_key: SecretString) -> Self {
        Self {
            http,
            access_key_id: access_key_id.into(),
            secret_access_key,
            endpoint_override: None,
        }
    }

    /// Send every call to `base` instead of the AWS endpoints.
    pub fn with_endpoint(mut self, base: impl Into<String>) -> Self {
        self.endpoint_override = Some(base.into());
        self
    }

    fn endpoint(&self, region: Option<&str>) -> String {
        match (&self.endpoint_override, region) {
            (Some(base), _) => format!("{}/", base.trim_end_matches('/')),
            (None, Some(region)) => format!("https://sts.{region}.amazonaws.com/"),
            (None, None) => "https://sts.amazonaws.com/".to_string(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn call(
        &self,
        cancel: &CancellationToken,
        region: &str,
        endpoint: String,
        access_key_id: &str,
        secret_access_key: &str,
        session_token: Option<&SecretString>,
        form: &[(&str, &str)],
    ) -> Result<String, LaikaError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form.iter())
            .finish();
        let url = Url::parse(&endpoint)
            .map_err(|e| LaikaError::Value(format!("bad STS endpoint {endpoint}: {e}")))?;
        let now = Utc::now();

        let mut signed = vec![
            ("content-type".to_string(), FORM_CONTENT_TYPE.to_string()),
            ("host".to_string(), sigv4::host_header(&url)?),
            ("x-amz-date".to_string(), sigv4::amz_date(now)),
        ];
        if let Some(token) = session_token {
            signed.push((
                "x-amz-security-token".to_string(),
                token.expose_secret().to_string(),
            ));
        }
        let signature = sigv4::sign(
            &SigningInput {
                access_key_id,
                secret_access_key,
                region,
                service: "sts",
                now,
            },
            "POST",
            &url,
            &signed,
            body.as_bytes(),
        )?;

        let mut request = VendorRequest::post_form(endpoint, Vec::new())
            .header("x-amz-date", signature.amz_date)
            .header("authorization", signature.authorization)
            .endpoint(format!("sts.{}", form.first().map(|(_, v)| *v).unwrap_or("call")));
        if let Some(token) = session_token {
            request = request.secret_header("x-amz-security-token", token.clone());
        }
        request.body = Some(RequestBody::Raw {
            content_type: FORM_CONTENT_TYPE.to_string(),
            body,
        });

        let mut ctx = IntegrationContext::new("aws", "sts");
        let response = self.http.execute(&mut ctx, cancel, request).await?;
        Ok(response.text())
    }
}

/// Pull the credential fields out of an `AssumeRoleResponse` document.
pub fn parse_assume_role_response(xml: &str) -> Result<AssumedRole, LaikaError> {
    let fields: HashMap<&str, &str> = XML_FIELD_RE
        .captures_iter(xml)
        .filter_map(|cap| Some((cap.get(1)?.as_str(), cap.get(2)?.as_str())))
        .collect();
    let get = |name: &str| {
        fields
            .get(name)
            .map(|v| v.trim().to_string())
            .ok_or_else(|| LaikaError::Value(format!("AssumeRole response has no {name}")))
    };
    let expiration = get("Expiration")?;
    let expiration = DateTime::parse_from_rfc3339(&expiration)
        .map_err(|e| LaikaError::Value(format!("bad STS expiration {expiration:?}: {e}")))?
        .with_timezone(&Utc);
    Ok(AssumedRole {
        session: AwsSession {
            access_key_id: get("AccessKeyId")?,
            secret_access_key: SecretString::from(get("SecretAccessKey")?),
            session_token: SecretString::from(get("SessionToken")?),
        },
        expiration,
    })
}

#[async_trait]
impl AssumeRoleProvider for StsClient {
    async fn assume_role(
        &self,
        role_arn: &str,
        external_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AssumedRole, LaikaError> {
        let mut form = vec![
            ("Action", "AssumeRole"),
            ("Version", STS_VERSION),
            ("RoleArn", role_arn),
            ("RoleSessionName", SESSION_NAME),
            ("DurationSeconds", "3600"),
        ];
        if let Some(id) = external_id {
            form.push(("ExternalId", id));
        }
        let xml = self
            .call(
                cancel,
                "us-east-1",
                self.endpoint(None),
                &self.access_key_id,
                self.secret_access_key.expose_secret(),
                None,
                &form,
            )
            .await?;
        parse_assume_role_response(&xml)
    }
}

#[async_trait]
impl RegionProbe for StsClient {
    async fn is_reachable(
        &self,
        session: &AwsSession,
        region: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, LaikaError> {
        let outcome = self
            .call(
                cancel,
                region,
                self.endpoint(Some(region)),
                &session.access_key_id,
                session.secret_access_key.expose_secret(),
                Some(&session.session_token),
                &[("Action", "GetCallerIdentity"), ("Version", STS_VERSION)],
            )
            .await;
        match outcome {
            Ok(_) => Ok(true),
            Err(LaikaError::Cancelled) => Err(LaikaError::Cancelled),
            Err(e) => {
                debug!(region, error = %e, "region probe failed");
                Ok(false)
            }
        }
    }
}

pub struct AwsAssumeRoleRefresher {
    provider: Arc<dyn AssumeRoleProvider>,
    probe: Arc<dyn RegionProbe>,
    external_id: Option<String>,
    regions: Vec<String>,
}

impl AwsAssumeRoleRefresher {
    /// `regions` is the candidate list probed on every refresh.
    pub fn new(
        provider: Arc<dyn AssumeRoleProvider>,
        probe: Arc<dyn RegionProbe>,
        external_id: Option<String>,
        regions: Vec<String>,
    ) -> Self {
        Self {
            provider,
            probe,
            external_id,
            regions,
        }
    }

    /// STS client as both provider and probe.
    pub fn with_sts(sts: StsClient, external_id: Option<String>, regions: Vec<String>) -> Self {
        let sts = Arc::new(sts);
        Self::new(sts.clone(), sts, external_id, regions)
    }
}

#[async_trait]
impl TokenRefresher for AwsAssumeRoleRefresher {
    #[instrument(skip_all, fields(connection_id = %credential.connection_id))]
    async fn refresh(
        &self,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> Result<RefreshedTokens, LaikaError> {
        let role_arn = credential
            .role_arn
            .as_deref()
            .ok_or_else(|| LaikaError::BadCredentials {
                message: "no role ARN stored for the AWS connection".into(),
            })?;
        let assumed = self
            .provider
            .assume_role(role_arn, self.external_id.as_deref(), cancel)
            .await?;

        let mut reachable = Vec::with_capacity(self.regions.len());
        for region in &self.regions {
            if self.probe.is_reachable(&assumed.session, region, cancel).await? {
                reachable.push(region.clone());
            } else {
                warn!(region = %region, "dropping unreachable region");
            }
        }
        info!(
            regions = reachable.len(),
            expires_at = %assumed.expiration,
            "assumed customer role"
        );
        Ok(RefreshedTokens {
            access_token: None,
            refresh_token: None,
            expires_at: Some(assumed.expiration),
            aws_session: Some(assumed.session),
            regions: Some(reachable),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laika_config::model::HttpConfig;
    use laika_core::{AuthKind, Vendor};
    use wiremock::matchers::{body_string_contains, header_exists, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RESPONSE: &str = r#"<AssumeRoleResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <AssumeRoleResult>
    <Credentials>
      <AccessKeyId>ASIAEXAMPLE</AccessKeyId>
      <SecretAccessKey>secret/key</SecretAccessKey>
      <SessionToken>session-token</SessionToken>
      <Expiration>2026-10-14T13:00:00Z</Expiration>
    </Credentials>
  </AssumeRoleResult>
</AssumeRoleResponse>"#;

    #[test]
    fn assume_role_xml_is_parsed() {
        let role = parse_assume_role_response(RESPONSE).unwrap();
        assert_eq!(role.session.access_key_id, "ASIAEXAMPLE");
        assert_eq!(role.session.secret_access_key.expose_secret(), "secret/key");
        assert_eq!(role.expiration.to_rfc3339(), "2026-10-14T13:00:00+00:00");
        assert!(parse_assume_role_response("<Error/>").is_err());
    }

    struct OnlyRegions(Vec<&'static str>);

    #[async_trait]
    impl RegionProbe for OnlyRegions {
        async fn is_reachable(
            &self,
            _session: &AwsSession,
            region: &str,
            _cancel: &CancellationToken,
        ) -> Result<bool, LaikaError> {
            Ok(self.0.contains(&region))
        }
    }

    #[tokio::test]
    async fn refresh_assumes_role_and_drops_dead_regions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Action=AssumeRole"))
            .and(body_string_contains("ExternalId=ext-42"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RESPONSE))
            .expect(1)
            .mount(&server)
            .await;

        let sts = StsClient::new(
            HttpClient::from_config(&HttpConfig::default()).unwrap(),
            "AKIDBASE",
            SecretString::from("base-secret"),
        )
        .with_endpoint(server.uri());
        let refresher = AwsAssumeRoleRefresher::new(
            Arc::new(sts),
            Arc::new(OnlyRegions(vec!["us-east-1"])),
            Some("ext-42".into()),
            vec!["us-east-1".into(), "ap-south-2".into()],
        );

        let mut cred = Credential::new("c1", Vendor::Aws, AuthKind::Oauth2);
        cred.role_arn = Some("arn:aws:iam::123456789012:role/laika".into());
        let tokens = refresher.refresh(&cred, &CancellationToken::new()).await.unwrap();
        assert_eq!(tokens.regions, Some(vec!["us-east-1".to_string()]));
        assert_eq!(tokens.aws_session.unwrap().access_key_id, "ASIAEXAMPLE");
        assert!(tokens.expires_at.is_some());
    }

    #[tokio::test]
    async fn missing_role_arn_is_bad_credentials() {
        let sts = StsClient::new(
            HttpClient::from_config(&HttpConfig::default()).unwrap(),
            "AKID",
            SecretString::from("s"),
        );
        let refresher = AwsAssumeRoleRefresher::with_sts(sts, None, vec![]);
        let cred = Credential::new("c1", Vendor::Aws, AuthKind::Oauth2);
        let err = refresher.refresh(&cred, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code(), "bad_credentials");
    }
}
