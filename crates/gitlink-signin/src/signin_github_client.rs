//! GitHub collaborator client: OAuth code exchange, profile fetch, and
//! installation lookups. Base URLs are injected so tests can stand in a
//! mock server for `github.com` / `api.github.com`.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::signin_contract::{IdentityExchanger, InstallationHost, LinkedIdentity};

#[derive(Debug, Clone, Deserialize)]
struct OAuthAccessTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GitHubAccountResponse {
    id: u64,
    login: String,
}

#[derive(Debug, Clone, Deserialize)]
struct InstallationResponse {
    id: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct AppResponse {
    html_url: Option<String>,
}

#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    oauth_base: String,
    api_base: String,
    client_id: String,
    client_secret: String,
}

impl GitHubClient {
    pub fn new(
        oauth_base: String,
        api_base: String,
        client_id: String,
        client_secret: String,
        request_timeout_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("gitlink-signin"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        Ok(Self {
            http,
            oauth_base: oauth_base.trim_end_matches('/').to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            client_id,
            client_secret,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let response = self
            .http
            .get(format!("{}{path}", self.api_base))
            .send()
            .await
            .with_context(|| format!("github request failed for {path}"))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .with_context(|| format!("failed to read github response for {path}"))?;
        if !status.is_success() {
            bail!(
                "github api status {status} for {path}: {}",
                truncate_body(&body)
            );
        }
        let parsed = serde_json::from_str::<T>(&body)
            .with_context(|| format!("failed to parse github response for {path}"))?;
        Ok(Some(parsed))
    }
}

#[async_trait]
impl IdentityExchanger for GitHubClient {
    async fn exchange_code(&self, code: &str) -> Result<LinkedIdentity> {
        let response = self
            .http
            .post(format!("{}/login/oauth/access_token", self.oauth_base))
            .json(&json!({
                "client_id": self.client_id,
                "client_secret": self.client_secret,
                "code": code,
            }))
            .send()
            .await
            .context("github access token request failed")?;
        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read github access token response")?;
        if !status.is_success() {
            bail!(
                "github access token status {status}: {}",
                truncate_body(&body)
            );
        }
        let token: OAuthAccessTokenResponse = serde_json::from_str(&body)
            .context("failed to parse github access token response")?;
        if let Some(error) = token.error {
            bail!(
                "github rejected the authorization code: {error} {}",
                token.error_description.unwrap_or_default()
            );
        }
        let access_token = token
            .access_token
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("github did not return an access token"))?;

        let response = self
            .http
            .get(format!("{}/user", self.api_base))
            .header(
                reqwest::header::AUTHORIZATION,
                format!("token {access_token}"),
            )
            .send()
            .await
            .context("github profile request failed")?;
        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read github profile response")?;
        if !status.is_success() {
            bail!("github profile status {status}: {}", truncate_body(&body));
        }
        let account: GitHubAccountResponse =
            serde_json::from_str(&body).context("failed to parse github profile response")?;
        Ok(LinkedIdentity {
            provider_user_id: account.id,
            login: account.login,
            access_token,
        })
    }
}

#[async_trait]
impl InstallationHost for GitHubClient {
    async fn installation_id(&self, owner: &str, repo: Option<&str>) -> Result<Option<u64>> {
        let path = match repo {
            Some(repo) => format!("/repos/{owner}/{repo}/installation"),
            None => format!("/users/{owner}/installation"),
        };
        let installation = self.get_json::<InstallationResponse>(&path).await?;
        Ok(installation.map(|installation| installation.id))
    }

    async fn account_id(&self, login: &str) -> Result<Option<u64>> {
        let account = self
            .get_json::<GitHubAccountResponse>(&format!("/users/{login}"))
            .await?;
        Ok(account.map(|account| account.id))
    }

    async fn app_install_page(&self) -> Result<String> {
        let app = self
            .get_json::<AppResponse>("/app")
            .await?
            .ok_or_else(|| anyhow!("github app lookup returned 404"))?;
        let html_url = app
            .html_url
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("github app lookup did not return html_url"))?;
        Ok(format!(
            "{}/installations/new",
            html_url.trim_end_matches('/')
        ))
    }
}

fn truncate_body(raw: &str) -> String {
    const LIMIT: usize = 256;
    let trimmed = raw.trim();
    if trimmed.chars().count() <= LIMIT {
        return trimmed.to_string();
    }
    let truncated: String = trimmed.chars().take(LIMIT).collect();
    format!("{truncated}…")
}
