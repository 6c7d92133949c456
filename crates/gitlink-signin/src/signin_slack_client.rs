//! Slack notifier: ephemeral notices and response-hook posts.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::signin_contract::ChatNotifier;

#[derive(Debug, Clone, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    error: Option<String>,
}

#[derive(Clone)]
pub struct SlackNotifier {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl SlackNotifier {
    pub fn new(api_base: String, bot_token: String, request_timeout_ms: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create slack api client")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.trim().to_string(),
        })
    }
}

#[async_trait]
impl ChatNotifier for SlackNotifier {
    // The bot token is workspace-scoped, so `team_id` is informational only.
    async fn post_ephemeral(
        &self,
        team_id: &str,
        channel_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<()> {
        tracing::debug!(team_id, channel_id, user_id, "posting ephemeral notice");
        let response = self
            .http
            .post(format!("{}/api/chat.postEphemeral", self.api_base))
            .bearer_auth(&self.bot_token)
            .json(&json!({
                "channel": channel_id,
                "user": user_id,
                "text": text,
                "attachments": serde_json::to_string(&json!([{ "text": text }]))
                    .unwrap_or_default(),
            }))
            .send()
            .await
            .context("slack chat.postEphemeral request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("slack chat.postEphemeral status {status}");
        }
        let body: SlackApiResponse = response
            .json()
            .await
            .context("failed to parse slack chat.postEphemeral response")?;
        if !body.ok {
            bail!(
                "slack chat.postEphemeral failed: {}",
                body.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
        Ok(())
    }

    async fn post_response(&self, response_url: &str, payload: Value) -> Result<()> {
        let response = self
            .http
            .post(response_url)
            .json(&payload)
            .send()
            .await
            .context("slack response hook request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("slack response hook status {status}");
        }
        Ok(())
    }
}
