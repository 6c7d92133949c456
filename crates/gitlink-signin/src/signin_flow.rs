//! Auth callback orchestration: prompt, callback, replay-or-redirect.
//!
//! Drives the state machine `AwaitingAuthorization → CallbackReceived →
//! {TokenInvalid | TokenValid} → {CommandFound → Replay | CommandAbsent →
//! DirectRedirect}` across the sign-in round trip. Each HTTP hop re-enters
//! the machine through one of the methods below; the only carried state is
//! the correlation token and the pending-command cache entry.

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use thiserror::Error;

use gitlink_core::{correlation_key, percent_encode_component};

use crate::signin_command::{parse_command_action, SlashCommandPayload};
use crate::signin_contract::{
    ChatNotifier, IdentityDirectory, IdentityExchanger, InstallationState, LinkedIdentity,
};
use crate::signin_install::InstallationResolver;
use crate::signin_pending::{PendingActionStore, PendingCommand};
use crate::signin_token::{CorrelationTokenCodec, TokenError};

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{0}")]
    Token(#[from] TokenError),
    #[error("identity exchange failed: {0}")]
    IdentityExchange(anyhow::Error),
    #[error("installation lookup failed: {0}")]
    InstallationLookup(anyhow::Error),
    #[error("chat delivery failed: {0}")]
    ChatDelivery(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Terminal redirect decision of a flow step. Each variant carries the exact
/// `Location` value the gateway emits with a 302.
pub enum RedirectTarget {
    /// External authorization prompt (`/login/oauth/authorize?...`).
    Authorize(String),
    /// Re-entry into command processing via the trigger-resume URL.
    TriggerResume(String),
    /// Targeted install redirect for a resolved resource owner.
    Install(String),
    /// Generic platform installation page (owner unresolved).
    InstallPage(String),
    /// Straight back to the chat surface, no replay.
    DirectChat(String),
}

impl RedirectTarget {
    pub fn location(&self) -> &str {
        match self {
            Self::Authorize(url)
            | Self::TriggerResume(url)
            | Self::Install(url)
            | Self::InstallPage(url)
            | Self::DirectChat(url) => url,
        }
    }
}

#[derive(Debug, Clone)]
/// Ephemeral prompt returned in response to an unauthenticated command.
pub struct SignInPrompt {
    pub prompt_url: String,
    pub message: Value,
}

#[derive(Clone)]
pub struct SignInFlowConfig {
    /// Public base URL of this service, used in prompt and install links.
    pub base_url: String,
    /// Chat surface base for direct redirects (`https://slack.com`).
    pub chat_base: String,
    /// OAuth provider base for the authorize redirect.
    pub oauth_base: String,
    pub client_id: String,
    pub token_ttl_seconds: u64,
}

pub struct SignInFlow {
    config: SignInFlowConfig,
    codec: CorrelationTokenCodec,
    pending: PendingActionStore,
    identity: Arc<dyn IdentityExchanger>,
    directory: Arc<dyn IdentityDirectory>,
    installs: InstallationResolver,
    notifier: Arc<dyn ChatNotifier>,
}

impl SignInFlow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SignInFlowConfig,
        codec: CorrelationTokenCodec,
        pending: PendingActionStore,
        identity: Arc<dyn IdentityExchanger>,
        directory: Arc<dyn IdentityDirectory>,
        installs: InstallationResolver,
        notifier: Arc<dyn ChatNotifier>,
    ) -> Self {
        Self {
            config,
            codec,
            pending,
            identity,
            directory,
            installs,
            notifier,
        }
    }

    /// Enters `AwaitingAuthorization`: caches the command when it should be
    /// replayed, issues the correlation token, and returns the ephemeral
    /// prompt whose action link starts the OAuth round trip.
    pub fn begin_sign_in(
        &self,
        payload: &SlashCommandPayload,
        now_unix_ms: u64,
    ) -> Result<SignInPrompt> {
        let action = parse_command_action(&payload.text);
        if action.should_replay() {
            let key = correlation_key(&payload.team_id, &payload.user_id, &payload.channel_id);
            self.pending.put(
                &key,
                PendingCommand {
                    text: payload.text.clone(),
                    trigger_ref: payload.trigger_id.clone(),
                    team_id: payload.team_id.clone(),
                    channel_id: payload.channel_id.clone(),
                    user_id: payload.user_id.clone(),
                    response_url: payload.response_url.clone(),
                },
                now_unix_ms,
            );
        }
        let token = self.codec.issue(
            &payload.team_id,
            &payload.user_id,
            &payload.channel_id,
            self.config.token_ttl_seconds,
            now_unix_ms / 1_000,
        )?;
        let prompt_url = format!("{}/github/oauth/login?state={token}", self.config.base_url);
        let message = json!({
            "response_type": "ephemeral",
            "attachments": [{
                "text": "Finish connecting your GitHub account to run that command.",
                "fallback": format!("Connect your GitHub account: {prompt_url}"),
                "actions": [{
                    "type": "button",
                    "text": "Connect GitHub account",
                    "url": prompt_url,
                }],
            }],
        });
        Ok(SignInPrompt {
            prompt_url,
            message,
        })
    }

    /// Authorize redirect for the login endpoint. The state token passes
    /// through untouched; it is only validated at callback time.
    pub fn authorize_redirect(&self, state: &str) -> RedirectTarget {
        RedirectTarget::Authorize(format!(
            "{}/login/oauth/authorize?client_id={}&state={state}",
            self.config.oauth_base, self.config.client_id
        ))
    }

    /// `CallbackReceived`: validates the state token, exchanges the code for
    /// a linked identity, records the link, confirms via an ephemeral
    /// notice, then decides replay-or-redirect from the pending cache.
    pub async fn handle_callback(
        &self,
        state: &str,
        code: &str,
        now_unix_ms: u64,
    ) -> Result<RedirectTarget, FlowError> {
        let claims = self.codec.verify(state, now_unix_ms / 1_000)?;
        let identity = self
            .identity
            .exchange_code(code)
            .await
            .map_err(FlowError::IdentityExchange)?;
        self.directory
            .record_link(&claims.team_id, &claims.user_id, identity.clone())
            .await
            .map_err(FlowError::IdentityExchange)?;
        self.notifier
            .post_ephemeral(
                &claims.team_id,
                &claims.channel_id,
                &claims.user_id,
                &signed_in_notice(&identity),
            )
            .await
            .map_err(FlowError::ChatDelivery)?;

        let key = correlation_key(&claims.team_id, &claims.user_id, &claims.channel_id);
        let Some(command) = self.pending.take(&key, now_unix_ms) else {
            // Expired, evicted, or never written (bare signin). Normal path.
            tracing::debug!(team = %claims.team_id, user = %claims.user_id, "no pending command at callback");
            return Ok(self.direct_chat(&claims.team_id, &claims.channel_id));
        };
        let action = parse_command_action(&command.text);
        if action.resource_reference().is_none() {
            return Ok(self.direct_chat(&claims.team_id, &claims.channel_id));
        }
        // Resource commands resume through the trigger URL so installation
        // can be resolved on re-entry. Re-queue under the trigger ref; the
        // correlation-key entry was consumed above.
        let trigger_ref = command.trigger_ref.clone();
        self.pending.put(&trigger_ref, command, now_unix_ms);
        Ok(RedirectTarget::TriggerResume(trigger_resume_path(
            &trigger_ref,
        )))
    }

    /// Re-enters command processing for a deferred command. Delegates to the
    /// installation resolver; replays through the response hook once an
    /// installation exists.
    pub async fn resume_trigger(
        &self,
        trigger_ref: &str,
        now_unix_ms: u64,
    ) -> Result<RedirectTarget, FlowError> {
        let Some(command) = self.pending.take(trigger_ref, now_unix_ms) else {
            // Nothing left to replay and no channel context to return to.
            tracing::debug!(trigger_ref, "trigger resume with no pending command");
            return Ok(RedirectTarget::DirectChat(format!(
                "{}/app_redirect",
                self.config.chat_base
            )));
        };
        let action = parse_command_action(&command.text);
        let Some(resource) = action.resource_reference() else {
            return Ok(self.direct_chat(&command.team_id, &command.channel_id));
        };
        let installation = self
            .installs
            .check_installation(&resource)
            .await
            .map_err(FlowError::InstallationLookup)?;
        match installation {
            InstallationState::Installed { installation_id } => {
                tracing::info!(resource = %resource.full_name(), installation_id, "replaying pending command");
                self.notifier
                    .post_response(&command.response_url, replay_payload(&command))
                    .await
                    .map_err(FlowError::ChatDelivery)?;
                Ok(self.direct_chat(&command.team_id, &command.channel_id))
            }
            InstallationState::NotInstalled { owner_account_id } => {
                let url = self
                    .installs
                    .build_install_url(owner_account_id, &command.trigger_ref);
                self.requeue(command, now_unix_ms);
                Ok(RedirectTarget::Install(url))
            }
            InstallationState::Unknown { resource_owner } => {
                tracing::warn!(resource_owner, "install redirect without resolved owner");
                let url = self
                    .installs
                    .install_page_url(&command.trigger_ref)
                    .await
                    .map_err(FlowError::InstallationLookup)?;
                self.requeue(command, now_unix_ms);
                Ok(RedirectTarget::InstallPage(url))
            }
        }
    }

    /// Install-link endpoint: forwards to the platform installation page.
    pub async fn handle_install_redirect(
        &self,
        trigger_ref: &str,
    ) -> Result<RedirectTarget, FlowError> {
        let url = self
            .installs
            .install_page_url(trigger_ref)
            .await
            .map_err(FlowError::InstallationLookup)?;
        Ok(RedirectTarget::InstallPage(url))
    }

    /// Setup callback after installation: back into the trigger-resume URL,
    /// which re-enters command processing now that the installation exists.
    pub fn handle_setup_callback(&self, trigger_ref: &str) -> RedirectTarget {
        RedirectTarget::TriggerResume(trigger_resume_path(trigger_ref))
    }

    pub async fn linked_identity(
        &self,
        team_id: &str,
        user_id: &str,
    ) -> Result<Option<LinkedIdentity>> {
        self.directory.linked_identity(team_id, user_id).await
    }

    /// Eviction hook for tests and operators.
    pub fn clear_pending(&self) {
        self.pending.clear();
    }

    fn direct_chat(&self, team_id: &str, channel_id: &str) -> RedirectTarget {
        RedirectTarget::DirectChat(format!(
            "{}/app_redirect?team={}&channel={}",
            self.config.chat_base,
            percent_encode_component(team_id),
            percent_encode_component(channel_id)
        ))
    }

    // A deferred command goes back into the cache under the same trigger
    // ref, so each hop consumes at most once and the final replay happens
    // exactly once.
    fn requeue(&self, command: PendingCommand, now_unix_ms: u64) {
        let trigger_ref = command.trigger_ref.clone();
        self.pending.put(&trigger_ref, command, now_unix_ms);
    }
}

fn trigger_resume_path(trigger_ref: &str) -> String {
    format!(
        "/slack/command?trigger_id={}",
        percent_encode_component(trigger_ref)
    )
}

fn signed_in_notice(identity: &LinkedIdentity) -> String {
    format!(
        "Connected GitHub account @{}. You're ready to go.",
        identity.login
    )
}

fn replay_payload(command: &PendingCommand) -> Value {
    json!({
        "response_type": "in_channel",
        "text": format!("Finished running `{}`.", command.text),
    })
}
