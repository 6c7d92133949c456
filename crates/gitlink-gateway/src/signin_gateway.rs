//! Sign-in gateway server: configuration, state wiring, router, bootstrap.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use gitlink_signin::{
    CorrelationTokenCodec, GitHubClient, InMemoryIdentityDirectory, InstallationResolver,
    PendingActionStore, SignInFlow, SignInFlowConfig, SlackNotifier,
};

mod handlers;

use handlers::{
    handle_install_link, handle_oauth_callback, handle_oauth_login, handle_setup,
    handle_slack_command_post, handle_slack_command_resume,
};

#[derive(Debug, Clone)]
pub struct SignInGatewayConfig {
    pub bind: String,
    /// Public base URL used in prompt and install links. Defaults to the
    /// bound address when unset.
    pub base_url: Option<String>,
    pub signing_secret: String,
    pub github_client_id: String,
    pub github_client_secret: String,
    pub token_ttl_seconds: u64,
    pub pending_ttl_seconds: u64,
    pub github_oauth_base: String,
    pub github_api_base: String,
    pub slack_api_base: String,
    pub slack_bot_token: String,
    pub chat_base: String,
    pub request_timeout_ms: u64,
}

pub struct SignInGatewayState {
    flow: SignInFlow,
    chat_base: String,
}

impl SignInGatewayState {
    pub fn flow(&self) -> &SignInFlow {
        &self.flow
    }

    pub fn chat_base(&self) -> &str {
        &self.chat_base
    }
}

/// Wires the live collaborators and the flow for the given public base URL.
pub fn build_signin_state(
    config: &SignInGatewayConfig,
    base_url: String,
) -> Result<Arc<SignInGatewayState>> {
    let chat_base = config.chat_base.trim_end_matches('/').to_string();
    let github = Arc::new(GitHubClient::new(
        config.github_oauth_base.clone(),
        config.github_api_base.clone(),
        config.github_client_id.clone(),
        config.github_client_secret.clone(),
        config.request_timeout_ms,
    )?);
    let notifier = Arc::new(SlackNotifier::new(
        config.slack_api_base.clone(),
        config.slack_bot_token.clone(),
        config.request_timeout_ms,
    )?);
    let flow = SignInFlow::new(
        SignInFlowConfig {
            base_url: base_url.clone(),
            chat_base: chat_base.clone(),
            oauth_base: config.github_oauth_base.trim_end_matches('/').to_string(),
            client_id: config.github_client_id.clone(),
            token_ttl_seconds: config.token_ttl_seconds,
        },
        CorrelationTokenCodec::new(config.signing_secret.clone()),
        PendingActionStore::new(config.pending_ttl_seconds),
        github.clone(),
        Arc::new(InMemoryIdentityDirectory::new()),
        InstallationResolver::new(github, base_url),
        notifier,
    );
    Ok(Arc::new(SignInGatewayState { flow, chat_base }))
}

pub fn build_signin_router(state: Arc<SignInGatewayState>) -> Router {
    Router::new()
        .route(
            "/slack/command",
            post(handle_slack_command_post).get(handle_slack_command_resume),
        )
        .route("/github/oauth/login", get(handle_oauth_login))
        .route("/github/oauth/callback", get(handle_oauth_callback))
        .route(
            "/github/install/{owner_id}/{trigger_ref}",
            get(handle_install_link),
        )
        .route("/github/setup", get(handle_setup))
        .with_state(state)
}

/// Binds the configured address and serves the sign-in gateway until ctrl-c.
pub async fn run_signin_gateway_server(config: SignInGatewayConfig) -> Result<()> {
    let bind_addr = config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid --bind '{}'", config.bind))?;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind signin gateway on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound gateway address")?;
    let base_url = config
        .base_url
        .clone()
        .map(|value| value.trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| format!("http://{local_addr}"));

    let state = build_signin_state(&config, base_url.clone())?;
    tracing::info!(%local_addr, base_url, "signin gateway listening");

    let app = build_signin_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("signin gateway exited unexpectedly")?;
    Ok(())
}
