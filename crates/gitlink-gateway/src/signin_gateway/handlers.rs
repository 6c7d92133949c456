//! Request handlers for the sign-in gateway endpoints.

use std::sync::Arc;

use axum::extract::{Form, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use gitlink_core::current_unix_timestamp_ms;
use gitlink_signin::{FlowError, SlashCommandPayload};

use super::SignInGatewayState;

#[derive(Debug, Deserialize)]
pub(super) struct TriggerQuery {
    trigger_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CallbackQuery {
    state: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SetupQuery {
    state: Option<String>,
}

pub(super) async fn handle_slack_command_post(
    State(state): State<Arc<SignInGatewayState>>,
    Form(payload): Form<SlashCommandPayload>,
) -> Response {
    let now_unix_ms = current_unix_timestamp_ms();
    match state
        .flow()
        .linked_identity(&payload.team_id, &payload.user_id)
        .await
    {
        Ok(Some(identity)) => {
            // Already linked; command execution belongs to the command
            // processor, not the sign-in gateway.
            Json(json!({
                "response_type": "ephemeral",
                "text": format!("GitHub account @{} is connected.", identity.login),
            }))
            .into_response()
        }
        Ok(None) => match state.flow().begin_sign_in(&payload, now_unix_ms) {
            Ok(prompt) => Json(prompt.message).into_response(),
            Err(error) => {
                tracing::error!(error = %format!("{error:#}"), "failed to begin sign-in");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "sign-in unavailable")
            }
        },
        Err(error) => {
            tracing::error!(error = %format!("{error:#}"), "identity directory lookup failed");
            error_response(StatusCode::BAD_GATEWAY, "identity lookup failed")
        }
    }
}

pub(super) async fn handle_slack_command_resume(
    State(state): State<Arc<SignInGatewayState>>,
    Query(query): Query<TriggerQuery>,
) -> Response {
    let Some(trigger_id) = query.trigger_id.filter(|value| !value.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "missing trigger_id");
    };
    match state
        .flow()
        .resume_trigger(&trigger_id, current_unix_timestamp_ms())
        .await
    {
        Ok(target) => found_redirect(target.location()),
        Err(error) => flow_error_response(error),
    }
}

pub(super) async fn handle_oauth_login(
    State(state): State<Arc<SignInGatewayState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(token) = query.state.filter(|value| !value.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "missing state");
    };
    // The token passes through unvalidated; the provider echoes it back to
    // the callback, which is where validation happens.
    found_redirect(state.flow().authorize_redirect(&token).location())
}

pub(super) async fn handle_oauth_callback(
    State(state): State<Arc<SignInGatewayState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let token = query.state.unwrap_or_default();
    let code = query.code.unwrap_or_default();
    match state
        .flow()
        .handle_callback(&token, &code, current_unix_timestamp_ms())
        .await
    {
        Ok(target) => found_redirect(target.location()),
        Err(error) => flow_error_response(error),
    }
}

pub(super) async fn handle_install_link(
    State(state): State<Arc<SignInGatewayState>>,
    Path((owner_id, trigger_ref)): Path<(u64, String)>,
) -> Response {
    tracing::debug!(owner_id, trigger_ref, "install link followed");
    match state.flow().handle_install_redirect(&trigger_ref).await {
        Ok(target) => found_redirect(target.location()),
        Err(error) => flow_error_response(error),
    }
}

pub(super) async fn handle_setup(
    State(state): State<Arc<SignInGatewayState>>,
    Query(query): Query<SetupQuery>,
) -> Response {
    match query.state.filter(|value| !value.is_empty()) {
        Some(trigger_ref) => {
            found_redirect(state.flow().handle_setup_callback(&trigger_ref).location())
        }
        // No trigger context survived installation; land on the chat surface.
        None => found_redirect(&format!("{}/app_redirect", state.chat_base())),
    }
}

// The stage-transition contract is a plain 302; axum's `Redirect` helper
// emits 303/307, so the response is assembled directly.
fn found_redirect(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location.to_string())],
    )
        .into_response()
}

fn error_response(status: StatusCode, reason: &str) -> Response {
    (status, format!("Error: {reason}")).into_response()
}

fn flow_error_response(error: FlowError) -> Response {
    match &error {
        FlowError::Token(token_error) => {
            error_response(StatusCode::BAD_REQUEST, &token_error.to_string())
        }
        FlowError::IdentityExchange(_)
        | FlowError::InstallationLookup(_)
        | FlowError::ChatDelivery(_) => {
            tracing::error!(error = %error, "collaborator failure in sign-in flow");
            error_response(StatusCode::BAD_GATEWAY, &error.to_string())
        }
    }
}
