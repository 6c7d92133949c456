//! End-to-end sign-in scenarios over a bound gateway, with GitHub and Slack
//! stood in by httpmock.

use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use gitlink_gateway::{
    build_signin_router, build_signin_state, SignInGatewayConfig, SignInGatewayState,
};
use gitlink_signin::CorrelationTokenCodec;

const SECRET: &str = "integration-signing-secret";
const TRIGGER_ID: &str = "13345224609.738474920.8088930838d88f008e0";

struct Gateway {
    base_url: String,
    state: Arc<SignInGatewayState>,
    client: reqwest::Client,
}

impl Gateway {
    async fn post_command(&self, text: &str, response_url: &str) -> Value {
        let response = self
            .client
            .post(format!("{}/slack/command", self.base_url))
            .form(&[
                ("team_id", "T0001"),
                ("channel_id", "C2147483705"),
                ("user_id", "U2147483697"),
                ("text", text),
                ("trigger_id", TRIGGER_ID),
                ("response_url", response_url),
            ])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        response.json().await.unwrap()
    }

    /// Extracts the `state` token from the prompt's action URL.
    fn prompt_state(&self, body: &Value) -> String {
        let action = &body["attachments"][0]["actions"][0];
        assert_eq!(action["text"], "Connect GitHub account");
        let url = action["url"].as_str().unwrap();
        assert!(url.starts_with(&format!("{}/github/oauth/login?state=", self.base_url)));
        url.split("state=").nth(1).unwrap().to_string()
    }

    async fn get(&self, path_or_url: &str) -> reqwest::Response {
        let url = if path_or_url.starts_with("http") {
            path_or_url.to_string()
        } else {
            format!("{}{path_or_url}", self.base_url)
        };
        self.client.get(url).send().await.unwrap()
    }
}

async fn spawn_gateway(github: &MockServer, slack: &MockServer) -> Gateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local_addr = listener.local_addr().unwrap();
    let base_url = format!("http://{local_addr}");
    let config = SignInGatewayConfig {
        bind: "127.0.0.1:0".to_string(),
        base_url: Some(base_url.clone()),
        signing_secret: SECRET.to_string(),
        github_client_id: String::new(),
        github_client_secret: "client-secret".to_string(),
        token_ttl_seconds: 3_600,
        pending_ttl_seconds: 600,
        github_oauth_base: github.base_url(),
        github_api_base: github.base_url(),
        slack_api_base: slack.base_url(),
        slack_bot_token: "xoxb-test".to_string(),
        chat_base: "https://slack.com".to_string(),
        request_timeout_ms: 5_000,
    };
    let state = build_signin_state(&config, base_url.clone()).unwrap();
    let app = build_signin_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    Gateway {
        base_url,
        state,
        client,
    }
}

async fn mock_oauth_exchange<'g, 's>(
    github: &'g MockServer,
    slack: &'s MockServer,
) -> (httpmock::Mock<'g>, httpmock::Mock<'s>) {
    let token_mock = github
        .mock_async(|when, then| {
            when.method(POST).path("/login/oauth/access_token");
            then.status(200).json_body(json!({ "access_token": "gh-token" }));
        })
        .await;
    github
        .mock_async(|when, then| {
            when.method(GET).path("/user");
            then.status(200)
                .json_body(json!({ "id": 1, "login": "octocat" }));
        })
        .await;
    let ephemeral_mock = slack
        .mock_async(|when, then| {
            when.method(POST).path("/api/chat.postEphemeral");
            then.status(200).json_body(json!({ "ok": true }));
        })
        .await;
    (token_mock, ephemeral_mock)
}

#[tokio::test]
async fn signin_command_round_trips_to_a_direct_redirect() {
    let github = MockServer::start_async().await;
    let slack = MockServer::start_async().await;
    let gateway = spawn_gateway(&github, &slack).await;

    // User types `signin`, gets the ephemeral prompt.
    let body = gateway.post_command("signin", "").await;
    let state = gateway.prompt_state(&body);

    // Following the prompt link redirects to the provider authorize URL
    // with the state token passed through.
    let login = gateway
        .get(&format!("/github/oauth/login?state={state}"))
        .await;
    assert_eq!(login.status(), 302);
    assert_eq!(
        login.headers()["location"].to_str().unwrap(),
        format!(
            "{}/login/oauth/authorize?client_id=&state={state}",
            github.base_url()
        )
    );

    // Provider redirects back; identity is exchanged and linked, the user
    // gets a confirmation ephemeral, and with nothing to replay the flow
    // lands straight on the chat surface.
    let (_, ephemeral_mock) = mock_oauth_exchange(&github, &slack).await;
    let callback = gateway
        .get(&format!("/github/oauth/callback?state={state}&code=abc"))
        .await;
    assert_eq!(callback.status(), 302);
    assert_eq!(
        callback.headers()["location"],
        "https://slack.com/app_redirect?team=T0001&channel=C2147483705"
    );
    ephemeral_mock.assert_async().await;
}

#[tokio::test]
async fn subscribe_command_installs_the_app_and_replays_once() {
    let github = MockServer::start_async().await;
    let slack = MockServer::start_async().await;
    let gateway = spawn_gateway(&github, &slack).await;
    let response_url = format!("{}/commands/1234/5678", slack.base_url());
    let trigger_url = format!("/slack/command?trigger_id={TRIGGER_ID}");

    let body = gateway
        .post_command("subscribe kubernetes/kubernetes", &response_url)
        .await;
    let state = gateway.prompt_state(&body);

    // Callback with a pending resource command resumes via the trigger URL.
    mock_oauth_exchange(&github, &slack).await;
    let callback = gateway
        .get(&format!("/github/oauth/callback?state={state}&code=abc"))
        .await;
    assert_eq!(callback.status(), 302);
    assert_eq!(
        callback.headers()["location"].to_str().unwrap(),
        trigger_url
    );

    // No installation yet: the resume redirects into the install flow.
    let mut not_installed = github
        .mock_async(|when, then| {
            when.method(GET)
                .path("/repos/kubernetes/kubernetes/installation");
            then.status(404);
        })
        .await;
    github
        .mock_async(|when, then| {
            when.method(GET).path("/users/kubernetes");
            then.status(200)
                .json_body(json!({ "id": 13_629_408, "login": "kubernetes" }));
        })
        .await;
    let resume = gateway.get(&trigger_url).await;
    assert_eq!(resume.status(), 302);
    let install_link = resume.headers()["location"].to_str().unwrap().to_string();
    assert_eq!(
        install_link,
        format!(
            "{}/github/install/13629408/{TRIGGER_ID}",
            gateway.base_url
        )
    );

    // The install link forwards to the platform's installation page,
    // carrying the trigger ref so setup can resume.
    github
        .mock_async(|when, then| {
            when.method(GET).path("/app");
            then.status(200)
                .json_body(json!({ "html_url": format!("{}/apps/gitlink", github.base_url()) }));
        })
        .await;
    let install = gateway.get(&install_link).await;
    assert_eq!(install.status(), 302);
    assert_eq!(
        install.headers()["location"].to_str().unwrap(),
        format!(
            "{}/apps/gitlink/installations/new?state={TRIGGER_ID}",
            github.base_url()
        )
    );

    // User installs the app; setup redirects back into the trigger.
    let setup = gateway
        .get(&format!("/github/setup?state={TRIGGER_ID}"))
        .await;
    assert_eq!(setup.status(), 302);
    assert_eq!(setup.headers()["location"].to_str().unwrap(), trigger_url);

    // Installation now exists: the resume replays the command through the
    // response hook and lands on the chat surface.
    not_installed.delete_async().await;
    github
        .mock_async(|when, then| {
            when.method(GET)
                .path("/repos/kubernetes/kubernetes/installation");
            then.status(200)
                .json_body(json!({ "id": 1, "account": { "login": "kubernetes" } }));
        })
        .await;
    let replay_mock = slack
        .mock_async(|when, then| {
            when.method(POST).path("/commands/1234/5678");
            then.status(200);
        })
        .await;
    let resumed = gateway.get(&trigger_url).await;
    assert_eq!(resumed.status(), 302);
    assert_eq!(
        resumed.headers()["location"],
        "https://slack.com/app_redirect?team=T0001&channel=C2147483705"
    );
    replay_mock.assert_async().await;

    // The command was consumed; resuming again has nothing to replay.
    let drained = gateway.get(&trigger_url).await;
    assert_eq!(drained.status(), 302);
    assert_eq!(
        drained.headers()["location"],
        "https://slack.com/app_redirect"
    );
    assert_eq!(replay_mock.hits_async().await, 1);
}

#[tokio::test]
async fn evicted_pending_command_degrades_to_a_direct_redirect() {
    let github = MockServer::start_async().await;
    let slack = MockServer::start_async().await;
    let gateway = spawn_gateway(&github, &slack).await;

    let body = gateway
        .post_command("subscribe kubernetes/kubernetes", "")
        .await;
    let state = gateway.prompt_state(&body);

    // Simulate cache eviction between prompt and callback.
    gateway.state.flow().clear_pending();

    let (_, ephemeral_mock) = mock_oauth_exchange(&github, &slack).await;
    let callback = gateway
        .get(&format!("/github/oauth/callback?state={state}&code=abc"))
        .await;
    assert_eq!(callback.status(), 302);
    assert_eq!(
        callback.headers()["location"],
        "https://slack.com/app_redirect?team=T0001&channel=C2147483705"
    );
    ephemeral_mock.assert_async().await;
}

#[tokio::test]
async fn token_failures_surface_as_400_with_the_reason_taxonomy() {
    let github = MockServer::start_async().await;
    let slack = MockServer::start_async().await;
    let gateway = spawn_gateway(&github, &slack).await;

    let invalid = gateway
        .get("/github/oauth/callback?state=i-am-not-valid")
        .await;
    assert_eq!(invalid.status(), 400);
    assert_eq!(invalid.text().await.unwrap(), "Error: jwt malformed");

    let tampered_token = CorrelationTokenCodec::new(format!("{SECRET}-fake"))
        .issue("T01234", "U01234", "C01234", 3_600, 1_700_000_000)
        .unwrap();
    let tampered = gateway
        .get(&format!("/github/oauth/callback?state={tampered_token}"))
        .await;
    assert_eq!(tampered.status(), 400);
    assert_eq!(tampered.text().await.unwrap(), "Error: invalid signature");

    let expired_token = CorrelationTokenCodec::new(SECRET)
        .issue("T0001", "U2147483697", "C2147483705", 1, 1_700_000_000)
        .unwrap();
    let expired = gateway
        .get(&format!("/github/oauth/callback?state={expired_token}"))
        .await;
    assert_eq!(expired.status(), 400);
    assert_eq!(expired.text().await.unwrap(), "Error: jwt expired");
}

#[tokio::test]
async fn identity_exchange_failure_is_a_502() {
    let github = MockServer::start_async().await;
    let slack = MockServer::start_async().await;
    let gateway = spawn_gateway(&github, &slack).await;

    let body = gateway.post_command("signin", "").await;
    let state = gateway.prompt_state(&body);

    github
        .mock_async(|when, then| {
            when.method(POST).path("/login/oauth/access_token");
            then.status(200)
                .json_body(json!({ "error": "bad_verification_code" }));
        })
        .await;
    let callback = gateway
        .get(&format!("/github/oauth/callback?state={state}&code=bad"))
        .await;
    assert_eq!(callback.status(), 502);
    assert!(callback
        .text()
        .await
        .unwrap()
        .starts_with("Error: identity exchange failed"));
}
