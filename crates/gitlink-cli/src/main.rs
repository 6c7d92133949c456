//! gitlink server binary: parses flags (with `GITLINK_*` env fallbacks) and
//! runs the sign-in gateway.

use anyhow::Result;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use gitlink_gateway::{run_signin_gateway_server, SignInGatewayConfig};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "gitlink",
    about = "Links Slack slash commands to GitHub identities and replays them after sign-in",
    version
)]
struct Cli {
    #[arg(
        long,
        env = "GITLINK_BIND",
        default_value = "127.0.0.1:8788",
        help = "Address to bind the gateway on"
    )]
    bind: String,

    #[arg(
        long,
        env = "GITLINK_BASE_URL",
        help = "Public base URL for prompt and install links; defaults to the bound address"
    )]
    base_url: Option<String>,

    #[arg(
        long,
        env = "GITLINK_SIGNING_SECRET",
        help = "Secret used to sign correlation tokens"
    )]
    signing_secret: String,

    #[arg(long, env = "GITLINK_GITHUB_CLIENT_ID", default_value = "")]
    github_client_id: String,

    #[arg(long, env = "GITLINK_GITHUB_CLIENT_SECRET", default_value = "")]
    github_client_secret: String,

    #[arg(
        long,
        env = "GITLINK_TOKEN_TTL_SECONDS",
        default_value_t = 3_600,
        value_parser = parse_positive_u64,
        help = "Correlation token validity window"
    )]
    token_ttl_seconds: u64,

    #[arg(
        long,
        env = "GITLINK_PENDING_TTL_SECONDS",
        default_value_t = 600,
        value_parser = parse_positive_u64,
        help = "Pending-command cache TTL; keep at or below the token TTL"
    )]
    pending_ttl_seconds: u64,

    #[arg(
        long,
        env = "GITLINK_GITHUB_OAUTH_BASE",
        default_value = "https://github.com"
    )]
    github_oauth_base: String,

    #[arg(
        long,
        env = "GITLINK_GITHUB_API_BASE",
        default_value = "https://api.github.com"
    )]
    github_api_base: String,

    #[arg(
        long,
        env = "GITLINK_SLACK_API_BASE",
        default_value = "https://slack.com"
    )]
    slack_api_base: String,

    #[arg(long, env = "GITLINK_SLACK_BOT_TOKEN", default_value = "")]
    slack_bot_token: String,

    #[arg(
        long,
        env = "GITLINK_CHAT_BASE",
        default_value = "https://slack.com",
        help = "Chat surface base for direct redirects"
    )]
    chat_base: String,

    #[arg(
        long,
        env = "GITLINK_REQUEST_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64
    )]
    request_timeout_ms: u64,
}

impl Cli {
    fn into_config(self) -> SignInGatewayConfig {
        SignInGatewayConfig {
            bind: self.bind,
            base_url: self.base_url,
            signing_secret: self.signing_secret,
            github_client_id: self.github_client_id,
            github_client_secret: self.github_client_secret,
            token_ttl_seconds: self.token_ttl_seconds,
            pending_ttl_seconds: self.pending_ttl_seconds,
            github_oauth_base: self.github_oauth_base,
            github_api_base: self.github_api_base,
            slack_api_base: self.slack_api_base,
            slack_bot_token: self.slack_bot_token,
            chat_base: self.chat_base,
            request_timeout_ms: self.request_timeout_ms,
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_signin_gateway_server(cli.into_config()).await
}
