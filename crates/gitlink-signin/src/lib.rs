//! Sign-in correlation core for gitlink.
//!
//! Links an anonymous Slack slash command to a GitHub OAuth identity through
//! a signed, time-bounded correlation token, caches the pending command so it
//! can be replayed once sign-in completes, and resolves GitHub App
//! installation before the command is resumed. No server-side session state
//! is kept: everything needed to resume a flow travels inside the token or
//! the pending-command cache entry.

pub mod signin_command;
pub mod signin_contract;
pub mod signin_flow;
pub mod signin_github_client;
pub mod signin_install;
pub mod signin_pending;
pub mod signin_slack_client;
pub mod signin_token;

pub use signin_command::*;
pub use signin_contract::*;
pub use signin_flow::*;
pub use signin_github_client::*;
pub use signin_install::*;
pub use signin_pending::*;
pub use signin_slack_client::*;
pub use signin_token::*;
