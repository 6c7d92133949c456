//! Collaborator contracts consumed by the sign-in flow.
//!
//! The flow never talks to GitHub, Slack, or a datastore directly; it goes
//! through these narrow seams so the orchestration logic stays testable and
//! the collaborators stay swappable.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// External account identity bound to the chat identity after a successful
/// OAuth exchange. The flow receives it as a result value only; persistence
/// belongs to the [`IdentityDirectory`] collaborator.
pub struct LinkedIdentity {
    pub provider_user_id: u64,
    pub login: String,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Whether the companion application is installed for the resource named in
/// a pending command.
pub enum InstallationState {
    /// No installation; the owning account resolved, so a targeted install
    /// link can be built.
    NotInstalled { owner_account_id: u64 },
    Installed { installation_id: u64 },
    /// Neither the installation nor the owning account could be resolved.
    /// Still redirectable to the generic install entry point.
    Unknown { resource_owner: String },
}

#[async_trait]
/// Exchanges an OAuth authorization code for a linked identity.
pub trait IdentityExchanger: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<LinkedIdentity>;
}

#[async_trait]
/// Installation lookups against the external platform.
pub trait InstallationHost: Send + Sync {
    /// Installation id for a repository (or, with `repo` absent, for the
    /// account itself). `Ok(None)` means the platform reported no
    /// installation; transport failures stay errors.
    async fn installation_id(&self, owner: &str, repo: Option<&str>) -> Result<Option<u64>>;

    /// Account id for a login; `Ok(None)` when the account does not exist.
    async fn account_id(&self, login: &str) -> Result<Option<u64>>;

    /// Entry-point URL of the companion application's installation page.
    async fn app_install_page(&self) -> Result<String>;
}

#[async_trait]
/// Linked-account persistence. A generic datastore in production; the
/// in-memory implementation below covers tests and single-process demos.
pub trait IdentityDirectory: Send + Sync {
    async fn linked_identity(&self, team_id: &str, user_id: &str) -> Result<Option<LinkedIdentity>>;
    async fn record_link(
        &self,
        team_id: &str,
        user_id: &str,
        identity: LinkedIdentity,
    ) -> Result<()>;
}

#[async_trait]
/// Outbound chat delivery: ephemeral notices and response-hook posts.
pub trait ChatNotifier: Send + Sync {
    async fn post_ephemeral(
        &self,
        team_id: &str,
        channel_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<()>;

    async fn post_response(&self, response_url: &str, payload: Value) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryIdentityDirectory {
    links: Mutex<BTreeMap<String, LinkedIdentity>>,
}

impl InMemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(team_id: &str, user_id: &str) -> String {
        format!("{team_id}:{user_id}")
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryIdentityDirectory {
    async fn linked_identity(&self, team_id: &str, user_id: &str) -> Result<Option<LinkedIdentity>> {
        let links = self
            .links
            .lock()
            .map_err(|_| anyhow::anyhow!("identity directory lock poisoned"))?;
        Ok(links.get(&Self::key(team_id, user_id)).cloned())
    }

    async fn record_link(
        &self,
        team_id: &str,
        user_id: &str,
        identity: LinkedIdentity,
    ) -> Result<()> {
        let mut links = self
            .links
            .lock()
            .map_err(|_| anyhow::anyhow!("identity directory lock poisoned"))?;
        links.insert(Self::key(team_id, user_id), identity);
        Ok(())
    }
}
