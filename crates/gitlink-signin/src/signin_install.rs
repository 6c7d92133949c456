//! Installation resolution for resource-referencing commands.
//!
//! State machine: `CheckInstallation → {Installed → ResumeTrigger |
//! NotInstalled → RedirectToInstall → AwaitingSetupCallback →
//! ResumeTrigger}`. Lookup misses cascade (installation 404 → owning
//! account 404) into a best-effort install URL instead of failing the flow.

use std::sync::Arc;

use anyhow::Result;

use gitlink_core::percent_encode_component;

use crate::signin_command::RepoRef;
use crate::signin_contract::{InstallationHost, InstallationState};

pub struct InstallationResolver {
    host: Arc<dyn InstallationHost>,
    base_url: String,
}

impl InstallationResolver {
    pub fn new(host: Arc<dyn InstallationHost>, base_url: impl Into<String>) -> Self {
        Self {
            host,
            base_url: base_url.into(),
        }
    }

    /// Queries the platform for an existing installation on the named
    /// resource. Only transport failures surface as errors.
    pub async fn check_installation(&self, resource: &RepoRef) -> Result<InstallationState> {
        if let Some(installation_id) = self
            .host
            .installation_id(&resource.owner, resource.name.as_deref())
            .await?
        {
            return Ok(InstallationState::Installed { installation_id });
        }
        match self.host.account_id(&resource.owner).await? {
            Some(owner_account_id) => Ok(InstallationState::NotInstalled { owner_account_id }),
            None => {
                tracing::debug!(owner = %resource.owner, "resource owner unresolved, degrading to generic install");
                Ok(InstallationState::Unknown {
                    resource_owner: resource.owner.clone(),
                })
            }
        }
    }

    /// Install redirect for a resolved owner, annotated with the trigger
    /// reference so the flow can resume after installation.
    pub fn build_install_url(&self, owner_account_id: u64, trigger_ref: &str) -> String {
        format!(
            "{}/github/install/{owner_account_id}/{}",
            self.base_url,
            percent_encode_component(trigger_ref)
        )
    }

    /// Platform installation page carrying the trigger reference as `state`,
    /// which the platform passes through to the setup callback.
    pub async fn install_page_url(&self, trigger_ref: &str) -> Result<String> {
        let page = self.host.app_install_page().await?;
        Ok(format!(
            "{page}?state={}",
            percent_encode_component(trigger_ref)
        ))
    }
}
