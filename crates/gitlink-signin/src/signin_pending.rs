//! Best-effort TTL cache for commands awaiting authentication.
//!
//! The store is lossy by design: an entry may expire or be evicted before
//! the callback arrives, and the orchestrator treats a miss as a normal
//! outcome (direct redirect, no replay). Writes are last-write-wins.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use gitlink_core::deadline_unix_ms;

/// Default pending-command TTL. Kept shorter than the token TTL so a valid
/// but unreplayable token degrades to a direct redirect instead of an error.
pub const DEFAULT_PENDING_TTL_SECONDS: u64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// The original user request, cached so it can be replayed once sign-in
/// (and installation, when required) completes.
pub struct PendingCommand {
    pub text: String,
    pub trigger_ref: String,
    pub team_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub response_url: String,
}

#[derive(Debug, Clone)]
struct PendingEntry {
    command: PendingCommand,
    expires_unix_ms: u64,
}

/// Process-scoped pending-command cache. Constructed once at startup and
/// passed by reference; never reached through ambient global state.
pub struct PendingActionStore {
    ttl_seconds: u64,
    entries: Mutex<BTreeMap<String, PendingEntry>>,
}

impl PendingActionStore {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds: ttl_seconds.max(1),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Stores a command awaiting authentication, overwriting any existing
    /// entry for the same key.
    pub fn put(&self, key: &str, command: PendingCommand, now_unix_ms: u64) {
        let expires_unix_ms = deadline_unix_ms(now_unix_ms, self.ttl_seconds);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key.to_string(),
                PendingEntry {
                    command,
                    expires_unix_ms,
                },
            );
        }
    }

    /// Removes and returns the entry for `key`. Expired entries are pruned
    /// on the way; `None` is a valid outcome, not corruption.
    pub fn take(&self, key: &str, now_unix_ms: u64) -> Option<PendingCommand> {
        let mut entries = self.entries.lock().ok()?;
        entries.retain(|_, entry| entry.expires_unix_ms > now_unix_ms);
        entries.remove(key).map(|entry| entry.command)
    }

    /// Drops every entry. Simulates cache eviction in tests and gives
    /// operators a reset hook.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.is_empty())
            .unwrap_or(true)
    }
}
