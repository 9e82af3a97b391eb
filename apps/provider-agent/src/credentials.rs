// [apps/provider-agent/src/credentials.rs]
//! Persists the api key issued by `register` so that restarting the
//! agent reuses the same provider identity instead of registering a
//! fresh one every boot.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// The durable half of a provider's identity: enough to call
/// `authenticate` again without repeating registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub provider_id: Uuid,
    pub api_key: String,
}

impl StoredCredentials {
    /// Reads credentials from disk, returning `None` if the file is
    /// simply absent (first boot) rather than treating that as an error.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading credentials file at {}", path.display()))?;
        let credentials: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing credentials file at {}", path.display()))?;
        Ok(Some(credentials))
    }

    /// Writes credentials to disk, creating the parent directory if
    /// needed. The api key is stored in plaintext, matching the
    /// orchestrator's own guarantee that it is handed back exactly
    /// once and never recoverable except by re-registering.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating credentials directory {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(self).context("serializing credentials")?;
        std::fs::write(path, raw).with_context(|| format!("writing credentials file at {}", path.display()))?;
        info!(path = %path.display(), "credentials persisted");
        Ok(())
    }
}
