// [apps/provider-agent/src/config.rs]
//! Runtime tunables for a single agent process. Unlike the
//! orchestrator's layered `config` crate setup, the agent is a single
//! long-lived process deployed one-per-host, so its configuration is
//! just the CLI/environment arguments collected in `main.rs` and
//! passed down as this plain struct.

use std::path::PathBuf;
use std::time::Duration;

/// Everything the agent needs to know to run, independent of where it
/// came from (CLI flag or `NEBULA_AGENT__*` environment variable).
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub orchestrator_url: String,
    pub credentials_path: PathBuf,
    pub heartbeat_interval: Duration,
    pub verification_interval: Duration,
    pub simulated_device_counts: SimulatedDeviceCounts,
    pub agent_version: String,
    /// Only consulted the first time this agent boots against a given
    /// orchestrator; once `credentials_path` exists, registration is
    /// skipped entirely and these fields are ignored.
    pub registration: RegistrationProfile,
}

#[derive(Debug, Clone)]
pub struct RegistrationProfile {
    pub provider_name: String,
    pub contact_email: String,
    pub organization: String,
    pub public_key: String,
    pub region: Option<String>,
}

/// How many devices each simulated vendor backend should expose. A
/// real deployment would replace the simulated detectors with ones
/// that ask NVML/ROCm-SMI/Level-Zero how many devices exist, but the
/// agent still needs a value to hand the constructors of this
/// repository's vendor backends.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedDeviceCounts {
    pub nvidia: u32,
    pub amd: u32,
    pub intel: u32,
}
