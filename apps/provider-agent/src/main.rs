// [apps/provider-agent/src/main.rs]
//! Entry point for a single provider's agent process: parses its
//! directives, wires up graceful shutdown, and hands control to
//! `ProviderAgent::run`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use nebula_provider_agent::config::{AgentConfig, RegistrationProfile, SimulatedDeviceCounts};
use nebula_provider_agent::ProviderAgent;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Provider agent: detects local gpu inventory and reports it to an orchestrator")]
struct Directives {
    /// Base url of the orchestrator to register and report against.
    #[arg(long, env = "NEBULA_AGENT__ORCHESTRATOR_URL")]
    orchestrator_url: String,

    /// Path where this agent persists its provider identity between restarts.
    #[arg(long, env = "NEBULA_AGENT__CREDENTIALS_PATH", default_value = "agent_credentials.json")]
    credentials_path: PathBuf,

    #[arg(long, env = "NEBULA_AGENT__HEARTBEAT_INTERVAL_SECONDS", default_value_t = 15)]
    heartbeat_interval_seconds: u64,

    #[arg(long, env = "NEBULA_AGENT__VERIFICATION_INTERVAL_SECONDS", default_value_t = 3600)]
    verification_interval_seconds: u64,

    #[arg(long, env = "NEBULA_AGENT__SIMULATED_NVIDIA_COUNT", default_value_t = 1)]
    simulated_nvidia_count: u32,

    #[arg(long, env = "NEBULA_AGENT__SIMULATED_AMD_COUNT", default_value_t = 0)]
    simulated_amd_count: u32,

    #[arg(long, env = "NEBULA_AGENT__SIMULATED_INTEL_COUNT", default_value_t = 0)]
    simulated_intel_count: u32,

    /// Only consulted on first boot, before `credentials_path` exists.
    #[arg(long, env = "NEBULA_AGENT__PROVIDER_NAME", default_value = "unnamed-provider")]
    provider_name: String,

    #[arg(long, env = "NEBULA_AGENT__CONTACT_EMAIL", default_value = "operator@example.com")]
    contact_email: String,

    #[arg(long, env = "NEBULA_AGENT__ORGANIZATION", default_value = "independent")]
    organization: String,

    #[arg(long, env = "NEBULA_AGENT__PUBLIC_KEY")]
    public_key: Option<String>,

    #[arg(long, env = "NEBULA_AGENT__REGION")]
    region: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    nebula_shared_observability::init_tracing("provider-agent");

    let directives = Directives::parse();
    let config = AgentConfig {
        orchestrator_url: directives.orchestrator_url,
        credentials_path: directives.credentials_path,
        heartbeat_interval: Duration::from_secs(directives.heartbeat_interval_seconds.max(1)),
        verification_interval: Duration::from_secs(directives.verification_interval_seconds.max(1)),
        simulated_device_counts: SimulatedDeviceCounts {
            nvidia: directives.simulated_nvidia_count,
            amd: directives.simulated_amd_count,
            intel: directives.simulated_intel_count,
        },
        agent_version: env!("CARGO_PKG_VERSION").to_string(),
        registration: RegistrationProfile {
            provider_name: directives.provider_name,
            contact_email: directives.contact_email,
            organization: directives.organization,
            public_key: directives
                .public_key
                .unwrap_or_else(|| format!("placeholder-{}", uuid::Uuid::new_v4())),
            region: directives.region,
        },
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handle = shutdown.clone();
    ctrlc::set_handler(move || {
        warn!("shutdown signal received, draining current cycle");
        shutdown_handle.store(true, Ordering::SeqCst);
    })?;

    info!(orchestrator_url = %config.orchestrator_url, "bootstrapping provider agent");
    let agent = ProviderAgent::bootstrap(config).await?;
    agent.run(shutdown).await?;

    info!("provider agent stopped");
    Ok(())
}
