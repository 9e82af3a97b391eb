// [apps/provider-agent/src/agent.rs]
//! Owns the lifecycle of a single provider's connection to an
//! orchestrator: registration (once), authentication, inventory
//! synchronization, and the recurring heartbeat/verification loop.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use nebula_domain_models::{
    GpuResource, GpuRuntimeState, HealthState, ProviderEndpoint, ResourceSummary, SystemMetrics,
    Vendor,
};
use nebula_infra_detectors::{AmdDetector, DetectorRegistry, IntelDetector, NvidiaDetector, VendorDetector};
use nebula_infra_provider_client::{
    AuthenticateRequest, HeartbeatRequest, ProviderClient, RegistrationRequest,
    SubmitVerificationRequest, SyncResourcesRequest,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::credentials::StoredCredentials;

/// Identity synthesized by the vendor detectors is random on every
/// enumeration; only `vendor_uuid` is stable across restarts. This
/// namespace re-derives a stable resource id from it so the
/// orchestrator sees the same gpu id for the same physical device
/// every time this agent runs, instead of a new row each boot.
fn stable_resource_id(vendor_uuid: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, vendor_uuid.as_bytes())
}

/// Drives one provider's worth of detection, sync and heartbeat work.
pub struct ProviderAgent {
    config: AgentConfig,
    client: ProviderClient,
    nvidia: NvidiaDetector,
    amd: AmdDetector,
    intel: IntelDetector,
    registry: DetectorRegistry,
}

impl ProviderAgent {
    /// Resolves or creates this agent's provider identity, authenticates
    /// against the orchestrator, and brings up whichever vendor backends
    /// report hardware present on this host.
    pub async fn bootstrap(config: AgentConfig) -> Result<Self> {
        let credentials = Self::register_or_reuse(&config).await?;

        let handshake_client = ProviderClient::unauthenticated(config.orchestrator_url.clone());
        let session = handshake_client
            .authenticate(&AuthenticateRequest {
                provider_id: credentials.provider_id,
                api_key: credentials.api_key.clone(),
            })
            .await
            .context("authenticating with orchestrator")?;
        let client = ProviderClient::authenticated(config.orchestrator_url.clone(), &session.token);
        info!(provider_id = %credentials.provider_id, expires_at = %session.expires_at, "authenticated");

        let nvidia = NvidiaDetector::new(credentials.provider_id, config.simulated_device_counts.nvidia);
        let amd = AmdDetector::new(credentials.provider_id, config.simulated_device_counts.amd);
        let intel = IntelDetector::new(credentials.provider_id, config.simulated_device_counts.intel);
        let registry = DetectorRegistry::new(vec![
            Box::new(nvidia.clone()),
            Box::new(amd.clone()),
            Box::new(intel.clone()),
        ]);
        let initialized = registry.initialize_available().await;
        info!(vendors = ?initialized, "vendor backends initialized");

        Ok(Self {
            config,
            client,
            nvidia,
            amd,
            intel,
            registry,
        })
    }

    async fn register_or_reuse(config: &AgentConfig) -> Result<StoredCredentials> {
        if let Some(credentials) = StoredCredentials::load(&config.credentials_path)? {
            info!(provider_id = %credentials.provider_id, "reusing persisted provider identity");
            return Ok(credentials);
        }

        info!("no persisted identity found, registering a new provider");
        let client = ProviderClient::unauthenticated(config.orchestrator_url.clone());
        let response = client
            .register(&RegistrationRequest {
                name: config.registration.provider_name.clone(),
                contact_email: config.registration.contact_email.clone(),
                organization: config.registration.organization.clone(),
                public_key: config.registration.public_key.clone(),
                endpoints: Vec::<ProviderEndpoint>::new(),
                tags: Vec::new(),
                region: config.registration.region.clone(),
                terms_accepted: true,
            })
            .await
            .context("registering with orchestrator")?;

        let credentials = StoredCredentials {
            provider_id: response.provider_id,
            api_key: response.api_key,
        };
        credentials.save(&config.credentials_path)?;
        info!(provider_id = %credentials.provider_id, status = %response.status, "registered");
        Ok(credentials)
    }

    fn detector_for(&self, vendor: Vendor) -> &dyn VendorDetector {
        match vendor {
            Vendor::Nvidia => &self.nvidia as &dyn VendorDetector,
            Vendor::Amd => &self.amd as &dyn VendorDetector,
            Vendor::Intel => &self.intel as &dyn VendorDetector,
        }
    }

    /// Replaces the agent's known-device map with a fresh full
    /// enumeration and pushes it to the orchestrator. Called once at
    /// startup and again whenever the local device set is suspected to
    /// have changed, since heartbeats only ever report state for
    /// already-known devices.
    async fn sync_inventory(&self, known: &mut HashMap<Uuid, GpuResource>) -> Result<()> {
        let discovered = self.registry.enumerate_all().await;
        known.clear();
        for mut resource in discovered {
            resource.id = stable_resource_id(&resource.vendor_uuid);
            known.insert(resource.id, resource);
        }

        if known.is_empty() {
            warn!("no gpu devices discovered on this host");
            return Ok(());
        }

        let response = self
            .client
            .sync_resources(&SyncResourcesRequest {
                resources: known.values().cloned().collect(),
            })
            .await
            .context("syncing resource inventory")?;
        info!(synced = response.synced, "resource inventory synced");
        Ok(())
    }

    async fn refresh_known_devices(&self, known: &mut HashMap<Uuid, GpuResource>) {
        for resource in known.values_mut() {
            let detector = self.detector_for(resource.vendor);
            match detector.refresh_device(&resource.vendor_uuid).await {
                Ok(mut refreshed) => {
                    refreshed.id = resource.id;
                    *resource = refreshed;
                }
                Err(e) => {
                    warn!(gpu_id = %resource.id, error = %e, "device refresh failed, keeping last known state");
                    resource.runtime_state = GpuRuntimeState::Unknown;
                }
            }
        }
    }

    fn summarize(known: &HashMap<Uuid, GpuResource>) -> ResourceSummary {
        let mut summary = ResourceSummary::default();
        for resource in known.values() {
            summary.total_gpus += 1;
            summary.total_memory_mb += resource.specs.total_memory_mb;
            match resource.runtime_state {
                GpuRuntimeState::Idle => summary.idle_gpus += 1,
                GpuRuntimeState::Busy => summary.busy_gpus += 1,
                GpuRuntimeState::Offline | GpuRuntimeState::Error | GpuRuntimeState::Unknown => {
                    summary.offline_gpus += 1;
                }
            }
        }
        summary
    }

    /// Submits a verification benchmark for every known device this
    /// process has not already submitted one for. Re-verification after
    /// expiry is operator-initiated (see the orchestrator's verification
    /// request endpoint), so one submission per process lifetime per
    /// device is enough here.
    async fn run_verification_sweep(&self, known: &HashMap<Uuid, GpuResource>, attempted: &mut HashSet<Uuid>) {
        for resource in known.values() {
            if attempted.contains(&resource.id) {
                continue;
            }
            attempted.insert(resource.id);

            let detector = self.detector_for(resource.vendor);
            let measurements = match detector.run_benchmark(&resource.vendor_uuid).await {
                Ok(measurements) => measurements,
                Err(e) => {
                    warn!(gpu_id = %resource.id, error = %e, "benchmark run failed");
                    continue;
                }
            };

            match self
                .client
                .submit_verification_result(&SubmitVerificationRequest {
                    resource_id: resource.id,
                    measurements,
                })
                .await
            {
                Ok(result) => info!(gpu_id = %resource.id, tier = ?result.assessment.tier, "verification submitted"),
                Err(e) => warn!(gpu_id = %resource.id, error = %e, "verification submission failed"),
            }
        }
    }

    /// Runs the heartbeat loop until `shutdown` is set, then releases
    /// vendor backend resources and returns.
    pub async fn run(self, shutdown: Arc<AtomicBool>) -> Result<()> {
        let mut known: HashMap<Uuid, GpuResource> = HashMap::new();
        self.sync_inventory(&mut known).await?;

        let mut verified_attempted: HashSet<Uuid> = HashSet::new();
        let mut last_verification_sweep = Instant::now();
        let mut next_interval = self.config.heartbeat_interval;

        while !shutdown.load(Ordering::SeqCst) {
            tokio::time::sleep(next_interval).await;
            if shutdown.load(Ordering::SeqCst) {
                break;
            }

            self.refresh_known_devices(&mut known).await;

            let resource_states = known.iter().map(|(id, r)| (*id, r.runtime_state)).collect();
            let heartbeat_request = HeartbeatRequest {
                reported_health: HealthState::Healthy,
                resource_summary: Self::summarize(&known),
                system_metrics: SystemMetrics {
                    uptime_seconds: last_verification_sweep.elapsed().as_secs(),
                    ..SystemMetrics::default()
                },
                round_trip_ms: 0,
                agent_version: self.config.agent_version.clone(),
                resource_states,
            };

            let started = Instant::now();
            match self.client.send_heartbeat(&heartbeat_request).await {
                Ok(response) => {
                    let round_trip = started.elapsed();
                    for warning in &response.warnings {
                        warn!(%warning, "orchestrator flagged a heartbeat warning");
                    }
                    next_interval = Duration::from_secs(response.next_interval_seconds.max(1));
                    info!(round_trip_ms = round_trip.as_millis() as u64, gpus = known.len(), "heartbeat accepted");
                }
                Err(e) => {
                    warn!(error = %e, "heartbeat failed, retrying at configured interval");
                    next_interval = self.config.heartbeat_interval;
                }
            }

            if last_verification_sweep.elapsed() >= self.config.verification_interval {
                self.run_verification_sweep(&known, &mut verified_attempted).await;
                last_verification_sweep = Instant::now();
            }
        }

        info!(at = %Utc::now(), "shutdown requested, releasing vendor backends");
        self.registry.cleanup_all().await;
        Ok(())
    }
}
