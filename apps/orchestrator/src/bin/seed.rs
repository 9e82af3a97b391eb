// [apps/orchestrator/src/bin/seed.rs]
//! Development fixture loader: seeds a handful of realistic
//! providers, gpu resources, and allocations against a target store so
//! the HTTP surface has something to return without standing up a real
//! provider agent first. Not run in production; every row is created
//! with `ON CONFLICT DO NOTHING`-equivalent idempotency at the
//! repository layer, so re-running is harmless.

use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use nebula_domain_models::{
    Allocation, AuthMaterial, ComputeApi, DriverInfo, GpuCapabilities, GpuLiveMetrics, GpuResource,
    GpuRuntimeState, GpuSpecs, JobRequirements, PrecisionType, Provider, RollingUtilizationStats,
    Vendor, VerificationState,
};
use nebula_infra_db::repositories::{AllocationRepository, GpuRepository, ProviderRepository};
use nebula_infra_db::TursoClient;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "seed", about = "Loads development fixtures into the store")]
struct Args {
    #[arg(long, env = "NEBULA__DATABASE__URL", default_value = ":memory:")]
    database_url: String,

    #[arg(long, env = "NEBULA__DATABASE__AUTH_TOKEN")]
    auth_token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    nebula_shared_observability::init_tracing("seed");
    let args = Args::parse();

    let client = Arc::new(TursoClient::connect(&args.database_url, args.auth_token).await?);
    let connection = client.get_connection()?;

    let provider = Provider::new_pending(
        "Example Compute Cooperative".to_string(),
        "ops@example-compute.test".to_string(),
        "Example Compute Cooperative".to_string(),
        AuthMaterial { salted_key_digest: String::new(), public_key: "dev-fixture-key".to_string() },
        Vec::new(),
    );
    ProviderRepository::new(&connection).create(&provider).await?;
    info!(provider_id = %provider.id, "seeded provider");

    let gpu = GpuResource {
        id: Uuid::new_v4(),
        provider_id: provider.id,
        vendor: Vendor::Nvidia,
        vendor_uuid: GpuResource::synthesize_uuid("0000:01:00.0", 0),
        vendor_index: 0,
        specs: GpuSpecs {
            total_memory_mb: 81_920,
            memory_bandwidth_gbps: 3_350.0,
            compute_unit_count: 16_896,
            tensor_unit_count: 528,
            base_clock_mhz: 1_095,
            boost_clock_mhz: 1_755,
            memory_clock_mhz: 2_619,
            architecture: "Hopper".to_string(),
            compute_capability: "sm_90".to_string(),
            power_envelope_watts: 700,
            bus_info: "0000:01:00.0".to_string(),
        },
        runtime_state: GpuRuntimeState::Idle,
        live_metrics: GpuLiveMetrics::default(),
        capabilities: GpuCapabilities {
            supported_precisions: vec![PrecisionType::Fp64, PrecisionType::Fp32, PrecisionType::Bf16, PrecisionType::Int8],
            supports_tensor_ops: true,
            ecc_supported: true,
            ecc_enabled: true,
            unified_memory: true,
            partitioning_support: true,
            supported_apis: vec![ComputeApi::Cuda],
        },
        driver_info: DriverInfo { driver_version: "550.54.15".to_string(), runtime_version: "12.4".to_string() },
        verification_state: VerificationState::Unverified,
        binding: None,
        utilization_stats: RollingUtilizationStats::default(),
        updated_at: Utc::now(),
        version: 0,
    };
    GpuRepository::new(&connection).upsert(&gpu).await?;
    info!(gpu_id = %gpu.id, "seeded gpu resource");

    let allocation = Allocation::new_requested(Uuid::new_v4(), JobRequirements { min_memory_mb: 16_384, ..Default::default() });
    AllocationRepository::new(&connection).create(&allocation).await?;
    info!(allocation_id = %allocation.id, "seeded allocation");

    info!("fixture load complete");
    Ok(())
}
