// [libs/infra/db/src/schema.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN DATABASE SCHEMA (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * Las tablas base se solidifican de forma idempotente en cada arranque
 * (`CREATE TABLE IF NOT EXISTS`); la evolucion fina del esquema por
 * version se delega al ledger de `migrations` (ver migrations.rs).
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument};

const TACTICAL_TABLES: &[(&str, &str)] = &[
    ("TABLE_PROVIDERS", r#"
        CREATE TABLE IF NOT EXISTS providers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            contact_email TEXT NOT NULL,
            organization TEXT NOT NULL,
            registration_state TEXT NOT NULL DEFAULT 'pending',
            health_state TEXT NOT NULL DEFAULT 'unknown',
            auth_json TEXT NOT NULL,
            endpoints_json TEXT NOT NULL DEFAULT '[]',
            tags_json TEXT NOT NULL DEFAULT '[]',
            region TEXT,
            reliability_json TEXT NOT NULL DEFAULT '{}',
            resource_summary_json TEXT NOT NULL DEFAULT '{}',
            last_heartbeat_at DATETIME,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            version INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("TABLE_GPU_RESOURCES", r#"
        CREATE TABLE IF NOT EXISTS gpu_resources (
            id TEXT PRIMARY KEY,
            provider_id TEXT NOT NULL REFERENCES providers(id),
            vendor TEXT NOT NULL,
            vendor_uuid TEXT NOT NULL,
            vendor_index INTEGER NOT NULL,
            specs_json TEXT NOT NULL,
            runtime_state TEXT NOT NULL DEFAULT 'unknown',
            live_metrics_json TEXT NOT NULL DEFAULT '{}',
            capabilities_json TEXT NOT NULL DEFAULT '{}',
            driver_info_json TEXT NOT NULL DEFAULT '{}',
            verification_state_json TEXT NOT NULL DEFAULT '{"state":"unverified"}',
            binding_json TEXT,
            utilization_stats_json TEXT NOT NULL DEFAULT '{}',
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            version INTEGER NOT NULL DEFAULT 0,
            UNIQUE(provider_id, vendor_uuid)
        );
    "#),
    ("TABLE_ALLOCATIONS", r#"
        CREATE TABLE IF NOT EXISTS allocations (
            id TEXT PRIMARY KEY,
            consumer_id TEXT NOT NULL,
            provider_id TEXT REFERENCES providers(id),
            gpu_id TEXT REFERENCES gpu_resources(id),
            requirements_json TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'requested',
            priority TEXT NOT NULL DEFAULT 'normal',
            grace_period_seconds INTEGER NOT NULL DEFAULT 30,
            preemption_allowed INTEGER NOT NULL DEFAULT 0,
            requested_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            allocated_at DATETIME,
            started_at DATETIME,
            expected_end_at DATETIME,
            actual_end_at DATETIME,
            configuration_json TEXT NOT NULL DEFAULT 'null',
            version INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("TABLE_VERIFICATION_RESULTS", r#"
        CREATE TABLE IF NOT EXISTS verification_results (
            id TEXT PRIMARY KEY,
            gpu_id TEXT NOT NULL REFERENCES gpu_resources(id),
            provider_id TEXT NOT NULL REFERENCES providers(id),
            measurements_json TEXT NOT NULL,
            assessment_json TEXT NOT NULL,
            started_at DATETIME NOT NULL,
            completed_at DATETIME NOT NULL,
            valid_until DATETIME NOT NULL,
            suite_version TEXT NOT NULL
        );
    "#),
    ("TABLE_HEARTBEATS", r#"
        CREATE TABLE IF NOT EXISTS heartbeats (
            id TEXT PRIMARY KEY,
            provider_id TEXT NOT NULL REFERENCES providers(id),
            received_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            reported_health TEXT NOT NULL,
            resource_summary_json TEXT NOT NULL,
            system_metrics_json TEXT NOT NULL,
            round_trip_ms INTEGER NOT NULL,
            agent_version TEXT NOT NULL
        );
    "#),
    ("TABLE_USAGE_METRICS", r#"
        CREATE TABLE IF NOT EXISTS usage_metrics (
            id TEXT PRIMARY KEY,
            gpu_id TEXT NOT NULL REFERENCES gpu_resources(id),
            provider_id TEXT NOT NULL REFERENCES providers(id),
            sampled_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            utilization_percent REAL NOT NULL,
            temperature_celsius REAL NOT NULL,
            power_watts REAL NOT NULL,
            bucket_width_seconds INTEGER NOT NULL DEFAULT 60
        );
    "#),
    ("TABLE_INCIDENTS", r#"
        CREATE TABLE IF NOT EXISTS incidents (
            id TEXT PRIMARY KEY,
            provider_id TEXT NOT NULL REFERENCES providers(id),
            gpu_id TEXT,
            kind TEXT NOT NULL,
            severity TEXT NOT NULL DEFAULT 'warning',
            message TEXT NOT NULL,
            opened_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            resolved_at DATETIME,
            metadata_json TEXT NOT NULL DEFAULT '{}'
        );
    "#),
];

const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_GPU_PROVIDER", "CREATE INDEX IF NOT EXISTS idx_gpu_resources_provider ON gpu_resources(provider_id);"),
    ("IDX_GPU_RUNTIME_STATE", "CREATE INDEX IF NOT EXISTS idx_gpu_resources_runtime_state ON gpu_resources(runtime_state);"),
    ("IDX_ALLOCATIONS_CONSUMER", "CREATE INDEX IF NOT EXISTS idx_allocations_consumer ON allocations(consumer_id);"),
    ("IDX_ALLOCATIONS_STATUS", "CREATE INDEX IF NOT EXISTS idx_allocations_status ON allocations(status);"),
    ("IDX_VERIFICATIONS_GPU", "CREATE INDEX IF NOT EXISTS idx_verification_results_gpu ON verification_results(gpu_id);"),
    ("IDX_HEARTBEATS_PROVIDER_TIME", "CREATE INDEX IF NOT EXISTS idx_heartbeats_provider_time ON heartbeats(provider_id, received_at);"),
    ("IDX_USAGE_METRICS_GPU_TIME", "CREATE INDEX IF NOT EXISTS idx_usage_metrics_gpu_time ON usage_metrics(gpu_id, sampled_at);"),
    ("IDX_INCIDENTS_PROVIDER", "CREATE INDEX IF NOT EXISTS idx_incidents_provider ON incidents(provider_id);"),
];

/// Ejecuta la secuencia maestra de sincronizacion del esquema base.
///
/// # Errors:
/// Retorna error si alguna tabla base falla en solidificarse, indicando
/// un colapso en el enlace con el motor libSQL.
#[instrument(skip(database_connection))]
pub async fn apply_base_schema(database_connection: &Connection) -> Result<()> {
    info!("[SCHEMA_ENGINE]: Initiating structural synchronization...");
    solidify_base_strata(database_connection).await?;
    harden_access_layer(database_connection).await?;
    info!("[SCHEMA_ENGINE]: Base ledger level and certified.");
    Ok(())
}

async fn solidify_base_strata(db: &Connection) -> Result<()> {
    for (identifier, sql) in TACTICAL_TABLES {
        debug!("  solidifying: {}", identifier);
        db.execute(sql, ())
            .await
            .with_context(|| format!("CRITICAL_SOLIDIFICATION_FAULT: {}", identifier))?;
    }
    Ok(())
}

async fn harden_access_layer(db: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!("  hardening: {}", identifier);
        db.execute(sql, ())
            .await
            .with_context(|| format!("CRITICAL_HARDENING_FAULT: {}", identifier))?;
    }
    Ok(())
}
