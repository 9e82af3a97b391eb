// [libs/infra/db/src/retention.rs]
/*!
 * =================================================================
 * APARATO: RETENTION SWEEPER (ESTRATO L3)
 * RESPONSABILIDAD: PURGA PERIODICA DE TABLAS DE SERIE TEMPORAL
 * =================================================================
 */

use chrono::{Duration, Utc};
use libsql::Connection;
use tracing::{info, instrument};

use crate::errors::DbError;
use crate::repositories::{HeartbeatRepository, UsageMetricRepository};

/// Ventanas de retencion por tabla de serie temporal.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub heartbeat_retention: Duration,
    pub usage_metric_retention: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            heartbeat_retention: Duration::days(7),
            usage_metric_retention: Duration::days(2),
        }
    }
}

/// Ejecuta una pasada de purga contra las tablas de serie temporal,
/// retornando el numero de filas eliminadas por tabla.
#[instrument(skip(connection, policy))]
pub async fn sweep_once(connection: &Connection, policy: RetentionPolicy) -> Result<(u64, u64), DbError> {
    let now = Utc::now();

    let heartbeats_purged = HeartbeatRepository::new(connection)
        .purge_older_than(now - policy.heartbeat_retention)
        .await?;
    let usage_metrics_purged = UsageMetricRepository::new(connection)
        .purge_older_than(now - policy.usage_metric_retention)
        .await?;

    info!(
        heartbeats_purged,
        usage_metrics_purged, "retention sweep completed"
    );

    Ok((heartbeats_purged, usage_metrics_purged))
}
