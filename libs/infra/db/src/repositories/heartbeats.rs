// [libs/infra/db/src/repositories/heartbeats.rs]
/*!
 * =================================================================
 * APARATO: HEARTBEAT REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA APPEND-ONLY DE LATIDOS DE PROVIDER
 * =================================================================
 */

use libsql::{params, Connection, Row};
use nebula_domain_models::{Heartbeat, HealthState, ResourceSummary, SystemMetrics};
use uuid::Uuid;

use crate::errors::DbError;

pub struct HeartbeatRepository<'a> {
    connection: &'a Connection,
}

impl<'a> HeartbeatRepository<'a> {
    #[must_use]
    pub fn new(connection: &'a Connection) -> Self {
        Self { connection }
    }

    pub async fn record(&self, heartbeat: &Heartbeat) -> Result<(), DbError> {
        self.connection
            .execute(
                r#"INSERT INTO heartbeats
                    (id, provider_id, received_at, reported_health, resource_summary_json,
                     system_metrics_json, round_trip_ms, agent_version)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                params![
                    heartbeat.id.to_string(),
                    heartbeat.provider_id.to_string(),
                    heartbeat.received_at.to_rfc3339(),
                    serde_json::to_string(&heartbeat.reported_health).map_err(map_json_err)?,
                    serde_json::to_string(&heartbeat.resource_summary).map_err(map_json_err)?,
                    serde_json::to_string(&heartbeat.system_metrics).map_err(map_json_err)?,
                    heartbeat.round_trip_ms,
                    heartbeat.agent_version.clone(),
                ],
            )
            .await
            .map_err(DbError::QueryError)?;
        Ok(())
    }

    /// Ultimos `limit` latidos de un provider, mas recientes primero —
    /// usado por el Heartbeat Monitor para derivar continuidad.
    pub async fn recent_for_provider(&self, provider_id: Uuid, limit: u32) -> Result<Vec<Heartbeat>, DbError> {
        let mut rows = self
            .connection
            .query(
                r#"SELECT * FROM heartbeats
                   WHERE provider_id = ?1 ORDER BY received_at DESC LIMIT ?2"#,
                params![provider_id.to_string(), i64::from(limit)],
            )
            .await
            .map_err(DbError::QueryError)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(DbError::QueryError)? {
            out.push(row_to_heartbeat(&row)?);
        }
        Ok(out)
    }

    /// Purga latidos anteriores a `cutoff`, usado por el barredor de
    /// retencion del Inventory Store.
    pub async fn purge_older_than(&self, cutoff: chrono::DateTime<chrono::Utc>) -> Result<u64, DbError> {
        let affected = self
            .connection
            .execute(
                "DELETE FROM heartbeats WHERE received_at < ?1",
                params![cutoff.to_rfc3339()],
            )
            .await
            .map_err(DbError::QueryError)?;
        Ok(affected)
    }
}

fn map_json_err(e: serde_json::Error) -> DbError {
    DbError::MappingError(e.to_string())
}

fn row_to_heartbeat(row: &Row) -> Result<Heartbeat, DbError> {
    let id: String = row.get(0).map_err(DbError::QueryError)?;
    let provider_id: String = row.get(1).map_err(DbError::QueryError)?;
    let received_at: String = row.get(2).map_err(DbError::QueryError)?;
    let reported_health: String = row.get(3).map_err(DbError::QueryError)?;
    let resource_summary_json: String = row.get(4).map_err(DbError::QueryError)?;
    let system_metrics_json: String = row.get(5).map_err(DbError::QueryError)?;
    let round_trip_ms: i64 = row.get(6).map_err(DbError::QueryError)?;
    let agent_version: String = row.get(7).map_err(DbError::QueryError)?;

    Ok(Heartbeat {
        id: Uuid::parse_str(&id).map_err(|e| DbError::MappingError(e.to_string()))?,
        provider_id: Uuid::parse_str(&provider_id).map_err(|e| DbError::MappingError(e.to_string()))?,
        received_at: chrono::DateTime::parse_from_rfc3339(&received_at)
            .map_err(|e| DbError::MappingError(e.to_string()))?
            .with_timezone(&chrono::Utc),
        reported_health: serde_json::from_str::<HealthState>(&reported_health).map_err(map_json_err)?,
        resource_summary: serde_json::from_str::<ResourceSummary>(&resource_summary_json)
            .map_err(map_json_err)?,
        system_metrics: serde_json::from_str::<SystemMetrics>(&system_metrics_json).map_err(map_json_err)?,
        round_trip_ms: round_trip_ms as u32,
        agent_version,
    })
}
