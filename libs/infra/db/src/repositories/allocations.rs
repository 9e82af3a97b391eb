// [libs/infra/db/src/repositories/allocations.rs]
/*!
 * =================================================================
 * APARATO: ALLOCATION REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA DEL CICLO DE VIDA DE ASIGNACIONES
 * =================================================================
 */

use libsql::{params, Connection, Row};
use nebula_domain_models::{Allocation, AllocationStatus, JobRequirements, PriorityClass};
use uuid::Uuid;

use crate::errors::DbError;

const ENTITY: &str = "allocation";

pub struct AllocationRepository<'a> {
    connection: &'a Connection,
}

impl<'a> AllocationRepository<'a> {
    #[must_use]
    pub fn new(connection: &'a Connection) -> Self {
        Self { connection }
    }

    pub async fn create(&self, allocation: &Allocation) -> Result<(), DbError> {
        self.connection
            .execute(
                r#"INSERT INTO allocations
                    (id, consumer_id, provider_id, gpu_id, requirements_json, status, priority,
                     grace_period_seconds, preemption_allowed, requested_at, allocated_at,
                     started_at, expected_end_at, actual_end_at, configuration_json, version)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"#,
                params![
                    allocation.id.to_string(),
                    allocation.consumer_id.to_string(),
                    allocation.provider_id.map(|p| p.to_string()),
                    allocation.gpu_id.map(|g| g.to_string()),
                    serde_json::to_string(&allocation.requirements).map_err(map_json_err)?,
                    serde_json::to_string(&allocation.status).map_err(map_json_err)?,
                    serde_json::to_string(&allocation.priority).map_err(map_json_err)?,
                    allocation.grace_period_seconds as i64,
                    allocation.preemption_allowed,
                    allocation.requested_at.to_rfc3339(),
                    allocation.allocated_at.map(|t| t.to_rfc3339()),
                    allocation.started_at.map(|t| t.to_rfc3339()),
                    allocation.expected_end_at.map(|t| t.to_rfc3339()),
                    allocation.actual_end_at.map(|t| t.to_rfc3339()),
                    allocation.configuration.to_string(),
                    allocation.version,
                ],
            )
            .await
            .map_err(DbError::QueryError)?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Allocation, DbError> {
        let mut rows = self
            .connection
            .query("SELECT * FROM allocations WHERE id = ?1", params![id.to_string()])
            .await
            .map_err(DbError::QueryError)?;

        match rows.next().await.map_err(DbError::QueryError)? {
            Some(row) => row_to_allocation(&row),
            None => Err(DbError::NotFound {
                entity: ENTITY,
                id: id.to_string(),
            }),
        }
    }

    /// Persiste una transicion de estado ya validada por el dominio
    /// (`Allocation::try_transition`), bajo control de concurrencia
    /// optimista contra la columna `version`.
    pub async fn update_with_version(&self, allocation: &Allocation) -> Result<(), DbError> {
        let affected = self
            .connection
            .execute(
                r#"UPDATE allocations SET
                    provider_id = ?2, gpu_id = ?3, status = ?4, allocated_at = ?5,
                    started_at = ?6, expected_end_at = ?7, actual_end_at = ?8,
                    configuration_json = ?9, version = version + 1
                   WHERE id = ?1 AND version = ?10"#,
                params![
                    allocation.id.to_string(),
                    allocation.provider_id.map(|p| p.to_string()),
                    allocation.gpu_id.map(|g| g.to_string()),
                    serde_json::to_string(&allocation.status).map_err(map_json_err)?,
                    allocation.allocated_at.map(|t| t.to_rfc3339()),
                    allocation.started_at.map(|t| t.to_rfc3339()),
                    allocation.expected_end_at.map(|t| t.to_rfc3339()),
                    allocation.actual_end_at.map(|t| t.to_rfc3339()),
                    allocation.configuration.to_string(),
                    allocation.version,
                ],
            )
            .await
            .map_err(DbError::QueryError)?;

        if affected == 0 {
            return Err(DbError::VersionConflict {
                entity: ENTITY,
                id: allocation.id.to_string(),
            });
        }
        Ok(())
    }

    pub async fn list_by_status(&self, status: AllocationStatus) -> Result<Vec<Allocation>, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT * FROM allocations WHERE status = ?1 ORDER BY requested_at ASC",
                params![serde_json::to_string(&status).map_err(map_json_err)?],
            )
            .await
            .map_err(DbError::QueryError)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(DbError::QueryError)? {
            out.push(row_to_allocation(&row)?);
        }
        Ok(out)
    }

    pub async fn list_by_consumer(&self, consumer_id: Uuid) -> Result<Vec<Allocation>, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT * FROM allocations WHERE consumer_id = ?1 ORDER BY requested_at DESC",
                params![consumer_id.to_string()],
            )
            .await
            .map_err(DbError::QueryError)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(DbError::QueryError)? {
            out.push(row_to_allocation(&row)?);
        }
        Ok(out)
    }
}

fn map_json_err(e: serde_json::Error) -> DbError {
    DbError::MappingError(e.to_string())
}

fn parse_optional_datetime(s: Option<String>) -> Result<Option<chrono::DateTime<chrono::Utc>>, DbError> {
    s.map(|s| {
        chrono::DateTime::parse_from_rfc3339(&s)
            .map(|d| d.with_timezone(&chrono::Utc))
            .map_err(|e| DbError::MappingError(e.to_string()))
    })
    .transpose()
}

fn row_to_allocation(row: &Row) -> Result<Allocation, DbError> {
    let id: String = row.get(0).map_err(DbError::QueryError)?;
    let consumer_id: String = row.get(1).map_err(DbError::QueryError)?;
    let provider_id: Option<String> = row.get(2).map_err(DbError::QueryError)?;
    let gpu_id: Option<String> = row.get(3).map_err(DbError::QueryError)?;
    let requirements_json: String = row.get(4).map_err(DbError::QueryError)?;
    let status: String = row.get(5).map_err(DbError::QueryError)?;
    let priority: String = row.get(6).map_err(DbError::QueryError)?;
    let grace_period_seconds: i64 = row.get(7).map_err(DbError::QueryError)?;
    let preemption_allowed: bool = row.get(8).map_err(DbError::QueryError)?;
    let requested_at: String = row.get(9).map_err(DbError::QueryError)?;
    let allocated_at: Option<String> = row.get(10).map_err(DbError::QueryError)?;
    let started_at: Option<String> = row.get(11).map_err(DbError::QueryError)?;
    let expected_end_at: Option<String> = row.get(12).map_err(DbError::QueryError)?;
    let actual_end_at: Option<String> = row.get(13).map_err(DbError::QueryError)?;
    let configuration_json: String = row.get(14).map_err(DbError::QueryError)?;
    let version: i64 = row.get(15).map_err(DbError::QueryError)?;

    Ok(Allocation {
        id: Uuid::parse_str(&id).map_err(|e| DbError::MappingError(e.to_string()))?,
        consumer_id: Uuid::parse_str(&consumer_id).map_err(|e| DbError::MappingError(e.to_string()))?,
        provider_id: provider_id
            .map(|p| Uuid::parse_str(&p))
            .transpose()
            .map_err(|e| DbError::MappingError(e.to_string()))?,
        gpu_id: gpu_id
            .map(|g| Uuid::parse_str(&g))
            .transpose()
            .map_err(|e| DbError::MappingError(e.to_string()))?,
        requirements: serde_json::from_str::<JobRequirements>(&requirements_json).map_err(map_json_err)?,
        status: serde_json::from_str::<AllocationStatus>(&status).map_err(map_json_err)?,
        priority: serde_json::from_str::<PriorityClass>(&priority).map_err(map_json_err)?,
        grace_period_seconds: grace_period_seconds as u64,
        preemption_allowed,
        requested_at: chrono::DateTime::parse_from_rfc3339(&requested_at)
            .map_err(|e| DbError::MappingError(e.to_string()))?
            .with_timezone(&chrono::Utc),
        allocated_at: parse_optional_datetime(allocated_at)?,
        started_at: parse_optional_datetime(started_at)?,
        expected_end_at: parse_optional_datetime(expected_end_at)?,
        actual_end_at: parse_optional_datetime(actual_end_at)?,
        configuration: serde_json::from_str(&configuration_json).map_err(map_json_err)?,
        version,
    })
}
