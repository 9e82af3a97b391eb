// [libs/infra/db/src/repositories/verifications.rs]
/*!
 * =================================================================
 * APARATO: VERIFICATION RESULT REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA APPEND-ONLY DE RESULTADOS DE BENCHMARK
 * =================================================================
 */

use libsql::{params, Connection, Row};
use nebula_domain_models::{BenchmarkMeasurement, CapabilityAssessment, VerificationResult};
use uuid::Uuid;

use crate::errors::DbError;

pub struct VerificationRepository<'a> {
    connection: &'a Connection,
}

impl<'a> VerificationRepository<'a> {
    #[must_use]
    pub fn new(connection: &'a Connection) -> Self {
        Self { connection }
    }

    pub async fn record(&self, result: &VerificationResult) -> Result<(), DbError> {
        self.connection
            .execute(
                r#"INSERT INTO verification_results
                    (id, gpu_id, provider_id, measurements_json, assessment_json,
                     started_at, completed_at, valid_until, suite_version)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
                params![
                    result.id.to_string(),
                    result.gpu_id.to_string(),
                    result.provider_id.to_string(),
                    serde_json::to_string(&result.measurements).map_err(map_json_err)?,
                    serde_json::to_string(&result.assessment).map_err(map_json_err)?,
                    result.started_at.to_rfc3339(),
                    result.completed_at.to_rfc3339(),
                    result.valid_until.to_rfc3339(),
                    result.suite_version.clone(),
                ],
            )
            .await
            .map_err(DbError::QueryError)?;
        Ok(())
    }

    /// Resultado vigente mas reciente para un recurso, usado por el
    /// Resource Matcher para evaluar `VerificationState::is_consumable_at`.
    pub async fn latest_for_gpu(&self, gpu_id: Uuid) -> Result<Option<VerificationResult>, DbError> {
        let mut rows = self
            .connection
            .query(
                r#"SELECT * FROM verification_results
                   WHERE gpu_id = ?1 ORDER BY completed_at DESC LIMIT 1"#,
                params![gpu_id.to_string()],
            )
            .await
            .map_err(DbError::QueryError)?;

        match rows.next().await.map_err(DbError::QueryError)? {
            Some(row) => Ok(Some(row_to_result(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn history_for_gpu(&self, gpu_id: Uuid, limit: u32) -> Result<Vec<VerificationResult>, DbError> {
        let mut rows = self
            .connection
            .query(
                r#"SELECT * FROM verification_results
                   WHERE gpu_id = ?1 ORDER BY completed_at DESC LIMIT ?2"#,
                params![gpu_id.to_string(), i64::from(limit)],
            )
            .await
            .map_err(DbError::QueryError)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(DbError::QueryError)? {
            out.push(row_to_result(&row)?);
        }
        Ok(out)
    }
}

fn map_json_err(e: serde_json::Error) -> DbError {
    DbError::MappingError(e.to_string())
}

fn row_to_result(row: &Row) -> Result<VerificationResult, DbError> {
    let id: String = row.get(0).map_err(DbError::QueryError)?;
    let gpu_id: String = row.get(1).map_err(DbError::QueryError)?;
    let provider_id: String = row.get(2).map_err(DbError::QueryError)?;
    let measurements_json: String = row.get(3).map_err(DbError::QueryError)?;
    let assessment_json: String = row.get(4).map_err(DbError::QueryError)?;
    let started_at: String = row.get(5).map_err(DbError::QueryError)?;
    let completed_at: String = row.get(6).map_err(DbError::QueryError)?;
    let valid_until: String = row.get(7).map_err(DbError::QueryError)?;
    let suite_version: String = row.get(8).map_err(DbError::QueryError)?;

    let parse_dt = |s: &str| -> Result<chrono::DateTime<chrono::Utc>, DbError> {
        chrono::DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&chrono::Utc))
            .map_err(|e| DbError::MappingError(e.to_string()))
    };

    Ok(VerificationResult {
        id: Uuid::parse_str(&id).map_err(|e| DbError::MappingError(e.to_string()))?,
        gpu_id: Uuid::parse_str(&gpu_id).map_err(|e| DbError::MappingError(e.to_string()))?,
        provider_id: Uuid::parse_str(&provider_id).map_err(|e| DbError::MappingError(e.to_string()))?,
        measurements: serde_json::from_str::<Vec<BenchmarkMeasurement>>(&measurements_json)
            .map_err(map_json_err)?,
        assessment: serde_json::from_str::<CapabilityAssessment>(&assessment_json).map_err(map_json_err)?,
        started_at: parse_dt(&started_at)?,
        completed_at: parse_dt(&completed_at)?,
        valid_until: parse_dt(&valid_until)?,
        suite_version,
    })
}
