// [libs/infra/db/src/repositories/usage_metrics.rs]
/*!
 * =================================================================
 * APARATO: USAGE METRIC REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: SERIE TEMPORAL DE UTILIZACION Y REDUCCION (ROLLUP)
 *
 * Complementa heartbeats.rs: mientras el latido es un pulso de vida
 * del provider, la metrica de uso es una muestra de utilizacion por
 * GPU, tomada con mayor frecuencia y sujeta a reduccion (downsampling)
 * cuando su antiguedad supera la ventana de resolucion completa.
 * =================================================================
 */

use libsql::{params, Connection, Row};
use uuid::Uuid;

use crate::errors::DbError;

/// Una muestra cruda de utilizacion de un recurso en un instante dado.
#[derive(Debug, Clone)]
pub struct UsageSample {
    pub id: Uuid,
    pub gpu_id: Uuid,
    pub provider_id: Uuid,
    pub sampled_at: chrono::DateTime<chrono::Utc>,
    pub utilization_percent: f64,
    pub temperature_celsius: f64,
    pub power_watts: f64,
    pub bucket_width_seconds: u32,
}

/// Agregado reducido (rollup) sobre una ventana de tiempo.
#[derive(Debug, Clone)]
pub struct UsageRollup {
    pub bucket_start: chrono::DateTime<chrono::Utc>,
    pub mean_utilization_percent: f64,
    pub peak_utilization_percent: f64,
    pub sample_count: u64,
}

pub struct UsageMetricRepository<'a> {
    connection: &'a Connection,
}

impl<'a> UsageMetricRepository<'a> {
    #[must_use]
    pub fn new(connection: &'a Connection) -> Self {
        Self { connection }
    }

    pub async fn record(&self, sample: &UsageSample) -> Result<(), DbError> {
        self.connection
            .execute(
                r#"INSERT INTO usage_metrics
                    (id, gpu_id, provider_id, sampled_at, utilization_percent,
                     temperature_celsius, power_watts, bucket_width_seconds)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                params![
                    sample.id.to_string(),
                    sample.gpu_id.to_string(),
                    sample.provider_id.to_string(),
                    sample.sampled_at.to_rfc3339(),
                    sample.utilization_percent,
                    sample.temperature_celsius,
                    sample.power_watts,
                    sample.bucket_width_seconds,
                ],
            )
            .await
            .map_err(DbError::QueryError)?;
        Ok(())
    }

    /// Reduce las muestras crudas de un recurso en baldes de
    /// `bucket_seconds`, calculando media y pico por balde. Usado por
    /// el barredor de retencion antes de purgar la resolucion completa.
    pub async fn rollup_for_gpu(
        &self,
        gpu_id: Uuid,
        since: chrono::DateTime<chrono::Utc>,
        bucket_seconds: i64,
    ) -> Result<Vec<UsageRollup>, DbError> {
        let mut rows = self
            .connection
            .query(
                r#"SELECT
                     (CAST(strftime('%s', sampled_at) AS INTEGER) / ?3) * ?3 AS bucket,
                     AVG(utilization_percent), MAX(utilization_percent), COUNT(*)
                   FROM usage_metrics
                   WHERE gpu_id = ?1 AND sampled_at >= ?2
                   GROUP BY bucket
                   ORDER BY bucket ASC"#,
                params![gpu_id.to_string(), since.to_rfc3339(), bucket_seconds],
            )
            .await
            .map_err(DbError::QueryError)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(DbError::QueryError)? {
            out.push(row_to_rollup(&row)?);
        }
        Ok(out)
    }

    pub async fn purge_older_than(&self, cutoff: chrono::DateTime<chrono::Utc>) -> Result<u64, DbError> {
        let affected = self
            .connection
            .execute(
                "DELETE FROM usage_metrics WHERE sampled_at < ?1",
                params![cutoff.to_rfc3339()],
            )
            .await
            .map_err(DbError::QueryError)?;
        Ok(affected)
    }
}

fn row_to_rollup(row: &Row) -> Result<UsageRollup, DbError> {
    let bucket_epoch: i64 = row.get(0).map_err(DbError::QueryError)?;
    let mean_utilization_percent: f64 = row.get(1).map_err(DbError::QueryError)?;
    let peak_utilization_percent: f64 = row.get(2).map_err(DbError::QueryError)?;
    let sample_count: i64 = row.get(3).map_err(DbError::QueryError)?;

    Ok(UsageRollup {
        bucket_start: chrono::DateTime::from_timestamp(bucket_epoch, 0)
            .ok_or_else(|| DbError::MappingError(format!("invalid bucket epoch: {bucket_epoch}")))?,
        mean_utilization_percent,
        peak_utilization_percent,
        sample_count: sample_count as u64,
    })
}
