// [libs/infra/db/src/repositories/gpus.rs]
/*!
 * =================================================================
 * APARATO: GPU RESOURCE REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA DEL INVENTARIO DE RECURSOS DE COMPUTO
 * =================================================================
 */

use libsql::{params, Connection, Row};
use nebula_domain_models::{
    AllocationBinding, DriverInfo, GpuCapabilities, GpuLiveMetrics, GpuResource, GpuRuntimeState,
    GpuSpecs, RollingUtilizationStats, Vendor, VerificationState,
};
use uuid::Uuid;

use crate::errors::DbError;
use crate::repositories::providers::Page;

const ENTITY: &str = "gpu_resource";

/// Predicados de busqueda para el inventario cruzado de providers
/// (operador, no un provider individual). Los predicados indexables
/// (`runtime_state`, `vendor`, `region`) se empujan a SQL; los de bitset
/// abierto (`tags`, `requires_tensor_ops`) se aplican en memoria sobre
/// la pagina ya recuperada, por lo que pueden devolver menos de
/// `limit` elementos sin que eso implique fin de la coleccion.
#[derive(Debug, Clone, Default)]
pub struct GpuSearchFilter {
    pub status: Option<GpuRuntimeState>,
    pub vendor: Option<Vendor>,
    pub region: Option<String>,
    pub tags: Vec<String>,
    pub min_memory_mb: Option<u64>,
    pub requires_tensor_ops: Option<bool>,
}

pub struct GpuRepository<'a> {
    connection: &'a Connection,
}

impl<'a> GpuRepository<'a> {
    #[must_use]
    pub fn new(connection: &'a Connection) -> Self {
        Self { connection }
    }

    pub async fn upsert(&self, gpu: &GpuResource) -> Result<(), DbError> {
        self.connection
            .execute(
                r#"INSERT INTO gpu_resources
                    (id, provider_id, vendor, vendor_uuid, vendor_index, specs_json,
                     runtime_state, live_metrics_json, capabilities_json, driver_info_json,
                     verification_state_json, binding_json, utilization_stats_json,
                     updated_at, version)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                   ON CONFLICT(provider_id, vendor_uuid) DO UPDATE SET
                     specs_json = excluded.specs_json,
                     runtime_state = excluded.runtime_state,
                     live_metrics_json = excluded.live_metrics_json,
                     capabilities_json = excluded.capabilities_json,
                     driver_info_json = excluded.driver_info_json,
                     updated_at = excluded.updated_at,
                     version = gpu_resources.version + 1"#,
                params![
                    gpu.id.to_string(),
                    gpu.provider_id.to_string(),
                    serde_json::to_string(&gpu.vendor).map_err(map_json_err)?,
                    gpu.vendor_uuid.clone(),
                    gpu.vendor_index,
                    serde_json::to_string(&gpu.specs).map_err(map_json_err)?,
                    serde_json::to_string(&gpu.runtime_state).map_err(map_json_err)?,
                    serde_json::to_string(&gpu.live_metrics).map_err(map_json_err)?,
                    serde_json::to_string(&gpu.capabilities).map_err(map_json_err)?,
                    serde_json::to_string(&gpu.driver_info).map_err(map_json_err)?,
                    serde_json::to_string(&gpu.verification_state).map_err(map_json_err)?,
                    gpu.binding
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()
                        .map_err(map_json_err)?,
                    serde_json::to_string(&gpu.utilization_stats).map_err(map_json_err)?,
                    gpu.updated_at.to_rfc3339(),
                    gpu.version,
                ],
            )
            .await
            .map_err(DbError::QueryError)?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<GpuResource, DbError> {
        let mut rows = self
            .connection
            .query("SELECT * FROM gpu_resources WHERE id = ?1", params![id.to_string()])
            .await
            .map_err(DbError::QueryError)?;

        match rows.next().await.map_err(DbError::QueryError)? {
            Some(row) => row_to_gpu(&row),
            None => Err(DbError::NotFound {
                entity: ENTITY,
                id: id.to_string(),
            }),
        }
    }

    pub async fn update_with_version(&self, gpu: &GpuResource) -> Result<(), DbError> {
        let affected = self
            .connection
            .execute(
                r#"UPDATE gpu_resources SET
                    runtime_state = ?2, live_metrics_json = ?3, verification_state_json = ?4,
                    binding_json = ?5, utilization_stats_json = ?6, updated_at = ?7,
                    version = version + 1
                   WHERE id = ?1 AND version = ?8"#,
                params![
                    gpu.id.to_string(),
                    serde_json::to_string(&gpu.runtime_state).map_err(map_json_err)?,
                    serde_json::to_string(&gpu.live_metrics).map_err(map_json_err)?,
                    serde_json::to_string(&gpu.verification_state).map_err(map_json_err)?,
                    gpu.binding
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()
                        .map_err(map_json_err)?,
                    serde_json::to_string(&gpu.utilization_stats).map_err(map_json_err)?,
                    gpu.updated_at.to_rfc3339(),
                    gpu.version,
                ],
            )
            .await
            .map_err(DbError::QueryError)?;

        if affected == 0 {
            return Err(DbError::VersionConflict {
                entity: ENTITY,
                id: gpu.id.to_string(),
            });
        }
        Ok(())
    }

    /// Recursos idle, no vinculados, para un provider dado; consultados
    /// por el Resource Matcher antes de armar candidatos.
    pub async fn list_available_for_provider(&self, provider_id: Uuid) -> Result<Vec<GpuResource>, DbError> {
        let mut rows = self
            .connection
            .query(
                r#"SELECT * FROM gpu_resources
                   WHERE provider_id = ?1 AND runtime_state = 'idle' AND binding_json IS NULL"#,
                params![provider_id.to_string()],
            )
            .await
            .map_err(DbError::QueryError)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(DbError::QueryError)? {
            out.push(row_to_gpu(&row)?);
        }
        Ok(out)
    }

    pub async fn list_by_provider(&self, provider_id: Uuid) -> Result<Vec<GpuResource>, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT * FROM gpu_resources WHERE provider_id = ?1",
                params![provider_id.to_string()],
            )
            .await
            .map_err(DbError::QueryError)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(DbError::QueryError)? {
            out.push(row_to_gpu(&row)?);
        }
        Ok(out)
    }

    /// Busqueda cruzada de providers para el panel de operador (spec
    /// S4.2/S6 "Query inventory"): filtra, pagina por keyset sobre
    /// `(updated_at, id)`, y ordena siempre por ese mismo par para que
    /// el cursor siga siendo valido pagina a pagina.
    pub async fn search(
        &self,
        filter: &GpuSearchFilter,
        after_cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<GpuResource>, DbError> {
        let (updated_at_cursor, id_cursor) = match after_cursor {
            Some(cursor) => parse_cursor(cursor)?,
            None => (String::new(), String::new()),
        };

        let mut sql = String::from(
            r#"SELECT g.*, p.tags_json AS provider_tags_json FROM gpu_resources g
               INNER JOIN providers p ON p.id = g.provider_id
               WHERE (g.updated_at, g.id) > (?1, ?2)"#,
        );
        let mut bind_index = 3;
        let mut string_binds: Vec<String> = Vec::new();

        if filter.status.is_some() {
            sql.push_str(&format!(" AND g.runtime_state = ?{bind_index}"));
            bind_index += 1;
        }
        if filter.vendor.is_some() {
            sql.push_str(&format!(" AND g.vendor = ?{bind_index}"));
            bind_index += 1;
        }
        if filter.region.is_some() {
            sql.push_str(&format!(" AND p.region = ?{bind_index}"));
            bind_index += 1;
        }

        sql.push_str(" ORDER BY g.updated_at ASC, g.id ASC LIMIT ?");
        sql.push_str(&bind_index.to_string());

        if let Some(status) = filter.status {
            string_binds.push(serde_json::to_string(&status).map_err(map_json_err)?);
        }
        if let Some(vendor) = filter.vendor {
            string_binds.push(serde_json::to_string(&vendor).map_err(map_json_err)?);
        }
        if let Some(region) = &filter.region {
            string_binds.push(region.clone());
        }

        let mut query_params: Vec<libsql::Value> =
            vec![updated_at_cursor.into(), id_cursor.into()];
        for bind in string_binds {
            query_params.push(bind.into());
        }
        query_params.push((i64::from(limit) + 1).into());

        let mut rows = self
            .connection
            .query(&sql, query_params)
            .await
            .map_err(DbError::QueryError)?;

        let mut candidates: Vec<(GpuResource, Vec<String>)> = Vec::new();
        while let Some(row) = rows.next().await.map_err(DbError::QueryError)? {
            let gpu = row_to_gpu(&row)?;
            let provider_tags_json: String = row.get(15).map_err(DbError::QueryError)?;
            let provider_tags = serde_json::from_str::<Vec<String>>(&provider_tags_json).map_err(map_json_err)?;
            candidates.push((gpu, provider_tags));
        }

        let next_cursor = if candidates.len() > limit as usize {
            let (overflow, _) = candidates.pop().expect("checked len above limit");
            Some(format!("{}|{}", overflow.updated_at.to_rfc3339(), overflow.id))
        } else {
            None
        };

        let items = candidates
            .into_iter()
            .filter(|(gpu, provider_tags)| matches_post_filter(gpu, provider_tags, filter))
            .map(|(gpu, _)| gpu)
            .collect();

        Ok(Page { items, next_cursor })
    }
}

fn matches_post_filter(gpu: &GpuResource, provider_tags: &[String], filter: &GpuSearchFilter) -> bool {
    if let Some(min_memory_mb) = filter.min_memory_mb {
        if gpu.specs.total_memory_mb < min_memory_mb {
            return false;
        }
    }
    if let Some(requires_tensor_ops) = filter.requires_tensor_ops {
        if gpu.capabilities.supports_tensor_ops != requires_tensor_ops {
            return false;
        }
    }
    if !filter.tags.is_empty() && !filter.tags.iter().all(|tag| provider_tags.contains(tag)) {
        return false;
    }
    true
}

fn parse_cursor(cursor: &str) -> Result<(String, String), DbError> {
    cursor
        .split_once('|')
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .ok_or_else(|| DbError::MappingError(format!("malformed cursor: {cursor}")))
}

fn map_json_err(e: serde_json::Error) -> DbError {
    DbError::MappingError(e.to_string())
}

fn row_to_gpu(row: &Row) -> Result<GpuResource, DbError> {
    let id: String = row.get(0).map_err(DbError::QueryError)?;
    let provider_id: String = row.get(1).map_err(DbError::QueryError)?;
    let vendor: String = row.get(2).map_err(DbError::QueryError)?;
    let vendor_uuid: String = row.get(3).map_err(DbError::QueryError)?;
    let vendor_index: u32 = row.get::<i64>(4).map_err(DbError::QueryError)? as u32;
    let specs_json: String = row.get(5).map_err(DbError::QueryError)?;
    let runtime_state: String = row.get(6).map_err(DbError::QueryError)?;
    let live_metrics_json: String = row.get(7).map_err(DbError::QueryError)?;
    let capabilities_json: String = row.get(8).map_err(DbError::QueryError)?;
    let driver_info_json: String = row.get(9).map_err(DbError::QueryError)?;
    let verification_state_json: String = row.get(10).map_err(DbError::QueryError)?;
    let binding_json: Option<String> = row.get(11).map_err(DbError::QueryError)?;
    let utilization_stats_json: String = row.get(12).map_err(DbError::QueryError)?;
    let updated_at: String = row.get(13).map_err(DbError::QueryError)?;
    let version: i64 = row.get(14).map_err(DbError::QueryError)?;

    Ok(GpuResource {
        id: Uuid::parse_str(&id).map_err(|e| DbError::MappingError(e.to_string()))?,
        provider_id: Uuid::parse_str(&provider_id).map_err(|e| DbError::MappingError(e.to_string()))?,
        vendor: serde_json::from_str::<Vendor>(&vendor).map_err(map_json_err)?,
        vendor_uuid,
        vendor_index,
        specs: serde_json::from_str::<GpuSpecs>(&specs_json).map_err(map_json_err)?,
        runtime_state: serde_json::from_str::<GpuRuntimeState>(&runtime_state).map_err(map_json_err)?,
        live_metrics: serde_json::from_str::<GpuLiveMetrics>(&live_metrics_json).map_err(map_json_err)?,
        capabilities: serde_json::from_str::<GpuCapabilities>(&capabilities_json).map_err(map_json_err)?,
        driver_info: serde_json::from_str::<DriverInfo>(&driver_info_json).map_err(map_json_err)?,
        verification_state: serde_json::from_str::<VerificationState>(&verification_state_json)
            .map_err(map_json_err)?,
        binding: binding_json
            .map(|s| serde_json::from_str::<AllocationBinding>(&s))
            .transpose()
            .map_err(map_json_err)?,
        utilization_stats: serde_json::from_str::<RollingUtilizationStats>(&utilization_stats_json)
            .map_err(map_json_err)?,
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| DbError::MappingError(e.to_string()))?
            .with_timezone(&chrono::Utc),
        version,
    })
}
