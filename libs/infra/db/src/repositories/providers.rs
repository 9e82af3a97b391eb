// [libs/infra/db/src/repositories/providers.rs]
/*!
 * =================================================================
 * APARATO: PROVIDER REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA Y CONCURRENCIA OPTIMISTA DE PROVIDERS
 * =================================================================
 */

use libsql::{params, Connection};
use nebula_domain_models::{
    AuthMaterial, HealthState, Provider, ProviderEndpoint, RegistrationState,
    ReliabilityCounters, ResourceSummary,
};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::DbError;

const ENTITY: &str = "provider";

pub struct ProviderRepository<'a> {
    connection: &'a Connection,
}

/// Pagina de resultados con cursor opaco para la siguiente pagina.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<'a> ProviderRepository<'a> {
    #[must_use]
    pub fn new(connection: &'a Connection) -> Self {
        Self { connection }
    }

    pub async fn create(&self, provider: &Provider) -> Result<(), DbError> {
        self.connection
            .execute(
                r#"INSERT INTO providers
                    (id, name, contact_email, organization, registration_state, health_state,
                     auth_json, endpoints_json, tags_json, region, reliability_json,
                     resource_summary_json, last_heartbeat_at, created_at, version)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"#,
                params![
                    provider.id.to_string(),
                    provider.name.clone(),
                    provider.contact_email.clone(),
                    provider.organization.clone(),
                    serde_json::to_string(&provider.registration_state).map_err(map_json_err)?,
                    serde_json::to_string(&provider.health_state).map_err(map_json_err)?,
                    serde_json::to_string(&provider.auth).map_err(map_json_err)?,
                    serde_json::to_string(&provider.endpoints).map_err(map_json_err)?,
                    serde_json::to_string(&provider.tags).map_err(map_json_err)?,
                    provider.region.clone(),
                    serde_json::to_string(&provider.reliability).map_err(map_json_err)?,
                    serde_json::to_string(&provider.resource_summary).map_err(map_json_err)?,
                    provider.last_heartbeat_at.map(|t| t.to_rfc3339()),
                    provider.created_at.to_rfc3339(),
                    provider.version,
                ],
            )
            .await
            .map_err(DbError::QueryError)?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Provider, DbError> {
        let mut rows = self
            .connection
            .query("SELECT * FROM providers WHERE id = ?1", params![id.to_string()])
            .await
            .map_err(DbError::QueryError)?;

        match rows.next().await.map_err(DbError::QueryError)? {
            Some(row) => row_to_provider(&row),
            None => Err(DbError::NotFound {
                entity: ENTITY,
                id: id.to_string(),
            }),
        }
    }

    /// Actualiza un provider aplicando control de concurrencia optimista:
    /// la fila solo se escribe si `version` en disco coincide con la
    /// version leida por el llamador.
    pub async fn update_with_version(&self, provider: &Provider) -> Result<(), DbError> {
        let affected = self
            .connection
            .execute(
                r#"UPDATE providers SET
                    name = ?2, contact_email = ?3, organization = ?4,
                    registration_state = ?5, health_state = ?6, auth_json = ?7,
                    endpoints_json = ?8, tags_json = ?9, region = ?10,
                    reliability_json = ?11, resource_summary_json = ?12,
                    last_heartbeat_at = ?13, version = version + 1
                   WHERE id = ?1 AND version = ?14"#,
                params![
                    provider.id.to_string(),
                    provider.name.clone(),
                    provider.contact_email.clone(),
                    provider.organization.clone(),
                    serde_json::to_string(&provider.registration_state).map_err(map_json_err)?,
                    serde_json::to_string(&provider.health_state).map_err(map_json_err)?,
                    serde_json::to_string(&provider.auth).map_err(map_json_err)?,
                    serde_json::to_string(&provider.endpoints).map_err(map_json_err)?,
                    serde_json::to_string(&provider.tags).map_err(map_json_err)?,
                    provider.region.clone(),
                    serde_json::to_string(&provider.reliability).map_err(map_json_err)?,
                    serde_json::to_string(&provider.resource_summary).map_err(map_json_err)?,
                    provider.last_heartbeat_at.map(|t| t.to_rfc3339()),
                    provider.version,
                ],
            )
            .await
            .map_err(DbError::QueryError)?;

        if affected == 0 {
            return Err(DbError::VersionConflict {
                entity: ENTITY,
                id: provider.id.to_string(),
            });
        }
        Ok(())
    }

    /// Busca un provider por su email de contacto, usado para el
    /// registro idempotente: un segundo registro con el
    /// mismo email recupera el provider existente en lugar de duplicarlo.
    pub async fn find_by_email(&self, contact_email: &str) -> Result<Option<Provider>, DbError> {
        let mut rows = self
            .connection
            .query("SELECT * FROM providers WHERE contact_email = ?1", params![contact_email])
            .await
            .map_err(DbError::QueryError)?;

        match rows.next().await.map_err(DbError::QueryError)? {
            Some(row) => Ok(Some(row_to_provider(&row)?)),
            None => Ok(None),
        }
    }

    /// Lista providers elegibles para colocacion, en paginas keyset
    /// ordenadas por `created_at, id` (estable entre paginas).
    pub async fn list_active(&self, after_cursor: Option<&str>, limit: u32) -> Result<Page<Provider>, DbError> {
        let (created_at_cursor, id_cursor) = match after_cursor {
            Some(cursor) => parse_cursor(cursor)?,
            None => (String::new(), String::new()),
        };

        let mut rows = self
            .connection
            .query(
                r#"SELECT * FROM providers
                   WHERE registration_state = 'active'
                     AND (created_at, id) > (?1, ?2)
                   ORDER BY created_at ASC, id ASC
                   LIMIT ?3"#,
                params![created_at_cursor, id_cursor, i64::from(limit) + 1],
            )
            .await
            .map_err(DbError::QueryError)?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await.map_err(DbError::QueryError)? {
            items.push(row_to_provider(&row)?);
        }

        let next_cursor = if items.len() > limit as usize {
            let overflow = items.pop().expect("checked len above limit");
            Some(format!("{}|{}", overflow.created_at.to_rfc3339(), overflow.id))
        } else {
            None
        };

        Ok(Page { items, next_cursor })
    }
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

fn row_to_provider(row: &libsql::Row) -> Result<Provider, DbError> {
    let id: String = row.get(0).map_err(DbError::QueryError)?;
    let name: String = row.get(1).map_err(DbError::QueryError)?;
    let contact_email: String = row.get(2).map_err(DbError::QueryError)?;
    let organization: String = row.get(3).map_err(DbError::QueryError)?;
    let registration_state: String = row.get(4).map_err(DbError::QueryError)?;
    let health_state: String = row.get(5).map_err(DbError::QueryError)?;
    let auth_json: String = row.get(6).map_err(DbError::QueryError)?;
    let endpoints_json: String = row.get(7).map_err(DbError::QueryError)?;
    let tags_json: String = row.get(8).map_err(DbError::QueryError)?;
    let region: Option<String> = row.get(9).map_err(DbError::QueryError)?;
    let reliability_json: String = row.get(10).map_err(DbError::QueryError)?;
    let resource_summary_json: String = row.get(11).map_err(DbError::QueryError)?;
    let last_heartbeat_at: Option<String> = row.get(12).map_err(DbError::QueryError)?;
    let created_at: String = row.get(13).map_err(DbError::QueryError)?;
    let version: i64 = row.get(14).map_err(DbError::QueryError)?;

    Ok(Provider {
        id: Uuid::parse_str(&id).map_err(|e| DbError::MappingError(e.to_string()))?,
        name,
        contact_email,
        organization,
        registration_state: serde_json::from_str::<RegistrationState>(&registration_state)
            .map_err(map_json_err)?,
        health_state: serde_json::from_str::<HealthState>(&health_state).map_err(map_json_err)?,
        auth: serde_json::from_str::<AuthMaterial>(&auth_json).map_err(map_json_err)?,
        endpoints: serde_json::from_str::<Vec<ProviderEndpoint>>(&endpoints_json)
            .map_err(map_json_err)?,
        tags: serde_json::from_str::<Vec<String>>(&tags_json).map_err(map_json_err)?,
        region,
        reliability: serde_json::from_str::<ReliabilityCounters>(&reliability_json)
            .map_err(map_json_err)?,
        resource_summary: serde_json::from_str::<ResourceSummary>(&resource_summary_json)
            .map_err(map_json_err)?,
        last_heartbeat_at: last_heartbeat_at
            .map(|s| chrono::DateTime::parse_from_rfc3339(&s).map(|d| d.with_timezone(&chrono::Utc)))
            .transpose()
            .map_err(|e| DbError::MappingError(e.to_string()))?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| DbError::MappingError(e.to_string()))?
            .with_timezone(&chrono::Utc),
        version,
    })
}
