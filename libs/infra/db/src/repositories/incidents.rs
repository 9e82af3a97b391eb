// [libs/infra/db/src/repositories/incidents.rs]
/*!
 * =================================================================
 * APARATO: INCIDENT REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: BITACORA DE AUDITORIA DE HECHOS OPERACIONALES
 *
 * Un incidente es el rastro persistente de un `InventoryEvent` que el
 * operador necesita poder consultar retroactivamente (p.ej. perdidas de
 * conexion, umbrales excedidos). No reemplaza al Event Bus en vivo —
 * es su contraparte durable para auditoria (ver SPEC_FULL "limite de
 * no-objetivo": se documenta como plomeria de auditoria, no metricas).
 * =================================================================
 */

use libsql::{params, Connection, Row};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentSeverity {
    Info,
    Warning,
    Critical,
}

impl IncidentSeverity {
    fn as_str(self) -> &'static str {
        match self {
            IncidentSeverity::Info => "info",
            IncidentSeverity::Warning => "warning",
            IncidentSeverity::Critical => "critical",
        }
    }

    fn parse(s: &str) -> Result<Self, DbError> {
        match s {
            "info" => Ok(IncidentSeverity::Info),
            "warning" => Ok(IncidentSeverity::Warning),
            "critical" => Ok(IncidentSeverity::Critical),
            other => Err(DbError::MappingError(format!("unknown severity: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Incident {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub gpu_id: Option<Uuid>,
    pub kind: String,
    pub severity: IncidentSeverity,
    pub message: String,
    pub opened_at: chrono::DateTime<chrono::Utc>,
    pub resolved_at: Option<chrono::DateTime<chrono::Utc>>,
    pub metadata: serde_json::Value,
}

pub struct IncidentRepository<'a> {
    connection: &'a Connection,
}

impl<'a> IncidentRepository<'a> {
    #[must_use]
    pub fn new(connection: &'a Connection) -> Self {
        Self { connection }
    }

    pub async fn open(&self, incident: &Incident) -> Result<(), DbError> {
        self.connection
            .execute(
                r#"INSERT INTO incidents
                    (id, provider_id, gpu_id, kind, severity, message, opened_at,
                     resolved_at, metadata_json)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
                params![
                    incident.id.to_string(),
                    incident.provider_id.to_string(),
                    incident.gpu_id.map(|g| g.to_string()),
                    incident.kind.clone(),
                    incident.severity.as_str(),
                    incident.message.clone(),
                    incident.opened_at.to_rfc3339(),
                    incident.resolved_at.map(|t| t.to_rfc3339()),
                    incident.metadata.to_string(),
                ],
            )
            .await
            .map_err(DbError::QueryError)?;
        Ok(())
    }

    pub async fn resolve(&self, id: Uuid, resolved_at: chrono::DateTime<chrono::Utc>) -> Result<(), DbError> {
        let affected = self
            .connection
            .execute(
                "UPDATE incidents SET resolved_at = ?2 WHERE id = ?1 AND resolved_at IS NULL",
                params![id.to_string(), resolved_at.to_rfc3339()],
            )
            .await
            .map_err(DbError::QueryError)?;

        if affected == 0 {
            return Err(DbError::NotFound {
                entity: "incident",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    pub async fn list_open_for_provider(&self, provider_id: Uuid) -> Result<Vec<Incident>, DbError> {
        let mut rows = self
            .connection
            .query(
                r#"SELECT * FROM incidents
                   WHERE provider_id = ?1 AND resolved_at IS NULL
                   ORDER BY opened_at DESC"#,
                params![provider_id.to_string()],
            )
            .await
            .map_err(DbError::QueryError)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(DbError::QueryError)? {
            out.push(row_to_incident(&row)?);
        }
        Ok(out)
    }
}

fn row_to_incident(row: &Row) -> Result<Incident, DbError> {
    let id: String = row.get(0).map_err(DbError::QueryError)?;
    let provider_id: String = row.get(1).map_err(DbError::QueryError)?;
    let gpu_id: Option<String> = row.get(2).map_err(DbError::QueryError)?;
    let kind: String = row.get(3).map_err(DbError::QueryError)?;
    let severity: String = row.get(4).map_err(DbError::QueryError)?;
    let message: String = row.get(5).map_err(DbError::QueryError)?;
    let opened_at: String = row.get(6).map_err(DbError::QueryError)?;
    let resolved_at: Option<String> = row.get(7).map_err(DbError::QueryError)?;
    let metadata_json: String = row.get(8).map_err(DbError::QueryError)?;

    Ok(Incident {
        id: Uuid::parse_str(&id).map_err(|e| DbError::MappingError(e.to_string()))?,
        provider_id: Uuid::parse_str(&provider_id).map_err(|e| DbError::MappingError(e.to_string()))?,
        gpu_id: gpu_id
            .map(|g| Uuid::parse_str(&g))
            .transpose()
            .map_err(|e| DbError::MappingError(e.to_string()))?,
        kind,
        severity: IncidentSeverity::parse(&severity)?,
        message,
        opened_at: chrono::DateTime::parse_from_rfc3339(&opened_at)
            .map_err(|e| DbError::MappingError(e.to_string()))?
            .with_timezone(&chrono::Utc),
        resolved_at: resolved_at
            .map(|s| {
                chrono::DateTime::parse_from_rfc3339(&s)
                    .map(|d| d.with_timezone(&chrono::Utc))
                    .map_err(|e| DbError::MappingError(e.to_string()))
            })
            .transpose()?,
        metadata: serde_json::from_str(&metadata_json).map_err(|e| DbError::MappingError(e.to_string()))?,
    })
}
