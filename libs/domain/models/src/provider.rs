// [libs/domain/models/src/provider.rs]
/*!
 * =================================================================
 * APARATO: PROVIDER DOMAIN MODEL (ESTRATO L2)
 * RESPONSABILIDAD: IDENTIDAD, REPUTACION Y ENDPOINTS DE UN OPERADOR
 *
 * Un Provider es el operador que contribuye capacidad de GPU a la red.
 * Su registro persiste entre reinicios; su salud y reputacion son
 * monotonas respecto a los eventos observados (correcciones hacia
 * adelante, nunca reescritura de historia).
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Estado de registro del provider en el ciclo de vida administrativo.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    Pending,
    Active,
    Inactive,
    Suspended,
    Blocked,
}

/// Estado de salud derivado por el Heartbeat Monitor (ver heartbeat.rs).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
    Unreachable,
    Unknown,
}

impl Default for HealthState {
    fn default() -> Self {
        HealthState::Unknown
    }
}

/// Clasificacion semantica del endpoint publicado por un provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Request,
    Stream,
    Event,
}

/// Un punto de contacto de red publicado por el provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub kind: EndpointKind,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub secure: bool,
    /// Prioridad relativa entre endpoints del mismo tipo; menor = preferido.
    pub priority: u8,
}

/// Material de autenticacion almacenado del lado del servidor.
///
/// El secreto en texto plano nunca se persiste: solo el digest salado.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthMaterial {
    pub salted_key_digest: String,
    pub public_key: String,
}

/// Resumen agregado (cacheado, denormalizado) de los recursos de un provider.
///
/// Se reconstruye por consulta contra el Inventory Store; nunca es la
/// fuente de verdad de si un recurso existe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub total_gpus: u32,
    pub idle_gpus: u32,
    pub busy_gpus: u32,
    pub offline_gpus: u32,
    pub total_memory_mb: u64,
}

/// Contadores de confiabilidad observada, monotonos salvo correccion
/// explicita hacia adelante (nunca reescritura retroactiva).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReliabilityCounters {
    pub consecutive_successful: u64,
    pub consecutive_failed: u64,
    pub reputation: f64,
    pub reliability_score: f64,
    pub rolling_uptime_percent: f64,
}

/// Entidad raiz Provider: un operador contribuyendo capacidad de computo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    pub contact_email: String,
    pub organization: String,
    pub registration_state: RegistrationState,
    pub health_state: HealthState,
    pub auth: AuthMaterial,
    pub endpoints: Vec<ProviderEndpoint>,
    pub tags: Vec<String>,
    pub region: Option<String>,
    pub reliability: ReliabilityCounters,
    pub resource_summary: ResourceSummary,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Columna de version para control de concurrencia optimista.
    pub version: i64,
}

impl Provider {
    /// Construye un provider recien registrado en estado `pending`.
    #[must_use]
    pub fn new_pending(
        name: String,
        contact_email: String,
        organization: String,
        auth: AuthMaterial,
        endpoints: Vec<ProviderEndpoint>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            contact_email,
            organization,
            registration_state: RegistrationState::Pending,
            health_state: HealthState::Unknown,
            auth,
            endpoints,
            tags: Vec::new(),
            region: None,
            reliability: ReliabilityCounters::default(),
            resource_summary: ResourceSummary::default(),
            last_heartbeat_at: None,
            created_at: Utc::now(),
            version: 0,
        }
    }

    /// Un provider es elegible para recibir nuevas colocaciones solo si
    /// esta activo y su salud no esta degradada mas alla de `degraded`.
    #[must_use]
    pub fn is_placement_eligible(&self) -> bool {
        self.registration_state == RegistrationState::Active
            && matches!(self.health_state, HealthState::Healthy | HealthState::Degraded)
    }
}
