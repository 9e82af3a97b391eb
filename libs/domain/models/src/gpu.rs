// [libs/domain/models/src/gpu.rs]
/*!
 * =================================================================
 * APARATO: GPU RESOURCE DOMAIN MODEL (ESTRATO L2)
 * RESPONSABILIDAD: REPRESENTACION NORMALIZADA DE UN RECURSO DE COMPUTO
 *
 * El detector de vendor (ver nebula-infra-detectors) produce este
 * registro independientemente del fabricante subyacente; los campos
 * ausentes en un vendor se rellenan con centinelas vendor-apropiados
 * en lugar de Option anidados profundos.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fabricante de silicio normalizado.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    Nvidia,
    Amd,
    Intel,
}

/// Estado de ejecucion en vivo reportado por el detector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GpuRuntimeState {
    Unknown,
    Idle,
    Busy,
    Offline,
    Error,
}

/// Estado de verificacion del recurso (ver verification.rs).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VerificationState {
    Unverified,
    InProgress,
    Verified { valid_until: DateTime<Utc> },
    Revoked,
}

impl VerificationState {
    /// Un resultado de verificacion solo se consume si su estado es
    /// `Verified` y `now < valid_until`.
    #[must_use]
    pub fn is_consumable_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self, VerificationState::Verified { valid_until } if now < *valid_until)
    }
}

/// Especificaciones fisicas estaticas del dispositivo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuSpecs {
    pub total_memory_mb: u64,
    pub memory_bandwidth_gbps: f64,
    /// Conteo de unidades de computo en el idioma nativo del vendor
    /// (CUDA cores / Stream processors / Xe cores).
    pub compute_unit_count: u32,
    pub tensor_unit_count: u32,
    pub base_clock_mhz: u32,
    pub boost_clock_mhz: u32,
    pub memory_clock_mhz: u32,
    pub architecture: String,
    /// Cadena de capacidad de computo especifica del vendor (p.ej. "sm_90").
    pub compute_capability: String,
    pub power_envelope_watts: u32,
    pub bus_info: String,
}

/// Precision numerica soportada por el dispositivo.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PrecisionType {
    Fp64,
    Fp32,
    Fp16,
    Bf16,
    Int8,
    Int4,
}

/// API de alto nivel que el dispositivo puede ejecutar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ComputeApi {
    Cuda,
    Rocm,
    OneApi,
    Vulkan,
    OpenCl,
}

/// Bitset de capacidades expuesto de forma tipada (no como mapa abierto).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GpuCapabilities {
    pub supported_precisions: Vec<PrecisionType>,
    pub supports_tensor_ops: bool,
    pub ecc_supported: bool,
    pub ecc_enabled: bool,
    pub unified_memory: bool,
    pub partitioning_support: bool,
    pub supported_apis: Vec<ComputeApi>,
}

/// Metricas en vivo de utilizacion, muestreadas en cada latido o sondeo.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GpuLiveMetrics {
    pub utilization_percent: f32,
    pub temperature_celsius: f32,
    pub power_watts: f32,
    pub current_clock_mhz: u32,
    pub process_count: u32,
}

/// Version de driver/runtime reportada por el detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverInfo {
    pub driver_version: String,
    pub runtime_version: String,
}

/// Vinculo de asignacion activo (nulable) de un GPU idle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationBinding {
    pub consumer_id: Uuid,
    pub allocation_id: Uuid,
    pub started_at: DateTime<Utc>,
}

/// Estadisticas de utilizacion acumuladas (ventana deslizante).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollingUtilizationStats {
    pub mean_utilization_percent: f32,
    pub peak_utilization_percent: f32,
    pub sample_count: u64,
}

/// Entidad raiz GpuResource: la unidad de asignacion del plano de control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuResource {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub vendor: Vendor,
    /// UUID nativo del vendor si esta disponible; si no, sintetizado
    /// deterministicamente desde bus_address + index (ver synth_uuid).
    pub vendor_uuid: String,
    pub vendor_index: u32,
    pub specs: GpuSpecs,
    pub runtime_state: GpuRuntimeState,
    pub live_metrics: GpuLiveMetrics,
    pub capabilities: GpuCapabilities,
    pub driver_info: DriverInfo,
    pub verification_state: VerificationState,
    pub binding: Option<AllocationBinding>,
    pub utilization_stats: RollingUtilizationStats,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl GpuResource {
    /// Un GPU esta disponible para nueva colocacion si esta idle, no
    /// vinculado, y operativo (ni offline ni en error).
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.binding.is_none()
            && matches!(self.runtime_state, GpuRuntimeState::Idle)
    }

    /// Sintetiza un UUID estable desde la direccion de bus y el indice,
    /// para vendors cuya API no expone un identificador nativo. Debe
    /// producir el mismo valor entre reinicios del agente.
    #[must_use]
    pub fn synthesize_uuid(bus_address: &str, index: u32) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        bus_address.hash(&mut hasher);
        index.hash(&mut hasher);
        format!("synthetic-{:016x}", hasher.finish())
    }
}
