// [libs/infra/detectors/src/detector.rs]
/*!
 * =================================================================
 * APARATO: VENDOR DETECTOR ABSTRACTION (ESTRATO L3)
 * RESPONSABILIDAD: CONTRATO POLIMORFICO DE ENUMERACION DE SILICIO
 *
 * Cada fabricante expone su propia API nativa (NVML, ROCm-SMI,
 * Level-Zero); este trait normaliza las tres a una unica forma que el
 * Inventory Store puede persistir sin conocer el vendor subyacente.
 * =================================================================
 */

use async_trait::async_trait;
use nebula_domain_models::{BenchmarkMeasurement, GpuResource};
use tokio::sync::mpsc;

use crate::errors::DetectorError;

/// Un hecho observado por el monitor de cambios de un detector: alta,
/// baja o modificacion de un dispositivo, o el fin irrecuperable del
/// flujo: el primer error termina el flujo y el llamador debe
/// reiniciarlo.
#[derive(Debug, Clone)]
pub enum DeviceChangeEvent {
    Added(GpuResource),
    Removed { vendor_uuid: String },
    Modified(GpuResource),
    StreamFailed { vendor: &'static str, reason: String },
}

/// Contrato que implementa cada backend de vendor (NVIDIA/AMD/Intel).
#[async_trait]
pub trait VendorDetector: Send + Sync {
    /// Nombre legible del vendor, usado en logs y en el registro.
    fn vendor_name(&self) -> &'static str;

    /// Inicializa el backend nativo (carga de biblioteca dinamica,
    /// apertura de contexto de driver). Se invoca una sola vez por
    /// ciclo de vida del agente.
    async fn initialize(&self) -> Result<(), DetectorError>;

    /// Libera los recursos del backend nativo al apagar el agente.
    async fn cleanup(&self) -> Result<(), DetectorError>;

    /// Indica si el backend de este vendor esta disponible en el host
    /// actual, sin lanzar error si simplemente no hay hardware del
    /// vendor (esto no es una falla, solo ausencia).
    async fn is_available(&self) -> bool;

    /// Enumera todos los dispositivos visibles de este vendor.
    async fn enumerate_devices(&self) -> Result<Vec<GpuResource>, DetectorError>;

    /// Refresca el estado en vivo (metricas, estado de ejecucion) de
    /// un dispositivo ya conocido, identificado por su UUID de vendor.
    async fn refresh_device(&self, vendor_uuid: &str) -> Result<GpuResource, DetectorError>;

    /// Ejecuta la suite de benchmark de verificacion sobre un
    /// dispositivo y retorna sus mediciones crudas.
    async fn run_benchmark(&self, vendor_uuid: &str) -> Result<Vec<BenchmarkMeasurement>, DetectorError>;

    /// Produce una secuencia perezosa de eventos de alta/baja/
    /// modificacion para este vendor, sondeando `enumerate_devices` a
    /// intervalo fijo y diferenciando contra el ultimo barrido. El
    /// primer error de enumeracion emite `StreamFailed` y cierra el
    /// canal; el llamador debe volver a invocar este metodo para
    /// reanudar.
    async fn monitor_changes(&self, poll_interval: std::time::Duration) -> mpsc::Receiver<DeviceChangeEvent>;
}
