// [libs/infra/detectors/src/vendors/mod.rs]
/*!
 * =================================================================
 * APARATO: VENDOR BACKEND IMPLEMENTATIONS (ESTRATO L3)
 *
 * Cada backend habla con su driver nativo en produccion (NVML,
 * ROCm-SMI, Level-Zero); estas implementaciones simulan esa capa de
 * enumeracion para que el resto del plano de control (Inventory
 * Store, Verification Engine) tenga un flujo de datos realista sin
 * depender de hardware fisico presente en el host de compilacion.
 * =================================================================
 */

pub mod amd;
pub mod intel;
pub mod nvidia;

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use chrono::Utc;
use nebula_domain_models::{
    ComputeApi, DriverInfo, GpuCapabilities, GpuLiveMetrics, GpuResource, GpuRuntimeState,
    GpuSpecs, PrecisionType, RollingUtilizationStats, Vendor, VerificationState,
};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::detector::{DeviceChangeEvent, VendorDetector};

/// Tamano del buffer de canal del monitor de cambios por vendor; un
/// consumidor lento recibe back-pressure en lugar de perder eventos
/// silenciosamente, a diferencia del event bus del orquestador.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Sondea `detector.enumerate_devices()` a intervalo fijo y emite la
/// diferencia contra el ultimo barrido conocido. Compartido por los
/// tres backends de vendor: ninguno tiene una API de notificacion
/// nativa que envolver en esta simulacion, asi que todos sondean.
pub(crate) fn spawn_change_monitor<D>(detector: D, poll_interval: Duration) -> mpsc::Receiver<DeviceChangeEvent>
where
    D: VendorDetector + Clone + 'static,
{
    let (tx, rx) = mpsc::channel(CHANGE_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut known: HashMap<String, GpuResource> = HashMap::new();
        let mut ticker = tokio::time::interval(poll_interval);

        loop {
            ticker.tick().await;

            let devices = match detector.enumerate_devices().await {
                Ok(devices) => devices,
                Err(err) => {
                    let _ = tx
                        .send(DeviceChangeEvent::StreamFailed {
                            vendor: detector.vendor_name(),
                            reason: err.to_string(),
                        })
                        .await;
                    return;
                }
            };

            let mut seen = std::collections::HashSet::with_capacity(devices.len());
            for device in devices {
                seen.insert(device.vendor_uuid.clone());
                match known.get(&device.vendor_uuid) {
                    None => {
                        known.insert(device.vendor_uuid.clone(), device.clone());
                        if tx.send(DeviceChangeEvent::Added(device)).await.is_err() {
                            return;
                        }
                    }
                    Some(previous) if !devices_equivalent(previous, &device) => {
                        known.insert(device.vendor_uuid.clone(), device.clone());
                        if tx.send(DeviceChangeEvent::Modified(device)).await.is_err() {
                            return;
                        }
                    }
                    Some(_) => {}
                }
            }

            let removed: Vec<String> =
                known.keys().filter(|uuid| !seen.contains(*uuid)).cloned().collect();
            for vendor_uuid in removed {
                known.remove(&vendor_uuid);
                if tx.send(DeviceChangeEvent::Removed { vendor_uuid }).await.is_err() {
                    return;
                }
            }
        }
    });

    rx
}

fn devices_equivalent(a: &GpuResource, b: &GpuResource) -> bool {
    a.runtime_state == b.runtime_state
        && a.live_metrics.utilization_percent == b.live_metrics.utilization_percent
        && a.verification_state == b.verification_state
}

/// Plantilla de dispositivo simulado, compartida entre los tres
/// backends para evitar repetir el ensamblado de `GpuResource`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn synthesize_device(
    provider_id: Uuid,
    vendor: Vendor,
    bus_address: &str,
    index: u32,
    specs: GpuSpecs,
    capabilities: GpuCapabilities,
    driver_info: DriverInfo,
) -> GpuResource {
    let vendor_uuid = GpuResource::synthesize_uuid(bus_address, index);

    GpuResource {
        id: Uuid::new_v4(),
        provider_id,
        vendor,
        vendor_uuid,
        vendor_index: index,
        specs,
        runtime_state: GpuRuntimeState::Idle,
        live_metrics: GpuLiveMetrics::default(),
        capabilities,
        driver_info,
        verification_state: VerificationState::Unverified,
        binding: None,
        utilization_stats: RollingUtilizationStats::default(),
        updated_at: Utc::now(),
        version: 0,
    }
}

/// Deriva una metrica pseudoaleatoria pero reproducible a partir del
/// UUID del dispositivo, para simular lecturas en vivo sin reloj real.
pub(crate) fn pseudo_metric(seed: &str, salt: &str, min: f32, max: f32) -> f32 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    salt.hash(&mut hasher);
    let fraction = (hasher.finish() % 10_000) as f32 / 10_000.0;
    min + fraction * (max - min)
}

pub(crate) fn common_capabilities(precisions: Vec<PrecisionType>, apis: Vec<ComputeApi>) -> GpuCapabilities {
    GpuCapabilities {
        supported_precisions: precisions,
        supports_tensor_ops: true,
        ecc_supported: true,
        ecc_enabled: true,
        unified_memory: false,
        partitioning_support: false,
        supported_apis: apis,
    }
}
