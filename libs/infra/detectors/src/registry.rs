// [libs/infra/detectors/src/registry.rs]
/*!
 * =================================================================
 * APARATO: DETECTOR REGISTRY (ESTRATO L3)
 * RESPONSABILIDAD: FAN-OUT DE DETECTORES CON AISLAMIENTO DE FALLAS
 *
 * Un fallo al inicializar o enumerar un vendor jamas tumba el barrido
 * completo: se registra y se omite ese vendor, preservando los
 * recursos de los demas.
 * =================================================================
 */

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use nebula_domain_models::GpuResource;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::detector::{DeviceChangeEvent, VendorDetector};

/// Capacidad del canal agregado del registro; independiente de la de
/// cada detector individual.
const AGGREGATE_CHANNEL_CAPACITY: usize = 256;

pub struct DetectorRegistry {
    detectors: Vec<Box<dyn VendorDetector>>,
}

impl DetectorRegistry {
    #[must_use]
    pub fn new(detectors: Vec<Box<dyn VendorDetector>>) -> Self {
        Self { detectors }
    }

    /// Inicializa todo detector disponible en el host. Un detector cuyo
    /// vendor no esta presente, o cuya inicializacion falla, se omite
    /// sin abortar el arranque del agente.
    pub async fn initialize_available(&self) -> Vec<&str> {
        let mut initialized = Vec::new();
        for detector in &self.detectors {
            if !detector.is_available().await {
                info!(vendor = detector.vendor_name(), "vendor not present on host, skipping");
                continue;
            }
            match detector.initialize().await {
                Ok(()) => {
                    initialized.push(detector.vendor_name());
                }
                Err(e) => {
                    warn!(vendor = detector.vendor_name(), error = %e, "detector initialization failed, skipping vendor");
                }
            }
        }
        initialized
    }

    pub async fn cleanup_all(&self) {
        for detector in &self.detectors {
            if let Err(e) = detector.cleanup().await {
                warn!(vendor = detector.vendor_name(), error = %e, "detector cleanup failed");
            }
        }
    }

    /// Enumera dispositivos de todos los detectores inicializados,
    /// deduplicando por UUID de vendor (nativo o sintetizado). Un
    /// dispositivo individual que falla al describirse se omite y se
    /// registra, sin descartar el resto del barrido.
    pub async fn enumerate_all(&self) -> Vec<GpuResource> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();

        for detector in &self.detectors {
            if !detector.is_available().await {
                continue;
            }
            match detector.enumerate_devices().await {
                Ok(devices) => {
                    for device in devices {
                        if seen.insert(device.vendor_uuid.clone()) {
                            out.push(device);
                        } else {
                            warn!(
                                vendor = detector.vendor_name(),
                                vendor_uuid = %device.vendor_uuid,
                                "duplicate device uuid observed, skipping"
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!(vendor = detector.vendor_name(), error = %e, "device enumeration failed, skipping vendor");
                }
            }
        }

        out
    }

    /// Fan-out de `monitor_changes` sobre todo detector disponible en
    /// un unico canal agregado. El primer `StreamFailed` recibido de
    /// cualquier detector se reenvia y detiene a todos los demas,
    /// cerrando el canal agregado: el llamador debe volver a invocar
    /// este metodo para reanudar la vigilancia.
    pub async fn monitor_changes(&self, poll_interval: Duration) -> mpsc::Receiver<DeviceChangeEvent> {
        let (tx, rx) = mpsc::channel(AGGREGATE_CHANNEL_CAPACITY);
        let stop = Arc::new(tokio::sync::Notify::new());

        for detector in &self.detectors {
            if !detector.is_available().await {
                continue;
            }
            let mut source = detector.monitor_changes(poll_interval).await;
            let tx = tx.clone();
            let stop = stop.clone();

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        () = stop.notified() => return,
                        event = source.recv() => {
                            match event {
                                Some(DeviceChangeEvent::StreamFailed { vendor, reason }) => {
                                    let _ = tx.send(DeviceChangeEvent::StreamFailed { vendor, reason }).await;
                                    stop.notify_waiters();
                                    return;
                                }
                                Some(other) => {
                                    if tx.send(other).await.is_err() {
                                        return;
                                    }
                                }
                                None => return,
                            }
                        }
                    }
                }
            });
        }

        rx
    }
}
