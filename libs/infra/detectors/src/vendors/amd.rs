// [libs/infra/detectors/src/vendors/amd.rs]
/*!
 * =================================================================
 * APARATO: AMD DETECTOR (ROCM-SMI-STYLE) (ESTRATO L3)
 * =================================================================
 */

use async_trait::async_trait;
use nebula_domain_models::{
    BenchmarkKind, BenchmarkMeasurement, ComputeApi, DriverInfo, GpuResource, GpuRuntimeState,
    GpuSpecs, PrecisionType, Vendor,
};
use uuid::Uuid;

use crate::detector::VendorDetector;
use crate::errors::DetectorError;
use crate::vendors::{common_capabilities, pseudo_metric, spawn_change_monitor, synthesize_device};

/// Simula el backend ROCm-SMI para aceleradores AMD Instinct.
#[derive(Clone)]
pub struct AmdDetector {
    provider_id: Uuid,
    device_count: u32,
}

impl AmdDetector {
    #[must_use]
    pub fn new(provider_id: Uuid, device_count: u32) -> Self {
        Self {
            provider_id,
            device_count,
        }
    }
}

#[async_trait]
impl VendorDetector for AmdDetector {
    fn vendor_name(&self) -> &'static str {
        "amd"
    }

    async fn initialize(&self) -> Result<(), DetectorError> {
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), DetectorError> {
        Ok(())
    }

    async fn is_available(&self) -> bool {
        self.device_count > 0
    }

    async fn enumerate_devices(&self) -> Result<Vec<GpuResource>, DetectorError> {
        let mut devices = Vec::with_capacity(self.device_count as usize);
        for index in 0..self.device_count {
            let bus_address = format!("0000:{:02x}:00.0", 0x40 + index);
            let specs = GpuSpecs {
                total_memory_mb: 192_000,
                memory_bandwidth_gbps: 5300.0,
                compute_unit_count: 304,
                tensor_unit_count: 1216,
                base_clock_mhz: 1000,
                boost_clock_mhz: 2100,
                memory_clock_mhz: 1200,
                architecture: "cdna3".into(),
                compute_capability: "gfx942".into(),
                power_envelope_watts: 750,
                bus_info: bus_address.clone(),
            };
            let capabilities = common_capabilities(
                vec![PrecisionType::Fp64, PrecisionType::Fp32, PrecisionType::Fp16, PrecisionType::Bf16],
                vec![ComputeApi::Rocm, ComputeApi::OpenCl],
            );
            let driver_info = DriverInfo {
                driver_version: "6.1.2".into(),
                runtime_version: "rocm-6.1".into(),
            };
            devices.push(synthesize_device(
                self.provider_id,
                Vendor::Amd,
                &bus_address,
                index,
                specs,
                capabilities,
                driver_info,
            ));
        }
        Ok(devices)
    }

    async fn refresh_device(&self, vendor_uuid: &str) -> Result<GpuResource, DetectorError> {
        let devices = self.enumerate_devices().await?;
        let mut device = devices
            .into_iter()
            .find(|d| d.vendor_uuid == vendor_uuid)
            .ok_or_else(|| DetectorError::DeviceQueryFailed(format!("unknown device {vendor_uuid}")))?;

        device.live_metrics.utilization_percent = pseudo_metric(vendor_uuid, "util", 0.0, 90.0);
        device.live_metrics.temperature_celsius = pseudo_metric(vendor_uuid, "temp", 38.0, 85.0);
        device.live_metrics.power_watts = pseudo_metric(vendor_uuid, "power", 90.0, 700.0);
        device.runtime_state = if device.live_metrics.utilization_percent > 5.0 {
            GpuRuntimeState::Busy
        } else {
            GpuRuntimeState::Idle
        };
        Ok(device)
    }

    async fn run_benchmark(&self, vendor_uuid: &str) -> Result<Vec<BenchmarkMeasurement>, DetectorError> {
        let score = pseudo_metric(vendor_uuid, "matmul", 35.0, 105.0) as f64;
        Ok(vec![BenchmarkMeasurement {
            test_name: "matmul_fp16_matrix_core".into(),
            kind: BenchmarkKind::TensorOps,
            score,
            unit: "tflops".into(),
            min_acceptable: 20.0,
            max_observed_reference: 115.0,
            passed: score >= 20.0,
            duration_ms: 1900,
            metadata: serde_json::json!({"vendor": "amd"}),
        }])
    }
    async fn monitor_changes(&self, poll_interval: std::time::Duration) -> tokio::sync::mpsc::Receiver<crate::detector::DeviceChangeEvent> {
        spawn_change_monitor(self.clone(), poll_interval)
    }
}
