// [libs/infra/detectors/src/vendors/intel.rs]
/*!
 * =================================================================
 * APARATO: INTEL DETECTOR (LEVEL-ZERO-STYLE) (ESTRATO L3)
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

/// Simula el backend Level-Zero para aceleradores Intel Data Center GPU Max.
#[derive(Clone)]
pub struct IntelDetector {
    provider_id: Uuid,
    device_count: u32,
}

impl IntelDetector {
    #[must_use]
    pub fn new(provider_id: Uuid, device_count: u32) -> Self {
        Self {
            provider_id,
            device_count,
        }
    }
}

#[async_trait]
impl VendorDetector for IntelDetector {
    fn vendor_name(&self) -> &'static str {
        "intel"
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
            let bus_address = format!("0000:{:02x}:00.0", 0x80 + index);
            let specs = GpuSpecs {
                total_memory_mb: 128_000,
                memory_bandwidth_gbps: 3276.0,
                compute_unit_count: 128,
                tensor_unit_count: 1024,
                base_clock_mhz: 900,
                boost_clock_mhz: 1600,
                memory_clock_mhz: 1600,
                architecture: "xe-hpc".into(),
                compute_capability: "xe2".into(),
                power_envelope_watts: 600,
                bus_info: bus_address.clone(),
            };
            let capabilities = common_capabilities(
                vec![PrecisionType::Fp32, PrecisionType::Fp16, PrecisionType::Bf16, PrecisionType::Int8],
                vec![ComputeApi::OneApi, ComputeApi::Vulkan],
            );
            let driver_info = DriverInfo {
                driver_version: "1.3.29735".into(),
                runtime_version: "oneapi-2024.1".into(),
            };
            devices.push(synthesize_device(
                self.provider_id,
                Vendor::Intel,
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

        device.live_metrics.utilization_percent = pseudo_metric(vendor_uuid, "util", 0.0, 85.0);
        device.live_metrics.temperature_celsius = pseudo_metric(vendor_uuid, "temp", 34.0, 80.0);
        device.live_metrics.power_watts = pseudo_metric(vendor_uuid, "power", 70.0, 560.0);
        device.runtime_state = if device.live_metrics.utilization_percent > 5.0 {
            GpuRuntimeState::Busy
        } else {
            GpuRuntimeState::Idle
        };
        Ok(device)
    }

    async fn run_benchmark(&self, vendor_uuid: &str) -> Result<Vec<BenchmarkMeasurement>, DetectorError> {
        let score = pseudo_metric(vendor_uuid, "matmul", 25.0, 80.0) as f64;
        Ok(vec![BenchmarkMeasurement {
            test_name: "matmul_fp16_xmx".into(),
            kind: BenchmarkKind::TensorOps,
            score,
            unit: "tflops".into(),
            min_acceptable: 15.0,
            max_observed_reference: 90.0,
            passed: score >= 15.0,
            duration_ms: 2000,
            metadata: serde_json::json!({"vendor": "intel"}),
        }])
    }
    async fn monitor_changes(&self, poll_interval: std::time::Duration) -> tokio::sync::mpsc::Receiver<crate::detector::DeviceChangeEvent> {
        spawn_change_monitor(self.clone(), poll_interval)
    }
}
