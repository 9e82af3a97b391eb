// [libs/infra/detectors/src/vendors/nvidia.rs]
/*!
 * =================================================================
 * APARATO: NVIDIA DETECTOR (NVML-STYLE) (ESTRATO L3)
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

/// Simula el backend NVML. En produccion este tipo envolveria una
/// biblioteca como `nvml-wrapper` contra `libnvidia-ml.so`.
#[derive(Clone)]
pub struct NvidiaDetector {
    provider_id: Uuid,
    device_count: u32,
}

impl NvidiaDetector {
    #[must_use]
    pub fn new(provider_id: Uuid, device_count: u32) -> Self {
        Self {
            provider_id,
            device_count,
        }
    }
}

#[async_trait]
impl VendorDetector for NvidiaDetector {
    fn vendor_name(&self) -> &'static str {
        "nvidia"
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
            let bus_address = format!("0000:{:02x}:00.0", index);
            let specs = GpuSpecs {
                total_memory_mb: 80_000,
                memory_bandwidth_gbps: 3350.0,
                compute_unit_count: 132,
                tensor_unit_count: 528,
                base_clock_mhz: 1095,
                boost_clock_mhz: 1980,
                memory_clock_mhz: 2619,
                architecture: "hopper".into(),
                compute_capability: "sm_90".into(),
                power_envelope_watts: 700,
                bus_info: bus_address.clone(),
            };
            let capabilities = common_capabilities(
                vec![PrecisionType::Fp64, PrecisionType::Fp32, PrecisionType::Fp16, PrecisionType::Bf16],
                vec![ComputeApi::Cuda, ComputeApi::Vulkan, ComputeApi::OpenCl],
            );
            let driver_info = DriverInfo {
                driver_version: "550.90.07".into(),
                runtime_version: "12.4".into(),
            };
            devices.push(synthesize_device(
                self.provider_id,
                Vendor::Nvidia,
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

        device.live_metrics.utilization_percent = pseudo_metric(vendor_uuid, "util", 0.0, 95.0);
        device.live_metrics.temperature_celsius = pseudo_metric(vendor_uuid, "temp", 35.0, 82.0);
        device.live_metrics.power_watts = pseudo_metric(vendor_uuid, "power", 80.0, 650.0);
        device.runtime_state = if device.live_metrics.utilization_percent > 5.0 {
            GpuRuntimeState::Busy
        } else {
            GpuRuntimeState::Idle
        };
        Ok(device)
    }

    async fn run_benchmark(&self, vendor_uuid: &str) -> Result<Vec<BenchmarkMeasurement>, DetectorError> {
        let score = pseudo_metric(vendor_uuid, "matmul", 40.0, 110.0) as f64;
        Ok(vec![BenchmarkMeasurement {
            test_name: "matmul_fp16_tensor".into(),
            kind: BenchmarkKind::TensorOps,
            score,
            unit: "tflops".into(),
            min_acceptable: 20.0,
            max_observed_reference: 120.0,
            passed: score >= 20.0,
            duration_ms: 1800,
            metadata: serde_json::json!({"vendor": "nvidia"}),
        }])
    }
    async fn monitor_changes(&self, poll_interval: std::time::Duration) -> tokio::sync::mpsc::Receiver<crate::detector::DeviceChangeEvent> {
        spawn_change_monitor(self.clone(), poll_interval)
    }
}
