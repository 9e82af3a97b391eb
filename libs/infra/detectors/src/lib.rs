// [libs/infra/detectors/src/lib.rs]
/*!
 * =================================================================
 * APARATO: VENDOR DETECTION MASTER HUB (ESTRATO L3)
 * RESPONSABILIDAD: ENUMERACION NORMALIZADA DE SILICIO POR FABRICANTE
 * =================================================================
 */

pub mod detector;
pub mod errors;
pub mod registry;
pub mod vendors;

pub use detector::{DeviceChangeEvent, VendorDetector};
pub use errors::DetectorError;
pub use registry::DetectorRegistry;
pub use vendors::amd::AmdDetector;
pub use vendors::intel::IntelDetector;
pub use vendors::nvidia::NvidiaDetector;

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn registry_deduplicates_devices_across_detectors() {
        let provider_id = Uuid::new_v4();
        let registry = DetectorRegistry::new(vec![
            Box::new(NvidiaDetector::new(provider_id, 2)),
            Box::new(AmdDetector::new(provider_id, 1)),
            Box::new(IntelDetector::new(provider_id, 0)),
        ]);

        registry.initialize_available().await;
        let devices = registry.enumerate_all().await;
        assert_eq!(devices.len(), 3);

        let unique: std::collections::HashSet<_> = devices.iter().map(|d| d.vendor_uuid.clone()).collect();
        assert_eq!(unique.len(), devices.len());
    }

    #[tokio::test]
    async fn unavailable_vendor_is_skipped_without_error() {
        let provider_id = Uuid::new_v4();
        let registry = DetectorRegistry::new(vec![Box::new(IntelDetector::new(provider_id, 0))]);
        let initialized = registry.initialize_available().await;
        assert!(initialized.is_empty());
        assert!(registry.enumerate_all().await.is_empty());
    }

    #[tokio::test]
    async fn change_monitor_reports_added_devices_on_first_poll() {
        let provider_id = Uuid::new_v4();
        let registry = DetectorRegistry::new(vec![Box::new(NvidiaDetector::new(provider_id, 2))]);

        let mut changes = registry.monitor_changes(std::time::Duration::from_millis(10)).await;
        let mut added = 0;
        for _ in 0..2 {
            match tokio::time::timeout(std::time::Duration::from_secs(1), changes.recv())
                .await
                .expect("change event should arrive within timeout")
            {
                Some(DeviceChangeEvent::Added(_)) => added += 1,
                other => panic!("expected Added event, got {other:?}"),
            }
        }
        assert_eq!(added, 2);
    }
}
