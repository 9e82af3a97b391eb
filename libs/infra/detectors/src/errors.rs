// [libs/infra/detectors/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DETECTOR ERROR CATALOG (ESTRATO L3)
 * =================================================================
 */

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("[L3_DETECTOR_FAULT]: backend unavailable for vendor {vendor} -> {reason}")]
    BackendUnavailable { vendor: &'static str, reason: String },

    #[error("[L3_DETECTOR_FAULT]: device enumeration failed for vendor {vendor} -> {reason}")]
    EnumerationFailed { vendor: &'static str, reason: String },

    #[error("[L3_DETECTOR_FAULT]: device query failed -> {0}")]
    DeviceQueryFailed(String),

    #[error("[L3_DETECTOR_FAULT]: benchmark execution failed -> {0}")]
    BenchmarkFailed(String),
}
