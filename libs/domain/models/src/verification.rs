// [libs/domain/models/src/verification.rs]
/*!
 * =================================================================
 * APARATO: VERIFICATION DOMAIN MODEL (ESTRATO L2)
 * RESPONSABILIDAD: RESULTADOS DE BENCHMARK Y EVALUACION DE CAPACIDAD
 *
 * El Verification Engine produce estos registros; el Resource Matcher
 * los consume solo a traves de `VerificationState::is_consumable_at`
 * (ver gpu.rs), nunca leyendo puntajes crudos directamente.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Categoria de prueba ejecutada por el motor de verificacion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkKind {
    ComputeThroughput,
    MemoryBandwidth,
    TensorOps,
    Stability,
    ApiCompatibility,
}

/// Una medicion individual dentro de una suite de benchmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkMeasurement {
    pub test_name: String,
    pub kind: BenchmarkKind,
    pub score: f64,
    pub unit: String,
    pub min_acceptable: f64,
    pub max_observed_reference: f64,
    pub passed: bool,
    pub duration_ms: u64,
    pub metadata: serde_json::Value,
}

/// Nivel de capacidad asignado a un recurso tras la evaluacion agregada.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Basic,
    Standard,
    Professional,
    Enterprise,
}

/// Evaluacion de capacidad agregada por eje, producida a partir de un
/// conjunto de `BenchmarkMeasurement`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityAssessment {
    pub compute_score: f64,
    pub memory_score: f64,
    pub tensor_score: f64,
    pub stability_score: f64,
    pub compatibility_score: f64,
    pub overall_score: f64,
    pub tier: Tier,
    pub certifications: Vec<String>,
}

/// Resultado completo y persistible de una corrida de verificacion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub id: Uuid,
    pub gpu_id: Uuid,
    pub provider_id: Uuid,
    pub measurements: Vec<BenchmarkMeasurement>,
    pub assessment: CapabilityAssessment,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub suite_version: String,
}

impl VerificationResult {
    /// Un resultado certifica el recurso solo si todas las mediciones
    /// individuales pasaron su umbral.
    #[must_use]
    pub fn all_measurements_passed(&self) -> bool {
        !self.measurements.is_empty() && self.measurements.iter().all(|m| m.passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement(passed: bool) -> BenchmarkMeasurement {
        BenchmarkMeasurement {
            test_name: "matmul_fp32".into(),
            kind: BenchmarkKind::ComputeThroughput,
            score: 42.0,
            unit: "tflops".into(),
            min_acceptable: 10.0,
            max_observed_reference: 100.0,
            passed,
            duration_ms: 1200,
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn partial_suite_failure_does_not_certify() {
        let result = VerificationResult {
            id: Uuid::new_v4(),
            gpu_id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            measurements: vec![measurement(true), measurement(false)],
            assessment: CapabilityAssessment {
                compute_score: 80.0,
                memory_score: 80.0,
                tensor_score: 0.0,
                stability_score: 80.0,
                compatibility_score: 80.0,
                overall_score: 64.0,
                tier: Tier::Standard,
                certifications: Vec::new(),
            },
            started_at: Utc::now(),
            completed_at: Utc::now(),
            valid_until: Utc::now(),
            suite_version: "v1".into(),
        };
        assert!(!result.all_measurements_passed());
    }
}
