// [libs/domain/models/src/requirements.rs]
/*!
 * =================================================================
 * APARATO: JOB REQUIREMENTS CONTRACT (ESTRATO L2)
 * RESPONSABILIDAD: DECLARACION DE NECESIDADES DE UN TRABAJO DE COMPUTO
 * =================================================================
 */

use serde::{Deserialize, Serialize};

use crate::gpu::{ComputeApi, PrecisionType};

/// Clase de prioridad declarada por el consumidor al someter un trabajo.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PriorityClass {
    Low,
    Normal,
    High,
    Critical,
}

impl PriorityClass {
    /// Peso numerico usado por el scheduler para comparar prioridades
    /// y decidir candidatos de preemption.
    #[must_use]
    pub fn weight(self) -> u32 {
        match self {
            PriorityClass::Low => 10,
            PriorityClass::Normal => 25,
            PriorityClass::High => 50,
            PriorityClass::Critical => 90,
        }
    }
}

/// Haz de requisitos de recursos y politica declarado por un trabajo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequirements {
    pub min_memory_mb: u64,
    pub required_architectures: Vec<String>,
    pub required_compute_capabilities: Vec<String>,
    pub required_apis: Vec<ComputeApi>,
    pub required_precisions: Vec<PrecisionType>,
    pub requires_tensor_units: bool,
    pub min_performance_score: f64,
    pub min_provider_uptime_percent: f64,
    pub preferred_regions: Vec<String>,
    pub preferred_tags: Vec<String>,
    pub max_cost_per_hour: Option<f64>,
    pub priority: PriorityClass,
    pub preemption_allowed: bool,
    pub deadline_seconds: Option<u64>,
}

impl Default for JobRequirements {
    fn default() -> Self {
        Self {
            min_memory_mb: 0,
            required_architectures: Vec::new(),
            required_compute_capabilities: Vec::new(),
            required_apis: Vec::new(),
            required_precisions: Vec::new(),
            requires_tensor_units: false,
            min_performance_score: 0.0,
            min_provider_uptime_percent: 0.0,
            preferred_regions: Vec::new(),
            preferred_tags: Vec::new(),
            max_cost_per_hour: None,
            priority: PriorityClass::Normal,
            preemption_allowed: false,
            deadline_seconds: None,
        }
    }
}
