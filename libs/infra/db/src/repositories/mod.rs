// [libs/infra/db/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORY ACCESS MATRIX (ESTRATO L3)
 * RESPONSABILIDAD: ORQUESTACION DE SUBSISTEMAS DE PERSISTENCIA
 *
 * Barrel file: los submodulos permanecen aislados, y solo las
 * estructuras de autoridad (repositorios) se exponen al exterior.
 * =================================================================
 */

pub mod allocations;
pub mod gpus;
pub mod heartbeats;
pub mod incidents;
pub mod providers;
pub mod usage_metrics;
pub mod verifications;

pub use allocations::AllocationRepository;
pub use gpus::{GpuRepository, GpuSearchFilter};
pub use heartbeats::HeartbeatRepository;
pub use incidents::{Incident, IncidentRepository, IncidentSeverity};
pub use providers::{Page, ProviderRepository};
pub use usage_metrics::{UsageMetricRepository, UsageRollup, UsageSample};
pub use verifications::VerificationRepository;
