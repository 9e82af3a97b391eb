//! Definiciones de tipos compartidos (DTOs) y Entidades del Dominio
//! (single source of truth) para el plano de control de asignacion de GPU.

pub mod allocation;
pub mod event;
pub mod gpu;
pub mod heartbeat;
pub mod provider;
pub mod requirements;
pub mod verification;

pub use allocation::{Allocation, AllocationStatus};
pub use event::{Event, InventoryEvent};
pub use gpu::{
    AllocationBinding, ComputeApi, DriverInfo, GpuCapabilities, GpuLiveMetrics, GpuResource,
    GpuRuntimeState, GpuSpecs, PrecisionType, RollingUtilizationStats, Vendor, VerificationState,
};
pub use heartbeat::{Heartbeat, SystemMetrics};
pub use provider::{
    AuthMaterial, EndpointKind, HealthState, Provider, ProviderEndpoint, RegistrationState,
    ReliabilityCounters, ResourceSummary,
};
pub use requirements::{JobRequirements, PriorityClass};
pub use verification::{
    BenchmarkKind, BenchmarkMeasurement, CapabilityAssessment, Tier, VerificationResult,
};
