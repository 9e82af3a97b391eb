// [apps/orchestrator/src/config.rs]
//! Typed, explicit tunables for every component, assembled once at
//! startup and passed by value into constructors. No component reaches
//! into the environment on its own.

use std::time::Duration;

use nebula_core_matching::prelude::{
    AlgorithmSelectionPolicy, CertificationThresholds, ScoringWeights, TierThresholds,
};
use nebula_infra_db::retention::RetentionPolicy;
use serde::Deserialize;

use crate::errors::OrchestratorError;
use crate::services::queue::QueueDisciplineConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0".to_string(), port: 8080 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub connection_pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: ":memory:".to_string(), auth_token: None, connection_pool_size: 8 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub default_interval_seconds: u64,
    pub timeout_multiplier: f64,
    pub max_missed: u32,
    pub sweep_interval_seconds: u64,
    pub cleanup_interval_seconds: u64,
    pub event_buffer_size: usize,
    pub max_subscribers: usize,
    pub response_time_sample_size: usize,
    /// `system_metrics.cpu_percent` above this emits `ThresholdExceeded`.
    pub cpu_percent_watermark: f32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            default_interval_seconds: 30,
            timeout_multiplier: 2.0,
            max_missed: 3,
            sweep_interval_seconds: 15,
            cleanup_interval_seconds: 3600,
            event_buffer_size: 4096,
            max_subscribers: 256,
            response_time_sample_size: 20,
            cpu_percent_watermark: 90.0,
        }
    }
}

impl HeartbeatConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.default_interval_seconds)
    }

    #[must_use]
    pub fn unreachable_after(&self) -> Duration {
        Duration::from_secs_f64(self.default_interval_seconds as f64 * self.timeout_multiplier)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub placement_timeout_seconds: u64,
    pub max_commit_retries: u32,
    pub preemption_rate_cap_per_provider: u32,
    pub preemption_rate_cap_per_consumer: u32,
    pub preemption_priority_margin: i32,
    pub queue_depth_watermark: usize,
    /// Queueing discipline selected per `PriorityClass`.
    pub queue_discipline: QueueDisciplineConfig,
    /// Thresholds governing automatic placement-algorithm selection
    /// from the cluster's current busy/total gpu ratio.
    pub algorithm_selection: AlgorithmSelectionPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            placement_timeout_seconds: 10,
            max_commit_retries: 3,
            preemption_rate_cap_per_provider: 2,
            preemption_rate_cap_per_consumer: 1,
            preemption_priority_margin: 10,
            queue_depth_watermark: 10_000,
            queue_discipline: QueueDisciplineConfig::default(),
            algorithm_selection: AlgorithmSelectionPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub weights: ScoringWeights,
    pub explain_mode_default: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { weights: ScoringWeights::default(), explain_mode_default: false }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub validity_window_hours: i64,
    pub coalesce_concurrent_requests: bool,
    pub compute_weight: f64,
    pub memory_weight: f64,
    pub tensor_weight: f64,
    pub stability_weight: f64,
    pub compatibility_weight: f64,
    /// Overall-score cutoffs the assessment's tier is selected from.
    pub tier_thresholds: TierThresholds,
    /// Per-axis cutoffs the assessment's certifications are awarded from.
    pub certification_thresholds: CertificationThresholds,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            validity_window_hours: 24 * 7,
            coalesce_concurrent_requests: true,
            compute_weight: 0.3,
            memory_weight: 0.25,
            tensor_weight: 0.2,
            stability_weight: 0.15,
            compatibility_weight: 0.1,
            tier_thresholds: TierThresholds::default(),
            certification_thresholds: CertificationThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub heartbeat_retention_hours: i64,
    pub usage_metric_retention_hours: i64,
    pub cache_ttl_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { heartbeat_retention_hours: 24 * 7, usage_metric_retention_hours: 24 * 2, cache_ttl_seconds: 30 }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            heartbeat_retention: chrono::Duration::hours(self.heartbeat_retention_hours),
            usage_metric_retention: chrono::Duration::hours(self.usage_metric_retention_hours),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Signing secret for identity tokens. Must be overridden in
    /// production via `NEBULA__AUTH__TOKEN_SECRET`; the default is only
    /// fit for local development against an in-memory store.
    pub token_secret: String,
    pub identity_token_ttl_seconds: i64,
    /// Shared bearer token for operator-facing routes. Like
    /// `token_secret`, only the default is fit for local development.
    pub operator_token: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: "nebula-dev-secret-change-me".to_string(),
            identity_token_ttl_seconds: 3600,
            operator_token: "nebula-dev-operator-token".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub heartbeat: HeartbeatConfig,
    pub scheduler: SchedulerConfig,
    pub matcher: MatcherConfig,
    pub verification: VerificationConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
}

impl Config {
    /// Loads configuration from `orchestrator.toml` (if present) layered
    /// under `NEBULA__*` environment overrides, falling back to
    /// documented defaults for anything unset.
    pub fn load() -> Result<Self, OrchestratorError> {
        nebula_shared_observability::load_config("orchestrator", "NEBULA")
            .map_err(|err| OrchestratorError::Internal(format!("configuration load failed: {err}")))
    }
}
