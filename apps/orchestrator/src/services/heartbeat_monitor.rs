// [apps/orchestrator/src/services/heartbeat_monitor.rs]
/*!
 * Tracks liveness per provider: an in-memory overlay rebuilt from the
 * store and first heartbeats (never persisted itself), the five-rule
 * health derivation, and the two background sweepers this module
 * spawns (missed-heartbeat detector, heartbeat retention).
 */

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use nebula_domain_models::{GpuRuntimeState, HealthState, Heartbeat, InventoryEvent};
use nebula_infra_db::repositories::{HeartbeatRepository, ProviderRepository};
use nebula_infra_db::retention::sweep_once;
use nebula_infra_db::TursoClient;
use parking_lot::RwLock;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::config::{Config, HeartbeatConfig};
use crate::errors::OrchestratorError;
use crate::services::event_bus::EventBus;

const RESPONSE_TIME_SAMPLE_CAP: usize = 64;

/// Per-provider liveness state held only in memory; lost across
/// restarts and rebuilt from the store plus the first heartbeats that
/// arrive for that provider.
#[derive(Debug, Clone)]
pub struct ProviderOverlay {
    pub last_heartbeat_at: DateTime<Utc>,
    pub next_expected_at: DateTime<Utc>,
    pub consecutive_successful: u64,
    pub consecutive_failed: u64,
    pub response_time_samples: VecDeque<u32>,
    pub derived_health: HealthState,
    pub resource_states: HashMap<Uuid, GpuRuntimeState>,
}

impl ProviderOverlay {
    fn fresh(now: DateTime<Utc>, interval: Duration) -> Self {
        Self {
            last_heartbeat_at: now,
            next_expected_at: now + chrono::Duration::from_std(interval).unwrap_or_default(),
            consecutive_successful: 0,
            consecutive_failed: 0,
            response_time_samples: VecDeque::with_capacity(RESPONSE_TIME_SAMPLE_CAP),
            derived_health: HealthState::Unknown,
            resource_states: HashMap::new(),
        }
    }

    #[must_use]
    pub fn mean_response_time_ms(&self) -> f64 {
        if self.response_time_samples.is_empty() {
            return 0.0;
        }
        self.response_time_samples.iter().sum::<u32>() as f64 / self.response_time_samples.len() as f64
    }
}

/// Outcome of processing a single heartbeat, returned to the caller so
/// the HTTP handler can answer with next-interval/warnings without
/// re-deriving anything.
pub struct HeartbeatOutcome {
    pub next_interval_seconds: u64,
    pub warnings: Vec<String>,
}

pub struct HeartbeatMonitor {
    overlays: RwLock<HashMap<Uuid, ProviderOverlay>>,
    db: Arc<TursoClient>,
    config: HeartbeatConfig,
    event_bus: EventBus,
}

impl HeartbeatMonitor {
    #[must_use]
    pub fn new(db: Arc<TursoClient>, config: HeartbeatConfig, event_bus: EventBus) -> Self {
        Self { overlays: RwLock::new(HashMap::new()), db, config, event_bus }
    }

    /// Processes one heartbeat: resolve-or-create the overlay, update
    /// counters and resource statuses, derive health, persist, emit
    /// events.
    #[instrument(skip(self, heartbeat, resource_states))]
    pub async fn on_heartbeat(
        &self,
        heartbeat: Heartbeat,
        resource_states: HashMap<Uuid, GpuRuntimeState>,
    ) -> Result<HeartbeatOutcome, OrchestratorError> {
        let now = Utc::now();
        let provider_id = heartbeat.provider_id;

        let prior_health = {
            let overlays = self.overlays.read();
            overlays.get(&provider_id).map(|o| o.derived_health)
        };

        let error_ratio = if resource_states.is_empty() {
            0.0
        } else {
            resource_states.values().filter(|s| matches!(s, GpuRuntimeState::Error)).count() as f64
                / resource_states.len() as f64
        };

        let derived_health = {
            let mut overlays = self.overlays.write();
            let overlay = overlays
                .entry(provider_id)
                .or_insert_with(|| ProviderOverlay::fresh(now, self.config.interval()));

            overlay.last_heartbeat_at = now;
            overlay.next_expected_at = now
                + chrono::Duration::from_std(self.config.interval()).unwrap_or_default();
            overlay.consecutive_successful += 1;
            overlay.consecutive_failed = 0;

            if overlay.response_time_samples.len() >= self.config.response_time_sample_size {
                overlay.response_time_samples.pop_front();
            }
            overlay.response_time_samples.push_back(heartbeat.round_trip_ms);

            for (gpu_id, state) in &resource_states {
                overlay.resource_states.insert(*gpu_id, *state);
            }

            let derived = derive_health(heartbeat.reported_health, false, overlay.consecutive_failed, error_ratio, &self.config);
            overlay.derived_health = derived;
            derived
        };

        let connection = self.db.get_connection()?;
        HeartbeatRepository::new(&connection).record(&heartbeat).await?;

        let mut provider = ProviderRepository::new(&connection).get_by_id(provider_id).await?;
        provider.last_heartbeat_at = Some(now);
        provider.health_state = derived_health;
        ProviderRepository::new(&connection).update_with_version(&provider).await?;

        self.event_bus.publish(InventoryEvent::HeartbeatReceived {
            provider_id,
            round_trip_ms: heartbeat.round_trip_ms,
        });

        if prior_health != Some(derived_health) {
            self.event_bus.publish(InventoryEvent::ProviderStatusChanged {
                provider_id,
                old_health: prior_health.unwrap_or(HealthState::Unknown),
                new_health: derived_health,
            });
        }

        for gpu_id in resource_states.keys() {
            self.event_bus.publish(InventoryEvent::ResourceChanged { provider_id, gpu_id: *gpu_id });
        }

        let mut warnings = Vec::new();
        if heartbeat.system_metrics.cpu_percent > self.config.cpu_percent_watermark {
            self.event_bus.publish(InventoryEvent::ThresholdExceeded {
                provider_id,
                gpu_id: None,
                metric: "cpu_percent".to_string(),
                value: f64::from(heartbeat.system_metrics.cpu_percent),
                threshold: f64::from(self.config.cpu_percent_watermark),
            });
            warnings.push(format!("cpu utilization above {}%", self.config.cpu_percent_watermark));
        }

        Ok(HeartbeatOutcome { next_interval_seconds: self.config.default_interval_seconds, warnings })
    }

    #[must_use]
    pub fn overlay_for(&self, provider_id: Uuid) -> Option<ProviderOverlay> {
        self.overlays.read().get(&provider_id).cloned()
    }

    /// Missed-heartbeat sweeper: for every overlay whose next-expected
    /// timestamp has passed, increments `consecutive_failed`; at
    /// `max_missed` transitions the provider to unreachable and emits
    /// `connection-lost`.
    #[instrument(skip(self))]
    pub async fn sweep_missed_heartbeats(&self) -> Result<(), OrchestratorError> {
        let now = Utc::now();
        let mut newly_unreachable = Vec::new();

        {
            let mut overlays = self.overlays.write();
            for (provider_id, overlay) in overlays.iter_mut() {
                if overlay.next_expected_at < now {
                    overlay.consecutive_failed += 1;
                    overlay.consecutive_successful = 0;
                    if overlay.consecutive_failed >= u64::from(self.config.max_missed)
                        && overlay.derived_health != HealthState::Unreachable
                    {
                        overlay.derived_health = HealthState::Unreachable;
                        newly_unreachable.push((*provider_id, overlay.last_heartbeat_at));
                    }
                }
            }
        }

        for (provider_id, last_seen_at) in newly_unreachable {
            self.event_bus.publish(InventoryEvent::ConnectionLost { provider_id, last_seen_at });

            if let Ok(connection) = self.db.get_connection() {
                if let Ok(mut provider) = ProviderRepository::new(&connection).get_by_id(provider_id).await {
                    provider.health_state = HealthState::Unreachable;
                    if let Err(err) = ProviderRepository::new(&connection).update_with_version(&provider).await {
                        warn!(%provider_id, %err, "failed to persist unreachable status after sweep");
                    }
                }
            }
        }

        Ok(())
    }
}

/// First-match-wins health derivation:
/// reporter-unhealthy > time-since-heartbeat-unreachable (handled by the
/// sweeper, not here) > max-missed-unhealthy > majority-resources-in-error
/// > reporter's own status.
fn derive_health(
    reported: HealthState,
    time_since_heartbeat_exceeds_unreachable_threshold: bool,
    consecutive_failed: u64,
    resource_error_ratio: f64,
    config: &HeartbeatConfig,
) -> HealthState {
    if reported == HealthState::Unhealthy {
        return HealthState::Unhealthy;
    }
    if time_since_heartbeat_exceeds_unreachable_threshold {
        return HealthState::Unreachable;
    }
    if consecutive_failed >= u64::from(config.max_missed) {
        return HealthState::Unhealthy;
    }
    if resource_error_ratio > 0.5 {
        return HealthState::Unhealthy;
    }
    reported
}

/// Background task: ticks every `sweep_interval_seconds` and runs the
/// missed-heartbeat detector.
pub async fn spawn_missed_heartbeat_sweeper(monitor: Arc<HeartbeatMonitor>, config: Arc<Config>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(config.heartbeat.sweep_interval_seconds));
    tokio::spawn(async move {
        loop {
            ticker.tick().await;
            if let Err(err) = monitor.sweep_missed_heartbeats().await {
                warn!(%err, "missed-heartbeat sweep failed");
            }
        }
    });
}

/// Background task: ticks every `cleanup_interval_seconds` and purges
/// heartbeat/usage-metric rows past the store's configured retention
/// horizon.
pub async fn spawn_retention_sweeper(db: Arc<TursoClient>, config: Arc<Config>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(config.heartbeat.cleanup_interval_seconds));
    tokio::spawn(async move {
        loop {
            ticker.tick().await;
            match db.get_connection() {
                Ok(connection) => {
                    if let Err(err) = sweep_once(&connection, config.store.retention_policy()).await {
                        warn!(%err, "retention sweep failed");
                    }
                }
                Err(err) => warn!(%err, "could not acquire connection for retention sweep"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> HeartbeatConfig {
        HeartbeatConfig::default()
    }

    #[test]
    fn reporter_unhealthy_wins_regardless_of_other_signals() {
        let health = derive_health(HealthState::Unhealthy, false, 0, 0.0, &cfg());
        assert_eq!(health, HealthState::Unhealthy);
    }

    #[test]
    fn max_missed_threshold_forces_unhealthy() {
        let config = cfg();
        let health = derive_health(HealthState::Healthy, false, u64::from(config.max_missed), 0.0, &config);
        assert_eq!(health, HealthState::Unhealthy);
    }

    #[test]
    fn majority_resources_in_error_forces_unhealthy() {
        let health = derive_health(HealthState::Healthy, false, 0, 0.6, &cfg());
        assert_eq!(health, HealthState::Unhealthy);
    }

    #[test]
    fn otherwise_reporter_status_is_trusted() {
        let health = derive_health(HealthState::Degraded, false, 0, 0.1, &cfg());
        assert_eq!(health, HealthState::Degraded);
    }
}
