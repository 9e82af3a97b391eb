// [apps/orchestrator/src/services/rebalancer.rs]
/*!
 * Detects skew between providers' idle-capacity ratios and migrates a
 * running allocation from an over-subscribed provider to an
 * under-subscribed one through a shadow-allocation protocol: a new
 * allocation is admitted on the target before the source is released,
 * so a failed migration never leaves the consumer without capacity
 *.
 */

use std::sync::Arc;
use std::time::Duration;

use nebula_domain_models::{Allocation, AllocationStatus, Provider};
use nebula_infra_db::repositories::{AllocationRepository, ProviderRepository};
use nebula_infra_db::TursoClient;
use tracing::{instrument, warn};

use crate::config::Config;
use crate::errors::OrchestratorError;
use crate::services::allocator::Allocator;

/// Fraction-point gap between the busiest and idlest provider's
/// idle-capacity ratio that triggers a migration attempt.
const IMBALANCE_THRESHOLD: f64 = 0.4;

pub struct Rebalancer {
    db: Arc<TursoClient>,
    allocator: Arc<Allocator>,
}

impl Rebalancer {
    #[must_use]
    pub fn new(db: Arc<TursoClient>, allocator: Arc<Allocator>) -> Self {
        Self { db, allocator }
    }

    /// Returns `true` when a migration was attempted (successfully or
    /// not) so the caller's loop can log a concrete outcome.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<bool, OrchestratorError> {
        let connection = self.db.get_connection()?;
        let providers = ProviderRepository::new(&connection).list_active(None, 10_000).await?.items;

        let (busiest, idlest) = match pick_imbalanced_pair(&providers) {
            Some(pair) => pair,
            None => return Ok(false),
        };

        let running = AllocationRepository::new(&connection).list_by_status(AllocationStatus::Running).await?;
        let migratable = running
            .into_iter()
            .find(|a| a.provider_id == Some(busiest.id) && a.preemption_allowed);

        let allocation = match migratable {
            Some(a) => a,
            None => return Ok(false),
        };

        self.migrate(allocation, idlest).await?;
        Ok(true)
    }

    /// Shadow-allocation migration: admit a replacement on `target`
    /// first; only release the source once the replacement has
    /// successfully claimed a gpu. A failed placement on `target`
    /// leaves the original allocation untouched.
    async fn migrate(&self, source: Allocation, target: Provider) -> Result<(), OrchestratorError> {
        let shadow = Allocation::new_requested(source.consumer_id, source.requirements.clone());
        let connection = self.db.get_connection()?;
        AllocationRepository::new(&connection).create(&shadow).await?;

        match self.allocator.try_place(shadow.clone(), vec![target]).await? {
            Some(_placed) => {
                self.allocator.release(source, AllocationStatus::Preempted).await?;
                Ok(())
            }
            None => {
                warn!(allocation_id = %source.id, "rebalance migration could not place shadow allocation, rolling back");
                let mut rollback = shadow;
                rollback.try_transition(AllocationStatus::Cancelled);
                AllocationRepository::new(&connection).update_with_version(&rollback).await?;
                Ok(())
            }
        }
    }
}

fn pick_imbalanced_pair(providers: &[Provider]) -> Option<(Provider, Provider)> {
    let mut ratios: Vec<(Provider, f64)> = providers
        .iter()
        .filter(|p| p.is_placement_eligible() && p.resource_summary.total_gpus > 0)
        .map(|p| {
            let ratio = f64::from(p.resource_summary.idle_gpus) / f64::from(p.resource_summary.total_gpus);
            (p.clone(), ratio)
        })
        .collect();

    if ratios.len() < 2 {
        return None;
    }

    ratios.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    let (busiest, busiest_ratio) = ratios.first().cloned()?;
    let (idlest, idlest_ratio) = ratios.last().cloned()?;

    if idlest_ratio - busiest_ratio >= IMBALANCE_THRESHOLD {
        Some((busiest, idlest))
    } else {
        None
    }
}

/// Background task: ticks on a fixed interval derived from the
/// placement timeout and runs one rebalancing pass.
pub async fn spawn_rebalancer_loop(rebalancer: Arc<Rebalancer>, config: Arc<Config>) {
    let interval = Duration::from_secs(config.scheduler.placement_timeout_seconds * 6);
    let mut ticker = tokio::time::interval(interval);
    tokio::spawn(async move {
        loop {
            ticker.tick().await;
            if let Err(err) = rebalancer.run_once().await {
                warn!(%err, "rebalance pass failed");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_domain_models::{AuthMaterial, ResourceSummary};

    fn provider_with_ratio(idle: u32, total: u32) -> Provider {
        let mut provider = Provider::new_pending(
            "p".to_string(),
            "p@example.com".to_string(),
            "org".to_string(),
            AuthMaterial { salted_key_digest: "x".to_string(), public_key: "y".to_string() },
            Vec::new(),
        );
        provider.registration_state = nebula_domain_models::RegistrationState::Active;
        provider.health_state = nebula_domain_models::HealthState::Healthy;
        provider.resource_summary = ResourceSummary { total_gpus: total, idle_gpus: idle, busy_gpus: total - idle, offline_gpus: 0, total_memory_mb: 0 };
        provider
    }

    #[test]
    fn imbalanced_pair_is_detected_above_threshold() {
        let providers = vec![provider_with_ratio(0, 10), provider_with_ratio(9, 10)];
        let pair = pick_imbalanced_pair(&providers);
        assert!(pair.is_some());
    }

    #[test]
    fn balanced_providers_are_not_flagged() {
        let providers = vec![provider_with_ratio(5, 10), provider_with_ratio(6, 10)];
        let pair = pick_imbalanced_pair(&providers);
        assert!(pair.is_none());
    }
}
