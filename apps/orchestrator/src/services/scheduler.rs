// [apps/orchestrator/src/services/scheduler.rs]
/*!
 * Drains the `Requested` queue in priority order and hands each entry
 * to the allocator. Falling back to preemption when no idle capacity
 * satisfies a request. Runs as a background loop
 * ticking at a fixed cadence rather than per-request, so a burst of
 * submissions is absorbed by one pass instead of N races.
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use nebula_core_matching::prelude::{select_algorithm, JobCharacteristics};
use nebula_domain_models::{Allocation, AllocationStatus, GpuRuntimeState, InventoryEvent, PriorityClass, Provider};
use nebula_infra_db::repositories::{AllocationRepository, GpuRepository, ProviderRepository};
use nebula_infra_db::TursoClient;
use tracing::{instrument, warn};

use crate::config::{Config, SchedulerConfig};
use crate::services::allocator::Allocator;
use crate::services::event_bus::EventBus;
use crate::services::preemption;
use crate::services::queue::order_by_discipline;

pub struct Scheduler {
    db: Arc<TursoClient>,
    allocator: Arc<Allocator>,
    config: SchedulerConfig,
    event_bus: EventBus,
}

impl Scheduler {
    #[must_use]
    pub fn new(db: Arc<TursoClient>, allocator: Arc<Allocator>, config: SchedulerConfig, event_bus: EventBus) -> Self {
        Self { db, allocator, config, event_bus }
    }

    /// One scheduling pass: groups queued requests by `PriorityClass`,
    /// orders each class internally by its configured queue discipline,
    /// then drains classes highest-priority first — each request tries
    /// direct placement under an algorithm chosen from cluster load and
    /// the request's own characteristics, falling back to preemption
    /// when no idle capacity satisfies it.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<usize, crate::errors::OrchestratorError> {
        let connection = self.db.get_connection()?;
        let queued = AllocationRepository::new(&connection).list_by_status(AllocationStatus::Requested).await?;

        if queued.len() > self.config.queue_depth_watermark {
            warn!(depth = queued.len(), watermark = self.config.queue_depth_watermark, "queue depth watermark exceeded");
        }

        let providers = ProviderRepository::new(&connection).list_active(None, 10_000).await?.items;
        let running = AllocationRepository::new(&connection).list_by_status(AllocationStatus::Running).await?;
        let running_counts = running_counts_by_consumer(&running);
        let cluster_utilization = cluster_utilization_percent(&providers);

        let mut by_class: HashMap<PriorityClass, Vec<Allocation>> = HashMap::new();
        for allocation in queued {
            by_class.entry(allocation.priority).or_default().push(allocation);
        }

        let mut placed = 0;
        let mut provider_preemption_spend: HashMap<uuid::Uuid, u32> = HashMap::new();
        let mut consumer_preemption_spend: HashMap<uuid::Uuid, u32> = HashMap::new();

        for class in [PriorityClass::Critical, PriorityClass::High, PriorityClass::Normal, PriorityClass::Low] {
            let Some(mut class_queue) = by_class.remove(&class) else { continue };
            let discipline = self.config.queue_discipline.for_class(class);
            order_by_discipline(&mut class_queue, discipline, &running_counts);

            for allocation in class_queue {
                let job = JobCharacteristics {
                    has_cost_budget: allocation.requirements.max_cost_per_hour.is_some(),
                    requires_tensor_units: allocation.requirements.requires_tensor_units,
                    candidate_count: providers.len(),
                };
                let algorithm = select_algorithm(job, cluster_utilization, self.config.algorithm_selection);

                match self.allocator.try_place_with_algorithm(allocation.clone(), providers.clone(), algorithm).await? {
                    Some(_) => {
                        placed += 1;
                        continue;
                    }
                    None => {
                        if let Some(preempted) = self
                            .try_preempt_for(&allocation, &mut provider_preemption_spend, &mut consumer_preemption_spend)
                            .await?
                        {
                            if let Some(provider_id) = preempted.provider_id {
                                *provider_preemption_spend.entry(provider_id).or_insert(0) += 1;
                            }
                            *consumer_preemption_spend.entry(preempted.consumer_id).or_insert(0) += 1;
                        }
                    }
                }
            }
        }

        Ok(placed)
    }

    /// Picks the best eviction candidate for `allocation` and signals
    /// its preemption. With a zero grace period the gpu is released
    /// and the victim transitioned to `Preempted` synchronously (spec
    /// boundary: "grace = 0 completes synchronously"); otherwise the
    /// drain is given its configured grace period on a detached task
    /// before the same release+transition runs, so this scheduling
    /// pass is never blocked waiting out someone else's grace window.
    async fn try_preempt_for(
        &self,
        allocation: &Allocation,
        provider_spend: &mut HashMap<uuid::Uuid, u32>,
        consumer_spend: &mut HashMap<uuid::Uuid, u32>,
    ) -> Result<Option<Allocation>, crate::errors::OrchestratorError> {
        let connection = self.db.get_connection()?;
        let running = AllocationRepository::new(&connection).list_by_status(AllocationStatus::Running).await?;

        let candidate = match preemption::select_candidate(&running, allocation.priority, provider_spend, consumer_spend, &self.config) {
            Some(candidate) => candidate,
            None => return Ok(None),
        };

        let victim = candidate.allocation;
        let grace = Duration::from_secs(victim.grace_period_seconds);

        if grace.is_zero() {
            let finalized = Self::finalize_preemption(&self.db, &self.event_bus, victim.id).await?;
            return Ok(Some(finalized));
        }

        let db = self.db.clone();
        let event_bus = self.event_bus.clone();
        let allocation_id = victim.id;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Err(err) = Self::finalize_preemption(&db, &event_bus, allocation_id).await {
                warn!(%err, allocation_id = %allocation_id, "delayed preemption finalize failed");
            }
        });

        Ok(Some(victim))
    }

    /// Re-reads the victim allocation fresh (its version may have
    /// moved since selection), releases its gpu binding and transitions
    /// it to `Preempted` — mirrors `Allocator::release`'s gpu-unbind
    /// sequence but keeps its own event so the reaper's incident trail
    /// still carries a preemption reason and gpu id.
    async fn finalize_preemption(
        db: &Arc<TursoClient>,
        event_bus: &EventBus,
        allocation_id: uuid::Uuid,
    ) -> Result<Allocation, crate::errors::OrchestratorError> {
        let connection = db.get_connection()?;
        let mut victim = AllocationRepository::new(&connection).get_by_id(allocation_id).await?;

        if victim.status != AllocationStatus::Running {
            return Ok(victim);
        }

        if let Some(gpu_id) = victim.gpu_id {
            let mut gpu = GpuRepository::new(&connection).get_by_id(gpu_id).await?;
            gpu.binding = None;
            gpu.runtime_state = GpuRuntimeState::Idle;
            GpuRepository::new(&connection).update_with_version(&gpu).await?;
        }

        if !victim.try_transition(AllocationStatus::Preempted) {
            return Err(crate::errors::OrchestratorError::Precondition(format!(
                "allocation {} cannot transition from {:?} to preempted",
                victim.id, victim.status
            )));
        }
        AllocationRepository::new(&connection).update_with_version(&victim).await?;

        if let (Some(provider_id), Some(gpu_id)) = (victim.provider_id, victim.gpu_id) {
            event_bus.publish(InventoryEvent::AllocationPreempted {
                allocation_id: victim.id,
                provider_id,
                gpu_id,
                reason: "higher_priority_request_pending".to_string(),
            });
        }

        Ok(victim)
    }
}

/// Background task: ticks every `placement_timeout_seconds` and runs
/// one scheduling pass.
pub async fn spawn_scheduler_loop(scheduler: Arc<Scheduler>, config: Arc<Config>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(config.scheduler.placement_timeout_seconds));
    tokio::spawn(async move {
        loop {
            ticker.tick().await;
            if let Err(err) = scheduler.run_once().await {
                warn!(%err, "scheduling pass failed");
            }
        }
    });
}

/// How many allocations are currently `Running` per consumer, fed to
/// the weighted-fair-share queue discipline.
fn running_counts_by_consumer(running: &[Allocation]) -> HashMap<uuid::Uuid, u32> {
    let mut counts = HashMap::new();
    for allocation in running {
        *counts.entry(allocation.consumer_id).or_insert(0) += 1;
    }
    counts
}

/// Aggregate busy/total gpu ratio across every placement-eligible
/// provider, expressed as a percentage — the signal `select_algorithm`
/// uses to favor bin-packing under low pressure and greedy best-fit
/// once the cluster is nearly saturated.
fn cluster_utilization_percent(providers: &[Provider]) -> f64 {
    let (busy, total) = providers
        .iter()
        .filter(|p| p.is_placement_eligible())
        .fold((0u64, 0u64), |(busy, total), p| {
            (busy + u64::from(p.resource_summary.busy_gpus), total + u64::from(p.resource_summary.total_gpus))
        });
    if total == 0 {
        0.0
    } else {
        100.0 * busy as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_domain_models::ResourceSummary;

    fn provider_with(busy: u32, total: u32) -> Provider {
        let mut provider = Provider::new_pending(
            "p".into(),
            "p@example.com".into(),
            "org".into(),
            nebula_domain_models::AuthMaterial { salted_key_digest: "x".into(), public_key: "y".into() },
            Vec::new(),
        );
        provider.registration_state = nebula_domain_models::RegistrationState::Active;
        provider.health_state = nebula_domain_models::HealthState::Healthy;
        provider.resource_summary = ResourceSummary { total_gpus: total, busy_gpus: busy, idle_gpus: total - busy, offline_gpus: 0, total_memory_mb: 0 };
        provider
    }

    #[test]
    fn cluster_utilization_averages_across_eligible_providers() {
        let providers = vec![provider_with(5, 10), provider_with(5, 10)];
        assert_eq!(cluster_utilization_percent(&providers), 50.0);
    }

    #[test]
    fn cluster_utilization_is_zero_with_no_capacity() {
        assert_eq!(cluster_utilization_percent(&[]), 0.0);
    }

    #[test]
    fn running_counts_tally_per_consumer() {
        let consumer = uuid::Uuid::new_v4();
        let allocations = vec![
            Allocation::new_requested(consumer, nebula_domain_models::JobRequirements::default()),
            Allocation::new_requested(consumer, nebula_domain_models::JobRequirements::default()),
        ];
        let counts = running_counts_by_consumer(&allocations);
        assert_eq!(counts.get(&consumer), Some(&2));
    }
}
