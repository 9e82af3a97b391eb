// [apps/orchestrator/src/services/allocator.rs]
/*!
 * Admission control and transactional commit for allocation requests.
 * Builds a candidate set from available, consumable gpus, ranks it
 * through `nebula-core-matching`, then commits the top candidate with
 * optimistic-concurrency retry against the gpu's version column
 *.
 */

use std::sync::Arc;

use chrono::Utc;
use nebula_core_matching::prelude::{place, rank_candidates, MatchCandidate, PlacementAlgorithm};
use nebula_domain_models::{
    Allocation, AllocationBinding, AllocationStatus, GpuResource, GpuRuntimeState, InventoryEvent,
    JobRequirements, Provider,
};
use nebula_infra_db::repositories::{AllocationRepository, GpuRepository, VerificationRepository};
use nebula_infra_db::{DbError, TursoClient};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::config::{MatcherConfig, SchedulerConfig};
use crate::errors::OrchestratorError;
use crate::services::event_bus::EventBus;

pub struct Allocator {
    db: Arc<TursoClient>,
    matcher: MatcherConfig,
    scheduler: SchedulerConfig,
    event_bus: EventBus,
}

impl Allocator {
    #[must_use]
    pub fn new(db: Arc<TursoClient>, matcher: MatcherConfig, scheduler: SchedulerConfig, event_bus: EventBus) -> Self {
        Self { db, matcher, scheduler, event_bus }
    }

    /// Registers a new allocation request in the `Requested` state.
    #[instrument(skip(self, requirements))]
    pub async fn submit(
        &self,
        consumer_id: Uuid,
        requirements: JobRequirements,
    ) -> Result<Allocation, OrchestratorError> {
        let allocation = Allocation::new_requested(consumer_id, requirements);
        let connection = self.db.get_connection()?;
        AllocationRepository::new(&connection).create(&allocation).await?;
        Ok(allocation)
    }

    /// Attempts to place one `Requested` allocation against eligible
    /// providers' available gpus using `algorithm` to pick among the
    /// matcher's ranked candidates. Returns `Ok(None)` when no eligible
    /// candidate exists — a placement-timeout clock starts ticking on
    /// the caller's side, not here.
    #[instrument(skip(self, allocation, eligible_providers))]
    pub async fn try_place_with_algorithm(
        &self,
        mut allocation: Allocation,
        eligible_providers: Vec<Provider>,
        algorithm: PlacementAlgorithm,
    ) -> Result<Option<Allocation>, OrchestratorError> {
        let connection = self.db.get_connection()?;
        let mut candidates = Vec::new();
        let mut candidate_gpus: std::collections::HashMap<Uuid, GpuResource> = std::collections::HashMap::new();

        for provider in &eligible_providers {
            if !provider.is_placement_eligible() {
                continue;
            }
            let gpus = GpuRepository::new(&connection).list_available_for_provider(provider.id).await?;
            for gpu in gpus {
                if gpu.runtime_state != GpuRuntimeState::Idle {
                    continue;
                }
                let performance_score = if gpu.verification_state.is_consumable_at(Utc::now()) {
                    VerificationRepository::new(&connection)
                        .latest_for_gpu(gpu.id)
                        .await?
                        .map_or(0.0, |v| v.assessment.overall_score)
                } else {
                    0.0
                };
                candidates.push(to_match_candidate(provider, &gpu, performance_score));
                candidate_gpus.insert(gpu.id, gpu);
            }
        }

        let mut ranked = rank_candidates(&candidates, &allocation.requirements, self.matcher.weights, false);

        // Each algorithm gets one shot at the ranked list; if its pick
        // loses the optimistic-concurrency race, fall through to plain
        // rank order for the remaining candidates rather than re-run
        // the (potentially expensive) algorithm repeatedly.
        while let Some(gpu_id) = place(&ranked, &candidates, algorithm) {
            let gpu = match candidate_gpus.remove(&gpu_id) {
                Some(gpu) => gpu,
                None => {
                    ranked.retain(|c| c.gpu_id != gpu_id);
                    continue;
                }
            };

            match self.commit(&connection, &mut allocation, gpu).await {
                Ok(()) => {
                    self.event_bus.publish(InventoryEvent::AllocationAdmitted {
                        allocation_id: allocation.id,
                        consumer_id: allocation.consumer_id,
                    });
                    return Ok(Some(allocation));
                }
                Err(OrchestratorError::Conflict(_)) => {
                    warn!(gpu_id = %gpu_id, "lost commit race for candidate, trying next");
                    ranked.retain(|c| c.gpu_id != gpu_id);
                    continue;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(None)
    }

    /// Convenience wrapper over [`Self::try_place_with_algorithm`] using
    /// the default greedy best-fit algorithm — used by callers (tests,
    /// the rebalancer's shadow allocation) that have no load-sensitive
    /// algorithm selection of their own to make.
    pub async fn try_place(
        &self,
        allocation: Allocation,
        eligible_providers: Vec<Provider>,
    ) -> Result<Option<Allocation>, OrchestratorError> {
        self.try_place_with_algorithm(allocation, eligible_providers, PlacementAlgorithm::GreedyBestFit).await
    }

    /// Commits a winning candidate under optimistic concurrency:
    /// claims the gpu (binding it to this allocation) and transitions
    /// the allocation to `Allocated`, retrying the whole pair up to
    /// `max_commit_retries` times when the gpu's version has moved.
    async fn commit(
        &self,
        connection: &libsql::Connection,
        allocation: &mut Allocation,
        mut gpu: GpuResource,
    ) -> Result<(), OrchestratorError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            gpu.binding = Some(AllocationBinding {
                consumer_id: allocation.consumer_id,
                allocation_id: allocation.id,
                started_at: Utc::now(),
            });
            gpu.runtime_state = GpuRuntimeState::Busy;

            match GpuRepository::new(connection).update_with_version(&gpu).await {
                Ok(()) => break,
                Err(DbError::VersionConflict { .. }) if attempts < self.scheduler.max_commit_retries => {
                    gpu = GpuRepository::new(connection).get_by_id(gpu.id).await?;
                    if gpu.binding.is_some() || gpu.runtime_state != GpuRuntimeState::Idle {
                        return Err(OrchestratorError::Conflict(format!("gpu {} already claimed", gpu.id)));
                    }
                    continue;
                }
                Err(DbError::VersionConflict { entity, id }) => {
                    return Err(OrchestratorError::Conflict(format!("{entity} {id} exhausted commit retries")));
                }
                Err(err) => return Err(err.into()),
            }
        }

        if !allocation.try_transition(AllocationStatus::Admitted) {
            return Err(OrchestratorError::Precondition(format!(
                "allocation {} cannot transition from {:?} to admitted",
                allocation.id, allocation.status
            )));
        }
        if !allocation.try_transition(AllocationStatus::Allocated) {
            return Err(OrchestratorError::Precondition(format!(
                "allocation {} cannot transition to allocated",
                allocation.id
            )));
        }
        allocation.provider_id = Some(gpu.provider_id);
        allocation.gpu_id = Some(gpu.id);

        AllocationRepository::new(connection).update_with_version(allocation).await?;
        Ok(())
    }

    /// Releases a gpu binding and marks the allocation completed,
    /// used both for normal teardown and after a cancel request.
    #[instrument(skip(self, allocation))]
    pub async fn release(&self, mut allocation: Allocation, next_status: AllocationStatus) -> Result<Allocation, OrchestratorError> {
        let connection = self.db.get_connection()?;

        if let Some(gpu_id) = allocation.gpu_id {
            let mut gpu = GpuRepository::new(&connection).get_by_id(gpu_id).await?;
            gpu.binding = None;
            gpu.runtime_state = GpuRuntimeState::Idle;
            GpuRepository::new(&connection).update_with_version(&gpu).await?;
        }

        if !allocation.try_transition(next_status) {
            return Err(OrchestratorError::Precondition(format!(
                "allocation {} cannot transition from {:?} to {next_status:?}",
                allocation.id, allocation.status
            )));
        }
        AllocationRepository::new(&connection).update_with_version(&allocation).await?;

        self.event_bus.publish(InventoryEvent::AllocationCompleted {
            allocation_id: allocation.id,
            status: format!("{:?}", allocation.status).to_lowercase(),
        });

        Ok(allocation)
    }
}

fn to_match_candidate(provider: &Provider, gpu: &GpuResource, performance_score: f64) -> MatchCandidate {
    MatchCandidate {
        gpu_id: gpu.id,
        provider_id: provider.id,
        memory_mb: gpu.specs.total_memory_mb,
        supported_precisions: gpu.capabilities.supported_precisions.clone(),
        supported_apis: gpu.capabilities.supported_apis.clone(),
        supports_tensor_ops: gpu.capabilities.supports_tensor_ops,
        performance_score,
        provider_uptime_percent: provider.reliability.rolling_uptime_percent,
        consecutive_failed: provider.reliability.consecutive_failed,
        utilization_percent: gpu.live_metrics.utilization_percent,
        region: provider.region.clone(),
        tags: provider.tags.clone(),
        cost_per_hour: None,
        stable_hash: stable_hash(gpu.id),
        verification_consumable: gpu.verification_state.is_consumable_at(Utc::now()),
    }
}

fn stable_hash(id: Uuid) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    id.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_hash_is_deterministic_for_same_id() {
        let id = Uuid::new_v4();
        assert_eq!(stable_hash(id), stable_hash(id));
    }
}
