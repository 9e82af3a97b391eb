// [apps/orchestrator/src/services/preemption.rs]
/*!
 * Preemption candidate selection: when the scheduler cannot place a
 * high-priority request against idle capacity, it asks this module
 * for the least-valuable running allocation it may evict instead
 *. Rate caps bound how disruptive a single scheduling
 * pass can be.
 */

use nebula_domain_models::{Allocation, AllocationStatus, PriorityClass};
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::SchedulerConfig;

/// A running allocation eligible for preemption, paired with the
/// score used to rank it against other candidates (lower is evicted
/// first).
#[derive(Debug, Clone)]
pub struct PreemptionCandidate {
    pub allocation: Allocation,
    pub score: f64,
}

/// Selects the lowest-scoring running, preemption-allowed allocation
/// whose priority is at least `preemption_priority_margin` below the
/// incoming request's, respecting the per-provider and per-consumer
/// rate caps already spent in this scheduling pass.
#[must_use]
pub fn select_candidate(
    running: &[Allocation],
    incoming_priority: PriorityClass,
    provider_spend: &HashMap<Uuid, u32>,
    consumer_spend: &HashMap<Uuid, u32>,
    config: &SchedulerConfig,
) -> Option<PreemptionCandidate> {
    let mut best: Option<PreemptionCandidate> = None;

    for allocation in running {
        if allocation.status != AllocationStatus::Running || !allocation.preemption_allowed {
            continue;
        }

        let priority_gap = incoming_priority.weight() as i64 - allocation.priority.weight() as i64;
        if priority_gap < i64::from(config.preemption_priority_margin) {
            continue;
        }

        if let Some(provider_id) = allocation.provider_id {
            if provider_spend.get(&provider_id).copied().unwrap_or(0) >= config.preemption_rate_cap_per_provider {
                continue;
            }
        }
        if consumer_spend.get(&allocation.consumer_id).copied().unwrap_or(0) >= config.preemption_rate_cap_per_consumer {
            continue;
        }

        let score = allocation.priority.weight() as f64;
        let is_better = match &best {
            Some(current) => score < current.score,
            None => true,
        };
        if is_better {
            best = Some(PreemptionCandidate { allocation: allocation.clone(), score });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_domain_models::JobRequirements;

    fn running_allocation(priority: PriorityClass, preemptible: bool) -> Allocation {
        let mut allocation = Allocation::new_requested(
            Uuid::new_v4(),
            JobRequirements { priority, ..JobRequirements::default() },
        );
        allocation.preemption_allowed = preemptible;
        allocation.try_transition(AllocationStatus::Admitted);
        allocation.try_transition(AllocationStatus::Allocated);
        allocation.try_transition(AllocationStatus::Running);
        allocation
    }

    #[test]
    fn non_preemptible_allocations_are_never_selected() {
        let running = vec![running_allocation(PriorityClass::Low, false)];
        let config = SchedulerConfig::default();
        let selected = select_candidate(&running, PriorityClass::Critical, &HashMap::new(), &HashMap::new(), &config);
        assert!(selected.is_none());
    }

    #[test]
    fn priority_margin_must_be_met_before_eviction() {
        let running = vec![running_allocation(PriorityClass::Normal, true)];
        let config = SchedulerConfig::default();
        let selected = select_candidate(&running, PriorityClass::High, &HashMap::new(), &HashMap::new(), &config);
        assert!(selected.is_none());
    }

    #[test]
    fn sufficient_margin_selects_lowest_priority_candidate() {
        let running = vec![running_allocation(PriorityClass::Low, true)];
        let config = SchedulerConfig::default();
        let selected = select_candidate(&running, PriorityClass::Critical, &HashMap::new(), &HashMap::new(), &config);
        assert!(selected.is_some());
    }
}
