// [apps/orchestrator/src/services/queue.rs]
//! Queueing disciplines for the admitted-but-unplaced request backlog.
//! Each workload class (the request's `PriorityClass`) selects its
//! discipline by configuration rather than hardcoded order — this
//! module only orders a slice; the Scheduler still drains classes
//! highest-priority first, each ordered internally by its own
//! discipline.

use std::collections::HashMap;

use nebula_domain_models::{Allocation, PriorityClass};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A supported queue discipline. `serde`-tagged so it can be set per
/// `PriorityClass` in `orchestrator.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueDiscipline {
    /// First submitted, first served.
    Fifo,
    /// Smallest declared memory footprint first — a cheap proxy for
    /// "shortest job" absent a real runtime estimate.
    ShortestJobFirst,
    /// Nearest `deadline_seconds` first; requests with no deadline sort
    /// after every request that declared one.
    EarliestDeadlineFirst,
    /// Orders by each consumer's deficit against their priority-weight
    /// fair share of already-running allocations — the consumer
    /// furthest behind their entitlement goes first.
    WeightedFairShare,
}

/// Per-`PriorityClass` discipline assignment. Defaults to FIFO for
/// every class except `Critical`, which defaults to earliest-deadline
/// to honor latency-sensitive submissions ahead of raw arrival order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueDisciplineConfig {
    pub low: QueueDiscipline,
    pub normal: QueueDiscipline,
    pub high: QueueDiscipline,
    pub critical: QueueDiscipline,
}

impl Default for QueueDisciplineConfig {
    fn default() -> Self {
        Self {
            low: QueueDiscipline::Fifo,
            normal: QueueDiscipline::Fifo,
            high: QueueDiscipline::ShortestJobFirst,
            critical: QueueDiscipline::EarliestDeadlineFirst,
        }
    }
}

impl QueueDisciplineConfig {
    #[must_use]
    pub fn for_class(&self, class: PriorityClass) -> QueueDiscipline {
        match class {
            PriorityClass::Low => self.low,
            PriorityClass::Normal => self.normal,
            PriorityClass::High => self.high,
            PriorityClass::Critical => self.critical,
        }
    }
}

/// Orders `queued` in place per `discipline`. `running_counts` feeds
/// the weighted-fair-share discipline only; other disciplines ignore
/// it. Ties always fall back to `requested_at` so ordering never
/// depends on the slice's incoming order.
pub fn order_by_discipline(
    queued: &mut [Allocation],
    discipline: QueueDiscipline,
    running_counts: &HashMap<Uuid, u32>,
) {
    match discipline {
        QueueDiscipline::Fifo => {
            queued.sort_by_key(|a| a.requested_at);
        }
        QueueDiscipline::ShortestJobFirst => {
            queued.sort_by(|a, b| {
                a.requirements
                    .min_memory_mb
                    .cmp(&b.requirements.min_memory_mb)
                    .then(a.requested_at.cmp(&b.requested_at))
            });
        }
        QueueDiscipline::EarliestDeadlineFirst => {
            queued.sort_by(|a, b| {
                match (a.requirements.deadline_seconds, b.requirements.deadline_seconds) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                }
                .then(a.requested_at.cmp(&b.requested_at))
            });
        }
        QueueDiscipline::WeightedFairShare => {
            queued.sort_by(|a, b| {
                fair_share_deficit(a, running_counts)
                    .partial_cmp(&fair_share_deficit(b, running_counts))
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.requested_at.cmp(&b.requested_at))
            });
        }
    }
}

/// Lower is served first: a consumer with many running allocations
/// relative to their priority weight has a small (or negative)
/// deficit and waits behind consumers who have received less than
/// their entitled share.
fn fair_share_deficit(allocation: &Allocation, running_counts: &HashMap<Uuid, u32>) -> f64 {
    let running = f64::from(running_counts.get(&allocation.consumer_id).copied().unwrap_or(0));
    let weight = f64::from(allocation.priority.weight());
    running / weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_domain_models::JobRequirements;

    fn allocation_with(memory_mb: u64, deadline: Option<u64>, priority: PriorityClass, consumer_id: Uuid) -> Allocation {
        Allocation::new_requested(
            consumer_id,
            JobRequirements { min_memory_mb: memory_mb, deadline_seconds: deadline, priority, ..JobRequirements::default() },
        )
    }

    #[test]
    fn shortest_job_first_orders_by_memory_footprint() {
        let mut queued = vec![
            allocation_with(80_000, None, PriorityClass::Normal, Uuid::new_v4()),
            allocation_with(8_000, None, PriorityClass::Normal, Uuid::new_v4()),
        ];
        order_by_discipline(&mut queued, QueueDiscipline::ShortestJobFirst, &HashMap::new());
        assert_eq!(queued[0].requirements.min_memory_mb, 8_000);
    }

    #[test]
    fn earliest_deadline_first_orders_declared_deadlines_before_none() {
        let mut queued = vec![
            allocation_with(8_000, None, PriorityClass::Normal, Uuid::new_v4()),
            allocation_with(8_000, Some(30), PriorityClass::Normal, Uuid::new_v4()),
        ];
        order_by_discipline(&mut queued, QueueDiscipline::EarliestDeadlineFirst, &HashMap::new());
        assert_eq!(queued[0].requirements.deadline_seconds, Some(30));
    }

    #[test]
    fn weighted_fair_share_prefers_consumer_with_less_running_work() {
        let starved = Uuid::new_v4();
        let saturated = Uuid::new_v4();
        let mut queued = vec![
            allocation_with(8_000, None, PriorityClass::Normal, saturated),
            allocation_with(8_000, None, PriorityClass::Normal, starved),
        ];
        let mut running_counts = HashMap::new();
        running_counts.insert(saturated, 10);
        running_counts.insert(starved, 0);
        order_by_discipline(&mut queued, QueueDiscipline::WeightedFairShare, &running_counts);
        assert_eq!(queued[0].consumer_id, starved);
    }

    #[test]
    fn fifo_falls_back_to_requested_at_order() {
        let mut queued = vec![
            allocation_with(8_000, None, PriorityClass::Normal, Uuid::new_v4()),
            allocation_with(8_000, None, PriorityClass::Normal, Uuid::new_v4()),
        ];
        queued[1].requested_at = queued[0].requested_at - chrono::Duration::seconds(10);
        order_by_discipline(&mut queued, QueueDiscipline::Fifo, &HashMap::new());
        assert!(queued[0].requested_at <= queued[1].requested_at);
    }
}
