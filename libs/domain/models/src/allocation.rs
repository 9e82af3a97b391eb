// [libs/domain/models/src/allocation.rs]
/*!
 * =================================================================
 * APARATO: ALLOCATION DOMAIN MODEL (ESTRATO L2)
 * RESPONSABILIDAD: CICLO DE VIDA DEL VINCULO CONSUMIDOR <-> RECURSO
 *
 * El estado de una asignacion progresa monotonamente; ningun manejador
 * escribe jamas una transicion regresiva.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::requirements::{JobRequirements, PriorityClass};

/// Estado de una asignacion. El orden de las variantes refleja el
/// unico camino de avance valido hasta un estado terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    Requested,
    Admitted,
    Allocated,
    Running,
    Completed,
    Failed,
    Preempted,
    Cancelled,
}

impl AllocationStatus {
    /// Estados desde los cuales ya no hay transicion valida.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AllocationStatus::Completed
                | AllocationStatus::Failed
                | AllocationStatus::Preempted
                | AllocationStatus::Cancelled
        )
    }

    /// Verifica que `self -> next` sea un avance valido del estado
    /// maquina: admitted -> allocated -> running ->
    /// (completed | failed | preempted | cancelled). `requested` solo
    /// avanza a `admitted` (o se cancela antes de ser admitido).
    #[must_use]
    pub fn can_transition_to(self, next: AllocationStatus) -> bool {
        use AllocationStatus::*;
        match (self, next) {
            (Requested, Admitted) => true,
            (Requested, Cancelled) => true,
            (Admitted, Allocated) => true,
            (Admitted, Cancelled) => true,
            (Allocated, Running) => true,
            (Allocated, Cancelled) => true,
            (Allocated, Preempted) => true,
            (Running, Completed) => true,
            (Running, Failed) => true,
            (Running, Preempted) => true,
            (Running, Cancelled) => true,
            _ => false,
        }
    }
}

/// Entidad raiz Allocation: el vinculo entre un trabajo de consumidor
/// y un recurso de GPU con un ciclo de vida definido.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: Uuid,
    pub consumer_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub gpu_id: Option<Uuid>,
    pub requirements: JobRequirements,
    pub status: AllocationStatus,
    pub priority: PriorityClass,
    pub grace_period_seconds: u64,
    pub preemption_allowed: bool,
    pub requested_at: DateTime<Utc>,
    pub allocated_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub expected_end_at: Option<DateTime<Utc>>,
    pub actual_end_at: Option<DateTime<Utc>>,
    pub configuration: serde_json::Value,
    pub version: i64,
}

impl Allocation {
    /// Construye una solicitud recien sometida, aun sin candidato.
    #[must_use]
    pub fn new_requested(consumer_id: Uuid, requirements: JobRequirements) -> Self {
        let priority = requirements.priority;
        let preemption_allowed = requirements.preemption_allowed;
        Self {
            id: Uuid::new_v4(),
            consumer_id,
            provider_id: None,
            gpu_id: None,
            requirements,
            status: AllocationStatus::Requested,
            priority,
            grace_period_seconds: 30,
            preemption_allowed,
            requested_at: Utc::now(),
            allocated_at: None,
            started_at: None,
            expected_end_at: None,
            actual_end_at: None,
            configuration: serde_json::Value::Null,
            version: 0,
        }
    }

    /// Aplica una transicion de estado si es valida; retorna `false`
    /// sin mutar nada si la transicion violaria el orden total.
    #[must_use]
    pub fn try_transition(&mut self, next: AllocationStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        match next {
            AllocationStatus::Allocated => self.allocated_at = Some(Utc::now()),
            AllocationStatus::Running => self.started_at = Some(Utc::now()),
            AllocationStatus::Completed
            | AllocationStatus::Failed
            | AllocationStatus::Preempted
            | AllocationStatus::Cancelled => self.actual_end_at = Some(Utc::now()),
            _ => {}
        }
        self.status = next;
        self.version += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_progression_is_monotonic() {
        let mut a = Allocation::new_requested(Uuid::new_v4(), JobRequirements::default());
        assert!(a.try_transition(AllocationStatus::Admitted));
        assert!(a.try_transition(AllocationStatus::Allocated));
        assert!(a.try_transition(AllocationStatus::Running));
        assert!(a.try_transition(AllocationStatus::Completed));
        assert!(a.status.is_terminal());
    }

    #[test]
    fn regressive_transition_is_rejected() {
        let mut a = Allocation::new_requested(Uuid::new_v4(), JobRequirements::default());
        assert!(a.try_transition(AllocationStatus::Admitted));
        assert!(a.try_transition(AllocationStatus::Allocated));
        assert!(!a.try_transition(AllocationStatus::Requested));
        assert_eq!(a.status, AllocationStatus::Allocated);
    }

    #[test]
    fn terminal_state_has_no_further_transition() {
        let mut a = Allocation::new_requested(Uuid::new_v4(), JobRequirements::default());
        a.try_transition(AllocationStatus::Admitted);
        a.try_transition(AllocationStatus::Allocated);
        a.try_transition(AllocationStatus::Running);
        a.try_transition(AllocationStatus::Completed);
        assert!(!a.try_transition(AllocationStatus::Running));
    }
}
