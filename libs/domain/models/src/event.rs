// [libs/domain/models/src/event.rs]
/*!
 * =================================================================
 * APARATO: EVENT TAXONOMY (ESTRATO L2)
 * RESPONSABILIDAD: UNION DISCRIMINADA DE HECHOS EMITIDOS AL EVENT BUS
 *
 * Todo componente que observa un cambio de estado relevante emite un
 * `InventoryEvent`; el Event Bus nunca sintetiza eventos por su cuenta,
 * solo los transporta (ver apps/orchestrator/src/services/event_bus.rs).
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::HealthState;

/// Union discriminada de todos los hechos que el plano de control emite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InventoryEvent {
    HeartbeatReceived {
        provider_id: Uuid,
        round_trip_ms: u32,
    },
    ProviderStatusChanged {
        provider_id: Uuid,
        old_health: HealthState,
        new_health: HealthState,
    },
    ResourceChanged {
        provider_id: Uuid,
        gpu_id: Uuid,
    },
    AvailabilityChanged {
        provider_id: Uuid,
        gpu_id: Uuid,
        now_available: bool,
    },
    ThresholdExceeded {
        provider_id: Uuid,
        gpu_id: Option<Uuid>,
        metric: String,
        value: f64,
        threshold: f64,
    },
    ConnectionLost {
        provider_id: Uuid,
        last_seen_at: DateTime<Utc>,
    },
    VerificationCompleted {
        provider_id: Uuid,
        gpu_id: Uuid,
        verification_id: Uuid,
        passed: bool,
    },
    AllocationAdmitted {
        allocation_id: Uuid,
        consumer_id: Uuid,
    },
    AllocationPreempted {
        allocation_id: Uuid,
        provider_id: Uuid,
        gpu_id: Uuid,
        reason: String,
    },
    AllocationCompleted {
        allocation_id: Uuid,
        status: String,
    },
}

/// Sobre (envelope) con metadatos comunes a todo evento transportado.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub payload: InventoryEvent,
    pub metadata: serde_json::Value,
}

impl Event {
    #[must_use]
    pub fn new(payload: InventoryEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            payload,
            metadata: serde_json::Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_wraps_payload_with_fresh_id() {
        let ev = Event::new(InventoryEvent::ConnectionLost {
            provider_id: Uuid::new_v4(),
            last_seen_at: Utc::now(),
        });
        assert!(matches!(ev.payload, InventoryEvent::ConnectionLost { .. }));
    }
}
