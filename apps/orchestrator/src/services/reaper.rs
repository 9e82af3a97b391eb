// [apps/orchestrator/src/services/reaper.rs]
//! Subscribes to the Event Bus and turns incident-worthy events
//! (connection loss, threshold breaches, preemptions) into durable
//! `incidents` rows, so an operator can query history the live bus
//! itself never retains (the design "incidents" supplement).

use std::sync::Arc;

use nebula_domain_models::InventoryEvent;
use nebula_infra_db::repositories::{Incident, IncidentRepository, IncidentSeverity};
use nebula_infra_db::TursoClient;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, warn};
use uuid::Uuid;

use super::event_bus::EventBus;

/// Spawns the incident-recording daemon. Never terminates except when
/// the Event Bus itself is dropped, which only happens at shutdown.
pub async fn spawn_reaper(db: Arc<TursoClient>, event_bus: EventBus) {
    let Some(mut events) = event_bus.subscribe() else {
        error!("incident recorder could not subscribe to the event bus, subscriber cap already reached at startup");
        return;
    };

    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "incident recorder lagged behind the event bus, some incidents were not recorded");
                    continue;
                }
                Err(RecvError::Closed) => return,
            };

            let Some(incident) = incident_for(&event.payload) else {
                continue;
            };

            let connection = match db.get_connection() {
                Ok(connection) => connection,
                Err(e) => {
                    error!(error = %e, "incident recorder could not acquire a store connection");
                    continue;
                }
            };

            if let Err(e) = IncidentRepository::new(&connection).open(&incident).await {
                error!(error = %e, kind = %incident.kind, "failed to persist incident");
            }
        }
    });
}

/// Maps the subset of `InventoryEvent` variants worth a durable audit
/// trail into an open `Incident`. Routine events (heartbeats, resource
/// churn, completed allocations) have no incident counterpart.
fn incident_for(payload: &InventoryEvent) -> Option<Incident> {
    let now = chrono::Utc::now();
    match payload {
        InventoryEvent::ConnectionLost { provider_id, last_seen_at } => Some(Incident {
            id: Uuid::new_v4(),
            provider_id: *provider_id,
            gpu_id: None,
            kind: "connection_lost".to_string(),
            severity: IncidentSeverity::Critical,
            message: format!("provider last seen at {last_seen_at}"),
            opened_at: now,
            resolved_at: None,
            metadata: serde_json::json!({ "last_seen_at": last_seen_at }),
        }),
        InventoryEvent::ThresholdExceeded { provider_id, gpu_id, metric, value, threshold } => Some(Incident {
            id: Uuid::new_v4(),
            provider_id: *provider_id,
            gpu_id: *gpu_id,
            kind: "threshold_exceeded".to_string(),
            severity: IncidentSeverity::Warning,
            message: format!("{metric} reached {value}, threshold is {threshold}"),
            opened_at: now,
            resolved_at: None,
            metadata: serde_json::json!({ "metric": metric, "value": value, "threshold": threshold }),
        }),
        InventoryEvent::AllocationPreempted { allocation_id, provider_id, gpu_id, reason } => Some(Incident {
            id: Uuid::new_v4(),
            provider_id: *provider_id,
            gpu_id: Some(*gpu_id),
            kind: "allocation_preempted".to_string(),
            severity: IncidentSeverity::Info,
            message: reason.clone(),
            opened_at: now,
            resolved_at: None,
            metadata: serde_json::json!({ "allocation_id": allocation_id }),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_lost_becomes_a_critical_incident() {
        let incident = incident_for(&InventoryEvent::ConnectionLost {
            provider_id: Uuid::new_v4(),
            last_seen_at: chrono::Utc::now(),
        })
        .expect("connection lost should produce an incident");
        assert_eq!(incident.severity, IncidentSeverity::Critical);
    }

    #[test]
    fn allocation_preempted_carries_the_gpu_id() {
        let gpu_id = Uuid::new_v4();
        let incident = incident_for(&InventoryEvent::AllocationPreempted {
            allocation_id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            gpu_id,
            reason: "higher priority allocation".to_string(),
        })
        .expect("preemption should produce an incident");
        assert_eq!(incident.gpu_id, Some(gpu_id));
    }

    #[test]
    fn heartbeat_received_is_not_incident_worthy() {
        let event = InventoryEvent::HeartbeatReceived { provider_id: Uuid::new_v4(), round_trip_ms: 10 };
        assert!(incident_for(&event).is_none());
    }
}
