// [libs/domain/models/src/heartbeat.rs]
/*!
 * =================================================================
 * APARATO: HEARTBEAT DOMAIN MODEL (ESTRATO L2)
 * RESPONSABILIDAD: SONDEO PERIODICO DE VIDA Y SALUD DE UN PROVIDER
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::{HealthState, ResourceSummary};

/// Metricas de sistema reportadas por el agente del provider en cada latido.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub disk_percent: f32,
    pub network_rx_mbps: f32,
    pub network_tx_mbps: f32,
    pub load_average_1m: f32,
    pub uptime_seconds: u64,
}

/// Un latido individual recibido de un provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub received_at: DateTime<Utc>,
    /// Salud auto-reportada por el agente; el Heartbeat Monitor deriva
    /// la salud autoritativa combinando esto con latencia y continuidad.
    pub reported_health: HealthState,
    pub resource_summary: ResourceSummary,
    pub system_metrics: SystemMetrics,
    pub round_trip_ms: u32,
    pub agent_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_carries_self_reported_and_derived_inputs() {
        let hb = Heartbeat {
            id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            received_at: Utc::now(),
            reported_health: HealthState::Healthy,
            resource_summary: ResourceSummary::default(),
            system_metrics: SystemMetrics::default(),
            round_trip_ms: 45,
            agent_version: "0.1.0".into(),
        };
        assert_eq!(hb.reported_health, HealthState::Healthy);
    }
}
