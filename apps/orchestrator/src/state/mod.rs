// [apps/orchestrator/src/state/mod.rs]
/*!
 * =================================================================
 * APARATO: APPLICATION STATE COMPOSITION ROOT (ESTRATO L3)
 * RESPONSABILIDAD: CABLEADO DE REPOSITORIOS, SERVICIOS Y CONFIGURACION
 *
 * Punto unico donde se construyen todos los servicios del plano de
 * control y se comparten via `Arc` entre handlers y daemons de fondo.
 * Ningun handler alcanza el entorno de proceso por su cuenta: todo
 * tunable llega ya resuelto en `Config`.
 * =================================================================
 */

use std::sync::Arc;

use nebula_infra_db::TursoClient;

use crate::config::Config;
use crate::services::{Allocator, EventBus, HeartbeatMonitor, Rebalancer, Scheduler, VerificationEngine};

/// Estado compartido inyectado en cada handler axum via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<TursoClient>,
    pub event_bus: EventBus,
    pub allocator: Arc<Allocator>,
    pub scheduler: Arc<Scheduler>,
    pub verification_engine: Arc<VerificationEngine>,
    pub heartbeat_monitor: Arc<HeartbeatMonitor>,
    pub rebalancer: Arc<Rebalancer>,
}

impl AppState {
    /// Construye el grafo de dependencias completo a partir de una
    /// conexion de base de datos ya establecida y la configuracion
    /// cargada. El orden importa: el Event Bus nace primero porque
    /// todo servicio de abajo publica sobre el.
    #[must_use]
    pub fn new(config: Arc<Config>, db: Arc<TursoClient>) -> Self {
        let event_bus = EventBus::with_limits(config.heartbeat.event_buffer_size, config.heartbeat.max_subscribers);

        let allocator = Arc::new(Allocator::new(
            db.clone(),
            config.matcher.clone(),
            config.scheduler.clone(),
            event_bus.clone(),
        ));

        let scheduler = Arc::new(Scheduler::new(
            db.clone(),
            allocator.clone(),
            config.scheduler.clone(),
            event_bus.clone(),
        ));

        let verification_engine = Arc::new(VerificationEngine::new(
            db.clone(),
            config.verification.clone(),
            event_bus.clone(),
        ));

        let heartbeat_monitor = Arc::new(HeartbeatMonitor::new(
            db.clone(),
            config.heartbeat.clone(),
            event_bus.clone(),
        ));

        let rebalancer = Arc::new(Rebalancer::new(db.clone(), allocator.clone()));

        Self {
            config,
            db,
            event_bus,
            allocator,
            scheduler,
            verification_engine,
            heartbeat_monitor,
            rebalancer,
        }
    }
}
