// [apps/orchestrator/src/routes.rs]
//! Assembles the axum router: one sub-router per audience, each
//! carrying only the auth guard its own routes need.

use axum::middleware as axum_middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{consumer, operator, provider};
use crate::middleware::{operator_auth_guard, provider_auth_guard};
use crate::state::AppState;

/// Builds the full HTTP surface: consumer routes are open (consumer
/// auth is left to an upstream gateway), provider routes
/// require a registered provider's identity token except for the
/// register/authenticate handshake itself, and operator routes require
/// the shared operator token.
pub fn build_router(state: AppState) -> Router {
    let consumer_routes = Router::new()
        .route("/allocations", post(consumer::submit_job))
        .route("/allocations/events", get(consumer::subscribe_events))
        .route("/allocations/:id", get(consumer::get_allocation))
        .route("/allocations/:id/cancel", post(consumer::cancel_allocation));

    let provider_public_routes = Router::new()
        .route("/providers/register", post(provider::register))
        .route("/providers/authenticate", post(provider::authenticate));

    let provider_authenticated_routes = Router::new()
        .route("/providers/heartbeat", post(provider::heartbeat))
        .route("/providers/resources", post(provider::sync_resources))
        .route("/providers/verifications", post(provider::submit_verification_result))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), provider_auth_guard));

    let operator_routes = Router::new()
        .route("/operator/inventory", get(operator::query_inventory))
        .route("/operator/verifications", post(operator::request_verification))
        .route("/operator/health", get(operator::system_health))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), operator_auth_guard));

    let api_v1 = Router::new()
        .merge(consumer_routes)
        .merge(provider_public_routes)
        .merge(provider_authenticated_routes)
        .merge(operator_routes);

    Router::new()
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
