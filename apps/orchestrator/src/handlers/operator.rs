// [apps/orchestrator/src/handlers/operator.rs]
//! Operator-facing handlers: cross-provider inventory search,
//! on-demand verification requests, and the system health overview
//!. Every route here sits behind
//! `operator_auth_guard`.

use axum::extract::{Query, State};
use axum::Json;
use nebula_domain_models::{GpuResource, GpuRuntimeState, Provider, Vendor};
use nebula_infra_db::repositories::{
    GpuRepository, GpuSearchFilter, Incident, IncidentRepository, Page, ProviderRepository,
};
use nebula_domain_models::VerificationState;
use nebula_shared_observability::RequestId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InventoryQuery {
    pub status: Option<GpuRuntimeState>,
    pub vendor: Option<Vendor>,
    pub region: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub min_memory_mb: Option<u64>,
    pub requires_tensor_ops: Option<bool>,
    pub cursor: Option<String>,
    #[serde(default = "default_page_size")]
    pub limit: u32,
}

fn default_page_size() -> u32 {
    50
}

/// `GET /api/v1/operator/inventory`. Cross-provider gpu search, the
/// operator counterpart to the per-provider views each provider sees
/// of its own fleet.
pub async fn query_inventory(
    State(state): State<AppState>,
    Query(query): Query<InventoryQuery>,
) -> Result<Json<Page<GpuResource>>, ApiError> {
    let request_id = RequestId::generate();
    let connection = state
        .db
        .get_connection()
        .map_err(|e| ApiError::new(request_id.clone(), e.into()))?;

    let filter = GpuSearchFilter {
        status: query.status,
        vendor: query.vendor,
        region: query.region,
        tags: query.tags,
        min_memory_mb: query.min_memory_mb,
        requires_tensor_ops: query.requires_tensor_ops,
    };

    let page = GpuRepository::new(&connection)
        .search(&filter, query.cursor.as_deref(), query.limit)
        .await
        .map_err(|e| ApiError::new(request_id, e.into()))?;

    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct RequestVerificationRequest {
    pub gpu_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RequestVerificationResponse {
    pub gpu_id: Uuid,
    pub verification_state: VerificationState,
}

/// `POST /api/v1/operator/verifications`. Verification itself only
/// runs when a provider submits a benchmark suite (`VerificationEngine::assess`);
/// there is no channel to push a command onto a provider agent, so
/// this flips the target gpu to `in_progress` as a durable signal the
/// provider picks up the next time it inspects its own fleet, and
/// leaves the actual run to the normal submission path.
pub async fn request_verification(
    State(state): State<AppState>,
    Json(body): Json<RequestVerificationRequest>,
) -> Result<Json<RequestVerificationResponse>, ApiError> {
    let request_id = RequestId::generate();
    let connection = state
        .db
        .get_connection()
        .map_err(|e| ApiError::new(request_id.clone(), e.into()))?;

    let repo = GpuRepository::new(&connection);
    let mut gpu = repo
        .get_by_id(body.gpu_id)
        .await
        .map_err(|e| ApiError::new(request_id.clone(), e.into()))?;

    gpu.verification_state = VerificationState::InProgress;
    repo.update_with_version(&gpu)
        .await
        .map_err(|e| ApiError::new(request_id, e.into()))?;

    Ok(Json(RequestVerificationResponse { gpu_id: gpu.id, verification_state: gpu.verification_state }))
}

#[derive(Debug, Serialize)]
pub struct SystemHealthResponse {
    pub total_providers: usize,
    pub active_providers: usize,
    pub open_incidents: Vec<Incident>,
}

/// `GET /api/v1/operator/health`. A coarse fleet-wide rollup: how many
/// providers are registered and active, plus every incident still open
/// across them.
pub async fn system_health(State(state): State<AppState>) -> Result<Json<SystemHealthResponse>, ApiError> {
    let request_id = RequestId::generate();
    let connection = state
        .db
        .get_connection()
        .map_err(|e| ApiError::new(request_id.clone(), e.into()))?;

    let mut total_providers = 0usize;
    let mut active_providers = 0usize;
    let mut open_incidents = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page: Page<Provider> = ProviderRepository::new(&connection)
            .list_active(cursor.as_deref(), 200)
            .await
            .map_err(|e| ApiError::new(request_id.clone(), e.into()))?;

        total_providers += page.items.len();
        for provider in &page.items {
            if provider.is_placement_eligible() {
                active_providers += 1;
            }
            let incidents = IncidentRepository::new(&connection)
                .list_open_for_provider(provider.id)
                .await
                .map_err(|e| ApiError::new(request_id.clone(), e.into()))?;
            open_incidents.extend(incidents);
        }

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(Json(SystemHealthResponse { total_providers, active_providers, open_incidents }))
}
