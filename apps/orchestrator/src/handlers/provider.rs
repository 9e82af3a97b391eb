// [apps/orchestrator/src/handlers/provider.rs]
//! Provider-facing handlers: registration, authentication, heartbeat
//! submission, and verification result submission (the design
//! "Provider-facing").

use std::collections::HashMap;

use axum::extract::{Extension, State};
use axum::Json;
use chrono::{DateTime, Utc};
use nebula_domain_models::{
    AuthMaterial, BenchmarkMeasurement, GpuResource, GpuRuntimeState, HealthState, Heartbeat,
    InventoryEvent, Provider, ProviderEndpoint, RegistrationState, ResourceSummary,
    SystemMetrics, VerificationResult,
};
use nebula_infra_db::repositories::{GpuRepository, ProviderRepository};
use nebula_shared_observability::RequestId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth;
use crate::errors::{ApiError, OrchestratorError};
use crate::middleware::ProviderIdentity;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub contact_email: String,
    pub organization: String,
    pub public_key: String,
    #[serde(default)]
    pub endpoints: Vec<ProviderEndpoint>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub region: Option<String>,
    pub terms_accepted: bool,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub provider_id: Uuid,
    /// Plaintext api key, handed back exactly once; it is never
    /// retrievable again, only rotated by registering again.
    pub api_key: String,
    pub status: String,
}

/// `POST /api/v1/providers/register`. Idempotent by contact email: a
/// second registration for an already-known email rotates its api key
/// onto the existing provider row instead of creating a duplicate,
/// since the plaintext key is never retained to be reissued unchanged.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let request_id = RequestId::generate();
    if !body.terms_accepted {
        return Err(ApiError::new(
            request_id,
            OrchestratorError::Validation("terms_accepted must be true".to_string()),
        ));
    }

    let connection = state
        .db
        .get_connection()
        .map_err(|e| ApiError::new(request_id.clone(), e.into()))?;
    let repo = ProviderRepository::new(&connection);

    let existing = repo
        .find_by_email(&body.contact_email)
        .await
        .map_err(|e| ApiError::new(request_id.clone(), e.into()))?;

    let raw_api_key = auth::generate_api_key();

    let provider = match existing {
        Some(mut provider) => {
            provider.auth.salted_key_digest = auth::salted_key_digest(provider.id, &raw_api_key);
            provider.auth.public_key = body.public_key.clone();
            repo.update_with_version(&provider)
                .await
                .map_err(|e| ApiError::new(request_id.clone(), e.into()))?;
            provider
        }
        None => {
            let auth_material = AuthMaterial {
                salted_key_digest: String::new(),
                public_key: body.public_key.clone(),
            };
            let mut provider = Provider::new_pending(
                body.name.clone(),
                body.contact_email.clone(),
                body.organization.clone(),
                auth_material,
                body.endpoints.clone(),
            );
            provider.auth.salted_key_digest = auth::salted_key_digest(provider.id, &raw_api_key);
            provider.tags = body.tags.clone();
            provider.region = body.region.clone();
            repo.create(&provider)
                .await
                .map_err(|e| ApiError::new(request_id.clone(), e.into()))?;
            provider
        }
    };

    Ok(Json(RegisterResponse {
        provider_id: provider.id,
        api_key: raw_api_key,
        status: format!("{:?}", provider.registration_state).to_lowercase(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct AuthenticateRequest {
    pub provider_id: Uuid,
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct AuthenticateResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

/// `POST /api/v1/providers/authenticate`.
pub async fn authenticate(
    State(state): State<AppState>,
    Json(body): Json<AuthenticateRequest>,
) -> Result<Json<AuthenticateResponse>, ApiError> {
    let request_id = RequestId::generate();
    let connection = state
        .db
        .get_connection()
        .map_err(|e| ApiError::new(request_id.clone(), e.into()))?;

    let provider = ProviderRepository::new(&connection)
        .get_by_id(body.provider_id)
        .await
        .map_err(|e| ApiError::new(request_id.clone(), e.into()))?;

    if !auth::verify_api_key(provider.id, &body.api_key, &provider.auth.salted_key_digest) {
        return Err(ApiError::new(
            request_id,
            OrchestratorError::Validation("invalid api key".to_string()),
        ));
    }

    if matches!(
        provider.registration_state,
        RegistrationState::Suspended | RegistrationState::Blocked
    ) {
        return Err(ApiError::new(
            request_id,
            OrchestratorError::Precondition(format!(
                "provider {} is {:?}",
                provider.id, provider.registration_state
            )),
        ));
    }

    let issued = auth::issue_identity_token(&state.config.auth, provider.id);
    Ok(Json(AuthenticateResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        token_type: "bearer".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    #[serde(default)]
    pub reported_health: HealthState,
    #[serde(default)]
    pub resource_summary: ResourceSummary,
    #[serde(default)]
    pub system_metrics: SystemMetrics,
    #[serde(default)]
    pub round_trip_ms: u32,
    pub agent_version: String,
    #[serde(default)]
    pub resource_states: HashMap<Uuid, GpuRuntimeState>,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub accepted: bool,
    pub next_interval_seconds: u64,
    pub warnings: Vec<String>,
}

/// `POST /api/v1/providers/heartbeat`, behind `provider_auth_guard`.
pub async fn heartbeat(
    State(state): State<AppState>,
    Extension(identity): Extension<ProviderIdentity>,
    Json(body): Json<HeartbeatRequest>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    let request_id = RequestId::generate();
    let heartbeat = Heartbeat {
        id: Uuid::new_v4(),
        provider_id: identity.provider_id,
        received_at: Utc::now(),
        reported_health: body.reported_health,
        resource_summary: body.resource_summary,
        system_metrics: body.system_metrics,
        round_trip_ms: body.round_trip_ms,
        agent_version: body.agent_version,
    };

    let outcome = state
        .heartbeat_monitor
        .on_heartbeat(heartbeat, body.resource_states)
        .await
        .map_err(|e| ApiError::new(request_id, e))?;

    Ok(Json(HeartbeatResponse {
        accepted: true,
        next_interval_seconds: outcome.next_interval_seconds,
        warnings: outcome.warnings,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SyncResourcesRequest {
    pub resources: Vec<GpuResource>,
}

#[derive(Debug, Serialize)]
pub struct SyncResourcesResponse {
    pub synced: usize,
}

/// `POST /api/v1/providers/resources`, behind `provider_auth_guard`.
/// The agent's own device enumeration is the source of truth for a
/// gpu's existence: heartbeat only ever reports state deltas for gpus
/// already known here, so a new or re-synthesized device must be
/// upserted through this route before it shows up in any heartbeat.
/// `provider_id` on each resource is always overwritten with the
/// calling identity, so a compromised payload cannot attribute
/// hardware to a different provider.
pub async fn sync_resources(
    State(state): State<AppState>,
    Extension(identity): Extension<ProviderIdentity>,
    Json(body): Json<SyncResourcesRequest>,
) -> Result<Json<SyncResourcesResponse>, ApiError> {
    let request_id = RequestId::generate();
    let connection = state
        .db
        .get_connection()
        .map_err(|e| ApiError::new(request_id.clone(), e.into()))?;
    let repo = GpuRepository::new(&connection);

    let mut synced = 0usize;
    for mut resource in body.resources {
        resource.provider_id = identity.provider_id;
        repo.upsert(&resource)
            .await
            .map_err(|e| ApiError::new(request_id.clone(), e.into()))?;
        state.event_bus.publish(InventoryEvent::ResourceChanged {
            provider_id: identity.provider_id,
            gpu_id: resource.id,
        });
        synced += 1;
    }

    Ok(Json(SyncResourcesResponse { synced }))
}

#[derive(Debug, Deserialize)]
pub struct SubmitVerificationRequest {
    pub resource_id: Uuid,
    pub measurements: Vec<BenchmarkMeasurement>,
}

/// `POST /api/v1/providers/verifications`, behind `provider_auth_guard`.
pub async fn submit_verification_result(
    State(state): State<AppState>,
    Extension(identity): Extension<ProviderIdentity>,
    Json(body): Json<SubmitVerificationRequest>,
) -> Result<Json<VerificationResult>, ApiError> {
    let request_id = RequestId::generate();
    let result = state
        .verification_engine
        .assess(body.resource_id, identity.provider_id, body.measurements)
        .await
        .map_err(|e| ApiError::new(request_id, e))?;
    Ok(Json(result))
}
