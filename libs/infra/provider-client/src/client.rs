// [libs/infra/provider-client/src/client.rs]
/*!
 * =================================================================
 * APARATO: PROVIDER UPLINK (ESTRATO L3)
 * RESPONSABILIDAD: NEGOCIACION DE REGISTRO, LATIDO Y VERIFICACION
 *
 * Implementa el tunel de comunicacion asincrono entre el agente del
 * provider y el orquestador del plano de control. Los tipos de
 * peticion/respuesta de este modulo son la contraparte exacta de los
 * handlers HTTP del orquestador: un cambio en uno sin el otro rompe
 * el protocolo en tiempo de ejecucion sin que el compilador lo note,
 * asi que se mantienen lado a lado deliberadamente en esta revision.
 * =================================================================
 */

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use nebula_domain_models::{
    BenchmarkMeasurement, GpuResource, GpuRuntimeState, HealthState, ProviderEndpoint,
    ResourceSummary, SystemMetrics, VerificationResult,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::errors::ClientError;

#[derive(Debug, Serialize)]
pub struct RegistrationRequest {
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

#[derive(Debug, Deserialize)]
pub struct RegistrationResponse {
    pub provider_id: Uuid,
    /// Clave en texto plano, entregada una sola vez; el agente es
    /// responsable de persistirla localmente para autenticarse despues.
    pub api_key: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct AuthenticateRequest {
    pub provider_id: Uuid,
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthenticateResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

#[derive(Debug, Default, Serialize)]
pub struct HeartbeatRequest {
    pub reported_health: HealthState,
    pub resource_summary: ResourceSummary,
    pub system_metrics: SystemMetrics,
    pub round_trip_ms: u32,
    pub agent_version: String,
    pub resource_states: HashMap<Uuid, GpuRuntimeState>,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatResponse {
    pub accepted: bool,
    pub next_interval_seconds: u64,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncResourcesRequest {
    pub resources: Vec<GpuResource>,
}

#[derive(Debug, Deserialize)]
pub struct SyncResourcesResponse {
    pub synced: usize,
}

#[derive(Debug, Serialize)]
pub struct SubmitVerificationRequest {
    pub resource_id: Uuid,
    pub measurements: Vec<BenchmarkMeasurement>,
}

/// Cliente HTTP del agente hacia el orquestador. Arranca sin
/// credenciales para el registro, y se reconstruye autenticado una
/// vez que `authenticate` emite un identity token de corta vida.
pub struct ProviderClient {
    session: Client,
    orchestrator_base_url: String,
}

impl ProviderClient {
    /// Construye un cliente sin credenciales, usado unicamente para
    /// el handshake inicial de registro y autenticacion.
    #[must_use]
    pub fn unauthenticated(base_url: String) -> Self {
        Self {
            session: Client::builder()
                .user_agent("nebula-provider-agent/0.1")
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("reqwest client builder must succeed with static configuration"),
            orchestrator_base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Construye un cliente autenticado con el identity token emitido
    /// por `authenticate`; usado para heartbeat y envio de verificacion.
    #[must_use]
    pub fn authenticated(base_url: String, identity_token: &str) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth_value = reqwest::header::HeaderValue::from_str(&format!("Bearer {identity_token}"))
            .expect("identity token must be a valid header value");
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);

        Self {
            session: Client::builder()
                .default_headers(headers)
                .user_agent("nebula-provider-agent/0.1")
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("reqwest client builder must succeed with static configuration"),
            orchestrator_base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[instrument(skip(self, request))]
    pub async fn register(&self, request: &RegistrationRequest) -> Result<RegistrationResponse, ClientError> {
        let url = format!("{}/api/v1/providers/register", self.orchestrator_base_url);
        let response = self.session.post(&url).json(request).send().await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(response.json::<RegistrationResponse>().await?),
            StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
            other => Err(ClientError::ServerRejection(format!("HTTP_{other}"))),
        }
    }

    #[instrument(skip(self, request))]
    pub async fn authenticate(&self, request: &AuthenticateRequest) -> Result<AuthenticateResponse, ClientError> {
        let url = format!("{}/api/v1/providers/authenticate", self.orchestrator_base_url);
        let response = self.session.post(&url).json(request).send().await?;

        match response.status() {
            StatusCode::OK => Ok(response.json::<AuthenticateResponse>().await?),
            StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
            other => Err(ClientError::ServerRejection(format!("HTTP_{other}"))),
        }
    }

    #[instrument(skip(self, request))]
    pub async fn send_heartbeat(&self, request: &HeartbeatRequest) -> Result<HeartbeatResponse, ClientError> {
        let url = format!("{}/api/v1/providers/heartbeat", self.orchestrator_base_url);
        let response = self.session.post(&url).json(request).send().await?;

        match response.status() {
            StatusCode::OK | StatusCode::ACCEPTED => Ok(response.json::<HeartbeatResponse>().await?),
            StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
            other => Err(ClientError::ServerRejection(format!("HTTP_{other}"))),
        }
    }

    #[instrument(skip(self, request))]
    pub async fn sync_resources(&self, request: &SyncResourcesRequest) -> Result<SyncResourcesResponse, ClientError> {
        let url = format!("{}/api/v1/providers/resources", self.orchestrator_base_url);
        let response = self.session.post(&url).json(request).send().await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(response.json::<SyncResourcesResponse>().await?),
            StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
            other => Err(ClientError::ServerRejection(format!("HTTP_{other}"))),
        }
    }

    #[instrument(skip(self, request))]
    pub async fn submit_verification_result(
        &self,
        request: &SubmitVerificationRequest,
    ) -> Result<VerificationResult, ClientError> {
        let url = format!("{}/api/v1/providers/verifications", self.orchestrator_base_url);
        let response = self.session.post(&url).json(request).send().await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(response.json::<VerificationResult>().await?),
            StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
            other => Err(ClientError::ServerRejection(format!("HTTP_{other}"))),
        }
    }
}
