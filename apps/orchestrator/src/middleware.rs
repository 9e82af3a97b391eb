// [apps/orchestrator/src/middleware.rs]
/*!
 * =================================================================
 * APARATO: AUTHENTICATION GUARDS (ESTRATO L4)
 * RESPONSABILIDAD: VALIDACION DE IDENTIDAD E INYECCION EN LA PETICION
 *
 * Dos ciudadanos distintos cruzan esta frontera: el provider, portador
 * de un identity token de corta vida emitido por `auth::issue_identity_token`,
 * y el operador, portador de un token compartido de configuracion. Cada
 * guardia inyecta su propia identidad en las extensiones de la peticion
 * para que los handlers de L4 la consuman sin repetir la validacion.
 * =================================================================
 */

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth;
use crate::state::AppState;

/// Identidad de provider inyectada tras validar su identity token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProviderIdentity {
    pub provider_id: Uuid,
}

/// Marcador de identidad de operador; no carga un id propio porque el
/// token de operador es compartido, no individual por diseno (ver
/// DESIGN.md).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OperatorIdentity;

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Exige un identity token de provider valido y no expirado, emitido
/// por `Authenticate`. Usado por las rutas de heartbeat y de envio de
/// resultados de verificacion.
pub async fn provider_auth_guard(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let Some(token) = bearer_token(&req) else {
        warn!("provider route called without a bearer token");
        return Err(StatusCode::UNAUTHORIZED);
    };

    match auth::verify_identity_token(&state.config.auth, token) {
        Ok(provider_id) => {
            debug!(%provider_id, "provider identity verified");
            req.extensions_mut().insert(ProviderIdentity { provider_id });
            Ok(next.run(req).await)
        }
        Err(e) => {
            warn!(error = %e, "provider identity token rejected");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Exige el token compartido de operador, analogo al worker-token
/// simetrico del guardia original pero para el panel de operacion
///.
pub async fn operator_auth_guard(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let Some(token) = bearer_token(&req) else {
        warn!("operator route called without a bearer token");
        return Err(StatusCode::UNAUTHORIZED);
    };

    if token != state.config.auth.operator_token {
        warn!("operator route called with an invalid token");
        return Err(StatusCode::UNAUTHORIZED);
    }

    req.extensions_mut().insert(OperatorIdentity);
    Ok(next.run(req).await)
}
