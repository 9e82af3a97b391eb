// [libs/infra/provider-client/src/errors.rs]
/*!
 * =================================================================
 * APARATO: PROVIDER CLIENT ERROR CATALOG (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACION DE FALLOS DE COMUNICACION
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("NETWORK_UNREACHABLE: failed to reach the orchestrator: {0}")]
    NetworkFault(#[from] reqwest::Error),

    #[error("ENVELOPE_CORRUPTION: failed to decode response body: {0}")]
    DecodingFault(#[from] serde_json::Error),

    #[error("COMMAND_REJECTION: orchestrator returned status {0}")]
    ServerRejection(String),

    #[error("IDENTITY_REVOKED: session credentials invalid or expired")]
    Unauthorized,
}
