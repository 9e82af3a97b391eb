// [libs/infra/provider-client/src/lib.rs]
/*!
 * =================================================================
 * APARATO: PROVIDER CLIENT LIBRARY BARREL (ESTRATO L3)
 * RESPONSABILIDAD: EXPOSICION PUBLICA DEL UPLINK DE PROVIDER
 * =================================================================
 */

pub mod client;
pub mod errors;

pub use client::{
    AuthenticateRequest, AuthenticateResponse, HeartbeatRequest, HeartbeatResponse,
    ProviderClient, RegistrationRequest, RegistrationResponse, SubmitVerificationRequest,
    SyncResourcesRequest, SyncResourcesResponse,
};
pub use errors::ClientError;
