// [libs/infra/db/src/lib.rs]
/*!
 * =================================================================
 * APARATO: PERSISTENCE MASTER HUB (ESTRATO L3)
 * RESPONSABILIDAD: ADAPTADOR DE PERSISTENCIA DEL PLANO DE CONTROL
 * =================================================================
 */

pub mod cache;
pub mod client;
pub mod errors;
pub mod migrations;
pub mod repositories;
pub mod retention;
pub mod schema;

pub use client::TursoClient;
pub use errors::DbError;
