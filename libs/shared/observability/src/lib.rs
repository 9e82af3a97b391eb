// [libs/shared/observability/src/lib.rs]
/*!
 * Shared ambient stack for nebula binaries: structured logging with a
 * panic-capturing subscriber, typed configuration loading, and a
 * request correlation id type used by the error taxonomy in
 * `apps/orchestrator`.
 */

pub mod config;
pub mod request_id;
pub mod tracing_init;

pub use config::{load_config, ConfigError};
pub use request_id::RequestId;
pub use tracing_init::init_tracing;
