// [apps/orchestrator/src/lib.rs]
//! The GPU allocation control plane: HTTP adapters over a small set of
//! background services, all wired together once in `state::AppState`.

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::routes::build_router;
    pub use crate::state::AppState;
}
