// [apps/orchestrator/src/handlers/mod.rs]
//! HTTP adapter layer: one module per external-facing audience (spec
//! S6), kept deliberately thin — handlers parse and validate the wire
//! shape and delegate everything else to the services in
//! `crate::services`.

pub mod consumer;
pub mod operator;
pub mod provider;
