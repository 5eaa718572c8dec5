//! Pass-through gateway for the episode and character catalog.
//!
//! The facade (`api`) exposes the upstream catalog over HTTP and resolves
//! character batches by fanning out single-character requests (`resolver`).
//! Consumers resolve character references through `client::CharacterClient`,
//! which keeps a per-session cache and only asks the facade for what it lacks.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod errors;
pub mod metrics_defs;
pub mod reference;
pub mod resolver;
pub mod types;
pub mod upstream;

#[cfg(test)]
mod testutils;

pub use client::{CharacterClient, FacadeClient};
pub use errors::{CatalogError, ResolveError};
pub use resolver::BatchResolver;
