#![forbid(unsafe_code)]
//! keel-core library.
//!
//! Shared vocabulary for the keel workspace: the entity snapshot model read
//! from the entity store, project configuration, and machine-readable error
//! codes.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for loading/IO return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod error;
pub mod model;
pub mod snapshot;

pub use model::{Entity, Layer, NodeType, Relation};
pub use snapshot::Snapshot;
