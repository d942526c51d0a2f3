#![forbid(unsafe_code)]
//! keel-analytics library.
//!
//! The graph analytics engine: every entry point takes an immutable
//! [`graph::Graph`] (or entity slices) and returns an owned, serializable
//! result. Nothing here holds state between calls.
//!
//! ```text
//! &[Entity]
//!    ↓  Graph::from_entities()
//! Graph ──┬─ graph::build_dependency_graph / build_unified_graph → GraphView
//!         ├─ wbs::build_wbs                                      → WbsTree
//!         ├─ timeline::build_timeline                            → Timeline
//!         ├─ affinity::calculate_affinity                        → AffinityResult
//!         └─ heuristics::{coverage, staleness, bottleneck}       → reports
//! ```
//!
//! # Conventions
//!
//! - **Errors**: structural faults are [`AnalyticsError`]; dangling
//!   references and bad values become [`graph::GraphWarning`]s on the result.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod affinity;
pub mod error;
pub mod graph;
pub mod heuristics;
pub mod timeline;
pub mod wbs;

pub use error::AnalyticsError;
pub use graph::{Graph, GraphFilter, GraphView};
