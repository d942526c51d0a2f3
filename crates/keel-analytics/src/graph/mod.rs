//! The analytics graph and its views.
//!
//! # Overview
//!
//! Every analyzer starts from a [`Graph`] built from one entity snapshot.
//! Views narrow it for rendering; the cycle detector is shared by the views,
//! the WBS builder, and the scheduler.
//!
//! ## Pipeline
//!
//! ```text
//! &[Entity]
//!        ↓  build::Graph::from_entities()
//! Graph (nodes by id, sorted edges, warnings, content hash)
//!        ↓  view::build_dependency_graph()   depends_on only
//!        ↓  view::build_unified_graph()      filtered, optionally focused
//! GraphView
//!   ├─ stats::GraphStats
//!   └─ cycles::detect_cycles()  reference and hierarchy cycles
//! ```
//!
//! ## Typical Usage
//!
//! ```rust,ignore
//! use keel_analytics::graph::{Graph, GraphFilter, build_unified_graph};
//!
//! let graph = Graph::from_entities(snapshot.entities())?;
//! let view = build_unified_graph(&graph, &GraphFilter {
//!     focus_id: Some("del-7".into()),
//!     depth: 2,
//!     ..GraphFilter::default()
//! });
//!
//! println!("nodes={} edges={} cycles={}",
//!     view.stats.node_count, view.stats.edge_count, view.cycles.len());
//! ```

pub mod build;
pub mod cycles;
pub mod stats;
pub mod view;

pub use build::{Edge, Graph, GraphWarning, Node};
pub use cycles::{CycleReport, detect_cycles, find_dependency_cycles, find_hierarchy_cycles};
pub use stats::GraphStats;
pub use view::{GraphFilter, GraphView, build_dependency_graph, build_unified_graph};
