//! Knowledge graph engine.
//!
//! Owns graphs of notes, tags, folders and links, and derives analytics,
//! layouts and exports from immutable snapshots.
//!
//! ## Architecture
//!
//! ```text
//! GraphService ──► Lifecycle (active gate)
//!      │
//!      ├──► GraphStore ──► EventEmitter(s) (EventBus, callbacks)
//!      │        │
//!      │     &GraphData snapshot
//!      │        │
//!      ├──► algorithms / filter / serializer   (pure, read-only)
//!      └──► layout ──► positions ──► GraphStore::apply_positions
//! ```
//!
//! ## Modules
//!
//! - [`models`]: Data structures (GraphNode, GraphLink, GraphData, Cluster, GraphStats, ...)
//! - [`store`]: `GraphStore`: CRUD, cascade deletes, note/task side index, events
//! - [`algorithms`]: Stats, connected components, clusters, shortest path
//! - [`layout`]: Force, circular, grid, hierarchical and radial layouts
//! - [`filter`]: Predicate filtering and free-text search
//! - [`serializer`]: JSON/CSV/DOT export, JSON import, import from notes
//! - [`lifecycle`]: Service state machine
//! - [`engine`]: `GraphService` facade

pub mod algorithms;
pub mod engine;
pub mod filter;
pub mod layout;
pub mod lifecycle;
pub mod models;
pub mod serializer;
pub mod store;

// Re-export primary types for convenience
pub use engine::GraphService;
pub use layout::{LayoutConfig, LayoutType};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use models::{
    Cluster, ClusterAlgorithm, DateRange, Graph, GraphData, GraphFilter, GraphLink, GraphNode,
    GraphPath, GraphStats, GraphUpdate, LinkType, LinkUpdate, NewLink, NewNode, NodeType,
    NodeUpdate, Point, SearchResult,
};
pub use serializer::{ExportFormat, ExportOptions};
pub use store::{EntityLinks, GraphStore};
