//! Graph service: the single entry point for graph consumers.
//!
//! `GraphService` composes:
//!
//! 1. **Store**: graph/node/link CRUD and the note/task side index
//! 2. **Analytics**: stats, clusters, shortest path, filter and search
//! 3. **Layout**: layout computation under a wall-clock budget
//! 4. **Serialization**: export, JSON import, bulk import from notes
//! 5. **Lifecycle**: every call except lifecycle transitions requires the
//!    `active` state
//!
//! Mutation events go to a broadcast [`EventBus`] owned by the service plus
//! any extra emitters passed to [`GraphService::with_emitter`].

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::algorithms::{calculate_stats, find_clusters, find_shortest_path};
use super::filter::{filter_graph, search_nodes};
use super::layout::{calculate_layout, LayoutConfig};
use super::lifecycle::{Lifecycle, LifecycleState};
use super::models::{
    Cluster, ClusterAlgorithm, Graph, GraphData, GraphFilter, GraphLink, GraphNode, GraphPath,
    GraphStats, GraphUpdate, LinkUpdate, NewLink, NewNode, NodeUpdate, SearchResult,
};
use super::serializer::{export_graph, import_from_notes, import_graph, ExportOptions};
use super::store::GraphStore;
use crate::error::Result;
use crate::events::{EventBus, EventEmitter, GraphEvent};
use crate::Config;

/// Knowledge graph service.
pub struct GraphService {
    store: GraphStore,
    lifecycle: Lifecycle,
    config: Config,
    bus: EventBus,
}

impl GraphService {
    /// Create a service in the `uninitialized` state.
    pub fn new(config: Config) -> Self {
        let bus = EventBus::new(config.event_capacity);
        let store = GraphStore::new().with_emitter(Arc::new(bus.clone()));
        Self {
            store,
            lifecycle: Lifecycle::new(),
            config,
            bus,
        }
    }

    /// Create a service and bring it to the `active` state.
    pub fn started(config: Config) -> Result<Self> {
        let mut service = Self::new(config);
        service.initialize()?;
        service.activate()?;
        Ok(service)
    }

    /// Add an event listener next to the built-in bus (builder pattern).
    pub fn with_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.store.add_emitter(emitter);
        self
    }

    /// Subscribe to mutation events.
    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.bus.subscribe()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Layout configuration built from the service defaults.
    pub fn default_layout_config(&self) -> LayoutConfig {
        self.config.layout.clone()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.lifecycle.initialize()?;
        info!(
            layout = %self.config.layout.layout_type,
            budget_ms = self.config.layout_budget_ms,
            "Graph service initialized"
        );
        Ok(())
    }

    pub fn activate(&mut self) -> Result<()> {
        self.lifecycle.activate()
    }

    pub fn deactivate(&mut self) -> Result<()> {
        self.lifecycle.deactivate()
    }

    /// Return to `uninitialized`, dropping every stored graph.
    pub fn destroy(&mut self) -> Result<()> {
        self.lifecycle.destroy()?;
        let dropped = self.store.graph_count();
        self.store.clear();
        info!(graphs = dropped, "Graph service destroyed");
        Ok(())
    }

    /// Move to the `error` state.
    pub fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(reason = %reason, "Graph service failed");
        self.lifecycle.fail(reason);
    }

    // ========================================================================
    // Graphs
    // ========================================================================

    pub fn create_graph(&mut self, name: Option<&str>) -> Result<Graph> {
        self.lifecycle.ensure_active("create_graph")?;
        Ok(self.store.create_graph(name))
    }

    pub fn get_graph(&self, graph_id: &str) -> Result<Option<Graph>> {
        self.lifecycle.ensure_active("get_graph")?;
        Ok(self.store.get_graph(graph_id))
    }

    pub fn list_graphs(&self) -> Result<Vec<Graph>> {
        self.lifecycle.ensure_active("list_graphs")?;
        Ok(self.store.list_graphs())
    }

    pub fn update_graph(&mut self, graph_id: &str, update: GraphUpdate) -> Result<Graph> {
        self.lifecycle.ensure_active("update_graph")?;
        self.store.update_graph(graph_id, update)
    }

    pub fn delete_graph(&mut self, graph_id: &str) -> Result<bool> {
        self.lifecycle.ensure_active("delete_graph")?;
        Ok(self.store.delete_graph(graph_id))
    }

    // ========================================================================
    // Nodes and links
    // ========================================================================

    pub fn add_node(&mut self, graph_id: &str, node: NewNode) -> Result<GraphNode> {
        self.lifecycle.ensure_active("add_node")?;
        self.store.add_node(graph_id, node)
    }

    pub fn update_node(
        &mut self,
        graph_id: &str,
        node_id: &str,
        update: NodeUpdate,
    ) -> Result<GraphNode> {
        self.lifecycle.ensure_active("update_node")?;
        self.store.update_node(graph_id, node_id, update)
    }

    pub fn delete_node(&mut self, graph_id: &str, node_id: &str) -> Result<bool> {
        self.lifecycle.ensure_active("delete_node")?;
        self.store.delete_node(graph_id, node_id)
    }

    pub fn add_link(&mut self, graph_id: &str, link: NewLink) -> Result<GraphLink> {
        self.lifecycle.ensure_active("add_link")?;
        self.store.add_link(graph_id, link)
    }

    pub fn update_link(
        &mut self,
        graph_id: &str,
        link_id: &str,
        update: LinkUpdate,
    ) -> Result<GraphLink> {
        self.lifecycle.ensure_active("update_link")?;
        self.store.update_link(graph_id, link_id, update)
    }

    pub fn delete_link(&mut self, graph_id: &str, link_id: &str) -> Result<bool> {
        self.lifecycle.ensure_active("delete_link")?;
        self.store.delete_link(graph_id, link_id)
    }

    // ========================================================================
    // External entity links
    // ========================================================================

    pub fn link_to_note(&mut self, graph_id: &str, node_id: &str, note_id: &str) -> Result<bool> {
        self.lifecycle.ensure_active("link_to_note")?;
        self.store.link_to_note(graph_id, node_id, note_id)
    }

    pub fn link_to_task(&mut self, graph_id: &str, node_id: &str, task_id: &str) -> Result<bool> {
        self.lifecycle.ensure_active("link_to_task")?;
        self.store.link_to_task(graph_id, node_id, task_id)
    }

    pub fn unlink_from_note(
        &mut self,
        graph_id: &str,
        node_id: &str,
        note_id: &str,
    ) -> Result<bool> {
        self.lifecycle.ensure_active("unlink_from_note")?;
        self.store.unlink_from_note(graph_id, node_id, note_id)
    }

    pub fn unlink_from_task(
        &mut self,
        graph_id: &str,
        node_id: &str,
        task_id: &str,
    ) -> Result<bool> {
        self.lifecycle.ensure_active("unlink_from_task")?;
        self.store.unlink_from_task(graph_id, node_id, task_id)
    }

    pub fn linked_notes(&self, graph_id: &str, node_id: &str) -> Result<Vec<String>> {
        self.lifecycle.ensure_active("linked_notes")?;
        self.store.linked_notes(graph_id, node_id)
    }

    pub fn linked_tasks(&self, graph_id: &str, node_id: &str) -> Result<Vec<String>> {
        self.lifecycle.ensure_active("linked_tasks")?;
        self.store.linked_tasks(graph_id, node_id)
    }

    // ========================================================================
    // Analytics
    // ========================================================================

    pub fn calculate_stats(&self, graph_id: &str) -> Result<GraphStats> {
        self.lifecycle.ensure_active("calculate_stats")?;
        Ok(calculate_stats(self.store.snapshot(graph_id)?))
    }

    pub fn find_clusters(
        &self,
        graph_id: &str,
        algorithm: ClusterAlgorithm,
    ) -> Result<Vec<Cluster>> {
        self.lifecycle.ensure_active("find_clusters")?;
        Ok(find_clusters(self.store.snapshot(graph_id)?, algorithm))
    }

    /// `Ok(None)` when either node is unknown or no path exists.
    pub fn find_shortest_path(
        &self,
        graph_id: &str,
        source_id: &str,
        target_id: &str,
    ) -> Result<Option<GraphPath>> {
        self.lifecycle.ensure_active("find_shortest_path")?;
        Ok(find_shortest_path(
            self.store.snapshot(graph_id)?,
            source_id,
            target_id,
        ))
    }

    pub fn search_nodes(&self, graph_id: &str, query: &str) -> Result<SearchResult> {
        self.lifecycle.ensure_active("search_nodes")?;
        Ok(search_nodes(self.store.snapshot(graph_id)?, query))
    }

    pub fn filter_graph(&self, graph_id: &str, filter: &GraphFilter) -> Result<GraphData> {
        self.lifecycle.ensure_active("filter_graph")?;
        Ok(filter_graph(self.store.snapshot(graph_id)?, filter))
    }

    // ========================================================================
    // Layout
    // ========================================================================

    /// Lay out a snapshot. Failures inside the layout return `data` unchanged;
    /// exceeding the configured budget is logged, not enforced.
    pub fn calculate_layout(&self, data: &GraphData, config: &LayoutConfig) -> Result<GraphData> {
        self.lifecycle.ensure_active("calculate_layout")?;
        let start = Instant::now();
        let positioned = calculate_layout(data, config);
        let elapsed = start.elapsed();

        let budget = Duration::from_millis(self.config.layout_budget_ms);
        if elapsed > budget {
            warn!(
                layout = %config.layout_type,
                nodes = data.nodes.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.config.layout_budget_ms,
                "Layout exceeded time budget"
            );
        }
        Ok(positioned)
    }

    /// Lay out a stored graph and write the coordinates back.
    ///
    /// A layout that leaves the snapshot unchanged (including the fallback on
    /// failure) writes nothing and emits no event.
    pub fn layout_graph(&mut self, graph_id: &str, config: &LayoutConfig) -> Result<GraphData> {
        self.lifecycle.ensure_active("layout_graph")?;
        let snapshot = self.store.snapshot(graph_id)?;
        let positioned = self.calculate_layout(snapshot, config)?;
        if positioned == *snapshot {
            debug!(graph_id = %graph_id, "Layout left positions unchanged");
            return Ok(positioned);
        }
        let updated = self.store.apply_positions(graph_id, &positioned)?;
        debug!(graph_id = %graph_id, nodes = updated, "Layout applied");
        Ok(positioned)
    }

    // ========================================================================
    // Import / export
    // ========================================================================

    pub fn export_graph(&self, data: &GraphData, options: &ExportOptions) -> Result<String> {
        self.lifecycle.ensure_active("export_graph")?;
        export_graph(data, options)
    }

    /// Build (but do not store) a graph snapshot from external note ids.
    pub fn import_from_notes<S: AsRef<str>>(&self, note_ids: &[S]) -> Result<GraphData> {
        self.lifecycle.ensure_active("import_from_notes")?;
        Ok(import_from_notes(note_ids))
    }

    /// Parse a JSON export and store it as a new graph.
    pub fn import_graph(&mut self, name: Option<&str>, json: &str) -> Result<Graph> {
        self.lifecycle.ensure_active("import_graph")?;
        let data = import_graph(json)?;
        let graph = self.store.create_graph(name);
        self.store.update_graph(
            &graph.id,
            GraphUpdate {
                name: None,
                nodes: Some(data.nodes),
                links: Some(data.links),
            },
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
