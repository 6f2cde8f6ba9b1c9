//! Graph store: canonical owner of every graph's nodes and links.
//!
//! The store is a single-writer, in-memory arena: graphs are keyed by id,
//! each graph owns its node and link vectors (insertion-ordered, addressed by
//! id) and a secondary index of the external notes and tasks each node is
//! associated with. Nothing holds references across graphs, so there are no
//! ownership cycles between nodes and links.
//!
//! Mutations take `&mut self` and perform no locking: callers serialize
//! writes per graph. Every committed mutation is announced to the injected
//! [`EventEmitter`]s *after* the state change; a panicking emitter is caught
//! and logged and never rolls the mutation back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::models::{
    Graph, GraphData, GraphLink, GraphNode, GraphUpdate, LinkUpdate, NewLink, NewNode, NodeUpdate,
};
use crate::error::{GraphError, Result};
use crate::events::{EventEmitter, ExternalEntityType, GraphEvent, GraphEventKind};

/// External entities associated with one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityLinks {
    pub notes: BTreeSet<String>,
    pub tasks: BTreeSet<String>,
}

impl EntityLinks {
    fn set_mut(&mut self, kind: ExternalEntityType) -> &mut BTreeSet<String> {
        match kind {
            ExternalEntityType::Note => &mut self.notes,
            ExternalEntityType::Task => &mut self.tasks,
        }
    }

    fn is_empty(&self) -> bool {
        self.notes.is_empty() && self.tasks.is_empty()
    }
}

#[derive(Debug, Clone)]
struct GraphRecord {
    id: String,
    name: String,
    data: GraphData,
    entity_links: HashMap<String, EntityLinks>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GraphRecord {
    fn to_graph(&self) -> Graph {
        Graph {
            id: self.id.clone(),
            name: self.name.clone(),
            data: self.data.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn node_position(&self, node_id: &str) -> Option<usize> {
        self.data.nodes.iter().position(|n| n.id == node_id)
    }

    fn link_position(&self, link_id: &str) -> Option<usize> {
        self.data.links.iter().position(|l| l.id == link_id)
    }

    fn require_node(&self, node_id: &str) -> Result<usize> {
        self.node_position(node_id)
            .ok_or_else(|| GraphError::NodeNotFound {
                graph_id: self.id.clone(),
                node_id: node_id.to_string(),
            })
    }

    fn check_endpoints(&self, source: &str, target: &str) -> Result<()> {
        for endpoint in [source, target] {
            if self.node_position(endpoint).is_none() {
                return Err(GraphError::InvalidInput(format!(
                    "Link endpoint {} does not exist in graph {}",
                    endpoint, self.id
                )));
            }
        }
        Ok(())
    }
}

/// In-memory store of knowledge graphs.
#[derive(Default)]
pub struct GraphStore {
    graphs: HashMap<String, GraphRecord>,
    /// Graph ids in creation order
    order: Vec<String>,
    emitters: Vec<Arc<dyn EventEmitter>>,
}

impl GraphStore {
    /// Create an empty store with no event listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event listener (builder pattern).
    pub fn with_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitters.push(emitter);
        self
    }

    /// Add an event listener.
    pub fn add_emitter(&mut self, emitter: Arc<dyn EventEmitter>) {
        self.emitters.push(emitter);
    }

    /// Deliver an event to every listener. Listener panics are contained.
    fn emit(&self, event: GraphEvent) {
        for emitter in &self.emitters {
            let delivered = catch_unwind(AssertUnwindSafe(|| emitter.emit(event.clone())));
            if delivered.is_err() {
                warn!(
                    kind = %event.kind,
                    graph_id = %event.graph_id,
                    "Event listener panicked; mutation kept"
                );
            }
        }
    }

    fn record(&self, graph_id: &str) -> Result<&GraphRecord> {
        self.graphs
            .get(graph_id)
            .ok_or_else(|| GraphError::GraphNotFound(graph_id.to_string()))
    }

    fn record_mut(&mut self, graph_id: &str) -> Result<&mut GraphRecord> {
        self.graphs
            .get_mut(graph_id)
            .ok_or_else(|| GraphError::GraphNotFound(graph_id.to_string()))
    }

    // ========================================================================
    // Graph operations
    // ========================================================================

    /// Create a new, empty graph.
    pub fn create_graph(&mut self, name: Option<&str>) -> Graph {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let record = GraphRecord {
            id: id.clone(),
            name: name.unwrap_or("Untitled graph").to_string(),
            data: GraphData::default(),
            entity_links: HashMap::new(),
            created_at: now,
            updated_at: now,
        };
        let graph = record.to_graph();
        self.graphs.insert(id.clone(), record);
        self.order.push(id.clone());

        debug!(graph_id = %id, "Graph created");
        self.emit(GraphEvent::new(GraphEventKind::GraphCreated, &id).with_payload(&graph));
        graph
    }

    /// Get a copy of a graph, `None` if absent.
    pub fn get_graph(&self, graph_id: &str) -> Option<Graph> {
        self.graphs.get(graph_id).map(GraphRecord::to_graph)
    }

    /// Borrow a graph's current snapshot.
    pub fn snapshot(&self, graph_id: &str) -> Result<&GraphData> {
        self.record(graph_id).map(|r| &r.data)
    }

    /// All graphs in creation order.
    pub fn list_graphs(&self) -> Vec<Graph> {
        self.order
            .iter()
            .filter_map(|id| self.graphs.get(id))
            .map(GraphRecord::to_graph)
            .collect()
    }

    pub fn graph_count(&self) -> usize {
        self.graphs.len()
    }

    /// Drop every graph without emitting events. Listeners are kept.
    pub fn clear(&mut self) {
        self.graphs.clear();
        self.order.clear();
    }

    /// Apply a partial update to a graph.
    ///
    /// Replacement node/link collections are validated as a whole (unique ids,
    /// every endpoint present) before anything is written. Side-index entries
    /// of nodes that no longer exist are dropped.
    pub fn update_graph(&mut self, graph_id: &str, update: GraphUpdate) -> Result<Graph> {
        let record = self.record_mut(graph_id)?;

        let candidate = GraphData {
            nodes: update.nodes.unwrap_or_else(|| record.data.nodes.clone()),
            links: update.links.unwrap_or_else(|| record.data.links.clone()),
        };
        candidate.validate()?;

        if let Some(name) = update.name {
            record.name = name;
        }
        record.data = candidate;
        let data = &record.data;
        record
            .entity_links
            .retain(|node_id, _| data.contains_node(node_id));
        record.touch();
        let graph = record.to_graph();

        self.emit(GraphEvent::new(GraphEventKind::GraphUpdated, graph_id).with_payload(&graph));
        Ok(graph)
    }

    /// Delete a graph. Returns `false` if it did not exist.
    pub fn delete_graph(&mut self, graph_id: &str) -> bool {
        if self.graphs.remove(graph_id).is_none() {
            return false;
        }
        self.order.retain(|id| id != graph_id);
        debug!(graph_id = %graph_id, "Graph deleted");
        self.emit(GraphEvent::new(GraphEventKind::GraphDeleted, graph_id));
        true
    }

    /// Write layout coordinates back into the store.
    ///
    /// Only `x`/`y` of nodes present in both the store and `positioned` are
    /// touched. Returns the number of nodes updated.
    pub fn apply_positions(&mut self, graph_id: &str, positioned: &GraphData) -> Result<usize> {
        let record = self.record_mut(graph_id)?;
        let coords: HashMap<&str, (Option<f64>, Option<f64>)> = positioned
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), (n.x, n.y)))
            .collect();

        let mut updated = 0;
        for node in record.data.nodes.iter_mut() {
            if let Some(&(x, y)) = coords.get(node.id.as_str()) {
                node.x = x;
                node.y = y;
                updated += 1;
            }
        }
        record.touch();

        self.emit(
            GraphEvent::new(GraphEventKind::GraphUpdated, graph_id)
                .with_payload(&serde_json::json!({ "positionsUpdated": updated })),
        );
        Ok(updated)
    }

    // ========================================================================
    // Node operations
    // ========================================================================

    /// Add a node with an engine-generated id.
    pub fn add_node(&mut self, graph_id: &str, input: NewNode) -> Result<GraphNode> {
        self.insert_node(graph_id, Uuid::new_v4().to_string(), input)
    }

    /// Add a node with a caller-chosen id. Fails if the id is taken.
    pub fn insert_node(
        &mut self,
        graph_id: &str,
        node_id: impl Into<String>,
        input: NewNode,
    ) -> Result<GraphNode> {
        let node_id = node_id.into();
        let record = self.record_mut(graph_id)?;
        if record.node_position(&node_id).is_some() {
            return Err(GraphError::InvalidInput(format!(
                "Node id {} already exists in graph {}",
                node_id, graph_id
            )));
        }

        let node = GraphNode::from_new(node_id, input);
        record.data.nodes.push(node.clone());
        record.touch();

        self.emit(
            GraphEvent::new(GraphEventKind::NodeAdded, graph_id)
                .with_entity(&node.id)
                .with_payload(&node),
        );
        Ok(node)
    }

    /// Apply a partial update to a node. The id never changes.
    pub fn update_node(
        &mut self,
        graph_id: &str,
        node_id: &str,
        update: NodeUpdate,
    ) -> Result<GraphNode> {
        let record = self.record_mut(graph_id)?;
        let pos = record.require_node(node_id)?;
        update.apply_to(&mut record.data.nodes[pos]);
        let node = record.data.nodes[pos].clone();
        record.touch();

        self.emit(
            GraphEvent::new(GraphEventKind::NodeUpdated, graph_id)
                .with_entity(node_id)
                .with_payload(&node),
        );
        Ok(node)
    }

    /// Delete a node together with every incident link and its side-index
    /// entry. Returns `false` if the node did not exist.
    pub fn delete_node(&mut self, graph_id: &str, node_id: &str) -> Result<bool> {
        let record = self.record_mut(graph_id)?;
        let Some(pos) = record.node_position(node_id) else {
            return Ok(false);
        };

        let node = record.data.nodes.remove(pos);
        let mut removed_links = Vec::new();
        record.data.links.retain(|l| {
            if l.touches(node_id) {
                removed_links.push(l.id.clone());
                false
            } else {
                true
            }
        });
        record.entity_links.remove(node_id);
        record.touch();

        debug!(
            graph_id = %graph_id,
            node_id = %node_id,
            cascaded_links = removed_links.len(),
            "Node deleted"
        );
        self.emit(
            GraphEvent::new(GraphEventKind::NodeDeleted, graph_id)
                .with_entity(node_id)
                .with_payload(&serde_json::json!({
                    "node": node,
                    "removedLinks": removed_links,
                })),
        );
        Ok(true)
    }

    // ========================================================================
    // Link operations
    // ========================================================================

    /// Add a link with an engine-generated id. Both endpoints must exist.
    pub fn add_link(&mut self, graph_id: &str, input: NewLink) -> Result<GraphLink> {
        self.insert_link(graph_id, Uuid::new_v4().to_string(), input)
    }

    /// Add a link with a caller-chosen id. Fails if the id is taken.
    pub fn insert_link(
        &mut self,
        graph_id: &str,
        link_id: impl Into<String>,
        input: NewLink,
    ) -> Result<GraphLink> {
        let link_id = link_id.into();
        let record = self.record_mut(graph_id)?;
        if record.link_position(&link_id).is_some() {
            return Err(GraphError::InvalidInput(format!(
                "Link id {} already exists in graph {}",
                link_id, graph_id
            )));
        }
        record.check_endpoints(&input.source, &input.target)?;

        let link = GraphLink::from_new(link_id, input);
        record.data.links.push(link.clone());
        record.touch();

        self.emit(
            GraphEvent::new(GraphEventKind::LinkAdded, graph_id)
                .with_entity(&link.id)
                .with_payload(&link),
        );
        Ok(link)
    }

    /// Apply a partial update to a link. New endpoints must exist.
    pub fn update_link(
        &mut self,
        graph_id: &str,
        link_id: &str,
        update: LinkUpdate,
    ) -> Result<GraphLink> {
        let record = self.record_mut(graph_id)?;
        let pos = record
            .link_position(link_id)
            .ok_or_else(|| GraphError::LinkNotFound {
                graph_id: graph_id.to_string(),
                link_id: link_id.to_string(),
            })?;

        let current = &record.data.links[pos];
        let source = update.source.unwrap_or_else(|| current.source.clone());
        let target = update.target.unwrap_or_else(|| current.target.clone());
        record.check_endpoints(&source, &target)?;

        let link = &mut record.data.links[pos];
        link.source = source;
        link.target = target;
        if let Some(link_type) = update.link_type {
            link.link_type = link_type;
        }
        if let Some(weight) = update.weight {
            link.weight = Some(weight);
        }
        if let Some(label) = update.label {
            link.label = Some(label);
        }
        let link = link.clone();
        record.touch();

        self.emit(
            GraphEvent::new(GraphEventKind::LinkUpdated, graph_id)
                .with_entity(link_id)
                .with_payload(&link),
        );
        Ok(link)
    }

    /// Delete a link. Returns `false` if it did not exist.
    pub fn delete_link(&mut self, graph_id: &str, link_id: &str) -> Result<bool> {
        let record = self.record_mut(graph_id)?;
        let Some(pos) = record.link_position(link_id) else {
            return Ok(false);
        };
        let link = record.data.links.remove(pos);
        record.touch();

        self.emit(
            GraphEvent::new(GraphEventKind::LinkDeleted, graph_id)
                .with_entity(link_id)
                .with_payload(&link),
        );
        Ok(true)
    }

    // ========================================================================
    // External entity index
    // ========================================================================

    /// Associate a node with an external note. Returns `false` if already linked.
    pub fn link_to_note(&mut self, graph_id: &str, node_id: &str, note_id: &str) -> Result<bool> {
        self.set_entity_link(graph_id, node_id, ExternalEntityType::Note, note_id, true)
    }

    /// Associate a node with an external task. Returns `false` if already linked.
    pub fn link_to_task(&mut self, graph_id: &str, node_id: &str, task_id: &str) -> Result<bool> {
        self.set_entity_link(graph_id, node_id, ExternalEntityType::Task, task_id, true)
    }

    /// Remove a note association. Returns `false` if it was not linked.
    pub fn unlink_from_note(
        &mut self,
        graph_id: &str,
        node_id: &str,
        note_id: &str,
    ) -> Result<bool> {
        self.set_entity_link(graph_id, node_id, ExternalEntityType::Note, note_id, false)
    }

    /// Remove a task association. Returns `false` if it was not linked.
    pub fn unlink_from_task(
        &mut self,
        graph_id: &str,
        node_id: &str,
        task_id: &str,
    ) -> Result<bool> {
        self.set_entity_link(graph_id, node_id, ExternalEntityType::Task, task_id, false)
    }

    fn set_entity_link(
        &mut self,
        graph_id: &str,
        node_id: &str,
        kind: ExternalEntityType,
        entity_id: &str,
        linked: bool,
    ) -> Result<bool> {
        let record = self.record_mut(graph_id)?;
        record.require_node(node_id)?;

        let changed = if linked {
            record
                .entity_links
                .entry(node_id.to_string())
                .or_default()
                .set_mut(kind)
                .insert(entity_id.to_string())
        } else {
            match record.entity_links.get_mut(node_id) {
                Some(links) => {
                    let removed = links.set_mut(kind).remove(entity_id);
                    if links.is_empty() {
                        record.entity_links.remove(node_id);
                    }
                    removed
                }
                None => false,
            }
        };
        if !changed {
            return Ok(false);
        }
        record.touch();

        let event_kind = match (kind, linked) {
            (ExternalEntityType::Note, true) => GraphEventKind::NodeLinkedNote,
            (ExternalEntityType::Task, true) => GraphEventKind::NodeLinkedTask,
            (ExternalEntityType::Note, false) => GraphEventKind::NodeUnlinkedNote,
            (ExternalEntityType::Task, false) => GraphEventKind::NodeUnlinkedTask,
        };
        self.emit(
            GraphEvent::new(event_kind, graph_id)
                .with_entity(node_id)
                .with_related(kind, entity_id),
        );
        Ok(true)
    }

    /// Notes linked to a node, sorted.
    pub fn linked_notes(&self, graph_id: &str, node_id: &str) -> Result<Vec<String>> {
        Ok(self
            .entity_links(graph_id, node_id)?
            .notes
            .into_iter()
            .collect())
    }

    /// Tasks linked to a node, sorted.
    pub fn linked_tasks(&self, graph_id: &str, node_id: &str) -> Result<Vec<String>> {
        Ok(self
            .entity_links(graph_id, node_id)?
            .tasks
            .into_iter()
            .collect())
    }

    /// Side-index entry of a node (empty if it has no associations).
    pub fn entity_links(&self, graph_id: &str, node_id: &str) -> Result<EntityLinks> {
        let record = self.record(graph_id)?;
        record.require_node(node_id)?;
        Ok(record
            .entity_links
            .get(node_id)
            .cloned()
            .unwrap_or_default())
    }

    /// Number of nodes with at least one external association.
    pub fn indexed_node_count(&self, graph_id: &str) -> Result<usize> {
        Ok(self.record(graph_id)?.entity_links.len())
    }
}

// ============================================================================
// Tests
// ============================================================================
