//! Knowledge graph data models.
//!
//! Defines the complete type system of the engine:
//!
//! ## Stored types
//! - [`NodeType`] / [`GraphNode`]: entities (notes, tags, folders, links)
//! - [`LinkType`] / [`GraphLink`]: relations between two nodes
//! - [`GraphData`]: the snapshot unit passed to every analytic function
//! - [`Graph`]: a stored graph record (id, name, timestamps, data)
//!
//! ## Mutation inputs
//! - [`NewNode`], [`NodeUpdate`], [`NewLink`], [`LinkUpdate`], [`GraphUpdate`]
//!
//! ## Output types (analytics)
//! - [`Cluster`], [`GraphPath`], [`GraphStats`], [`SearchResult`]
//!
//! ## Analysis view
//! - [`SnapshotGraph`]: petgraph wrapper with ID ↔ NodeIndex mapping

use chrono::{DateTime, Utc};
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::GraphError;

// ============================================================================
// Core Enums
// ============================================================================

/// Kind of entity a node represents
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    #[default]
    Note,
    Tag,
    Folder,
    Link,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Note => write!(f, "note"),
            Self::Tag => write!(f, "tag"),
            Self::Folder => write!(f, "folder"),
            Self::Link => write!(f, "link"),
        }
    }
}

impl FromStr for NodeType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "note" => Ok(Self::Note),
            "tag" => Ok(Self::Tag),
            "folder" => Ok(Self::Folder),
            "link" => Ok(Self::Link),
            _ => Err(GraphError::InvalidInput(format!("Unknown node type: {}", s))),
        }
    }
}

/// Kind of relation a link represents
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    #[default]
    Reference,
    Tag,
    Folder,
    Similarity,
    Custom,
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => write!(f, "reference"),
            Self::Tag => write!(f, "tag"),
            Self::Folder => write!(f, "folder"),
            Self::Similarity => write!(f, "similarity"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for LinkType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reference" => Ok(Self::Reference),
            "tag" => Ok(Self::Tag),
            "folder" => Ok(Self::Folder),
            "similarity" => Ok(Self::Similarity),
            "custom" => Ok(Self::Custom),
            _ => Err(GraphError::InvalidInput(format!("Unknown link type: {}", s))),
        }
    }
}

// ============================================================================
// Nodes and links
// ============================================================================

/// An entity in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Unique within its graph, immutable once assigned
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Ordered; duplicates are tolerated here and removed by [`GraphNode::unique_tags`]
    #[serde(default)]
    pub tags: Vec<String>,
    /// Display hint, opaque to the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    /// Display hint, opaque to the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GraphNode {
    /// Build a node from a creation request with the given id.
    pub fn from_new(id: impl Into<String>, input: NewNode) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: input.title,
            node_type: input.node_type,
            content: input.content,
            tags: input.tags,
            size: input.size,
            color: input.color,
            x: input.x,
            y: input.y,
            created_at: now,
            updated_at: now,
        }
    }

    /// Tags in first-seen order with duplicates removed.
    pub fn unique_tags(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.tags
            .iter()
            .map(String::as_str)
            .filter(|t| seen.insert(*t))
            .collect()
    }

    /// Current position, `(0, 0)` when unset.
    pub fn position(&self) -> Point {
        Point {
            x: self.x.unwrap_or(0.0),
            y: self.y.unwrap_or(0.0),
        }
    }

    /// True when both coordinates are set.
    pub fn has_position(&self) -> bool {
        self.x.is_some() && self.y.is_some()
    }
}

/// A relation between two nodes of the same graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphLink {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub link_type: LinkType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl GraphLink {
    /// Build a link from a creation request with the given id.
    pub fn from_new(id: impl Into<String>, input: NewLink) -> Self {
        Self {
            id: id.into(),
            source: input.source,
            target: input.target,
            link_type: input.link_type,
            weight: input.weight,
            label: input.label,
        }
    }

    /// Numeric traversal cost. Missing, negative or non-finite weights count as 1.
    pub fn cost(&self) -> f64 {
        match self.weight {
            Some(w) if w.is_finite() && w >= 0.0 => w,
            _ => 1.0,
        }
    }

    /// True when `node_id` is either endpoint.
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// A snapshot of a graph: nodes plus links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub links: Vec<GraphLink>,
}

impl GraphData {
    pub fn new(nodes: Vec<GraphNode>, links: Vec<GraphLink>) -> Self {
        Self { nodes, links }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn link(&self, id: &str) -> Option<&GraphLink> {
        self.links.iter().find(|l| l.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// Degree of every node: one per link endpoint, so a self-loop counts twice.
    ///
    /// Links whose endpoints are not in the snapshot are ignored.
    pub fn degrees(&self) -> HashMap<&str, usize> {
        let mut degrees: HashMap<&str, usize> =
            self.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
        for link in &self.links {
            if !degrees.contains_key(link.source.as_str())
                || !degrees.contains_key(link.target.as_str())
            {
                continue;
            }
            if let Some(d) = degrees.get_mut(link.source.as_str()) {
                *d += 1;
            }
            if let Some(d) = degrees.get_mut(link.target.as_str()) {
                *d += 1;
            }
        }
        degrees
    }

    /// Check id uniqueness and that every link endpoint resolves to a node.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut node_ids = std::collections::HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !node_ids.insert(node.id.as_str()) {
                return Err(GraphError::InvalidInput(format!(
                    "Duplicate node id: {}",
                    node.id
                )));
            }
        }
        let mut link_ids = std::collections::HashSet::with_capacity(self.links.len());
        for link in &self.links {
            if !link_ids.insert(link.id.as_str()) {
                return Err(GraphError::InvalidInput(format!(
                    "Duplicate link id: {}",
                    link.id
                )));
            }
            for endpoint in [&link.source, &link.target] {
                if !node_ids.contains(endpoint.as_str()) {
                    return Err(GraphError::InvalidInput(format!(
                        "Link {} references missing node {}",
                        link.id, endpoint
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A stored graph record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    pub id: String,
    pub name: String,
    pub data: GraphData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Mutation inputs
// ============================================================================

/// Node creation request (everything except id and timestamps).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNode {
    pub title: String,
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

impl NewNode {
    pub fn new(title: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            title: title.into(),
            node_type,
            ..Default::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }
}

/// Partial node update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub node_type: Option<NodeType>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub size: Option<f64>,
    pub color: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl NodeUpdate {
    pub(crate) fn apply_to(self, node: &mut GraphNode) {
        if let Some(title) = self.title {
            node.title = title;
        }
        if let Some(node_type) = self.node_type {
            node.node_type = node_type;
        }
        if let Some(content) = self.content {
            node.content = Some(content);
        }
        if let Some(tags) = self.tags {
            node.tags = tags;
        }
        if let Some(size) = self.size {
            node.size = Some(size);
        }
        if let Some(color) = self.color {
            node.color = Some(color);
        }
        if let Some(x) = self.x {
            node.x = Some(x);
        }
        if let Some(y) = self.y {
            node.y = Some(y);
        }
        node.updated_at = Utc::now();
    }
}

/// Link creation request (everything except id).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLink {
    pub source: String,
    pub target: String,
    #[serde(rename = "type", default)]
    pub link_type: LinkType,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub label: Option<String>,
}

impl NewLink {
    pub fn new(source: impl Into<String>, target: impl Into<String>, link_type: LinkType) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            link_type,
            weight: None,
            label: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Partial link update. Endpoint changes are re-validated by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkUpdate {
    pub source: Option<String>,
    pub target: Option<String>,
    #[serde(rename = "type")]
    pub link_type: Option<LinkType>,
    pub weight: Option<f64>,
    pub label: Option<String>,
}

/// Partial graph update. Replacing nodes or links swaps the whole collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphUpdate {
    pub name: Option<String>,
    pub nodes: Option<Vec<GraphNode>>,
    pub links: Option<Vec<GraphLink>>,
}

// ============================================================================
// Output types
// ============================================================================

/// A 2D coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A colored grouping of nodes produced by a cluster strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub id: String,
    /// Member node ids in snapshot order
    pub nodes: Vec<String>,
    pub center: Point,
    pub radius: f64,
    pub color: String,
    pub label: String,
}

/// Partitioning strategy for [`crate::graph::algorithms::find_clusters`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ClusterAlgorithm {
    #[default]
    Connectivity,
    Tags,
    Type,
}

impl fmt::Display for ClusterAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connectivity => write!(f, "connectivity"),
            Self::Tags => write!(f, "tags"),
            Self::Type => write!(f, "type"),
        }
    }
}

impl FromStr for ClusterAlgorithm {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "connectivity" => Ok(Self::Connectivity),
            "tags" => Ok(Self::Tags),
            "type" => Ok(Self::Type),
            _ => Err(GraphError::InvalidInput(format!(
                "Unknown cluster algorithm: {}",
                s
            ))),
        }
    }
}

/// Shortest path between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPath {
    /// Nodes from source to target, inclusive
    pub nodes: Vec<GraphNode>,
    /// Links traversed, `nodes.len() - 1` of them
    pub links: Vec<GraphLink>,
    /// Hop count
    pub length: usize,
    /// Sum of traversed link costs
    pub weight: f64,
}

impl GraphPath {
    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }
}

/// Aggregate metrics over a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub node_count: usize,
    pub link_count: usize,
    pub avg_connections: f64,
    pub max_connections: usize,
    /// Number of clusters from the connectivity strategy
    pub clusters: usize,
    pub density: f64,
    pub components: usize,
}

/// Inclusive creation-date window. An open bound is unbounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| *at >= s) && self.end.map_or(true, |e| *at <= e)
    }
}

/// Predicate specification for [`crate::graph::filter::filter_graph`].
///
/// Empty collections and `None` fields are unspecified and match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphFilter {
    pub node_types: Vec<NodeType>,
    pub link_types: Vec<LinkType>,
    pub tags: Vec<String>,
    pub date_range: Option<DateRange>,
    pub search_query: Option<String>,
    pub min_connections: Option<usize>,
    pub max_connections: Option<usize>,
}

impl GraphFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node_types(mut self, types: Vec<NodeType>) -> Self {
        self.node_types = types;
        self
    }

    pub fn with_link_types(mut self, types: Vec<LinkType>) -> Self {
        self.link_types = types;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.search_query = Some(query.into());
        self
    }

    pub fn with_connections(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_connections = min;
        self.max_connections = max;
        self
    }
}

/// Free-text search result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
    pub total_results: usize,
}

// ============================================================================
// SnapshotGraph: petgraph wrapper with ID mapping
// ============================================================================

/// Undirected petgraph view of a [`GraphData`] snapshot.
///
/// Node weights are positions in `data.nodes`, edge weights are positions in
/// `data.links`, so results map back to the snapshot without cloning.
/// Links with an endpoint outside the snapshot are skipped.
#[derive(Debug, Clone)]
pub struct SnapshotGraph {
    pub graph: UnGraph<usize, usize>,
    pub id_to_index: HashMap<String, NodeIndex>,
}

impl SnapshotGraph {
    pub fn from_data(data: &GraphData) -> Self {
        let mut graph = UnGraph::with_capacity(data.nodes.len(), data.links.len());
        let mut id_to_index = HashMap::with_capacity(data.nodes.len());
        for (pos, node) in data.nodes.iter().enumerate() {
            let idx = graph.add_node(pos);
            id_to_index.entry(node.id.clone()).or_insert(idx);
        }
        for (pos, link) in data.links.iter().enumerate() {
            if let (Some(&s), Some(&t)) = (
                id_to_index.get(&link.source),
                id_to_index.get(&link.target),
            ) {
                graph.add_edge(s, t, pos);
            }
        }
        Self { graph, id_to_index }
    }

    pub fn get_index(&self, id: &str) -> Option<NodeIndex> {
        self.id_to_index.get(id).copied()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

// ============================================================================
// Tests
// ============================================================================
