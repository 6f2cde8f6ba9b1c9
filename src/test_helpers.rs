//! Test helper factories for graph snapshots
//!
//! Provides convenience functions for creating nodes, links and small
//! canonical graphs with sensible defaults.
#![allow(dead_code)]

use crate::graph::models::{GraphData, GraphLink, GraphNode, LinkType, NewLink, NewNode, NodeType};

// ============================================================================
// Entity factories
// ============================================================================

/// Create a node whose title equals its id
pub fn node(id: &str, node_type: NodeType) -> GraphNode {
    GraphNode::from_new(id, NewNode::new(id, node_type))
}

/// Create a note node carrying the given tags
pub fn node_with_tags(id: &str, tags: &[&str]) -> GraphNode {
    GraphNode::from_new(
        id,
        NewNode::new(id, NodeType::Note).with_tags(tags.iter().copied()),
    )
}

/// Create a positioned note node
pub fn node_at(id: &str, x: f64, y: f64) -> GraphNode {
    GraphNode::from_new(id, NewNode::new(id, NodeType::Note).at(x, y))
}

/// Create an unweighted reference link
pub fn link(id: &str, source: &str, target: &str) -> GraphLink {
    GraphLink::from_new(id, NewLink::new(source, target, LinkType::Reference))
}

/// Create a weighted reference link
pub fn weighted_link(id: &str, source: &str, target: &str, weight: f64) -> GraphLink {
    GraphLink::from_new(
        id,
        NewLink::new(source, target, LinkType::Reference).with_weight(weight),
    )
}

// ============================================================================
// Canonical graphs
// ============================================================================

/// Linear chain: node_0: node_1: ...: node_{n-1}
pub fn make_chain_graph(n: usize) -> GraphData {
    let nodes: Vec<GraphNode> = (0..n)
        .map(|i| node(&format!("node_{}", i), NodeType::Note))
        .collect();
    let links = (1..n)
        .map(|i| {
            link(
                &format!("link_{}", i),
                &format!("node_{}", i - 1),
                &format!("node_{}", i),
            )
        })
        .collect();
    GraphData::new(nodes, links)
}

/// Star: center linked to leaf_0..leaf_{n-1}
pub fn make_star_graph(n_leaves: usize) -> GraphData {
    let mut nodes = vec![node("center", NodeType::Note)];
    let mut links = Vec::with_capacity(n_leaves);
    for i in 0..n_leaves {
        let id = format!("leaf_{}", i);
        nodes.push(node(&id, NodeType::Note));
        links.push(link(&format!("link_{}", i), "center", &id));
    }
    GraphData::new(nodes, links)
}

/// A, B, C with links A–B (id "ab") and B–C (id "bc")
pub fn make_abc_graph() -> GraphData {
    GraphData::new(
        vec![
            node("A", NodeType::Note),
            node("B", NodeType::Note),
            node("C", NodeType::Note),
        ],
        vec![link("ab", "A", "B"), link("bc", "B", "C")],
    )
}

/// Two components {a, b} and {c, d} plus the isolated node e
pub fn make_disconnected_graph() -> GraphData {
    GraphData::new(
        vec![
            node("a", NodeType::Note),
            node("b", NodeType::Note),
            node("c", NodeType::Note),
            node("d", NodeType::Note),
            node("e", NodeType::Note),
        ],
        vec![link("ab", "a", "b"), link("cd", "c", "d")],
    )
}

/// Notes n1 ["ai", "ml"] and n2 ["ai"] and the tag node t1, no links
pub fn make_tagged_graph() -> GraphData {
    GraphData::new(
        vec![
            node_with_tags("n1", &["ai", "ml"]),
            node_with_tags("n2", &["ai"]),
            node("t1", NodeType::Tag),
        ],
        vec![],
    )
}
