//! Graph analytics algorithms.
//!
//! Pure functions over a [`GraphData`] snapshot:
//! - **Stats**: counts, degree statistics, density and component count
//! - **Connected components**: BFS on the undirected [`SnapshotGraph`] view
//! - **Clusters**: three partitioning strategies built on
//!   `petgraph::unionfind::UnionFind` (connectivity, shared tags, node type)
//! - **Shortest path**: Dijkstra with stable tie-breaking (custom implementation)
//!
//! Nothing here mutates the snapshot or caches results. Links whose endpoints
//! are not part of the snapshot are skipped.

use petgraph::unionfind::UnionFind;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use tracing::debug;

use super::models::{
    Cluster, ClusterAlgorithm, GraphData, GraphPath, GraphStats, Point, SnapshotGraph,
};

/// Cluster colors, indexed by cluster order (d3 category10).
pub const CLUSTER_PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Smallest radius reported for a cluster, so singletons stay visible.
pub const MIN_CLUSTER_RADIUS: f64 = 30.0;

/// Map node id → position in `data.nodes`. First occurrence wins.
fn index_nodes(data: &GraphData) -> HashMap<&str, usize> {
    let mut index = HashMap::with_capacity(data.nodes.len());
    for (pos, node) in data.nodes.iter().enumerate() {
        index.entry(node.id.as_str()).or_insert(pos);
    }
    index
}

// ============================================================================
// Stats
// ============================================================================

/// Compute aggregate metrics for a snapshot.
///
/// `density` counts distinct unordered pairs of distinct connected nodes, so
/// parallel links and self-loops never push it above 1.
pub fn calculate_stats(data: &GraphData) -> GraphStats {
    let start = std::time::Instant::now();
    let n = data.nodes.len();
    if n == 0 {
        return GraphStats::default();
    }

    let degrees = data.degrees();
    let total_degree: usize = degrees.values().sum();
    let max_connections = degrees.values().copied().max().unwrap_or(0);

    let index = index_nodes(data);
    let mut pairs: HashSet<(usize, usize)> = HashSet::new();
    for link in data.links.iter().filter(|l| !l.is_self_loop()) {
        if let (Some(&s), Some(&t)) = (
            index.get(link.source.as_str()),
            index.get(link.target.as_str()),
        ) {
            pairs.insert((s.min(t), s.max(t)));
        }
    }
    let density = if n < 2 {
        0.0
    } else {
        pairs.len() as f64 / (n * (n - 1) / 2) as f64
    };

    let stats = GraphStats {
        node_count: n,
        link_count: data.links.len(),
        avg_connections: total_degree as f64 / n as f64,
        max_connections,
        clusters: find_clusters(data, ClusterAlgorithm::Connectivity).len(),
        density,
        components: connected_components(data),
    };

    debug!(
        nodes = n,
        links = stats.link_count,
        elapsed_us = start.elapsed().as_micros() as u64,
        "Stats computed"
    );
    stats
}

// ============================================================================
// Connected Components
// ============================================================================

/// Count connected components, ignoring link direction and type.
pub fn connected_components(data: &GraphData) -> usize {
    let snapshot = SnapshotGraph::from_data(data);
    let g = &snapshot.graph;
    let n = g.node_count();
    if n == 0 {
        return 0;
    }

    let mut visited = vec![false; n];
    let mut components = 0;

    for start in g.node_indices() {
        if visited[start.index()] {
            continue;
        }
        // BFS from this node
        let mut queue = VecDeque::new();
        queue.push_back(start);
        visited[start.index()] = true;

        while let Some(current) = queue.pop_front() {
            for neighbor in g.neighbors(current) {
                if !visited[neighbor.index()] {
                    visited[neighbor.index()] = true;
                    queue.push_back(neighbor);
                }
            }
        }
        components += 1;
    }

    components
}

// ============================================================================
// Clusters
// ============================================================================

/// Partition a snapshot's nodes with the given strategy.
///
/// Clusters are ordered by the first appearance of any member in
/// `data.nodes`; members keep snapshot order. Every node belongs to exactly
/// one cluster.
pub fn find_clusters(data: &GraphData, algorithm: ClusterAlgorithm) -> Vec<Cluster> {
    if data.nodes.is_empty() {
        return vec![];
    }

    let groups = match algorithm {
        ClusterAlgorithm::Connectivity => connectivity_groups(data),
        ClusterAlgorithm::Tags => tag_groups(data),
        ClusterAlgorithm::Type => type_groups(data),
    };

    groups
        .into_iter()
        .enumerate()
        .map(|(i, members)| {
            let label = match algorithm {
                ClusterAlgorithm::Connectivity => format!("Cluster {}", i + 1),
                ClusterAlgorithm::Tags => {
                    dominant_tag(data, &members).unwrap_or_else(|| format!("Cluster {}", i + 1))
                }
                ClusterAlgorithm::Type => data.nodes[members[0]].node_type.to_string(),
            };
            build_cluster(data, i, &members, label)
        })
        .collect()
}

/// Group node positions by union-find root, in first-appearance order.
fn collect_groups(uf: &UnionFind<usize>, n: usize) -> Vec<Vec<usize>> {
    let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for pos in 0..n {
        let root = uf.find(pos);
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(pos);
    }
    groups
}

fn connectivity_groups(data: &GraphData) -> Vec<Vec<usize>> {
    let n = data.nodes.len();
    let index = index_nodes(data);
    let mut uf = UnionFind::new(n);
    for link in &data.links {
        if let (Some(&s), Some(&t)) = (
            index.get(link.source.as_str()),
            index.get(link.target.as_str()),
        ) {
            uf.union(s, t);
        }
    }
    collect_groups(&uf, n)
}

fn tag_groups(data: &GraphData) -> Vec<Vec<usize>> {
    let n = data.nodes.len();
    let mut uf = UnionFind::new(n);
    let mut first_holder: HashMap<&str, usize> = HashMap::new();
    for (pos, node) in data.nodes.iter().enumerate() {
        for tag in node.unique_tags() {
            match first_holder.get(tag) {
                Some(&holder) => {
                    uf.union(holder, pos);
                }
                None => {
                    first_holder.insert(tag, pos);
                }
            }
        }
    }
    collect_groups(&uf, n)
}

fn type_groups(data: &GraphData) -> Vec<Vec<usize>> {
    let mut slot_of_type = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (pos, node) in data.nodes.iter().enumerate() {
        let slot = *slot_of_type.entry(node.node_type).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(pos);
    }
    groups
}

/// Most common tag among members; ties go to the tag seen first.
fn dominant_tag(data: &GraphData, members: &[usize]) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for &pos in members {
        for tag in data.nodes[pos].unique_tags() {
            match counts.iter_mut().find(|(t, _)| *t == tag) {
                Some((_, c)) => *c += 1,
                None => counts.push((tag, 1)),
            }
        }
    }
    let mut best: Option<(&str, usize)> = None;
    for (tag, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((tag, count));
        }
    }
    best.map(|(tag, _)| tag.to_string())
}

fn build_cluster(data: &GraphData, order: usize, members: &[usize], label: String) -> Cluster {
    let points: Vec<Point> = members.iter().map(|&p| data.nodes[p].position()).collect();
    let count = points.len().max(1) as f64;
    let center = Point {
        x: points.iter().map(|p| p.x).sum::<f64>() / count,
        y: points.iter().map(|p| p.y).sum::<f64>() / count,
    };
    let radius = points
        .iter()
        .map(|p| p.distance(&center))
        .fold(MIN_CLUSTER_RADIUS, f64::max);

    Cluster {
        id: format!("cluster-{}", order),
        nodes: members.iter().map(|&p| data.nodes[p].id.clone()).collect(),
        center,
        radius,
        color: CLUSTER_PALETTE[order % CLUSTER_PALETTE.len()].to_string(),
        label,
    }
}

// ============================================================================
// Shortest path (Dijkstra)
// ============================================================================

/// Priority-queue entry. Lower cost first, then earlier insertion.
#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    cost: f64,
    seq: usize,
    node: usize,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Find the cheapest path between two nodes, treating links as undirected.
///
/// Link cost is [`GraphLink::cost`](super::models::GraphLink::cost). Among
/// equal-cost paths, the one discovered first in link order wins.
/// Returns `None` when either endpoint is unknown or the target is unreachable.
pub fn find_shortest_path(data: &GraphData, source: &str, target: &str) -> Option<GraphPath> {
    let index = index_nodes(data);
    let &src = index.get(source)?;
    let &dst = index.get(target)?;

    if src == dst {
        return Some(GraphPath {
            nodes: vec![data.nodes[src].clone()],
            links: vec![],
            length: 0,
            weight: 0.0,
        });
    }

    // Adjacency in link order: (neighbor, link position)
    let n = data.nodes.len();
    let mut adjacency: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
    for (link_pos, link) in data
        .links
        .iter()
        .enumerate()
        .filter(|(_, l)| !l.is_self_loop())
    {
        if let (Some(&s), Some(&t)) = (
            index.get(link.source.as_str()),
            index.get(link.target.as_str()),
        ) {
            adjacency[s].push((t, link_pos));
            adjacency[t].push((s, link_pos));
        }
    }

    let mut dist = vec![f64::INFINITY; n];
    let mut prev: Vec<Option<(usize, usize)>> = vec![None; n];
    let mut heap = BinaryHeap::new();
    let mut seq = 0;

    dist[src] = 0.0;
    heap.push(QueueEntry {
        cost: 0.0,
        seq,
        node: src,
    });

    while let Some(QueueEntry { cost, node, .. }) = heap.pop() {
        if node == dst {
            break;
        }
        if cost > dist[node] {
            continue; // stale entry
        }
        for &(neighbor, link_pos) in &adjacency[node] {
            let next = cost + data.links[link_pos].cost();
            if next < dist[neighbor] {
                dist[neighbor] = next;
                prev[neighbor] = Some((node, link_pos));
                seq += 1;
                heap.push(QueueEntry {
                    cost: next,
                    seq,
                    node: neighbor,
                });
            }
        }
    }

    if !dist[dst].is_finite() {
        return None;
    }

    // Walk predecessors back to the source
    let mut node_positions = vec![dst];
    let mut link_positions = Vec::new();
    let mut current = dst;
    while let Some((parent, link_pos)) = prev[current] {
        node_positions.push(parent);
        link_positions.push(link_pos);
        current = parent;
    }
    node_positions.reverse();
    link_positions.reverse();

    Some(GraphPath {
        length: link_positions.len(),
        weight: dist[dst],
        nodes: node_positions
            .into_iter()
            .map(|p| data.nodes[p].clone())
            .collect(),
        links: link_positions
            .into_iter()
            .map(|p| data.links[p].clone())
            .collect(),
    })
}

// ============================================================================
// Tests
// ============================================================================
