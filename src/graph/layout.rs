//! Layout engine: assigns `(x, y)` coordinates to a snapshot's nodes.
//!
//! ## Layouts
//!
//! - **force** (default): iterative simulation: pairwise 1/d² repulsion,
//!   link springs toward `link_distance`, weak pull to the viewport center.
//!   Velocities are damped by `velocity_decay`; `alpha` cools by `alpha_decay`
//!   until it drops under `alpha_min` or `iterations` ticks have run.
//! - **circular**: evenly spaced on one circle
//! - **grid**: `ceil(sqrt(n))` columns
//! - **hierarchical**: BFS levels from root nodes, one row per level
//! - **radial**: BFS rings around the highest-degree node
//!
//! Every layout is deterministic: unset positions are seeded on a
//! phyllotaxis spiral and coincident nodes are separated along a fixed
//! golden-angle direction. A failing layout (invalid tunables or a
//! non-finite coordinate) yields the input snapshot unchanged.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::f64::consts::{PI, TAU};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

use super::models::GraphData;
use crate::error::GraphError;

/// Squared distance floor for repulsion, keeps the force bounded.
const MIN_DISTANCE_SQ: f64 = 1.0;

/// Spacing of the initial phyllotaxis spiral.
const SEED_RADIUS: f64 = 10.0;

/// Fraction of the half-viewport used by circular and radial layouts.
const RING_FILL: f64 = 0.8;

// ============================================================================
// Configuration
// ============================================================================

/// Layout algorithm.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LayoutType {
    #[default]
    Force,
    Circular,
    Hierarchical,
    Grid,
    Radial,
}

impl fmt::Display for LayoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Force => write!(f, "force"),
            Self::Circular => write!(f, "circular"),
            Self::Hierarchical => write!(f, "hierarchical"),
            Self::Grid => write!(f, "grid"),
            Self::Radial => write!(f, "radial"),
        }
    }
}

impl FromStr for LayoutType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "force" => Ok(Self::Force),
            "circular" => Ok(Self::Circular),
            "hierarchical" => Ok(Self::Hierarchical),
            "grid" => Ok(Self::Grid),
            "radial" => Ok(Self::Radial),
            _ => Err(GraphError::InvalidInput(format!("Unknown layout type: {}", s))),
        }
    }
}

/// Layout type plus simulation tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    #[serde(rename = "type")]
    pub layout_type: LayoutType,
    /// Viewport width; the center pull targets `width / 2`
    pub width: f64,
    /// Viewport height; the center pull targets `height / 2`
    pub height: f64,
    /// Rest length of link springs
    pub link_distance: f64,
    pub link_strength: f64,
    /// Pairwise repulsion constant (force = repulsion · alpha / d²)
    pub repulsion: f64,
    pub center_strength: f64,
    /// Upper bound on simulation ticks
    pub iterations: usize,
    pub alpha: f64,
    pub alpha_min: f64,
    pub alpha_decay: f64,
    pub velocity_decay: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            layout_type: LayoutType::Force,
            width: 800.0,
            height: 600.0,
            link_distance: 100.0,
            link_strength: 0.3,
            repulsion: 5000.0,
            center_strength: 0.05,
            iterations: 300,
            alpha: 1.0,
            alpha_min: 0.001,
            // d3 default: 1 - alpha_min^(1/300)
            alpha_decay: 0.0228,
            velocity_decay: 0.4,
        }
    }
}

impl LayoutConfig {
    pub fn new(layout_type: LayoutType) -> Self {
        Self {
            layout_type,
            ..Default::default()
        }
    }

    pub fn with_viewport(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }

    /// Check every tunable is finite and within its range.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let checks: [(&str, f64, bool); 10] = [
            ("width", self.width, self.width > 0.0),
            ("height", self.height, self.height > 0.0),
            ("linkDistance", self.link_distance, self.link_distance >= 0.0),
            ("linkStrength", self.link_strength, self.link_strength >= 0.0),
            ("repulsion", self.repulsion, self.repulsion >= 0.0),
            ("centerStrength", self.center_strength, self.center_strength >= 0.0),
            ("alpha", self.alpha, self.alpha > 0.0 && self.alpha <= 1.0),
            ("alphaMin", self.alpha_min, self.alpha_min >= 0.0),
            (
                "alphaDecay",
                self.alpha_decay,
                (0.0..1.0).contains(&self.alpha_decay),
            ),
            (
                "velocityDecay",
                self.velocity_decay,
                (0.0..=1.0).contains(&self.velocity_decay),
            ),
        ];
        for (name, value, in_range) in checks {
            if !value.is_finite() || !in_range {
                return Err(LayoutError::InvalidConfig { name, value });
            }
        }
        Ok(())
    }
}

/// Failure inside a layout computation. Never escapes [`calculate_layout`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Invalid layout parameter {name}: {value}")]
    InvalidConfig { name: &'static str, value: f64 },

    #[error("Layout produced a non-finite position for node {0}")]
    NonFinite(String),
}

// ============================================================================
// Entry points
// ============================================================================

/// Compute a layout, falling back to the unmodified snapshot on failure.
pub fn calculate_layout(data: &GraphData, config: &LayoutConfig) -> GraphData {
    match try_layout(data, config) {
        Ok(positioned) => positioned,
        Err(e) => {
            warn!(
                layout = %config.layout_type,
                nodes = data.nodes.len(),
                error = %e,
                "Layout failed, returning input unchanged"
            );
            data.clone()
        }
    }
}

/// Compute a layout, reporting failures.
pub fn try_layout(data: &GraphData, config: &LayoutConfig) -> Result<GraphData, LayoutError> {
    config.validate()?;
    let start = std::time::Instant::now();

    let positions = match config.layout_type {
        LayoutType::Force => force_positions(data, config),
        LayoutType::Circular => circular_positions(data.nodes.len(), config),
        LayoutType::Grid => grid_positions(data.nodes.len(), config),
        LayoutType::Hierarchical => hierarchical_positions(data, config),
        LayoutType::Radial => radial_positions(data, config),
    };

    let mut positioned = data.clone();
    for (node, (x, y)) in positioned.nodes.iter_mut().zip(positions) {
        if !x.is_finite() || !y.is_finite() {
            return Err(LayoutError::NonFinite(node.id.clone()));
        }
        node.x = Some(x);
        node.y = Some(y);
    }

    debug!(
        layout = %config.layout_type,
        nodes = data.nodes.len(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "Layout computed"
    );
    Ok(positioned)
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Node id → position, first occurrence wins.
fn index_nodes(data: &GraphData) -> HashMap<&str, usize> {
    let mut index = HashMap::with_capacity(data.nodes.len());
    for (pos, node) in data.nodes.iter().enumerate() {
        index.entry(node.id.as_str()).or_insert(pos);
    }
    index
}

/// Resolved `(source, target)` positions of every link with both endpoints
/// in the snapshot.
fn resolved_links(data: &GraphData) -> Vec<(usize, usize)> {
    let index = index_nodes(data);
    data.links
        .iter()
        .filter_map(|l| {
            Some((
                *index.get(l.source.as_str())?,
                *index.get(l.target.as_str())?,
            ))
        })
        .collect()
}

/// Fixed unit vector for separating coincident nodes `i` and `j`.
fn jitter_direction(i: usize, j: usize) -> (f64, f64) {
    let angle = ((i as f64) * 0.618_034 + (j as f64) * 0.414_214) * TAU;
    (angle.cos(), angle.sin())
}

/// Evenly spread `count` points on a circle, starting at the top.
fn ring(count: usize, radius: f64, center: (f64, f64)) -> Vec<(f64, f64)> {
    if count == 1 && radius == 0.0 {
        return vec![center];
    }
    (0..count)
        .map(|i| {
            let angle = TAU * i as f64 / count as f64 - PI / 2.0;
            (
                center.0 + radius * angle.cos(),
                center.1 + radius * angle.sin(),
            )
        })
        .collect()
}

// ============================================================================
// Force simulation
// ============================================================================

fn force_positions(data: &GraphData, config: &LayoutConfig) -> Vec<(f64, f64)> {
    let n = data.nodes.len();
    let (cx, cy) = config.center();
    let golden = PI * (3.0 - 5f64.sqrt());

    // Keep existing coordinates, seed the rest on a spiral
    let mut pos: Vec<(f64, f64)> = data
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| match (node.x, node.y) {
            (Some(x), Some(y)) => (x, y),
            _ => {
                let r = SEED_RADIUS * (0.5 + i as f64).sqrt();
                let a = i as f64 * golden;
                (cx + r * a.cos(), cy + r * a.sin())
            }
        })
        .collect();
    let mut vel = vec![(0.0f64, 0.0f64); n];
    let links: Vec<(usize, usize)> = resolved_links(data)
        .into_iter()
        .filter(|(s, t)| s != t)
        .collect();

    let mut alpha = config.alpha;
    let mut ticks = 0;
    while ticks < config.iterations && alpha >= config.alpha_min {
        // Repulsion between every pair
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = pos[i].0 - pos[j].0;
                let dy = pos[i].1 - pos[j].1;
                let d2 = dx * dx + dy * dy;
                let (ux, uy) = if d2 > 1e-12 {
                    let d = d2.sqrt();
                    (dx / d, dy / d)
                } else {
                    jitter_direction(i, j)
                };
                let force = config.repulsion * alpha / d2.max(MIN_DISTANCE_SQ);
                vel[i].0 += ux * force;
                vel[i].1 += uy * force;
                vel[j].0 -= ux * force;
                vel[j].1 -= uy * force;
            }
        }

        // Link springs
        for &(s, t) in &links {
            let dx = pos[t].0 - pos[s].0;
            let dy = pos[t].1 - pos[s].1;
            let d = (dx * dx + dy * dy).sqrt();
            if d < 1e-9 {
                continue;
            }
            let k = (d - config.link_distance) / d * config.link_strength * alpha * 0.5;
            vel[s].0 += dx * k;
            vel[s].1 += dy * k;
            vel[t].0 -= dx * k;
            vel[t].1 -= dy * k;
        }

        // Center pull, damping, integration
        for i in 0..n {
            vel[i].0 += (cx - pos[i].0) * config.center_strength * alpha;
            vel[i].1 += (cy - pos[i].1) * config.center_strength * alpha;
            vel[i].0 *= 1.0 - config.velocity_decay;
            vel[i].1 *= 1.0 - config.velocity_decay;
            pos[i].0 += vel[i].0;
            pos[i].1 += vel[i].1;
        }

        alpha *= 1.0 - config.alpha_decay;
        ticks += 1;
    }

    debug!(ticks, alpha, "Force simulation stopped");
    pos
}

// ============================================================================
// Static layouts
// ============================================================================

fn circular_positions(n: usize, config: &LayoutConfig) -> Vec<(f64, f64)> {
    let radius = if n <= 1 {
        0.0
    } else {
        config.width.min(config.height) / 2.0 * RING_FILL
    };
    ring(n, radius, config.center())
}

fn grid_positions(n: usize, config: &LayoutConfig) -> Vec<(f64, f64)> {
    if n == 0 {
        return vec![];
    }
    let cols = (n as f64).sqrt().ceil() as usize;
    let rows = n.div_ceil(cols);
    let cell_w = config.width / cols as f64;
    let cell_h = config.height / rows as f64;
    (0..n)
        .map(|i| {
            let (row, col) = (i / cols, i % cols);
            ((col as f64 + 0.5) * cell_w, (row as f64 + 0.5) * cell_h)
        })
        .collect()
}

/// Spread nodes grouped by level: one row (hierarchical) per level.
fn place_rows(levels: &[usize], config: &LayoutConfig) -> Vec<(f64, f64)> {
    let depth = levels.iter().copied().max().map_or(0, |m| m + 1);
    let mut per_level = vec![0usize; depth];
    for &l in levels {
        per_level[l] += 1;
    }
    let mut placed = vec![0usize; depth];
    levels
        .iter()
        .map(|&l| {
            let slot = placed[l];
            placed[l] += 1;
            let x = (slot as f64 + 0.5) * config.width / per_level[l] as f64;
            let y = (l as f64 + 0.5) * config.height / depth as f64;
            (x, y)
        })
        .collect()
}

/// Directed BFS levels from every node without an incoming link; cycles
/// without a root start from their first node in snapshot order.
fn hierarchical_positions(data: &GraphData, config: &LayoutConfig) -> Vec<(f64, f64)> {
    let n = data.nodes.len();
    let links = resolved_links(data);
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut has_parent = vec![false; n];
    for &(s, t) in &links {
        if s != t {
            children[s].push(t);
            has_parent[t] = true;
        }
    }

    let mut level: Vec<Option<usize>> = vec![None; n];
    let mut queue = VecDeque::new();
    for i in 0..n {
        if !has_parent[i] {
            level[i] = Some(0);
            queue.push_back(i);
        }
    }
    let mut next_root = 0;
    loop {
        while let Some(current) = queue.pop_front() {
            let depth = level[current].unwrap_or(0) + 1;
            for &child in &children[current] {
                if level[child].is_none() {
                    level[child] = Some(depth);
                    queue.push_back(child);
                }
            }
        }
        while next_root < n && level[next_root].is_some() {
            next_root += 1;
        }
        if next_root == n {
            break;
        }
        level[next_root] = Some(0);
        queue.push_back(next_root);
    }

    let levels: Vec<usize> = level.into_iter().map(|l| l.unwrap_or(0)).collect();
    place_rows(&levels, config)
}

/// Undirected BFS rings around the highest-degree node (first wins ties).
/// Nodes it cannot reach go on one extra outer ring.
fn radial_positions(data: &GraphData, config: &LayoutConfig) -> Vec<(f64, f64)> {
    let n = data.nodes.len();
    if n == 0 {
        return vec![];
    }
    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (s, t) in resolved_links(data) {
        if s != t {
            neighbors[s].push(t);
            neighbors[t].push(s);
        }
    }
    let mut hub = 0;
    for i in 1..n {
        if neighbors[i].len() > neighbors[hub].len() {
            hub = i;
        }
    }

    let mut ring_of: Vec<Option<usize>> = vec![None; n];
    ring_of[hub] = Some(0);
    let mut queue = VecDeque::from([hub]);
    while let Some(current) = queue.pop_front() {
        let next = ring_of[current].unwrap_or(0) + 1;
        for &nb in &neighbors[current] {
            if ring_of[nb].is_none() {
                ring_of[nb] = Some(next);
                queue.push_back(nb);
            }
        }
    }
    let reached_depth = ring_of.iter().flatten().copied().max().unwrap_or(0);
    let rings: Vec<usize> = ring_of
        .into_iter()
        .map(|r| r.unwrap_or(reached_depth + 1))
        .collect();

    let ring_count = rings.iter().copied().max().unwrap_or(0);
    let spacing = if ring_count == 0 {
        0.0
    } else {
        config.width.min(config.height) / 2.0 * RING_FILL / ring_count as f64
    };

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); ring_count + 1];
    for (i, &r) in rings.iter().enumerate() {
        members[r].push(i);
    }
    let mut positions = vec![config.center(); n];
    for (r, nodes) in members.iter().enumerate() {
        let placed = ring(nodes.len(), spacing * r as f64, config.center());
        for (&i, p) in nodes.iter().zip(placed) {
            positions[i] = p;
        }
    }
    positions
}

// ============================================================================
// Tests
// ============================================================================
