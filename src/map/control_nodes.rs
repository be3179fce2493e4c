//! Control-node graph
//!
//! Static set of named zone anchors. Each node is both the local origin
//! for trajectory samples and the centre of its control radius.

use std::collections::HashSet;
use std::path::Path;

use ordered_float::OrderedFloat;
use serde::Deserialize;

use crate::common::{CoDrivingError, CoDrivingResult, Point2D};

/// A named control point
#[derive(Debug, Clone, PartialEq)]
pub struct ControlNode {
    pub id: String,
    pub coord: Point2D,
}

impl ControlNode {
    pub fn new(id: &str, x: f64, y: f64) -> Self {
        Self { id: id.to_string(), coord: Point2D::new(x, y) }
    }
}

/// Result of a nearest-node query
#[derive(Debug, Clone, Copy)]
pub struct NearestNode<'a> {
    pub node: &'a ControlNode,
    pub distance: f64,
    pub excluded: bool,
}

impl NearestNode<'_> {
    /// Query position expressed relative to the node
    pub fn relative(&self, position: Point2D) -> Point2D {
        position - self.node.coord
    }
}

#[derive(Debug, Deserialize)]
struct NodeRecord {
    id: String,
    coord: [f64; 2],
}

#[derive(Debug, Deserialize)]
struct NodeAsset {
    nodes: Vec<NodeRecord>,
    #[serde(default)]
    excluded: Vec<String>,
}

/// Ordered control nodes plus the subset on which predictor control is disabled
#[derive(Debug, Clone)]
pub struct ControlNodeGraph {
    nodes: Vec<ControlNode>,
    excluded: Vec<bool>,
}

impl ControlNodeGraph {
    /// Build the graph, validating ids and coordinates.
    pub fn new(nodes: Vec<ControlNode>, excluded_ids: &[&str]) -> CoDrivingResult<Self> {
        if nodes.is_empty() {
            return Err(CoDrivingError::Config("control-node set is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for node in &nodes {
            if !node.coord.is_finite() {
                return Err(CoDrivingError::Config(format!(
                    "control node '{}' has a non-finite coordinate", node.id
                )));
            }
            if !seen.insert(node.id.as_str()) {
                return Err(CoDrivingError::Config(format!("duplicate control node '{}'", node.id)));
            }
        }

        for id in excluded_ids {
            if !seen.contains(id) {
                return Err(CoDrivingError::Config(format!(
                    "excluded node '{}' is not a control node", id
                )));
            }
        }

        let excluded = nodes.iter()
            .map(|n| excluded_ids.contains(&n.id.as_str()))
            .collect();

        Ok(Self { nodes, excluded })
    }

    /// Parse `{ "nodes": [{"id": .., "coord": [x, y]}], "excluded": [..] }`
    pub fn from_json_str(json: &str) -> CoDrivingResult<Self> {
        let asset: NodeAsset = serde_json::from_str(json)?;
        let nodes = asset.nodes.into_iter()
            .map(|r| ControlNode { id: r.id, coord: Point2D::new(r.coord[0], r.coord[1]) })
            .collect();
        let excluded: Vec<&str> = asset.excluded.iter().map(String::as_str).collect();
        Self::new(nodes, &excluded)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> CoDrivingResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn nodes(&self) -> &[ControlNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_excluded(&self, id: &str) -> bool {
        self.nodes.iter()
            .zip(&self.excluded)
            .any(|(n, &ex)| ex && n.id == id)
    }

    /// Node minimizing Euclidean distance to `position`. Ties resolve to the
    /// earliest node in construction order.
    pub fn nearest(&self, position: Point2D) -> NearestNode<'_> {
        let (idx, distance) = self.nodes.iter()
            .map(|n| n.coord.distance(&position))
            .enumerate()
            .min_by_key(|&(_, d)| OrderedFloat(d))
            .unwrap_or((0, f64::INFINITY));

        NearestNode {
            node: &self.nodes[idx],
            distance,
            excluded: self.excluded[idx],
        }
    }
}
