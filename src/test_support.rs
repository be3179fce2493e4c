//! Mock backends and fixtures shared by unit tests

use std::collections::HashSet;
use std::io::Write;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use nalgebra::DMatrix;

use crate::common::*;
use crate::map::{ControlNode, ControlNodeGraph, YawLookupTable};
use crate::trajectory::InteractionGraph;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `f` under a fmt subscriber and return what it logged
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buffer = SharedBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (result, logs)
}

/// Nodes at (0, 0), (500, 0) and an excluded one at (1000, 0)
pub fn test_nodes() -> ControlNodeGraph {
    ControlNodeGraph::new(
        vec![
            ControlNode::new("center", 0.0, 0.0),
            ControlNode::new("east", 500.0, 0.0),
            ControlNode::new("excluded", 1000.0, 0.0),
        ],
        &["excluded"],
    ).unwrap()
}

pub fn test_yaw_table() -> YawLookupTable {
    YawLookupTable::from_json_str(r#"{
        "left_right": [[-100.0, 0.0, 90.0], [100.0, 0.0, 90.0]],
        "left_up": [[-100.0, 0.0, 90.0], [0.0, 100.0, 0.0]],
        "left_down": [[-100.0, 0.0, 90.0], [0.0, -100.0, 180.0]],
        "right_left": [[100.0, 0.0, 270.0], [-100.0, 0.0, 270.0]],
        "up_down": [[0.0, 100.0, 180.0], [0.0, -100.0, 180.0], [500.0, 100.0, 180.0], [500.0, -100.0, 180.0]],
        "down_left": [[0.0, -100.0, 0.0], [-100.0, 0.0, 270.0]]
    }"#).unwrap()
}

#[derive(Debug, Clone, Copy)]
struct MockState {
    position: Point2D,
    speed: f64,
    heading_deg: f64,
}

/// Traffic backend over an insertion-ordered set of agents
#[derive(Debug, Default)]
pub struct MockTraffic {
    agents: IndexMap<AgentId, MockState>,
    failing: HashSet<AgentId>,
    pub repositions: Vec<(AgentId, Placement, RepositionMode)>,
}

impl MockTraffic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn place(&mut self, id: &str, position: Point2D, speed: f64, heading_deg: f64) {
        self.agents.insert(id.to_string(), MockState { position, speed, heading_deg });
    }

    pub fn remove(&mut self, id: &str) {
        self.agents.shift_remove(id);
    }

    pub fn fail_reposition(&mut self, id: &str) {
        self.failing.insert(id.to_string());
    }

    fn state(&self, id: &str) -> MockState {
        self.agents[id]
    }
}

impl TrafficBackend for MockTraffic {
    fn active_agent_ids(&self) -> Vec<AgentId> {
        self.agents.keys().cloned().collect()
    }

    fn position(&self, id: &str) -> Point2D {
        self.state(id).position
    }

    fn speed(&self, id: &str) -> f64 {
        self.state(id).speed
    }

    fn heading_degrees(&self, id: &str) -> f64 {
        self.state(id).heading_deg
    }

    fn reposition(&mut self, id: &str, placement: Placement, mode: RepositionMode)
        -> Result<(), BackendError> {
        if self.failing.contains(id) {
            return Err(BackendError::traffic(format!("cannot move '{}'", id)));
        }
        let state = self.agents.get_mut(id)
            .ok_or_else(|| BackendError::traffic(format!("unknown vehicle '{}'", id)))?;
        state.position = placement.position();
        state.heading_deg = placement.heading_deg;
        self.repositions.push((id.to_string(), placement, mode));
        Ok(())
    }
}

/// Physics agent recording every destination update
#[derive(Debug, Clone)]
pub struct MockPhysicsAgent {
    id: String,
    location: Location,
    route_end: Location,
    pub waypoints: usize,
    pub destinations: Vec<(Location, Location, bool, bool)>,
    pub v2x_refreshes: usize,
}

impl MockPhysicsAgent {
    pub fn new(id: &str, location: Location, route_end: Location) -> Self {
        Self {
            id: id.to_string(),
            location,
            route_end,
            waypoints: 5,
            destinations: Vec::new(),
            v2x_refreshes: 0,
        }
    }
}

impl PhysicsAgent for MockPhysicsAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn current_location(&self) -> Location {
        self.location
    }

    fn route_end(&self) -> Location {
        self.route_end
    }

    fn set_destination(&mut self, from: Location, to: Location, clean: bool, end_reset: bool) {
        self.destinations.push((from, to, clean, end_reset));
    }

    fn waypoint_buffer_len(&self) -> usize {
        self.waypoints
    }

    fn refresh_v2x(&mut self) {
        self.v2x_refreshes += 1;
    }
}

/// Predictor returning a fixed forecast and recording its inputs.
///
/// Every row predicts `first_steps[row]` (or `default_first`) at step 0,
/// `(0, last_lateral)` at the final step and zeros in between.
#[derive(Debug, Clone)]
pub struct RecordingPredictor {
    pub contract: PredictorContract,
    pub default_first: (f64, f64),
    pub first_steps: Vec<(f64, f64)>,
    pub last_lateral: f64,
    pub override_output: Option<DMatrix<f64>>,
    pub fail: bool,
    pub calls: usize,
    pub inputs: Vec<DMatrix<f64>>,
    pub edge_counts: Vec<usize>,
}

impl RecordingPredictor {
    pub fn constant(first: (f64, f64), last_lateral: f64) -> Self {
        Self {
            contract: PredictorContract::default(),
            default_first: first,
            first_steps: Vec::new(),
            last_lateral,
            override_output: None,
            fail: false,
            calls: 0,
            inputs: Vec::new(),
            edge_counts: Vec::new(),
        }
    }
}

impl MotionPredictor for RecordingPredictor {
    fn contract(&self) -> PredictorContract {
        self.contract
    }

    fn predict(&mut self, features: &DMatrix<f64>, graph: &InteractionGraph)
        -> Result<DMatrix<f64>, String> {
        self.calls += 1;
        self.inputs.push(features.clone());
        self.edge_counts.push(graph.num_edges());

        if self.fail {
            return Err("model unavailable".to_string());
        }
        if let Some(output) = &self.override_output {
            return Ok(output.clone());
        }

        let cols = self.contract.output_columns();
        let mut out = DMatrix::zeros(features.nrows(), cols);
        for row in 0..features.nrows() {
            let (forward, lateral) = self.first_steps.get(row).copied().unwrap_or(self.default_first);
            out[(row, 0)] = forward;
            out[(row, 1)] = lateral;
            out[(row, cols - 1)] = self.last_lateral;
        }
        Ok(out)
    }
}
