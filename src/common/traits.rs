//! Common traits defining the engine's external collaborators

use nalgebra::DMatrix;

use crate::common::error::BackendError;
use crate::common::types::*;
use crate::trajectory::InteractionGraph;

/// Traffic microsimulator hosting every agent in the scene
pub trait TrafficBackend {
    /// Ids of every agent currently in the scene
    fn active_agent_ids(&self) -> Vec<AgentId>;

    /// Current position in the traffic frame
    fn position(&self, id: &str) -> Point2D;

    /// Current speed
    fn speed(&self, id: &str) -> f64;

    /// Current heading in degrees, in the backend's own convention
    fn heading_degrees(&self, id: &str) -> f64;

    /// Teleport an agent to an absolute placement
    fn reposition(&mut self, id: &str, placement: Placement, mode: RepositionMode)
        -> Result<(), BackendError>;
}

/// Handle to an agent co-simulated by the physics backend
pub trait PhysicsAgent {
    /// Id under which the traffic backend reports this agent
    fn id(&self) -> &str;

    /// Current location in the physics frame
    fn current_location(&self) -> Location;

    /// End point of the agent's native route
    fn route_end(&self) -> Location;

    /// Replan the agent's local planner from `from` towards `to`
    fn set_destination(&mut self, from: Location, to: Location, clean: bool, end_reset: bool);

    /// Number of waypoints queued in the local planner
    fn waypoint_buffer_len(&self) -> usize;

    /// Push the agent's updated plan to its V2X state
    fn refresh_v2x(&mut self) {}
}

/// Shape of the tensors a predictor consumes and produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorContract {
    /// Feature columns per agent row
    pub input_columns: usize,
    /// Predicted timesteps per agent; each step holds two components
    pub horizon: usize,
}

impl Default for PredictorContract {
    fn default() -> Self {
        Self { input_columns: 5, horizon: 30 }
    }
}

impl PredictorContract {
    pub fn output_columns(&self) -> usize {
        self.horizon * 2
    }
}

/// Learned multi-agent motion predictor, consumed as a pure function
pub trait MotionPredictor {
    /// Tensor contract this predictor was built for
    fn contract(&self) -> PredictorContract {
        PredictorContract::default()
    }

    /// Forecast agent-local displacements for every feature row.
    ///
    /// Returns one row per input row with `2 * horizon` columns laid out
    /// as `[forward_0, lateral_0, forward_1, lateral_1, ...]`.
    fn predict(&mut self, features: &DMatrix<f64>, graph: &InteractionGraph)
        -> Result<DMatrix<f64>, String>;
}
