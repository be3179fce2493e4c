//! Interpretation of predictor output
//!
//! Each predicted row holds `horizon` agent-local steps of
//! `(forward, lateral)`. Only the first step is actuated; the last step
//! tells whether the forecast has collapsed onto a stopped agent.

use nalgebra::{DMatrix, Vector2};

use crate::common::{CoDrivingError, CoDrivingResult, PredictorContract};
use crate::control::config::HandoffConfig;
use crate::geometry::rotate_local_to_global;

/// One predicted step in the agent-local frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalDelta {
    pub forward: f64,
    pub lateral: f64,
}

impl LocalDelta {
    pub fn new(forward: f64, lateral: f64) -> Self {
        Self { forward, lateral }
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.forward, self.lateral)
    }
}

/// Predictor output with a verified shape
#[derive(Debug, Clone)]
pub struct PredictionSet {
    steps: DMatrix<f64>,
    horizon: usize,
}

impl PredictionSet {
    /// Wrap raw output, rejecting anything but `num_agents x 2*horizon`
    pub fn new(raw: DMatrix<f64>, num_agents: usize, contract: PredictorContract) -> CoDrivingResult<Self> {
        let expected_cols = contract.output_columns();
        if raw.nrows() != num_agents || raw.ncols() != expected_cols || contract.horizon == 0 {
            return Err(CoDrivingError::PredictionShape {
                expected_rows: num_agents,
                expected_cols,
                rows: raw.nrows(),
                cols: raw.ncols(),
            });
        }
        Ok(Self { steps: raw, horizon: contract.horizon })
    }

    pub fn num_agents(&self) -> usize {
        self.steps.nrows()
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn step(&self, row: usize, t: usize) -> LocalDelta {
        LocalDelta::new(self.steps[(row, 2 * t)], self.steps[(row, 2 * t + 1)])
    }

    pub fn first(&self, row: usize) -> LocalDelta {
        self.step(row, 0)
    }

    pub fn last(&self, row: usize) -> LocalDelta {
        self.step(row, self.horizon - 1)
    }
}

/// First step to actuate, guarded against collapsed forecasts.
///
/// A last step with lateral component at or below the threshold replaces
/// the first step with the configured near-zero step; otherwise the first
/// step's lateral component is floored.
pub fn guarded_first_step(first: LocalDelta, last: LocalDelta, config: &HandoffConfig) -> LocalDelta {
    if last.lateral <= config.degenerate_lateral_threshold {
        LocalDelta::new(config.stalled_step.forward, config.stalled_step.lateral)
    } else {
        LocalDelta::new(first.forward, first.lateral.max(config.min_lateral_step))
    }
}

/// Global displacement for a local step of an agent whose physics-frame
/// heading is `yaw`, with y expressed in the traffic convention.
pub fn global_displacement(local: LocalDelta, yaw: f64) -> Vector2<f64> {
    let mut global = rotate_local_to_global(local.to_vector(), yaw);
    global[1] = -global[1];
    global
}
