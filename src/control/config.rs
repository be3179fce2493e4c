//! Tunable constants of the handoff engine

use std::path::Path;

use serde::Deserialize;

use crate::common::{CoDrivingError, CoDrivingResult, RepositionMode};
use crate::trajectory::HeadingSource;

/// First predicted step substituted when the forecast has collapsed
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct StalledStep {
    pub forward: f64,
    pub lateral: f64,
}

/// Configuration for the handoff engine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    /// Distance to the nearest control node below which the predictor drives
    pub control_radius: f64,
    /// Distance to the nearest control node below which an agent is encoded
    pub inclusion_radius: f64,
    /// A last-step lateral component at or below this marks a collapsed forecast
    pub degenerate_lateral_threshold: f64,
    /// Replacement first step for collapsed forecasts
    pub stalled_step: StalledStep,
    /// Lower bound on the first step's lateral component
    pub min_lateral_step: f64,
    /// Physics displacement components this close to zero are pushed out
    pub stall_deadband: f64,
    /// Magnitude of the push applied inside the deadband
    pub stall_push: f64,
    pub heading_source: HeadingSource,
    /// Route id assumed for physics-hosted agents
    pub default_secondary_route_id: String,
    pub reposition_mode: RepositionMode,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            control_radius: 30.0,
            inclusion_radius: 65.0,
            degenerate_lateral_threshold: 1.0,
            stalled_step: StalledStep { forward: 1e-10, lateral: 1e-8 },
            min_lateral_step: 1e-8,
            stall_deadband: 10.0,
            stall_push: 20.0,
            heading_source: HeadingSource::YawTable,
            default_secondary_route_id: "left_down_8".to_string(),
            reposition_mode: RepositionMode::Free,
        }
    }
}

impl HandoffConfig {
    pub fn from_json_str(json: &str) -> CoDrivingResult<Self> {
        let config: HandoffConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> CoDrivingResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> CoDrivingResult<()> {
        let positive = [
            ("control_radius", self.control_radius),
            ("inclusion_radius", self.inclusion_radius),
            ("stall_push", self.stall_push),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(CoDrivingError::Config(format!("{} must be positive, got {}", name, value)));
            }
        }

        let non_negative = [
            ("stall_deadband", self.stall_deadband),
            ("min_lateral_step", self.min_lateral_step),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(CoDrivingError::Config(format!("{} must be non-negative, got {}", name, value)));
            }
        }

        if !self.degenerate_lateral_threshold.is_finite()
            || !self.stalled_step.forward.is_finite()
            || !self.stalled_step.lateral.is_finite()
        {
            return Err(CoDrivingError::Config("stall guard values must be finite".to_string()));
        }

        if self.default_secondary_route_id.split('_').count() < 3 {
            return Err(CoDrivingError::Config(format!(
                "default route id '{}' must look like <origin>_<destination>_<n>",
                self.default_secondary_route_id
            )));
        }

        Ok(())
    }
}
