//! rust_codriving - control handoff between a traffic microsimulator and a
//! physics simulator
//!
//! This crate keeps a rolling trajectory history per agent, encodes agents
//! near designated control nodes for a learned motion predictor, converts
//! its forecasts into backend-specific commands, and hands agents back to
//! their native planners when they leave a control zone.

// Core modules
pub mod common;
pub mod utils;

// Engine modules
pub mod map;
pub mod geometry;
pub mod trajectory;
pub mod control;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export common types for convenience
pub use common::{AgentId, Location, Placement, Point2D, RepositionMode};
pub use common::{MotionPredictor, PhysicsAgent, PredictorContract, TrafficBackend};
pub use common::{BackendError, CoDrivingError, CoDrivingResult};
pub use control::{CoDrivingManager, ControlState, Dispatch, HandoffConfig, StepReport};
pub use map::{ControlNode, ControlNodeGraph, YawLookupTable};
