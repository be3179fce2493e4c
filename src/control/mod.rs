//! Control handoff module
//!
//! Turns predictor output into backend commands and tracks which agents
//! are driven by the predictor.

pub mod config;
pub mod prediction;
pub mod actuation;
pub mod manager;

pub use config::*;
pub use prediction::*;
pub use actuation::*;
pub use manager::*;
