//! Utility modules for rust_codriving

pub mod visualization;

pub use visualization::{PathStyle, Visualizer, colors};
