// Coordinate frame utilities

pub mod frame;

pub use frame::*;
