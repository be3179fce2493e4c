// Trajectory history, intention resolution and predictor feature encoding

pub mod intention;
pub mod store;
pub mod encoder;

pub use intention::*;
pub use store::*;
pub use encoder::*;
