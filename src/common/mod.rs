//! Common types, traits, and error definitions for rust_codriving
//!
//! This module provides the foundational building blocks shared by the
//! trajectory store, the frame utilities and the handoff engine.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
