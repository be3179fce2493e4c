//! Common types used throughout rust_codriving

use nalgebra::Vector2;

/// Identifier of an agent as issued by the traffic backend
pub type AgentId = String;

/// 2D point representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn norm(&self) -> f64 {
        self.distance(&Point2D::origin())
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl std::ops::Sub for Point2D {
    type Output = Point2D;

    fn sub(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from(tuple: (f64, f64)) -> Self {
        Self { x: tuple.0, y: tuple.1 }
    }
}

impl From<Vector2<f64>> for Point2D {
    fn from(v: Vector2<f64>) -> Self {
        Self { x: v[0], y: v[1] }
    }
}

/// 3D location in the physics backend's world frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Shift in the ground plane, keeping the elevation.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self { x: self.x + dx, y: self.y + dy, z: self.z }
    }
}

/// Absolute placement target for the traffic backend.
///
/// `heading_deg` follows the traffic backend's own angle convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub heading_deg: f64,
}

impl Placement {
    pub fn new(x: f64, y: f64, heading_deg: f64) -> Self {
        Self { x, y, heading_deg }
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }
}

/// How the traffic backend should reconcile a reposition with the road network
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositionMode {
    /// Snap to the nearest edge of any route
    NearestEdge,
    /// Snap to an edge of the agent's current route
    OnRoute,
    /// Place at the exact coordinates, ignoring the network
    Free,
}

impl RepositionMode {
    /// Numeric route-keeping flag understood by the traffic backend
    pub fn keep_route_flag(&self) -> u8 {
        match self {
            RepositionMode::NearestEdge => 0,
            RepositionMode::OnRoute => 1,
            RepositionMode::Free => 2,
        }
    }
}
