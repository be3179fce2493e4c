//! Turning intention of an agent
//!
//! Agent ids issued by the route generator are `<origin>_<destination>_<n>`
//! over the four approaches of an intersection. The intention is derived
//! from that pair once, at first observation.

use std::fmt;
use std::str::FromStr;

use crate::common::{CoDrivingError, CoDrivingResult};

/// Turning intention fed to the predictor as a one-hot vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intention {
    Left,
    Straight,
    Right,
    /// Encodes as an all-zero vector; never produced by the resolver
    Null,
}

impl Intention {
    /// `[left, straight, right]`
    pub fn one_hot(&self) -> [f64; 3] {
        match self {
            Intention::Left => [1.0, 0.0, 0.0],
            Intention::Straight => [0.0, 1.0, 0.0],
            Intention::Right => [0.0, 0.0, 1.0],
            Intention::Null => [0.0, 0.0, 0.0],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Intention::Left => "left",
            Intention::Straight => "straight",
            Intention::Right => "right",
            Intention::Null => "null",
        }
    }
}

impl FromStr for Intention {
    type Err = CoDrivingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Intention::Left),
            "straight" => Ok(Intention::Straight),
            "right" => Ok(Intention::Right),
            "null" => Ok(Intention::Null),
            other => Err(CoDrivingError::InvalidIntention(other.to_string())),
        }
    }
}

impl fmt::Display for Intention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Intersection approach, named by its side on the map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approach {
    Left,
    Up,
    Right,
    Down,
}

impl Approach {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Approach::Left),
            "up" => Some(Approach::Up),
            "right" => Some(Approach::Right),
            "down" => Some(Approach::Down),
            _ => None,
        }
    }

    /// Position in counter-clockwise order starting from `left`
    fn ccw_index(&self) -> u8 {
        match self {
            Approach::Left => 0,
            Approach::Down => 1,
            Approach::Right => 2,
            Approach::Up => 3,
        }
    }
}

/// Turn taken when entering from `origin` and leaving towards `destination`.
///
/// Opposite approaches are straight; one step counter-clockwise is a right
/// turn, one step clockwise a left turn. U-turns are not part of the table.
pub fn turn_between(origin: Approach, destination: Approach) -> Option<Intention> {
    match (destination.ccw_index() + 4 - origin.ccw_index()) % 4 {
        1 => Some(Intention::Right),
        2 => Some(Intention::Straight),
        3 => Some(Intention::Left),
        _ => None,
    }
}

/// Maps agent ids to intentions
#[derive(Debug, Clone)]
pub struct IntentionResolver {
    /// Id standing in for agents that carry no route in their id
    default_route_id: String,
}

impl IntentionResolver {
    pub fn new(default_route_id: &str) -> Self {
        Self { default_route_id: default_route_id.to_string() }
    }

    /// Id whose route structure describes this agent
    pub fn route_id<'a>(&'a self, agent_id: &'a str, physics_hosted: bool) -> &'a str {
        if physics_hosted { &self.default_route_id } else { agent_id }
    }

    /// Resolve from the `<origin>_<destination>_...` structure of the id.
    /// Physics-hosted agents use the default route id instead.
    pub fn resolve(&self, agent_id: &str, physics_hosted: bool) -> CoDrivingResult<Intention> {
        let mut parts = self.route_id(agent_id, physics_hosted).split('_');
        let origin = parts.next().and_then(Approach::parse);
        let destination = parts.next().and_then(Approach::parse);

        origin.zip(destination)
            .and_then(|(o, d)| turn_between(o, d))
            .ok_or_else(|| CoDrivingError::UnresolvedIntention(agent_id.to_string()))
    }
}
