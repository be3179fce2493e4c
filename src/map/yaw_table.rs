//! Per-route yaw lookup table
//!
//! Recorded (position, heading) samples for each route, used as a heading
//! oracle wherever the traffic backend's own angle is not usable.

use std::collections::HashMap;
use std::path::Path;

use ordered_float::OrderedFloat;
use tracing::warn;

use crate::common::{CoDrivingError, CoDrivingResult, Point2D};

/// One recorded sample along a route
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YawSample {
    pub position: Point2D,
    /// Heading in degrees, traffic-backend convention
    pub heading_deg: f64,
}

/// Route name of an agent id: every `_`-separated part except the last
/// (`"left_down_8"` -> `"left_down"`).
pub fn route_of(agent_id: &str) -> String {
    let parts: Vec<&str> = agent_id.split('_').collect();
    parts[..parts.len() - 1].join("_")
}

#[derive(Debug, Clone, Default)]
pub struct YawLookupTable {
    routes: HashMap<String, Vec<YawSample>>,
}

impl YawLookupTable {
    pub fn new(routes: HashMap<String, Vec<YawSample>>) -> CoDrivingResult<Self> {
        for (route, samples) in &routes {
            if samples.is_empty() {
                return Err(CoDrivingError::Config(format!("yaw route '{}' has no samples", route)));
            }
            if samples.iter().any(|s| !s.position.is_finite() || !s.heading_deg.is_finite()) {
                return Err(CoDrivingError::Config(format!(
                    "yaw route '{}' contains a non-finite sample", route
                )));
            }
        }
        Ok(Self { routes })
    }

    /// Parse `{ "<route>": [[x, y, heading_deg], ...], ... }`
    pub fn from_json_str(json: &str) -> CoDrivingResult<Self> {
        let raw: HashMap<String, Vec<[f64; 3]>> = serde_json::from_str(json)?;
        let routes = raw.into_iter()
            .map(|(route, rows)| {
                let samples = rows.iter()
                    .map(|r| YawSample { position: Point2D::new(r[0], r[1]), heading_deg: r[2] })
                    .collect();
                (route, samples)
            })
            .collect();
        Self::new(routes)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> CoDrivingResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn contains_route(&self, route: &str) -> bool {
        self.routes.contains_key(route)
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Heading of the sample nearest to `position` on `route`, if the route is known
    pub fn lookup(&self, route: &str, position: Point2D) -> Option<f64> {
        self.routes.get(route)?
            .iter()
            .min_by_key(|s| OrderedFloat(s.position.distance(&position)))
            .map(|s| s.heading_deg)
    }

    /// Heading in degrees for `agent_id` at `position`.
    ///
    /// Unknown routes fall back to 0 with a warning.
    pub fn heading_for(&self, agent_id: &str, position: Point2D) -> f64 {
        let route = route_of(agent_id);
        match self.lookup(&route, position) {
            Some(heading) => heading,
            None => {
                warn!(route = %route, agent = %agent_id, "yaw route not found, using default heading");
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASSET: &str = r#"{
        "left_down": [[-50.0, 0.0, 90.0], [-10.0, 0.0, 90.0], [0.0, -10.0, 180.0]],
        "up_down": [[0.0, 50.0, 180.0], [0.0, -50.0, 180.0]]
    }"#;

    #[test]
    fn test_route_of() {
        assert_eq!(route_of("left_down_8"), "left_down");
        assert_eq!(route_of("a_b_c_12"), "a_b_c");
        assert_eq!(route_of("solo"), "");
    }

    #[test]
    fn test_nearest_sample_heading() {
        let table = YawLookupTable::from_json_str(ASSET).unwrap();
        assert_eq!(table.route_count(), 2);
        assert!((table.heading_for("left_down_3", Point2D::new(-12.0, 1.0)) - 90.0).abs() < 1e-10);
        assert!((table.heading_for("left_down_3", Point2D::new(1.0, -8.0)) - 180.0).abs() < 1e-10);
    }

    #[test]
    fn test_unknown_route_defaults_to_zero() {
        let table = YawLookupTable::from_json_str(ASSET).unwrap();
        assert!(table.lookup("right_up", Point2D::origin()).is_none());
        assert_eq!(table.heading_for("right_up_1", Point2D::origin()), 0.0);
    }

    #[test]
    fn test_malformed_assets() {
        assert!(matches!(
            YawLookupTable::from_json_str(r#"{"left_down": []}"#),
            Err(CoDrivingError::Config(_))
        ));
        assert!(matches!(
            YawLookupTable::from_json_str(r#"{"left_down": [[1.0, 2.0]]}"#),
            Err(CoDrivingError::Json(_))
        ));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yaw.json");
        std::fs::write(&path, ASSET).unwrap();
        let table = YawLookupTable::from_json_file(&path).unwrap();
        assert!(table.contains_route("up_down"));

        assert!(matches!(
            YawLookupTable::from_json_file(dir.path().join("missing.json")),
            Err(CoDrivingError::Io(_))
        ));
    }
}
