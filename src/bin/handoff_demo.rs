//
// Co-driving handoff on a synthetic four-way intersection.
//
// Traffic-only vehicles spawn on the four approaches and drive straight
// through the junction. One physics-hosted vehicle turns from the left
// approach towards the bottom exit. Inside the control radius every
// vehicle is driven by a constant-velocity predictor; outside it they
// follow their native motion again.
//
// Usage: handoff_demo [handoff_config.json]

use std::collections::{HashMap, HashSet};
use std::error::Error;

use indexmap::IndexMap;
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::{info, warn};

use rust_codriving::map::YawSample;
use rust_codriving::trajectory::InteractionGraph;
use rust_codriving::utils::{colors, PathStyle, Visualizer};
use rust_codriving::{
    AgentId, BackendError, CoDrivingManager, ControlNode, ControlNodeGraph, ControlState,
    HandoffConfig, Location, MotionPredictor, PhysicsAgent, Placement, Point2D, PredictorContract,
    RepositionMode, TrafficBackend, YawLookupTable,
};

const DT: f64 = 0.5; // [s]
const SIM_TICKS: usize = 160;
const APPROACH_LENGTH: f64 = 150.0; // [m]
const SPAWN_RATE: f64 = 0.08; // [vehicles/s] per approach
const CRUISE_SPEED: f64 = 8.0; // [m/s]
const CAV_ID: &str = "cav-0";

/// Heading in degrees, measured from +y towards +x
fn heading_of(dx: f64, dy: f64) -> f64 {
    (90.0 - dy.atan2(dx).to_degrees()).rem_euclid(360.0)
}

struct Approach {
    route: &'static str,
    start: Point2D,
    direction: (f64, f64),
}

fn approaches() -> Vec<Approach> {
    vec![
        Approach { route: "left_right", start: Point2D::new(-APPROACH_LENGTH, -2.0), direction: (1.0, 0.0) },
        Approach { route: "right_left", start: Point2D::new(APPROACH_LENGTH, 2.0), direction: (-1.0, 0.0) },
        Approach { route: "up_down", start: Point2D::new(-2.0, APPROACH_LENGTH), direction: (0.0, -1.0) },
        Approach { route: "down_up", start: Point2D::new(2.0, -APPROACH_LENGTH), direction: (0.0, 1.0) },
    ]
}

fn build_yaw_table() -> Result<YawLookupTable, Box<dyn Error>> {
    let mut routes = HashMap::new();
    for approach in approaches() {
        let heading_deg = heading_of(approach.direction.0, approach.direction.1);
        let samples = (0..=60)
            .map(|i| {
                let s = i as f64 * 5.0;
                YawSample {
                    position: Point2D::new(
                        approach.start.x + approach.direction.0 * s,
                        approach.start.y + approach.direction.1 * s,
                    ),
                    heading_deg,
                }
            })
            .collect();
        routes.insert(approach.route.to_string(), samples);
    }

    // physics-hosted vehicles follow the default secondary route
    let mut left_down: Vec<YawSample> = (0..=30)
        .map(|i| YawSample { position: Point2D::new(-APPROACH_LENGTH + i as f64 * 5.0, -2.0), heading_deg: 90.0 })
        .collect();
    left_down.extend((1..=30).map(|i| YawSample {
        position: Point2D::new(-2.0, -2.0 - i as f64 * 5.0),
        heading_deg: 180.0,
    }));
    routes.insert("left_down".to_string(), left_down);

    Ok(YawLookupTable::new(routes)?)
}

#[derive(Debug, Clone, Copy)]
struct Vehicle {
    position: Point2D,
    heading_deg: f64,
    speed: f64,
    /// Moved by someone else since the last native update
    externally_placed: bool,
}

/// Straight-line traffic microsimulator
struct SyntheticTraffic {
    vehicles: IndexMap<AgentId, Vehicle>,
    next_index: usize,
}

impl SyntheticTraffic {
    fn new() -> Self {
        Self { vehicles: IndexMap::new(), next_index: 0 }
    }

    fn spawn<R: Rng>(&mut self, rng: &mut R, speeds: &Normal<f64>) {
        for approach in approaches() {
            if !rng.gen_bool(SPAWN_RATE * DT) {
                continue;
            }
            let id = format!("{}_{}", approach.route, self.next_index);
            self.next_index += 1;
            self.vehicles.insert(id, Vehicle {
                position: approach.start,
                heading_deg: heading_of(approach.direction.0, approach.direction.1),
                speed: speeds.sample(rng).max(1.0),
                externally_placed: false,
            });
        }
    }

    /// Native motion for every vehicle nobody else moved this tick
    fn advance(&mut self, dt: f64) {
        for (id, vehicle) in self.vehicles.iter_mut() {
            if id == CAV_ID {
                continue;
            }
            if vehicle.externally_placed {
                vehicle.externally_placed = false;
                continue;
            }
            let heading = vehicle.heading_deg.to_radians();
            vehicle.position.x += vehicle.speed * heading.sin() * dt;
            vehicle.position.y += vehicle.speed * heading.cos() * dt;
        }
        self.vehicles.retain(|id, v| id == CAV_ID || v.position.norm() <= APPROACH_LENGTH + 10.0);
    }

    /// Mirror a physics-hosted vehicle into the traffic frame
    fn sync(&mut self, cav: &SimulatedCav) {
        let location = cav.current_location();
        let position = Point2D::new(location.x, -location.y);
        let previous = self.vehicles.get(cav.id()).map(|v| v.position);
        let heading_deg = match previous {
            Some(p) if p.distance(&position) > 1e-6 => heading_of(position.x - p.x, position.y - p.y),
            Some(_) => self.vehicles[cav.id()].heading_deg,
            None => 90.0,
        };
        self.vehicles.insert(cav.id().to_string(), Vehicle {
            position,
            heading_deg,
            speed: cav.speed,
            externally_placed: false,
        });
    }
}

impl TrafficBackend for SyntheticTraffic {
    fn active_agent_ids(&self) -> Vec<AgentId> {
        self.vehicles.keys().cloned().collect()
    }

    fn position(&self, id: &str) -> Point2D {
        self.vehicles.get(id).map(|v| v.position).unwrap_or_else(Point2D::origin)
    }

    fn speed(&self, id: &str) -> f64 {
        self.vehicles.get(id).map(|v| v.speed).unwrap_or(0.0)
    }

    fn heading_degrees(&self, id: &str) -> f64 {
        self.vehicles.get(id).map(|v| v.heading_deg).unwrap_or(0.0)
    }

    fn reposition(&mut self, id: &str, placement: Placement, _mode: RepositionMode)
        -> Result<(), BackendError> {
        let vehicle = self.vehicles.get_mut(id)
            .ok_or_else(|| BackendError::traffic(format!("vehicle '{}' is not in the network", id)))?;
        vehicle.position = placement.position();
        vehicle.heading_deg = placement.heading_deg;
        vehicle.externally_placed = true;
        Ok(())
    }
}

/// Physics-hosted vehicle following a straight-line local planner
struct SimulatedCav {
    id: String,
    location: Location,
    route_end: Location,
    speed: f64,
    waypoints: Vec<Location>,
}

impl SimulatedCav {
    fn new(id: &str, location: Location, route_end: Location, speed: f64) -> Self {
        let mut cav = Self { id: id.to_string(), location, route_end, speed, waypoints: Vec::new() };
        cav.set_destination(location, Location::new(0.0, location.y, location.z), true, false);
        cav.waypoints.push(route_end);
        cav
    }

    fn advance(&mut self, dt: f64) {
        let mut budget = self.speed * dt;
        while budget > 0.0 && !self.waypoints.is_empty() {
            let target = self.waypoints[0];
            let (dx, dy) = (target.x - self.location.x, target.y - self.location.y);
            let distance = dx.hypot(dy);
            if distance <= budget {
                self.location = target;
                self.waypoints.remove(0);
                budget -= distance;
            } else {
                self.location = self.location.translated(dx / distance * budget, dy / distance * budget);
                budget = 0.0;
            }
        }
    }
}

impl PhysicsAgent for SimulatedCav {
    fn id(&self) -> &str {
        &self.id
    }

    fn current_location(&self) -> Location {
        self.location
    }

    fn route_end(&self) -> Location {
        self.route_end
    }

    fn set_destination(&mut self, from: Location, to: Location, clean: bool, _end_reset: bool) {
        if clean {
            self.waypoints.clear();
        }
        let length = (to.x - from.x).hypot(to.y - from.y);
        let samples = (length / 2.0).ceil().max(1.0) as usize;
        self.waypoints.extend((1..=samples).map(|i| {
            let s = i as f64 / samples as f64;
            Location::new(from.x + (to.x - from.x) * s, from.y + (to.y - from.y) * s, to.z)
        }));
    }

    fn waypoint_buffer_len(&self) -> usize {
        self.waypoints.len()
    }
}

/// Forecasts straight motion at a fixed step along the local lateral axis
struct ConstantVelocityPredictor {
    step_length: f64,
    contract: PredictorContract,
}

impl MotionPredictor for ConstantVelocityPredictor {
    fn contract(&self) -> PredictorContract {
        self.contract
    }

    fn predict(&mut self, features: &DMatrix<f64>, _graph: &InteractionGraph)
        -> Result<DMatrix<f64>, String> {
        let horizon = self.contract.horizon;
        Ok(DMatrix::from_fn(features.nrows(), self.contract.output_columns(), |_, col| {
            if col % 2 == 0 {
                0.0
            } else {
                self.step_length * (col / 2 + 1).min(horizon) as f64
            }
        }))
    }
}

/// Absolute path of one vehicle, split by who was driving it
#[derive(Default)]
struct RecordedPath {
    segments: Vec<(ControlState, Vec<Point2D>)>,
}

impl RecordedPath {
    fn record(&mut self, state: ControlState, position: Point2D) {
        match self.segments.last_mut() {
            Some((last, points)) if *last == state => points.push(position),
            _ => {
                // share the switch point so segments join up
                let mut points: Vec<Point2D> = self.segments.last()
                    .and_then(|(_, p)| p.last().copied())
                    .into_iter()
                    .collect();
                points.push(position);
                self.segments.push((state, points));
            }
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("rust_codriving=info,handoff_demo=info")
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => HandoffConfig::from_json_file(&path)?,
        None => HandoffConfig::default(),
    };
    info!(
        "Handoff config: control_radius={:.1}, inclusion_radius={:.1}",
        config.control_radius, config.inclusion_radius
    );

    let nodes = ControlNodeGraph::new(vec![ControlNode::new("junction", 0.0, 0.0)], &[])?;
    let predictor = ConstantVelocityPredictor {
        step_length: CRUISE_SPEED * DT,
        contract: PredictorContract::default(),
    };
    let control_radius = config.control_radius;
    let mut manager = CoDrivingManager::new(nodes.clone(), build_yaw_table()?, predictor, config)?;

    let mut rng = StdRng::seed_from_u64(7);
    let speeds = Normal::new(CRUISE_SPEED, 1.0)?;
    let mut traffic = SyntheticTraffic::new();
    // physics frame mirrors y
    let mut cavs = vec![SimulatedCav::new(
        CAV_ID,
        Location::new(-APPROACH_LENGTH, 2.0, 0.0),
        Location::new(-2.0, APPROACH_LENGTH, 0.0),
        CRUISE_SPEED,
    )];

    let mut paths: IndexMap<AgentId, RecordedPath> = IndexMap::new();
    let mut handoffs = 0;
    let mut seen: HashSet<AgentId> = HashSet::new();

    for tick in 0..SIM_TICKS {
        traffic.spawn(&mut rng, &speeds);
        for cav in &cavs {
            traffic.sync(cav);
        }

        let report = manager.step(&mut traffic, cavs.as_mut_slice())?;
        for id in &report.acquired {
            info!(tick, agent = %id, "predictor took control");
        }
        for id in &report.released {
            info!(tick, agent = %id, "handed back to native planner");
            handoffs += 1;
        }
        for id in &report.failed {
            warn!(tick, agent = %id, "command rejected");
        }

        for id in traffic.active_agent_ids() {
            let state = manager.control_state(&id);
            paths.entry(id.clone()).or_default().record(state, traffic.position(&id));
            seen.insert(id);
        }

        traffic.advance(DT);
        for cav in cavs.iter_mut() {
            cav.advance(DT);
        }
    }

    info!(vehicles = seen.len(), handoffs, "simulation finished");

    let mut vis = Visualizer::new();
    vis.set_title("Co-driving handoff")
        .set_x_range(-APPROACH_LENGTH, APPROACH_LENGTH)
        .set_y_range(-APPROACH_LENGTH, APPROACH_LENGTH)
        .plot_control_nodes(&nodes, control_radius);

    let mut native_captioned = false;
    let mut controlled_captioned = false;
    for path in paths.values() {
        for (state, points) in &path.segments {
            let style = match state {
                ControlState::Uncontrolled => {
                    let caption = if native_captioned { "" } else { "Native planner" };
                    native_captioned = true;
                    PathStyle::new(colors::NATIVE_PATH, caption)
                }
                ControlState::Controlled => {
                    let caption = if controlled_captioned { "" } else { "Predictor control" };
                    controlled_captioned = true;
                    PathStyle::new(colors::PREDICTED_PATH, caption).with_line_width(3.0)
                }
            };
            vis.plot_path(points, &style);
        }
    }

    std::fs::create_dir_all("img/control")?;
    vis.save_png("img/control/handoff_demo.png", 800, 800)?;
    info!("Plot saved to img/control/handoff_demo.png");

    Ok(())
}
