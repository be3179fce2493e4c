//! Control handoff engine
//!
//! Once per simulation tick:
//! 1. refresh the trajectory store from the traffic backend and forget
//!    controlled agents that left the scene,
//! 2. encode agents within the inclusion radius,
//! 3. call the motion predictor once for all of them,
//! 4. walk the rows in order, driving agents inside the control radius
//!    with the predicted first step and handing agents that left it back
//!    to their native planner.
//!
//! A tick with no encodable agent does nothing past step 1.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use tracing::{debug, error};

use crate::common::{
    AgentId, CoDrivingError, CoDrivingResult, MotionPredictor, PhysicsAgent, TrafficBackend,
};
use crate::control::actuation::{Actuator, Dispatch, PrimaryAgent, SecondaryAgent};
use crate::control::config::HandoffConfig;
use crate::control::prediction::{global_displacement, guarded_first_step, PredictionSet};
use crate::map::{ControlNodeGraph, YawLookupTable};
use crate::trajectory::{
    FeatureEncoder, IntentionResolver, InteractionGraph, SceneContext, Trajectory, TrajectoryStore,
    PREDICTOR_COLUMNS,
};

/// Who currently drives an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// Native planner
    Uncontrolled,
    /// Motion predictor
    Controlled,
}

/// What happened during one step
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    /// Agents fed to the predictor, in row order
    pub predicted: Vec<AgentId>,
    /// Agents that switched to predictor control
    pub acquired: Vec<AgentId>,
    /// Agents handed back to their native planner
    pub released: Vec<AgentId>,
    /// Commands issued to the backends, in issue order
    pub dispatched: Vec<Dispatch>,
    /// Agents whose command was rejected by the backend
    pub failed: Vec<AgentId>,
}

impl StepReport {
    pub fn predictor_invoked(&self) -> bool {
        !self.predicted.is_empty()
    }
}

pub struct CoDrivingManager<P> {
    config: HandoffConfig,
    nodes: ControlNodeGraph,
    yaw_table: YawLookupTable,
    resolver: IntentionResolver,
    encoder: FeatureEncoder,
    store: TrajectoryStore,
    predictor: P,
    controlled: IndexSet<AgentId>,
}

impl<P: MotionPredictor> CoDrivingManager<P> {
    pub fn new(
        nodes: ControlNodeGraph,
        yaw_table: YawLookupTable,
        predictor: P,
        config: HandoffConfig,
    ) -> CoDrivingResult<Self> {
        config.validate()?;

        let contract = predictor.contract();
        if contract.input_columns != PREDICTOR_COLUMNS.len() || contract.horizon == 0 {
            return Err(CoDrivingError::Config(format!(
                "predictor expects {} input columns over {} steps, engine provides {} columns",
                contract.input_columns,
                contract.horizon,
                PREDICTOR_COLUMNS.len()
            )));
        }

        Ok(Self {
            resolver: IntentionResolver::new(&config.default_secondary_route_id),
            encoder: FeatureEncoder::new(config.inclusion_radius),
            store: TrajectoryStore::new(),
            controlled: IndexSet::new(),
            config,
            nodes,
            yaw_table,
            predictor,
        })
    }

    pub fn config(&self) -> &HandoffConfig {
        &self.config
    }

    pub fn predictor(&self) -> &P {
        &self.predictor
    }

    pub fn control_state(&self, id: &str) -> ControlState {
        if self.controlled.contains(id) {
            ControlState::Controlled
        } else {
            ControlState::Uncontrolled
        }
    }

    /// Controlled agents in acquisition order
    pub fn controlled_agents(&self) -> impl Iterator<Item = &str> {
        self.controlled.iter().map(String::as_str)
    }

    pub fn trajectories(&self) -> &indexmap::IndexMap<AgentId, Trajectory> {
        self.store.trajectories()
    }

    pub fn trajectory(&self, id: &str) -> Option<&Trajectory> {
        self.store.get(id)
    }

    /// Advance the engine by one simulation tick.
    ///
    /// `physics` lists the agents co-simulated by the physics backend;
    /// every other active agent is driven through `traffic` alone.
    pub fn step<T, A>(&mut self, traffic: &mut T, physics: &mut [A]) -> CoDrivingResult<StepReport>
    where
        T: TrafficBackend + ?Sized,
        A: PhysicsAgent,
    {
        let active_ids = traffic.active_agent_ids();
        let physics_index: HashMap<String, usize> = physics.iter()
            .enumerate()
            .map(|(i, agent)| (agent.id().to_string(), i))
            .collect();
        let physics_ids: HashSet<&str> = physics_index.keys().map(String::as_str).collect();

        let scene_context = SceneContext {
            nodes: &self.nodes,
            yaw_table: &self.yaw_table,
            resolver: &self.resolver,
            heading_source: self.config.heading_source,
            physics_ids: &physics_ids,
        };
        let trajectories = self.store.update(&active_ids, &*traffic, &scene_context)?;

        // departed agents need no release command
        let active: HashSet<&str> = active_ids.iter().map(String::as_str).collect();
        self.controlled.retain(|id| {
            let present = active.contains(id.as_str());
            if !present {
                debug!(agent = %id, "controlled agent left the scene");
            }
            present
        });

        let mut scene = self.encoder.encode(trajectories);
        let mut report = StepReport::default();
        if scene.is_empty() {
            debug!(active = active_ids.len(), "no agent within inclusion radius");
            return Ok(report);
        }

        let graph = InteractionGraph::fully_connected(scene.len());
        scene.to_secondary_frame()?;
        let raw = self.predictor
            .predict(&scene.predictor_input(), &graph)
            .map_err(CoDrivingError::Predictor)?;
        let predictions = PredictionSet::new(raw, scene.len(), self.predictor.contract())?;

        for (row, id) in scene.agent_ids.iter().enumerate() {
            let position = traffic.position(id);
            let nearest = self.nodes.nearest(position);
            if nearest.excluded {
                continue;
            }

            let physics_slot = physics_index.get(id.as_str()).copied();
            let mut actuator = match physics_slot {
                Some(slot) => Actuator::Secondary(SecondaryAgent {
                    agent: &mut physics[slot],
                    stall_deadband: self.config.stall_deadband,
                    stall_push: self.config.stall_push,
                }),
                None => Actuator::Primary(PrimaryAgent {
                    backend: &mut *traffic,
                    id: id.as_str(),
                    position,
                    route_id: self.resolver.route_id(id, false),
                    yaw_table: &self.yaw_table,
                    mode: self.config.reposition_mode,
                }),
            };

            if nearest.distance < self.config.control_radius {
                if self.controlled.insert(id.clone()) {
                    debug!(agent = %id, node = %nearest.node.id, "agent handed to predictor");
                    report.acquired.push(id.clone());
                }

                let step = guarded_first_step(predictions.first(row), predictions.last(row), &self.config);
                let displacement = global_displacement(step, scene.heading(row));
                match actuator.actuate(displacement) {
                    Ok(dispatch) => report.dispatched.push(dispatch),
                    Err(err) => {
                        error!(agent = %id, error = %err, "failed to move agent");
                        report.failed.push(id.clone());
                    }
                }
            } else if self.controlled.contains(id.as_str()) {
                if let Some(dispatch) = actuator.release() {
                    report.dispatched.push(dispatch);
                }
                self.controlled.shift_remove(id.as_str());
                debug!(agent = %id, "agent handed back to native planner");
                report.released.push(id.clone());
            }
        }

        debug!(
            predicted = scene.len(),
            acquired = report.acquired.len(),
            released = report.released.len(),
            failed = report.failed.len(),
            "step complete"
        );
        report.predicted = scene.agent_ids;
        Ok(report)
    }
}
