//! Rolling per-agent trajectory history
//!
//! One trajectory per agent reported by the traffic backend, refreshed once
//! per tick and dropped as soon as the agent leaves the scene.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::common::{AgentId, CoDrivingResult, TrafficBackend};
use crate::map::{ControlNodeGraph, YawLookupTable};
use crate::trajectory::intention::{Intention, IntentionResolver};

/// Where the heading of a trajectory sample comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingSource {
    /// Nearest recorded sample on the agent's route
    YawTable,
    /// The traffic backend's reported angle
    Backend,
}

/// One kinematic sample, positioned relative to the nearest control node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryEntry {
    pub rel_x: f64,
    pub rel_y: f64,
    pub speed: f64,
    pub heading_rad: f64,
    /// Angle as reported by the traffic backend
    pub raw_heading_deg: f64,
    pub intention: Intention,
}

impl TrajectoryEntry {
    pub fn relative_distance(&self) -> f64 {
        (self.rel_x.powi(2) + self.rel_y.powi(2)).sqrt()
    }
}

/// Insertion-ordered samples of one agent, most recent last
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    entries: Vec<TrajectoryEntry>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn push(&mut self, entry: TrajectoryEntry) {
        self.entries.push(entry);
    }

    pub fn latest(&self) -> Option<&TrajectoryEntry> {
        self.entries.last()
    }

    /// Intention frozen at the first sample
    pub fn intention(&self) -> Option<Intention> {
        self.entries.first().map(|e| e.intention)
    }

    pub fn entries(&self) -> &[TrajectoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Static inputs shared by every trajectory update
pub struct SceneContext<'a> {
    pub nodes: &'a ControlNodeGraph,
    pub yaw_table: &'a YawLookupTable,
    pub resolver: &'a IntentionResolver,
    pub heading_source: HeadingSource,
    /// Ids hosted by the physics backend
    pub physics_ids: &'a HashSet<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct TrajectoryStore {
    trajectories: IndexMap<AgentId, Trajectory>,
}

impl TrajectoryStore {
    pub fn new() -> Self {
        Self { trajectories: IndexMap::new() }
    }

    /// Append one sample for every active agent and drop agents that left.
    ///
    /// Agents whose nearest node is excluded get no sample this tick but
    /// keep their history. Samples are built for every agent before any is
    /// stored, so a failed update leaves the store untouched.
    pub fn update<T: TrafficBackend + ?Sized>(
        &mut self,
        active_ids: &[AgentId],
        backend: &T,
        scene: &SceneContext<'_>,
    ) -> CoDrivingResult<&IndexMap<AgentId, Trajectory>> {
        let mut samples = Vec::with_capacity(active_ids.len());
        for id in active_ids {
            let position = backend.position(id);
            let nearest = scene.nodes.nearest(position);
            if nearest.excluded {
                samples.push((id, None));
                continue;
            }

            let physics_hosted = scene.physics_ids.contains(id.as_str());
            let speed = backend.speed(id);
            let raw_heading_deg = backend.heading_degrees(id);
            let heading_deg = match scene.heading_source {
                HeadingSource::YawTable => {
                    let route_id = scene.resolver.route_id(id, physics_hosted);
                    scene.yaw_table.heading_for(route_id, position)
                }
                HeadingSource::Backend => raw_heading_deg,
            };

            let known = self.trajectories.get(id).and_then(Trajectory::intention);
            let intention = match known {
                Some(intention) => intention,
                None => scene.resolver.resolve(id, physics_hosted)?,
            };

            let rel = nearest.relative(position);
            samples.push((id, Some(TrajectoryEntry {
                rel_x: rel.x,
                rel_y: rel.y,
                speed,
                heading_rad: heading_deg.to_radians(),
                raw_heading_deg,
                intention,
            })));
        }

        for (id, entry) in samples {
            let trajectory = self.trajectories.entry(id.clone()).or_default();
            if let Some(entry) = entry {
                trajectory.push(entry);
            }
        }

        let active: HashSet<&str> = active_ids.iter().map(String::as_str).collect();
        self.trajectories.retain(|id, _| active.contains(id.as_str()));

        Ok(&self.trajectories)
    }

    pub fn get(&self, id: &str) -> Option<&Trajectory> {
        self.trajectories.get(id)
    }

    pub fn trajectories(&self) -> &IndexMap<AgentId, Trajectory> {
        &self.trajectories
    }

    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }
}
