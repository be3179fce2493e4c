//! Predictor input encoding
//!
//! Builds one feature row per agent close enough to its control node and
//! the fully-connected interaction graph over those rows.

use indexmap::IndexMap;
use itertools::iproduct;
use nalgebra::DMatrix;

use crate::common::{AgentId, CoDrivingResult};
use crate::geometry::{batch_to_secondary_frame, STATE_HEADING};
use crate::trajectory::store::Trajectory;

/// Columns of an encoded row: rel_x, rel_y, speed, heading_rad, one-hot(3)
pub const FEATURE_COLUMNS: usize = 7;

/// Columns handed to the predictor: rel_x, rel_y and the intention one-hot
pub const PREDICTOR_COLUMNS: [usize; 5] = [0, 1, 4, 5, 6];

/// Feature rows and the agent ids they belong to, in the same order
#[derive(Debug, Clone)]
pub struct EncodedScene {
    pub features: DMatrix<f64>,
    pub agent_ids: Vec<AgentId>,
}

impl EncodedScene {
    pub fn empty() -> Self {
        Self { features: DMatrix::zeros(0, FEATURE_COLUMNS), agent_ids: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.agent_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agent_ids.is_empty()
    }

    /// Convert every row to the physics frame in place
    pub fn to_secondary_frame(&mut self) -> CoDrivingResult<()> {
        batch_to_secondary_frame(&mut self.features)
    }

    /// Heading column of `row`
    pub fn heading(&self, row: usize) -> f64 {
        self.features[(row, STATE_HEADING)]
    }

    /// Column subset consumed by the predictor
    pub fn predictor_input(&self) -> DMatrix<f64> {
        self.features.select_columns(PREDICTOR_COLUMNS.iter())
    }
}

/// Directed agent-interaction graph over feature rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionGraph {
    edges: Vec<(usize, usize)>,
}

impl InteractionGraph {
    /// Every ordered pair of rows, self-loops included
    pub fn fully_connected(num_agents: usize) -> Self {
        Self { edges: iproduct!(0..num_agents, 0..num_agents).collect() }
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// `[sources, targets]` edge-index layout
    pub fn edge_index(&self) -> [Vec<usize>; 2] {
        let (sources, targets): (Vec<usize>, Vec<usize>) = self.edges.iter().copied().unzip();
        [sources, targets]
    }
}

#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    inclusion_radius: f64,
}

impl FeatureEncoder {
    pub fn new(inclusion_radius: f64) -> Self {
        Self { inclusion_radius }
    }

    /// Encode the latest sample of every agent within the inclusion radius.
    ///
    /// Rows follow the iteration order of `trajectories`.
    pub fn encode(&self, trajectories: &IndexMap<AgentId, Trajectory>) -> EncodedScene {
        let mut data = Vec::new();
        let mut agent_ids = Vec::new();

        for (id, trajectory) in trajectories {
            let latest = match trajectory.latest() {
                Some(entry) => entry,
                None => continue,
            };
            if latest.relative_distance() >= self.inclusion_radius {
                continue;
            }

            data.extend_from_slice(&[latest.rel_x, latest.rel_y, latest.speed, latest.heading_rad]);
            data.extend_from_slice(&latest.intention.one_hot());
            agent_ids.push(id.clone());
        }

        if agent_ids.is_empty() {
            return EncodedScene::empty();
        }

        EncodedScene {
            features: DMatrix::from_row_slice(agent_ids.len(), FEATURE_COLUMNS, &data),
            agent_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;
    use crate::trajectory::{Intention, TrajectoryEntry};

    fn trajectory(rel_x: f64, rel_y: f64, intention: Intention) -> Trajectory {
        let mut t = Trajectory::new();
        t.push(TrajectoryEntry {
            rel_x, rel_y, speed: 7.0, heading_rad: FRAC_PI_2, raw_heading_deg: 90.0, intention,
        });
        t
    }

    #[test]
    fn test_inclusion_radius_and_row_order() {
        let mut trajs = IndexMap::new();
        trajs.insert("b_far".to_string(), trajectory(60.0, 30.0, Intention::Left));
        trajs.insert("c_near".to_string(), trajectory(-3.0, 4.0, Intention::Right));
        trajs.insert("a_near".to_string(), trajectory(10.0, 0.0, Intention::Null));
        trajs.insert("empty".to_string(), Trajectory::new());

        let scene = FeatureEncoder::new(65.0).encode(&trajs);
        assert_eq!(scene.agent_ids, vec!["c_near".to_string(), "a_near".to_string()]);
        assert_eq!(scene.features.shape(), (2, FEATURE_COLUMNS));
        assert_eq!(
            scene.features.row(0).iter().copied().collect::<Vec<_>>(),
            vec![-3.0, 4.0, 7.0, FRAC_PI_2, 0.0, 0.0, 1.0]
        );
        assert_eq!((4..7).map(|c| scene.features[(1, c)]).sum::<f64>(), 0.0);
    }

    #[test]
    fn test_boundary_is_exclusive() {
        let mut trajs = IndexMap::new();
        trajs.insert("edge".to_string(), trajectory(39.0, 52.0, Intention::Straight));
        assert!(FeatureEncoder::new(65.0).encode(&trajs).is_empty());
    }

    #[test]
    fn test_empty_scene_is_well_formed() {
        let scene = FeatureEncoder::new(65.0).encode(&IndexMap::new());
        assert!(scene.is_empty());
        assert_eq!(scene.features.shape(), (0, FEATURE_COLUMNS));
    }

    #[test]
    fn test_predictor_input_after_frame_conversion() {
        let mut trajs = IndexMap::new();
        trajs.insert("x".to_string(), trajectory(5.0, 6.0, Intention::Left));
        let mut scene = FeatureEncoder::new(65.0).encode(&trajs);
        scene.to_secondary_frame().unwrap();

        assert!(scene.heading(0).abs() < 1e-12);
        let input = scene.predictor_input();
        assert_eq!(input.shape(), (1, 5));
        assert_eq!(input.row(0).iter().copied().collect::<Vec<_>>(), vec![5.0, -6.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_interaction_graph() {
        let graph = InteractionGraph::fully_connected(3);
        assert_eq!(graph.num_edges(), 9);
        assert!(graph.edges().contains(&(1, 1)));
        assert!(graph.edges().contains(&(2, 0)));
        let [sources, targets] = graph.edge_index();
        assert_eq!(sources, vec![0, 0, 0, 1, 1, 1, 2, 2, 2]);
        assert_eq!(targets, vec![0, 1, 2, 0, 1, 2, 0, 1, 2]);
        assert_eq!(InteractionGraph::fully_connected(0).num_edges(), 0);
    }
}
