//! Backend-specific actuation of predicted displacements
//!
//! Every agent is hosted either by the traffic backend alone or by the
//! physics backend as well. The variant is resolved once per agent per tick
//! and owns the borrow of whichever backend drives it.

use nalgebra::Vector2;
use tracing::warn;

use crate::common::{
    AgentId, BackendError, Location, PhysicsAgent, Placement, Point2D, RepositionMode, TrafficBackend,
};
use crate::map::YawLookupTable;

/// Command issued to a backend during a step
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Absolute teleport through the traffic backend
    Reposition {
        agent: AgentId,
        placement: Placement,
    },
    /// Local-planner destination update through the physics backend
    Destination {
        agent: AgentId,
        from: Location,
        to: Location,
        end_reset: bool,
    },
}

impl Dispatch {
    pub fn agent(&self) -> &str {
        match self {
            Dispatch::Reposition { agent, .. } => agent,
            Dispatch::Destination { agent, .. } => agent,
        }
    }
}

/// Sign that keeps zero at zero
fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Replace components within `deadband` of zero by a push of `push` in
/// their own direction. Exact zeros stay zero.
pub fn push_out_of_deadband(displacement: Vector2<f64>, deadband: f64, push: f64) -> Vector2<f64> {
    displacement.map(|c| if c.abs() <= deadband { sign(c) * push } else { c })
}

/// Agent moved by teleporting it in the traffic backend
pub struct PrimaryAgent<'a, T: ?Sized> {
    pub backend: &'a mut T,
    pub id: &'a str,
    pub position: Point2D,
    /// Id whose route selects the yaw samples
    pub route_id: &'a str,
    pub yaw_table: &'a YawLookupTable,
    pub mode: RepositionMode,
}

impl<T: TrafficBackend + ?Sized> PrimaryAgent<'_, T> {
    fn actuate(&mut self, displacement: Vector2<f64>) -> Result<Dispatch, BackendError> {
        let next = Point2D::new(self.position.x + displacement[0], self.position.y + displacement[1]);
        let heading_deg = self.yaw_table.heading_for(self.route_id, next);
        let placement = Placement::new(next.x, next.y, heading_deg);

        self.backend.reposition(self.id, placement, self.mode)?;
        Ok(Dispatch::Reposition { agent: self.id.to_string(), placement })
    }
}

/// Agent steered through its physics-backend local planner
pub struct SecondaryAgent<'a, A: ?Sized> {
    pub agent: &'a mut A,
    pub stall_deadband: f64,
    pub stall_push: f64,
}

impl<A: PhysicsAgent + ?Sized> SecondaryAgent<'_, A> {
    fn actuate(&mut self, displacement: Vector2<f64>) -> Dispatch {
        let from = self.agent.current_location();
        let delta = push_out_of_deadband(displacement, self.stall_deadband, self.stall_push);
        // physics y axis is mirrored
        let to = from.translated(delta[0], -delta[1]);

        self.agent.set_destination(from, to, true, false);
        self.agent.refresh_v2x();

        if self.agent.waypoint_buffer_len() == 0 {
            warn!(agent = %self.agent.id(), "waypoint buffer is empty after set_destination");
        }

        Dispatch::Destination { agent: self.agent.id().to_string(), from, to, end_reset: false }
    }

    fn release(&mut self) -> Dispatch {
        let from = self.agent.current_location();
        let to = self.agent.route_end();
        self.agent.set_destination(from, to, true, true);
        self.agent.refresh_v2x();
        Dispatch::Destination { agent: self.agent.id().to_string(), from, to, end_reset: true }
    }
}

/// Closed set of actuation targets
pub enum Actuator<'a, T: ?Sized, A: ?Sized> {
    Primary(PrimaryAgent<'a, T>),
    Secondary(SecondaryAgent<'a, A>),
}

impl<T: TrafficBackend + ?Sized, A: PhysicsAgent + ?Sized> Actuator<'_, T, A> {
    /// Move the agent by a global displacement (traffic convention)
    pub fn actuate(&mut self, displacement: Vector2<f64>) -> Result<Dispatch, BackendError> {
        match self {
            Actuator::Primary(agent) => agent.actuate(displacement),
            Actuator::Secondary(agent) => Ok(agent.actuate(displacement)),
        }
    }

    /// Hand the agent back to its native planner. Traffic-only agents
    /// resume on their own and need no command.
    pub fn release(&mut self) -> Option<Dispatch> {
        match self {
            Actuator::Primary(_) => None,
            Actuator::Secondary(agent) => Some(agent.release()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{capture_logs, test_yaw_table, MockPhysicsAgent, MockTraffic};

    #[test]
    fn test_deadband_push() {
        let pushed = push_out_of_deadband(Vector2::new(3.0, -9.5), 10.0, 20.0);
        assert_eq!(pushed, Vector2::new(20.0, -20.0));

        let untouched = push_out_of_deadband(Vector2::new(10.5, -42.0), 10.0, 20.0);
        assert_eq!(untouched, Vector2::new(10.5, -42.0));

        let zero = push_out_of_deadband(Vector2::new(0.0, 10.0), 10.0, 20.0);
        assert_eq!(zero, Vector2::new(0.0, 20.0));
    }

    #[test]
    fn test_primary_repositions_with_route_heading() {
        let mut traffic = MockTraffic::new();
        traffic.place("left_right_0", Point2D::new(-20.0, 0.0), 8.0, 90.0);
        let yaw_table = test_yaw_table();

        let mut actuator: Actuator<'_, MockTraffic, MockPhysicsAgent> = Actuator::Primary(PrimaryAgent {
            backend: &mut traffic,
            id: "left_right_0",
            position: Point2D::new(-20.0, 0.0),
            route_id: "left_right_0",
            yaw_table: &yaw_table,
            mode: RepositionMode::Free,
        });

        let dispatch = actuator.actuate(Vector2::new(1.5, -0.5)).unwrap();
        assert_eq!(
            dispatch,
            Dispatch::Reposition {
                agent: "left_right_0".to_string(),
                placement: Placement::new(-18.5, -0.5, 90.0),
            }
        );
        assert!(actuator.release().is_none());
        drop(actuator);
        assert_eq!(traffic.repositions.len(), 1);
        assert_eq!(traffic.repositions[0].2, RepositionMode::Free);
    }

    #[test]
    fn test_primary_failure_is_reported() {
        let mut traffic = MockTraffic::new();
        traffic.place("left_right_0", Point2D::new(-20.0, 0.0), 8.0, 90.0);
        traffic.fail_reposition("left_right_0");
        let yaw_table = test_yaw_table();

        let mut actuator: Actuator<'_, MockTraffic, MockPhysicsAgent> = Actuator::Primary(PrimaryAgent {
            backend: &mut traffic,
            id: "left_right_0",
            position: Point2D::new(-20.0, 0.0),
            route_id: "left_right_0",
            yaw_table: &yaw_table,
            mode: RepositionMode::Free,
        });
        assert!(actuator.actuate(Vector2::new(1.0, 1.0)).is_err());
    }

    #[test]
    fn test_secondary_sets_destination_with_mirrored_y() {
        let mut cav = MockPhysicsAgent::new("cav-1", Location::new(100.0, 50.0, 0.3), Location::new(400.0, 50.0, 0.3));
        let mut actuator: Actuator<'_, MockTraffic, MockPhysicsAgent> = Actuator::Secondary(SecondaryAgent {
            agent: &mut cav,
            stall_deadband: 10.0,
            stall_push: 20.0,
        });

        let dispatch = actuator.actuate(Vector2::new(2.0, 30.0)).unwrap();
        assert_eq!(
            dispatch,
            Dispatch::Destination {
                agent: "cav-1".to_string(),
                from: Location::new(100.0, 50.0, 0.3),
                to: Location::new(120.0, 20.0, 0.3),
                end_reset: false,
            }
        );

        let released = actuator.release().unwrap();
        assert_eq!(released.agent(), "cav-1");
        drop(actuator);

        assert_eq!(cav.destinations.len(), 2);
        assert_eq!(cav.destinations[1].1, Location::new(400.0, 50.0, 0.3));
        assert_eq!((cav.destinations[1].2, cav.destinations[1].3), (true, true));
        assert_eq!(cav.v2x_refreshes, 2);
    }

    #[test]
    fn test_empty_waypoint_buffer_still_dispatches() {
        let mut cav = MockPhysicsAgent::new("cav-1", Location::new(0.0, 0.0, 0.0), Location::new(50.0, 0.0, 0.0));
        cav.waypoints = 0;

        let (dispatch, logs) = capture_logs(|| {
            let mut actuator: Actuator<'_, MockTraffic, MockPhysicsAgent> = Actuator::Secondary(SecondaryAgent {
                agent: &mut cav,
                stall_deadband: 10.0,
                stall_push: 20.0,
            });
            actuator.actuate(Vector2::new(15.0, 0.0))
        });

        assert_eq!(
            dispatch.unwrap(),
            Dispatch::Destination {
                agent: "cav-1".to_string(),
                from: Location::new(0.0, 0.0, 0.0),
                to: Location::new(15.0, 0.0, 0.0),
                end_reset: false,
            }
        );
        assert_eq!(cav.destinations.len(), 1);
        assert_eq!(cav.v2x_refreshes, 1);
        assert!(logs.contains("WARN"));
        assert!(logs.contains("waypoint buffer is empty"));
        assert!(logs.contains("cav-1"));
    }

    #[test]
    fn test_filled_waypoint_buffer_logs_nothing() {
        let mut cav = MockPhysicsAgent::new("cav-1", Location::new(0.0, 0.0, 0.0), Location::new(50.0, 0.0, 0.0));
        let (_, logs) = capture_logs(|| {
            let mut actuator: Actuator<'_, MockTraffic, MockPhysicsAgent> = Actuator::Secondary(SecondaryAgent {
                agent: &mut cav,
                stall_deadband: 10.0,
                stall_push: 20.0,
            });
            actuator.actuate(Vector2::new(15.0, 0.0))
        });
        assert!(!logs.contains("waypoint buffer is empty"));
    }
}
