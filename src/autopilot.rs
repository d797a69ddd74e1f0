// Waypoint follower: turns a planned route into driving actions
//
// Works only from what the status record reports (position, heading, speed)
// and only speaks the command vocabulary, so it drives the vehicle the same
// way a person at the keyboard would. Large heading errors are corrected by
// stopping and pivoting in place; small ones are left to the next waypoint.

use tracing::{debug, info};

use crate::config::{
    ARRIVAL_RADIUS, CRUISE_MAGNITUDE, HEADING_TOLERANCE_DEG, PIVOT_MAGNITUDE,
    SMOOTHING_ITERATIONS, STOPPED_KMH,
};
use crate::messages::{Action, VehicleStatus, normalize_heading};
use crate::navigation::{PathPlanner, Point, smooth_path};

/// One command the autopilot wants sent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Maneuver {
    pub action: Action,
    pub magnitude: f64,
}

impl Maneuver {
    fn new(action: Action, magnitude: f64) -> Self {
        Self { action, magnitude }
    }
}

pub struct Autopilot {
    waypoints: Vec<Point>,
    next: usize,
    last: Option<Maneuver>,
}

impl Autopilot {
    pub fn new(waypoints: Vec<Point>) -> Self {
        info!("Following {} waypoints", waypoints.len());
        Self {
            waypoints,
            next: 0,
            last: None,
        }
    }

    /// Plan and smooth a route from `from` to `goal`
    pub fn plan(planner: &PathPlanner, from: Point, goal: Point) -> Option<Self> {
        let route = planner.find_path(from, goal)?;
        Some(Self::new(smooth_path(&route, SMOOTHING_ITERATIONS)))
    }

    pub fn remaining(&self) -> &[Point] {
        &self.waypoints[self.next.min(self.waypoints.len())..]
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.waypoints.len()
    }

    /// Forget the last maneuver so the next `decide` repeats it, e.g. after
    /// the command failed to send
    pub fn resend(&mut self) {
        self.last = None;
    }

    /// Maneuver for the current status, or `None` when it is the same as the
    /// one already sent.
    pub fn decide(&mut self, status: &VehicleStatus) -> Option<Maneuver> {
        let wanted = self.maneuver(status);
        if self.last == Some(wanted) {
            return None;
        }
        debug!("Autopilot: {:?}", wanted);
        self.last = Some(wanted);
        Some(wanted)
    }

    fn maneuver(&mut self, status: &VehicleStatus) -> Maneuver {
        let (x, y) = status.position;
        while let Some(&(wx, wy)) = self.waypoints.get(self.next) {
            if (wx - x).hypot(wy - y) >= ARRIVAL_RADIUS {
                break;
            }
            self.next += 1;
            if self.is_finished() {
                info!("Destination reached at ({:.1}, {:.1})", x, y);
            }
        }

        let Some(&(wx, wy)) = self.waypoints.get(self.next) else {
            return Maneuver::new(Action::Stop, CRUISE_MAGNITUDE);
        };

        let error = heading_error((wy - y).atan2(wx - x).to_degrees(), status.heading);
        if error.abs() <= HEADING_TOLERANCE_DEG {
            Maneuver::new(Action::Forward, CRUISE_MAGNITUDE)
        } else if status.speed > STOPPED_KMH {
            // Turning radius at speed is too wide to hit a waypoint
            Maneuver::new(Action::Stop, CRUISE_MAGNITUDE)
        } else if error > 0.0 {
            Maneuver::new(Action::TurnLeft, PIVOT_MAGNITUDE)
        } else {
            Maneuver::new(Action::TurnRight, PIVOT_MAGNITUDE)
        }
    }
}

/// Signed difference `target - current` in degrees, within (-180, 180]
fn heading_error(target: f64, current: f64) -> f64 {
    let diff = normalize_heading(target - current);
    if diff > 180.0 { diff - 360.0 } else { diff }
}
