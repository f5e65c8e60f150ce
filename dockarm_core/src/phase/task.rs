//! Approach → insert → done progression for scripted docking

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Distances (meters) and gains for the scripted docking task
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskThresholds {
    /// Effector-to-socket distance that ends the approach
    pub insert_distance: f64,
    /// Effector-to-socket distance that completes the insertion
    pub done_distance: f64,
    /// Signed offset of the insertion point along the effector→socket line
    pub insertion_offset: f64,
    /// Fraction of the remaining gap the insert target moves per update
    pub insert_lerp: f64,
}

impl Default for TaskThresholds {
    fn default() -> Self {
        Self {
            insert_distance: 0.03,
            done_distance: 0.005,
            insertion_offset: -0.1,
            insert_lerp: 0.05,
        }
    }
}

/// World positions observed for one task update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskObservation {
    pub effector: Point3<f64>,
    pub socket: Point3<f64>,
}

impl TaskObservation {
    pub fn distance(&self) -> f64 {
        (self.socket - self.effector).norm()
    }
}

/// Scripted docking phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TaskPhase {
    #[default]
    Approach,
    Insert {
        /// Fixed when the approach ends
        insertion_point: Point3<f64>,
    },
    Done,
}

impl TaskPhase {
    /// Pure transition: at most one step forward, never backward
    pub fn next(&self, thresholds: &TaskThresholds, obs: &TaskObservation) -> TaskPhase {
        let dist = obs.distance();
        match self {
            TaskPhase::Approach if dist < thresholds.insert_distance => {
                let direction = obs.socket - obs.effector;
                let insertion_point = if dist > 0.0 {
                    obs.socket + direction / dist * thresholds.insertion_offset
                } else {
                    obs.socket
                };
                TaskPhase::Insert { insertion_point }
            }
            TaskPhase::Insert { .. } if dist < thresholds.done_distance => TaskPhase::Done,
            other => *other,
        }
    }

    /// IK target for this phase given the previous target
    pub fn target(
        &self,
        thresholds: &TaskThresholds,
        socket: &Point3<f64>,
        current: &Point3<f64>,
    ) -> Point3<f64> {
        match self {
            TaskPhase::Approach => *socket,
            TaskPhase::Insert { insertion_point } => {
                current.coords.lerp(&insertion_point.coords, thresholds.insert_lerp).into()
            }
            TaskPhase::Done => *current,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TaskPhase::Approach => "approach",
            TaskPhase::Insert { .. } => "insert",
            TaskPhase::Done => "done",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, TaskPhase::Done)
    }
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stateful wrapper around [`TaskPhase`]
#[derive(Debug, Clone, Default)]
pub struct TaskPhaseMachine {
    phase: TaskPhase,
    thresholds: TaskThresholds,
}

impl TaskPhaseMachine {
    pub fn new(thresholds: TaskThresholds) -> Self {
        Self {
            phase: TaskPhase::Approach,
            thresholds,
        }
    }

    pub fn phase(&self) -> TaskPhase {
        self.phase
    }

    pub fn thresholds(&self) -> &TaskThresholds {
        &self.thresholds
    }

    /// Advance on the observed positions and return the new IK target
    pub fn update(
        &mut self,
        effector: Point3<f64>,
        socket: Point3<f64>,
        current_target: Point3<f64>,
    ) -> Point3<f64> {
        let obs = TaskObservation { effector, socket };
        let next = self.phase.next(&self.thresholds, &obs);
        if next != self.phase {
            info!(
                "Task phase {} -> {} (dist={:.4})",
                self.phase,
                next,
                obs.distance()
            );
            self.phase = next;
        }
        self.phase.target(&self.thresholds, &socket, &current_target)
    }

    /// Back to approach, insertion point cleared
    pub fn reset(&mut self) {
        self.phase = TaskPhase::Approach;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn obs(effector: [f64; 3]) -> TaskObservation {
        TaskObservation {
            effector: Point3::from(effector),
            socket: Point3::origin(),
        }
    }

    #[test]
    fn test_approach_targets_socket() {
        let mut machine = TaskPhaseMachine::default();
        let socket = Point3::new(0.5, 0.0, 0.2);

        let target = machine.update(Point3::origin(), socket, Point3::origin());
        assert_eq!(target, socket);
        assert_eq!(machine.phase(), TaskPhase::Approach);
    }

    #[test]
    fn test_insertion_point_on_effector_side() {
        let t = TaskThresholds::default();
        let next = TaskPhase::Approach.next(&t, &obs([0.02, 0.0, 0.0]));

        match next {
            TaskPhase::Insert { insertion_point } => {
                // direction socket - effector = -x, scaled by -0.1
                assert_relative_eq!(insertion_point, Point3::new(0.1, 0.0, 0.0), epsilon = 1e-12);
            }
            other => panic!("expected insert, got {}", other),
        }
    }

    #[test]
    fn test_zero_distance_uses_socket() {
        let t = TaskThresholds::default();
        let next = TaskPhase::Approach.next(&t, &obs([0.0, 0.0, 0.0]));
        assert_eq!(
            next,
            TaskPhase::Insert {
                insertion_point: Point3::origin()
            }
        );
    }

    #[test]
    fn test_one_transition_per_update() {
        let t = TaskThresholds::default();
        // Already inside the done radius, but approach must pass through insert
        let next = TaskPhase::Approach.next(&t, &obs([0.001, 0.0, 0.0]));
        assert_eq!(next.name(), "insert");
        assert_eq!(next.next(&t, &obs([0.001, 0.0, 0.0])), TaskPhase::Done);
    }

    #[test]
    fn test_done_is_terminal() {
        let t = TaskThresholds::default();
        assert_eq!(TaskPhase::Done.next(&t, &obs([5.0, 0.0, 0.0])), TaskPhase::Done);

        let insert = TaskPhase::Insert {
            insertion_point: Point3::origin(),
        };
        assert_eq!(insert.next(&t, &obs([5.0, 0.0, 0.0])), insert);
    }

    #[test]
    fn test_insert_target_lerps() {
        let t = TaskThresholds::default();
        let phase = TaskPhase::Insert {
            insertion_point: Point3::new(1.0, 0.0, 0.0),
        };

        let target = phase.target(&t, &Point3::origin(), &Point3::origin());
        assert_relative_eq!(target, Point3::new(0.05, 0.0, 0.0), epsilon = 1e-12);

        let done = TaskPhase::Done.target(&t, &Point3::origin(), &target);
        assert_eq!(done, target);
    }

    #[test]
    fn test_reset() {
        let mut machine = TaskPhaseMachine::default();
        machine.update(Point3::new(0.01, 0.0, 0.0), Point3::origin(), Point3::origin());
        assert_eq!(machine.phase().name(), "insert");

        machine.reset();
        assert_eq!(machine.phase(), TaskPhase::Approach);
    }
}
