//! Cyclic Coordinate Descent
//!
//! Walks the chain tip-to-base and swings each joint so that the
//! joint→end-effector vector lines up with the joint→target vector about the
//! joint's world axis. FK runs after every joint so the next joint sees the
//! update. Cheap and stable for short chains, not globally optimal.
//!
//! # Example
//!
//! ```rust
//! use dockarm_core::ik::{CcdSolver, IkTarget};
//! use dockarm_core::kinematics::{JointId, JointSpec, KinematicChain};
//! use dockarm_core::tf::TransformGraph;
//! use nalgebra::{Isometry3, Point3, Vector3};
//!
//! let mut graph = TransformGraph::new("world");
//! let m1 = graph.add_node(graph.root(), "Motor1", Isometry3::identity()).unwrap();
//! let m2 = graph.add_node(m1, "Motor2", Isometry3::translation(1.0, 0.0, 0.0)).unwrap();
//! let tip = graph.add_node(m2, "tip", Isometry3::translation(1.0, 0.0, 0.0)).unwrap();
//!
//! let mut chain = KinematicChain::new(vec![
//!     JointSpec::new(JointId::Motor1, Vector3::z()),
//!     JointSpec::new(JointId::Motor2, Vector3::z()),
//! ]);
//! chain.attach(&mut graph, TransformGraph::ROOT);
//! chain.set_end_effector(Some(tip));
//!
//! let report = CcdSolver::default()
//!     .solve(&mut chain, &mut graph, &IkTarget::Point(Point3::new(1.0, 1.0, 0.0)))
//!     .unwrap();
//! assert!(report.converged);
//! ```

use super::IkTarget;
use crate::kinematics::KinematicChain;
use crate::tf::SceneGraph;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Squared length below which a lever arm is treated as degenerate
const MIN_LEVER_SQ: f64 = 1e-10;

/// CCD parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CcdSolver {
    /// Outer passes over the chain
    pub iterations: usize,
    /// End-effector distance considered converged
    pub tolerance: f64,
}

impl Default for CcdSolver {
    fn default() -> Self {
        Self {
            iterations: 10,
            tolerance: 1e-3,
        }
    }
}

/// Outcome of one CCD solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CcdReport {
    /// Outer passes actually run
    pub iterations: usize,
    /// Final end-effector to target distance
    pub distance: f64,
    pub converged: bool,
}

impl CcdSolver {
    pub fn new(iterations: usize, tolerance: f64) -> Self {
        Self {
            iterations,
            tolerance,
        }
    }

    /// Move the chain's end effector toward the target position.
    ///
    /// A pose target contributes only its translation. Returns `None`
    /// (no-op) when the chain has no resolvable end effector or the target
    /// is not finite.
    pub fn solve<G: SceneGraph + ?Sized>(
        &self,
        chain: &mut KinematicChain,
        graph: &mut G,
        target: &IkTarget,
    ) -> Option<CcdReport> {
        let ee = chain.end_effector()?;
        if !target.is_finite() {
            debug!("CCD: ignoring non-finite target");
            return None;
        }
        let target = target.position();
        let ee_position = |graph: &G| graph.world_pose(ee).map(|p| p * Point3::origin());

        let mut distance = (target - ee_position(&*graph)?).norm();
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.iterations && !converged {
            iterations += 1;

            for index in (0..chain.len()).rev() {
                let joint = &chain.joints()[index];
                let Some((joint_pos, axis)) = joint.world_axis(&*graph) else {
                    continue;
                };
                let Some(ee_pos) = ee_position(&*graph) else {
                    return None;
                };

                let v1 = ee_pos - joint_pos;
                let v2 = target - joint_pos;
                if v1.norm_squared() < MIN_LEVER_SQ || v2.norm_squared() < MIN_LEVER_SQ {
                    continue;
                }
                let v1 = v1.normalize();
                let v2 = v2.normalize();

                let sin = v1.cross(&v2).dot(&axis).clamp(-1.0, 1.0);
                let cos = v1.dot(&v2).clamp(-1.0, 1.0);
                let delta = sin.atan2(cos);

                let current = joint.angle();
                chain.set_angle_at(graph, index, current + delta);
                chain.apply_fk(graph);

                distance = (target - ee_position(&*graph)?).norm();
                if distance < self.tolerance {
                    converged = true;
                    break;
                }
            }
        }

        debug!(
            "CCD: {} iterations, distance {:.5}, converged {}",
            iterations, distance, converged
        );

        Some(CcdReport {
            iterations,
            distance,
            converged,
        })
    }
}
