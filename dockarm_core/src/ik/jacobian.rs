//! Jacobian-transpose step
//!
//! One call computes a 6D error (position + axis-angle orientation), builds
//! the geometric Jacobian of the chain at the current configuration and
//! applies a single clamped step `Δq = step · Jᵀ · e`. Callers drive it once
//! per control tick.

use super::{clamp_step, IkTarget};
use crate::kinematics::KinematicChain;
use crate::tf::SceneGraph;
use nalgebra::{Matrix6xX, Point3, UnitQuaternion, Vector3, Vector6};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Below this `sin(θ/2)` the rotation axis is undefined and the error is zero
const MIN_AXIS_NORM: f64 = 1e-6;

/// Jacobian-transpose step parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JacobianSolver {
    /// Gain applied to `Jᵀ · e`
    pub step_size: f64,
    /// Per-joint per-step clamp (radians)
    pub max_delta: f64,
    /// Weight of the position error rows
    pub w_pos: f64,
    /// Weight of the orientation error rows
    pub w_ori: f64,
}

impl Default for JacobianSolver {
    fn default() -> Self {
        Self {
            step_size: 0.4,
            max_delta: 0.05,
            w_pos: 1.0,
            w_ori: 1.0,
        }
    }
}

/// Outcome of one Jacobian step, errors measured before the step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JacobianReport {
    /// Norm of the position error
    pub position_error: f64,
    /// Rotation angle of the orientation error, in [0, π]
    pub orientation_error: f64,
    /// Largest absolute joint change applied
    pub max_step: f64,
}

impl JacobianSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    pub fn with_max_delta(mut self, max_delta: f64) -> Self {
        self.max_delta = max_delta;
        self
    }

    pub fn with_weights(mut self, w_pos: f64, w_ori: f64) -> Self {
        self.w_pos = w_pos;
        self.w_ori = w_ori;
        self
    }

    /// Apply one step toward `target`.
    ///
    /// A point target keeps the current end-effector orientation, so its
    /// orientation rows are zero. Returns `None` (no-op) when the chain has
    /// no resolvable end effector or the target is not finite.
    pub fn solve<G: SceneGraph + ?Sized>(
        &self,
        chain: &mut KinematicChain,
        graph: &mut G,
        target: &IkTarget,
    ) -> Option<JacobianReport> {
        let ee_pose = chain.end_effector_pose(&*graph)?;
        if !target.is_finite() {
            debug!("Jacobian: ignoring non-finite target");
            return None;
        }

        let ee_pos = ee_pose * Point3::origin();
        let pos_err = target.position() - ee_pos;
        let ori_err = match target.orientation() {
            Some(q_target) => orientation_error(&q_target, &ee_pose.rotation),
            None => Vector3::zeros(),
        };

        let e = Vector6::new(
            self.w_pos * pos_err.x,
            self.w_pos * pos_err.y,
            self.w_pos * pos_err.z,
            self.w_ori * ori_err.x,
            self.w_ori * ori_err.y,
            self.w_ori * ori_err.z,
        );

        let j = jacobian(chain, &*graph, &ee_pos);
        let dq = j.transpose() * e * self.step_size;

        let mut max_step: f64 = 0.0;
        for (index, raw) in dq.iter().enumerate() {
            let delta = clamp_step(*raw, self.max_delta);
            let current = chain.joints()[index].angle();
            chain.set_angle_at(graph, index, current + delta);
            max_step = max_step.max(delta.abs());
        }
        chain.apply_fk(graph);

        Some(JacobianReport {
            position_error: pos_err.norm(),
            orientation_error: ori_err.norm(),
            max_step,
        })
    }
}

/// Geometric Jacobian of the chain for an end effector at `ee_pos`.
///
/// Column `i` holds `[aᵢ × (p_ee − pᵢ); aᵢ]` where `aᵢ` is joint i's world
/// axis and `pᵢ` its world position. Joints whose node has no world pose
/// contribute a zero column.
pub fn jacobian<G: SceneGraph + ?Sized>(
    chain: &KinematicChain,
    graph: &G,
    ee_pos: &Point3<f64>,
) -> Matrix6xX<f64> {
    let mut j = Matrix6xX::zeros(chain.len());

    for (col, joint) in chain.joints().iter().enumerate() {
        let Some((joint_pos, axis)) = joint.world_axis(graph) else {
            continue;
        };
        let linear = axis.cross(&(ee_pos - joint_pos));

        j[(0, col)] = linear.x;
        j[(1, col)] = linear.y;
        j[(2, col)] = linear.z;
        j[(3, col)] = axis.x;
        j[(4, col)] = axis.y;
        j[(5, col)] = axis.z;
    }

    j
}

/// Axis-angle vector rotating `current` onto `target`.
///
/// The error quaternion `target · current⁻¹` is folded onto the `w ≥ 0`
/// hemisphere first, so the magnitude is the shortest-arc angle in [0, π].
pub fn orientation_error(
    target: &UnitQuaternion<f64>,
    current: &UnitQuaternion<f64>,
) -> Vector3<f64> {
    let mut q = *(target * current.inverse()).quaternion();
    if q.w < 0.0 {
        q = -q;
    }

    let w = q.w.clamp(-1.0, 1.0);
    let angle = 2.0 * w.acos();
    let s = (1.0 - w * w).sqrt();
    if s < MIN_AXIS_NORM {
        return Vector3::zeros();
    }

    q.imag() / s * angle
}
