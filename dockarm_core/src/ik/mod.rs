//! Inverse kinematics over a [`KinematicChain`](crate::kinematics::KinematicChain)
//!
//! Two interchangeable strategies, both bounded-iteration and in place:
//!
//! - **ccd**: Cyclic Coordinate Descent, position only, greedy per joint
//! - **jacobian**: single Jacobian-transpose step, position + orientation
//!
//! Nothing in the core arbitrates between them; the call site chooses.

mod ccd;
mod jacobian;

pub use ccd::{CcdReport, CcdSolver};
pub use jacobian::{jacobian, orientation_error, JacobianReport, JacobianSolver};

use nalgebra::{Isometry3, Point3, UnitQuaternion};

/// Desired end-effector placement, in world frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IkTarget {
    /// Position only; the current orientation is kept
    Point(Point3<f64>),
    /// Position and orientation
    Pose(Isometry3<f64>),
}

impl IkTarget {
    pub fn position(&self) -> Point3<f64> {
        match self {
            IkTarget::Point(p) => *p,
            IkTarget::Pose(pose) => Point3::from(pose.translation.vector),
        }
    }

    /// Orientation constraint, if any
    pub fn orientation(&self) -> Option<UnitQuaternion<f64>> {
        match self {
            IkTarget::Point(_) => None,
            IkTarget::Pose(pose) => Some(pose.rotation),
        }
    }

    /// False when any component is NaN or infinite
    pub fn is_finite(&self) -> bool {
        let position_ok = self.position().coords.iter().all(|v| v.is_finite());
        let rotation_ok = self
            .orientation()
            .map(|q| q.coords.iter().all(|v| v.is_finite()))
            .unwrap_or(true);
        position_ok && rotation_ok
    }
}

/// Clamp `value` to `[-limit, limit]`.
///
/// A negative or NaN limit allows no motion at all.
pub(crate) fn clamp_step(value: f64, limit: f64) -> f64 {
    if limit >= 0.0 {
        value.clamp(-limit, limit)
    } else {
        0.0
    }
}

impl From<Point3<f64>> for IkTarget {
    fn from(p: Point3<f64>) -> Self {
        IkTarget::Point(p)
    }
}

impl From<Isometry3<f64>> for IkTarget {
    fn from(pose: Isometry3<f64>) -> Self {
        IkTarget::Pose(pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_step() {
        assert_eq!(clamp_step(0.3, 0.05), 0.05);
        assert_eq!(clamp_step(-0.3, 0.05), -0.05);
        assert_eq!(clamp_step(0.01, 0.05), 0.01);
        assert_eq!(clamp_step(0.3, f64::INFINITY), 0.3);
        assert_eq!(clamp_step(0.3, -0.05), 0.0);
        assert_eq!(clamp_step(0.3, f64::NAN), 0.0);
    }

    #[test]
    fn test_target_accessors() {
        let point = IkTarget::from(Point3::new(1.0, 2.0, 3.0));
        assert_eq!(point.position(), Point3::new(1.0, 2.0, 3.0));
        assert!(point.orientation().is_none());

        let pose = IkTarget::from(Isometry3::translation(0.5, 0.0, 0.0));
        assert_eq!(pose.position(), Point3::new(0.5, 0.0, 0.0));
        assert_eq!(pose.orientation(), Some(UnitQuaternion::identity()));
    }

    #[test]
    fn test_non_finite_target() {
        assert!(!IkTarget::Point(Point3::new(f64::NAN, 0.0, 0.0)).is_finite());
        assert!(IkTarget::Point(Point3::origin()).is_finite());
    }
}
