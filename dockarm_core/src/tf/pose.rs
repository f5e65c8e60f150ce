//! Relative pose helpers

use nalgebra::{Isometry3, Quaternion, Vector3};

/// Pose of a target frame expressed in a reference frame.
///
/// The orientation is optional because policy observations may carry only a
/// relative position. It is kept as a raw quaternion since upstream producers
/// are not guaranteed to normalise it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativePose {
    pub position: Vector3<f64>,
    pub orientation: Option<Quaternion<f64>>,
}

impl RelativePose {
    /// Position-only relative pose
    pub fn from_position(position: Vector3<f64>) -> Self {
        Self {
            position,
            orientation: None,
        }
    }

    /// Attach a relative orientation
    pub fn with_orientation(mut self, orientation: Quaternion<f64>) -> Self {
        self.orientation = Some(orientation);
        self
    }

    /// Euclidean distance between the two frame origins
    pub fn distance(&self) -> f64 {
        self.position.norm()
    }

    /// Rotation angle between the two frames in [0, pi], zero when unknown
    pub fn orientation_error(&self) -> f64 {
        self.orientation.as_ref().map(rotation_angle).unwrap_or(0.0)
    }
}

/// Pose of `target` seen from `reference`: `reference⁻¹ · target`
pub fn relative_pose(reference: &Isometry3<f64>, target: &Isometry3<f64>) -> RelativePose {
    let rel = reference.inverse() * target;
    RelativePose {
        position: rel.translation.vector,
        orientation: Some(*rel.rotation.quaternion()),
    }
}

/// Rotation angle encoded by a (near-)unit quaternion.
///
/// `q` and `-q` encode the same rotation, so `-q` is folded onto `q` with
/// `|w|` and the result is the shortest arc, in [0, pi].
pub fn rotation_angle(q: &Quaternion<f64>) -> f64 {
    2.0 * q.w.abs().clamp(-1.0, 1.0).acos()
}
