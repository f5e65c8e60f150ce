//! Serialisable per-tick snapshots
//!
//! Poses are flattened to `{position: {x, y, z}, quaternion: {x, y, z, w}}`
//! so consumers in other languages can read them without nalgebra's array
//! layout.

use crate::kinematics::JointId;
use crate::phase::{PolicyPhase, TaskPhase};
use crate::tf::RelativePose;
use nalgebra::{Isometry3, Quaternion, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3Record {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<&Vector3<f64>> for Vec3Record {
    fn from(v: &Vector3<f64>) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuatRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for QuatRecord {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl From<&Quaternion<f64>> for QuatRecord {
    fn from(q: &Quaternion<f64>) -> Self {
        Self {
            x: q.i,
            y: q.j,
            z: q.k,
            w: q.w,
        }
    }
}

/// Position and orientation of one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseRecord {
    pub position: Vec3Record,
    pub quaternion: QuatRecord,
}

impl From<&Isometry3<f64>> for PoseRecord {
    fn from(pose: &Isometry3<f64>) -> Self {
        Self {
            position: Vec3Record::from(&pose.translation.vector),
            quaternion: QuatRecord::from(pose.rotation.quaternion()),
        }
    }
}

impl From<&RelativePose> for PoseRecord {
    /// A missing relative orientation is recorded as identity
    fn from(rel: &RelativePose) -> Self {
        Self {
            position: Vec3Record::from(&rel.position),
            quaternion: rel
                .orientation
                .as_ref()
                .map(QuatRecord::from)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointReading {
    pub joint: JointId,
    pub radians: f64,
}

/// Snapshot of the session after one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub tick: u64,
    /// Resolved joints in traversal order
    pub joints: Vec<JointReading>,
    /// End-effector world pose
    pub tcp: Option<PoseRecord>,
    /// Socket world pose
    pub socket: Option<PoseRecord>,
    /// Socket seen from the end effector
    pub relative: Option<PoseRecord>,
    pub task_phase: TaskPhase,
    pub policy_phase: PolicyPhase,
    pub direct_targeting: bool,
}

impl Telemetry {
    /// Angles for every joint in `JointId` order, zero when unresolved
    pub fn joint_vector(&self) -> [f64; JointId::ALL.len()] {
        let mut out = [0.0; JointId::ALL.len()];
        for (slot, id) in out.iter_mut().zip(JointId::ALL) {
            if let Some(reading) = self.joints.iter().find(|r| r.joint == id) {
                *slot = reading.radians;
            }
        }
        out
    }

    /// One JSON object, no trailing newline
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Translation3, UnitQuaternion};

    fn sample() -> Telemetry {
        Telemetry {
            tick: 3,
            joints: vec![
                JointReading {
                    joint: JointId::Motor2,
                    radians: 0.5,
                },
                JointReading {
                    joint: JointId::Motor7,
                    radians: -1.0,
                },
            ],
            tcp: Some(PoseRecord::from(&Isometry3::from_parts(
                Translation3::new(1.0, 2.0, 3.0),
                UnitQuaternion::identity(),
            ))),
            socket: None,
            relative: Some(PoseRecord::from(&RelativePose::from_position(Vector3::new(
                0.0, 0.0, 0.1,
            )))),
            task_phase: TaskPhase::Approach,
            policy_phase: PolicyPhase::Rl,
            direct_targeting: false,
        }
    }

    #[test]
    fn test_joint_vector_fills_gaps() {
        let v = sample().joint_vector();
        assert_eq!(v, [0.0, 0.5, 0.0, 0.0, 0.0, 0.0, -1.0]);
    }

    #[test]
    fn test_json_shape() {
        let line = sample().to_json_line().unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["tcp"]["position"]["y"], 2.0);
        assert_eq!(value["tcp"]["quaternion"]["w"], 1.0);
        assert_eq!(value["relative"]["quaternion"]["w"], 1.0);
        assert_eq!(value["joints"][0]["joint"], "Motor2");
        assert_eq!(value["task_phase"]["phase"], "approach");
        assert_eq!(value["policy_phase"], "RL");
        assert!(value["socket"].is_null());
    }

    #[test]
    fn test_round_trip() {
        let t = sample();
        let back: Telemetry = serde_json::from_str(&t.to_json_line().unwrap()).unwrap();
        assert_eq!(back, t);
    }
}
