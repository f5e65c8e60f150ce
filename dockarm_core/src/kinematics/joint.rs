//! Joint identities and the static joint table

use nalgebra::{Unit, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical joint identity, base to tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JointId {
    Motor1,
    Motor2,
    Motor3,
    Motor4,
    Motor5,
    Motor6,
    Motor7,
}

impl JointId {
    /// All joints in configured base-to-tool order
    pub const ALL: [JointId; 7] = [
        JointId::Motor1,
        JointId::Motor2,
        JointId::Motor3,
        JointId::Motor4,
        JointId::Motor5,
        JointId::Motor6,
        JointId::Motor7,
    ];

    /// Canonical name
    pub fn name(&self) -> &'static str {
        match self {
            JointId::Motor1 => "Motor1",
            JointId::Motor2 => "Motor2",
            JointId::Motor3 => "Motor3",
            JointId::Motor4 => "Motor4",
            JointId::Motor5 => "Motor5",
            JointId::Motor6 => "Motor6",
            JointId::Motor7 => "Motor7",
        }
    }

    /// Node names accepted for this joint when binding to a scene
    pub fn default_aliases(&self) -> &'static [&'static str] {
        match self {
            JointId::Motor1 => &["Motor1", "Joint1", "Base", "Shoulder"],
            JointId::Motor2 => &["Motor2", "Joint2", "Shoulder_2"],
            JointId::Motor3 => &["Motor3", "Joint3", "Elbow"],
            JointId::Motor4 => &["Motor4", "Joint4", "Wrist1"],
            JointId::Motor5 => &["Motor5", "Joint5", "Wrist2"],
            JointId::Motor6 => &["Motor6", "Joint6", "Wrist3"],
            JointId::Motor7 => &["Motor7", "Joint7", "Flange", "Tool", "TCP", "EE_Tip"],
        }
    }

    /// Rotation axis in the joint's default local frame
    pub fn default_axis(&self) -> Unit<Vector3<f64>> {
        match self {
            JointId::Motor1 | JointId::Motor3 | JointId::Motor5 | JointId::Motor7 => {
                Vector3::z_axis()
            }
            JointId::Motor2 | JointId::Motor4 | JointId::Motor6 => Vector3::y_axis(),
        }
    }
}

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown joint name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown joint '{0}'")]
pub struct UnknownJoint(pub String);

impl FromStr for JointId {
    type Err = UnknownJoint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JointId::ALL
            .iter()
            .copied()
            .find(|j| j.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownJoint(s.to_string()))
    }
}

/// Static description of one revolute joint
#[derive(Debug, Clone, PartialEq)]
pub struct JointSpec {
    pub id: JointId,
    /// Unit rotation axis in the joint's default local frame
    pub axis: Unit<Vector3<f64>>,
    /// Lower bound in radians (may be -inf)
    pub min: f64,
    /// Upper bound in radians (may be +inf)
    pub max: f64,
    /// Accepted node names, exact or ASCII case-insensitive
    pub aliases: Vec<String>,
}

impl JointSpec {
    /// Unbounded joint with the default alias list for `id`
    pub fn new(id: JointId, axis: Vector3<f64>) -> Self {
        Self {
            id,
            axis: Unit::new_normalize(axis),
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            aliases: id.default_aliases().iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Static bounds in radians
    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Replace the alias list
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// The default seven-joint arm table
    pub fn defaults() -> Vec<JointSpec> {
        JointId::ALL
            .iter()
            .map(|id| JointSpec::new(*id, id.default_axis().into_inner()))
            .collect()
    }

    /// Whether a scene node name refers to this joint
    pub fn matches(&self, node_name: &str) -> bool {
        self.aliases
            .iter()
            .any(|a| a == node_name || a.eq_ignore_ascii_case(node_name))
    }

    /// Clamp to the static bounds
    pub fn clamp(&self, radians: f64) -> f64 {
        radians.max(self.min).min(self.max)
    }
}
