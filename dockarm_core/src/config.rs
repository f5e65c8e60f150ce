//! Session configuration
//!
//! Every tunable of the docking loop in one serde tree, loadable from TOML.
//! All fields default, so a config file only needs the values it changes:
//!
//! ```toml
//! jog_step = 0.01
//! targeting = "scripted"
//!
//! [policy]
//! ori_tolerance_rad = 0.1745
//!
//! [initial_angles_deg]
//! Motor1 = 0.0
//! ```

use crate::control::{Controller, ControllerConfig};
use crate::ik::{CcdSolver, JacobianSolver};
use crate::kinematics::JointId;
use crate::phase::{PolicyThresholds, TaskThresholds};
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::FRAC_PI_2;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Default config file name searched in the working directory
pub const CONFIG_FILE: &str = "dockarm.toml";

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid {field}: {value} (expected a finite value >= 0)")]
    InvalidStepLimit { field: &'static str, value: f64 },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// How the session builds the direct IK target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetingMode {
    /// Hold a pose at a fixed standoff in front of the socket
    #[default]
    Standoff,
    /// Let the task phase machine script approach and insertion
    Scripted,
}

/// Standoff pose relative to the socket frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApproachConfig {
    /// Extra rotation applied to the socket orientation (roll, pitch, yaw)
    pub rpy: [f64; 3],
    /// Distance along the rotated local +Z
    pub standoff: f64,
}

impl Default for ApproachConfig {
    fn default() -> Self {
        Self {
            rpy: [-FRAC_PI_2, 0.0, 0.0],
            standoff: 0.1,
        }
    }
}

impl ApproachConfig {
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_euler_angles(self.rpy[0], self.rpy[1], self.rpy[2])
    }

    /// Offset in the rotated target frame
    pub fn offset(&self) -> Vector3<f64> {
        Vector3::new(0.0, 0.0, self.standoff)
    }
}

/// Full session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Radians per tick for a held jog
    pub jog_step: f64,
    pub targeting: TargetingMode,
    pub ccd: CcdSolver,
    pub jacobian: JacobianSolver,
    pub controller: ControllerConfig,
    pub task: TaskThresholds,
    pub policy: PolicyThresholds,
    pub approach: ApproachConfig,
    /// Pose applied after attach, keyed by joint name
    pub initial_angles_deg: BTreeMap<String, f64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let initial_angles_deg = [
            (JointId::Motor1, -15.0),
            (JointId::Motor2, 69.0),
            (JointId::Motor3, 183.0),
            (JointId::Motor4, 100.0),
            (JointId::Motor5, 40.0),
            (JointId::Motor6, -23.0),
            (JointId::Motor7, 272.0),
        ]
        .into_iter()
        .map(|(joint, deg)| (joint.name().to_string(), deg))
        .collect();

        Self {
            jog_step: 0.02,
            targeting: TargetingMode::default(),
            ccd: CcdSolver::default(),
            jacobian: JacobianSolver::default(),
            controller: ControllerConfig::default(),
            task: TaskThresholds::default(),
            policy: PolicyThresholds::default(),
            approach: ApproachConfig::default(),
            initial_angles_deg,
        }
    }
}

impl SessionConfig {
    /// Load from a TOML file
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse from a TOML string and validate it
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the per-step joint limits
    pub fn validate(&self) -> ConfigResult<()> {
        let limits = [
            ("jacobian.max_delta", self.jacobian.max_delta),
            ("controller.wrist_max_step", self.controller.wrist_max_step),
            ("controller.joint_max_step", self.controller.joint_max_step),
        ];
        for (field, value) in limits {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidStepLimit { field, value });
            }
        }
        Ok(())
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Load `dockarm.toml` from the working directory if present
    pub fn find_and_load() -> ConfigResult<Option<Self>> {
        let path = PathBuf::from(CONFIG_FILE);
        if path.exists() {
            Self::from_file(&path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Controller carrying these gains and solver parameters
    pub fn build_controller(&self) -> Controller {
        Controller::new(self.controller).with_solvers(self.ccd, self.jacobian)
    }

    /// Initial pose as typed joints; unknown names are skipped
    pub fn initial_angles(&self) -> Vec<(JointId, f64)> {
        self.initial_angles_deg
            .iter()
            .filter_map(|(name, deg)| match name.parse::<JointId>() {
                Ok(joint) => Some((joint, *deg)),
                Err(e) => {
                    warn!("initial_angles_deg: {}", e);
                    None
                }
            })
            .collect()
    }
}
