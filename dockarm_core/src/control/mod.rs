//! Controller façade
//!
//! Translates caller intents into chain and solver calls. The controller
//! holds only fixed gains and solver parameters; all mutable state lives in
//! the [`KinematicChain`] and the host graph.
//!
//! # Example
//!
//! ```rust
//! use dockarm_core::control::{Controller, WristErrors};
//! use dockarm_core::kinematics::{JointId, KinematicChain};
//! use dockarm_core::tf::TransformGraph;
//! use nalgebra::Isometry3;
//!
//! let mut graph = TransformGraph::new("world");
//! let m5 = graph.add_node(graph.root(), "Motor5", Isometry3::identity()).unwrap();
//! graph.add_node(m5, "wrist_mesh", Isometry3::identity()).unwrap();
//!
//! let mut chain = KinematicChain::default();
//! chain.attach(&mut graph, TransformGraph::ROOT);
//!
//! let controller = Controller::default();
//! controller.apply_wrist_control(&mut chain, &mut graph, WristErrors::new(0.0, 1.0, 0.0));
//!
//! // -0.5 * 1.0 clamped to the 0.02 rad wrist step
//! assert_eq!(chain.angle(JointId::Motor5), Some(-0.02));
//! ```

mod command;

pub use command::ControlCommand;

use crate::ik::{clamp_step, CcdReport, CcdSolver, IkTarget, JacobianReport, JacobianSolver};
use crate::kinematics::{JointId, KinematicChain};
use crate::tf::SceneGraph;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Gains and step limits for the direct command paths
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Proportional gain from wrist roll/pitch/yaw error to joint delta
    pub wrist_gain: f64,
    /// Per-call clamp for wrist joint deltas (radians)
    pub wrist_max_step: f64,
    /// Per-call clamp for joint-delta commands (radians)
    pub joint_max_step: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            wrist_gain: 0.5,
            wrist_max_step: 0.02,
            joint_max_step: 0.03,
        }
    }
}

/// Wrist orientation errors in radians
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WristErrors {
    pub droll: f64,
    pub dpitch: f64,
    pub dyaw: f64,
}

impl WristErrors {
    pub fn new(droll: f64, dpitch: f64, dyaw: f64) -> Self {
        Self {
            droll,
            dpitch,
            dyaw,
        }
    }
}

/// Operator input state shared between the session and the policy machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFlags {
    /// When set, the session drives IK toward the direct target every tick
    pub direct_targeting: bool,
}

impl Default for InputFlags {
    fn default() -> Self {
        Self {
            direct_targeting: true,
        }
    }
}

/// Stateless dispatch from intents to the chain
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Controller {
    config: ControllerConfig,
    ccd: CcdSolver,
    jacobian: JacobianSolver,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Replace both solver parameter sets
    pub fn with_solvers(mut self, ccd: CcdSolver, jacobian: JacobianSolver) -> Self {
        self.ccd = ccd;
        self.jacobian = jacobian;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn ccd(&self) -> &CcdSolver {
        &self.ccd
    }

    pub fn jacobian(&self) -> &JacobianSolver {
        &self.jacobian
    }

    /// One Jacobian-transpose step toward `target`
    pub fn apply_ik<G: SceneGraph + ?Sized>(
        &self,
        chain: &mut KinematicChain,
        graph: &mut G,
        target: &IkTarget,
    ) -> Option<JacobianReport> {
        self.jacobian.solve(chain, graph, target)
    }

    /// Full CCD solve toward the position of `target`
    pub fn apply_ik_ccd<G: SceneGraph + ?Sized>(
        &self,
        chain: &mut KinematicChain,
        graph: &mut G,
        target: &IkTarget,
    ) -> Option<CcdReport> {
        self.ccd.solve(chain, graph, target)
    }

    /// Proportional wrist correction.
    ///
    /// Pitch drives Motor5, yaw drives Motor6 and roll drives Motor7, each
    /// with the opposite sign of the error. Non-finite errors are ignored.
    pub fn apply_wrist_control<G: SceneGraph + ?Sized>(
        &self,
        chain: &mut KinematicChain,
        graph: &mut G,
        errors: WristErrors,
    ) {
        let step =
            |error: f64| clamp_step(-self.config.wrist_gain * error, self.config.wrist_max_step);

        let deltas = [
            (JointId::Motor5, errors.dpitch),
            (JointId::Motor6, errors.dyaw),
            (JointId::Motor7, errors.droll),
        ];

        for (joint, error) in deltas {
            if !error.is_finite() {
                debug!("Wrist: ignoring non-finite error for {}", joint);
                continue;
            }
            chain.offset_joint_angle(graph, joint, step(error));
        }
    }

    /// Add clamped per-joint deltas; unresolved joints are ignored
    pub fn apply_joint_deltas<G, I>(&self, chain: &mut KinematicChain, graph: &mut G, deltas: I)
    where
        G: SceneGraph + ?Sized,
        I: IntoIterator<Item = (JointId, f64)>,
    {
        let max = self.config.joint_max_step;
        for (joint, delta) in deltas {
            if !delta.is_finite() {
                debug!("Joint delta: ignoring non-finite value for {}", joint);
                continue;
            }
            chain.offset_joint_angle(graph, joint, clamp_step(delta, max));
        }
    }

    /// Dispatch a decoded remote command
    pub fn apply_command<G: SceneGraph + ?Sized>(
        &self,
        chain: &mut KinematicChain,
        graph: &mut G,
        command: &ControlCommand,
    ) {
        match command {
            ControlCommand::WristRpyDelta { delta } => {
                self.apply_wrist_control(chain, graph, *delta);
            }
            ControlCommand::JointDelta { delta } => {
                let deltas = delta
                    .iter()
                    .filter_map(|(name, value)| match name.parse::<JointId>() {
                        Ok(joint) => Some((joint, *value)),
                        Err(e) => {
                            warn!("Joint delta: {}", e);
                            None
                        }
                    });
                self.apply_joint_deltas(chain, graph, deltas);
            }
        }
    }

    /// Decode and dispatch a JSON command.
    ///
    /// Returns false (and logs) when the payload does not decode.
    pub fn apply_command_json<G: SceneGraph + ?Sized>(
        &self,
        chain: &mut KinematicChain,
        graph: &mut G,
        payload: &str,
    ) -> bool {
        match serde_json::from_str::<ControlCommand>(payload) {
            Ok(command) => {
                self.apply_command(chain, graph, &command);
                true
            }
            Err(e) => {
                warn!("Ignoring malformed control command: {}", e);
                false
            }
        }
    }
}
