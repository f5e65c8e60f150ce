//! IK → RL → DONE hand-off between direct targeting and a learned policy
//!
//! Direct targeting drives the end effector to a standoff from the socket.
//! Once the standoff distance is held within tolerance (and the relative
//! orientation is inside its tolerance) the policy takes over and direct
//! targeting is switched off. The policy's action vector is a TCP-local
//! displacement command turned into one Jacobian step per action.

use crate::control::{Controller, InputFlags};
use crate::ik::{IkTarget, JacobianReport};
use crate::kinematics::KinematicChain;
use crate::tf::{RelativePose, SceneGraph};
use nalgebra::{Isometry3, Translation3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use tracing::{debug, info};

/// Hand-off and success thresholds for the policy phase machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyThresholds {
    /// Standoff distance (meters) at which the policy takes over
    pub dist_target: f64,
    /// Allowed deviation from `dist_target`
    pub dist_tolerance: f64,
    /// Distance under which the policy has succeeded
    pub success_radius: f64,
    /// Meters of TCP displacement per unit action
    pub action_scale: f64,
    /// Relative rotation (radians) required for the hand-off
    pub ori_tolerance_rad: f64,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            dist_target: 0.10,
            dist_tolerance: 0.0001,
            success_radius: 0.01,
            action_scale: 0.002,
            ori_tolerance_rad: PI,
        }
    }
}

/// Distance and rotation error between TCP and socket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyObservation {
    pub distance: f64,
    pub orientation_error: f64,
}

impl From<&RelativePose> for PolicyObservation {
    fn from(rel: &RelativePose) -> Self {
        Self {
            distance: rel.distance(),
            orientation_error: rel.orientation_error(),
        }
    }
}

/// Which controller is authoritative
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyPhase {
    /// Direct targeting drives the chain
    #[default]
    Ik,
    /// Policy actions drive the chain
    Rl,
    /// Docked; actions are ignored
    Done,
}

impl PolicyPhase {
    /// Pure transition; DONE is terminal
    pub fn next(&self, thresholds: &PolicyThresholds, obs: &PolicyObservation) -> PolicyPhase {
        match self {
            PolicyPhase::Ik => {
                let dist_ok =
                    (obs.distance - thresholds.dist_target).abs() < thresholds.dist_tolerance;
                let ori_ok = obs.orientation_error < thresholds.ori_tolerance_rad;
                if dist_ok && ori_ok {
                    PolicyPhase::Rl
                } else {
                    PolicyPhase::Ik
                }
            }
            PolicyPhase::Rl if obs.distance < thresholds.success_radius => PolicyPhase::Done,
            other => *other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PolicyPhase::Ik => "IK",
            PolicyPhase::Rl => "RL",
            PolicyPhase::Done => "DONE",
        }
    }
}

impl fmt::Display for PolicyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Gate between direct targeting and policy actions
#[derive(Debug, Clone, Default)]
pub struct PolicyPhaseMachine {
    phase: PolicyPhase,
    thresholds: PolicyThresholds,
    last_distance: Option<f64>,
}

impl PolicyPhaseMachine {
    pub fn new(thresholds: PolicyThresholds) -> Self {
        Self {
            thresholds,
            ..Default::default()
        }
    }

    pub fn phase(&self) -> PolicyPhase {
        self.phase
    }

    pub fn thresholds(&self) -> &PolicyThresholds {
        &self.thresholds
    }

    /// Distance seen by the most recent update
    pub fn last_distance(&self) -> Option<f64> {
        self.last_distance
    }

    /// Advance on the TCP→socket relative pose.
    ///
    /// Entering RL clears `flags.direct_targeting`.
    pub fn update_phase(&mut self, rel: &RelativePose, flags: &mut InputFlags) -> PolicyPhase {
        let obs = PolicyObservation::from(rel);
        if !obs.distance.is_finite() {
            return self.phase;
        }
        self.last_distance = Some(obs.distance);

        let next = self.phase.next(&self.thresholds, &obs);
        if next == self.phase {
            if self.phase == PolicyPhase::Ik {
                debug!(
                    "IK phase: dist={:.4} ori_err={:.2}deg not in hand-off window",
                    obs.distance,
                    obs.orientation_error.to_degrees()
                );
            }
            return self.phase;
        }

        info!(
            "Policy phase {} -> {} (dist={:.4}, ori_err={:.2}deg)",
            self.phase,
            next,
            obs.distance,
            obs.orientation_error.to_degrees()
        );
        if next == PolicyPhase::Rl {
            flags.direct_targeting = false;
        }
        self.phase = next;
        self.phase
    }

    /// Back to IK; direct targeting re-enabled, joint angles untouched
    pub fn reset(&mut self, flags: &mut InputFlags) {
        self.phase = PolicyPhase::Ik;
        self.last_distance = None;
        flags.direct_targeting = true;
    }

    /// Target pose for a policy action, or `None` when it must be ignored.
    ///
    /// Requires RL phase and at least three finite components. Components are
    /// clamped to [-1, 1]; the displacement is `-action · action_scale` in the
    /// TCP frame and the TCP orientation is kept.
    pub fn action_target(&self, action: &[f64], tcp: &Isometry3<f64>) -> Option<Isometry3<f64>> {
        if self.phase != PolicyPhase::Rl {
            return None;
        }
        let [ax, ay, az] = match action {
            [ax, ay, az, ..] => [*ax, *ay, *az],
            _ => return None,
        };
        if !(ax.is_finite() && ay.is_finite() && az.is_finite()) {
            return None;
        }

        let scale = self.thresholds.action_scale;
        let delta_local = Vector3::new(
            -ax.clamp(-1.0, 1.0) * scale,
            -ay.clamp(-1.0, 1.0) * scale,
            -az.clamp(-1.0, 1.0) * scale,
        );
        let delta_world = tcp.rotation * delta_local;

        Some(Isometry3::from_parts(
            Translation3::from(tcp.translation.vector + delta_world),
            tcp.rotation,
        ))
    }

    /// Apply one policy action as a single Jacobian step
    pub fn handle_action<G: SceneGraph + ?Sized>(
        &self,
        action: &[f64],
        controller: &Controller,
        chain: &mut KinematicChain,
        graph: &mut G,
    ) -> Option<JacobianReport> {
        let tcp = chain.end_effector_pose(&*graph)?;
        let Some(target) = self.action_target(action, &tcp) else {
            debug!("Ignoring action {:?} in {} phase", action, self.phase);
            return None;
        };
        controller.apply_ik(chain, graph, &IkTarget::Pose(target))
    }

    /// Policy input vector `[dx, dy, dz, ori_err]` in the TCP frame
    pub fn observation(rel: &RelativePose) -> [f64; 4] {
        [
            rel.position.x,
            rel.position.y,
            rel.position.z,
            rel.orientation_error(),
        ]
    }
}
