//! Per-tick docking session
//!
//! A [`Session`] owns everything the control loop mutates between ticks: the
//! kinematic chain, both phase machines, the operator input flags, held jog
//! directions and the manual IK target. The host owns the scene graph and
//! passes it into every call.
//!
//! One [`Session::tick`] performs, in order:
//!
//! 1. held jogs (`angle += direction · jog_step`)
//! 2. one Jacobian step toward the direct target, if direct targeting is on
//! 3. forward kinematics
//! 4. policy phase update from the TCP→socket relative pose, skipped in
//!    scripted targeting where the task machine owns the approach
//! 5. the policy action, if one was supplied
//!
//! and returns a [`TickReport`] with a telemetry snapshot.

use crate::config::{SessionConfig, TargetingMode};
use crate::control::{Controller, InputFlags};
use crate::ik::{IkTarget, JacobianReport};
use crate::kinematics::{JointId, KinematicChain};
use crate::phase::{PolicyPhase, PolicyPhaseMachine, TaskPhase, TaskPhaseMachine};
use crate::telemetry::{JointReading, PoseRecord, Telemetry};
use crate::tf::{relative_pose, NodeId, RelativePose, SceneGraph};
use nalgebra::{Isometry3, Point3, Translation3};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Inputs supplied by the host for one tick
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput<'a> {
    /// Current socket world pose, if known
    pub socket: Option<Isometry3<f64>>,
    /// Policy action for this tick
    pub action: Option<&'a [f64]>,
}

impl<'a> TickInput<'a> {
    pub fn with_socket(socket: Isometry3<f64>) -> Self {
        Self {
            socket: Some(socket),
            action: None,
        }
    }

    pub fn action(mut self, action: &'a [f64]) -> Self {
        self.action = Some(action);
        self
    }
}

/// What one tick did
#[derive(Debug, Clone)]
pub struct TickReport {
    pub telemetry: Telemetry,
    /// Direct-targeting IK step, if one ran
    pub ik: Option<JacobianReport>,
    /// Policy action step, if the action was accepted
    pub action: Option<JacobianReport>,
    pub task_transition: Option<(TaskPhase, TaskPhase)>,
    pub policy_transition: Option<(PolicyPhase, PolicyPhase)>,
}

/// Control-loop state for one arm
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    chain: KinematicChain,
    controller: Controller,
    task: TaskPhaseMachine,
    policy: PolicyPhaseMachine,
    flags: InputFlags,
    jogs: BTreeMap<JointId, f64>,
    manual_target: Option<Isometry3<f64>>,
    scripted_target: Option<Point3<f64>>,
    tick: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Session {
    /// Session over the default joint table
    pub fn new(config: SessionConfig) -> Self {
        Self::with_chain(config, KinematicChain::default())
    }

    /// Session over a pre-configured chain (custom joint table or limit store)
    pub fn with_chain(config: SessionConfig, chain: KinematicChain) -> Self {
        Self {
            controller: config.build_controller(),
            task: TaskPhaseMachine::new(config.task),
            policy: PolicyPhaseMachine::new(config.policy),
            config,
            chain,
            flags: InputFlags::default(),
            jogs: BTreeMap::new(),
            manual_target: None,
            scripted_target: None,
            tick: 0,
        }
    }

    /// Bind the chain below `root` and apply the configured initial pose
    pub fn attach<G: SceneGraph + ?Sized>(&mut self, graph: &mut G, root: NodeId) -> usize {
        let resolved = self.chain.attach(graph, root);
        self.chain.set_angles_deg(graph, self.config.initial_angles());
        resolved
    }

    /// Restart both phase machines and re-enable direct targeting.
    ///
    /// Joint angles are left where they are.
    pub fn reset(&mut self) {
        self.policy.reset(&mut self.flags);
        self.task.reset();
        self.scripted_target = None;
        info!("Session reset");
    }

    pub fn set_manual_target(&mut self, target: Option<Isometry3<f64>>) {
        self.manual_target = target;
    }

    pub fn set_direct_targeting(&mut self, enabled: bool) {
        self.flags.direct_targeting = enabled;
    }

    /// Start (or change) a jog; `direction` is clamped to [-1, 1]
    pub fn hold_jog(&mut self, joint: JointId, direction: f64) {
        if direction.is_finite() {
            self.jogs.insert(joint, direction.clamp(-1.0, 1.0));
        }
    }

    pub fn release_jog(&mut self, joint: JointId) {
        self.jogs.remove(&joint);
    }

    pub fn release_all_jogs(&mut self) {
        self.jogs.clear();
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn chain(&self) -> &KinematicChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut KinematicChain {
        &mut self.chain
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn flags(&self) -> InputFlags {
        self.flags
    }

    pub fn task_phase(&self) -> TaskPhase {
        self.task.phase()
    }

    pub fn policy_phase(&self) -> PolicyPhase {
        self.policy.phase()
    }

    pub fn policy(&self) -> &PolicyPhaseMachine {
        &self.policy
    }

    /// Ticks run so far
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Standoff pose in front of the socket.
    ///
    /// The socket orientation is rotated by the configured approach
    /// rotation, then the position is pushed out along the rotated +Z.
    pub fn standoff_pose(&self, socket: &Isometry3<f64>) -> Isometry3<f64> {
        let approach = &self.config.approach;
        let rotation = socket.rotation * approach.rotation();
        let position = socket.translation.vector + rotation * approach.offset();
        Isometry3::from_parts(Translation3::from(position), rotation)
    }

    /// Advance the loop by one tick
    pub fn tick<G: SceneGraph + ?Sized>(
        &mut self,
        graph: &mut G,
        input: TickInput<'_>,
    ) -> TickReport {
        self.tick += 1;
        let task_before = self.task.phase();
        let policy_before = self.policy.phase();

        for (joint, direction) in &self.jogs {
            self.chain
                .offset_joint_angle(graph, *joint, direction * self.config.jog_step);
        }

        let ik = if self.flags.direct_targeting {
            match self.direct_target(&*graph, input.socket.as_ref()) {
                Some(target) => self.controller.apply_ik(&mut self.chain, graph, &target),
                None => None,
            }
        } else {
            None
        };

        self.chain.apply_fk(graph);

        if self.config.targeting != TargetingMode::Scripted {
            if let Some(rel) = self.relative(&*graph, input.socket.as_ref()) {
                self.policy.update_phase(&rel, &mut self.flags);
            }
        }

        let action = match input.action {
            Some(action) => {
                let report = self.policy.handle_action(
                    action,
                    &self.controller,
                    &mut self.chain,
                    graph,
                );
                if report.is_none() {
                    debug!("Action not applied in {} phase", self.policy.phase());
                }
                report
            }
            None => None,
        };

        let task_after = self.task.phase();
        let policy_after = self.policy.phase();

        TickReport {
            telemetry: self.telemetry(&*graph, input.socket.as_ref()),
            ik,
            action,
            task_transition: (task_before != task_after).then_some((task_before, task_after)),
            policy_transition: (policy_before != policy_after)
                .then_some((policy_before, policy_after)),
        }
    }

    /// Snapshot of the chain and both phases
    pub fn telemetry<G: SceneGraph + ?Sized>(
        &self,
        graph: &G,
        socket: Option<&Isometry3<f64>>,
    ) -> Telemetry {
        let tcp = self.chain.end_effector_pose(graph);
        Telemetry {
            tick: self.tick,
            joints: self
                .chain
                .angles()
                .into_iter()
                .map(|(joint, radians)| JointReading { joint, radians })
                .collect(),
            tcp: tcp.as_ref().map(PoseRecord::from),
            socket: socket.map(PoseRecord::from),
            relative: self.relative(graph, socket).as_ref().map(PoseRecord::from),
            task_phase: self.task.phase(),
            policy_phase: self.policy.phase(),
            direct_targeting: self.flags.direct_targeting,
        }
    }

    fn relative<G: SceneGraph + ?Sized>(
        &self,
        graph: &G,
        socket: Option<&Isometry3<f64>>,
    ) -> Option<RelativePose> {
        let tcp = self.chain.end_effector_pose(graph)?;
        Some(relative_pose(&tcp, socket?))
    }

    /// Active direct target for this tick, if any
    fn direct_target<G: SceneGraph + ?Sized>(
        &mut self,
        graph: &G,
        socket: Option<&Isometry3<f64>>,
    ) -> Option<IkTarget> {
        let Some(socket) = socket else {
            return self.manual_target.map(IkTarget::Pose);
        };

        match self.config.targeting {
            TargetingMode::Standoff => Some(IkTarget::Pose(self.standoff_pose(socket))),
            TargetingMode::Scripted => {
                let effector = self.chain.end_effector_pose(graph)? * Point3::origin();
                let socket = Point3::from(socket.translation.vector);
                let current = self.scripted_target.unwrap_or(effector);
                let next = self.task.update(effector, socket, current);
                self.scripted_target = Some(next);
                Some(IkTarget::Point(next))
            }
        }
    }
}
