//! # DOCKARM Core
//!
//! Kinematic core of the docking simulator: a manipulator chain bound to a
//! host scene graph, CCD and Jacobian-transpose IK, the controller façade and
//! the two phase machines that decide who drives the arm.
//!
//! ## Structure
//!
//! ```text
//! dockarm_core/
//! ── tf/          # Scene graph seam, transform tree, relative poses
//! ── kinematics/  # Joint table, limit store, kinematic chain
//! ── ik/          # CCD and Jacobian-transpose solvers
//! ── control/     # Controller façade and remote command shapes
//! ── phase/       # Task (approach/insert/done) and policy (IK/RL/DONE) machines
//! ── session      # Per-tick control loop
//! ── telemetry    # Serialisable snapshots
//! ── config       # TOML session configuration
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use dockarm_core::prelude::*;
//! use nalgebra::Isometry3;
//!
//! let mut graph = TransformGraph::new("world");
//! let m1 = graph.add_node(graph.root(), "Motor1", Isometry3::identity()).unwrap();
//! graph.add_node(m1, "link1", Isometry3::translation(0.0, 0.0, 0.3)).unwrap();
//!
//! let mut session = Session::new(SessionConfig::default());
//! session.attach(&mut graph, TransformGraph::ROOT);
//!
//! let socket = Isometry3::translation(0.2, 0.0, 0.2);
//! let report = session.tick(&mut graph, TickInput::with_socket(socket));
//! assert_eq!(report.telemetry.policy_phase, PolicyPhase::Ik);
//! ```

pub mod config;
pub mod control;
pub mod ik;
pub mod kinematics;
pub mod phase;
pub mod session;
pub mod telemetry;
pub mod tf;

pub use config::{ConfigError, ConfigResult, SessionConfig, TargetingMode};
pub use session::{Session, TickInput, TickReport};

/// Commonly used types
pub mod prelude {
    pub use crate::config::{ApproachConfig, SessionConfig, TargetingMode};
    pub use crate::control::{ControlCommand, Controller, ControllerConfig, InputFlags, WristErrors};
    pub use crate::ik::{CcdSolver, IkTarget, JacobianSolver};
    pub use crate::kinematics::{
        FileLimitStore, JointId, JointLimitStore, JointLimits, JointSpec, KinematicChain,
        MemoryLimitStore,
    };
    pub use crate::phase::{
        PolicyPhase, PolicyPhaseMachine, PolicyThresholds, TaskPhase, TaskPhaseMachine,
        TaskThresholds,
    };
    pub use crate::session::{Session, TickInput, TickReport};
    pub use crate::telemetry::Telemetry;
    pub use crate::tf::{relative_pose, NodeId, RelativePose, SceneGraph, TransformGraph};
}
