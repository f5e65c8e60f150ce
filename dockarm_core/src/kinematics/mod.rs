//! Joint table, joint-limit persistence and the kinematic chain
//!
//! # Example
//!
//! ```rust
//! use dockarm_core::kinematics::{JointId, JointSpec, KinematicChain};
//! use dockarm_core::tf::TransformGraph;
//! use nalgebra::{Isometry3, Vector3};
//!
//! let mut graph = TransformGraph::new("world");
//! let m1 = graph.add_node(graph.root(), "Motor1", Isometry3::identity()).unwrap();
//! let _tip = graph.add_node(m1, "tip", Isometry3::translation(1.0, 0.0, 0.0)).unwrap();
//!
//! let mut chain = KinematicChain::new(vec![JointSpec::new(JointId::Motor1, Vector3::z())]);
//! chain.attach(&mut graph, TransformGraph::ROOT);
//! chain.set_joint_angle(&mut graph, JointId::Motor1, 0.5);
//! chain.apply_fk(&mut graph);
//! assert_eq!(chain.angle(JointId::Motor1), Some(0.5));
//! ```

mod chain;
mod joint;
mod limits;

pub use chain::{Joint, KinematicChain};
pub use joint::{JointId, JointSpec, UnknownJoint};
pub use limits::{
    FileLimitStore, JointLimitStore, JointLimits, LimitStoreError, LimitStoreResult,
    MemoryLimitStore,
};
