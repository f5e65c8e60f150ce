//! DOCKARM transform graph
//!
//! The kinematic core never owns scene nodes. It talks to whatever hosts the
//! node hierarchy through the [`SceneGraph`] trait, using [`NodeId`] handles
//! resolved once at attach time.
//!
//! # Overview
//!
//! - [`SceneGraph`]: the capability seam (lookup, depth, local rotation,
//!   world pose)
//! - [`TransformGraph`]: in-memory arena implementation used by the simulator
//!   and the tests
//! - [`RelativePose`]: pose of one frame expressed in another
//!
//! # Example
//!
//! ```rust
//! use dockarm_core::tf::{SceneGraph, TransformGraph};
//! use nalgebra::{Isometry3, Vector3};
//!
//! let mut graph = TransformGraph::new("world");
//! let root = graph.root();
//! let base = graph
//!     .add_node(root, "base_link", Isometry3::translation(0.0, 0.0, 0.5))
//!     .unwrap();
//!
//! let pose = graph.world_pose(base).unwrap();
//! assert_eq!(pose.translation.vector, Vector3::new(0.0, 0.0, 0.5));
//! ```

mod graph;
mod pose;

pub use graph::{GraphError, GraphNode, GraphResult, NodeId, SceneGraph, TransformGraph};
pub use pose::{relative_pose, rotation_angle, RelativePose};
