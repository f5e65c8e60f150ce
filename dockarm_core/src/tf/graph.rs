//! Scene graph seam and the in-memory transform tree
//!
//! Frames are stored in an arena and addressed by [`NodeId`]. World poses are
//! composed root-to-node on every query, so a read always reflects the latest
//! local writes without a separate propagation pass.

use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use thiserror::Error;

/// Graph construction errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node {0} not found")]
    NodeNotFound(usize),

    #[error("Parent node {0} does not exist")]
    ParentNotFound(usize),
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Handle to a node owned by the host scene graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Capabilities the kinematic core needs from a host scene graph.
///
/// The core reads world poses and structural depth, and writes local
/// rotations. It never creates or destroys nodes.
pub trait SceneGraph {
    /// Descendants of `root` (inclusive, depth-first pre-order) whose name
    /// satisfies `matches`
    fn find_descendants(&self, root: NodeId, matches: &dyn Fn(&str) -> bool) -> Vec<NodeId>;

    /// True when the node has no children
    fn is_leaf(&self, node: NodeId) -> bool;

    /// Number of ancestors between the node and the graph root
    fn depth(&self, node: NodeId) -> Option<usize>;

    /// Rotation of the node relative to its parent
    fn local_rotation(&self, node: NodeId) -> Option<UnitQuaternion<f64>>;

    /// Overwrite the rotation of the node relative to its parent.
    ///
    /// Returns false when the node does not exist.
    fn set_local_rotation(&mut self, node: NodeId, rotation: UnitQuaternion<f64>) -> bool;

    /// Pose of the node in the world (root) frame
    fn world_pose(&self, node: NodeId) -> Option<Isometry3<f64>>;
}

/// A node in the transform graph
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Frame name
    pub name: String,
    /// Parent node (None for root)
    pub parent: Option<NodeId>,
    /// Child nodes in insertion order
    pub children: Vec<NodeId>,
    /// Transform from the parent frame to this frame
    pub local: Isometry3<f64>,
}

/// Arena-backed transform tree
#[derive(Debug, Clone)]
pub struct TransformGraph {
    nodes: Vec<GraphNode>,
}

impl Default for TransformGraph {
    fn default() -> Self {
        Self::new("world")
    }
}

impl TransformGraph {
    /// Handle of the root frame in every graph
    pub const ROOT: NodeId = NodeId(0);

    /// Create a graph holding only a root frame
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            nodes: vec![GraphNode {
                name: root.into(),
                parent: None,
                children: Vec::new(),
                local: Isometry3::identity(),
            }],
        }
    }

    /// Root node handle
    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A graph always holds at least its root
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a child frame under `parent`
    pub fn add_node(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        local: Isometry3<f64>,
    ) -> GraphResult<NodeId> {
        if parent.0 >= self.nodes.len() {
            return Err(GraphError::ParentNotFound(parent.0));
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(GraphNode {
            name: name.into(),
            parent: Some(parent),
            children: Vec::new(),
            local,
        });
        self.nodes[parent.0].children.push(id);

        Ok(id)
    }

    /// Get a node by handle
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id.0)
    }

    /// First node (pre-order from the root) with exactly this name
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.find_descendants(self.root(), &|n: &str| n == name)
            .into_iter()
            .next()
    }

    /// Replace a node's local pose
    pub fn set_local_pose(&mut self, id: NodeId, local: Isometry3<f64>) -> GraphResult<()> {
        self.nodes
            .get_mut(id.0)
            .ok_or(GraphError::NodeNotFound(id.0))?
            .local = local;
        Ok(())
    }

    /// Replace a node's local translation, keeping its rotation
    pub fn set_local_translation(
        &mut self,
        id: NodeId,
        translation: Translation3<f64>,
    ) -> GraphResult<()> {
        self.nodes
            .get_mut(id.0)
            .ok_or(GraphError::NodeNotFound(id.0))?
            .local
            .translation = translation;
        Ok(())
    }
}

impl SceneGraph for TransformGraph {
    fn find_descendants(&self, root: NodeId, matches: &dyn Fn(&str) -> bool) -> Vec<NodeId> {
        let mut found = Vec::new();
        if root.0 >= self.nodes.len() {
            return found;
        }

        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            if matches(&node.name) {
                found.push(id);
            }
            // Reverse so the first child is visited first
            stack.extend(node.children.iter().rev().copied());
        }

        found
    }

    fn is_leaf(&self, node: NodeId) -> bool {
        self.nodes
            .get(node.0)
            .map(|n| n.children.is_empty())
            .unwrap_or(true)
    }

    fn depth(&self, node: NodeId) -> Option<usize> {
        let mut current = self.nodes.get(node.0)?;
        let mut depth = 0;
        while let Some(parent) = current.parent {
            depth += 1;
            current = &self.nodes[parent.0];
        }
        Some(depth)
    }

    fn local_rotation(&self, node: NodeId) -> Option<UnitQuaternion<f64>> {
        self.nodes.get(node.0).map(|n| n.local.rotation)
    }

    fn set_local_rotation(&mut self, node: NodeId, rotation: UnitQuaternion<f64>) -> bool {
        match self.nodes.get_mut(node.0) {
            Some(n) => {
                n.local.rotation = rotation;
                true
            }
            None => false,
        }
    }

    fn world_pose(&self, node: NodeId) -> Option<Isometry3<f64>> {
        let mut current = self.nodes.get(node.0)?;
        let mut pose = current.local;
        while let Some(parent) = current.parent {
            current = &self.nodes[parent.0];
            pose = current.local * pose;
        }
        Some(pose)
    }
}
