//! Kinematic chain bound to an external scene graph
//!
//! Joints are resolved once by alias and then addressed through direct node
//! handles. Every angle write re-derives the node's local rotation from the
//! rotation cached at bind time, so repeated small deltas never accumulate
//! drift.

use super::joint::{JointId, JointSpec};
use super::limits::JointLimitStore;
use crate::tf::{NodeId, SceneGraph};
use nalgebra::{Isometry3, Point3, Unit, UnitQuaternion, Vector3};
use std::fmt;
use tracing::{debug, info, warn};

/// A revolute joint bound to a scene node
#[derive(Debug, Clone)]
pub struct Joint {
    spec: JointSpec,
    node: NodeId,
    default_rotation: UnitQuaternion<f64>,
    angle: f64,
}

impl Joint {
    pub fn id(&self) -> JointId {
        self.spec.id
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Rotation axis in the joint's default local frame
    pub fn axis(&self) -> Unit<Vector3<f64>> {
        self.spec.axis
    }

    /// Current angle in radians
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Local rotation captured when the chain was attached
    pub fn default_rotation(&self) -> UnitQuaternion<f64> {
        self.default_rotation
    }

    pub fn spec(&self) -> &JointSpec {
        &self.spec
    }

    /// World position and world-frame rotation axis of the joint
    pub fn world_axis<G: SceneGraph + ?Sized>(
        &self,
        graph: &G,
    ) -> Option<(Point3<f64>, Vector3<f64>)> {
        let pose = graph.world_pose(self.node)?;
        let axis = (pose.rotation * self.spec.axis.into_inner()).normalize();
        Some((pose * Point3::origin(), axis))
    }
}

/// Ordered chain of revolute joints, base to tip
pub struct KinematicChain {
    specs: Vec<JointSpec>,
    /// Resolved joints in ascending depth order
    joints: Vec<Joint>,
    end_effector: Option<NodeId>,
    limit_store: Option<Box<dyn JointLimitStore>>,
}

impl fmt::Debug for KinematicChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KinematicChain")
            .field("joints", &self.joints)
            .field("end_effector", &self.end_effector)
            .field("has_limit_store", &self.limit_store.is_some())
            .finish()
    }
}

impl Default for KinematicChain {
    fn default() -> Self {
        Self::new(JointSpec::defaults())
    }
}

impl KinematicChain {
    /// Create an unbound chain from a joint table
    pub fn new(specs: Vec<JointSpec>) -> Self {
        Self {
            specs,
            joints: Vec::new(),
            end_effector: None,
            limit_store: None,
        }
    }

    /// Install a joint-limit store consulted on every angle write
    pub fn with_limit_store(mut self, store: Box<dyn JointLimitStore>) -> Self {
        self.limit_store = Some(store);
        self
    }

    pub fn set_limit_store(&mut self, store: Option<Box<dyn JointLimitStore>>) {
        self.limit_store = store;
    }

    pub fn limit_store(&self) -> Option<&dyn JointLimitStore> {
        self.limit_store.as_deref()
    }

    pub fn limit_store_mut(&mut self) -> Option<&mut (dyn JointLimitStore + 'static)> {
        self.limit_store.as_deref_mut()
    }

    /// Bind joints to nodes below `root`.
    ///
    /// For each configured joint the first matching non-leaf node wins,
    /// falling back to any match. Unresolved joints are skipped. Angles and
    /// cached default rotations are reset, then FK runs once. Returns the
    /// number of resolved joints.
    pub fn attach<G: SceneGraph + ?Sized>(&mut self, graph: &mut G, root: NodeId) -> usize {
        let mut resolved: Vec<(usize, Joint)> = Vec::new();

        for spec in &self.specs {
            let matches = graph.find_descendants(root, &|name: &str| spec.matches(name));
            let node = matches
                .iter()
                .copied()
                .find(|n| !graph.is_leaf(*n))
                .or_else(|| matches.first().copied());

            let Some(node) = node else {
                warn!("Joint {} not found in scene (aliases: {:?})", spec.id, spec.aliases);
                continue;
            };
            let (Some(depth), Some(default_rotation)) =
                (graph.depth(node), graph.local_rotation(node))
            else {
                warn!("Joint {} bound to a node without pose data, skipping", spec.id);
                continue;
            };

            resolved.push((
                depth,
                Joint {
                    spec: spec.clone(),
                    node,
                    default_rotation,
                    angle: 0.0,
                },
            ));
        }

        // Stable sort keeps configured order among joints at equal depth
        resolved.sort_by_key(|(depth, _)| *depth);
        self.joints = resolved.into_iter().map(|(_, j)| j).collect();

        info!(
            "Attached {}/{} joints: {:?}",
            self.joints.len(),
            self.specs.len(),
            self.joint_ids()
        );

        self.apply_fk(graph);
        self.joints.len()
    }

    /// Set a joint angle in radians, clamped to the stored limits if any,
    /// else to the joint's static bounds.
    ///
    /// No-op when the joint is not bound.
    pub fn set_joint_angle<G: SceneGraph + ?Sized>(
        &mut self,
        graph: &mut G,
        joint: JointId,
        radians: f64,
    ) {
        if let Some(index) = self.index_of(joint) {
            self.set_angle_at(graph, index, radians);
        }
    }

    /// Add a delta to a joint's current angle (clamped)
    pub fn offset_joint_angle<G: SceneGraph + ?Sized>(
        &mut self,
        graph: &mut G,
        joint: JointId,
        delta: f64,
    ) {
        if let Some(index) = self.index_of(joint) {
            let current = self.joints[index].angle;
            self.set_angle_at(graph, index, current + delta);
        }
    }

    /// Set the angle of the joint at a traversal index
    pub(crate) fn set_angle_at<G: SceneGraph + ?Sized>(
        &mut self,
        graph: &mut G,
        index: usize,
        radians: f64,
    ) {
        if !radians.is_finite() {
            debug!("Ignoring non-finite angle for {}", self.joints[index].spec.id);
            return;
        }

        let clamped = self.clamp_angle(&self.joints[index].spec, radians);
        let joint = &mut self.joints[index];
        joint.angle = clamped;

        let rotation =
            joint.default_rotation * UnitQuaternion::from_axis_angle(&joint.spec.axis, clamped);
        graph.set_local_rotation(joint.node, rotation);
    }

    /// Re-apply every stored angle in traversal order
    pub fn apply_fk<G: SceneGraph + ?Sized>(&mut self, graph: &mut G) {
        for index in 0..self.joints.len() {
            let angle = self.joints[index].angle;
            self.set_angle_at(graph, index, angle);
        }
    }

    /// Set several angles given in degrees, then run FK
    pub fn set_angles_deg<G, I>(&mut self, graph: &mut G, angles: I)
    where
        G: SceneGraph + ?Sized,
        I: IntoIterator<Item = (JointId, f64)>,
    {
        for (joint, degrees) in angles {
            self.set_joint_angle(graph, joint, degrees.to_radians());
        }
        self.apply_fk(graph);
    }

    /// Store limits replace the static bounds when configured for the joint
    fn clamp_angle(&self, spec: &JointSpec, radians: f64) -> f64 {
        match self.limit_store.as_ref().and_then(|s| s.limits(spec.id)) {
            Some(limits) if limits.is_set() => limits.clamp_radians(radians),
            _ => spec.clamp(radians),
        }
    }

    /// Install (or clear) an end-effector frame further down the tree
    pub fn set_end_effector(&mut self, node: Option<NodeId>) {
        self.end_effector = node;
    }

    /// Override node if set, else the deepest resolved joint
    pub fn end_effector(&self) -> Option<NodeId> {
        self.end_effector
            .or_else(|| self.joints.last().map(|j| j.node))
    }

    /// World pose of the end effector
    pub fn end_effector_pose<G: SceneGraph + ?Sized>(&self, graph: &G) -> Option<Isometry3<f64>> {
        graph.world_pose(self.end_effector()?)
    }

    fn index_of(&self, joint: JointId) -> Option<usize> {
        self.joints.iter().position(|j| j.spec.id == joint)
    }

    /// Resolved joints in traversal order
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn joint(&self, joint: JointId) -> Option<&Joint> {
        self.index_of(joint).map(|i| &self.joints[i])
    }

    pub fn is_resolved(&self, joint: JointId) -> bool {
        self.index_of(joint).is_some()
    }

    /// Current angle of a bound joint
    pub fn angle(&self, joint: JointId) -> Option<f64> {
        self.joint(joint).map(|j| j.angle)
    }

    /// (joint, radians) in traversal order
    pub fn angles(&self) -> Vec<(JointId, f64)> {
        self.joints.iter().map(|j| (j.spec.id, j.angle)).collect()
    }

    /// Joint identities in traversal order
    pub fn joint_ids(&self) -> Vec<JointId> {
        self.joints.iter().map(|j| j.spec.id).collect()
    }

    /// Configured joint table
    pub fn specs(&self) -> &[JointSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::limits::{JointLimits, MemoryLimitStore};
    use crate::tf::TransformGraph;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    /// base -> Motor1 -> Motor2 -> tip, links of length 1 along X
    fn two_link() -> (TransformGraph, NodeId) {
        let mut graph = TransformGraph::new("world");
        let base = graph.add_node(graph.root(), "base", Isometry3::identity()).unwrap();
        let m1 = graph.add_node(base, "Motor1", Isometry3::identity()).unwrap();
        let m2 = graph
            .add_node(m1, "Motor2", Isometry3::translation(1.0, 0.0, 0.0))
            .unwrap();
        let tip = graph
            .add_node(m2, "tip", Isometry3::translation(1.0, 0.0, 0.0))
            .unwrap();
        (graph, tip)
    }

    fn planar_specs() -> Vec<JointSpec> {
        vec![
            JointSpec::new(JointId::Motor1, Vector3::z()),
            JointSpec::new(JointId::Motor2, Vector3::z()),
        ]
    }

    #[test]
    fn test_attach_orders_by_depth() {
        let (mut graph, _) = two_link();
        // Configured tip-first; traversal order must still be base-first
        let mut chain = KinematicChain::new(planar_specs().into_iter().rev().collect());

        assert_eq!(chain.attach(&mut graph, TransformGraph::ROOT), 2);
        assert_eq!(chain.joint_ids(), vec![JointId::Motor1, JointId::Motor2]);
    }

    #[test]
    fn test_attach_prefers_non_leaf_match() {
        let mut graph = TransformGraph::new("world");
        // A mesh leaf sharing the joint name comes first in traversal order
        let _mesh = graph.add_node(graph.root(), "Elbow", Isometry3::identity()).unwrap();
        let frame = graph.add_node(graph.root(), "Motor3", Isometry3::identity()).unwrap();
        let _child = graph.add_node(frame, "link3", Isometry3::identity()).unwrap();

        let mut chain = KinematicChain::new(vec![JointSpec::new(JointId::Motor3, Vector3::z())]);
        chain.attach(&mut graph, TransformGraph::ROOT);

        assert_eq!(chain.joint(JointId::Motor3).unwrap().node(), frame);
    }

    #[test]
    fn test_attach_falls_back_to_leaf() {
        let mut graph = TransformGraph::new("world");
        let leaf = graph.add_node(graph.root(), "wrist1", Isometry3::identity()).unwrap();

        let mut chain = KinematicChain::new(vec![JointSpec::new(JointId::Motor4, Vector3::y())]);
        chain.attach(&mut graph, TransformGraph::ROOT);

        assert_eq!(chain.joint(JointId::Motor4).unwrap().node(), leaf);
    }

    #[test]
    fn test_unresolved_joints_are_skipped() {
        let (mut graph, _) = two_link();
        let mut chain = KinematicChain::default();

        assert_eq!(chain.attach(&mut graph, TransformGraph::ROOT), 2);
        assert!(!chain.is_resolved(JointId::Motor5));

        // No-op, no panic
        chain.set_joint_angle(&mut graph, JointId::Motor5, 1.0);
        assert_eq!(chain.angle(JointId::Motor5), None);
    }

    #[test]
    fn test_set_joint_angle_moves_tip() {
        let (mut graph, tip) = two_link();
        let mut chain = KinematicChain::new(planar_specs());
        chain.attach(&mut graph, TransformGraph::ROOT);

        chain.set_joint_angle(&mut graph, JointId::Motor1, FRAC_PI_2);
        chain.apply_fk(&mut graph);

        let p = graph.world_pose(tip).unwrap() * Point3::origin();
        assert_relative_eq!(p, Point3::new(0.0, 2.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_is_rederived_not_accumulated() {
        let (mut graph, _) = two_link();
        let mut chain = KinematicChain::new(planar_specs());
        chain.attach(&mut graph, TransformGraph::ROOT);
        let node = chain.joint(JointId::Motor1).unwrap().node();

        for _ in 0..1000 {
            chain.offset_joint_angle(&mut graph, JointId::Motor1, 0.001);
        }
        for _ in 0..1000 {
            chain.offset_joint_angle(&mut graph, JointId::Motor1, -0.001);
        }

        let angle = chain.angle(JointId::Motor1).unwrap();
        let expected = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angle);
        assert_eq!(graph.local_rotation(node).unwrap(), expected);
    }

    #[test]
    fn test_static_bounds_clamp() {
        let (mut graph, _) = two_link();
        let mut chain = KinematicChain::new(vec![
            JointSpec::new(JointId::Motor1, Vector3::z()).with_bounds(-0.5, 0.5),
            JointSpec::new(JointId::Motor2, Vector3::z()),
        ]);
        chain.attach(&mut graph, TransformGraph::ROOT);

        chain.set_joint_angle(&mut graph, JointId::Motor1, 3.0);
        assert_eq!(chain.angle(JointId::Motor1), Some(0.5));
    }

    #[test]
    fn test_limit_store_clamp_is_read_on_every_write() {
        let (mut graph, _) = two_link();
        let mut chain =
            KinematicChain::new(planar_specs()).with_limit_store(Box::new(MemoryLimitStore::new()));
        chain.attach(&mut graph, TransformGraph::ROOT);

        chain.set_joint_angle(&mut graph, JointId::Motor2, 1.0);
        assert_eq!(chain.angle(JointId::Motor2), Some(1.0));

        chain
            .limit_store_mut()
            .unwrap()
            .set_limits(JointId::Motor2, JointLimits::new(Some(-10.0), Some(10.0)));
        chain.set_joint_angle(&mut graph, JointId::Motor2, 1.0);
        assert_eq!(chain.angle(JointId::Motor2), Some(10f64.to_radians()));
    }

    #[test]
    fn test_non_finite_angle_ignored() {
        let (mut graph, _) = two_link();
        let mut chain = KinematicChain::new(planar_specs());
        chain.attach(&mut graph, TransformGraph::ROOT);

        chain.set_joint_angle(&mut graph, JointId::Motor1, 0.2);
        chain.set_joint_angle(&mut graph, JointId::Motor1, f64::NAN);
        assert_eq!(chain.angle(JointId::Motor1), Some(0.2));
    }

    #[test]
    fn test_end_effector_resolution() {
        let (mut graph, tip) = two_link();
        let mut chain = KinematicChain::new(planar_specs());
        assert_eq!(chain.end_effector(), None);

        chain.attach(&mut graph, TransformGraph::ROOT);
        let m2 = chain.joint(JointId::Motor2).unwrap().node();
        assert_eq!(chain.end_effector(), Some(m2));

        chain.set_end_effector(Some(tip));
        assert_eq!(chain.end_effector(), Some(tip));

        chain.set_end_effector(None);
        assert_eq!(chain.end_effector(), Some(m2));
    }

    #[test]
    fn test_reattach_resets_angles() {
        let (mut graph, _) = two_link();
        let mut chain = KinematicChain::new(planar_specs());
        chain.attach(&mut graph, TransformGraph::ROOT);
        chain.set_joint_angle(&mut graph, JointId::Motor1, 0.7);

        // Re-binding zeroes angles; the default rotation is re-captured as-is
        chain.attach(&mut graph, TransformGraph::ROOT);
        assert_eq!(chain.angle(JointId::Motor1), Some(0.0));
    }
}
