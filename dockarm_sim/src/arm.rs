//! Reference scene: a seven-joint arm and a charger socket
//!
//! Links run along each motor's local +Z. Every motor frame carries a mesh
//! leaf with the same name, the way exported CAD hierarchies do, so joint
//! binding has to prefer the non-leaf frame.

use anyhow::{Context, Result};
use dockarm_core::tf::{NodeId, SceneGraph, TransformGraph};
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use std::f64::consts::FRAC_PI_2;

/// Motor frame name and offset from the previous frame (meters)
const LINKS: [(&str, [f64; 3]); 7] = [
    ("Motor1", [0.0, 0.0, 0.10]),
    ("Motor2", [0.0, 0.0, 0.12]),
    ("Motor3", [0.0, 0.0, 0.30]),
    ("Motor4", [0.0, 0.0, 0.25]),
    ("Motor5", [0.0, 0.0, 0.20]),
    ("Motor6", [0.0, 0.0, 0.15]),
    ("Motor7", [0.0, 0.0, 0.10]),
];

pub const TIP_MOUNT: &str = "EE_TIP_MOUNT";
pub const PLUG_FRAME: &str = "PlugFrame";
pub const CHARGER: &str = "charger_root";
pub const PORT_FRAME: &str = "PortFrame";

/// Handles into the reference scene
#[derive(Debug, Clone, Copy)]
pub struct ArmScene {
    pub base: NodeId,
    pub plug: NodeId,
    pub charger: NodeId,
    pub port: NodeId,
}

/// Build the arm under the graph root. The charger starts at the origin;
/// place it with [`place_charger`] once the arm pose is known.
pub fn build(graph: &mut TransformGraph) -> Result<ArmScene> {
    let root = graph.root();
    let base = graph.add_node(root, "arm_base", Isometry3::identity())?;

    let mut parent = base;
    for (name, [x, y, z]) in LINKS {
        let motor = graph.add_node(parent, name, Isometry3::translation(x, y, z))?;
        graph.add_node(motor, name, Isometry3::identity())?;
        parent = motor;
    }

    let tip_mount = graph.add_node(
        parent,
        TIP_MOUNT,
        Isometry3::from_parts(
            Translation3::new(0.0, -0.15, -0.1),
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), -FRAC_PI_2),
        ),
    )?;
    let plug = graph.add_node(tip_mount, PLUG_FRAME, Isometry3::translation(0.0, -0.10, -0.08))?;

    let charger = graph.add_node(root, CHARGER, Isometry3::identity())?;
    let port = graph.add_node(charger, "Port", Isometry3::translation(0.0, 0.0, 0.02))?;
    let port = graph.add_node(port, PORT_FRAME, Isometry3::identity())?;

    Ok(ArmScene {
        base,
        plug,
        charger,
        port,
    })
}

/// Move the charger so its port frame lands on `port_world`
pub fn place_charger(
    graph: &mut TransformGraph,
    scene: &ArmScene,
    port_world: &Isometry3<f64>,
) -> Result<()> {
    let charger_world = graph
        .world_pose(scene.charger)
        .context("charger frame missing")?;
    let port_current = graph.world_pose(scene.port).context("port frame missing")?;

    // Port offset inside the charger stays fixed
    let port_in_charger = charger_world.inverse() * port_current;
    graph.set_local_pose(scene.charger, port_world * port_in_charger.inverse())?;
    Ok(())
}

/// Socket pose whose standoff target sits at `tcp · offset`.
///
/// Inverts the standoff construction: `standoff = socket · R · T(0, 0, d)`.
pub fn socket_for_standoff(
    tcp: &Isometry3<f64>,
    offset: &Isometry3<f64>,
    approach: &UnitQuaternion<f64>,
    standoff: f64,
) -> Isometry3<f64> {
    let standoff_in_socket = Isometry3::from_parts(Translation3::identity(), *approach)
        * Isometry3::translation(0.0, 0.0, standoff);
    tcp * offset * standoff_in_socket.inverse()
}
