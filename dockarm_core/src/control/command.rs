//! Wire shape of remote control commands

use super::WristErrors;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A direct command from a remote agent, tagged by `mode`.
///
/// ```json
/// {"mode": "wrist-rpy-delta", "delta": {"droll": 0.0, "dpitch": 0.01, "dyaw": 0.0}}
/// {"mode": "joint-delta", "delta": {"Motor1": 0.01, "Motor2": -0.02}}
/// ```
///
/// Joint names are kept as strings so an unknown name only drops that entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum ControlCommand {
    WristRpyDelta { delta: WristErrors },
    JointDelta { delta: BTreeMap<String, f64> },
}
