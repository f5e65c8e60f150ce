//! Phase state machines
//!
//! - [`TaskPhaseMachine`]: scripted approach → insert → done, producing the
//!   live IK target
//! - [`PolicyPhaseMachine`]: IK → RL → DONE, deciding whether policy actions
//!   may drive the chain
//!
//! Both are thin stateful wrappers around pure `next` transition functions on
//! their phase enums.

mod policy;
mod task;

pub use policy::{PolicyObservation, PolicyPhase, PolicyPhaseMachine, PolicyThresholds};
pub use task::{TaskObservation, TaskPhase, TaskPhaseMachine, TaskThresholds};
