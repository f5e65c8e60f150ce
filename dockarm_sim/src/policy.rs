//! Scripted stand-in for the learned insertion policy
//!
//! The policy runs on its own thread and talks to the control loop over a
//! pair of channels: observations `[dx, dy, dz, ori_err]` go in, actions
//! `[ax, ay, az]` in [-1, 1] come back.

use anyhow::{anyhow, Context, Result};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::debug;

pub type Observation = [f64; 4];
pub type Action = [f64; 3];

/// Proportional policy: step straight at the socket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptedPolicy {
    /// Meters per unit action, matching the session's action scale
    pub action_scale: f64,
}

impl ScriptedPolicy {
    pub fn new(action_scale: f64) -> Self {
        Self { action_scale }
    }

    /// The session displaces the TCP by `-action · scale` in its own frame,
    /// so the action that lands on the socket is `-rel / scale`.
    pub fn act(&self, observation: &Observation) -> Action {
        let mut action = [0.0; 3];
        if self.action_scale <= 0.0 {
            return action;
        }
        for (a, rel) in action.iter_mut().zip(observation.iter()) {
            *a = if rel.is_finite() {
                (-rel / self.action_scale).clamp(-1.0, 1.0)
            } else {
                0.0
            };
        }
        action
    }
}

/// Policy running on a worker thread
pub struct PolicyWorker {
    observations: Option<Sender<Observation>>,
    actions: Receiver<Action>,
    handle: Option<JoinHandle<()>>,
}

impl PolicyWorker {
    pub fn spawn(policy: ScriptedPolicy) -> Result<Self> {
        let (obs_tx, obs_rx) = mpsc::channel::<Observation>();
        let (act_tx, act_rx) = mpsc::channel::<Action>();

        let handle = thread::Builder::new()
            .name("policy".into())
            .spawn(move || {
                for observation in obs_rx {
                    if act_tx.send(policy.act(&observation)).is_err() {
                        break;
                    }
                }
                debug!("Policy worker exiting");
            })
            .context("failed to spawn policy thread")?;

        Ok(Self {
            observations: Some(obs_tx),
            actions: act_rx,
            handle: Some(handle),
        })
    }

    /// Send one observation and wait for the matching action
    pub fn query(&self, observation: Observation) -> Result<Action> {
        self.observations
            .as_ref()
            .ok_or_else(|| anyhow!("policy worker stopped"))?
            .send(observation)
            .map_err(|_| anyhow!("policy worker disconnected"))?;
        self.actions
            .recv()
            .map_err(|_| anyhow!("policy worker disconnected"))
    }
}

impl Drop for PolicyWorker {
    fn drop(&mut self) {
        // Closing the observation channel ends the worker loop
        self.observations.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
