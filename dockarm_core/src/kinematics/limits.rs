//! Persisted per-joint angle limits
//!
//! Limits are stored in degrees with either bound optional, matching what an
//! operator enters in a configuration surface. The chain reads the store
//! before every angle write.

use super::joint::JointId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Joint-limit store errors
#[derive(Debug, Error)]
pub enum LimitStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed limits file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for limit store operations
pub type LimitStoreResult<T> = Result<T, LimitStoreError>;

/// Angle bounds for one joint, in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl JointLimits {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// True when at least one bound is set
    pub fn is_set(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// Clamp an angle given in radians against the degree bounds
    pub fn clamp_radians(&self, radians: f64) -> f64 {
        let degrees = radians.to_degrees();
        let mut clamped = radians;
        if let Some(min) = self.min.filter(|m| m.is_finite()) {
            if degrees < min {
                clamped = min.to_radians();
            }
        }
        if let Some(max) = self.max.filter(|m| m.is_finite()) {
            if clamped.to_degrees() > max {
                clamped = max.to_radians();
            }
        }
        clamped
    }
}

/// Source of per-joint clamp policy
pub trait JointLimitStore: Send {
    /// Current limits for a joint, if any were configured
    fn limits(&self, joint: JointId) -> Option<JointLimits>;

    /// Replace the limits for a joint
    fn set_limits(&mut self, joint: JointId, limits: JointLimits);

    /// All configured limits
    fn all(&self) -> BTreeMap<JointId, JointLimits>;
}

/// Volatile in-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryLimitStore {
    limits: BTreeMap<JointId, JointLimits>,
}

impl MemoryLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JointLimitStore for MemoryLimitStore {
    fn limits(&self, joint: JointId) -> Option<JointLimits> {
        self.limits.get(&joint).copied()
    }

    fn set_limits(&mut self, joint: JointId, limits: JointLimits) {
        self.limits.insert(joint, limits);
    }

    fn all(&self) -> BTreeMap<JointId, JointLimits> {
        self.limits.clone()
    }
}

/// JSON-file backed store, written through on every change.
///
/// File layout: `{"Motor1": {"min": -90.0, "max": 90.0}, "Motor4": {"min": null, "max": 45.0}}`.
/// Unknown joint names in the file are skipped.
#[derive(Debug, Clone)]
pub struct FileLimitStore {
    limits: BTreeMap<JointId, JointLimits>,
    path: PathBuf,
}

impl FileLimitStore {
    /// Open a store at `path`, loading it when the file exists
    pub fn open(path: impl Into<PathBuf>) -> LimitStoreResult<Self> {
        let mut store = Self {
            limits: BTreeMap::new(),
            path: path.into(),
        };
        let path = store.path.clone();
        store.load_from_disk(&path)?;
        Ok(store)
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory limits with the contents of `path`
    pub fn load_from_disk(&mut self, path: &Path) -> LimitStoreResult<()> {
        if path.exists() {
            let json = std::fs::read_to_string(path)?;
            let raw: BTreeMap<String, JointLimits> = serde_json::from_str(&json)?;

            self.limits.clear();
            for (name, limits) in raw {
                match name.parse::<JointId>() {
                    Ok(joint) => {
                        self.limits.insert(joint, limits);
                    }
                    Err(e) => warn!("Skipping limits entry: {}", e),
                }
            }
            debug!("Loaded {} joint limits from {}", self.limits.len(), path.display());
        }
        Ok(())
    }

    /// Write the limits to the backing file
    pub fn save_to_disk(&self) -> LimitStoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let raw: BTreeMap<&str, JointLimits> = self
            .limits
            .iter()
            .map(|(joint, limits)| (joint.name(), *limits))
            .collect();
        let json = serde_json::to_string_pretty(&raw)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl JointLimitStore for FileLimitStore {
    fn limits(&self, joint: JointId) -> Option<JointLimits> {
        self.limits.get(&joint).copied()
    }

    fn set_limits(&mut self, joint: JointId, limits: JointLimits) {
        self.limits.insert(joint, limits);
        if let Err(e) = self.save_to_disk() {
            warn!("Failed to persist joint limits to {}: {}", self.path.display(), e);
        }
    }

    fn all(&self) -> BTreeMap<JointId, JointLimits> {
        self.limits.clone()
    }
}
