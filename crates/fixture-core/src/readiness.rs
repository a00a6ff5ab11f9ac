//! Readiness polling for resources reconciled from a fixture repository.
//!
//! Status is read through a [`StatusSource`] and judged by its Kubernetes
//! style `Ready` condition. Polling wraps read-only checks only; nothing in
//! this module mutates the repository.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use fixture_fs::ConfigStore;
use serde::{Deserialize, Serialize};

use crate::config::ReadinessConfig;
use crate::{Error, Result};

/// Condition type that marks a resource as usable.
pub const READY_CONDITION: &str = "Ready";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    #[serde(other)]
    Unknown,
}

/// One entry of `status.conditions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

impl Condition {
    pub fn new(type_: &str, status: ConditionStatus, reason: &str, message: &str) -> Self {
        Self {
            type_: type_.to_string(),
            status,
            reason: reason.to_string(),
            message: message.to_string(),
        }
    }
}

/// Status of one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusObject {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl StatusObject {
    /// Accept either a bare `{conditions: [...]}` document or a full object
    /// with `kind` and `status.conditions`.
    pub fn from_value(mut value: serde_json::Value) -> Result<Self> {
        let kind = value
            .get("kind")
            .and_then(|k| k.as_str())
            .map(str::to_string);
        let status = value
            .get_mut("status")
            .map(serde_json::Value::take)
            .unwrap_or(value);
        let mut object: StatusObject = serde_json::from_value(status)
            .map_err(|e| Error::config(format!("unreadable status document: {e}")))?;
        if object.kind.is_none() {
            object.kind = kind;
        }
        Ok(object)
    }

    pub fn ready_condition(&self) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == READY_CONDITION)
    }

    /// Human-readable reason the resource is or is not ready.
    pub fn summary(&self) -> String {
        let kind = self.kind.as_deref().unwrap_or("resource");
        match self.ready_condition() {
            Some(c) if c.message.is_empty() => format!("{kind} Ready={:?} ({})", c.status, c.reason),
            Some(c) => format!("{kind} Ready={:?}: {}", c.status, c.message),
            None => format!("{kind} has no {READY_CONDITION} condition"),
        }
    }
}

/// A `Ready` condition with status `True` is present.
pub fn is_ready(conditions: &[Condition]) -> bool {
    conditions
        .iter()
        .any(|c| c.type_ == READY_CONDITION && c.status == ConditionStatus::True)
}

/// Where status comes from.
pub trait StatusSource {
    fn status(&self) -> Result<StatusObject>;

    fn describe(&self) -> String {
        "status source".to_string()
    }
}

impl<F> StatusSource for F
where
    F: Fn() -> Result<StatusObject>,
{
    fn status(&self) -> Result<StatusObject> {
        self()
    }
}

/// Reads a JSON, YAML or TOML status document, e.g. `kubectl get -o json`
/// output written by the harness.
#[derive(Debug, Clone)]
pub struct FileStatusSource {
    path: PathBuf,
}

impl FileStatusSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl StatusSource for FileStatusSource {
    fn status(&self) -> Result<StatusObject> {
        let value: serde_json::Value = ConfigStore::new().load(&self.path)?;
        StatusObject::from_value(value)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Fixed-interval polling bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&ReadinessConfig::default())
    }
}

impl From<&ReadinessConfig> for PollPolicy {
    fn from(config: &ReadinessConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Poll `source` every `policy.interval` until it reports Ready.
///
/// Read failures count as "not ready yet"; the resource may simply not
/// exist yet. Gives up with [`Error::NotReady`] carrying the last
/// observation once `policy.timeout` has elapsed.
pub fn wait_until_ready(source: &dyn StatusSource, policy: PollPolicy) -> Result<StatusObject> {
    let schedule = ExponentialBackoffBuilder::new()
        .with_initial_interval(policy.interval)
        .with_max_interval(policy.interval)
        .with_multiplier(1.0)
        .with_randomization_factor(0.0)
        .with_max_elapsed_time(Some(policy.timeout))
        .build();

    let attempts = RefCell::new(0u32);
    let poll = || {
        *attempts.borrow_mut() += 1;
        match source.status() {
            Ok(object) if is_ready(&object.conditions) => Ok(object),
            Ok(object) => {
                let summary = object.summary();
                tracing::debug!(source = %source.describe(), status = %summary, "not ready yet");
                Err(backoff::Error::transient(summary))
            }
            Err(e) => {
                tracing::debug!(source = %source.describe(), error = %e, "status unavailable");
                Err(backoff::Error::transient(e.to_string()))
            }
        }
    };

    match backoff::retry(schedule, poll) {
        Ok(object) => {
            tracing::info!(
                source = %source.describe(),
                attempts = *attempts.borrow(),
                "resource ready"
            );
            Ok(object)
        }
        Err(backoff::Error::Permanent(last_message))
        | Err(backoff::Error::Transient {
            err: last_message, ..
        }) => {
            tracing::warn!(source = %source.describe(), last = %last_message, "gave up waiting for readiness");
            Err(Error::NotReady {
                after: policy.timeout,
                last_message,
            })
        }
    }
}
