//! Run Record - one execution under an experiment, plus its sparse patch

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run was created and has not been finalized.
    Running,
    /// Run finalized without an error.
    Completed,
    /// Run finalized while unwinding from an error.
    Failed,
}

impl RunStatus {
    /// Whether this status is terminal. Terminal runs reject all mutation.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Run Record represents a single execution of an experiment.
///
/// The store assigns `id` (surrogate key) and `run_nr` (dense, 1-based within
/// the experiment). A run is created in [`RunStatus::Running`] and reaches a
/// terminal status through exactly one finalizing patch; afterwards every
/// mutation attempt fails with [`Error::InvalidTransition`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    id: u64,
    experiment_name: String,
    run_nr: u64,
    author: String,
    status: RunStatus,
    creation_time: DateTime<Utc>,
    finish_time: Option<DateTime<Utc>>,
    duration_secs: Option<f64>,
    parameters: BTreeMap<String, String>,
    metrics: BTreeMap<String, String>,
    tags: BTreeMap<String, String>,
    model_definition: Option<serde_json::Value>,
}

impl RunRecord {
    /// Create a new run record in Running status with the current timestamp.
    ///
    /// Called by the store only; `id` and `run_nr` are store-assigned.
    #[must_use]
    pub fn new(
        id: u64,
        experiment_name: impl Into<String>,
        run_nr: u64,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id,
            experiment_name: experiment_name.into(),
            run_nr,
            author: author.into(),
            status: RunStatus::Running,
            creation_time: Utc::now(),
            finish_time: None,
            duration_secs: None,
            parameters: BTreeMap::new(),
            metrics: BTreeMap::new(),
            tags: BTreeMap::new(),
            model_definition: None,
        }
    }

    /// Get the store-assigned run id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Get the parent experiment name.
    #[must_use]
    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    /// Get the run number (dense, 1-based within the experiment).
    #[must_use]
    pub const fn run_nr(&self) -> u64 {
        self.run_nr
    }

    /// Get the author the run was created with.
    #[must_use]
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    /// Get the finish timestamp, if the run has been finalized.
    #[must_use]
    pub const fn finish_time(&self) -> Option<DateTime<Utc>> {
        self.finish_time
    }

    /// Get the wall-clock duration in seconds, if finalized.
    #[must_use]
    pub const fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }

    /// Get the logged parameters.
    #[must_use]
    pub const fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Get the logged metrics.
    #[must_use]
    pub const fn metrics(&self) -> &BTreeMap<String, String> {
        &self.metrics
    }

    /// Get the logged tags.
    #[must_use]
    pub const fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Get the opaque model definition, if one was logged.
    #[must_use]
    pub const fn model_definition(&self) -> Option<&serde_json::Value> {
        self.model_definition.as_ref()
    }

    /// Apply a sparse patch to this run.
    ///
    /// Only fields present in the patch are touched; a present map field
    /// replaces that whole map.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] if the run already reached a terminal
    ///   status.
    /// - [`Error::AlreadyLogged`] if the patch carries a model definition and
    ///   one is already recorded.
    pub fn apply_patch(&mut self, patch: RunPatch) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::InvalidTransition(format!(
                "run {} is already {:?}",
                self.id, self.status
            )));
        }
        if let Some(definition) = patch.model_definition {
            if self.model_definition.is_some() {
                return Err(Error::AlreadyLogged(self.id));
            }
            self.model_definition = Some(definition);
        }
        if let Some(parameters) = patch.parameters {
            self.parameters = parameters;
        }
        if let Some(metrics) = patch.metrics {
            self.metrics = metrics;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(finish_time) = patch.finish_time {
            self.finish_time = Some(finish_time);
        }
        if let Some(duration_secs) = patch.duration_secs {
            self.duration_secs = Some(duration_secs);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        Ok(())
    }
}

/// Sparse update for a run: only fields explicitly set are applied.
///
/// This is both the store-boundary and the wire representation of a run
/// update; absent fields are omitted from the serialized form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    finish_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parameters: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metrics: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tags: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_definition: Option<serde_json::Value>,
}

impl RunPatch {
    /// Create an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target status.
    #[must_use]
    pub const fn status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the finish timestamp.
    #[must_use]
    pub const fn finish_time(mut self, finish_time: DateTime<Utc>) -> Self {
        self.finish_time = Some(finish_time);
        self
    }

    /// Set the duration in seconds.
    #[must_use]
    pub const fn duration_secs(mut self, duration_secs: f64) -> Self {
        self.duration_secs = Some(duration_secs);
        self
    }

    /// Replace the parameter map.
    #[must_use]
    pub fn parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Replace the metric map.
    #[must_use]
    pub fn metrics(mut self, metrics: BTreeMap<String, String>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replace the tag map.
    #[must_use]
    pub fn tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Set the model definition (set-once, enforced on apply).
    #[must_use]
    pub fn model_definition(mut self, definition: serde_json::Value) -> Self {
        self.model_definition = Some(definition);
        self
    }

    /// Whether the patch carries no fields at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.finish_time.is_none()
            && self.duration_secs.is_none()
            && self.parameters.is_none()
            && self.metrics.is_none()
            && self.tags.is_none()
            && self.model_definition.is_none()
    }
}
