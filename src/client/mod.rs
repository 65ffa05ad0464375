//! Tracking client - scope-bound run lifecycle over a tracking API
//!
//! A [`RunLifecycle`] creates its experiment (idempotently) and run up front,
//! buffers every `log_*` call locally, and sends exactly one finalizing
//! update when it is consumed by [`RunLifecycle::finish`] or
//! [`RunLifecycle::fail`]. Network traffic is bounded to two round trips
//! (create + finalize) no matter how much is logged; state logged but not yet
//! finalized is lost if the client process dies, an accepted trade-off for a
//! tracking client rather than a durability guarantee.
//!
//! [`track`] is the scoped form: the closure's `Ok`/`Err` outcome picks the
//! terminal status, and finalization happens on both exit paths.
//!
//! ```no_run
//! use bitacora::client::{track, HttpTrackingClient};
//!
//! # fn main() -> bitacora::Result<()> {
//! let api = HttpTrackingClient::new("127.0.0.1:8080")?;
//! track(api, "mnist-baseline", |run| {
//!     run.log_parameter("lr", "0.001");
//!     run.log_metric("accuracy", "0.93");
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

mod api;
mod exporter;
mod http;

pub use api::{ExperimentIn, RunFilePayload, RunFilesIn, RunIn, TrackingApi};
pub use exporter::{ExporterRegistry, ModelExport, ModelExporter};
pub use http::{HttpTrackingClient, DEFAULT_TIMEOUT};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::record::{RunPatch, RunRecord, RunStatus};

/// A client-held, in-progress run.
///
/// Exactly-once finalization is enforced by move semantics: `finish` and
/// `fail` consume the lifecycle, so a finalized instance cannot be reused.
pub struct RunLifecycle<A: TrackingApi> {
    api: A,
    exporters: ExporterRegistry,
    run_id: u64,
    experiment_name: String,
    run_nr: u64,
    creation_time: DateTime<Utc>,
    parameters: BTreeMap<String, String>,
    metrics: BTreeMap<String, String>,
    tags: BTreeMap<String, String>,
    model_definition: Option<serde_json::Value>,
}

impl<A: TrackingApi> RunLifecycle<A> {
    /// Start building a lifecycle for `experiment_name`.
    #[must_use]
    pub fn builder(api: A, experiment_name: impl Into<String>) -> RunLifecycleBuilder<A> {
        RunLifecycleBuilder {
            api,
            experiment_name: experiment_name.into(),
            author: None,
            exporters: ExporterRegistry::new(),
        }
    }

    /// Start a run with defaults: local user as author, no exporters.
    ///
    /// # Errors
    ///
    /// See [`RunLifecycleBuilder::start`].
    pub fn start(api: A, experiment_name: impl Into<String>) -> Result<Self> {
        Self::builder(api, experiment_name).start()
    }

    /// Get the server-assigned run id.
    #[must_use]
    pub const fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Get the server-assigned run number within the experiment.
    #[must_use]
    pub const fn run_nr(&self) -> u64 {
        self.run_nr
    }

    /// Get the experiment name this run belongs to.
    #[must_use]
    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    /// Record a parameter locally. Not sent until finalization.
    pub fn log_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(name.into(), value.into());
    }

    /// Record a metric locally. Not sent until finalization.
    pub fn log_metric(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.metrics.insert(name.into(), value.into());
    }

    /// Record a tag locally. Not sent until finalization.
    pub fn log_tag(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(name.into(), value.into());
    }

    /// Export and record a model through the exporter registered for
    /// `family`, uploading its files to the server.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyLogged`] if a model definition is already recorded
    ///   for this lifecycle.
    /// - [`Error::NotFound`] if no exporter is registered for `family`.
    /// - Exporter and upload failures, unchanged.
    pub fn log_model(&mut self, family: &str, options: &serde_json::Value) -> Result<()> {
        if self.model_definition.is_some() {
            return Err(Error::AlreadyLogged(self.run_id));
        }
        let exporter = self
            .exporters
            .get(family)
            .ok_or_else(|| Error::not_found("model exporter", family))?;
        let export = exporter.export(options)?;
        if !export.files.is_empty() {
            self.api.store_run_files(self.run_id, &export.files)?;
        }
        self.model_definition = Some(export.definition);
        debug!(run_id = self.run_id, family, "logged model");
        Ok(())
    }

    /// Finalize as [`RunStatus::Completed`], sending the accumulated state.
    ///
    /// # Errors
    ///
    /// The finalize update's failure, unchanged. Not retried; the lifecycle
    /// is consumed either way.
    pub fn finish(self) -> Result<RunRecord> {
        self.finalize(false)
    }

    /// Finalize as [`RunStatus::Failed`], sending the accumulated state.
    ///
    /// # Errors
    ///
    /// The finalize update's failure, unchanged.
    pub fn fail(self) -> Result<RunRecord> {
        self.finalize(true)
    }

    fn finalize(self, failed: bool) -> Result<RunRecord> {
        let finish_time = Utc::now();
        let duration_secs =
            (finish_time - self.creation_time).num_milliseconds() as f64 / 1000.0;
        let status = if failed {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        let mut patch = RunPatch::new()
            .status(status)
            .finish_time(finish_time)
            .duration_secs(duration_secs)
            .parameters(self.parameters)
            .metrics(self.metrics)
            .tags(self.tags);
        if let Some(definition) = self.model_definition {
            patch = patch.model_definition(definition);
        }
        debug!(run_id = self.run_id, ?status, "finalizing run");
        self.api.update_run(self.run_id, &patch)
    }
}

impl<A: TrackingApi> std::fmt::Debug for RunLifecycle<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLifecycle")
            .field("run_id", &self.run_id)
            .field("experiment_name", &self.experiment_name)
            .field("run_nr", &self.run_nr)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RunLifecycle`].
#[derive(Debug)]
pub struct RunLifecycleBuilder<A: TrackingApi> {
    api: A,
    experiment_name: String,
    author: Option<String>,
    exporters: ExporterRegistry,
}

impl<A: TrackingApi> RunLifecycleBuilder<A> {
    /// Set the author the run is created as. Defaults to the local user.
    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Register a model exporter for this lifecycle.
    #[must_use]
    pub fn exporter(mut self, exporter: Box<dyn ModelExporter>) -> Self {
        self.exporters.register(exporter);
        self
    }

    /// Start the run: ping the server, resolve the experiment (creating it
    /// if absent), and create the run record.
    ///
    /// # Errors
    ///
    /// [`Error::ServerUnreachable`]/[`Error::RequestTimedOut`] from the
    /// reachability check (fail fast, no retry), plus any creation failure.
    pub fn start(self) -> Result<RunLifecycle<A>> {
        self.api.ping()?;

        let experiment = match self.api.experiment(&self.experiment_name)? {
            Some(existing) => existing,
            None => self.api.create_experiment(&self.experiment_name)?,
        };
        let author = self.author.unwrap_or_else(local_user);
        let run = self.api.create_run(experiment.name(), &author)?;
        debug!(
            experiment = experiment.name(),
            run_id = run.id(),
            run_nr = run.run_nr(),
            author = %author,
            "started run"
        );
        Ok(RunLifecycle {
            api: self.api,
            exporters: self.exporters,
            run_id: run.id(),
            experiment_name: experiment.name().to_string(),
            run_nr: run.run_nr(),
            creation_time: run.creation_time(),
            parameters: BTreeMap::new(),
            metrics: BTreeMap::new(),
            tags: BTreeMap::new(),
            model_definition: None,
        })
    }

    /// Start the run and drive `body` with guaranteed finalization, like
    /// [`track`] but with the builder's author and exporters.
    ///
    /// # Errors
    ///
    /// See [`track`].
    pub fn track<T>(self, body: impl FnOnce(&mut RunLifecycle<A>) -> Result<T>) -> Result<T> {
        let mut lifecycle = self.start()?;
        match body(&mut lifecycle) {
            Ok(value) => {
                lifecycle.finish()?;
                Ok(value)
            }
            Err(body_err) => {
                if let Err(finalize_err) = lifecycle.fail() {
                    warn!(error = %finalize_err, "failed-run finalize did not reach the server");
                }
                Err(body_err)
            }
        }
    }
}

/// Run `body` inside a scoped lifecycle with guaranteed finalization.
///
/// `Ok` from the body finalizes the run as Completed; `Err` finalizes it as
/// Failed and returns the body's error. A secondary failure of the Failed
/// finalize is logged, never allowed to shadow the body's error.
///
/// # Errors
///
/// Lifecycle start failures, the body's error, or (on the success path) the
/// finalize failure.
pub fn track<A, T>(
    api: A,
    experiment_name: &str,
    body: impl FnOnce(&mut RunLifecycle<A>) -> Result<T>,
) -> Result<T>
where
    A: TrackingApi,
{
    RunLifecycle::builder(api, experiment_name).track(body)
}

/// Author fallback: the local username, `"unknown"` if undeterminable.
fn local_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
