//! Tracking API boundary - the contract the client consumes
//!
//! [`TrackingApi`] abstracts the network contract of the tracking server so
//! the run lifecycle works identically against a remote server
//! ([`HttpTrackingClient`](super::HttpTrackingClient)) or an in-process
//! [`TrackingService`] behind an `Arc`.
//!
//! The wire payload types live here so a routing layer and the client share
//! one definition.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::artifact::RunFile;
use crate::error::Result;
use crate::record::{ExperimentRecord, RunPatch, RunRecord};
use crate::tracking::TrackingService;

/// Request body for `POST /api/v1/experiments`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExperimentIn {
    /// Experiment name (unique key).
    pub name: String,
}

/// Request body for `POST /api/v1/runs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunIn {
    /// Parent experiment name.
    pub experiment_name: String,
    /// Author the run is created as.
    pub author: String,
}

/// One file in a `POST /api/v1/runs/{id}/files` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunFilePayload {
    /// File name within the run's model folder.
    pub name: String,
    /// Base64-encoded file content.
    pub content_b64: String,
}

/// Request body for `POST /api/v1/runs/{id}/files`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunFilesIn {
    /// Files to store under the run's model folder.
    pub files: Vec<RunFilePayload>,
}

/// Operations the run lifecycle needs from a tracking server.
pub trait TrackingApi {
    /// Check that the server is reachable. Called once at lifecycle start.
    ///
    /// # Errors
    ///
    /// [`Error::ServerUnreachable`](crate::Error::ServerUnreachable) or
    /// [`Error::RequestTimedOut`](crate::Error::RequestTimedOut).
    fn ping(&self) -> Result<()>;

    /// Look up an experiment by name.
    ///
    /// # Errors
    ///
    /// Connectivity or protocol failures only; an absent experiment is
    /// `Ok(None)`.
    fn experiment(&self, name: &str) -> Result<Option<ExperimentRecord>>;

    /// Create an experiment, idempotent by name.
    ///
    /// # Errors
    ///
    /// Connectivity, protocol, or server-side storage failures.
    fn create_experiment(&self, name: &str) -> Result<ExperimentRecord>;

    /// Create a run; the server assigns `id` and `run_nr`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`](crate::Error::NotFound) if the experiment is
    /// unknown, plus connectivity and protocol failures.
    fn create_run(&self, experiment_name: &str, author: &str) -> Result<RunRecord>;

    /// Apply a sparse patch to a run.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`](crate::Error::NotFound),
    /// [`Error::InvalidTransition`](crate::Error::InvalidTransition), plus
    /// connectivity and protocol failures.
    fn update_run(&self, id: u64, patch: &RunPatch) -> Result<RunRecord>;

    /// Store files under a run's model folder.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`](crate::Error::NotFound) if the run is unknown,
    /// plus connectivity and write failures.
    fn store_run_files(&self, id: u64, files: &[RunFile]) -> Result<()>;
}

/// In-process implementation: the lifecycle drives a local service directly.
///
/// Used by tests and by embedded setups that do not run a server.
impl TrackingApi for Arc<TrackingService> {
    fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn experiment(&self, name: &str) -> Result<Option<ExperimentRecord>> {
        Ok(TrackingService::experiment(self, name))
    }

    fn create_experiment(&self, name: &str) -> Result<ExperimentRecord> {
        TrackingService::create_experiment(self, name)
    }

    fn create_run(&self, experiment_name: &str, author: &str) -> Result<RunRecord> {
        TrackingService::create_run(self, experiment_name, author)
    }

    fn update_run(&self, id: u64, patch: &RunPatch) -> Result<RunRecord> {
        TrackingService::update_run(self, id, patch.clone())
    }

    fn store_run_files(&self, id: u64, files: &[RunFile]) -> Result<()> {
        TrackingService::store_run_files(self, id, files)
    }
}
