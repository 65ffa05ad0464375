//! Tracking service - keeps metadata and artifact layout consistent
//!
//! The service is the only component that knows both the [`MetadataStore`]
//! and the [`ArtifactLayout`]. Every metadata mutation that implies a new
//! on-disk location is paired with that location's creation here.
//!
//! ## Partial-failure policy
//!
//! There is no automatic rollback. If the artifact half of an operation fails
//! after the metadata half committed, the operation returns
//! [`Error::PartialFailure`](crate::Error::PartialFailure) naming what exists
//! and what is missing. Both creation operations are idempotent on the
//! metadata side, so re-issuing the call re-attempts the directory creation.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::artifact::{ArtifactLayout, RunFile, DEFAULT_MODEL_FOLDER};
use crate::error::{Error, Result};
use crate::record::{
    ExperimentRecord, MlModelFields, MlModelRecord, MlServiceFields, MlServiceRecord, RunPatch,
    RunRecord,
};
use crate::store::MetadataStore;

/// Snapshot file name under the artifact root.
pub const METADATA_FILE: &str = "bitacora.json";

/// Coordinates the metadata store and the artifact layout.
///
/// The service takes `&self` everywhere and is `Send + Sync`; share one
/// instance across request handlers via `Arc` (explicit construction, no
/// process-wide singleton).
#[derive(Debug)]
pub struct TrackingService {
    store: MetadataStore,
    layout: ArtifactLayout,
}

impl TrackingService {
    /// Open a service rooted at `artifact_root`.
    ///
    /// Creates the root directory if missing and loads the metadata snapshot
    /// (`bitacora.json`) if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`]/[`Error::Serde`] if the root cannot be created
    /// or an existing snapshot cannot be read.
    pub fn open(artifact_root: impl Into<PathBuf>) -> Result<Self> {
        let root = artifact_root.into();
        fs::create_dir_all(&root)?;
        let store = MetadataStore::open(root.join(METADATA_FILE))?;
        info!(root = %root.display(), "tracking service opened");
        Ok(Self {
            store,
            layout: ArtifactLayout::new(root),
        })
    }

    /// Build a service from parts. Useful for in-memory stores in tests.
    #[must_use]
    pub const fn new(store: MetadataStore, layout: ArtifactLayout) -> Self {
        Self { store, layout }
    }

    /// Get the artifact layout.
    #[must_use]
    pub const fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    // ------------------------------------------------------------------
    // Experiments
    // ------------------------------------------------------------------

    /// Get or create an experiment by name and ensure its directory exists.
    ///
    /// Idempotent: a repeated call for an existing name returns the existing
    /// record and leaves the directory untouched.
    ///
    /// # Errors
    ///
    /// [`Error::PartialFailure`] if the record committed but the directory
    /// could not be created.
    pub fn create_experiment(&self, name: &str) -> Result<ExperimentRecord> {
        // Validate the name as a path segment before any metadata commit.
        self.layout.experiment_dir(name)?;
        let (record, created) = self.store.get_or_create_experiment(name)?;
        let dir = self.ensure_experiment_dir(name)?;
        if created {
            info!(experiment = name, dir = %dir.display(), "created experiment");
        }
        Ok(record)
    }

    /// Get an experiment by name.
    #[must_use]
    pub fn experiment(&self, name: &str) -> Option<ExperimentRecord> {
        self.store.experiment(name)
    }

    /// List all experiments.
    #[must_use]
    pub fn experiments(&self) -> Vec<ExperimentRecord> {
        self.store.experiments()
    }

    // ------------------------------------------------------------------
    // Runs
    // ------------------------------------------------------------------

    /// Create a run under an experiment and ensure its directory exists.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the experiment does not exist;
    /// [`Error::PartialFailure`] if the record committed but the run
    /// directory could not be created.
    pub fn create_run(&self, experiment_name: &str, author: &str) -> Result<RunRecord> {
        let record = self.store.create_run(experiment_name, author)?;
        let dir = self
            .layout
            .run_dir(experiment_name, record.run_nr())
            .and_then(|dir| self.layout.ensure_dir(&dir).map(|()| dir))
            .map_err(|e| {
                Error::partial(
                    format!(
                        "run {}/{} recorded but its directory was not created",
                        experiment_name,
                        record.run_nr()
                    ),
                    e,
                )
            })?;
        info!(
            experiment = experiment_name,
            run_nr = record.run_nr(),
            run_id = record.id(),
            author,
            dir = %dir.display(),
            "created run"
        );
        Ok(record)
    }

    /// Get a run by id.
    #[must_use]
    pub fn run(&self, id: u64) -> Option<RunRecord> {
        self.store.run(id)
    }

    /// Get a run by experiment name and run number.
    #[must_use]
    pub fn experiment_run(&self, experiment_name: &str, run_nr: u64) -> Option<RunRecord> {
        self.store.experiment_run(experiment_name, run_nr)
    }

    /// List all runs of an experiment.
    #[must_use]
    pub fn runs_for_experiment(&self, experiment_name: &str) -> Vec<RunRecord> {
        self.store.runs_for_experiment(experiment_name)
    }

    /// Apply a sparse patch to a run. Pure metadata, no filesystem effect.
    ///
    /// # Errors
    ///
    /// Propagates the store contract: [`Error::NotFound`],
    /// [`Error::InvalidTransition`], [`Error::AlreadyLogged`].
    pub fn update_run(&self, id: u64, patch: RunPatch) -> Result<RunRecord> {
        let record = self.store.update_run(id, patch)?;
        debug!(run_id = id, status = ?record.status(), "updated run");
        Ok(record)
    }

    /// Store files under a run's model folder.
    ///
    /// Every write creates parent directories first, then writes, overwriting
    /// existing content.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the run id does not resolve; [`Error::Io`] or
    /// [`Error::Storage`] from the individual writes.
    pub fn store_run_files(&self, run_id: u64, files: &[RunFile]) -> Result<()> {
        let run = self
            .store
            .run(run_id)
            .ok_or_else(|| Error::not_found("run", run_id.to_string()))?;
        for file in files {
            let path = self.layout.run_file(
                run.experiment_name(),
                run.run_nr(),
                DEFAULT_MODEL_FOLDER,
                &file.name,
            )?;
            self.layout.write_file(&path, &file.bytes)?;
            debug!(run_id, file = file.name.as_str(), bytes = file.bytes.len(), "stored run file");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Models and services (pass-through, no filesystem effect)
    // ------------------------------------------------------------------

    /// Upsert a model descriptor by name.
    ///
    /// # Errors
    ///
    /// Propagates store persistence failures.
    pub fn upsert_ml_model(&self, name: &str, fields: MlModelFields) -> Result<MlModelRecord> {
        self.store.upsert_ml_model(name, fields)
    }

    /// Get a model by name.
    #[must_use]
    pub fn ml_model(&self, name: &str) -> Option<MlModelRecord> {
        self.store.ml_model(name)
    }

    /// List all models.
    #[must_use]
    pub fn ml_models(&self) -> Vec<MlModelRecord> {
        self.store.ml_models()
    }

    /// Get or create a service registration for `(host, port)`.
    ///
    /// # Errors
    ///
    /// Propagates store persistence failures.
    pub fn register_ml_service(&self, host: &str, port: u16) -> Result<MlServiceRecord> {
        self.store.get_or_create_ml_service(host, port)
    }

    /// Apply a sparse served-model update to a service registration.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown id; persistence failures otherwise.
    pub fn update_ml_service(&self, id: u64, fields: MlServiceFields) -> Result<MlServiceRecord> {
        let record = self.store.update_ml_service(id, fields)?;
        debug!(service_id = id, "updated ml service");
        Ok(record)
    }

    /// List all service registrations.
    #[must_use]
    pub fn ml_services(&self) -> Vec<MlServiceRecord> {
        self.store.ml_services()
    }

    fn ensure_experiment_dir(&self, name: &str) -> Result<PathBuf> {
        self.layout
            .experiment_dir(name)
            .and_then(|dir| self.layout.ensure_dir(&dir).map(|()| dir))
            .map_err(|e| {
                Error::partial(
                    format!("experiment {name} recorded but its directory was not created"),
                    e,
                )
            })
    }
}
