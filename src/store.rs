//! Metadata store - concurrent record maps with snapshot persistence
//!
//! ## Design
//!
//! Records live in `DashMap`s for lock-free concurrent lookups. The one
//! ordering guarantee the store provides is dense run numbering: for every
//! experiment the assigned `run_nr` values are exactly `{1..k}` with no gaps
//! or duplicates, under arbitrary interleaving. The `DashMap` entry guard on
//! the per-experiment run index is the exclusive critical section for that
//! assignment; unrelated experiments never serialize against each other.
//!
//! ## Durability
//!
//! A store opened with [`MetadataStore::open`] persists a full JSON snapshot
//! after every successful mutation (write temp file, then rename). A store
//! built with [`MetadataStore::new`] is purely in-memory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::{
    ExperimentRecord, MlModelFields, MlModelRecord, MlServiceFields, MlServiceRecord, RunPatch,
    RunRecord,
};

/// Concurrent metadata store for the four record kinds.
#[derive(Debug)]
pub struct MetadataStore {
    experiments: DashMap<String, ExperimentRecord>,
    runs: DashMap<u64, RunRecord>,
    // Run ids per experiment, in run_nr order. The entry guard for one
    // experiment is the critical section for run-number assignment.
    run_index: DashMap<String, Vec<u64>>,
    ml_models: DashMap<String, MlModelRecord>,
    ml_services: DashMap<String, MlServiceRecord>,
    next_run_id: AtomicU64,
    next_service_id: AtomicU64,
    snapshot_path: Option<PathBuf>,
    snapshot_lock: Mutex<()>,
}

impl MetadataStore {
    /// Create an empty in-memory store with no snapshot file.
    #[must_use]
    pub fn new() -> Self {
        Self {
            experiments: DashMap::new(),
            runs: DashMap::new(),
            run_index: DashMap::new(),
            ml_models: DashMap::new(),
            ml_services: DashMap::new(),
            next_run_id: AtomicU64::new(1),
            next_service_id: AtomicU64::new(1),
            snapshot_path: None,
            snapshot_lock: Mutex::new(()),
        }
    }

    /// Open a snapshot-backed store, loading `path` if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Serde`] if an existing snapshot
    /// cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut store = if path.is_file() {
            let bytes = fs::read(&path)?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
            snapshot.into_store()
        } else {
            Self::new()
        };
        store.snapshot_path = Some(path);
        Ok(store)
    }

    // ------------------------------------------------------------------
    // Experiments
    // ------------------------------------------------------------------

    /// Create an experiment, failing if the name is taken.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyExists`] on a name collision; [`Error::Storage`] if
    /// the snapshot cannot be persisted.
    pub fn create_experiment(&self, name: &str) -> Result<ExperimentRecord> {
        let record = match self.experiments.entry(name.to_string()) {
            Entry::Occupied(_) => return Err(Error::already_exists("experiment", name)),
            Entry::Vacant(vacant) => {
                let record = ExperimentRecord::new(name);
                vacant.insert(record.clone());
                record
            }
        };
        self.persist()?;
        Ok(record)
    }

    /// Get or create an experiment by name. Returns the record and whether
    /// this call created it.
    ///
    /// # Errors
    ///
    /// [`Error::Storage`] if the snapshot cannot be persisted.
    pub fn get_or_create_experiment(&self, name: &str) -> Result<(ExperimentRecord, bool)> {
        let (record, created) = match self.experiments.entry(name.to_string()) {
            Entry::Occupied(occupied) => (occupied.get().clone(), false),
            Entry::Vacant(vacant) => {
                let record = ExperimentRecord::new(name);
                vacant.insert(record.clone());
                (record, true)
            }
        };
        if created {
            self.persist()?;
        }
        Ok((record, created))
    }

    /// Get an experiment by name.
    #[must_use]
    pub fn experiment(&self, name: &str) -> Option<ExperimentRecord> {
        self.experiments.get(name).map(|entry| entry.value().clone())
    }

    /// List all experiments, ordered by name.
    #[must_use]
    pub fn experiments(&self) -> Vec<ExperimentRecord> {
        let mut records: Vec<ExperimentRecord> =
            self.experiments.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by(|a, b| a.name().cmp(b.name()));
        records
    }

    // ------------------------------------------------------------------
    // Runs
    // ------------------------------------------------------------------

    /// Create a run under an experiment, assigning the next dense run number.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the experiment does not exist;
    /// [`Error::Storage`] if the snapshot cannot be persisted.
    pub fn create_run(&self, experiment_name: &str, author: &str) -> Result<RunRecord> {
        if !self.experiments.contains_key(experiment_name) {
            return Err(Error::not_found("experiment", experiment_name));
        }
        let record = {
            // Exclusive per-experiment section: the index guard is held
            // across both the run_nr computation and the insertion.
            let mut index = self.run_index.entry(experiment_name.to_string()).or_default();
            let run_nr = index.len() as u64 + 1;
            let id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
            let record = RunRecord::new(id, experiment_name, run_nr, author);
            self.runs.insert(id, record.clone());
            index.push(id);
            record
        };
        self.persist()?;
        Ok(record)
    }

    /// Get a run by id.
    #[must_use]
    pub fn run(&self, id: u64) -> Option<RunRecord> {
        self.runs.get(&id).map(|entry| entry.value().clone())
    }

    /// Get a run by experiment name and run number.
    #[must_use]
    pub fn experiment_run(&self, experiment_name: &str, run_nr: u64) -> Option<RunRecord> {
        let id = {
            let index = self.run_index.get(experiment_name)?;
            *index.get(run_nr.checked_sub(1)? as usize)?
        };
        self.run(id)
    }

    /// List all runs of an experiment in run-number order.
    #[must_use]
    pub fn runs_for_experiment(&self, experiment_name: &str) -> Vec<RunRecord> {
        let ids: Vec<u64> = self
            .run_index
            .get(experiment_name)
            .map(|index| index.value().clone())
            .unwrap_or_default();
        ids.into_iter().filter_map(|id| self.run(id)).collect()
    }

    /// Apply a sparse patch to a run.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown id; [`Error::InvalidTransition`] if
    /// the run is terminal; [`Error::AlreadyLogged`] on a duplicate model
    /// definition; [`Error::Storage`] if the snapshot cannot be persisted.
    pub fn update_run(&self, id: u64, patch: RunPatch) -> Result<RunRecord> {
        let record = {
            let mut entry = self
                .runs
                .get_mut(&id)
                .ok_or_else(|| Error::not_found("run", id.to_string()))?;
            entry.apply_patch(patch)?;
            entry.value().clone()
        };
        self.persist()?;
        Ok(record)
    }

    // ------------------------------------------------------------------
    // ML models and services
    // ------------------------------------------------------------------

    /// Upsert a model by name: merge fields into an existing record or
    /// create a new one.
    ///
    /// # Errors
    ///
    /// [`Error::Storage`] if the snapshot cannot be persisted.
    pub fn upsert_ml_model(&self, name: &str, fields: MlModelFields) -> Result<MlModelRecord> {
        let record = match self.ml_models.entry(name.to_string()) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().merge(fields);
                occupied.get().clone()
            }
            Entry::Vacant(vacant) => {
                let record = MlModelRecord::new(name, fields);
                vacant.insert(record.clone());
                record
            }
        };
        self.persist()?;
        Ok(record)
    }

    /// Get a model by name.
    #[must_use]
    pub fn ml_model(&self, name: &str) -> Option<MlModelRecord> {
        self.ml_models.get(name).map(|entry| entry.value().clone())
    }

    /// List all models, ordered by name.
    #[must_use]
    pub fn ml_models(&self) -> Vec<MlModelRecord> {
        let mut records: Vec<MlModelRecord> =
            self.ml_models.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by(|a, b| a.name().cmp(b.name()));
        records
    }

    /// Get or create a service registration for `(host, port)`.
    ///
    /// # Errors
    ///
    /// [`Error::Storage`] if the snapshot cannot be persisted.
    pub fn get_or_create_ml_service(&self, host: &str, port: u16) -> Result<MlServiceRecord> {
        let key = format!("{host}:{port}");
        let (record, created) = match self.ml_services.entry(key) {
            Entry::Occupied(occupied) => (occupied.get().clone(), false),
            Entry::Vacant(vacant) => {
                let id = self.next_service_id.fetch_add(1, Ordering::Relaxed);
                let record = MlServiceRecord::new(id, host, port);
                vacant.insert(record.clone());
                (record, true)
            }
        };
        if created {
            self.persist()?;
        }
        Ok(record)
    }

    /// Apply a sparse served-model update to a service registration by id.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown id; [`Error::Storage`] if the
    /// snapshot cannot be persisted.
    pub fn update_ml_service(&self, id: u64, fields: MlServiceFields) -> Result<MlServiceRecord> {
        let record = {
            let mut entry = self
                .ml_services
                .iter_mut()
                .find(|entry| entry.value().id() == id)
                .ok_or_else(|| Error::not_found("ml service", id.to_string()))?;
            entry.value_mut().merge(fields);
            entry.value().clone()
        };
        self.persist()?;
        Ok(record)
    }

    /// List all service registrations, ordered by id.
    #[must_use]
    pub fn ml_services(&self) -> Vec<MlServiceRecord> {
        let mut records: Vec<MlServiceRecord> =
            self.ml_services.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by_key(MlServiceRecord::id);
        records
    }

    // ------------------------------------------------------------------
    // Snapshot persistence
    // ------------------------------------------------------------------

    /// Persist the current state to the snapshot file, if one is configured.
    ///
    /// Must not be called while any map guard is held.
    ///
    /// # Errors
    ///
    /// [`Error::Storage`] describing the failed write. The in-memory state is
    /// already committed when this fails.
    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let _guard = self
            .snapshot_lock
            .lock()
            .map_err(|_| Error::Storage("snapshot lock poisoned".to_string()))?;
        let snapshot = Snapshot::of(self);
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| Error::Storage(format!("snapshot encode failed: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)
            .and_then(|()| fs::rename(&tmp, path))
            .map_err(|e| Error::Storage(format!("snapshot write failed at {}: {e}", path.display())))
    }

    /// Get the snapshot path, if this store is file-backed.
    #[must_use]
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialized form of the whole store.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    experiments: Vec<ExperimentRecord>,
    runs: Vec<RunRecord>,
    ml_models: Vec<MlModelRecord>,
    ml_services: Vec<MlServiceRecord>,
}

impl Snapshot {
    fn of(store: &MetadataStore) -> Self {
        let mut runs: Vec<RunRecord> = store.runs.iter().map(|entry| entry.value().clone()).collect();
        runs.sort_by_key(RunRecord::id);
        Self {
            experiments: store.experiments(),
            runs,
            ml_models: store.ml_models(),
            ml_services: store.ml_services(),
        }
    }

    fn into_store(self) -> MetadataStore {
        let store = MetadataStore::new();
        let mut max_run_id = 0;
        let mut max_service_id = 0;
        for experiment in self.experiments {
            store
                .experiments
                .insert(experiment.name().to_string(), experiment);
        }
        // Runs are persisted in id order, which within one experiment is
        // run_nr order, so pushing in sequence rebuilds a dense index.
        for run in self.runs {
            max_run_id = max_run_id.max(run.id());
            store
                .run_index
                .entry(run.experiment_name().to_string())
                .or_default()
                .push(run.id());
            store.runs.insert(run.id(), run);
        }
        for model in self.ml_models {
            store.ml_models.insert(model.name().to_string(), model);
        }
        for service in self.ml_services {
            max_service_id = max_service_id.max(service.id());
            store
                .ml_services
                .insert(format!("{}:{}", service.host(), service.port()), service);
        }
        store.next_run_id.store(max_run_id + 1, Ordering::Relaxed);
        store
            .next_service_id
            .store(max_service_id + 1, Ordering::Relaxed);
        store
    }
}
