//! # Bitacora: Embedded ML Experiment Tracking
//!
//! Bitacora records per-run metadata (parameters, metrics, tags, status,
//! timing) in a concurrent, snapshot-backed store while mirroring model
//! artifacts to a filesystem hierarchy keyed by experiment and run, and
//! ships a buffering client that drives one run over the tracking API with
//! guaranteed finalization.
//!
//! ## Design Principles
//!
//! - **Dense run numbering**: per-experiment run numbers are `{1..k}` with no
//!   gaps or duplicates, under arbitrary concurrent creation; unrelated
//!   experiments never serialize against each other.
//! - **Paired stores**: a run record exists iff its run directory exists; a
//!   divergence surfaces as an explicit `PartialFailure`, never silently.
//! - **Exactly-once finalization**: finishing a run consumes the lifecycle
//!   object, so the type system rules out a second finalize.
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use bitacora::client::track;
//! use bitacora::TrackingService;
//!
//! # fn main() -> bitacora::Result<()> {
//! # let dir = std::env::temp_dir().join("bitacora-doc");
//! let service = Arc::new(TrackingService::open(&dir)?);
//!
//! track(Arc::clone(&service), "mnist-baseline", |run| {
//!     run.log_parameter("lr", "0.001");
//!     run.log_metric("accuracy", "0.93");
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod artifact;
pub mod client;
pub mod error;
pub mod record;
pub mod store;
pub mod tracking;

pub use artifact::{ArtifactLayout, RunFile, DEFAULT_MODEL_FOLDER};
pub use client::{RunLifecycle, TrackingApi};
pub use error::{Error, Result};
pub use record::{
    ExperimentRecord, MlModelFields, MlModelRecord, MlServiceFields, MlServiceRecord, RunPatch,
    RunRecord, RunStatus,
};
pub use store::MetadataStore;
pub use tracking::{TrackingService, METADATA_FILE};
