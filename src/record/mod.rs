//! Value records for the tracking schema
//!
//! ```text
//! ExperimentRecord (1) ──< RunRecord (N)
//!
//! MlModelRecord  (upsert by name)
//! MlServiceRecord (get-or-create by host:port)
//! ```
//!
//! Records are immutable values with accessors; the only sanctioned mutation
//! path is [`RunRecord::apply_patch`], which enforces the terminal-status and
//! set-once-model rules. Mapping between storage and records is the record
//! constructor itself; there is no ORM layer.

mod experiment;
mod ml_model;
mod ml_service;
mod run;

pub use experiment::ExperimentRecord;
pub use ml_model::{MlModelFields, MlModelRecord};
pub use ml_service::{MlServiceFields, MlServiceRecord};
pub use run::{RunPatch, RunRecord, RunStatus};
