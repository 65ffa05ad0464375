//! ML Model Record - registered model, upserted by name

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ML Model Record represents a registered model descriptor.
///
/// Models are keyed by name and upserted: an update for an existing name
/// merges the provided fields, a new name creates the record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MlModelRecord {
    name: String,
    family: Option<String>,
    run_id: Option<u64>,
    definition: Option<serde_json::Value>,
    creation_time: DateTime<Utc>,
    update_time: DateTime<Utc>,
}

impl MlModelRecord {
    /// Create a new model record from upsert fields.
    #[must_use]
    pub fn new(name: impl Into<String>, fields: MlModelFields) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            family: fields.family,
            run_id: fields.run_id,
            definition: fields.definition,
            creation_time: now,
            update_time: now,
        }
    }

    /// Get the model name (unique key).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the model family tag (e.g. `"tensorflow"`), if set.
    #[must_use]
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    /// Get the id of the run this model descriptor came from, if set.
    #[must_use]
    pub const fn run_id(&self) -> Option<u64> {
        self.run_id
    }

    /// Get the opaque model definition, if set.
    #[must_use]
    pub const fn definition(&self) -> Option<&serde_json::Value> {
        self.definition.as_ref()
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    /// Get the last-update timestamp.
    #[must_use]
    pub const fn update_time(&self) -> DateTime<Utc> {
        self.update_time
    }

    /// Merge upsert fields into this record; provided fields overwrite.
    pub fn merge(&mut self, fields: MlModelFields) {
        if let Some(family) = fields.family {
            self.family = Some(family);
        }
        if let Some(run_id) = fields.run_id {
            self.run_id = Some(run_id);
        }
        if let Some(definition) = fields.definition {
            self.definition = Some(definition);
        }
        self.update_time = Utc::now();
    }
}

/// Fields carried by a model upsert; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MlModelFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    run_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    definition: Option<serde_json::Value>,
}

impl MlModelFields {
    /// Create an empty field set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model family tag.
    #[must_use]
    pub fn family(mut self, family: impl Into<String>) -> Self {
        self.family = Some(family.into());
        self
    }

    /// Set the originating run id.
    #[must_use]
    pub const fn run_id(mut self, run_id: u64) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Set the opaque model definition.
    #[must_use]
    pub fn definition(mut self, definition: serde_json::Value) -> Self {
        self.definition = Some(definition);
        self
    }
}
