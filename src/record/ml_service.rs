//! ML Service Record - a serving endpoint, identified by host and port

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ML Service Record represents a model-serving endpoint.
///
/// Identity is the `(host, port)` pair; registration is get-or-create. The
/// served-model fields are mutable through [`MlServiceRecord::merge`], which
/// a service uses to report which model it currently serves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MlServiceRecord {
    id: u64,
    host: String,
    port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_version: Option<String>,
    creation_time: DateTime<Utc>,
}

impl MlServiceRecord {
    /// Create a new service record with the current timestamp.
    #[must_use]
    pub fn new(id: u64, host: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            port,
            model_name: None,
            model_version: None,
            creation_time: Utc::now(),
        }
    }

    /// Get the store-assigned service id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Get the service host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get the service port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Get the name of the model this service reports serving, if any.
    #[must_use]
    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    /// Get the version of the served model, if reported.
    #[must_use]
    pub fn model_version(&self) -> Option<&str> {
        self.model_version.as_deref()
    }

    /// Get the registration timestamp.
    #[must_use]
    pub const fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    /// Merge update fields into this record; provided fields overwrite.
    pub fn merge(&mut self, fields: MlServiceFields) {
        if let Some(model_name) = fields.model_name {
            self.model_name = Some(model_name);
        }
        if let Some(model_version) = fields.model_version {
            self.model_version = Some(model_version);
        }
    }
}

/// Fields carried by a service update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MlServiceFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_version: Option<String>,
}

impl MlServiceFields {
    /// Create an empty field set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the served model name.
    #[must_use]
    pub fn model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    /// Set the served model version.
    #[must_use]
    pub fn model_version(mut self, model_version: impl Into<String>) -> Self {
        self.model_version = Some(model_version.into());
        self
    }
}
