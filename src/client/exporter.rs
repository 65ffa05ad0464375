//! Model exporters - pluggable per-family model serialization
//!
//! Logging a model delegates to the exporter registered for the model's
//! family tag. Adding support for a new family is a registration against
//! [`ExporterRegistry`], not a branch in the lifecycle.

use std::collections::HashMap;

use crate::artifact::RunFile;
use crate::error::Result;

/// Output of a model export: an opaque definition for the run record plus
/// the files to upload into the run's model folder.
#[derive(Debug, Clone)]
pub struct ModelExport {
    /// Opaque model descriptor recorded as the run's `model_definition`.
    pub definition: serde_json::Value,
    /// Files destined for the run's model folder.
    pub files: Vec<RunFile>,
}

/// A model-family-specific exporter.
///
/// Implementations serialize one model family (e.g. `"tensorflow"`) into a
/// definition document and a set of artifact files.
pub trait ModelExporter: Send + Sync {
    /// Family tag this exporter handles.
    fn family(&self) -> &str;

    /// Export a model given family-specific options.
    ///
    /// # Errors
    ///
    /// Implementation-defined; surfaced unchanged to the `log_model` caller.
    fn export(&self, options: &serde_json::Value) -> Result<ModelExport>;
}

/// Registry mapping family tags to exporters, resolved once at startup.
#[derive(Default)]
pub struct ExporterRegistry {
    exporters: HashMap<String, Box<dyn ModelExporter>>,
}

impl ExporterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an exporter under its family tag, replacing any previous
    /// registration for that tag.
    pub fn register(&mut self, exporter: Box<dyn ModelExporter>) {
        self.exporters
            .insert(exporter.family().to_string(), exporter);
    }

    /// Resolve the exporter for a family tag.
    #[must_use]
    pub fn get(&self, family: &str) -> Option<&dyn ModelExporter> {
        self.exporters.get(family).map(Box::as_ref)
    }

    /// List the registered family tags, sorted.
    #[must_use]
    pub fn families(&self) -> Vec<&str> {
        let mut families: Vec<&str> = self.exporters.keys().map(String::as_str).collect();
        families.sort_unstable();
        families
    }
}

impl std::fmt::Debug for ExporterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExporterRegistry")
            .field("families", &self.families())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullExporter;

    impl ModelExporter for NullExporter {
        fn family(&self) -> &str {
            "null"
        }

        fn export(&self, _options: &serde_json::Value) -> Result<ModelExport> {
            Ok(ModelExport {
                definition: serde_json::json!({"family": "null"}),
                files: vec![],
            })
        }
    }

    #[test]
    fn test_registry_resolution() {
        let mut registry = ExporterRegistry::new();
        registry.register(Box::new(NullExporter));

        assert!(registry.get("null").is_some());
        assert!(registry.get("tensorflow").is_none());
        assert_eq!(registry.families(), vec!["null"]);
    }
}
