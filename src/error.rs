//! Error types for bitacora
//!
//! One taxonomy for both halves of the crate: store/service failures on the
//! server side, connectivity and protocol failures on the client side.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Bitacora error types
#[derive(Error, Debug)]
pub enum Error {
    /// A referenced entity (experiment, run, model, exporter) does not exist
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of entity that was looked up
        entity: &'static str,
        /// Key the lookup used
        key: String,
    },

    /// Strict creation collided with an existing record
    #[error("{entity} already exists: {key}")]
    AlreadyExists {
        /// Kind of entity that was created
        entity: &'static str,
        /// Natural key of the colliding record
        key: String,
    },

    /// A model definition was already recorded for this run
    #[error("a model was already logged for run {0}")]
    AlreadyLogged(u64),

    /// Attempt to mutate a run that already reached a terminal status
    #[error("invalid run transition: {0}")]
    InvalidTransition(String),

    /// Metadata committed but the paired artifact operation failed.
    ///
    /// The metadata record exists; its artifact space does not. Repair is
    /// out-of-band: re-issuing the idempotent operation re-attempts the
    /// directory creation.
    #[error("metadata committed but artifact operation failed: {context}")]
    PartialFailure {
        /// What exists and what is missing
        context: String,
        /// Underlying artifact failure
        #[source]
        source: Box<Error>,
    },

    /// The tracking server could not be reached
    #[error("tracking server unreachable: {0}")]
    ServerUnreachable(String),

    /// A network call exceeded the configured timeout
    #[error("request timed out: {0}")]
    RequestTimedOut(String),

    /// The remote side returned a malformed or unexpected response
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Snapshot persistence or path mapping failure
    #[error("storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    #[must_use]
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Shorthand for [`Error::AlreadyExists`].
    #[must_use]
    pub fn already_exists(entity: &'static str, key: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            key: key.into(),
        }
    }

    /// Wrap an artifact-side failure that happened after the metadata commit.
    #[must_use]
    pub fn partial(context: impl Into<String>, source: Self) -> Self {
        Self::PartialFailure {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
