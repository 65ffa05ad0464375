//! Blocking HTTP client for the tracking server
//!
//! Network calls are blocking and carry a configurable timeout; a connection
//! failure surfaces as `ServerUnreachable`, an elapsed timeout as
//! `RequestTimedOut`. There are no retries.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;

use super::api::{ExperimentIn, RunFilePayload, RunFilesIn, RunIn, TrackingApi};
use crate::artifact::RunFile;
use crate::error::{Error, Result};
use crate::record::{ExperimentRecord, RunPatch, RunRecord};

/// Default timeout applied to every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const EXPERIMENTS_ENDPOINT: &str = "/api/v1/experiments";
const RUNS_ENDPOINT: &str = "/api/v1/runs";

/// Blocking client for the tracking server's HTTP contract.
#[derive(Debug, Clone)]
pub struct HttpTrackingClient {
    base_url: String,
    http: Client,
}

impl HttpTrackingClient {
    /// Create a client with the default timeout.
    ///
    /// A `server_uri` without a scheme is coerced to `http://`.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] if the underlying HTTP client cannot be built.
    pub fn new(server_uri: &str) -> Result<Self> {
        Self::with_timeout(server_uri, DEFAULT_TIMEOUT)
    }

    /// Create a client with an explicit per-request timeout.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] if the underlying HTTP client cannot be built.
    pub fn with_timeout(server_uri: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Protocol(format!("failed to build http client: {e}")))?;
        Ok(Self {
            base_url: coerce_url(server_uri),
            http,
        })
    }

    /// Get the coerced base url.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
        response
            .json::<T>()
            .map_err(|e| Error::Protocol(format!("malformed server response: {e}")))
    }
}

impl TrackingApi for HttpTrackingClient {
    fn ping(&self) -> Result<()> {
        // Any response at all counts as reachable.
        self.http
            .get(&self.base_url)
            .send()
            .map_err(map_transport)?;
        Ok(())
    }

    fn experiment(&self, name: &str) -> Result<Option<ExperimentRecord>> {
        let response = self
            .http
            .get(self.url(&format!("{EXPERIMENTS_ENDPOINT}/{name}")))
            .send()
            .map_err(map_transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response, "experiment", name, |body| {
            Error::Protocol(format!("conflict fetching experiment {name}: {body}"))
        })?;
        Ok(Some(Self::decode(response)?))
    }

    fn create_experiment(&self, name: &str) -> Result<ExperimentRecord> {
        let response = self
            .http
            .post(self.url(EXPERIMENTS_ENDPOINT))
            .json(&ExperimentIn {
                name: name.to_string(),
            })
            .send()
            .map_err(map_transport)?;
        let response = ensure_success(response, "experiment", name, |_| {
            Error::already_exists("experiment", name)
        })?;
        Self::decode(response)
    }

    fn create_run(&self, experiment_name: &str, author: &str) -> Result<RunRecord> {
        let response = self
            .http
            .post(self.url(RUNS_ENDPOINT))
            .json(&RunIn {
                experiment_name: experiment_name.to_string(),
                author: author.to_string(),
            })
            .send()
            .map_err(map_transport)?;
        let response = ensure_success(response, "experiment", experiment_name, |body| {
            Error::Protocol(format!("conflict creating run under {experiment_name}: {body}"))
        })?;
        Self::decode(response)
    }

    fn update_run(&self, id: u64, patch: &RunPatch) -> Result<RunRecord> {
        let response = self
            .http
            .put(self.url(&format!("{RUNS_ENDPOINT}/{id}")))
            .json(patch)
            .send()
            .map_err(map_transport)?;
        let response = ensure_success(response, "run", &id.to_string(), |body| {
            run_update_conflict(id, body)
        })?;
        Self::decode(response)
    }

    fn store_run_files(&self, id: u64, files: &[RunFile]) -> Result<()> {
        let body = RunFilesIn {
            files: files
                .iter()
                .map(|file| RunFilePayload {
                    name: file.name.clone(),
                    content_b64: BASE64.encode(&file.bytes),
                })
                .collect(),
        };
        let response = self
            .http
            .post(self.url(&format!("{RUNS_ENDPOINT}/{id}/files")))
            .json(&body)
            .send()
            .map_err(map_transport)?;
        ensure_success(response, "run", &id.to_string(), |text| {
            Error::Protocol(format!("conflict storing files for run {id}: {text}"))
        })?;
        Ok(())
    }
}

/// Map a reqwest transport error into the crate taxonomy.
fn map_transport(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::RequestTimedOut(e.to_string())
    } else if e.is_connect() {
        Error::ServerUnreachable(e.to_string())
    } else {
        Error::Protocol(e.to_string())
    }
}

/// Map a non-success status into the crate taxonomy, reading the response
/// body for the error detail. Each operation supplies its own mapping for a
/// 409, since a conflict means something different per endpoint.
fn ensure_success(
    response: Response,
    entity: &'static str,
    key: &str,
    on_conflict: impl FnOnce(String) -> Error,
) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => Error::not_found(entity, key),
        StatusCode::CONFLICT => on_conflict(body),
        _ => Error::Protocol(format!(
            "unexpected status {status} for {entity} {key}: {body}"
        )),
    })
}

/// A 409 on a run update is either the set-once model rule or a terminal
/// run; the server states which in the response body.
fn run_update_conflict(id: u64, body: String) -> Error {
    if body.contains("already logged") {
        Error::AlreadyLogged(id)
    } else if body.is_empty() {
        Error::InvalidTransition(format!("run {id}: rejected by server"))
    } else {
        Error::InvalidTransition(body)
    }
}

/// Prefix `http://` onto scheme-less uris and strip a trailing slash.
fn coerce_url(server_uri: &str) -> String {
    let uri = if server_uri.starts_with("http://") || server_uri.starts_with("https://") {
        server_uri.to_string()
    } else {
        format!("http://{server_uri}")
    };
    uri.trim_end_matches('/').to_string()
}
