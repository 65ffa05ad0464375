//! Round-trip tests: the blocking HTTP client against a minimal routing
//! harness (tiny_http) over a real tracking service.

use std::io::Read;
use std::sync::Arc;
use std::thread;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use tiny_http::{Method, Response, Server};

use bitacora::client::{
    track, ExperimentIn, HttpTrackingClient, ModelExport, ModelExporter, RunFilesIn, RunIn,
    RunLifecycle,
};
use bitacora::{Error, RunFile, RunPatch, RunStatus, TrackingService};

struct Harness {
    service: Arc<TrackingService>,
    server: Arc<Server>,
    handle: Option<thread::JoinHandle<()>>,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let service = Arc::new(TrackingService::open(dir.path()).unwrap());
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());

        let handle = {
            let server = Arc::clone(&server);
            let service = Arc::clone(&service);
            thread::spawn(move || {
                for mut request in server.incoming_requests() {
                    let mut body = String::new();
                    let _ = request.as_reader().read_to_string(&mut body);
                    let (code, payload) =
                        route(&service, request.method(), request.url(), &body);
                    let _ = request.respond(Response::from_string(payload).with_status_code(code));
                }
            })
        };
        Self {
            service,
            server,
            handle: Some(handle),
            _dir: dir,
        }
    }

    fn uri(&self) -> String {
        let port = self.server.server_addr().to_ip().unwrap().port();
        format!("127.0.0.1:{port}")
    }

    fn artifact_root(&self) -> &std::path::Path {
        self._dir.path()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn route(service: &TrackingService, method: &Method, url: &str, body: &str) -> (u16, String) {
    let path: Vec<&str> = url.split('/').filter(|s| !s.is_empty()).collect();
    match (method, path.as_slice()) {
        (Method::Get, []) => (200, "ok".to_string()),
        (Method::Get, ["api", "v1", "experiments", name]) => match service.experiment(name) {
            Some(experiment) => json_ok(&experiment),
            None => (404, "experiment not found".to_string()),
        },
        (Method::Post, ["api", "v1", "experiments"]) => {
            match serde_json::from_str::<ExperimentIn>(body) {
                Ok(input) => reply(service.create_experiment(&input.name)),
                Err(e) => (400, e.to_string()),
            }
        }
        (Method::Post, ["api", "v1", "runs"]) => match serde_json::from_str::<RunIn>(body) {
            Ok(input) => reply(service.create_run(&input.experiment_name, &input.author)),
            Err(e) => (400, e.to_string()),
        },
        (Method::Put, ["api", "v1", "runs", id]) => {
            match (id.parse::<u64>(), serde_json::from_str::<RunPatch>(body)) {
                (Ok(id), Ok(patch)) => reply(service.update_run(id, patch)),
                _ => (400, "bad run update".to_string()),
            }
        }
        (Method::Post, ["api", "v1", "runs", id, "files"]) => {
            match (id.parse::<u64>(), serde_json::from_str::<RunFilesIn>(body)) {
                (Ok(id), Ok(input)) => {
                    let mut files = Vec::new();
                    for payload in input.files {
                        match BASE64.decode(&payload.content_b64) {
                            Ok(bytes) => files.push(RunFile::new(payload.name, bytes)),
                            Err(e) => return (400, e.to_string()),
                        }
                    }
                    reply(service.store_run_files(id, &files))
                }
                _ => (400, "bad file upload".to_string()),
            }
        }
        _ => (404, "no such route".to_string()),
    }
}

fn json_ok<T: Serialize>(value: &T) -> (u16, String) {
    (200, serde_json::to_string(value).unwrap())
}

fn reply<T: Serialize>(result: bitacora::Result<T>) -> (u16, String) {
    match result {
        Ok(value) => json_ok(&value),
        Err(e) => (status_for(&e), e.to_string()),
    }
}

fn status_for(e: &Error) -> u16 {
    match e {
        Error::NotFound { .. } => 404,
        Error::AlreadyExists { .. } | Error::AlreadyLogged(_) | Error::InvalidTransition(_) => 409,
        _ => 500,
    }
}

struct StubExporter;

impl ModelExporter for StubExporter {
    fn family(&self) -> &str {
        "stub"
    }

    fn export(&self, _options: &serde_json::Value) -> bitacora::Result<ModelExport> {
        Ok(ModelExport {
            definition: serde_json::json!({"format": "stub"}),
            files: vec![RunFile::new("model.bin", b"\x01\x02\x03".to_vec())],
        })
    }
}

#[test]
fn completed_run_round_trips_over_http() {
    let harness = Harness::start();
    let client = HttpTrackingClient::new(&harness.uri()).unwrap();

    track(client, "exp1", |run| {
        run.log_parameter("lr", "0.001");
        run.log_metric("accuracy", "0.93");
        Ok(())
    })
    .unwrap();

    let run = harness.service.experiment_run("exp1", 1).unwrap();
    assert_eq!(run.status(), RunStatus::Completed);
    assert_eq!(run.parameters().get("lr").map(String::as_str), Some("0.001"));
    assert!(harness.artifact_root().join("exp1").join("1").is_dir());
}

#[test]
fn failed_run_round_trips_over_http() {
    let harness = Harness::start();
    let client = HttpTrackingClient::new(&harness.uri()).unwrap();

    let err = track(client, "exp1", |run| -> bitacora::Result<()> {
        run.log_tag("note", "diverged");
        Err(Error::Storage("boom".to_string()))
    })
    .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));

    let run = harness.service.experiment_run("exp1", 1).unwrap();
    assert_eq!(run.status(), RunStatus::Failed);
    assert_eq!(run.tags().get("note").map(String::as_str), Some("diverged"));
}

#[test]
fn model_files_upload_over_http() {
    let harness = Harness::start();
    let client = HttpTrackingClient::new(&harness.uri()).unwrap();

    let mut run = RunLifecycle::builder(client, "exp1")
        .exporter(Box::new(StubExporter))
        .start()
        .unwrap();
    run.log_model("stub", &serde_json::json!({})).unwrap();
    let record = run.finish().unwrap();

    assert_eq!(record.model_definition(), Some(&serde_json::json!({"format": "stub"})));
    let uploaded = harness.artifact_root().join("exp1/1/files/model.bin");
    assert_eq!(std::fs::read(uploaded).unwrap(), vec![1, 2, 3]);
}

#[test]
fn finalizing_twice_is_rejected_by_the_server() {
    let harness = Harness::start();
    let client = HttpTrackingClient::new(&harness.uri()).unwrap();

    let run = RunLifecycle::start(client.clone(), "exp1").unwrap();
    let id = run.run_id();
    run.finish().unwrap();

    use bitacora::client::TrackingApi;
    let err = client
        .update_run(id, &RunPatch::new().status(RunStatus::Failed))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition(_)));
}

#[test]
fn second_model_definition_is_already_logged_over_http() {
    let harness = Harness::start();
    let client = HttpTrackingClient::new(&harness.uri()).unwrap();

    let run = RunLifecycle::start(client.clone(), "exp1").unwrap();
    let id = run.run_id();

    use bitacora::client::TrackingApi;
    client
        .update_run(id, &RunPatch::new().model_definition(serde_json::json!({"v": 1})))
        .unwrap();
    let err = client
        .update_run(id, &RunPatch::new().model_definition(serde_json::json!({"v": 2})))
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyLogged(_)), "conflict kind survives the wire");

    run.finish().unwrap();
}

#[test]
fn unreachable_server_fails_fast_at_start() {
    // Nothing listens on the discard port.
    let client = HttpTrackingClient::new("127.0.0.1:9").unwrap();
    let err = RunLifecycle::start(client, "exp1").unwrap_err();
    assert!(matches!(
        err,
        Error::ServerUnreachable(_) | Error::RequestTimedOut(_)
    ));
}
