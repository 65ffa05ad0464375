//! Tracking service tests: metadata/artifact pairing and file storage.

use bitacora::{Error, TrackingService, METADATA_FILE, RunFile};

#[test]
fn experiment_creation_is_idempotent_and_paired() {
    let dir = tempfile::tempdir().unwrap();
    let service = TrackingService::open(dir.path()).unwrap();

    let first = service.create_experiment("exp1").unwrap();
    let second = service.create_experiment("exp1").unwrap();

    assert_eq!(first, second);
    assert_eq!(service.experiments().len(), 1);
    assert!(dir.path().join("exp1").is_dir());
}

#[test]
fn run_creation_pairs_record_with_directory() {
    let dir = tempfile::tempdir().unwrap();
    let service = TrackingService::open(dir.path()).unwrap();
    service.create_experiment("exp1").unwrap();

    service.create_run("exp1", "alice").unwrap();
    service.create_run("exp1", "alice").unwrap();
    let third = service.create_run("exp1", "alice").unwrap();

    assert_eq!(third.run_nr(), 3);
    assert!(dir.path().join("exp1").join("3").is_dir());
}

#[test]
fn run_creation_under_unknown_experiment_fails() {
    let dir = tempfile::tempdir().unwrap();
    let service = TrackingService::open(dir.path()).unwrap();
    let err = service.create_run("missing", "alice").unwrap_err();
    assert!(matches!(err, Error::NotFound { entity: "experiment", .. }));
}

#[test]
fn stored_files_land_in_the_model_folder() {
    let dir = tempfile::tempdir().unwrap();
    let service = TrackingService::open(dir.path()).unwrap();
    service.create_experiment("exp1").unwrap();
    service.create_run("exp1", "alice").unwrap();
    service.create_run("exp1", "alice").unwrap();
    let run = service.create_run("exp1", "alice").unwrap();

    service
        .store_run_files(
            run.id(),
            &[
                RunFile::new("model.bin", b"\x00\x01weights".to_vec()),
                RunFile::new("meta.json", b"{}".to_vec()),
            ],
        )
        .unwrap();

    let model = dir.path().join("exp1").join("3").join("files").join("model.bin");
    assert_eq!(std::fs::read(model).unwrap(), b"\x00\x01weights");
    assert!(dir.path().join("exp1/3/files/meta.json").is_file());
}

#[test]
fn storing_files_for_unknown_run_fails() {
    let dir = tempfile::tempdir().unwrap();
    let service = TrackingService::open(dir.path()).unwrap();
    let err = service
        .store_run_files(42, &[RunFile::new("model.bin", b"x".to_vec())])
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { entity: "run", .. }));
}

#[test]
fn experiment_directory_failure_surfaces_as_partial_failure() {
    let dir = tempfile::tempdir().unwrap();
    let service = TrackingService::open(dir.path()).unwrap();
    // A file squatting on the experiment's directory path makes the
    // artifact half fail after the metadata half committed.
    std::fs::write(dir.path().join("exp1"), b"squatter").unwrap();

    let err = service.create_experiment("exp1").unwrap_err();
    assert!(matches!(err, Error::PartialFailure { .. }));
    assert!(service.experiment("exp1").is_some(), "record survives");

    // Re-issuing the idempotent call re-attempts only the directory half.
    std::fs::remove_file(dir.path().join("exp1")).unwrap();
    let record = service.create_experiment("exp1").unwrap();
    assert_eq!(record.name(), "exp1");
    assert!(dir.path().join("exp1").is_dir());
}

#[test]
fn run_directory_failure_surfaces_as_partial_failure() {
    let dir = tempfile::tempdir().unwrap();
    let service = TrackingService::open(dir.path()).unwrap();
    service.create_experiment("exp1").unwrap();
    std::fs::write(dir.path().join("exp1").join("1"), b"squatter").unwrap();

    let err = service.create_run("exp1", "alice").unwrap_err();
    assert!(matches!(err, Error::PartialFailure { .. }));
    assert_eq!(
        service.runs_for_experiment("exp1").len(),
        1,
        "record survives"
    );
}

#[test]
fn traversal_names_are_rejected_before_commit() {
    let dir = tempfile::tempdir().unwrap();
    let service = TrackingService::open(dir.path()).unwrap();

    assert!(service.create_experiment("../evil").is_err());
    assert!(service.experiment("../evil").is_none(), "nothing committed");
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let service = TrackingService::open(dir.path()).unwrap();
        service.create_experiment("exp1").unwrap();
        service.create_run("exp1", "alice").unwrap();
        service.register_ml_service("10.0.0.1", 8080).unwrap();
    }
    assert!(dir.path().join(METADATA_FILE).is_file());

    let reopened = TrackingService::open(dir.path()).unwrap();
    assert!(reopened.experiment("exp1").is_some());
    assert_eq!(reopened.runs_for_experiment("exp1").len(), 1);
    assert_eq!(reopened.ml_services().len(), 1);

    let next = reopened.create_run("exp1", "bob").unwrap();
    assert_eq!(next.run_nr(), 2);
}

#[test]
fn service_update_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let id = {
        let service = TrackingService::open(dir.path()).unwrap();
        let registered = service.register_ml_service("10.0.0.1", 8080).unwrap();
        service
            .update_ml_service(
                registered.id(),
                bitacora::MlServiceFields::new().model_name("resnet"),
            )
            .unwrap();
        registered.id()
    };

    let reopened = TrackingService::open(dir.path()).unwrap();
    let services = reopened.ml_services();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].id(), id);
    assert_eq!(services[0].model_name(), Some("resnet"));
}

#[test]
fn model_upsert_merges_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let service = TrackingService::open(dir.path()).unwrap();

    service
        .upsert_ml_model("resnet", bitacora::MlModelFields::new().family("tensorflow"))
        .unwrap();
    let merged = service
        .upsert_ml_model(
            "resnet",
            bitacora::MlModelFields::new().definition(serde_json::json!({"v": 2})),
        )
        .unwrap();

    assert_eq!(merged.family(), Some("tensorflow"));
    assert_eq!(merged.definition(), Some(&serde_json::json!({"v": 2})));
    assert_eq!(service.ml_models().len(), 1);
}
