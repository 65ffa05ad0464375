//! End-to-end demo: an embedded tracking service driven by the run
//! lifecycle, including a toy model exporter.
//!
//! Run with `cargo run --example track_training`. Artifacts land under
//! `./bitacora-artifacts`.

use std::sync::Arc;

use anyhow::Result;
use bitacora::client::{ModelExport, ModelExporter, RunLifecycle};
use bitacora::{RunFile, TrackingService};

/// Toy exporter: the options document is the model.
struct JsonExporter;

impl ModelExporter for JsonExporter {
    fn family(&self) -> &str {
        "json"
    }

    fn export(&self, options: &serde_json::Value) -> bitacora::Result<ModelExport> {
        Ok(ModelExport {
            definition: options.clone(),
            files: vec![RunFile::new(
                "model.json",
                serde_json::to_vec_pretty(options)?,
            )],
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let service = Arc::new(TrackingService::open("bitacora-artifacts")?);
    service.register_ml_service("127.0.0.1", 8080)?;

    let record = {
        let mut run = RunLifecycle::builder(Arc::clone(&service), "mnist-baseline")
            .exporter(Box::new(JsonExporter))
            .start()?;
        run.log_parameter("lr", "0.001");
        run.log_parameter("batch_size", "32");
        run.log_tag("dataset", "mnist");
        for epoch in 1u32..=3 {
            run.log_metric(
                format!("loss_epoch_{epoch}"),
                format!("{:.3}", 1.0 / f64::from(epoch)),
            );
        }
        run.log_model("json", &serde_json::json!({"layers": [784, 128, 10]}))?;
        run.finish()?
    };

    println!(
        "run {}/{} finished as {:?} after {:.3}s",
        record.experiment_name(),
        record.run_nr(),
        record.status(),
        record.duration_secs().unwrap_or(0.0),
    );

    for run in service.runs_for_experiment("mnist-baseline") {
        println!(
            "  #{} by {}: {:?}, {} metrics",
            run.run_nr(),
            run.author(),
            run.status(),
            run.metrics().len(),
        );
    }
    Ok(())
}
