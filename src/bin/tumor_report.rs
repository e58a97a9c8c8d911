//! tumor_report - run the detection report pipeline once from the command line

use anyhow::{anyhow, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use tumor_report::{
    load_backend, ArtifactPaths, ArtifactStore, DetectorBackend, ReportPipeline, ReportRecord,
    ServiceConfig, StubBackend,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image to analyse.
    #[arg(long, value_name = "PATH")]
    image: PathBuf,
    /// File name used to derive artifact names (defaults to the image's name).
    #[arg(long, value_name = "NAME")]
    name: Option<String>,
    /// Use the stub detector (no detections) instead of the configured backend.
    #[arg(long)]
    stub: bool,
    /// Print a JSON summary instead of plain paths.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Summary<'a> {
    #[serde(flatten)]
    paths: &'a ArtifactPaths,
    detections: usize,
    record: Option<&'a ReportRecord>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let config = ServiceConfig::load()?;
    let store = ArtifactStore::init(config.storage.clone())?;
    let detector: Arc<dyn DetectorBackend> = if args.stub {
        Arc::new(
            StubBackend::empty()
                .with_input_size(config.detector.input_width, config.detector.input_height),
        )
    } else {
        load_backend(&config)?
    };
    let pipeline = ReportPipeline::new(detector, store).with_selection(config.selection);

    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .image
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("cannot derive a file name from {}", args.image.display()))?,
    };

    let outcome = pipeline.run_detailed(&args.image, &name)?;
    if args.json {
        let summary = Summary {
            paths: &outcome.paths,
            detections: outcome.detections.len(),
            record: outcome.record.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("annotated image: {}", outcome.paths.annotated_image.display());
        println!("report document: {}", outcome.paths.report_document.display());
    }
    Ok(())
}
