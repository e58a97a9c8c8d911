//! tumor_webui - upload form server for the tumor detection report service
//!
//! This daemon:
//! 1. Loads configuration (TUMOR_REPORT_CONFIG + environment overrides)
//! 2. Creates the upload, prediction and report directories
//! 3. Loads the detector once; a missing model aborts startup
//! 4. Serves the upload form until Ctrl-C

use anyhow::Result;
use std::sync::mpsc;

use tumor_report::{
    load_backend,
    web::{WebConfig, WebServer},
    ArtifactStore, ReportPipeline, ServiceConfig,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServiceConfig::load()?;
    let store = ArtifactStore::init(config.storage.clone())?;
    let detector = load_backend(&config)?;
    let pipeline = ReportPipeline::new(detector, store).with_selection(config.selection);

    let web_config = WebConfig {
        addr: config.server.addr.clone(),
        max_upload_bytes: config.server.max_upload_bytes,
    };
    let handle = WebServer::new(web_config, pipeline).spawn()?;
    log::info!("upload form listening on http://{}", handle.addr);
    log::info!(
        "writing predictions to {} and reports to {}",
        config.storage.predictions_dir.display(),
        config.storage.reports_dir.display()
    );

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })?;

    log::info!("tumor_webui waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping web server...");
    handle.stop()?;

    Ok(())
}
