//! Preflight checks for a WildReel deployment: external tools on PATH,
//! a writable work root, and resolvable assets.

use std::path::Path;

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wildreel_pipeline::{ClassifierConfig, PipelineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);
    let env_filter = EnvFilter::from_default_env()
        .add_directive("wildreel=info".parse().unwrap())
        .add_directive("ort=warn".parse().unwrap());
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(false))
            .with(env_filter)
            .init();
    }

    let config = PipelineConfig::from_env();
    info!(work_root = %config.work_root.display(), "starting selfcheck");

    let mut failures = 0u32;

    for tool in ["ffmpeg", "ffprobe"] {
        match which::which(tool) {
            Ok(path) => info!(tool, path = %path.display(), "found"),
            Err(_) => {
                warn!(tool, "not found in PATH");
                failures += 1;
            }
        }
    }

    match tokio::fs::create_dir_all(&config.work_root).await {
        Ok(()) => info!(work_root = %config.work_root.display(), "work root writable"),
        Err(e) => {
            warn!(error = %e, "work root not writable");
            failures += 1;
        }
    }

    let classifier = ClassifierConfig::from_env();
    for (name, path) in [
        ("classifier model", classifier.model_path.as_path()),
        ("classifier labels", classifier.labels_path.as_path()),
        ("title font", config.thumbnail.font_path.as_path()),
        ("logo", config.thumbnail.logo_path.as_path()),
    ] {
        if check_asset(name, path) {
            failures += 1;
        }
    }

    if failures > 0 {
        anyhow::bail!("selfcheck failed with {failures} problem(s)");
    }
    info!("selfcheck ok");
    Ok(())
}

/// Returns true when the asset is missing.
fn check_asset(name: &str, path: &Path) -> bool {
    if path.exists() {
        info!(asset = name, path = %path.display(), "found");
        false
    } else {
        warn!(asset = name, path = %path.display(), "missing");
        true
    }
}
