// src/main.rs

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use zone_counter::track_source::{find_track_files, TrackReader};
use zone_counter::{Config, FrameOrchestrator};

#[derive(Parser, Debug)]
#[command(name = "zone-counter", about = "Count tracked objects entering and exiting zones")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Tracker output: a JSON-lines file or a directory of them
    #[arg(short, long)]
    input: PathBuf,

    /// Log filter, overrides RUST_LOG and logging.level
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;
    init_logging(args.log_level.as_deref(), &config.logging.level);

    info!("🚦 Zone counter starting");
    info!(
        "✓ Configuration loaded from {}: {} zone(s), track_length={} backtrack_length={}",
        args.config,
        config.zones.len().max(1),
        config.counting.track_length,
        config.counting.backtrack_length
    );

    let files = find_track_files(&args.input)?;
    if files.is_empty() {
        error!("No track files found in {}", args.input.display());
        return Ok(());
    }

    let multiple = files.len() > 1;
    let mut failed = 0;
    for (i, path) in files.iter().enumerate() {
        info!("\n========================================");
        info!("Processing input {}/{}: {}", i + 1, files.len(), path.display());
        info!("========================================");

        let session = session_config(&config, path, multiple);
        if let Err(e) = process_file(path, &session) {
            error!("❌ {} failed: {:#}", path.display(), e);
            failed += 1;
        }
    }

    info!(
        "✅ Done: {}/{} inputs processed",
        files.len() - failed,
        files.len()
    );
    Ok(())
}

fn init_logging(cli_filter: Option<&str>, config_level: &str) {
    let filter = match cli_filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("zone_counter={}", config_level))),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn process_file(path: &Path, config: &Config) -> Result<()> {
    let mut orchestrator = FrameOrchestrator::from_config(config)?;
    let mut reader = TrackReader::open(path)?;

    for frame in reader.by_ref() {
        orchestrator.process_frame(&frame?);
    }

    let totals = orchestrator.finish();
    let events = orchestrator.drain_events();

    if reader.malformed() > 0 {
        warn!("{} malformed lines skipped", reader.malformed());
    }
    if reader.dropped_detections() > 0 {
        warn!(
            "{} undecodable detections dropped",
            reader.dropped_detections()
        );
    }
    if orchestrator.dropped_events() > 0 {
        warn!(
            "{} events dropped from the in-memory queue",
            orchestrator.dropped_events()
        );
    }

    info!("📊 Results for {}", path.display());
    for zone in &totals {
        info!(
            "  {} (zone {}): entries={} exits={} live_tracks={}",
            zone.name, zone.zone_id, zone.entries, zone.exits, zone.live_tracks
        );
    }
    for event in &events {
        debug!(
            "  {} {} id={} frame={} at {}",
            event.zone_name,
            event.kind.as_str(),
            event.identity,
            event.frame_index,
            event.event_time
        );
    }

    let summary = orchestrator.metrics().summary();
    info!("📈 Metrics: {}", serde_json::to_string(&summary)?);
    Ok(())
}

/// Per-input output paths when several inputs share one config: snapshots
/// get the input's stem as a suffix, overlays a subdirectory. Event logs are
/// appended to the same file.
fn session_config(config: &Config, input: &Path, multiple: bool) -> Config {
    let mut session = config.clone();
    if !multiple {
        return session;
    }
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("session");

    if let Some(path) = &config.output.snapshot_path {
        session.output.snapshot_path = Some(with_suffix(path, stem));
    }
    if let Some(dir) = &config.output.overlay_dir {
        session.output.overlay_dir = Some(Path::new(dir).join(stem).to_string_lossy().into_owned());
    }
    session
}

fn with_suffix(path: &str, suffix: &str) -> String {
    let p = Path::new(path);
    let base = p.file_stem().and_then(|s| s.to_str()).unwrap_or("snapshot");
    let name = match p.extension().and_then(|s| s.to_str()) {
        Some(ext) => format!("{}_{}.{}", base, suffix, ext),
        None => format!("{}_{}", base, suffix),
    };
    p.with_file_name(name).to_string_lossy().into_owned()
}
