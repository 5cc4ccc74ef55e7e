//! RGB-D capture: polls a color and a depth stream and writes paired frames

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rgbd_capture::capture::SyntheticSensor;
use rgbd_capture::display::{SnapshotHandle, SnapshotViewer};
use rgbd_capture::pipeline::{
    ColorSync, CycleOutcome, DepthSync, StreamProcessor, SyncPolicy,
};
use rgbd_capture::storage::DatasetWriter;
use rgbd_capture::sync::{SystemClock, TimestampGate};
use rgbd_capture::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rgbd_capture=info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("RGB-D capture launching...");

    // Load configuration
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    rgbd_capture::CONFIG.store(Arc::new(config.clone()));
    info!("Writing dataset under {}", config.output.root.display());

    let gate = Arc::new(TimestampGate::new(Arc::new(SystemClock), config.sync.interval()));
    let writer = Arc::new(DatasetWriter::new(config.output.layout()));

    let mut color = StreamProcessor::new(
        SyntheticSensor::color().continuous(),
        ColorSync::new(&config.capture.color),
        Arc::clone(&gate),
        Arc::clone(&writer),
    );
    let mut depth = StreamProcessor::new(
        SyntheticSensor::depth().continuous(),
        DepthSync::new(&config.capture.depth),
        Arc::clone(&gate),
        Arc::clone(&writer),
    );

    color.start_stream()?;
    depth.start_stream()?;

    let (color_viewer, color_view) = SnapshotViewer::new();
    let (depth_viewer, depth_view) = SnapshotViewer::new();
    color.set_viewer(Some(Box::new(color_viewer)));
    depth.set_viewer(Some(Box::new(depth_viewer)));

    let poll = config.pipeline.poll_interval();
    let color_handle = tokio::spawn(poll_stream(color, poll));
    let depth_handle = tokio::spawn(poll_stream(depth, poll));
    let status_handle = tokio::spawn(report_status(color_view, depth_view));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    color_handle.abort();
    depth_handle.abort();
    status_handle.abort();

    info!("RGB-D capture shutting down");
    Ok(())
}

/// Drive one stream's processing cycle on a fixed tick
async fn poll_stream<S, P>(mut processor: StreamProcessor<S, P>, period: Duration)
where
    S: rgbd_capture::capture::SensorStream + 'static,
    P: SyncPolicy + 'static,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut dropped = 0u64;

    loop {
        ticker.tick().await;
        if processor.process_stream_frame() == CycleOutcome::Dropped {
            dropped += 1;
            if dropped % 100 == 1 {
                warn!("{} stream has dropped {} frames", P::STREAM, dropped);
            }
        }
    }
}

async fn report_status(color: SnapshotHandle, depth: SnapshotHandle) {
    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    loop {
        ticker.tick().await;
        for (name, view) in [("color", &color), ("depth", &depth)] {
            if let Some(snapshot) = view.latest() {
                info!(
                    "{} viewer: {} updates, latest {}x{} {:?}",
                    name,
                    view.updates(),
                    snapshot.width,
                    snapshot.height,
                    snapshot.format
                );
            }
        }
    }
}
