//! sigstream-rs demo - Main Entry Point
//!
//! Streams from a capture file (or a synthetic generator when no file is
//! given), logs throughput, and optionally records CSV.
//!
//! ```text
//! sigstream-rs [config.toml|config.json] [capture-file]
//! ```

use anyhow::Context;
use sigstream_rs::{
    config::{default_config_path, EngineConfig, LoggingConfig},
    engine::StreamEngine,
    recorder::CsvRecorder,
    transport::{FileReplayTransport, SignalPattern, SyntheticConfig, SyntheticTransport, Transport},
    types::EngineEvent,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long the demo streams
const RUN_DURATION: Duration = Duration::from_secs(5);

/// Statistics log interval
const STATS_INTERVAL: Duration = Duration::from_millis(500);

/// Synthetic frame rate when no capture file is given
const SYNTHETIC_RATE_HZ: f64 = 1000.0;

fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "sigstream-rs.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            None
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path)),
        None => Ok(default_config_path()
            .filter(|p| p.exists())
            .map(EngineConfig::load_or_default)
            .unwrap_or_default()),
    }
}

fn build_transport(config: &EngineConfig, capture: Option<PathBuf>) -> Box<dyn Transport> {
    match capture {
        Some(path) => {
            let mut transport = FileReplayTransport::new(path);
            if let Some(rate) = config.sample_rate_hz {
                transport = transport.with_sample_rate(rate);
            }
            Box::new(transport)
        }
        None => {
            let patterns = (0..config.parser.channel_count)
                .map(|ch| SignalPattern::Sine {
                    frequency: 1.0 + ch as f64,
                    amplitude: 1000.0,
                    offset: 0.0,
                })
                .collect();
            Box::new(SyntheticTransport::new(
                SyntheticConfig::new(config.parser.clone(), SYNTHETIC_RATE_HZ)
                    .with_patterns(patterns),
            ))
        }
    }
}

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1).map(PathBuf::from);
    let config_path = args.next();
    let capture = args.next();

    let config = load_config(config_path.as_ref())?;
    let _log_guard = init_logging(&config.logging);

    tracing::info!("Starting sigstream-rs");

    let transport = build_transport(&config, capture);
    let mut engine = StreamEngine::new(config.clone(), transport)?;
    let events = engine.subscribe();

    if !engine.connect() {
        anyhow::bail!("{}", engine.status());
    }

    let handle = engine.handle();
    let mut recorder = match &config.recorder {
        Some(recorder_config) => Some(CsvRecorder::create(handle.clone(), recorder_config.clone())?),
        None => None,
    };

    engine.start_streaming();

    let started = Instant::now();
    let mut last_stats = Instant::now();
    let mut latest = [0.0; 8];

    while started.elapsed() < RUN_DURATION && engine.is_streaming() {
        std::thread::sleep(Duration::from_millis(50));

        if let Some(recorder) = recorder.as_mut() {
            recorder.poll()?;
        }

        for event in events.try_iter() {
            match event {
                EngineEvent::Faulted(reason) => tracing::error!("Stream faulted: {}", reason),
                EngineEvent::StreamEnded => tracing::info!("Capture finished"),
                _ => {}
            }
        }

        if last_stats.elapsed() >= STATS_INTERVAL {
            let stats = handle.statistics();
            let n = handle.copy_latest(0, &mut latest, 8);
            tracing::info!(
                "{} frames, {:.1} kbit/s, {} read errors, ch0 tail {:?}",
                stats.total_samples,
                stats.bit_rate(started.elapsed()) / 1000.0,
                stats.read_errors,
                &latest[..n]
            );
            last_stats = Instant::now();
        }
    }

    engine.stop_streaming();

    if let Some(mut recorder) = recorder {
        recorder.poll()?;
        let summary = recorder.finish()?;
        tracing::info!(
            "Recorded {} rows to {:?} ({} frames lost)",
            summary.rows_written,
            summary.path,
            summary.samples_lost
        );
    }

    engine.disconnect();
    tracing::info!("Shutting down...");
    Ok(())
}
