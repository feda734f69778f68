//! Paint Timeline CLI
//!
//! Analyzes one or more recordings (directories of exported frames) and
//! prints each timeline as TOML on stdout. Logs go to stderr.

use chrono::{DateTime, Utc};
use clap::Parser;
use paint_timeline::{
    analysis::{AnalysisReport, Analyzer, ScanMode, Timeline, TimelineEvent},
    capture::{FileConfig, FrameSource, ImageSequenceSource},
    differentiator::{Differentiator, StopHandle},
    metrics::ProgressMetrics,
    progress::{FanOut, ProgressListener, TracingProgress},
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Command-line arguments for paint-timeline
#[derive(Parser, Debug)]
#[command(name = "paint-timeline")]
#[command(about = "Startup and paint timing from screen recordings")]
#[command(version)]
struct Args {
    /// Directories of exported frames, one recording each
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of parallel diff units
    #[arg(short, long)]
    workers: Option<usize>,

    /// Stop as soon as the launch frame is found
    #[arg(long)]
    launch_only: bool,

    /// Nominal playback rate used for frame estimates
    #[arg(long)]
    fps: Option<u32>,

    /// Print Prometheus progress metrics to stderr after each recording
    #[arg(long)]
    metrics: bool,
}

#[derive(Debug, Serialize)]
struct RecordingReport {
    filename: String,
    analyzed_at: DateTime<Utc>,
    frames_processed: u64,
    stopped_early: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    crop_start: Option<u64>,
    timeline: Timeline,
    elapsed_ms: BTreeMap<&'static str, u64>,
}

impl From<AnalysisReport> for RecordingReport {
    fn from(report: AnalysisReport) -> Self {
        let elapsed_ms = TimelineEvent::ALL
            .into_iter()
            .filter(|&event| event != TimelineEvent::Launch)
            .filter_map(|event| Some((event.as_str(), report.timeline.elapsed_ms(event)?)))
            .collect();

        Self {
            filename: report.filename,
            analyzed_at: Utc::now(),
            frames_processed: report.frames_processed,
            stopped_early: report.stopped_early,
            crop_start: report.timeline.crop_start(),
            elapsed_ms,
            timeline: report.timeline,
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    recording: Vec<RecordingReport>,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("Paint Timeline v{}", paint_timeline::VERSION);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let interrupt = StopHandle::new();
    let handler_stop = interrupt.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if handler_stop.stop() {
            eprintln!("Interrupted; stopping all analyses");
        }
    }) {
        warn!("Failed to install Ctrl+C handler: {}", e);
    }

    let metrics = if args.metrics {
        match ProgressMetrics::new() {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                eprintln!("Failed to create metrics registry: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        None
    };

    let mode = if args.launch_only {
        ScanMode::LaunchOnly
    } else {
        ScanMode::Full
    };

    let mut reports = Vec::new();
    let mut failures = 0;

    for input in &args.inputs {
        if interrupt.is_stopped() {
            warn!(input = %input.display(), "Skipping recording after interrupt");
            continue;
        }
        if let Some(metrics) = &metrics {
            metrics.reset();
        }

        match analyze(input, &config, mode, &interrupt, metrics.as_ref()) {
            Ok(report) => reports.push(RecordingReport::from(report)),
            Err(e) => {
                error!(input = %input.display(), "Analysis failed: {}", e);
                eprintln!("{}: {}", input.display(), e);
                failures += 1;
            }
        }

        if let Some(metrics) = &metrics {
            match metrics.encode() {
                Ok(text) => eprint!("{}", text),
                Err(e) => warn!("Failed to encode metrics: {}", e),
            }
        }
    }

    match toml::to_string(&Output { recording: reports }) {
        Ok(text) => print!("{}", text),
        Err(e) => {
            eprintln!("Failed to serialize report: {}", e);
            std::process::exit(1);
        }
    }

    info!(
        "Done: {} analyzed, {} failed",
        args.inputs.len() - failures,
        failures
    );
    if failures > 0 {
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<FileConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.pool.workers = workers;
    }
    if let Some(fps) = args.fps {
        config.playback.nominal_fps = fps;
    }
    config.validate()?;
    Ok(config)
}

fn analyze(
    input: &Path,
    config: &FileConfig,
    mode: ScanMode,
    interrupt: &StopHandle,
    metrics: Option<&ProgressMetrics>,
) -> Result<AnalysisReport, Box<dyn std::error::Error>> {
    let mut source = ImageSequenceSource::open(input, config.playback.nominal_fps)?;
    let filename = source.name().to_string();

    let mut differentiator =
        Differentiator::with_threshold_engine(filename.clone(), config)?.with_interrupt(interrupt);

    let tracing_progress = TracingProgress::new(filename.clone());
    let mut listeners: Vec<&dyn ProgressListener> = vec![&tracing_progress];
    if let Some(metrics) = metrics {
        listeners.push(metrics);
    }
    let progress = FanOut::new(listeners);

    let analyzer = Analyzer::new(filename, mode, config.detection.clone());
    Ok(analyzer.run(&mut differentiator, &mut source, &progress)?)
}
