//! WaveSense reference runner
//!
//! Reads samples from stdin (whitespace- or comma-separated integers), runs
//! them through the pipeline and prints one CSV export row per classified
//! window to stdout. Label commands (`SYNC LABEL wave=<0-4> ...`, `LBL:<NAME>`)
//! on their own line set the ground truth for the windows that follow.

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use wavesense_core::config::PipelineConfig;
use wavesense_core::{ExportRecord, LabelSlot};
use wavesense_pipeline::{Pipeline, SampleSink};

#[derive(Parser, Debug)]
#[command(name = "wavesense")]
#[command(about = "WaveSense waveform classification pipeline", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "wavesense.yaml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON
    #[arg(long)]
    json: bool,

    /// Print the CSV header before the first row
    #[arg(long)]
    header: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json);
    wavesense_telemetry::describe_metrics();

    info!("Starting WaveSense");
    let config = PipelineConfig::load_or_default(&cli.config)?;
    let window_size = config.acquisition.window_size;

    let pipeline = Pipeline::from_config(config, None)?;
    let mut exports = pipeline.subscribe_exports();

    if cli.header {
        println!("{}", ExportRecord::csv_header(window_size));
    }
    let printer = tokio::spawn(async move {
        loop {
            match exports.recv().await {
                Ok(record) => println!("{}", record.to_csv_row()),
                Err(RecvError::Lagged(n)) => warn!("Output lagged, {} rows lost", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    pipeline.start();
    tokio::select! {
        result = feed_stdin(pipeline.sample_sink(), pipeline.labels()) => result?,
        _ = shutdown_signal() => warn!("Shutdown signal received, stopping pipeline..."),
    }

    pipeline.shutdown().await;
    let stats = pipeline.inference_snapshot();
    drop(pipeline);
    printer.await?;

    info!(
        "Classified {} windows ({} contract violations, {} model failures)",
        stats.inferences, stats.contract_violations, stats.model_failures
    );
    Ok(())
}

/// Push every sample read from stdin until EOF
async fn feed_stdin(sink: SampleSink, labels: LabelSlot) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(label) = labels.apply_command(line) {
            info!("Ground truth set to {}", label);
            continue;
        }

        for token in line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
        {
            match token.parse() {
                Ok(sample) => {
                    sink.push(sample);
                }
                Err(_) => warn!("Line {}: ignoring {:?}", line_no, token),
            }
        }
        tokio::task::yield_now().await;
    }

    info!("End of input after {} lines", line_no);
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging. Logs go to stderr; stdout carries the rows.
fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("wavesense=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wavesense=info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
