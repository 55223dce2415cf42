//! Runs one training job described by a JSON config file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ferrite_callbacks::{fit, RunConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Train a feed-forward network with lifecycle observers.
#[derive(Parser, Debug)]
#[command(name = "ferrite-callbacks", version, about, long_about = None)]
struct Cli {
    /// Run configuration (network, training settings, dataset, callbacks)
    config: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only report errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter))),
        )
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> ferrite_callbacks::Result<()> {
    let config = RunConfig::load_json(&cli.config)?;
    let train = config.dataset.load()?;
    let val = config.validation.as_ref().map(|spec| spec.load()).transpose()?;

    let mut model = config.build_model()?;
    let mut callbacks = config.build_callbacks()?;
    tracing::info!(
        network = %config.network.name,
        samples = train.len(),
        callbacks = ?callbacks.names(),
        "starting run"
    );

    let summary = fit(&mut model, &mut callbacks, &train, val.as_ref(), &config.train_config())?;

    let metrics: Vec<String> = summary.last_logs.iter().map(|(k, v)| format!("{k}={v:.5}")).collect();
    tracing::info!(
        epochs = summary.epochs_run,
        stopped_early = summary.stopped_early,
        "finished: {}",
        metrics.join(" ")
    );
    Ok(())
}
