//! CLI binary for dispatching sample requests through the Vetting validation pipeline.

mod sample;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tokio_stream::StreamExt;

use vetting_pipeline::{Mediator, MediatorConfig, ValidationMode};
use vetting_types::{CancelSignal, PipelineError};

use crate::sample::{SampleRequest, SampleStreamRequest};

#[derive(Parser)]
#[command(name = "vet", version, about = "Dispatch sample requests through the validation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Validation mode: "single" or "collection" (overrides the config file)
    #[arg(short, long, global = true)]
    mode: Option<ValidationMode>,

    /// JSON file holding a mediator config, e.g. {"mode": "single"}
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print responses and validation failures as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single sample request
    Send {
        /// Request id (valid range is 1..=9 in collection mode)
        #[arg(long, allow_negative_numbers = true)]
        id: i32,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,
    },

    /// Open a stream of sample responses
    Stream {
        /// Request id (must be positive)
        #[arg(long, allow_negative_numbers = true)]
        id: i32,

        /// Number of items the handler streams
        #[arg(long, default_value = "5")]
        count: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    let config = load_config(cli.config.as_deref(), cli.mode)?;
    let mediator = sample::mediator(config)?;

    let cancel = CancelSignal::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let result = match cli.command {
        Commands::Send { id, name, email } => {
            cmd_send(&mediator, SampleRequest { id, name, email }, &cancel, cli.json).await
        }
        Commands::Stream { id, count } => {
            cmd_stream(&mediator, SampleStreamRequest { id, count }, &cancel, cli.json).await
        }
    };

    match result {
        Ok(()) => Ok(()),
        Err(err) if err.is_validation_failure() => {
            print_failures(&err, cli.json)?;
            std::process::exit(1);
        }
        Err(PipelineError::Canceled) => {
            tracing::warn!("Interrupted");
            std::process::exit(130);
        }
        Err(err) => Err(err.into()),
    }
}

fn load_config(path: Option<&Path>, mode: Option<ValidationMode>) -> anyhow::Result<MediatorConfig> {
    let mut config = match path {
        Some(path) => {
            let source = std::fs::read_to_string(path)?;
            MediatorConfig::from_json_str(&source)?
        }
        None => MediatorConfig::default(),
    };
    if let Some(mode) = mode {
        config.mode = mode;
    }
    Ok(config)
}

async fn cmd_send(
    mediator: &Mediator,
    request: SampleRequest,
    cancel: &CancelSignal,
    json: bool,
) -> vetting_types::Result<()> {
    let response = mediator.send(request, cancel).await?;
    if json {
        println!("{}", serde_json::to_string(&response)?);
    } else {
        println!("{}", response.id);
    }
    Ok(())
}

async fn cmd_stream(
    mediator: &Mediator,
    request: SampleStreamRequest,
    cancel: &CancelSignal,
    json: bool,
) -> vetting_types::Result<()> {
    let mut stream = mediator.create_stream(request, cancel)?;
    while let Some(item) = stream.next().await {
        let item = item?;
        if json {
            println!("{}", serde_json::to_string(&item)?);
        } else {
            println!("{} #{}", item.id, item.sequence);
        }
    }
    Ok(())
}

fn print_failures(err: &PipelineError, json: bool) -> anyhow::Result<()> {
    let failures = err.failures().unwrap_or_default();
    if json {
        println!("{}", serde_json::to_string_pretty(failures)?);
    } else {
        for failure in failures {
            eprintln!("{failure}");
        }
    }
    Ok(())
}
