mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "flowbind",
    version,
    about = "Resolve and bind the channels of stream pipelines"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a pipeline definition and expand its descriptors
    Check {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
    },
    /// Show the channel each stage reads from and writes to
    Plan {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
        /// Print deployment metadata as JSON
        #[arg(long)]
        json: bool,
    },
    /// Bind every stage on an in-process bus, then release it
    Bind {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
        /// Frames buffered per channel
        #[arg(long, default_value_t = flowbind_engine::bus::DEFAULT_CHANNEL_CAPACITY)]
        capacity: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Check { pipeline } => commands::check::execute(&pipeline),
        Commands::Plan { pipeline, json } => commands::plan::execute(&pipeline, json),
        Commands::Bind { pipeline, capacity } => commands::bind::execute(&pipeline, capacity).await,
    }
}
