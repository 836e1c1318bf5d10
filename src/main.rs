use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wxqc::manager::Manager;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fill missing values of every records file.
    Impute,

    /// Flag anomalous values of every records file.
    Detect {
        /// Analyze the imputed records instead of the raw ones.
        #[arg(long)]
        imputed: bool,
    },

    /// Remove generated files.
    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.data_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Impute => mgr.impute_data()?,
        Command::Detect { imputed } => mgr.detect_anomalies(imputed)?,
        Command::Clean => mgr.clean_data()?,
    }

    Ok(())
}
