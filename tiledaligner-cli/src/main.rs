use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use anyhow::{Result, Context};

mod config;
mod commands;
mod error;

use config::Config;
use error::CliError;

#[derive(Parser)]
#[command(name = "tiledaligner")]
#[command(about = "TiledAligner - tiled 13-mer aligner emitting BLAT/psl records")]
#[command(version)]
#[command(long_about = "
TiledAligner places short and medium-length DNA queries on a reference genome
by probing a 13-mer tile index, extending runs of consecutive tiles and falling
back to Smith-Waterman alignment. Results are written as BLAT/psl records.

Examples:
  tiledaligner align --reference genome.fa --query amplicons.fa --out hits.psl
  tiledaligner align --reference genome.fa --tiles genome.tiles.gz --query reads.fa --format json
  tiledaligner config --output tiledaligner.toml
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of threads to use
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Align every query of a FASTA file against a reference
    Align {
        /// Reference sequence file (FASTA, optionally gzipped)
        #[arg(long, required = true)]
        reference: PathBuf,

        /// Query sequence file (FASTA/FASTQ)
        #[arg(long, required = true)]
        query: PathBuf,

        /// Tile index file; built from the reference when omitted
        #[arg(long)]
        tiles: Option<PathBuf>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Output format
        #[arg(long)]
        format: Option<OutputFormat>,
    },

    /// Print or write an example configuration file
    Config {
        /// Write the example configuration here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Psl,
    Json,
}

fn setup_logging(verbose: u8, quiet: bool) -> Result<()> {
    if quiet {
        std::env::set_var("RUST_LOG", "error");
    } else {
        let level = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        std::env::set_var("RUST_LOG", level);
    }

    env_logger::Builder::from_default_env()
        .format_timestamp_secs()
        .init();

    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    let threads = cli.threads.unwrap_or(config.general.threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("Failed to set thread count")?;

    match cli.command {
        Commands::Align {
            reference,
            query,
            tiles,
            out,
            format,
        } => {
            commands::align::execute(&config, reference, query, tiles, out, format)?;
        }

        Commands::Config { output } => {
            commands::config::execute(output)?;
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet)?;

    if let Err(err) = run(cli) {
        if let Some(cli_err) = err.downcast_ref::<CliError>() {
            error::print_error_and_exit(cli_err);
        }
        return Err(err);
    }
    Ok(())
}
