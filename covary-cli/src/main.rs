use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod error;

use commands::filter::ThresholdOverrides;
use config::Config;
use covary_core::CooccurMetric;
use error::CliError;

#[derive(Parser)]
#[command(name = "covary")]
#[command(about = "covary - windowed co-occurrence matrices for deep-sequencing data")]
#[command(version)]
#[command(long_about = "
covary decodes windowed pairwise statistics (read depth, variant counts,
co-occurrence metrics, base-pair counts, packed reference) and filters them
down to the position pairs whose variants travel together.

Examples:
  covary synth --out-dir demo
  covary inspect demo/depth.dat
  covary filter --manifest demo/manifest.json --dataset synthetic --min-abs-metric 0.3
  covary filter --manifest demo/manifest.json --dataset synthetic --synonymy --out hits.json
  covary layout --annotations demo/genes.json
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the header and layout of a binary matrix file
    Inspect {
        /// Binary matrix file
        file: PathBuf,

        /// Metric name to decode as (selects fullcounts/refdata layouts)
        #[arg(long, default_value = "metric")]
        metric: String,
    },

    /// Decode a dataset and list the position pairs passing the thresholds
    Filter {
        /// Dataset manifest (JSON)
        #[arg(long, required = true)]
        manifest: PathBuf,

        /// Dataset name within the manifest
        #[arg(long, required = true)]
        dataset: String,

        /// Directory holding the dataset files (defaults to the manifest's directory)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Which metric file of the dataset to load
        #[arg(long)]
        metric_index: Option<usize>,

        /// Minimum depth as a fraction of the maximum depth
        #[arg(long)]
        min_depth_percent: Option<f64>,

        /// Minimum variant fraction at i
        #[arg(long)]
        min_variant_fraction: Option<f64>,

        /// Apply the variant fraction floor at j as well
        #[arg(long)]
        also_j: bool,

        /// Minimum absolute co-occurrence metric
        #[arg(long)]
        min_abs_metric: Option<f64>,

        /// Treat synonymous substitutions as modal
        #[arg(long)]
        synonymy: bool,

        /// Metric recomputed in synonymy mode (diff, gated, conj, ratio)
        #[arg(long)]
        syn_metric: Option<CooccurMetric>,

        /// Write the filtered result as JSON
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Assign annotation domains to non-overlapping display layers
    Layout {
        /// Annotation file (JSON)
        #[arg(long, required = true)]
        annotations: PathBuf,
    },

    /// Write a small synthetic dataset for smoke testing
    Synth {
        /// Output directory
        #[arg(long, required = true)]
        out_dir: PathBuf,

        /// Number of positions
        #[arg(long, default_value = "120")]
        num_pos: i32,

        /// Window width (odd)
        #[arg(long, default_value = "21")]
        num_window: i32,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Print an example configuration, or save the effective one
    Config {
        /// Save the effective configuration to this path
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
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
    setup_logging(cli.verbose, cli.quiet)?;

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { file, metric } => {
            commands::inspect::execute(&file, &metric)?;
        }

        Commands::Filter {
            manifest,
            dataset,
            data_dir,
            metric_index,
            min_depth_percent,
            min_variant_fraction,
            also_j,
            min_abs_metric,
            synonymy,
            syn_metric,
            out,
        } => {
            let overrides = ThresholdOverrides {
                min_depth_percent,
                min_variant_fraction,
                also_j,
                min_abs_metric,
                synonymy,
                syn_metric,
            };
            commands::filter::execute(&config, manifest, dataset, data_dir, metric_index, overrides, out)?;
        }

        Commands::Layout { annotations } => {
            commands::layout::execute(&annotations)?;
        }

        Commands::Synth { out_dir, num_pos, num_window, seed } => {
            commands::synth::execute(&out_dir, num_pos, num_window, seed)?;
        }

        Commands::Config { out } => match out {
            Some(path) => {
                config.save_to_file(&path)?;
                log::info!("Configuration written to: {}", path.display());
            }
            None => print!("{}", Config::example_toml()?),
        },
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        match err.downcast_ref::<CliError>() {
            Some(cli_err) => error::print_error_and_exit(cli_err),
            None => {
                eprintln!("Error: {:#}", err);
                std::process::exit(1);
            }
        }
    }
}
