//! imgprep CLI: prepares image classification datasets for training.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// imgprep: prepare image datasets for training
#[derive(Parser, Debug)]
#[command(name = "imgprep", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Download files and optionally unpack zip archives
    Fetch {
        /// URLs to download, in order
        #[arg(required = true)]
        urls: Vec<String>,

        /// Directory downloads are saved into
        #[arg(short, long)]
        dest: Option<PathBuf>,

        /// Unpack each download as a zip archive
        #[arg(long)]
        extract: bool,

        /// Directory archives are unpacked into
        #[arg(long)]
        extract_dir: Option<PathBuf>,

        /// Stop at the first failing URL and exit non-zero
        #[arg(long)]
        fail_fast: bool,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Move files into per-class (and optionally train/val) directories
    Subdivide {
        /// Directory holding the flat file list
        dir: PathBuf,

        /// Class name; repeat in matching priority order
        #[arg(long = "class", value_name = "NAME")]
        classes: Vec<String>,

        /// Root of the class tree (defaults to DIR)
        #[arg(long)]
        save_dir: Option<PathBuf>,

        /// Route files into train/ and val/
        #[arg(long)]
        split: bool,

        /// Probability that a file goes to train/
        #[arg(long)]
        train_ratio: Option<f64>,

        /// Seed for the train/val draw
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Load a directory of images into one batch and print its summary
    Load {
        /// Directory of images
        dir: PathBuf,

        /// Target height in pixels
        #[arg(long)]
        height: Option<u32>,

        /// Target width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Emit N x C x H x W instead of N x H x W x C
        #[arg(long)]
        channels_first: bool,

        /// Class label as name=index; repeat in matching priority order
        #[arg(long = "label", value_name = "NAME=INDEX")]
        labels: Vec<imgprep_core::ClassLabel>,

        /// Keep files in name order
        #[arg(long)]
        no_shuffle: bool,

        /// Shuffle seed
        #[arg(long)]
        seed: Option<u64>,

        /// Leave out files no label matches instead of failing
        #[arg(long)]
        skip_unlabeled: bool,

        /// Log every loaded file
        #[arg(long)]
        verbose_load: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default configuration file into the workspace
    Init,
    /// Print the effective configuration
    Show,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "imgprep", "imgprep")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "imgprep.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    tracing::debug!(workspace = %workspace.display(), "Resolved workspace");

    commands::handle_command(cli.command, &workspace, cli.config.as_deref())
}
