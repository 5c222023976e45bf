//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use imgprep_core::config::{self, FetchConfig, LoaderConfig, PartitionConfig};
use imgprep_core::fetch::FetchOutcome;
use imgprep_core::{ClassLabel, ClassLabelMap, Fetcher, ImageBatch, PrepConfig, UnmatchedPolicy};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Handle a CLI subcommand.
pub fn handle_command(
    command: Commands,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace, config_path),
        Commands::Fetch {
            urls,
            dest,
            extract,
            extract_dir,
            fail_fast,
            timeout,
        } => {
            let mut fetch = load(workspace, config_path)?.fetch;
            apply_fetch_flags(&mut fetch, dest, extract, extract_dir, fail_fast, timeout);
            handle_fetch(&urls, &fetch)
        }
        Commands::Subdivide {
            dir,
            classes,
            save_dir,
            split,
            train_ratio,
            seed,
        } => {
            let mut partition = load(workspace, config_path)?.partition;
            apply_partition_flags(&mut partition, classes, save_dir, split, train_ratio, seed);
            handle_subdivide(&dir, &partition)
        }
        Commands::Load {
            dir,
            height,
            width,
            channels_first,
            labels,
            no_shuffle,
            seed,
            skip_unlabeled,
            verbose_load,
        } => {
            let mut loader = load(workspace, config_path)?.loader;
            apply_loader_flags(
                &mut loader,
                LoaderFlags {
                    height,
                    width,
                    channels_first,
                    labels,
                    no_shuffle,
                    seed,
                    skip_unlabeled,
                },
            )?;
            handle_load(&dir, &loader, verbose_load)
        }
    }
}

fn load(workspace: &Path, config_path: Option<&Path>) -> anyhow::Result<PrepConfig> {
    tracing::debug!(config = ?config_path, workspace = %workspace.display(), "Loading configuration");
    let loaded = match config_path {
        Some(path) => config::load_config_file(path),
        None => config::load_config(Some(workspace), None),
    };
    loaded.map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = config::workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let toml_str = toml::to_string_pretty(&PrepConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace, config_path)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

// ── Fetch ────────────────────────────────────────────────────────────────

fn apply_fetch_flags(
    fetch: &mut FetchConfig,
    dest: Option<PathBuf>,
    extract: bool,
    extract_dir: Option<PathBuf>,
    fail_fast: bool,
    timeout: Option<u64>,
) {
    if let Some(dest) = dest {
        fetch.dest_dir = dest;
    }
    if let Some(dir) = extract_dir {
        fetch.extract_dir = dir;
    }
    fetch.extract |= extract;
    fetch.fail_fast |= fail_fast;
    if timeout.is_some() {
        fetch.timeout_secs = timeout;
    }
}

fn handle_fetch(urls: &[String], fetch: &FetchConfig) -> anyhow::Result<()> {
    let fetcher = Fetcher::new(fetch.to_options())?;
    let report = fetcher.fetch_all(urls);

    for outcome in &report.outcomes {
        match outcome {
            FetchOutcome::Downloaded(done) => {
                let extracted = done
                    .extracted
                    .map(|n| format!(", {n} files extracted"))
                    .unwrap_or_default();
                println!(
                    "  ok      {} -> {} ({} bytes{})",
                    done.resource.url,
                    done.resource.save_path.display(),
                    done.bytes,
                    extracted
                );
            }
            FetchOutcome::Failed(failure) => {
                println!(
                    "  failed  {} at {}: {}",
                    failure.url, failure.stage, failure.error
                );
            }
        }
    }
    let skipped = urls.len() - report.len();
    if skipped > 0 {
        println!("  skipped {} remaining URL(s)", skipped);
    }

    if !report.is_complete() {
        tracing::warn!(
            failed = report.failed().count(),
            "Some downloads failed; see the log for details"
        );
    }
    if fetch.fail_fast && !report.is_complete() {
        anyhow::bail!("Fetch stopped after a failure");
    }
    Ok(())
}

// ── Subdivide ────────────────────────────────────────────────────────────

fn apply_partition_flags(
    partition: &mut PartitionConfig,
    classes: Vec<String>,
    save_dir: Option<PathBuf>,
    split: bool,
    train_ratio: Option<f64>,
    seed: Option<u64>,
) {
    if !classes.is_empty() {
        partition.classes = classes;
    }
    if save_dir.is_some() {
        partition.save_dir = save_dir;
    }
    partition.split_train_val |= split;
    if let Some(ratio) = train_ratio {
        partition.train_ratio = ratio;
    }
    if seed.is_some() {
        partition.seed = seed;
    }
}

fn handle_subdivide(dir: &Path, partition: &PartitionConfig) -> anyhow::Result<()> {
    if partition.classes.is_empty() {
        anyhow::bail!("No classes given. Pass --class NAME or set partition.classes in config.");
    }
    let report = imgprep_core::subdivide(dir, &partition.to_options())?;

    let splits: Vec<Option<imgprep_core::Split>> = if partition.split_train_val {
        imgprep_core::Split::ALL.iter().copied().map(Some).collect()
    } else {
        vec![None]
    };
    println!("Moved {} file(s):", report.moved.len());
    for class in &partition.classes {
        for split in &splits {
            let label = match split {
                Some(split) => format!("{}/{}", split.dir_name(), class),
                None => class.clone(),
            };
            println!("  {:<24} {}", label, report.count(class, *split));
        }
    }
    if !report.unmatched.is_empty() {
        println!("Left {} unmatched file(s) in place", report.unmatched.len());
    }
    Ok(())
}

// ── Load ─────────────────────────────────────────────────────────────────

struct LoaderFlags {
    height: Option<u32>,
    width: Option<u32>,
    channels_first: bool,
    labels: Vec<ClassLabel>,
    no_shuffle: bool,
    seed: Option<u64>,
    skip_unlabeled: bool,
}

fn apply_loader_flags(loader: &mut LoaderConfig, flags: LoaderFlags) -> anyhow::Result<()> {
    if let Some(height) = flags.height {
        loader.height = height;
    }
    if let Some(width) = flags.width {
        loader.width = width;
    }
    loader.channels_first |= flags.channels_first;
    if !flags.labels.is_empty() {
        loader.labels = ClassLabelMap::try_from(flags.labels)?;
    }
    if flags.no_shuffle {
        loader.shuffle = false;
    }
    if flags.seed.is_some() {
        loader.seed = flags.seed;
    }
    if flags.skip_unlabeled {
        loader.unmatched = UnmatchedPolicy::Skip;
    }
    Ok(())
}

/// JSON summary printed by `imgprep load`.
#[derive(Debug, Serialize)]
struct BatchSummary {
    count: usize,
    shape: Vec<usize>,
    channel_order: imgprep_core::ChannelOrder,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<BTreeMap<String, usize>>,
}

impl BatchSummary {
    fn new(batch: &ImageBatch, map: &ClassLabelMap) -> Self {
        let labels = batch.label_counts().map(|counts| {
            counts
                .into_iter()
                .map(|(index, n)| {
                    let name = map
                        .name_of(index)
                        .map(str::to_string)
                        .unwrap_or_else(|| index.to_string());
                    (name, n)
                })
                .collect()
        });
        Self {
            count: batch.len(),
            shape: batch.images.shape().to_vec(),
            channel_order: batch.channel_order,
            labels,
        }
    }
}

fn handle_load(dir: &Path, loader: &LoaderConfig, verbose: bool) -> anyhow::Result<()> {
    let options = loader.to_options().verbose(verbose);
    let batch = imgprep_core::load_batch(dir, &options)?;
    let summary = BatchSummary::new(&batch, &loader.labels);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
