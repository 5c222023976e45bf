//! Configuration for imgprep.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/imgprep/config.toml` and/or `.imgprep/config.toml`
//! in the workspace directory.

use crate::classes::ClassLabelMap;
use crate::fetch::{FailurePolicy, FetchOptions};
use crate::loader::{ChannelOrder, LoadOptions, UnmatchedPolicy};
use crate::partition::PartitionOptions;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrepConfig {
    /// Archive fetching.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// File classification and train/val partitioning.
    #[serde(default)]
    pub partition: PartitionConfig,
    /// Batch loading.
    #[serde(default)]
    pub loader: LoaderConfig,
}

/// Archive fetching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Directory downloads are saved into.
    #[serde(default = "default_dest_dir")]
    pub dest_dir: PathBuf,
    /// Unpack each download as a zip archive.
    #[serde(default)]
    pub extract: bool,
    /// Directory archives are unpacked into.
    #[serde(default = "default_extract_dir")]
    pub extract_dir: PathBuf,
    /// Request timeout in seconds. Unset means no timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// User agent sent with every request.
    #[serde(default = "crate::fetch::default_user_agent")]
    pub user_agent: String,
    /// Stop at the first URL that fails instead of continuing.
    #[serde(default)]
    pub fail_fast: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            dest_dir: default_dest_dir(),
            extract: false,
            extract_dir: default_extract_dir(),
            timeout_secs: None,
            user_agent: crate::fetch::default_user_agent(),
            fail_fast: false,
        }
    }
}

fn default_dest_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_extract_dir() -> PathBuf {
    PathBuf::from(".")
}

impl FetchConfig {
    pub fn to_options(&self) -> FetchOptions {
        FetchOptions {
            dest_dir: self.dest_dir.clone(),
            extract: self.extract,
            extract_dir: self.extract_dir.clone(),
            timeout: self.timeout_secs.map(Duration::from_secs),
            user_agent: self.user_agent.clone(),
            policy: if self.fail_fast {
                FailurePolicy::AbortOnFirst
            } else {
                FailurePolicy::ContinueOnError
            },
        }
    }
}

/// Partitioning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Class names, in matching priority order.
    #[serde(default)]
    pub classes: Vec<String>,
    /// Root of the class tree. Defaults to the source directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_dir: Option<PathBuf>,
    /// Route files into `train/` and `val/`.
    #[serde(default)]
    pub split_train_val: bool,
    /// Probability that a matched file goes to `train/` (0.0-1.0, exclusive).
    #[serde(default = "default_train_ratio")]
    pub train_ratio: f64,
    /// Fixed seed for the train/val draw. Unset draws from system entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            classes: Vec::new(),
            save_dir: None,
            split_train_val: false,
            train_ratio: default_train_ratio(),
            seed: None,
        }
    }
}

fn default_train_ratio() -> f64 {
    0.7
}

impl PartitionConfig {
    pub fn to_options(&self) -> PartitionOptions {
        PartitionOptions {
            classes: self.classes.clone(),
            save_dir: self.save_dir.clone(),
            train_ratio: self.split_train_val.then_some(self.train_ratio),
            seed: self.seed,
        }
    }
}

/// Batch loading configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Target image height in pixels.
    #[serde(default = "default_side")]
    pub height: u32,
    /// Target image width in pixels.
    #[serde(default = "default_side")]
    pub width: u32,
    /// Emit `N x C x H x W` instead of `N x H x W x C`.
    #[serde(default)]
    pub channels_first: bool,
    /// Shuffle the batch before returning it.
    #[serde(default = "default_true")]
    pub shuffle: bool,
    /// Fixed shuffle seed. Unset draws from system entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// What to do with a file no label matches.
    #[serde(default)]
    pub unmatched: UnmatchedPolicy,
    /// Class labels, in matching priority order. Empty loads without labels.
    #[serde(default)]
    pub labels: ClassLabelMap,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            height: default_side(),
            width: default_side(),
            channels_first: false,
            shuffle: true,
            seed: None,
            unmatched: UnmatchedPolicy::default(),
            labels: ClassLabelMap::new(),
        }
    }
}

fn default_side() -> u32 {
    32
}

fn default_true() -> bool {
    true
}

impl LoaderConfig {
    pub fn to_options(&self) -> LoadOptions {
        LoadOptions {
            height: self.height,
            width: self.width,
            channel_order: if self.channels_first {
                ChannelOrder::First
            } else {
                ChannelOrder::Last
            },
            labels: (!self.labels.is_empty()).then(|| self.labels.clone()),
            shuffle: self.shuffle,
            seed: self.seed,
            unmatched: self.unmatched,
            verbose: false,
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `IMGPREP_`)
/// 3. Workspace-local config (`.imgprep/config.toml`)
/// 4. User config (`~/.config/imgprep/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&PrepConfig>,
) -> Result<PrepConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(PrepConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // IMGPREP_FETCH__DEST_DIR, IMGPREP_LOADER__HEIGHT, etc.
    figment = figment.merge(Env::prefixed("IMGPREP_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Load configuration from a single explicit TOML file layered over the defaults.
pub fn load_config_file(path: &Path) -> Result<PrepConfig, Box<figment::Error>> {
    Figment::from(Serialized::defaults(PrepConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("IMGPREP_").split("__"))
        .extract()
        .map_err(Box::new)
}

/// `<workspace>/.imgprep/config.toml`.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".imgprep").join("config.toml")
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "imgprep", "imgprep")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
