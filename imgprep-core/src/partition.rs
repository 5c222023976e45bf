//! File classification and train/val partitioning.
//!
//! Sorts a flat directory of files into per-class subdirectories:
//!
//! ```text
//! save_dir/                    save_dir/
//!   dog/                         train/dog/  val/dog/
//!   cat/           or, split:    train/cat/  val/cat/
//! ```
//!
//! Files are matched against the class list with [`first_match`]; unmatched files stay where
//! they are. Moves are final: the original path no longer exists afterwards.

use crate::classes::{first_match, validate_class_names};
use crate::error::PrepError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Train/validation partition a file is routed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub const ALL: [Split; 2] = [Split::Train, Split::Val];

    pub fn dir_name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }
}

/// Options for [`subdivide`].
#[derive(Debug, Clone)]
pub struct PartitionOptions {
    /// Class names, in matching priority order.
    pub classes: Vec<String>,
    /// Root of the class tree; the source directory when `None`.
    pub save_dir: Option<PathBuf>,
    /// Train ratio in `(0, 1)`. `Some` enables the train/val split.
    pub train_ratio: Option<f64>,
    /// Seed for the train/val draw. `None` seeds from system entropy on every call.
    pub seed: Option<u64>,
}

impl PartitionOptions {
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
            save_dir: None,
            train_ratio: None,
            seed: None,
        }
    }

    pub fn save_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = Some(dir.into());
        self
    }

    pub fn split(mut self, train_ratio: f64) -> Self {
        self.train_ratio = Some(train_ratio);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<(), PrepError> {
        validate_class_names(&self.classes)?;
        if let Some(ratio) = self.train_ratio {
            if !(ratio > 0.0 && ratio < 1.0) {
                return Err(PrepError::invalid_input(format!(
                    "train ratio must be between 0 and 1, got {ratio}"
                )));
            }
        }
        Ok(())
    }
}

/// Where one file ended up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedFile {
    pub original: PathBuf,
    pub class: String,
    pub split: Option<Split>,
    pub destination: PathBuf,
}

impl ClassifiedFile {
    /// Directory relative to the tree root: `class` or `train/class`.
    pub fn target_subdir(&self) -> PathBuf {
        match self.split {
            Some(split) => Path::new(split.dir_name()).join(&self.class),
            None => PathBuf::from(&self.class),
        }
    }
}

/// Result of a [`subdivide`] run.
#[derive(Debug, Default, Serialize)]
pub struct PartitionReport {
    pub moved: Vec<ClassifiedFile>,
    /// Files no class matched, left in place.
    pub unmatched: Vec<PathBuf>,
}

impl PartitionReport {
    /// Number of files moved into `class`, optionally restricted to one split.
    pub fn count(&self, class: &str, split: Option<Split>) -> usize {
        self.moved
            .iter()
            .filter(|f| f.class == class && (split.is_none() || f.split == split))
            .count()
    }
}

/// Create `<root>/<class>` (or `<root>/{train,val}/<class>`) for every class.
///
/// Existing directories are left alone, so this is safe on a partially organized tree.
pub fn prepare_tree<S: AsRef<str>>(
    root: &Path,
    classes: &[S],
    split: bool,
) -> Result<Vec<PathBuf>, PrepError> {
    let mut dirs = Vec::new();
    for class in classes {
        let class = class.as_ref();
        if split {
            for part in Split::ALL {
                dirs.push(root.join(part.dir_name()).join(class));
            }
        } else {
            dirs.push(root.join(class));
        }
    }
    for dir in &dirs {
        std::fs::create_dir_all(dir)?;
    }
    Ok(dirs)
}

/// Move every matching file directly inside `source` into its class directory.
///
/// Entries are visited in directory-listing order, which the filesystem defines; sort the
/// input yourself if name ties must resolve deterministically. Subdirectories are skipped.
pub fn subdivide(source: &Path, options: &PartitionOptions) -> Result<PartitionReport, PrepError> {
    options.validate()?;
    if !source.is_dir() {
        return Err(PrepError::not_found(format!(
            "source directory {}",
            source.display()
        )));
    }

    let root = options.save_dir.as_deref().unwrap_or(source);
    prepare_tree(root, &options.classes, options.train_ratio.is_some())?;

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    // Snapshot the listing before anything moves.
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(source)? {
        entries.push(entry?.path());
    }

    let mut report = PartitionReport::default();
    for path in entries {
        if path.is_dir() {
            continue;
        }
        let Some(file_name) = path.file_name().map(|n| n.to_os_string()) else {
            continue;
        };
        let name = file_name.to_string_lossy();

        let Some(class) = first_match(&name, options.classes.iter().map(String::as_str)) else {
            tracing::debug!(file = %name, "No class matched; leaving in place");
            report.unmatched.push(path);
            continue;
        };

        let split = options.train_ratio.map(|ratio| {
            if rng.gen_bool(ratio) {
                Split::Train
            } else {
                Split::Val
            }
        });

        let mut classified = ClassifiedFile {
            original: path.clone(),
            class: class.to_string(),
            split,
            destination: PathBuf::new(),
        };
        let destination = root.join(classified.target_subdir()).join(&file_name);
        if destination.exists() {
            return Err(PrepError::already_exists(destination.display().to_string()));
        }

        tracing::debug!(file = %name, class, split = ?split, "Moving file");
        move_file(&path, &destination)?;
        classified.destination = destination;
        report.moved.push(classified);
    }

    tracing::info!(
        source = %source.display(),
        moved = report.moved.len(),
        unmatched = report.unmatched.len(),
        "Partition finished"
    );
    Ok(report)
}

/// Rename, falling back to copy + remove when the target is on another filesystem.
fn move_file(from: &Path, to: &Path) -> Result<(), PrepError> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
