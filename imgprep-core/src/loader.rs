//! Batch loading: turn a flat directory of images into one stacked tensor.
//!
//! Every image is stretched to the same `(height, width)`, converted to RGB, and stacked
//! along a new leading axis. Pixel values stay raw `u8` in `[0, 255]`; rescaling is left to
//! the consumer (see [`crate::collab::rescale`]).

use crate::classes::ClassLabelMap;
use crate::error::PrepError;
use image::imageops::FilterType;
use ndarray::{Array2, Array3, Array4, ArrayView3, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Channels per pixel. Images are always converted to RGB.
pub const CHANNELS: usize = 3;

/// Memory layout of each image in the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
    /// `H x W x C`
    #[default]
    Last,
    /// `C x H x W`
    First,
}

/// Handling of a file no class label matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedPolicy {
    /// Fail the whole load with [`PrepError::Unlabeled`].
    #[default]
    Reject,
    /// Leave the file out of the batch.
    Skip,
}

/// Options for [`load_batch`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub height: u32,
    pub width: u32,
    pub channel_order: ChannelOrder,
    /// Produce labels using this map. `None` loads images only.
    pub labels: Option<ClassLabelMap>,
    pub shuffle: bool,
    /// Shuffle seed. `None` seeds from system entropy.
    pub seed: Option<u64>,
    pub unmatched: UnmatchedPolicy,
    /// Log every file at `info` instead of `debug`.
    pub verbose: bool,
}

impl LoadOptions {
    pub fn new(height: u32, width: u32) -> Self {
        Self {
            height,
            width,
            channel_order: ChannelOrder::Last,
            labels: None,
            shuffle: true,
            seed: None,
            unmatched: UnmatchedPolicy::Reject,
            verbose: false,
        }
    }

    pub fn channel_order(mut self, order: ChannelOrder) -> Self {
        self.channel_order = order;
        self
    }

    pub fn labels(mut self, labels: ClassLabelMap) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn unmatched(mut self, policy: UnmatchedPolicy) -> Self {
        self.unmatched = policy;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn validate(&self) -> Result<(), PrepError> {
        if self.height == 0 || self.width == 0 {
            return Err(PrepError::invalid_input(format!(
                "target size must be positive, got {}x{}",
                self.height, self.width
            )));
        }
        if self.labels.as_ref().is_some_and(ClassLabelMap::is_empty) {
            return Err(PrepError::invalid_input("label map is empty"));
        }
        Ok(())
    }
}

/// Images stacked into one tensor, with optional index-aligned labels.
#[derive(Debug, Clone)]
pub struct ImageBatch {
    /// `N x H x W x 3` or `N x 3 x H x W`, depending on `channel_order`.
    pub images: Array4<u8>,
    pub labels: Option<Vec<usize>>,
    pub channel_order: ChannelOrder,
    /// Source file of each image.
    pub paths: Vec<PathBuf>,
}

impl ImageBatch {
    pub fn len(&self) -> usize {
        self.images.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(height, width)` of every image.
    pub fn spatial_size(&self) -> (usize, usize) {
        let shape = self.images.shape();
        match self.channel_order {
            ChannelOrder::Last => (shape[1], shape[2]),
            ChannelOrder::First => (shape[2], shape[3]),
        }
    }

    pub fn image(&self, index: usize) -> ArrayView3<'_, u8> {
        self.images.index_axis(Axis(0), index)
    }

    /// Images per label, when labels were loaded.
    pub fn label_counts(&self) -> Option<BTreeMap<usize, usize>> {
        self.labels.as_ref().map(|labels| {
            let mut counts = BTreeMap::new();
            for &label in labels {
                *counts.entry(label).or_insert(0) += 1;
            }
            counts
        })
    }
}

/// Decode one image, stretch it to `height x width`, and return its RGB pixels.
pub fn load_image(
    path: &Path,
    height: u32,
    width: u32,
    order: ChannelOrder,
) -> Result<Array3<u8>, PrepError> {
    let img = image::open(path).map_err(|e| PrepError::image(path, e))?;
    let rgb = img
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgb8();
    let hwc = Array3::from_shape_vec(
        (height as usize, width as usize, CHANNELS),
        rgb.into_raw(),
    )?;
    Ok(match order {
        ChannelOrder::Last => hwc,
        ChannelOrder::First => hwc.permuted_axes([2, 0, 1]).as_standard_layout().into_owned(),
    })
}

/// Load every file directly inside `dir` into one [`ImageBatch`].
///
/// Files are read in file-name order so that a fixed seed gives a reproducible batch.
/// Subdirectories are skipped; any other file that fails to decode aborts the load.
pub fn load_batch(dir: &Path, options: &LoadOptions) -> Result<ImageBatch, PrepError> {
    options.validate()?;
    if !dir.is_dir() {
        return Err(PrepError::not_found(format!("image directory {}", dir.display())));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            files.push(path);
        }
    }
    files.sort();

    let mut images = Vec::with_capacity(files.len());
    let mut labels = Vec::new();
    let mut paths = Vec::with_capacity(files.len());

    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if options.verbose {
            tracing::info!(file = %name, "Loading");
        } else {
            tracing::debug!(file = %name, "Loading");
        }

        if let Some(map) = &options.labels {
            match map.label_for(&name) {
                Some(label) => labels.push(label),
                None => match options.unmatched {
                    UnmatchedPolicy::Reject => return Err(PrepError::Unlabeled(path)),
                    UnmatchedPolicy::Skip => {
                        tracing::warn!(file = %name, "No class label matched; skipping");
                        continue;
                    }
                },
            }
        }

        images.push(load_image(
            &path,
            options.height,
            options.width,
            options.channel_order,
        )?);
        paths.push(path);
    }

    if images.is_empty() {
        return Err(PrepError::EmptyBatch(dir.to_path_buf()));
    }

    let views: Vec<ArrayView3<'_, u8>> = images.iter().map(|img| img.view()).collect();
    let mut batch = ImageBatch {
        images: ndarray::stack(Axis(0), &views)?,
        labels: options.labels.is_some().then_some(labels),
        channel_order: options.channel_order,
        paths,
    };

    if options.shuffle {
        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        shuffle_batch(&mut batch, &mut rng);
    }

    tracing::info!(
        dir = %dir.display(),
        images = batch.len(),
        shape = ?batch.images.shape(),
        "Batch loaded"
    );
    Ok(batch)
}

/// Apply one random permutation to images, labels, and paths together.
pub fn shuffle_batch<R: rand::Rng + ?Sized>(batch: &mut ImageBatch, rng: &mut R) {
    let mut order: Vec<usize> = (0..batch.len()).collect();
    order.shuffle(rng);

    batch.images = batch.images.select(Axis(0), &order);
    batch.labels = batch
        .labels
        .take()
        .map(|labels| order.iter().map(|&i| labels[i]).collect());
    let paths = std::mem::take(&mut batch.paths);
    batch.paths = order.iter().map(|&i| paths[i].clone()).collect();
}

/// One-hot rows for `labels`.
///
/// `num_classes` defaults to `max(labels) + 1`. A label outside `0..num_classes` is an error.
pub fn one_hot(labels: &[usize], num_classes: Option<usize>) -> Result<Array2<f32>, PrepError> {
    let num_classes = match num_classes {
        Some(n) => n,
        None => {
            let max = labels.iter().max().ok_or_else(|| {
                PrepError::invalid_input("cannot infer the class count from an empty label list")
            })?;
            max.checked_add(1).ok_or_else(|| {
                PrepError::invalid_input(format!("label {max} is too large to one-hot encode"))
            })?
        }
    };

    let mut encoded = Array2::zeros((labels.len(), num_classes));
    for (row, &label) in labels.iter().enumerate() {
        if label >= num_classes {
            return Err(PrepError::invalid_input(format!(
                "label {label} at position {row} is out of range for {num_classes} classes"
            )));
        }
        encoded[[row, label]] = 1.0;
    }
    Ok(encoded)
}
