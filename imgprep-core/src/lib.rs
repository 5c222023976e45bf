//! # imgprep-core
//!
//! Prepares an image classification dataset for training:
//!
//! 1. [`fetch`] downloads archives and optionally unpacks them.
//! 2. [`partition`] sorts a flat directory into per-class (and train/val) folders.
//! 3. [`loader`] reads a folder of images into one fixed-size `u8` tensor with labels.
//!
//! Training itself happens elsewhere; [`collab`] describes the hand-off.

pub mod classes;
pub mod collab;
pub mod config;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod partition;

pub use classes::{ClassLabel, ClassLabelMap, first_match};
pub use config::{PrepConfig, load_config};
pub use error::PrepError;
pub use fetch::{FailurePolicy, FetchOptions, FetchReport, Fetcher, format_duration};
pub use loader::{ChannelOrder, ImageBatch, LoadOptions, UnmatchedPolicy, load_batch, one_hot};
pub use partition::{PartitionOptions, PartitionReport, Split, subdivide};
