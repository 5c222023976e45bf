//! Contract with the training side.
//!
//! imgprep stops at an [`ImageBatch`]. A trainer consumes the batch (raw `u8` pixels plus
//! labels) and hands back a predictor; the predictor classifies one image at a time from
//! the tensor [`preprocess_image`] produces. Nothing in this crate implements either trait.

use crate::error::PrepError;
use crate::loader::{ChannelOrder, ImageBatch, load_image};
use ndarray::{Array4, ArrayView4, Axis};
use std::path::Path;

/// Fits a classifier to a labeled batch.
pub trait Trainer {
    type Model: Predictor;

    fn fit(&mut self, batch: &ImageBatch) -> Result<Self::Model, PrepError>;
}

/// Predicts a class index for a single preprocessed image.
pub trait Predictor {
    /// `image` is `1 x H x W x 3` (or `1 x 3 x H x W`) with values in `[0, 1]`.
    fn predict(&self, image: &Array4<f32>) -> Result<usize, PrepError>;
}

/// Scale raw pixels to `[0, 1]`.
pub fn rescale(images: ArrayView4<'_, u8>) -> Array4<f32> {
    images.mapv(|v| f32::from(v) / 255.0)
}

/// Decode, stretch, and rescale a single image, adding a leading batch axis of 1.
pub fn preprocess_image(
    path: &Path,
    height: u32,
    width: u32,
    order: ChannelOrder,
) -> Result<Array4<f32>, PrepError> {
    let pixels = load_image(path, height, width, order)?.insert_axis(Axis(0));
    Ok(rescale(pixels.view()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::ClassLabelMap;
    use crate::loader::{LoadOptions, load_batch};
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    /// Predicts the class whose color channel dominates the first pixel.
    struct ColorPredictor;

    impl Predictor for ColorPredictor {
        fn predict(&self, image: &Array4<f32>) -> Result<usize, PrepError> {
            let (red, blue) = (image[[0, 0, 0, 0]], image[[0, 0, 0, 2]]);
            Ok(if red >= blue { 0 } else { 1 })
        }
    }

    struct ColorTrainer {
        seen: usize,
    }

    impl Trainer for ColorTrainer {
        type Model = ColorPredictor;

        fn fit(&mut self, batch: &ImageBatch) -> Result<ColorPredictor, PrepError> {
            let labels = batch
                .labels
                .as_ref()
                .ok_or_else(|| PrepError::invalid_input("training needs labels"))?;
            self.seen += labels.len();
            Ok(ColorPredictor)
        }
    }

    #[test]
    fn test_rescale_range() {
        let raw = Array4::from_shape_vec((1, 1, 1, 3), vec![0u8, 51, 255]).unwrap();
        let scaled = rescale(raw.view());
        assert_eq!(scaled[[0, 0, 0, 0]], 0.0);
        assert!((scaled[[0, 0, 0, 1]] - 0.2).abs() < 1e-6);
        assert_eq!(scaled[[0, 0, 0, 2]], 1.0);
    }

    #[test]
    fn test_preprocess_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cat.png");
        RgbImage::from_pixel(9, 7, Rgb([0, 0, 255])).save(&path).unwrap();

        let tensor = preprocess_image(&path, 4, 5, ChannelOrder::Last).unwrap();
        assert_eq!(tensor.shape(), &[1, 4, 5, 3]);
        assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));

        let tensor = preprocess_image(&path, 4, 5, ChannelOrder::First).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 4, 5]);
    }

    #[test]
    fn test_trainer_rejects_unlabeled_batch() {
        let dir = TempDir::new().unwrap();
        RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]))
            .save(dir.path().join("dog.1.png"))
            .unwrap();
        let batch = load_batch(dir.path(), &LoadOptions::new(4, 4)).unwrap();

        let mut trainer = ColorTrainer { seen: 0 };
        let err = trainer.fit(&batch).err().unwrap();
        assert!(matches!(err, PrepError::InvalidInput(_)));
        assert_eq!(trainer.seen, 0);
    }

    #[test]
    fn test_trainer_round_trip() {
        let dir = TempDir::new().unwrap();
        RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]))
            .save(dir.path().join("dog.1.png"))
            .unwrap();
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 255]))
            .save(dir.path().join("cat.1.png"))
            .unwrap();
        let labels = ClassLabelMap::from_names(["dog", "cat"]).unwrap();
        let batch = load_batch(dir.path(), &LoadOptions::new(4, 4).labels(labels.clone())).unwrap();

        let mut trainer = ColorTrainer { seen: 0 };
        let model = trainer.fit(&batch).unwrap();
        assert_eq!(trainer.seen, 2);

        let cat = preprocess_image(&dir.path().join("cat.1.png"), 4, 4, ChannelOrder::Last).unwrap();
        let predicted = model.predict(&cat).unwrap();
        assert_eq!(labels.name_of(predicted), Some("cat"));
    }
}
