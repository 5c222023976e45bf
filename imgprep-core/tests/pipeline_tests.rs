//! End-to-end: fetch an archive of images, load it as a batch, then partition it.

mod common;

use common::{FixtureServer, png_bytes, zip_bytes};
use imgprep_core::fetch::FetchOptions;
use imgprep_core::partition::Split;
use imgprep_core::{
    ChannelOrder, ClassLabelMap, Fetcher, LoadOptions, PartitionOptions, load_batch, one_hot,
    subdivide,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const RED: [u8; 3] = [255, 0, 0];
const BLUE: [u8; 3] = [0, 0, 255];

fn dataset_archive() -> Vec<u8> {
    let mut entries = Vec::new();
    for i in 0..6 {
        entries.push((format!("train/dog.{i}.png"), png_bytes(12, 9, RED)));
        entries.push((format!("train/cat.{i}.png"), png_bytes(7, 15, BLUE)));
    }
    let refs: Vec<(&str, Vec<u8>)> = entries
        .iter()
        .map(|(name, data)| (name.as_str(), data.clone()))
        .collect();
    zip_bytes(&refs)
}

fn fetch_dataset(root: &std::path::Path) -> std::path::PathBuf {
    let server = FixtureServer::start(vec![("/datasets/train.zip", dataset_archive())]);
    let options = FetchOptions::new(root.join("downloads"))
        .extract(true)
        .extract_to(root.join("data"));
    let report = Fetcher::new(options)
        .unwrap()
        .fetch_all(&[server.url("/datasets/train.zip?dl=1")]);
    assert!(report.is_complete());
    root.join("data").join("train")
}

#[test]
fn test_fetch_then_load_batch() {
    let dir = TempDir::new().unwrap();
    let train = fetch_dataset(dir.path());

    let labels = ClassLabelMap::from_pairs([("dog", 0), ("cat", 1)]).unwrap();
    let options = LoadOptions::new(8, 8).labels(labels).seed(42);
    let batch = load_batch(&train, &options).unwrap();

    assert_eq!(batch.images.shape(), &[12, 8, 8, 3]);
    let batch_labels = batch.labels.clone().unwrap();
    assert_eq!(batch_labels.len(), 12);

    // Labels stay aligned with pixels through the shuffle.
    for (i, &label) in batch_labels.iter().enumerate() {
        let pixel = batch.image(i)[[0, 0, 0]];
        assert_eq!(pixel, if label == 0 { 255 } else { 0 });
    }

    let counts = batch.label_counts().unwrap();
    assert_eq!(counts.get(&0), Some(&6));
    assert_eq!(counts.get(&1), Some(&6));

    let encoded = one_hot(&batch_labels, None).unwrap();
    assert_eq!(encoded.shape(), &[12, 2]);
}

#[test]
fn test_fetch_then_load_channels_first() {
    let dir = TempDir::new().unwrap();
    let train = fetch_dataset(dir.path());

    let options = LoadOptions::new(5, 6)
        .channel_order(ChannelOrder::First)
        .shuffle(false);
    let batch = load_batch(&train, &options).unwrap();
    assert_eq!(batch.images.shape(), &[12, 3, 5, 6]);
    assert!(batch.labels.is_none());
}

#[test]
fn test_fetch_then_subdivide_with_split() {
    let dir = TempDir::new().unwrap();
    let train = fetch_dataset(dir.path());
    let organized = dir.path().join("organized");

    let options = PartitionOptions::new(["dog", "cat"])
        .save_to(&organized)
        .split(0.5)
        .seed(7);
    let report = subdivide(&train, &options).unwrap();

    assert_eq!(report.moved.len(), 12);
    assert!(report.unmatched.is_empty());
    for class in ["dog", "cat"] {
        let train_n = report.count(class, Some(Split::Train));
        let val_n = report.count(class, Some(Split::Val));
        assert_eq!(train_n + val_n, 6);
        let on_disk = std::fs::read_dir(organized.join("train").join(class))
            .unwrap()
            .count()
            + std::fs::read_dir(organized.join("val").join(class))
                .unwrap()
                .count();
        assert_eq!(on_disk, 6);
    }
    // Source is emptied of matched files.
    assert_eq!(std::fs::read_dir(&train).unwrap().count(), 0);

    // Each split can be loaded on its own afterwards.
    let labels = ClassLabelMap::from_names(["dog", "cat"]).unwrap();
    let train_dog = organized.join("train").join("dog");
    if report.count("dog", Some(Split::Train)) > 0 {
        let batch = load_batch(&train_dog, &LoadOptions::new(4, 4).labels(labels)).unwrap();
        assert!(batch.labels.unwrap().iter().all(|&l| l == 0));
    }
}
