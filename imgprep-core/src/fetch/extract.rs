//! Zip extraction for downloaded archives.

use crate::error::PrepError;
use std::fs::File;
use std::path::Path;

/// Extract every entry of the zip archive at `archive_path` into `output_dir`.
///
/// Entries whose path would land outside `output_dir` are skipped. Returns the number of
/// files written (directories are not counted).
pub fn extract_zip(archive_path: &Path, output_dir: &Path) -> Result<usize, PrepError> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    std::fs::create_dir_all(output_dir)?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(
                archive = %archive_path.display(),
                entry = entry.name(),
                "Skipping zip entry outside the extraction directory"
            );
            continue;
        };
        let out_path = output_dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out)?;
        extracted += 1;
    }

    tracing::debug!(
        archive = %archive_path.display(),
        output_dir = %output_dir.display(),
        extracted,
        "Archive extracted"
    );
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_extract_nested_entries() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("train.zip");
        write_zip(
            &archive,
            &[
                ("train/dog.1.jpg", b"woof"),
                ("train/cat.1.jpg", b"meow"),
            ],
        );

        let out = dir.path().join("out");
        let count = extract_zip(&archive, &out).unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            std::fs::read(out.join("train").join("dog.1.jpg")).unwrap(),
            b"woof"
        );
        assert_eq!(
            std::fs::read(out.join("train").join("cat.1.jpg")).unwrap(),
            b"meow"
        );
    }

    #[test]
    fn test_extract_skips_escaping_entries() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("evil.zip");
        write_zip(&archive, &[("../escaped.txt", b"x"), ("ok.txt", b"y")]);

        let out = dir.path().join("out");
        let count = extract_zip(&archive, &out).unwrap();
        assert_eq!(count, 1);
        assert!(out.join("ok.txt").exists());
        assert!(!dir.path().join("escaped.txt").exists());
    }

    #[test]
    fn test_extract_rejects_non_zip() {
        let dir = TempDir::new().unwrap();
        let bogus = dir.path().join("not-a-zip.zip");
        std::fs::write(&bogus, b"definitely not a zip").unwrap();

        let err = extract_zip(&bogus, dir.path()).unwrap_err();
        assert!(matches!(err, PrepError::Zip(_)));
    }
}
