//! Archive fetching. Downloads remote files and optionally unpacks zip archives.
//!
//! Every URL is handled independently. A failure while resolving, downloading, or extracting
//! one URL is recorded in the [`FetchReport`] and, under the default
//! [`FailurePolicy::ContinueOnError`], the remaining URLs are still processed.

pub mod duration;
pub mod extract;
pub mod progress;

pub use duration::format_duration;
pub use extract::extract_zip;

use crate::error::PrepError;
use progress::DownloadProgress;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_LENGTH;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const CHUNK_SIZE: usize = 64 * 1024;

/// What to do with the rest of the list once a URL fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    ContinueOnError,
    AbortOnFirst,
}

/// Where in the per-URL sequence an error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStage {
    Resolve,
    SizeQuery,
    Download,
    Extract,
}

impl std::fmt::Display for FetchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchStage::Resolve => write!(f, "resolve"),
            FetchStage::SizeQuery => write!(f, "size_query"),
            FetchStage::Download => write!(f, "download"),
            FetchStage::Extract => write!(f, "extract"),
        }
    }
}

/// A URL and the local file it is saved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteResource {
    pub url: String,
    pub file_name: String,
    /// `Content-Length` reported by the server, when it answered the size query.
    pub expected_size: Option<u64>,
    pub save_path: PathBuf,
}

impl RemoteResource {
    pub fn resolve(url: &str, dest_dir: &Path) -> Result<Self, PrepError> {
        let file_name = file_name_from_url(url)?;
        Ok(Self {
            url: url.to_string(),
            save_path: dest_dir.join(&file_name),
            file_name,
            expected_size: None,
        })
    }
}

/// Last segment of the URL path. Query string and fragment never contribute.
pub fn file_name_from_url(url: &str) -> Result<String, PrepError> {
    let parsed = Url::parse(url)
        .map_err(|e| PrepError::invalid_input(format!("invalid URL '{url}': {e}")))?;
    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| PrepError::invalid_input(format!("URL '{url}' has no file name")))
}

/// Options for a [`Fetcher`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub dest_dir: PathBuf,
    pub extract: bool,
    /// Archives are unpacked here, not into `dest_dir`. Defaults to the working directory.
    pub extract_dir: PathBuf,
    /// `None` means no request timeout.
    pub timeout: Option<Duration>,
    pub user_agent: String,
    pub policy: FailurePolicy,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            dest_dir: PathBuf::from("."),
            extract: false,
            extract_dir: PathBuf::from("."),
            timeout: None,
            user_agent: default_user_agent(),
            policy: FailurePolicy::default(),
        }
    }
}

pub(crate) fn default_user_agent() -> String {
    concat!("imgprep/", env!("CARGO_PKG_VERSION")).to_string()
}

impl FetchOptions {
    pub fn new(dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
            ..Self::default()
        }
    }

    pub fn extract(mut self, extract: bool) -> Self {
        self.extract = extract;
        self
    }

    pub fn extract_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extract_dir = dir.into();
        self
    }

    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A URL that was downloaded (and extracted, if requested).
#[derive(Debug, Clone, Serialize)]
pub struct FetchedResource {
    pub resource: RemoteResource,
    pub bytes: u64,
    /// Number of files unpacked, when extraction ran.
    pub extracted: Option<usize>,
}

/// A URL that failed, and where.
#[derive(Debug)]
pub struct FetchFailure {
    pub url: String,
    pub stage: FetchStage,
    pub error: PrepError,
}

#[derive(Debug)]
pub enum FetchOutcome {
    Downloaded(FetchedResource),
    Failed(FetchFailure),
}

impl FetchOutcome {
    pub fn url(&self) -> &str {
        match self {
            FetchOutcome::Downloaded(done) => &done.resource.url,
            FetchOutcome::Failed(failure) => &failure.url,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }
}

/// Per-URL outcomes, in input order.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub outcomes: Vec<FetchOutcome>,
}

impl FetchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &FetchedResource> {
        self.outcomes.iter().filter_map(|o| match o {
            FetchOutcome::Downloaded(done) => Some(done),
            FetchOutcome::Failed(_) => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = &FetchFailure> {
        self.outcomes.iter().filter_map(|o| match o {
            FetchOutcome::Failed(failure) => Some(failure),
            FetchOutcome::Downloaded(_) => None,
        })
    }

    /// True when every URL was attempted and none failed.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| !o.is_failed())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Blocking downloader over a single HTTP client.
pub struct Fetcher {
    client: Client,
    options: FetchOptions,
}

impl Fetcher {
    pub fn new(options: FetchOptions) -> Result<Self, PrepError> {
        let client = Client::builder()
            .user_agent(options.user_agent.clone())
            .timeout(options.timeout)
            .build()?;
        Ok(Self { client, options })
    }

    /// Fetch every URL in order, collecting one outcome per attempted URL.
    pub fn fetch_all<S: AsRef<str>>(&self, urls: &[S]) -> FetchReport {
        let mut report = FetchReport::default();

        for (i, url) in urls.iter().enumerate() {
            let url = url.as_ref();
            let outcome = match self.fetch_one(url) {
                Ok(done) => FetchOutcome::Downloaded(done),
                Err(failure) => {
                    tracing::error!(
                        url = %failure.url,
                        stage = %failure.stage,
                        error = %failure.error,
                        "Fetch failed"
                    );
                    FetchOutcome::Failed(failure)
                }
            };

            let abort = outcome.is_failed() && self.options.policy == FailurePolicy::AbortOnFirst;
            report.outcomes.push(outcome);
            if abort {
                tracing::warn!(
                    skipped = urls.len() - i - 1,
                    "Stopping after first failure"
                );
                break;
            }
        }

        tracing::info!(
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            "Fetch finished"
        );
        report
    }

    /// Resolve, size-query, download, and optionally extract one URL.
    pub fn fetch_one(&self, url: &str) -> Result<FetchedResource, FetchFailure> {
        let fail = |stage: FetchStage| {
            move |error: PrepError| FetchFailure {
                url: url.to_string(),
                stage,
                error,
            }
        };

        let mut resource =
            RemoteResource::resolve(url, &self.options.dest_dir).map_err(fail(FetchStage::Resolve))?;

        match self.query_size(url) {
            Ok(size) => resource.expected_size = size,
            Err(e) => tracing::warn!(
                url,
                stage = %FetchStage::SizeQuery,
                error = %e,
                "Could not query file size"
            ),
        }

        tracing::info!(file = %resource.file_name, size = ?resource.expected_size, "Downloading");
        let bytes = self
            .download(&resource)
            .map_err(fail(FetchStage::Download))?;

        let extracted = if self.options.extract {
            tracing::info!(
                file = %resource.file_name,
                into = %self.options.extract_dir.display(),
                "Extracting"
            );
            let count = extract_zip(&resource.save_path, &self.options.extract_dir)
                .map_err(fail(FetchStage::Extract))?;
            Some(count)
        } else {
            None
        };

        Ok(FetchedResource {
            resource,
            bytes,
            extracted,
        })
    }

    /// `Content-Length` from a HEAD request. `Ok(None)` when the server omits it.
    pub fn query_size(&self, url: &str) -> Result<Option<u64>, PrepError> {
        let response = self.client.head(url).send()?.error_for_status()?;
        Ok(response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok()))
    }

    fn download(&self, resource: &RemoteResource) -> Result<u64, PrepError> {
        std::fs::create_dir_all(&self.options.dest_dir)?;
        let mut response = self
            .client
            .get(&resource.url)
            .send()?
            .error_for_status()?;

        let total = resource.expected_size.or_else(|| response.content_length());
        let mut progress = DownloadProgress::new(resource.file_name.clone(), total);
        let mut file = File::create(&resource.save_path)?;

        match copy_with_progress(&mut response, &mut file, &mut progress) {
            Ok(bytes) => {
                progress.finish();
                Ok(bytes)
            }
            Err(e) => {
                drop(file);
                // Partial downloads are not kept.
                let _ = std::fs::remove_file(&resource.save_path);
                Err(e.into())
            }
        }
    }
}

fn copy_with_progress<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    progress: &mut DownloadProgress,
) -> std::io::Result<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        progress.advance(n as u64);
    }
    writer.flush()?;
    Ok(progress.received())
}
