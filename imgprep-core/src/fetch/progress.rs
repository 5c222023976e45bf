//! Download progress accounting.

use super::duration::format_duration;
use std::time::{Duration, Instant};

pub const BYTES_PER_MB: u64 = 1024 * 1024;

const LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Tracks bytes received for one download and logs throughput and ETA.
#[derive(Debug)]
pub struct DownloadProgress {
    file_name: String,
    total: Option<u64>,
    received: u64,
    started: Instant,
    last_logged: Instant,
}

impl DownloadProgress {
    pub fn new(file_name: impl Into<String>, total: Option<u64>) -> Self {
        let now = Instant::now();
        Self {
            file_name: file_name.into(),
            total,
            received: 0,
            started: now,
            last_logged: now,
        }
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    /// Fraction complete in `[0, 1]`, when the total size is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some((self.received as f64 / total as f64).min(1.0)),
            None => None,
        }
    }

    /// Estimated seconds remaining at the average rate so far.
    pub fn eta_secs(&self, elapsed: Duration) -> Option<u64> {
        let total = self.total?;
        let secs = elapsed.as_secs_f64();
        if self.received == 0 || secs <= 0.0 {
            return None;
        }
        let rate = self.received as f64 / secs;
        let remaining = total.saturating_sub(self.received) as f64;
        Some((remaining / rate).ceil() as u64)
    }

    /// Record `n` more bytes, logging at most once per second.
    pub fn advance(&mut self, n: u64) {
        self.received += n;
        let now = Instant::now();
        if now.duration_since(self.last_logged) >= LOG_INTERVAL {
            self.last_logged = now;
            self.log(now.duration_since(self.started));
        }
    }

    /// Log the final line for this download.
    pub fn finish(&self) {
        let elapsed = self.started.elapsed();
        tracing::debug!(
            file = %self.file_name,
            mb = self.received as f64 / BYTES_PER_MB as f64,
            elapsed = %format_duration(elapsed.as_secs()),
            "Download finished"
        );
    }

    fn log(&self, elapsed: Duration) {
        let mb = self.received as f64 / BYTES_PER_MB as f64;
        match (self.fraction(), self.eta_secs(elapsed)) {
            (Some(fraction), Some(eta)) => tracing::debug!(
                file = %self.file_name,
                mb,
                percent = fraction * 100.0,
                eta = %format_duration(eta),
                "Downloading"
            ),
            _ => tracing::debug!(file = %self.file_name, mb, "Downloading"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_and_eta() {
        let mut progress = DownloadProgress::new("a.zip", Some(1000));
        assert_eq!(progress.fraction(), Some(0.0));
        assert_eq!(progress.eta_secs(Duration::from_secs(1)), None);

        progress.advance(250);
        assert_eq!(progress.received(), 250);
        assert_eq!(progress.fraction(), Some(0.25));
        // 250 B/s with 750 B left.
        assert_eq!(progress.eta_secs(Duration::from_secs(1)), Some(3));
    }

    #[test]
    fn test_unknown_total() {
        let mut progress = DownloadProgress::new("a.zip", None);
        progress.advance(10);
        assert_eq!(progress.fraction(), None);
        assert_eq!(progress.eta_secs(Duration::from_secs(1)), None);
    }

    #[test]
    fn test_empty_download_is_complete() {
        let progress = DownloadProgress::new("empty", Some(0));
        assert_eq!(progress.fraction(), Some(1.0));
    }
}
