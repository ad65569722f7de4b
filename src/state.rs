use std::path::PathBuf;
use std::time::Instant;

use crate::progress::{percent_complete, speed_mibps, ProgressEvent};

/// Bookkeeping for one transfer. Owned by its worker and never shared.
#[derive(Debug, Clone)]
pub struct TransferState {
    pub url: String,
    pub destination: PathBuf,
    pub total_bytes: Option<u64>,
    bytes_written: u64,
    started_at: Instant,
}

impl TransferState {
    pub fn new(url: String, destination: PathBuf, total_bytes: Option<u64>) -> Self {
        Self::started_at(url, destination, total_bytes, Instant::now())
    }

    pub fn started_at(url: String, destination: PathBuf, total_bytes: Option<u64>, started_at: Instant) -> Self {
        Self {
            url,
            destination,
            total_bytes,
            bytes_written: 0,
            started_at,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn record_chunk(&mut self, len: usize) {
        self.bytes_written += len as u64;
    }

    /// True when a declared size exists and the body stopped short of it.
    pub fn is_short(&self) -> bool {
        matches!(self.total_bytes, Some(total) if self.bytes_written < total)
    }

    pub fn snapshot_at(&self, now: Instant) -> ProgressEvent {
        ProgressEvent {
            percent: percent_complete(self.bytes_written, self.total_bytes),
            speed_mibps: speed_mibps(self.bytes_written, now.saturating_duration_since(self.started_at)),
            bytes_written: self.bytes_written,
            total_bytes: self.total_bytes,
        }
    }

    pub fn snapshot(&self) -> ProgressEvent {
        self.snapshot_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn state(total: Option<u64>) -> (TransferState, Instant) {
        let start = Instant::now();
        let state = TransferState::started_at(
            "https://example.test/file.bin".to_string(),
            PathBuf::from("/tmp/out/file.bin"),
            total,
            start,
        );
        (state, start)
    }

    #[test]
    fn snapshot_tracks_written_bytes() {
        let (mut state, start) = state(Some(2048));
        state.record_chunk(1024);
        let event = state.snapshot_at(start + Duration::from_secs(1));
        assert_eq!(event.percent, Some(50));
        assert_eq!(event.bytes_written, 1024);
        assert_eq!(event.speed_mibps, 1024.0 / (1024.0 * 1024.0));

        state.record_chunk(1024);
        assert_eq!(state.snapshot_at(start).percent, Some(100));
        assert_eq!(state.snapshot_at(start).speed_mibps, 0.0);
        assert!(!state.is_short());
    }

    #[test]
    fn unknown_size_is_never_short() {
        let (mut state, _) = state(None);
        state.record_chunk(10);
        assert!(!state.is_short());
        assert_eq!(state.snapshot().percent, None);
    }

    #[test]
    fn short_body_is_detected() {
        let (mut state, _) = state(Some(1000));
        state.record_chunk(400);
        assert!(state.is_short());
    }
}
