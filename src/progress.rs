//! Ordered delivery of progress events from a transfer to its observer.
//!
//! The channel is unbounded so the writing side never waits on a slow
//! consumer. The terminal [`Outcome`] can be sent only once: sending it
//! consumes the [`ProgressSender`].

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::ErrorKind;

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// `None` while the total size is unknown or zero.
    pub percent: Option<u8>,
    pub speed_mibps: f64,
    pub bytes_written: u64,
    pub total_bytes: Option<u64>,
}

/// Terminal signal of a transfer.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Done { path: PathBuf, bytes_written: u64 },
    Failed { kind: ErrorKind, reason: String },
    Cancelled { bytes_written: u64 },
}

impl Outcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransferEvent {
    Progress(ProgressEvent),
    Finished(Outcome),
}

pub fn percent_complete(bytes_written: u64, total_bytes: Option<u64>) -> Option<u8> {
    match total_bytes {
        Some(total) if total > 0 => {
            let percent = (bytes_written as u128 * 100 / total as u128).min(100);
            Some(percent as u8)
        }
        _ => None,
    }
}

/// Average throughput since the transfer started, in MiB/s.
pub fn speed_mibps(bytes_written: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        bytes_written as f64 / (MIB * secs)
    } else {
        0.0
    }
}

pub fn channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSender { tx }, ProgressReceiver { rx, finished: false })
}

#[derive(Debug)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<TransferEvent>,
}

impl ProgressSender {
    /// A vanished receiver is not the transfer's problem, so send errors are ignored.
    pub fn progress(&self, event: ProgressEvent) {
        let _ = self.tx.send(TransferEvent::Progress(event));
    }

    pub fn finish(self, outcome: Outcome) {
        let _ = self.tx.send(TransferEvent::Finished(outcome));
    }
}

#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::UnboundedReceiver<TransferEvent>,
    finished: bool,
}

impl ProgressReceiver {
    /// Next event in emission order; `None` after the terminal event.
    ///
    /// If the sender is dropped without finishing (the worker task died),
    /// a `Failed` outcome is produced in its place.
    pub async fn recv(&mut self) -> Option<TransferEvent> {
        if self.finished {
            return None;
        }
        let event = match self.rx.recv().await {
            Some(event) => event,
            None => TransferEvent::Finished(Outcome::Failed {
                kind: ErrorKind::NetworkFailure,
                reason: "transfer ended without reporting a result".to_string(),
            }),
        };
        if matches!(event, TransferEvent::Finished(_)) {
            self.finished = true;
        }
        Some(event)
    }
}
