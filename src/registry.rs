//! Spawns one transfer task per request and tracks every started download.
//!
//! Each download gets its own progress channel. A forwarding task drains it
//! and hands events to the observer together with the handle that produced
//! them, so concurrent downloads never share a stream.

use chrono::{DateTime, Local};
use reqwest::Client;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{CollisionPolicy, EngineConfig};
use crate::downloader::TransferWorker;
use crate::error::{DownloadError, ErrorKind};
use crate::progress::{self, Outcome, ProgressEvent, TransferEvent};
use crate::types::{DownloadId, DownloadRequest, DownloadStatus};
use crate::utils::get_unique_filepath;

/// Receives the events of every download it was registered for.
///
/// Called from the download's forwarding task; implementations must not block.
pub trait ProgressObserver: Send + Sync + 'static {
    fn on_started(&self, _download: &DownloadHandle) {}

    fn on_progress(&self, download: &DownloadHandle, event: &ProgressEvent);

    fn on_finished(&self, download: &DownloadHandle, outcome: &Outcome);
}

/// Forwards every event, tagged with its download, into a channel.
impl ProgressObserver for mpsc::UnboundedSender<(DownloadId, TransferEvent)> {
    fn on_progress(&self, download: &DownloadHandle, event: &ProgressEvent) {
        let _ = self.send((download.id, TransferEvent::Progress(event.clone())));
    }

    fn on_finished(&self, download: &DownloadHandle, outcome: &Outcome) {
        let _ = self.send((download.id, TransferEvent::Finished(outcome.clone())));
    }
}

#[derive(Clone, Debug)]
pub struct DownloadHandle {
    pub id: DownloadId,
    pub url: String,
    /// Last segment of the URL path.
    pub name: String,
    pub destination: PathBuf,
    pub started_at: DateTime<Local>,
    cancel: CancellationToken,
    status: watch::Receiver<DownloadStatus>,
}

impl DownloadHandle {
    pub fn status(&self) -> DownloadStatus {
        self.status.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        matches!(*self.status.borrow(), DownloadStatus::Finished(_))
    }

    /// Asks the worker to stop at its next chunk boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(&self) -> Outcome {
        let mut status = self.status.clone();
        loop {
            let finished = match &*status.borrow_and_update() {
                DownloadStatus::Finished(outcome) => Some(outcome.clone()),
                _ => None,
            };
            if let Some(outcome) = finished {
                return outcome;
            }
            if status.changed().await.is_err() {
                return match self.status() {
                    DownloadStatus::Finished(outcome) => outcome,
                    _ => Outcome::Failed {
                        kind: ErrorKind::NetworkFailure,
                        reason: "download task stopped without a result".to_string(),
                    },
                };
            }
        }
    }
}

pub struct DownloadRegistry {
    client: Client,
    config: Arc<EngineConfig>,
    limiter: Option<Arc<Semaphore>>,
    downloads: Mutex<Vec<DownloadHandle>>,
}

impl DownloadRegistry {
    pub fn new(config: EngineConfig) -> Result<Self, DownloadError> {
        let client = config.build_client()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: EngineConfig) -> Self {
        // A zero cap is treated as no cap rather than a registry that never runs
        let limiter = config
            .max_concurrent
            .filter(|n| *n > 0)
            .map(|n| Arc::new(Semaphore::new(n)));
        Self {
            client,
            config: Arc::new(config),
            limiter,
            downloads: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers the download and spawns its worker, returning without
    /// waiting for any network or file I/O. Must be called inside a Tokio
    /// runtime.
    ///
    /// Only request validation fails here; transfer faults are reported to
    /// the observer as a `Failed` outcome.
    pub fn start(
        &self,
        request: DownloadRequest,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<DownloadHandle, DownloadError> {
        let name = request.filename()?;
        let requested = request.directory.join(&name);
        let (status_tx, status_rx) = watch::channel(DownloadStatus::Queued);
        let cancel = CancellationToken::new();

        let handle = {
            let mut downloads = self.lock();
            let taken: HashSet<PathBuf> = downloads
                .iter()
                .filter(|h| !h.is_finished())
                .map(|h| h.destination.clone())
                .collect();

            let destination = match self.config.collision {
                CollisionPolicy::Reject if taken.contains(&requested) => {
                    return Err(DownloadError::DuplicateDestination(requested));
                }
                CollisionPolicy::Rename => get_unique_filepath(&requested, &taken),
                CollisionPolicy::Overwrite | CollisionPolicy::Reject => requested,
            };

            let handle = DownloadHandle {
                id: DownloadId::new(),
                url: request.url.clone(),
                name,
                destination,
                started_at: Local::now(),
                cancel: cancel.clone(),
                status: status_rx,
            };
            downloads.push(handle.clone());
            handle
        };

        info!(id = %handle.id, url = %handle.url, destination = ?handle.destination, "Download registered");

        let (events, mut receiver) = progress::channel();
        let status_tx = Arc::new(status_tx);

        let worker = TransferWorker::new(
            self.client.clone(),
            self.config.clone(),
            handle.url.clone(),
            handle.destination.clone(),
            cancel.clone(),
        );
        let limiter = self.limiter.clone();
        let worker_status = status_tx.clone();
        tokio::spawn(async move {
            let _permit = match limiter {
                Some(semaphore) => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        events.finish(Outcome::Cancelled { bytes_written: 0 });
                        return;
                    }
                    permit = semaphore.acquire_owned() => permit.ok(),
                },
                None => None,
            };
            worker_status.send_replace(DownloadStatus::Running);
            worker.run(events).await;
        });

        let download = handle.clone();
        tokio::spawn(async move {
            observer.on_started(&download);
            while let Some(event) = receiver.recv().await {
                match event {
                    TransferEvent::Progress(progress) => observer.on_progress(&download, &progress),
                    TransferEvent::Finished(outcome) => {
                        debug!(id = %download.id, ?outcome, "Download finished");
                        status_tx.send_replace(DownloadStatus::Finished(outcome.clone()));
                        observer.on_finished(&download, &outcome);
                    }
                }
            }
        });

        Ok(handle)
    }

    pub fn get(&self, id: DownloadId) -> Option<DownloadHandle> {
        self.lock().iter().find(|h| h.id == id).cloned()
    }

    /// Every download still known to the registry, in start order.
    pub fn list(&self) -> Vec<DownloadHandle> {
        self.lock().clone()
    }

    pub fn in_flight(&self) -> Vec<DownloadHandle> {
        self.lock().iter().filter(|h| !h.is_finished()).cloned().collect()
    }

    pub fn cancel(&self, id: DownloadId) -> bool {
        match self.get(id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for handle in self.in_flight() {
            handle.cancel();
        }
    }

    pub async fn wait(&self, id: DownloadId) -> Option<Outcome> {
        let handle = self.get(id)?;
        Some(handle.wait().await)
    }

    /// Waits for the downloads registered at the time of the call.
    pub async fn wait_all(&self) -> Vec<(DownloadHandle, Outcome)> {
        let mut results = Vec::new();
        for handle in self.list() {
            let outcome = handle.wait().await;
            results.push((handle, outcome));
        }
        results
    }

    /// Forgets finished downloads and returns how many were dropped.
    pub fn prune_finished(&self) -> usize {
        let mut downloads = self.lock();
        let before = downloads.len();
        downloads.retain(|h| !h.is_finished());
        before - downloads.len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DownloadHandle>> {
        self.downloads.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
