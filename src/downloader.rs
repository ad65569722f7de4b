use futures::{Stream, StreamExt};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::error::DownloadError;
use crate::progress::{Outcome, ProgressSender};
use crate::state::TransferState;
use crate::utils::staged_path;

enum Finish {
    Done { bytes_written: u64 },
    Cancelled { bytes_written: u64 },
}

/// Performs one download from request to terminal signal.
pub struct TransferWorker {
    client: Client,
    config: Arc<EngineConfig>,
    url: String,
    destination: PathBuf,
    cancel: CancellationToken,
}

impl TransferWorker {
    pub fn new(
        client: Client,
        config: Arc<EngineConfig>,
        url: String,
        destination: PathBuf,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            config,
            url,
            destination,
            cancel,
        }
    }

    /// Streams the body to disk, emitting one progress event per chunk and
    /// exactly one terminal event. Faults end up in the returned outcome.
    pub async fn run(self, events: ProgressSender) -> Outcome {
        info!(url = %self.url, destination = ?self.destination, "Download started");

        let outcome = match self.transfer(&events).await {
            Ok(Finish::Done { bytes_written }) => {
                info!(url = %self.url, bytes_written, "Download completed");
                Outcome::Done {
                    path: self.destination.clone(),
                    bytes_written,
                }
            }
            Ok(Finish::Cancelled { bytes_written }) => {
                info!(url = %self.url, bytes_written, "Download cancelled");
                Outcome::Cancelled { bytes_written }
            }
            Err(err) => {
                warn!(url = %self.url, error = %err, "Download failed");
                Outcome::Failed {
                    kind: err.kind(),
                    reason: err.to_string(),
                }
            }
        };

        events.finish(outcome.clone());
        outcome
    }

    async fn transfer(&self, events: &ProgressSender) -> Result<Finish, DownloadError> {
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(Finish::Cancelled { bytes_written: 0 }),
            response = self.client.get(&self.url).send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus(status));
        }

        let total_bytes = response.content_length();
        debug!(url = %self.url, %status, ?total_bytes, "Response received");

        let write_path = if self.config.staged_writes {
            staged_path(&self.destination)
        } else {
            self.destination.clone()
        };

        // Truncates whatever was there before; there is no resume
        let mut file = File::create(&write_path).await?;
        let mut state = TransferState::new(self.url.clone(), self.destination.clone(), total_bytes);
        let mut stream = Box::pin(response.bytes_stream());
        // The field is public, so a zero can bypass `with_chunk_size`
        let chunk_size = self.config.chunk_size.max(1);

        loop {
            let piece = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    file.flush().await?;
                    return Ok(Finish::Cancelled { bytes_written: state.bytes_written() });
                }
                piece = read_next(&mut stream, self.config.read_timeout) => piece?,
            };

            let Some(piece) = piece else { break };

            for chunk in piece.chunks(chunk_size) {
                if self.cancel.is_cancelled() {
                    file.flush().await?;
                    return Ok(Finish::Cancelled { bytes_written: state.bytes_written() });
                }

                file.write_all(chunk).await?;
                file.flush().await?;
                state.record_chunk(chunk.len());

                let event = state.snapshot();
                trace!(url = %self.url, bytes_written = event.bytes_written, percent = ?event.percent, "Chunk written");
                events.progress(event);
            }
        }

        if state.is_short() {
            return Err(DownloadError::Truncated {
                received: state.bytes_written(),
                expected: state.total_bytes.unwrap_or_default(),
            });
        }

        file.flush().await?;
        drop(file);

        if write_path != self.destination {
            fs::rename(&write_path, &self.destination).await?;
        }

        Ok(Finish::Done {
            bytes_written: state.bytes_written(),
        })
    }
}

async fn read_next<S, T>(stream: &mut S, read_timeout: Option<Duration>) -> Result<Option<T>, DownloadError>
where
    S: Stream<Item = reqwest::Result<T>> + Unpin,
{
    let next = match read_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next())
            .await
            .map_err(|_| DownloadError::ReadTimeout(limit))?,
        None => stream.next().await,
    };
    Ok(next.transpose()?)
}
