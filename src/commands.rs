use anyhow::{bail, Context, Result};
use rfdm::{DownloadRegistry, DownloadRequest, EngineConfig, ProgressObserver};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::cli::OutputMode;
use crate::display::{print_summary, BarObserver, JsonObserver, LogObserver};

/// Parses `url` or `url|directory` lines; `#` starts a comment line.
pub fn parse_task_line(line: &str, default_dir: &str) -> Option<DownloadRequest> {
    let raw = line.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }
    let mut parts = raw.splitn(2, '|');
    let url = parts.next().unwrap_or_default().trim();
    let directory = parts
        .next()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(default_dir);
    if url.is_empty() {
        return None;
    }
    Some(DownloadRequest::from_input(url, directory))
}

pub async fn read_tasks_file(input: &Path, default_dir: &str) -> Result<Vec<DownloadRequest>> {
    let file = fs::File::open(input)
        .await
        .with_context(|| format!("Failed to open tasks file: {:?}", input))?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let mut requests = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if let Some(request) = parse_task_line(&line, default_dir) {
            requests.push(request);
        }
    }
    Ok(requests)
}

pub async fn run_downloads(requests: Vec<DownloadRequest>, config: EngineConfig, output: OutputMode) -> Result<()> {
    if requests.is_empty() {
        bail!("Nothing to download: pass one or more URLs or a tasks file");
    }

    // The engine never creates directories itself
    let directories: BTreeSet<PathBuf> = requests.iter().map(|r| r.directory.clone()).collect();
    for directory in &directories {
        fs::create_dir_all(directory)
            .await
            .with_context(|| format!("Failed to create download directory {:?}", directory))?;
    }

    let registry = DownloadRegistry::new(config).context("Failed to build HTTP client")?;
    debug!(config = ?registry.config(), "Download registry ready");
    let observer: Arc<dyn ProgressObserver> = match output {
        OutputMode::Bars => Arc::new(BarObserver::new()),
        OutputMode::Json => Arc::new(JsonObserver),
        OutputMode::Log => Arc::new(LogObserver),
    };

    let total = requests.len();
    let mut rejected = 0;
    for request in requests {
        let url = request.url.clone();
        if let Err(e) = registry.start(request, observer.clone()) {
            warn!(%url, error = %e, "Download not started");
            eprintln!("Failed to start {}: {}", url, e);
            rejected += 1;
        }
    }

    let results = tokio::select! {
        results = registry.wait_all() => results,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, cancelling downloads");
            registry.cancel_all();
            registry.wait_all().await
        }
    };

    if !matches!(output, OutputMode::Json) {
        print_summary(&results);
    }

    let unsuccessful = rejected + results.iter().filter(|(_, outcome)| !outcome.is_done()).count();
    if unsuccessful > 0 {
        bail!("{} of {} downloads did not complete", unsuccessful, total);
    }

    info!(count = results.len(), "All downloads completed");
    Ok(())
}
