use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use rfdm::{DownloadHandle, DownloadId, Outcome, ProgressEvent, ProgressObserver, TransferEvent};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes:>12}/{total_bytes:<12} {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {bytes:>12} {msg}";

fn progress_message(name: &str, event: &ProgressEvent) -> String {
    let percent = match event.percent {
        Some(p) => format!("{:>3}%", p),
        None => "  ?%".to_string(),
    };
    format!("{} {:>8.2} MiB/s  {}", percent, event.speed_mibps, name)
}

/// File extension shown next to the name, `-` when there is none.
fn file_type(name: &str) -> &str {
    Path::new(name).extension().and_then(|e| e.to_str()).unwrap_or("-")
}

fn outcome_message(name: &str, outcome: &Outcome) -> String {
    match outcome {
        Outcome::Done { bytes_written, .. } => format!("Completed {} ({})", name, HumanBytes(*bytes_written)),
        Outcome::Failed { reason, .. } => format!("Failed    {}: {}", name, reason),
        Outcome::Cancelled { .. } => format!("Cancelled {}", name),
    }
}

/// One bar per download, looked up by id rather than by position.
pub struct BarObserver {
    multi_progress: MultiProgress,
    bars: Mutex<HashMap<DownloadId, ProgressBar>>,
}

impl BarObserver {
    pub fn new() -> Self {
        let multi_progress = MultiProgress::new();
        multi_progress.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));
        Self {
            multi_progress,
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn bar(&self, download: &DownloadHandle) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        bars.entry(download.id)
            .or_insert_with(|| {
                let pb = self.multi_progress.add(ProgressBar::new_spinner());
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template(SPINNER_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb.set_message(format!("Connecting {} [{}]", download.name, file_type(&download.name)));
                pb
            })
            .clone()
    }
}

impl ProgressObserver for BarObserver {
    fn on_started(&self, download: &DownloadHandle) {
        self.bar(download);
    }

    fn on_progress(&self, download: &DownloadHandle, event: &ProgressEvent) {
        let pb = self.bar(download);
        if let (Some(total), None) = (event.total_bytes, pb.length()) {
            pb.set_length(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
            );
        }
        pb.set_position(event.bytes_written);
        pb.set_message(progress_message(&download.name, event));
    }

    fn on_finished(&self, download: &DownloadHandle, outcome: &Outcome) {
        let pb = self.bar(download);
        match outcome {
            Outcome::Done { .. } => pb.finish_with_message(outcome_message(&download.name, outcome)),
            _ => pb.abandon_with_message(outcome_message(&download.name, outcome)),
        }
        self.bars.lock().unwrap_or_else(|e| e.into_inner()).remove(&download.id);
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    id: DownloadId,
    name: &'a str,
    #[serde(flatten)]
    event: &'a TransferEvent,
}

/// Writes every event as a single JSON line on stdout.
///
/// The write is synchronous. Lines go through one locked handle so events
/// from concurrent downloads never interleave, and a closed stdout only
/// loses the line.
pub struct JsonObserver;

fn write_json_line<W: Write>(out: &mut W, download: &DownloadHandle, event: &TransferEvent) -> io::Result<()> {
    let line = JsonLine {
        id: download.id,
        name: &download.name,
        event,
    };
    serde_json::to_writer(&mut *out, &line)?;
    out.write_all(b"\n")?;
    out.flush()
}

impl JsonObserver {
    fn emit(&self, download: &DownloadHandle, event: &TransferEvent) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = write_json_line(&mut stdout, download, event) {
            warn!(id = %download.id, error = %e, "Failed to write event");
        }
    }
}

impl ProgressObserver for JsonObserver {
    fn on_progress(&self, download: &DownloadHandle, event: &ProgressEvent) {
        self.emit(download, &TransferEvent::Progress(event.clone()));
    }

    fn on_finished(&self, download: &DownloadHandle, outcome: &Outcome) {
        self.emit(download, &TransferEvent::Finished(outcome.clone()));
    }
}

pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn on_started(&self, download: &DownloadHandle) {
        info!(id = %download.id, file = %download.name, "Started");
    }

    fn on_progress(&self, download: &DownloadHandle, event: &ProgressEvent) {
        debug!(
            id = %download.id,
            file = %download.name,
            percent = ?event.percent,
            speed_mibps = event.speed_mibps,
            "Progress"
        );
    }

    fn on_finished(&self, download: &DownloadHandle, outcome: &Outcome) {
        match outcome {
            Outcome::Failed { .. } => warn!(id = %download.id, "{}", outcome_message(&download.name, outcome)),
            _ => info!(id = %download.id, "{}", outcome_message(&download.name, outcome)),
        }
    }
}

pub fn print_summary(results: &[(DownloadHandle, Outcome)]) {
    println!();
    println!("{:<40} {:<8} {:<12} {:<15} {}", "Filename", "Type", "Status", "Size", "Path");
    println!("{:-<40} {:-<8} {:-<12} {:-<15} {:-<20}", "", "", "", "", "");

    for (handle, outcome) in results {
        let (status, size) = match outcome {
            Outcome::Done { bytes_written, .. } => ("Completed", format!("{}", HumanBytes(*bytes_written))),
            Outcome::Failed { .. } => ("Failed", "-".to_string()),
            Outcome::Cancelled { bytes_written } => ("Cancelled", format!("{}", HumanBytes(*bytes_written))),
        };
        println!(
            "{:<40} {:<8} {:<12} {:<15} {}",
            handle.name,
            file_type(&handle.name),
            status,
            size,
            handle.destination.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_message_handles_unknown_percent() {
        let event = ProgressEvent {
            percent: None,
            speed_mibps: 1.5,
            bytes_written: 10,
            total_bytes: None,
        };
        assert_eq!(progress_message("a.bin", &event), "  ?%     1.50 MiB/s  a.bin");

        let event = ProgressEvent {
            percent: Some(42),
            ..event
        };
        assert!(progress_message("a.bin", &event).starts_with(" 42%"));
    }

    #[tokio::test]
    async fn json_lines_are_newline_terminated_objects() {
        let registry = rfdm::DownloadRegistry::new(rfdm::EngineConfig::default()).unwrap();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel::<(DownloadId, TransferEvent)>();
        let handle = registry
            .start(rfdm::DownloadRequest::new("http://127.0.0.1:9/a.bin", "/nonexistent"), std::sync::Arc::new(tx))
            .unwrap();
        registry.cancel_all();

        let mut out = Vec::new();
        let event = TransferEvent::Finished(Outcome::Cancelled { bytes_written: 7 });
        write_json_line(&mut out, &handle, &event).unwrap();
        write_json_line(&mut out, &handle, &event).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["id"], handle.id.to_string());
        assert_eq!(value["name"], "a.bin");
        assert_eq!(value["bytes_written"], 7);
    }

    #[test]
    fn file_type_is_the_extension() {
        assert_eq!(file_type("ubuntu.iso"), "iso");
        assert_eq!(file_type("archive.tar.gz"), "gz");
        assert_eq!(file_type("README"), "-");
    }

    #[test]
    fn outcome_message_names_the_file() {
        let outcome = Outcome::Cancelled { bytes_written: 3 };
        assert_eq!(outcome_message("a.bin", &outcome), "Cancelled a.bin");
    }
}
