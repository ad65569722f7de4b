mod cli;
mod commands;
mod display;

use anyhow::{anyhow, Result};
use clap::Parser;
use rfdm::logging::{init_logging, LogConfig};
use rfdm::{DownloadRequest, EngineConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

use crate::cli::{OnCollision, OutputMode};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URLs to download into --dir
    #[arg(index = 1)]
    urls: Vec<String>,

    /// Directory to save downloaded files ("current" = the program's own directory)
    #[arg(short = 'd', long = "dir", default_value = ".")]
    dir: String,

    /// File with one `url` or `url|directory` per line
    #[arg(short = 't', long = "tasks-file")]
    tasks_file: Option<PathBuf>,

    /// Maximum number of downloads running at once (unbounded when omitted)
    #[arg(short = 'c', long)]
    concurrency: Option<usize>,

    /// Bytes written per progress update
    #[arg(long, default_value_t = rfdm::config::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    /// Seconds to wait for more body data before failing (0 disables)
    #[arg(long, default_value_t = 30)]
    read_timeout: u64,

    /// What to do when two running downloads target the same file
    #[arg(long = "on-collision", value_enum, default_value = "overwrite")]
    on_collision: OnCollision,

    /// Write to `<file>.part` and rename once complete
    #[arg(long)]
    staged: bool,

    /// How progress is reported
    #[arg(short = 'o', long, value_enum, default_value = "bars")]
    output: OutputMode,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: Level,

    /// Also write daily log files into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        let read_timeout = match self.read_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        EngineConfig::default()
            .with_chunk_size(self.chunk_size)
            .with_max_concurrent(self.concurrency)
            .with_collision(self.on_collision.into())
            .with_staged_writes(self.staged)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout))
            .with_read_timeout(read_timeout)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // `log` mode reports starts and results at info
    let max_level = match args.output {
        OutputMode::Log => args.log_level.max(Level::INFO),
        _ => args.log_level,
    };
    init_logging(LogConfig {
        max_level,
        log_dir: args.log_dir.clone(),
        ..Default::default()
    })
    .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    let config = args.engine_config();
    let output = args.output;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let mut requests: Vec<DownloadRequest> = args
            .urls
            .iter()
            .map(|url| DownloadRequest::from_input(url, &args.dir))
            .collect();

        if let Some(tasks_file) = &args.tasks_file {
            requests.extend(commands::read_tasks_file(tasks_file, &args.dir).await?);
        }

        commands::run_downloads(requests, config, output).await
    })
}
