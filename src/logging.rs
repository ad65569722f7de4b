use std::path::PathBuf;
use std::sync::Once;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static INIT: Once = Once::new();

pub struct LogConfig {
    /// Used when `RUST_LOG` is not set.
    pub max_level: Level,
    /// Daily rolling `rfdm.log` files are written here when set.
    pub log_dir: Option<PathBuf>,
    pub log_to_console: bool,
    /// Dependency crates capped at `warn`.
    pub silent_deps: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_level: Level::WARN,
            log_dir: None,
            log_to_console: true,
            silent_deps: vec!["hyper".to_string(), "reqwest".to_string(), "rustls".to_string()],
        }
    }
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut result = Ok(());
    INIT.call_once(|| {
        result = initialize_logging_internal(config);
    });
    result
}

fn initialize_logging_internal(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut layers = Vec::new();

    if config.log_to_console {
        let stderr_layer = fmt::Layer::new()
            .with_writer(std::io::stderr)
            .with_target(true)
            .compact();
        layers.push(stderr_layer.with_filter(build_filter(&config)?).boxed());
    }

    if let Some(log_dir) = &config.log_dir {
        std::fs::create_dir_all(log_dir)?;
        let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "rfdm.log");
        let file_layer = fmt::Layer::new()
            .with_ansi(false)
            .with_writer(file_appender)
            .with_target(true);
        layers.push(file_layer.with_filter(build_filter(&config)?).boxed());
    }

    tracing_subscriber::registry().with(layers).try_init()?;
    Ok(())
}

fn build_filter(config: &LogConfig) -> Result<EnvFilter, Box<dyn std::error::Error + Send + Sync>> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(config.max_level.to_string())?;
    for dep in &config.silent_deps {
        filter = filter.add_directive(format!("{}=warn", dep).parse()?);
    }
    Ok(filter)
}
