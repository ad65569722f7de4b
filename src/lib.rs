pub mod config;
pub mod downloader;
pub mod error;
pub mod logging;
pub mod progress;
pub mod registry;
pub mod state;
pub mod types;
pub mod utils;

pub use config::{CollisionPolicy, EngineConfig};
pub use error::{DownloadError, ErrorKind};
pub use progress::{Outcome, ProgressEvent, TransferEvent};
pub use registry::{DownloadHandle, DownloadRegistry, ProgressObserver};
pub use types::{DownloadId, DownloadRequest, DownloadStatus};
