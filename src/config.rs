use reqwest::Client;
use std::time::Duration;

/// Bytes per write/progress step, matching the classic 1 KiB read loop.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// What `start` does when the derived destination is already being written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Start anyway; the newest transfer truncates the file.
    #[default]
    Overwrite,
    /// Refuse the new download with `DuplicateDestination`.
    Reject,
    /// Pick `name_N.ext`, skipping destinations of in-flight downloads.
    Rename,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub chunk_size: usize,
    /// `None` means every started download runs immediately.
    pub max_concurrent: Option<usize>,
    pub collision: CollisionPolicy,
    /// Write into `<file>.part` and rename once the body is complete.
    pub staged_writes: bool,
    pub connect_timeout: Duration,
    /// Longest wait for the next piece of the response body.
    pub read_timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrent: None,
            collision: CollisionPolicy::Overwrite,
            staged_writes: false,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Some(Duration::from_secs(30)),
            user_agent: concat!("rfdm/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: Option<usize>) -> Self {
        // A cap of zero would never let anything run
        self.max_concurrent = max_concurrent.filter(|n| *n > 0);
        self
    }

    pub fn with_collision(mut self, collision: CollisionPolicy) -> Self {
        self.collision = collision;
        self
    }

    pub fn with_staged_writes(mut self, staged_writes: bool) -> Self {
        self.staged_writes = staged_writes;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn build_client(&self) -> reqwest::Result<Client> {
        Client::builder()
            .user_agent(self.user_agent.clone())
            .connect_timeout(self.connect_timeout)
            .build()
    }
}
