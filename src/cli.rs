use clap::ValueEnum;
use rfdm::CollisionPolicy;

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OutputMode {
    /// One progress bar per download
    Bars,
    /// One JSON object per event on stdout
    Json,
    /// Progress as log records
    Log,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OnCollision {
    Overwrite,
    Reject,
    Rename,
}

impl From<OnCollision> for CollisionPolicy {
    fn from(value: OnCollision) -> Self {
        match value {
            OnCollision::Overwrite => CollisionPolicy::Overwrite,
            OnCollision::Reject => CollisionPolicy::Reject,
            OnCollision::Rename => CollisionPolicy::Rename,
        }
    }
}
