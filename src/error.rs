use thiserror::Error;

/// Failure taxonomy for the external resources.
///
/// `ConfigInvalid` is the only fatal variant, and only before any worker
/// loop has started. Device failures are retried with capped backoff by
/// the loop that owns the resource.
#[derive(Debug, Error)]
pub enum Error {
    /// Audio or display hardware is missing or busy.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Malformed startup configuration.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
}

pub type Result<T> = std::result::Result<T, Error>;
