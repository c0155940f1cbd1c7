//! Error taxonomy for discovery. Probe-level failures never show up here: a probe
//! answers `false` instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(
        "DrinkMaster server not found on the local network. \
         Make sure the backend is running and this device is on the same Wi-Fi network."
    )]
    NotFound,

    #[error("invalid base URL: {0}")]
    InvalidUrl(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{status} {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
