use sandbox_types::BackendKind;
use thiserror::Error;

use crate::banner::BannerError;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{backend}: failed to spawn node process: {reason}")]
    Spawn { backend: BackendKind, reason: String },

    #[error("{backend}: node process exited before becoming live ({status})")]
    ExitedEarly { backend: BackendKind, status: String },

    #[error("{backend}: node not live after {attempts} probe attempts")]
    NotLive { backend: BackendKind, attempts: u32 },

    #[error("{backend}: no free port in {low}..{high}")]
    NoFreePort { backend: BackendKind, low: u16, high: u16 },

    #[error("startup banner: {0}")]
    Banner(#[from] BannerError),

    #[error("account minting failed: {0}")]
    Crypto(#[from] sandbox_crypto::CryptoError),

    #[error("shared validator state: {0}")]
    Store(#[from] sandbox_store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
