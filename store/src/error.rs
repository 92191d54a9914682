use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no record for {0}")]
    NotFound(String),

    #[error("cannot encode record: {0}")]
    Serialization(String),

    #[error("unreadable record: {0}")]
    Corruption(String),

    #[error("lock file error: {0}")]
    Lock(String),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}
