use thiserror::Error;

/// Configuration rejected before any polling starts
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("fingerprint_size must be at least {min} bytes, got {size}")]
    FingerprintTooSmall { size: usize, min: usize },
}

/// Possible errors that could happen while working with checkpoint storage
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("while working with underlying file")]
    IO(#[from] std::io::Error),

    #[error("while trying to (de)serialize checkpoint")]
    Serde(#[from] bincode::Error),
}
