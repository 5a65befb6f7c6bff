use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing medium could not be opened or its schema created.
    #[error("failed to connect to tally store: {0}")]
    Connection(String),

    #[error("store is not connected")]
    NotConnected,

    #[error("failed to read tally: {0}")]
    Read(String),

    #[error("failed to write tally: {0}")]
    Write(String),

    #[error("tally data is corrupted: {0}")]
    Corruption(String),
}
