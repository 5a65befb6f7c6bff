use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] voteparty_store::StoreError),

    #[error("config error: {0}")]
    Config(String),

    #[error("vote party service is not running")]
    NotInitialized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ingestion queue is closed")]
    QueueClosed,
}
