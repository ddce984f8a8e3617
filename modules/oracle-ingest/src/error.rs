/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned status {status}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("Feed parse error: {0}")]
    Feed(String),

    #[error("Invalid topic catalog: {0}")]
    Catalog(String),

    #[error("Store error: {0}")]
    Store(#[from] oracle_store::StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
