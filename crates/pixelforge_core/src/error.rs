use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Generic(String),
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    Network(String),

    #[error("Provider returned error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed provider response: {0}")]
    Malformed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Errors surfaced by the pixelforge workflows.
///
/// `NotFound`, `InvalidPalette`, `Validation` and `Image` are client
/// correctable. `Provider` is retryable. `Storage` means both the primary and
/// the fallback backend failed.
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid palette: {0}")]
    InvalidPalette(String),

    #[error("Provider failure: {0}")]
    Provider(#[from] ProviderError),

    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("Concurrent modification of {id}: expected revision {expected}, found {found}")]
    Conflict {
        id: String,
        expected: u64,
        found: u64,
    },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unsupported image: {0}")]
    Image(String),
}

pub type ForgeResult<T> = Result<T, ForgeError>;
