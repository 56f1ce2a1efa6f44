use thiserror::Error;

/// Error kinds surfaced by the core. Every fallible operation in this crate
/// returns `Result<T, CoreError>`; the demonstration binary wraps these in
/// `anyhow` at its edges.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("wire protocol error: {0}")]
    Wire(String),

    #[error("no format satisfies the requested quality")]
    NoSuitableFormat,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("remux failed: {0}")]
    Remux(String),

    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("catalog store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("canceled")]
    Canceled,
}

pub type CoreResult<T> = Result<T, CoreError>;
