pub mod aggregate;
pub mod api;
pub mod session;
pub mod stream;
pub mod sync;

/// Errors surfaced by the client-side sync machinery.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("auth token unavailable: {0}")]
    Token(String),
}
