use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The tenant service rejected or failed a request.
    #[error("Tenant API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure talking to the tenant service.
    #[error("Tenant request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Authentication against the tenant service failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The worker has no tenant session to run this operation with.
    #[error("No tenant session established")]
    NotConnected,

    /// Reading or writing the local token cache failed.
    #[error("Token cache error: {0}")]
    TokenCache(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
