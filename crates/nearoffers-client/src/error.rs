use thiserror::Error;

/// Errors returned by the offers API client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with an `{"error": "..."}` envelope.
    #[error("offers API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// A non-2xx status without an error envelope.
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL '{base_url}': {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}
