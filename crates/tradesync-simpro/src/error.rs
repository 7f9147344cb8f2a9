use thiserror::Error;

/// Errors returned by the Simpro API client.
#[derive(Debug, Error)]
pub enum SimproError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The requested resource does not exist (HTTP 404). During deletion
    /// validation this is a positive signal, not a failure.
    #[error("Simpro resource not found: {context}")]
    NotFound { context: String },

    /// Simpro returned a non-2xx status other than 404.
    #[error("Simpro API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A request URL could not be constructed from the configured base URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl SimproError {
    /// True when the resource was positively reported absent, as opposed to
    /// a transient or structural failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, SimproError::NotFound { .. })
    }
}
