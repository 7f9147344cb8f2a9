use thiserror::Error;

/// Errors returned by the Smartsheet API client.
#[derive(Debug, Error)]
pub enum SmartsheetError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Smartsheet returned a non-2xx status with an error body.
    #[error("Smartsheet API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// An expected column title is absent from the sheet. Fatal for the
    /// affected sheet's operation: without the column, rows cannot be routed.
    #[error("sheet {sheet_id} has no column titled '{title}'")]
    MissingColumn { sheet_id: i64, title: String },

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
