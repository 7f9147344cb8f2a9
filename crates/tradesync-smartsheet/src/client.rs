//! HTTP client for the Smartsheet REST API.
//!
//! Covers the four primitives the sync needs: get-sheet, get-row, add-rows,
//! update-rows. Batch-size ceilings are enforced by the caller; this client
//! submits whatever it is handed in one call.

use std::time::Duration;

use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::SmartsheetError;
use crate::types::{NewRow, Row, RowUpdate, Sheet, WriteResult};

const DEFAULT_BASE_URL: &str = "https://api.smartsheet.com/2.0/";

/// Client for the Smartsheet REST API.
pub struct SmartsheetClient {
    client: Client,
    access_token: String,
    base_url: Url,
}

impl SmartsheetClient {
    /// Creates a new client pointed at the production Smartsheet API.
    ///
    /// # Errors
    ///
    /// Returns [`SmartsheetError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(access_token: &str, timeout_secs: u64) -> Result<Self, SmartsheetError> {
        Self::with_base_url(access_token, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SmartsheetError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`SmartsheetError::InvalidUrl`] if
    /// `base_url` does not parse.
    pub fn with_base_url(
        access_token: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, SmartsheetError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("tradesync/0.1 (smartsheet-sync)")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| SmartsheetError::InvalidUrl(format!("'{base_url}': {e}")))?;

        Ok(Self {
            client,
            access_token: access_token.to_owned(),
            base_url,
        })
    }

    /// Fetches a sheet with its columns and rows.
    ///
    /// # Errors
    ///
    /// - [`SmartsheetError::Api`] on a non-2xx response.
    /// - [`SmartsheetError::Http`] on network failure.
    /// - [`SmartsheetError::Deserialize`] if the body does not match.
    pub async fn get_sheet(&self, sheet_id: i64) -> Result<Sheet, SmartsheetError> {
        self.request(Method::GET, &format!("sheets/{sheet_id}"), None::<&()>)
            .await
    }

    /// Fetches a single row.
    ///
    /// # Errors
    ///
    /// Same classes as [`SmartsheetClient::get_sheet`].
    pub async fn get_row(&self, sheet_id: i64, row_id: i64) -> Result<Row, SmartsheetError> {
        self.request(
            Method::GET,
            &format!("sheets/{sheet_id}/rows/{row_id}"),
            None::<&()>,
        )
        .await
    }

    /// Appends rows to the bottom of a sheet.
    ///
    /// # Errors
    ///
    /// Same classes as [`SmartsheetClient::get_sheet`].
    pub async fn add_rows(
        &self,
        sheet_id: i64,
        rows: &[NewRow],
    ) -> Result<WriteResult, SmartsheetError> {
        self.request(Method::POST, &format!("sheets/{sheet_id}/rows"), Some(&rows))
            .await
    }

    /// Updates existing rows in place.
    ///
    /// # Errors
    ///
    /// Same classes as [`SmartsheetClient::get_sheet`].
    pub async fn update_rows(
        &self,
        sheet_id: i64,
        rows: &[RowUpdate],
    ) -> Result<WriteResult, SmartsheetError> {
        self.request(Method::PUT, &format!("sheets/{sheet_id}/rows"), Some(&rows))
            .await
    }

    async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, SmartsheetError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| SmartsheetError::InvalidUrl(format!("'{path}': {e}")))?;

        let mut request = self
            .client
            .request(method, url.clone())
            .bearer_auth(&self.access_token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            // Smartsheet error bodies look like {"errorCode": n, "message": "..."}.
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| {
                    v.get("message")
                        .and_then(serde_json::Value::as_str)
                        .map(ToOwned::to_owned)
                })
                .unwrap_or(text);
            tracing::warn!(status = status.as_u16(), url = %url, "smartsheet api error");
            return Err(SmartsheetError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| SmartsheetError::Deserialize {
            context: url.to_string(),
            source: e,
        })
    }
}
