//! HTTP client for the Simpro REST API.
//!
//! Wraps `reqwest` with Simpro-specific error handling, bearer-token auth,
//! header-driven pagination, and typed response deserialization. A 404 on a
//! direct resource lookup surfaces as [`SimproError::NotFound`], which the
//! deletion validator treats as "confirmed absent" rather than a failure.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;

use tradesync_core::chunk::chunks;

use crate::error::SimproError;
use crate::retry::retry_with_backoff;
use crate::types::{
    CostCenterFinancials, JobCostCenter, Lead, Quote, Schedule, SchedulePath, Site,
};

/// List endpoints page at this size.
const PAGE_SIZE: usize = 100;

/// Maximum ids per `ID=in(...)` filter before the query string gets unwieldy.
const ID_FILTER_BATCH: usize = 50;

/// Client for the Simpro REST API.
///
/// The base URL must include the company segment, e.g.
/// `https://host/api/v1.0/companies/0`. Use [`SimproClient::with_base_url`]
/// to point at a mock server in tests.
pub struct SimproClient {
    client: Client,
    api_key: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl SimproClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns [`SimproError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`SimproError::InvalidUrl`] if `base_url`
    /// does not parse.
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, SimproError> {
        Self::with_base_url(base_url, api_key, timeout_secs, max_retries, backoff_base_ms)
    }

    /// Creates a new client with an arbitrary base URL (for wiremock tests).
    ///
    /// # Errors
    ///
    /// Same as [`SimproClient::new`].
    pub fn with_base_url(
        base_url: &str,
        api_key: &str,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, SimproError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("tradesync/0.1 (simpro-sync)")
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so that
        // Url::join appends path segments instead of replacing the last one.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| SimproError::InvalidUrl(format!("'{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Lists schedules whose date falls after `since` (exclusive).
    ///
    /// # Errors
    ///
    /// - [`SimproError::Api`] on a non-2xx response other than 404.
    /// - [`SimproError::Http`] on network failure.
    /// - [`SimproError::Deserialize`] if a page does not match the expected
    ///   shape.
    pub async fn list_schedules(&self, since: NaiveDate) -> Result<Vec<Schedule>, SimproError> {
        let date_filter = format!("gt({})", since.format("%Y-%m-%d"));
        self.list_paginated(
            "schedules/",
            &[
                ("Date", date_filter),
                (
                    "columns",
                    "ID,Reference,Type,TotalHours,Staff,Date".to_owned(),
                ),
            ],
        )
        .await
    }

    /// Lists all quotations.
    ///
    /// # Errors
    ///
    /// Same classes as [`SimproClient::list_schedules`].
    pub async fn list_quotes(&self) -> Result<Vec<Quote>, SimproError> {
        self.list_paginated(
            "quotes/",
            &[(
                "columns",
                "ID,Description,Customer,Site,Stage,DateIssued".to_owned(),
            )],
        )
        .await
    }

    /// Lists all leads.
    ///
    /// # Errors
    ///
    /// Same classes as [`SimproClient::list_schedules`].
    pub async fn list_leads(&self) -> Result<Vec<Lead>, SimproError> {
        self.list_paginated(
            "leads/",
            &[(
                "columns",
                "ID,LeadName,Customer,Site,Stage,DateCreated".to_owned(),
            )],
        )
        .await
    }

    /// Lists all cost-center lines across jobs.
    ///
    /// # Errors
    ///
    /// Same classes as [`SimproClient::list_schedules`].
    pub async fn list_job_cost_centers(&self) -> Result<Vec<JobCostCenter>, SimproError> {
        self.list_paginated(
            "jobCostCenters/",
            &[("columns", "ID,Name,Job,Section,DateModified".to_owned())],
        )
        .await
    }

    /// Direct existence lookup for one schedule by its full composite path.
    ///
    /// Returns `Ok(None)` when Simpro reports 404, meaning the schedule is
    /// confirmed absent.
    ///
    /// # Errors
    ///
    /// [`SimproError::Api`], [`SimproError::Http`] or
    /// [`SimproError::Deserialize`] on any failure other than 404.
    pub async fn get_cost_center_schedule(
        &self,
        path: SchedulePath,
        schedule_id: i64,
    ) -> Result<Option<Schedule>, SimproError> {
        let endpoint = format!(
            "jobs/{}/sections/{}/costCenters/{}/schedules/{}",
            path.job_id, path.section_id, path.cost_center_id, schedule_id
        );
        self.get_optional(&endpoint, &[]).await
    }

    /// Fetches one customer site with its address, for suburb enrichment.
    ///
    /// Returns `Ok(None)` when the site no longer exists.
    ///
    /// # Errors
    ///
    /// Same classes as [`SimproClient::get_cost_center_schedule`].
    pub async fn get_site(&self, site_id: i64) -> Result<Option<Site>, SimproError> {
        self.get_optional(
            &format!("sites/{site_id}"),
            &[("columns", "ID,Name,Address".to_owned())],
        )
        .await
    }

    /// Fetches the claimed and total figures for one cost center.
    ///
    /// Returns `Ok(None)` when the cost center no longer exists.
    ///
    /// # Errors
    ///
    /// Same classes as [`SimproClient::get_cost_center_schedule`].
    pub async fn get_cost_center_financials(
        &self,
        path: SchedulePath,
    ) -> Result<Option<CostCenterFinancials>, SimproError> {
        let endpoint = format!(
            "jobs/{}/sections/{}/costCenters/{}",
            path.job_id, path.section_id, path.cost_center_id
        );
        self.get_optional(&endpoint, &[("columns", "ID,Name,Claimed,Total".to_owned())])
            .await
    }

    /// Point GET where a 404 is a meaningful answer, not a failure.
    async fn get_optional<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, SimproError> {
        let url = self.build_url(endpoint, query)?;
        let result = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.request_json(url.clone())
        })
        .await;

        match result {
            Ok(body) => {
                let value = serde_json::from_value(body).map_err(|e| SimproError::Deserialize {
                    context: endpoint.to_owned(),
                    source: e,
                })?;
                Ok(Some(value))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetches schedules matching the given ids via `ID=in(...)` filters,
    /// batched at [`ID_FILTER_BATCH`] ids per request.
    ///
    /// Ids absent from the result were not found; the caller derives absence
    /// by set difference.
    ///
    /// # Errors
    ///
    /// Same classes as [`SimproClient::list_schedules`]. A failure in one
    /// batch aborts the call; per-key isolation is layered above.
    pub async fn schedules_by_ids(&self, ids: &[i64]) -> Result<Vec<Schedule>, SimproError> {
        self.by_id_filter("schedules/", "ID,Reference,Type,TotalHours,Staff,Date", ids)
            .await
    }

    /// Fetches quotations matching the given ids via `ID=in(...)`.
    ///
    /// # Errors
    ///
    /// Same classes as [`SimproClient::schedules_by_ids`].
    pub async fn quotes_by_ids(&self, ids: &[i64]) -> Result<Vec<Quote>, SimproError> {
        self.by_id_filter("quotes/", "ID,Description,Customer,Site,Stage,DateIssued", ids)
            .await
    }

    /// Fetches leads matching the given ids via `ID=in(...)`.
    ///
    /// # Errors
    ///
    /// Same classes as [`SimproClient::schedules_by_ids`].
    pub async fn leads_by_ids(&self, ids: &[i64]) -> Result<Vec<Lead>, SimproError> {
        self.by_id_filter("leads/", "ID,LeadName,Customer,Site,Stage,DateCreated", ids)
            .await
    }

    /// Fetches cost-center lines matching the given ids via `ID=in(...)`.
    ///
    /// # Errors
    ///
    /// Same classes as [`SimproClient::schedules_by_ids`].
    pub async fn cost_centers_by_ids(&self, ids: &[i64]) -> Result<Vec<JobCostCenter>, SimproError> {
        self.by_id_filter("jobCostCenters/", "ID,Name,Job,Section,DateModified", ids)
            .await
    }

    async fn by_id_filter<T: DeserializeOwned>(
        &self,
        path: &str,
        columns: &str,
        ids: &[i64],
    ) -> Result<Vec<T>, SimproError> {
        let mut out = Vec::with_capacity(ids.len());
        for batch in chunks(ids, ID_FILTER_BATCH) {
            let filter = format!(
                "in({})",
                batch
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",")
            );
            let mut items: Vec<T> = self
                .list_paginated(path, &[("ID", filter), ("columns", columns.to_owned())])
                .await?;
            out.append(&mut items);
        }
        Ok(out)
    }

    /// Walks a paginated list endpoint until the page count reported in the
    /// `Result-Pages` header is exhausted (or a short page arrives, when the
    /// header is missing).
    async fn list_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        base_query: &[(&str, String)],
    ) -> Result<Vec<T>, SimproError> {
        let mut out = Vec::new();
        let mut page = 1u32;
        loop {
            let mut query: Vec<(&str, String)> = base_query.to_vec();
            query.push(("pageSize", PAGE_SIZE.to_string()));
            query.push(("page", page.to_string()));
            let url = self.build_url(path, &query)?;

            let (body, total_pages) =
                retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
                    self.request_page(url.clone())
                })
                .await?;

            let items: Vec<T> =
                serde_json::from_value(body).map_err(|e| SimproError::Deserialize {
                    context: format!("{path} page {page}"),
                    source: e,
                })?;
            let count = items.len();
            out.extend(items);

            let done = match total_pages {
                Some(pages) => page >= pages,
                None => count < PAGE_SIZE,
            };
            if done {
                break;
            }
            page += 1;
        }
        Ok(out)
    }

    fn build_url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, SimproError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| SimproError::InvalidUrl(format!("'{path}': {e}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Sends a GET request and parses the body as JSON, mapping 404 to
    /// [`SimproError::NotFound`] and other non-2xx statuses to
    /// [`SimproError::Api`].
    async fn request_json(&self, url: Url) -> Result<serde_json::Value, SimproError> {
        let (body, _) = self.request_page(url).await?;
        Ok(body)
    }

    /// As [`SimproClient::request_json`], additionally returning the
    /// `Result-Pages` pagination header when present.
    async fn request_page(&self, url: Url) -> Result<(serde_json::Value, Option<u32>), SimproError> {
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SimproError::NotFound {
                context: url.path().to_owned(),
            });
        }

        let total_pages = response
            .headers()
            .get("Result-Pages")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SimproError::Api {
                status: status.as_u16(),
                message: truncate_message(&message),
            });
        }

        let body = response.text().await?;
        let value = serde_json::from_str(&body).map_err(|e| SimproError::Deserialize {
            context: url.to_string(),
            source: e,
        })?;
        Ok((value, total_pages))
    }
}

/// Error bodies can be large HTML pages; keep logs and error chains short.
fn truncate_message(message: &str) -> String {
    const MAX: usize = 500;
    if message.len() <= MAX {
        message.to_owned()
    } else {
        let cut = message
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map_or(0, |(i, c)| i + c.len_utf8());
        format!("{}…", &message[..cut])
    }
}
