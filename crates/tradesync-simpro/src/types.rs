//! Typed shapes for the Simpro REST payloads the sync consumes.
//!
//! Simpro list endpoints return a subset of fields controlled by the
//! `columns` query parameter; everything here is deserialized from those
//! trimmed payloads. Field casing follows the wire format (`ID`, `Staff`).

use serde::Deserialize;
use serde_json::{json, Value};

use tradesync_core::{RecordKey, SourceRow};

/// Reference to a related object, e.g. the staff member on a schedule or the
/// customer on a quote. Simpro embeds these as `{"ID": n, "Name": "..."}`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NamedRef {
    #[serde(rename = "ID", default)]
    pub id: i64,
    #[serde(rename = "Name", default)]
    pub name: String,
}

/// One job schedule block assignment.
#[derive(Debug, Clone, Deserialize)]
pub struct Schedule {
    #[serde(rename = "ID")]
    pub id: i64,
    /// `"job-section-costCenter"`, e.g. `"618-0-1"`. Carries the composite
    /// path needed for direct existence lookups.
    #[serde(rename = "Reference", default)]
    pub reference: String,
    #[serde(rename = "Type", default)]
    pub schedule_type: String,
    #[serde(rename = "TotalHours", default)]
    pub total_hours: f64,
    #[serde(rename = "Staff", default)]
    pub staff: NamedRef,
    #[serde(rename = "Date", default)]
    pub date: String,
}

/// The composite identifier path backing a schedule, parsed from its
/// `Reference` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePath {
    pub job_id: i64,
    pub section_id: i64,
    pub cost_center_id: i64,
}

impl Schedule {
    /// Parses `Reference` (`"job-section-costCenter"`) into its parts.
    /// Returns `None` when the reference is missing or malformed.
    #[must_use]
    pub fn path(&self) -> Option<SchedulePath> {
        let mut parts = self.reference.splitn(3, '-');
        let job_id = parts.next()?.parse().ok()?;
        let section_id = parts.next()?.parse().ok()?;
        let cost_center_id = parts.next()?.parse().ok()?;
        Some(SchedulePath {
            job_id,
            section_id,
            cost_center_id,
        })
    }

    #[must_use]
    pub fn to_source_row(&self) -> SourceRow {
        SourceRow::new(
            RecordKey::from(self.id),
            vec![
                ("ScheduleID".to_owned(), json!(self.id)),
                ("StaffName".to_owned(), json!(self.staff.name)),
                ("ScheduleDate".to_owned(), json!(self.date)),
                ("TotalHours".to_owned(), json!(self.total_hours)),
                ("Reference".to_owned(), json!(self.reference)),
            ],
        )
    }
}

/// A quotation header.
#[derive(Debug, Clone, Deserialize)]
pub struct Quote {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Customer", default)]
    pub customer: NamedRef,
    #[serde(rename = "Site", default)]
    pub site: NamedRef,
    #[serde(rename = "Stage", default)]
    pub stage: String,
    #[serde(rename = "DateIssued", default)]
    pub date_issued: String,
}

impl Quote {
    #[must_use]
    pub fn to_source_row(&self) -> SourceRow {
        SourceRow::new(
            RecordKey::from(self.id),
            vec![
                ("QuoteID".to_owned(), json!(self.id)),
                ("Description".to_owned(), strip_html(&self.description)),
                ("CustomerName".to_owned(), json!(self.customer.name)),
                ("SiteName".to_owned(), json!(self.site.name)),
                ("Stage".to_owned(), json!(self.stage)),
                ("DateIssued".to_owned(), json!(self.date_issued)),
            ],
        )
    }
}

/// A sales lead.
#[derive(Debug, Clone, Deserialize)]
pub struct Lead {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "LeadName", default)]
    pub lead_name: String,
    #[serde(rename = "Customer", default)]
    pub customer: NamedRef,
    #[serde(rename = "Site", default)]
    pub site: NamedRef,
    #[serde(rename = "Stage", default)]
    pub stage: String,
    #[serde(rename = "DateCreated", default)]
    pub date_created: String,
}

impl Lead {
    #[must_use]
    pub fn to_source_row(&self) -> SourceRow {
        SourceRow::new(
            RecordKey::from(self.id),
            vec![
                ("LeadID".to_owned(), json!(self.id)),
                ("LeadName".to_owned(), json!(self.lead_name)),
                ("CustomerName".to_owned(), json!(self.customer.name)),
                ("SiteName".to_owned(), json!(self.site.name)),
                ("Stage".to_owned(), json!(self.stage)),
                ("DateCreated".to_owned(), json!(self.date_created)),
            ],
        )
    }
}

/// One cost-center line on a job section.
#[derive(Debug, Clone, Deserialize)]
pub struct JobCostCenter {
    /// The cost-center instance id; the `{c}` segment in composite paths.
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Job", default)]
    pub job: NamedRef,
    #[serde(rename = "Section", default)]
    pub section: NamedRef,
    #[serde(rename = "DateModified", default)]
    pub date_modified: String,
}

impl JobCostCenter {
    /// Canonical composite key: `job/section/costCenter`.
    #[must_use]
    pub fn composite_key(&self) -> RecordKey {
        RecordKey::composite(&[self.job.id, self.section.id, self.id])
    }

    #[must_use]
    pub fn to_source_row(&self) -> SourceRow {
        SourceRow::new(
            self.composite_key(),
            vec![
                ("SIMPROKey".to_owned(), json!(self.composite_key().as_str())),
                ("JobID".to_owned(), json!(self.job.id)),
                ("SectionID".to_owned(), json!(self.section.id)),
                ("CostCenterID".to_owned(), json!(self.id)),
                ("CostCenterName".to_owned(), json!(self.name)),
                ("DateModified".to_owned(), json!(self.date_modified)),
            ],
        )
    }
}

/// A customer site, fetched for suburb enrichment.
#[derive(Debug, Clone, Deserialize)]
pub struct Site {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Address", default)]
    pub address: Option<SiteAddress>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SiteAddress {
    #[serde(rename = "Address", default)]
    pub street: String,
    #[serde(rename = "City", default)]
    pub city: Option<String>,
}

impl Site {
    /// The suburb for the site, when Simpro has one on file.
    #[must_use]
    pub fn suburb(&self) -> Option<&str> {
        self.address
            .as_ref()
            .and_then(|a| a.city.as_deref())
            .filter(|c| !c.trim().is_empty())
    }
}

/// Financial figures for one cost center, fetched for WIP amount refreshes.
#[derive(Debug, Clone, Deserialize)]
pub struct CostCenterFinancials {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Total", default)]
    pub total: Option<Amount>,
    #[serde(rename = "Claimed", default)]
    pub claimed: Option<Claimed>,
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct Amount {
    #[serde(rename = "ExTax", default)]
    pub ex_tax: f64,
    #[serde(rename = "IncTax", default)]
    pub inc_tax: f64,
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct Claimed {
    #[serde(rename = "ToDate", default)]
    pub to_date: Option<ClaimedToDate>,
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct ClaimedToDate {
    #[serde(rename = "Percent", default)]
    pub percent: f64,
}

impl CostCenterFinancials {
    #[must_use]
    pub fn total_ex_tax(&self) -> Option<f64> {
        self.total.map(|t| t.ex_tax)
    }

    #[must_use]
    pub fn claimed_percent(&self) -> Option<f64> {
        self.claimed.and_then(|c| c.to_date).map(|t| t.percent)
    }
}

/// Simpro rich-text fields arrive as HTML fragments; sheet cells want plain
/// text. Tags are dropped, entities for the common few are decoded.
fn strip_html(raw: &str) -> Value {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;
    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    let decoded = out
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ");
    json!(decoded.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_path_parses_reference() {
        let schedule: Schedule = serde_json::from_value(json!({
            "ID": 17, "Reference": "618-0-3", "Type": "job",
            "TotalHours": 2.5, "Staff": {"ID": 4, "Name": "Sam"}, "Date": "2026-08-20"
        }))
        .unwrap();
        assert_eq!(
            schedule.path(),
            Some(SchedulePath {
                job_id: 618,
                section_id: 0,
                cost_center_id: 3
            })
        );
    }

    #[test]
    fn schedule_path_rejects_malformed_reference() {
        let schedule: Schedule = serde_json::from_value(json!({
            "ID": 17, "Reference": "618-x", "Type": "job",
            "TotalHours": 0.0, "Staff": {}, "Date": ""
        }))
        .unwrap();
        assert!(schedule.path().is_none());
    }

    #[test]
    fn schedule_source_row_keys_on_id() {
        let schedule: Schedule = serde_json::from_value(json!({
            "ID": 42, "Reference": "1-0-1", "Type": "job",
            "TotalHours": 8.0, "Staff": {"ID": 9, "Name": "Jo"}, "Date": "2026-08-29"
        }))
        .unwrap();
        let row = schedule.to_source_row();
        assert_eq!(row.key.as_str(), "42");
        assert!(row
            .attributes
            .iter()
            .any(|(title, v)| title == "StaffName" && v == "Jo"));
    }

    #[test]
    fn cost_center_composite_key() {
        let cc: JobCostCenter = serde_json::from_value(json!({
            "ID": 3, "Name": "Roofing", "Job": {"ID": 618}, "Section": {"ID": 0},
            "DateModified": "2026-08-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(cc.composite_key().as_str(), "618/0/3");
    }

    #[test]
    fn strip_html_drops_tags_and_decodes_entities() {
        assert_eq!(
            strip_html("<p>Supply &amp; fit</p><br/>"),
            json!("Supply & fit")
        );
    }

    #[test]
    fn site_suburb_comes_from_the_address_city() {
        let site: Site = serde_json::from_value(json!({
            "ID": 55, "Name": "Depot",
            "Address": {"Address": "1 High St", "City": "Parramatta"}
        }))
        .unwrap();
        assert_eq!(site.suburb(), Some("Parramatta"));

        let bare: Site = serde_json::from_value(json!({"ID": 56})).unwrap();
        assert_eq!(bare.suburb(), None);
    }

    #[test]
    fn financials_surface_total_and_claimed_percent() {
        let fin: CostCenterFinancials = serde_json::from_value(json!({
            "ID": 3, "Name": "Roofing",
            "Total": {"ExTax": 1200.50, "IncTax": 1320.55},
            "Claimed": {"ToDate": {"Percent": 40.0}}
        }))
        .unwrap();
        assert_eq!(fin.total_ex_tax(), Some(1200.50));
        assert_eq!(fin.claimed_percent(), Some(40.0));

        let bare: CostCenterFinancials = serde_json::from_value(json!({"ID": 4})).unwrap();
        assert_eq!(bare.total_ex_tax(), None);
        assert_eq!(bare.claimed_percent(), None);
    }

    #[test]
    fn quote_tolerates_missing_optional_fields() {
        let quote: Quote = serde_json::from_value(json!({"ID": 7})).unwrap();
        assert_eq!(quote.to_source_row().key.as_str(), "7");
    }
}
