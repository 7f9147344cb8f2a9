//! Production [`EntitySource`] implementations over the Simpro client.
//!
//! Probes batch id lookups and answer absence by set difference: an id the
//! filter query did not return does not exist. A failed batch is attributed
//! to each of its keys so the rest of the run keeps going.

use std::collections::BTreeSet;

use chrono::{Duration, Utc};

use tradesync_core::{EntityKind, RecordKey, SourceRow};
use tradesync_simpro::{SimproClient, SimproError};

use crate::traits::EntitySource;
use crate::validate::{ProbeError, ProbeOutcome};

const PROBE_BATCH: usize = 50;

fn numeric_id(key: &RecordKey) -> Result<i64, ProbeError> {
    key.as_str().parse().map_err(|_| ProbeError {
        message: format!("key {key} is not a numeric id"),
        not_found: false,
    })
}

/// Splits keys into parseable `(key, id)` pairs, pushing a per-key error for
/// the rest.
fn split_numeric(
    keys: &[RecordKey],
    results: &mut Vec<(RecordKey, Result<ProbeOutcome, ProbeError>)>,
) -> Vec<(RecordKey, i64)> {
    let mut numeric = Vec::with_capacity(keys.len());
    for key in keys {
        match numeric_id(key) {
            Ok(id) => numeric.push((key.clone(), id)),
            Err(e) => results.push((key.clone(), Err(e))),
        }
    }
    numeric
}

fn verdicts_for_chunk(
    chunk: &[(RecordKey, i64)],
    outcome: Result<BTreeSet<i64>, SimproError>,
    results: &mut Vec<(RecordKey, Result<ProbeOutcome, ProbeError>)>,
) {
    match outcome {
        Ok(present) => {
            for (key, id) in chunk {
                let verdict = if present.contains(id) {
                    ProbeOutcome::Exists
                } else {
                    ProbeOutcome::Absent
                };
                results.push((key.clone(), Ok(verdict)));
            }
        }
        Err(e) => {
            let err = ProbeError::from(&e);
            results.extend(chunk.iter().map(|(key, _)| (key.clone(), Err(err.clone()))));
        }
    }
}

/// Schedules inside a trailing date window.
pub struct ScheduleSource<'a> {
    client: &'a SimproClient,
    window_days: i64,
}

impl<'a> ScheduleSource<'a> {
    #[must_use]
    pub fn new(client: &'a SimproClient, window_days: i64) -> Self {
        Self {
            client,
            window_days,
        }
    }
}

impl EntitySource for ScheduleSource<'_> {
    fn entity(&self) -> EntityKind {
        EntityKind::Schedules
    }

    async fn list_current(&self) -> Result<Vec<SourceRow>, SimproError> {
        let since = Utc::now().date_naive() - Duration::days(self.window_days);
        let schedules = self.client.list_schedules(since).await?;
        Ok(schedules.iter().map(|s| s.to_source_row()).collect())
    }

    async fn fetch_by_keys(&self, keys: &[RecordKey]) -> Result<Vec<SourceRow>, SimproError> {
        let ids: Vec<i64> = keys.iter().filter_map(|k| k.as_str().parse().ok()).collect();
        let schedules = self.client.schedules_by_ids(&ids).await?;
        Ok(schedules.iter().map(|s| s.to_source_row()).collect())
    }

    async fn probe(
        &self,
        keys: &[RecordKey],
    ) -> Vec<(RecordKey, Result<ProbeOutcome, ProbeError>)> {
        let mut results = Vec::with_capacity(keys.len());
        let numeric = split_numeric(keys, &mut results);
        for chunk in numeric.chunks(PROBE_BATCH) {
            let ids: Vec<i64> = chunk.iter().map(|(_, id)| *id).collect();
            let outcome = self
                .client
                .schedules_by_ids(&ids)
                .await
                .map(|found| found.iter().map(|s| s.id).collect());
            verdicts_for_chunk(chunk, outcome, &mut results);
        }
        results
    }
}

/// All current quotations.
pub struct QuoteSource<'a> {
    client: &'a SimproClient,
}

impl<'a> QuoteSource<'a> {
    #[must_use]
    pub fn new(client: &'a SimproClient) -> Self {
        Self { client }
    }
}

impl EntitySource for QuoteSource<'_> {
    fn entity(&self) -> EntityKind {
        EntityKind::Quotes
    }

    async fn list_current(&self) -> Result<Vec<SourceRow>, SimproError> {
        let quotes = self.client.list_quotes().await?;
        Ok(quotes.iter().map(|q| q.to_source_row()).collect())
    }

    async fn fetch_by_keys(&self, keys: &[RecordKey]) -> Result<Vec<SourceRow>, SimproError> {
        let ids: Vec<i64> = keys.iter().filter_map(|k| k.as_str().parse().ok()).collect();
        let quotes = self.client.quotes_by_ids(&ids).await?;
        Ok(quotes.iter().map(|q| q.to_source_row()).collect())
    }

    async fn probe(
        &self,
        keys: &[RecordKey],
    ) -> Vec<(RecordKey, Result<ProbeOutcome, ProbeError>)> {
        let mut results = Vec::with_capacity(keys.len());
        let numeric = split_numeric(keys, &mut results);
        for chunk in numeric.chunks(PROBE_BATCH) {
            let ids: Vec<i64> = chunk.iter().map(|(_, id)| *id).collect();
            let outcome = self
                .client
                .quotes_by_ids(&ids)
                .await
                .map(|found| found.iter().map(|q| q.id).collect());
            verdicts_for_chunk(chunk, outcome, &mut results);
        }
        results
    }
}

/// All current leads.
pub struct LeadSource<'a> {
    client: &'a SimproClient,
}

impl<'a> LeadSource<'a> {
    #[must_use]
    pub fn new(client: &'a SimproClient) -> Self {
        Self { client }
    }
}

impl EntitySource for LeadSource<'_> {
    fn entity(&self) -> EntityKind {
        EntityKind::Leads
    }

    async fn list_current(&self) -> Result<Vec<SourceRow>, SimproError> {
        let leads = self.client.list_leads().await?;
        Ok(leads.iter().map(|l| l.to_source_row()).collect())
    }

    async fn fetch_by_keys(&self, keys: &[RecordKey]) -> Result<Vec<SourceRow>, SimproError> {
        let ids: Vec<i64> = keys.iter().filter_map(|k| k.as_str().parse().ok()).collect();
        let leads = self.client.leads_by_ids(&ids).await?;
        Ok(leads.iter().map(|l| l.to_source_row()).collect())
    }

    async fn probe(
        &self,
        keys: &[RecordKey],
    ) -> Vec<(RecordKey, Result<ProbeOutcome, ProbeError>)> {
        let mut results = Vec::with_capacity(keys.len());
        let numeric = split_numeric(keys, &mut results);
        for chunk in numeric.chunks(PROBE_BATCH) {
            let ids: Vec<i64> = chunk.iter().map(|(_, id)| *id).collect();
            let outcome = self
                .client
                .leads_by_ids(&ids)
                .await
                .map(|found| found.iter().map(|l| l.id).collect());
            verdicts_for_chunk(chunk, outcome, &mut results);
        }
        results
    }
}

/// Job cost-center lines, keyed by the composite `job/section/costCenter`.
pub struct CostCenterSource<'a> {
    client: &'a SimproClient,
}

impl<'a> CostCenterSource<'a> {
    #[must_use]
    pub fn new(client: &'a SimproClient) -> Self {
        Self { client }
    }
}

fn composite_parts(key: &RecordKey) -> Result<(i64, i64, i64), ProbeError> {
    let mut parts = key.as_str().splitn(3, '/');
    let parse = |part: Option<&str>| part.and_then(|p| p.parse().ok());
    match (
        parse(parts.next()),
        parse(parts.next()),
        parse(parts.next()),
    ) {
        (Some(job), Some(section), Some(cc)) => Ok((job, section, cc)),
        _ => Err(ProbeError {
            message: format!("key {key} is not a job/section/costCenter composite"),
            not_found: false,
        }),
    }
}

impl EntitySource for CostCenterSource<'_> {
    fn entity(&self) -> EntityKind {
        EntityKind::CostCenters
    }

    async fn list_current(&self) -> Result<Vec<SourceRow>, SimproError> {
        let lines = self.client.list_job_cost_centers().await?;
        Ok(lines.iter().map(|c| c.to_source_row()).collect())
    }

    async fn fetch_by_keys(&self, keys: &[RecordKey]) -> Result<Vec<SourceRow>, SimproError> {
        let wanted: BTreeSet<&str> = keys.iter().map(RecordKey::as_str).collect();
        let ids: Vec<i64> = keys
            .iter()
            .filter_map(|k| composite_parts(k).ok().map(|(_, _, cc)| cc))
            .collect();
        let lines = self.client.cost_centers_by_ids(&ids).await?;
        // The id filter matches the cost-center segment only; narrow back to
        // the requested composites.
        Ok(lines
            .iter()
            .filter(|c| wanted.contains(c.composite_key().as_str()))
            .map(|c| c.to_source_row())
            .collect())
    }

    async fn probe(
        &self,
        keys: &[RecordKey],
    ) -> Vec<(RecordKey, Result<ProbeOutcome, ProbeError>)> {
        let mut results = Vec::with_capacity(keys.len());
        let mut composite = Vec::with_capacity(keys.len());
        for key in keys {
            match composite_parts(key) {
                Ok((_, _, cc)) => composite.push((key.clone(), cc)),
                Err(e) => results.push((key.clone(), Err(e))),
            }
        }
        for chunk in composite.chunks(PROBE_BATCH) {
            let ids: Vec<i64> = chunk.iter().map(|(_, cc)| *cc).collect();
            match self.client.cost_centers_by_ids(&ids).await {
                Ok(found) => {
                    let present: BTreeSet<RecordKey> =
                        found.iter().map(|c| c.composite_key()).collect();
                    for (key, _) in chunk {
                        let verdict = if present.contains(key) {
                            ProbeOutcome::Exists
                        } else {
                            ProbeOutcome::Absent
                        };
                        results.push((key.clone(), Ok(verdict)));
                    }
                }
                Err(e) => {
                    let err = ProbeError::from(&e);
                    results
                        .extend(chunk.iter().map(|(key, _)| (key.clone(), Err(err.clone()))));
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_id_rejects_text() {
        assert!(numeric_id(&RecordKey::from(42)).is_ok());
        let err = numeric_id(&RecordKey::new("abc")).unwrap_err();
        assert!(!err.not_found);
    }

    #[test]
    fn composite_parts_round_trip() {
        let key = RecordKey::composite(&[618, 0, 5]);
        assert_eq!(composite_parts(&key).unwrap(), (618, 0, 5));
        assert!(composite_parts(&RecordKey::new("618/0")).is_err());
        assert!(composite_parts(&RecordKey::new("a/b/c")).is_err());
    }

    #[test]
    fn chunk_failure_is_attributed_per_key() {
        let chunk = vec![(RecordKey::from(1), 1), (RecordKey::from(2), 2)];
        let mut results = Vec::new();
        verdicts_for_chunk(
            &chunk,
            Err(SimproError::Api {
                status: 500,
                message: "boom".to_owned(),
            }),
            &mut results,
        );
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, r)| r.is_err()));
    }

    #[test]
    fn absence_is_set_difference() {
        let chunk = vec![(RecordKey::from(1), 1), (RecordKey::from(2), 2)];
        let mut results = Vec::new();
        verdicts_for_chunk(&chunk, Ok([1].into_iter().collect()), &mut results);
        assert_eq!(results[0].1, Ok(ProbeOutcome::Exists));
        assert_eq!(results[1].1, Ok(ProbeOutcome::Absent));
    }
}
