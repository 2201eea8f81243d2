//! Record selection and period reports.
//!
//! A `RecordFilter` narrows the history by date range and free-text search;
//! a `PeriodReport` summarizes whatever the filter selected.

use chrono::Days;
use serde::Serialize;

use coopledger_common::RecordDate;

use crate::record::Record;

/// Selection over the record history.
///
/// Both range ends are inclusive. An unset end is unbounded, and a blank
/// search term matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub from: Option<RecordDate>,
    pub to: Option<RecordDate>,
    /// Matched case-insensitively against `responsible` and `notes`.
    pub search: Option<String>,
}

impl RecordFilter {
    /// A filter that selects everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// The `days` days before `today`, through `today`.
    pub fn last_days(today: RecordDate, days: u32) -> Self {
        let from = today
            .as_naive()
            .checked_sub_days(Days::new(u64::from(days)))
            .map(RecordDate::from_naive);
        Self {
            from,
            to: Some(today),
            search: None,
        }
    }

    pub fn with_from(mut self, from: RecordDate) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_to(mut self, to: RecordDate) -> Self {
        self.to = Some(to);
        self
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Whether no criterion is set.
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.search_term().is_none()
    }

    pub fn matches(&self, record: &Record) -> bool {
        let date = record.date();
        if self.from.is_some_and(|from| date < from) {
            return false;
        }
        if self.to.is_some_and(|to| date > to) {
            return false;
        }

        match self.search_term() {
            Some(term) => {
                record.responsible().to_lowercase().contains(&term)
                    || record.notes().to_lowercase().contains(&term)
            }
            None => true,
        }
    }

    /// Matching records, keeping their order.
    pub fn apply(&self, records: &[Record]) -> Vec<Record> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }

    fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    }
}

/// Headline figures of a report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub record_count: usize,
    pub total_eggs: u64,
    /// Mean flock size over the records.
    pub avg_birds: f64,
    pub avg_posture_rate: f64,
}

impl ReportSummary {
    /// Summarize records. All zero for an empty list.
    pub fn from_records(records: &[Record]) -> Self {
        if records.is_empty() {
            return Self {
                record_count: 0,
                total_eggs: 0,
                avg_birds: 0.0,
                avg_posture_rate: 0.0,
            };
        }

        let count = records.len() as f64;
        Self {
            record_count: records.len(),
            total_eggs: records.iter().map(|r| u64::from(r.total_eggs())).sum(),
            avg_birds: records.iter().map(|r| f64::from(r.bird_count())).sum::<f64>() / count,
            avg_posture_rate: records.iter().map(Record::posture_rate).sum::<f64>() / count,
        }
    }
}

/// Records selected for a period together with their summary.
#[derive(Debug, Clone)]
pub struct PeriodReport {
    /// Filter start, or the oldest record in the history when unset.
    pub start: Option<RecordDate>,
    /// Filter end, or the newest record in the history when unset.
    pub end: Option<RecordDate>,
    pub summary: ReportSummary,
    /// Selected records, most recent first.
    pub records: Vec<Record>,
}

impl PeriodReport {
    /// Build a report over `history`, given newest first.
    pub fn build(filter: &RecordFilter, history: &[Record]) -> Self {
        let records = filter.apply(history);
        Self {
            start: filter.from.or_else(|| history.last().map(Record::date)),
            end: filter.to.or_else(|| history.first().map(Record::date)),
            summary: ReportSummary::from_records(&records),
            records,
        }
    }
}
