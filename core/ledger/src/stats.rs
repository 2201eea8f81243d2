//! Aggregates over the record list for dashboards and reports.

use serde::Serialize;

use coopledger_common::RecordDate;

use crate::record::Record;

/// Headline figures for a set of records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub record_count: usize,
    /// Bird count of the most recent record.
    pub current_flock: u32,
    pub avg_posture_rate: f64,
    pub avg_loss_rate: f64,
    /// Sum of feed over all records, in kilograms.
    pub total_feed: f64,
}

impl DashboardStats {
    /// Summarize records given newest first, as `RecordStore::list_records` returns them.
    pub fn from_records(records: &[Record]) -> Self {
        let Some(latest) = records.first() else {
            return Self {
                record_count: 0,
                current_flock: 0,
                avg_posture_rate: 0.0,
                avg_loss_rate: 0.0,
                total_feed: 0.0,
            };
        };

        let count = records.len() as f64;
        Self {
            record_count: records.len(),
            current_flock: latest.bird_count(),
            avg_posture_rate: records.iter().map(Record::posture_rate).sum::<f64>() / count,
            avg_loss_rate: records.iter().map(Record::loss_rate).sum::<f64>() / count,
            total_feed: records.iter().map(Record::total_feed).sum(),
        }
    }
}

/// One point of a chart series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: RecordDate,
    pub posture_rate: f64,
    pub loss_rate: f64,
    pub total_feed: f64,
}

impl TrendPoint {
    /// Chart series, oldest first, with values rounded to 2 decimal places.
    ///
    /// Expects records newest first.
    pub fn series(records: &[Record]) -> Vec<TrendPoint> {
        records
            .iter()
            .rev()
            .map(|r| TrendPoint {
                date: r.date(),
                posture_rate: round2(r.posture_rate()),
                loss_rate: round2(r.loss_rate()),
                total_feed: round2(r.total_feed()),
            })
            .collect()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
