//! Production records and their derived metrics.

use serde::{Deserialize, Serialize};

use coopledger_common::{Error, RecordDate, RecordId, Result};

/// User-supplied fields of a daily production entry.
///
/// Carries no derived values and no sync state; those are owned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordInput {
    /// Calendar day in `YYYY-MM-DD` form.
    pub date: String,
    /// Flock size at time of entry. Must be positive.
    pub bird_count: u32,
    /// Eggs collected.
    pub total_eggs: u32,
    /// Eggs lost to damage or soiling, a subset of `total_eggs`.
    pub broken_eggs: u32,
    /// Morning feed in kilograms.
    pub feed_morning: f64,
    /// Evening feed in kilograms.
    pub feed_evening: f64,
    /// Name of the person recording the entry.
    pub responsible: String,
    /// Free-text notes.
    pub notes: Option<String>,
}

impl RecordInput {
    /// Check the input and parse its date.
    ///
    /// # Errors
    /// - `InvalidInput` if the date is malformed, the bird count is zero,
    ///   more eggs are broken than collected, or a feed value is negative or
    ///   not finite
    pub fn validate(&self) -> Result<RecordDate> {
        let date = RecordDate::parse(&self.date)?;

        if self.bird_count == 0 {
            return Err(Error::InvalidInput(
                "Bird count must be greater than zero".to_string(),
            ));
        }
        if self.broken_eggs > self.total_eggs {
            return Err(Error::InvalidInput(format!(
                "Broken eggs ({}) cannot exceed total eggs ({})",
                self.broken_eggs, self.total_eggs
            )));
        }
        for (label, value) in [("morning", self.feed_morning), ("evening", self.feed_evening)] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "Feed ({}) must be a non-negative number of kilograms, got {}",
                    label, value
                )));
            }
        }

        Ok(date)
    }
}

/// Values computed once from a record's inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    /// Morning plus evening feed, in kilograms.
    pub total_feed: f64,
    /// Eggs per bird, as a percentage.
    pub posture_rate: f64,
    /// Broken eggs per collected egg, as a percentage. Zero when nothing was collected.
    pub loss_rate: f64,
}

impl DerivedMetrics {
    /// Compute the derived metrics.
    ///
    /// # Errors
    /// - `InvalidInput` if `bird_count` is zero
    pub fn compute(
        bird_count: u32,
        total_eggs: u32,
        broken_eggs: u32,
        feed_morning: f64,
        feed_evening: f64,
    ) -> Result<Self> {
        if bird_count == 0 {
            return Err(Error::InvalidInput(
                "Bird count must be greater than zero".to_string(),
            ));
        }

        let posture_rate = f64::from(total_eggs) / f64::from(bird_count) * 100.0;
        let loss_rate = if total_eggs > 0 {
            f64::from(broken_eggs) / f64::from(total_eggs) * 100.0
        } else {
            0.0
        };

        Ok(Self {
            total_feed: feed_morning + feed_evening,
            posture_rate,
            loss_rate,
        })
    }
}

/// One observation for one calendar day.
///
/// Records are immutable once created, apart from the sync flag, which only
/// the store flips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    id: RecordId,
    date: RecordDate,
    bird_count: u32,
    total_eggs: u32,
    broken_eggs: u32,
    #[serde(rename = "feedAm")]
    feed_morning: f64,
    #[serde(rename = "feedPm")]
    feed_evening: f64,
    responsible: String,
    #[serde(default)]
    notes: String,
    #[serde(flatten)]
    derived: DerivedMetrics,
    #[serde(default)]
    synced: bool,
}

impl Record {
    /// Build a new unsynced record from validated input.
    pub(crate) fn from_input(id: RecordId, input: RecordInput) -> Result<Self> {
        let date = input.validate()?;
        let derived = DerivedMetrics::compute(
            input.bird_count,
            input.total_eggs,
            input.broken_eggs,
            input.feed_morning,
            input.feed_evening,
        )?;

        Ok(Self {
            id,
            date,
            bird_count: input.bird_count,
            total_eggs: input.total_eggs,
            broken_eggs: input.broken_eggs,
            feed_morning: input.feed_morning,
            feed_evening: input.feed_evening,
            responsible: input.responsible.trim().to_string(),
            notes: input.notes.map(|n| n.trim().to_string()).unwrap_or_default(),
            derived,
            synced: false,
        })
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn date(&self) -> RecordDate {
        self.date
    }

    pub fn bird_count(&self) -> u32 {
        self.bird_count
    }

    pub fn total_eggs(&self) -> u32 {
        self.total_eggs
    }

    pub fn broken_eggs(&self) -> u32 {
        self.broken_eggs
    }

    pub fn feed_morning(&self) -> f64 {
        self.feed_morning
    }

    pub fn feed_evening(&self) -> f64 {
        self.feed_evening
    }

    pub fn responsible(&self) -> &str {
        &self.responsible
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn derived(&self) -> &DerivedMetrics {
        &self.derived
    }

    pub fn total_feed(&self) -> f64 {
        self.derived.total_feed
    }

    pub fn posture_rate(&self) -> f64 {
        self.derived.posture_rate
    }

    pub fn loss_rate(&self) -> f64 {
        self.derived.loss_rate
    }

    /// Whether a remote push of this record has ever succeeded.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub(crate) fn mark_synced(&mut self) {
        self.synced = true;
    }
}

/// Sort records newest first, keeping storage order among equal dates.
pub(crate) fn sort_newest_first(records: &mut [Record]) {
    records.sort_by(|a, b| b.date.cmp(&a.date));
}

/// Insert into a newest-first list, after any records sharing its date.
pub(crate) fn insert_newest_first(records: &mut Vec<Record>, record: Record) {
    let index = records.partition_point(|existing| existing.date >= record.date);
    records.insert(index, record);
}

#[cfg(test)]
pub(crate) fn sample_input(date: &str) -> RecordInput {
    RecordInput {
        date: date.to_string(),
        bird_count: 100,
        total_eggs: 90,
        broken_eggs: 5,
        feed_morning: 2.0,
        feed_evening: 1.5,
        responsible: "Ana".to_string(),
        notes: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn test_reference_scenario() {
        let record = Record::from_input(RecordId::generate(), sample_input("2024-05-01")).unwrap();

        assert!((record.total_feed() - 3.5).abs() < TOLERANCE);
        assert!((record.posture_rate() - 90.0).abs() < TOLERANCE);
        assert!((record.loss_rate() - 5.0 / 90.0 * 100.0).abs() < TOLERANCE);
        assert!((record.loss_rate() - 5.556).abs() < 1e-3);
        assert!(!record.is_synced());
    }

    #[test]
    fn test_zero_birds_rejected() {
        let mut input = sample_input("2024-05-01");
        input.bird_count = 0;

        let result = Record::from_input(RecordId::generate(), input);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_no_eggs_means_no_loss() {
        let metrics = DerivedMetrics::compute(50, 0, 0, 1.0, 1.0).unwrap();
        assert_eq!(metrics.loss_rate, 0.0);
        assert_eq!(metrics.posture_rate, 0.0);
    }

    #[test]
    fn test_validation_rejects_bad_input() {
        let mut input = sample_input("2024-05-01");
        input.broken_eggs = 91;
        assert!(input.validate().is_err());

        let mut input = sample_input("2024-05-01");
        input.feed_evening = -0.5;
        assert!(input.validate().is_err());

        let mut input = sample_input("2024-05-01");
        input.feed_morning = f64::NAN;
        assert!(input.validate().is_err());

        assert!(sample_input("01/05/2024").validate().is_err());
    }

    #[test]
    fn test_serialized_field_names() {
        let record = Record::from_input(RecordId::new("r1").unwrap(), sample_input("2024-05-01")).unwrap();
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["id"], "r1");
        assert_eq!(value["date"], "2024-05-01");
        assert_eq!(value["birdCount"], 100);
        assert_eq!(value["feedAm"], 2.0);
        assert_eq!(value["feedPm"], 1.5);
        assert_eq!(value["totalFeed"], 3.5);
        assert_eq!(value["synced"], false);
    }

    #[test]
    fn test_missing_synced_flag_defaults_to_false() {
        let json = r#"{
            "id": "legacy", "date": "2023-01-02", "birdCount": 10, "totalEggs": 8,
            "brokenEggs": 1, "feedAm": 0.5, "feedPm": 0.5, "responsible": "Rui",
            "notes": "", "postureRate": 80.0, "lossRate": 12.5, "totalFeed": 1.0
        }"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert!(!record.is_synced());
        assert_eq!(record.posture_rate(), 80.0);
    }

    #[test]
    fn test_insert_keeps_storage_order_for_ties() {
        let mut records = Vec::new();
        let first = Record::from_input(RecordId::new("a").unwrap(), sample_input("2024-01-02")).unwrap();
        let second = Record::from_input(RecordId::new("b").unwrap(), sample_input("2024-01-02")).unwrap();
        let older = Record::from_input(RecordId::new("c").unwrap(), sample_input("2024-01-01")).unwrap();

        insert_newest_first(&mut records, older);
        insert_newest_first(&mut records, first);
        insert_newest_first(&mut records, second);

        let ids: Vec<&str> = records.iter().map(|r| r.id().as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    proptest! {
        #[test]
        fn derived_fields_match_formulas(
            birds in 1u32..100_000,
            eggs in 0u32..100_000,
            broken_share in 0.0f64..=1.0,
            am in 0.0f64..1_000.0,
            pm in 0.0f64..1_000.0,
        ) {
            let broken = (f64::from(eggs) * broken_share).floor() as u32;
            let m = DerivedMetrics::compute(birds, eggs, broken, am, pm).unwrap();

            prop_assert!((m.total_feed - (am + pm)).abs() < TOLERANCE);
            prop_assert!((m.posture_rate - f64::from(eggs) / f64::from(birds) * 100.0).abs() < TOLERANCE);
            let expected_loss = if eggs > 0 { f64::from(broken) / f64::from(eggs) * 100.0 } else { 0.0 };
            prop_assert!((m.loss_rate - expected_loss).abs() < TOLERANCE);
        }

        #[test]
        fn newest_first_for_any_insertion_order(days in proptest::collection::vec(1u32..28, 0..40)) {
            let mut records = Vec::new();
            for (i, day) in days.iter().enumerate() {
                let record = Record::from_input(
                    RecordId::new(format!("r{}", i)).unwrap(),
                    sample_input(&format!("2024-02-{:02}", day)),
                ).unwrap();
                insert_newest_first(&mut records, record);
            }

            prop_assert_eq!(records.len(), days.len());
            for pair in records.windows(2) {
                prop_assert!(pair[0].date() >= pair[1].date());
            }
        }
    }
}
