//! Time-bounded schedule tables and repeating daily schedules.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use glyco_traits::ScheduleEntry;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::SensitivityMode;
use crate::error::{ForecastError, Result, ScheduleKind};

/// Ordered, non-overlapping absolute-time schedule entries.
///
/// Gaps are allowed in the table itself; reading a value inside a gap is what
/// produces `IncompleteScheduleCoverage`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleTable<V> {
    entries: Vec<ScheduleEntry<V>>,
}

impl<V> Default for ScheduleTable<V> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<V> ScheduleTable<V> {
    /// Validate and wrap entries. They must have `start < end`, be sorted by
    /// start and not overlap.
    pub fn new(entries: Vec<ScheduleEntry<V>>) -> Result<Self> {
        for (i, e) in entries.iter().enumerate() {
            if e.start >= e.end {
                return Err(ForecastError::InvalidInput(format!(
                    "schedule entry {i} has an empty or inverted interval"
                )));
            }
        }
        if let Some(i) = entries.windows(2).position(|w| w[1].start < w[0].end) {
            return Err(ForecastError::InvalidInput(format!(
                "schedule entries {i} and {} overlap or are out of order",
                i + 1
            )));
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ScheduleEntry<V>] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entry containing `t`, or failing that the closest one ending before it.
    pub fn entry_at_or_before(&self, t: DateTime<Utc>) -> Option<&ScheduleEntry<V>> {
        let idx = self.entries.partition_point(|e| e.start <= t);
        idx.checked_sub(1).map(|i| &self.entries[i])
    }

    /// Entry whose interval contains `t`.
    pub fn entry_at(&self, t: DateTime<Utc>) -> Option<&ScheduleEntry<V>> {
        self.entry_at_or_before(t).filter(|e| e.contains(t))
    }

    /// True when the entries leave no hole anywhere in `[start, end)`.
    pub fn covers(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        if end <= start {
            return true;
        }
        let mut reached = start;
        let from = self.entries.partition_point(|e| e.end <= start);
        for e in &self.entries[from..] {
            if e.start > reached {
                return false;
            }
            reached = reached.max(e.end);
            if reached >= end {
                return true;
            }
        }
        false
    }
}

impl<V: Copy> ScheduleTable<V> {
    pub fn value_at(&self, t: DateTime<Utc>) -> Option<V> {
        self.entry_at(t).map(|e| e.value)
    }

    /// Value at `t`, or the coverage error naming this schedule.
    pub fn require_at(&self, kind: ScheduleKind, t: DateTime<Utc>) -> Result<V> {
        self.value_at(t)
            .ok_or(ForecastError::IncompleteScheduleCoverage { schedule: kind, at: t })
    }

    /// Entries overlapping `[start, end)`, truncated to that interval.
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<ScheduleEntry<V>> {
        if end <= start {
            return Vec::new();
        }
        let from = self.entries.partition_point(|e| e.end <= start);
        self.entries[from..]
            .iter()
            .take_while(|e| e.start < end)
            .map(|e| ScheduleEntry::new(e.start.max(start), e.end.min(end), e.value))
            .collect()
    }
}

impl ScheduleTable<f64> {
    /// Sensitivity applying to an effect of a dose started at `dose_start`,
    /// observed at `t`.
    pub(crate) fn sensitivity_for(
        &self,
        mode: SensitivityMode,
        dose_start: DateTime<Utc>,
        t: DateTime<Utc>,
    ) -> Result<f64> {
        let at = match mode {
            SensitivityMode::DoseStart => dose_start,
            SensitivityMode::EffectTime => t,
        };
        self.require_at(ScheduleKind::Sensitivity, at)
    }
}

impl<V: Serialize> Serialize for ScheduleTable<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for ScheduleTable<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let entries = Vec::<ScheduleEntry<V>>::deserialize(deserializer)?;
        ScheduleTable::new(entries).map_err(serde::de::Error::custom)
    }
}

/// A schedule repeating every UTC day, as `(minutes past midnight, value)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySchedule<V> {
    items: Vec<(u32, V)>,
}

impl<V: Copy> DailySchedule<V> {
    /// First item must start at minute 0; offsets increase strictly and stay
    /// inside one day.
    pub fn new(items: Vec<(u32, V)>) -> Result<Self> {
        match items.first() {
            None => {
                return Err(ForecastError::InvalidInput("daily schedule is empty".into()));
            }
            Some((first, _)) if *first != 0 => {
                return Err(ForecastError::InvalidInput(
                    "daily schedule must start at minute 0".into(),
                ));
            }
            _ => {}
        }
        if items.windows(2).any(|w| w[1].0 <= w[0].0) || items.iter().any(|(m, _)| *m >= 24 * 60) {
            return Err(ForecastError::InvalidInput(
                "daily schedule offsets must increase strictly within one day".into(),
            ));
        }
        Ok(Self { items })
    }

    /// Constant value all day.
    pub fn constant(value: V) -> Self {
        Self {
            items: vec![(0, value)],
        }
    }

    pub fn items(&self) -> &[(u32, V)] {
        &self.items
    }

    /// Expand into absolute entries covering exactly `[start, end)`.
    pub fn table_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> ScheduleTable<V> {
        let mut entries = Vec::new();
        let mut day = start.date_naive().and_time(NaiveTime::MIN).and_utc();
        while day < end {
            for (i, (offset, value)) in self.items.iter().enumerate() {
                let s = day + Duration::minutes(i64::from(*offset));
                let e = self
                    .items
                    .get(i + 1)
                    .map_or(day + Duration::days(1), |(next, _)| {
                        day + Duration::minutes(i64::from(*next))
                    });
                let (s, e) = (s.max(start), e.min(end));
                if s < e {
                    entries.push(ScheduleEntry::new(s, e, *value));
                }
            }
            day += Duration::days(1);
        }
        ScheduleTable { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 10, h, m, 0).unwrap()
    }

    #[test]
    fn rejects_overlap() {
        let err = ScheduleTable::new(vec![
            ScheduleEntry::new(at(0, 0), at(2, 0), 1.0),
            ScheduleEntry::new(at(1, 0), at(3, 0), 2.0),
        ])
        .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidInput(_)));
    }

    #[test]
    fn lookup_prefers_containing_entry() {
        let table = ScheduleTable::new(vec![
            ScheduleEntry::new(at(0, 0), at(1, 0), 1.0),
            ScheduleEntry::new(at(2, 0), at(3, 0), 2.0),
        ])
        .unwrap();
        assert_eq!(table.value_at(at(0, 30)), Some(1.0));
        assert_eq!(table.value_at(at(1, 30)), None);
        assert_eq!(table.entry_at_or_before(at(1, 30)).map(|e| e.value), Some(1.0));
        assert!(!table.covers(at(0, 0), at(3, 0)));
        assert!(table.covers(at(2, 10), at(2, 50)));
    }

    #[test]
    fn daily_expansion_crosses_midnight() {
        let daily = DailySchedule::new(vec![(0, 0.8), (22 * 60, 1.2)]).unwrap();
        let start = at(21, 0);
        let end = start + Duration::hours(4);
        let table = daily.table_between(start, end);
        let values: Vec<f64> = table.entries().iter().map(|e| e.value).collect();
        assert_eq!(values, vec![0.8, 1.2, 0.8]);
        assert!(table.covers(start, end));
        assert_eq!(table.entries()[0].start, start);
        assert_eq!(table.entries().last().map(|e| e.end), Some(end));
    }
}
