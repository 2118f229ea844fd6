//! Windowed merge flow

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use sluice_core::{
    clock, Batch, Column, Comparator, Context, Field, Flow, Predicate, Result, Table, Value,
    ValueType, TAG_TIMESTAMP,
};

/// Name of the field carrying a merged row's window start
pub const WINDOW_FIELD: &str = "time";

/// Joins records whose timestamps fall into the same window.
///
/// Each record's timestamp (the `time_field` field, or the `_ts` tag) is
/// truncated to `window` seconds and used as the row key; fields of records
/// sharing a key are merged, last write wins. After every batch, rows whose
/// window started more than `wait_limit` ago are emitted as one record each,
/// with the window start in a `time` field.
pub struct Merge {
    window: i64,
    wait_limit: Duration,
    time_field: Option<String>,
    table: Mutex<Table<i64>>,
}

impl Merge {
    /// Build from `window` (seconds, default 1), `wait_limit` (default 5s)
    /// and `time_field` (default: the `_ts` tag)
    pub fn from_context(ctx: &Context) -> Self {
        let config = ctx.config();
        let time_field = match config.get_str("time_field", "") {
            "" => None,
            name => Some(name.to_string()),
        };
        Self::new(
            config.get_int("window", 1),
            config.get_duration("wait_limit", Duration::from_secs(5)),
            time_field,
        )
    }

    /// Merge flow with explicit settings
    pub fn new(window: i64, wait_limit: Duration, time_field: Option<String>) -> Self {
        Self {
            window: window.max(1),
            wait_limit,
            time_field,
            table: Mutex::new(Table::new([Column::new(WINDOW_FIELD, ValueType::Time)])),
        }
    }

    fn timestamp(&self, record: &sluice_core::Record) -> Option<DateTime<Utc>> {
        let value = match &self.time_field {
            Some(name) => record.get(name)?.to_time(),
            None => record.tag(TAG_TIMESTAMP)?.to_time(),
        };
        value.as_time()
    }
}

#[async_trait]
impl Flow for Merge {
    async fn close(&self) -> Result<()> {
        let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if !table.is_empty() {
            tracing::info!(rows = table.len(), "Dropping unmerged rows");
        }
        Ok(())
    }

    async fn process(&self, batch: Batch) -> Result<Batch> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);

        for record in batch {
            let Some(ts) = self.timestamp(&record) else {
                tracing::debug!("Record without timestamp skipped");
                continue;
            };
            let key = ts.timestamp().div_euclid(self.window) * self.window;
            let Some(start) = DateTime::<Utc>::from_timestamp(key, 0) else {
                continue;
            };
            let mut fields = record.into_fields();
            fields.push(Field::new(WINDOW_FIELD, start));
            table.set(key, fields);
        }

        let wait = TimeDelta::from_std(self.wait_limit).unwrap_or(TimeDelta::MAX);
        let threshold = clock::now()
            .checked_sub_signed(wait)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let ready = Predicate::field(WINDOW_FIELD, Comparator::Lt(Value::Time(threshold)));

        let (selected, pending) = std::mem::take(&mut *table).split(&ready);
        *table = pending;
        Ok(selected.into_records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sluice_core::Record;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn reading(secs: i64, name: &str, value: f64) -> Record {
        let mut record = Record::new().with(name, value);
        record.set_tag(TAG_TIMESTAMP, at(secs));
        record
    }

    #[tokio::test]
    async fn test_merge_joins_window_and_waits() {
        clock::set(|| at(12));
        let merge = Merge::new(10, Duration::from_secs(5), None);

        let out = merge
            .process(vec![
                reading(0, "temp", 20.5),
                reading(3, "humidity", 40.0),
                reading(10, "temp", 21.0),
            ])
            .await
            .unwrap();
        clock::reset();

        // window [0,10) ended before now - 5s; window [10,20) is still open
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("temp"), Some(&Value::Float(20.5)));
        assert_eq!(out[0].get("humidity"), Some(&Value::Float(40.0)));
        assert_eq!(out[0].get(WINDOW_FIELD), Some(&Value::Time(at(0))));
        assert_eq!(merge.table.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_merge_uses_time_field() {
        let merge = Merge::new(60, Duration::ZERO, Some("at".to_string()));
        let record = Record::new().with("at", at(-3600)).with("v", 1);
        let undated = Record::new().with("v", 2);

        let out = merge.process(vec![record, undated]).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("v"), Some(&Value::Int(1)));
    }
}
