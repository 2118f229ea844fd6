//! Built-in inlets

use std::time::Duration;

use async_trait::async_trait;
use sluice_core::{Context, Error, Field, Inlet, Next, Record, Result};

/// Emits the configured `records` in batches of `batch_size`, then ends
#[derive(Debug)]
pub struct StaticRecords {
    records: Vec<Record>,
    batch_size: usize,
}

impl StaticRecords {
    /// Build from `records` (list of maps) and `batch_size` (default 1)
    pub fn from_context(ctx: &Context) -> Result<Self> {
        let config = ctx.config();
        let records = config
            .get_list("records")
            .iter()
            .map(|item| {
                let map = item
                    .as_map()
                    .ok_or_else(|| Error::plugin("static", "each record must be a map"))?;
                let fields = map
                    .iter()
                    .filter_map(|(name, value)| value.to_value().map(|v| Field::new(name, v)))
                    .collect();
                Ok(Record::from_fields(fields))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            records,
            batch_size: config.get_uint("batch_size", 1).max(1) as usize,
        })
    }

    /// Emit `records` directly
    pub fn new(records: Vec<Record>, batch_size: usize) -> Self {
        Self {
            records,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl Inlet for StaticRecords {
    async fn process(&mut self, next: &mut Next) -> Result<()> {
        let mut records = std::mem::take(&mut self.records).into_iter().peekable();
        while records.peek().is_some() {
            let batch: Vec<Record> = records.by_ref().take(self.batch_size).collect();
            next.send(batch).await?;
        }
        Err(Error::EndOfStream)
    }
}

/// Emits `{ <field>: n }` on every tick, ending after `limit` ticks if set
#[derive(Debug)]
pub struct Counter {
    field: String,
    interval: Duration,
    limit: u64,
    count: u64,
}

impl Counter {
    /// Build from `field` (default `count`), `interval` (default 1s) and
    /// `limit` (default 0, unlimited)
    pub fn from_context(ctx: &Context) -> Self {
        let config = ctx.config();
        Self {
            field: config.get_str("field", "count").to_string(),
            interval: config.get_duration("interval", Duration::from_secs(1)),
            limit: config.get_uint("limit", 0),
            count: 0,
        }
    }

    /// Configured tick period
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl Inlet for Counter {
    async fn process(&mut self, next: &mut Next) -> Result<()> {
        self.count += 1;
        let value = i64::try_from(self.count).unwrap_or(i64::MAX);
        next.send(vec![Record::new().with(self.field.as_str(), value)])
            .await?;
        if self.limit > 0 && self.count >= self.limit {
            return Err(Error::EndOfStream);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::{ConfigMap, ConfigValue, Value};
    use tokio::sync::mpsc;

    fn ctx(params: ConfigMap) -> Context {
        Context::new("test", ConfigMap::new()).derive(
            sluice_core::ComponentKind::Inlet,
            "test",
            &params,
        )
    }

    #[tokio::test]
    async fn test_static_records_in_batches() {
        let records: Vec<ConfigValue> = (1..=5i64)
            .map(|n| ConfigValue::from(ConfigMap::new().with("a", n)))
            .collect();
        let params = ConfigMap::new()
            .with("records", records)
            .with("batch_size", 2i64);
        let mut inlet = StaticRecords::from_context(&ctx(params)).unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let mut next = Next::new("seed", tx);
        let err = inlet.process(&mut next).await.unwrap_err();
        assert!(err.is_end_of_stream());
        drop(next);

        let mut sizes = Vec::new();
        while let Some(batch) = rx.recv().await {
            sizes.push(batch.len());
        }
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_static_records_reject_non_maps() {
        let params = ConfigMap::new().with("records", vec![ConfigValue::from(3i64)]);
        assert!(StaticRecords::from_context(&ctx(params)).is_err());
    }

    #[tokio::test]
    async fn test_counter_stops_at_limit() {
        let params = ConfigMap::new()
            .with("field", "ticks")
            .with("limit", 2i64)
            .with("interval", "3s");
        let mut counter = Counter::from_context(&ctx(params));
        assert_eq!(counter.interval(), Duration::from_secs(3));

        let (tx, mut rx) = mpsc::channel(8);
        let mut next = Next::new("ticker", tx);
        counter.process(&mut next).await.unwrap();
        assert!(counter.process(&mut next).await.unwrap_err().is_end_of_stream());

        assert_eq!(rx.recv().await.unwrap()[0].get("ticks"), Some(&Value::Int(1)));
        assert_eq!(rx.recv().await.unwrap()[0].get("ticks"), Some(&Value::Int(2)));
    }
}
