//! Clock override
//!
//! Kept in its own test binary: the clock is process-global.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sluice_core::{
    clock, Batch, Config, Outlet, Record, Registry, Result, Value, TAG_TIMESTAMP,
};
use sluice_runtime::{Pipeline, plugins};

// tests in this binary share the clock
static SERIAL: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

struct Collect(Arc<Mutex<Vec<Record>>>);

#[async_trait]
impl Outlet for Collect {
    async fn handle(&mut self, batch: Batch) -> Result<()> {
        self.0.lock().unwrap().extend(batch);
        Ok(())
    }
}

#[tokio::test]
async fn test_injected_clock_stamps_records() {
    let _serial = SERIAL.lock().await;
    let fixed = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
    clock::set(move || fixed);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let registry = Registry::new();
    plugins::register_all(&registry);
    registry.register_outlet("collect", {
        let seen = Arc::clone(&seen);
        move |_| Ok(Box::new(Collect(Arc::clone(&seen))))
    });

    let project = Config::parse(
        r#"
pipelines:
  - name: frozen
    inlets:
      - plugin: static
        records: [{a: 1}, {a: 2}, {a: 3}]
    outlets:
      - plugin: collect
"#,
    )
    .unwrap();
    let pipeline = Pipeline::new(
        project.pipelines[0].clone(),
        &project.defaults,
        Arc::new(registry),
    );
    pipeline.run().await.unwrap();
    clock::reset();

    let records = seen.lock().unwrap().clone();
    assert_eq!(records.len(), 3);
    for record in &records {
        assert_eq!(record.tag(TAG_TIMESTAMP), Some(&Value::Time(fixed)));
    }
}

#[tokio::test]
async fn test_merge_windows_follow_injected_clock() {
    let _serial = SERIAL.lock().await;
    // readings at 0s, 3s and 12s; with now = 12s and a 5s wait only [0,10) is due
    let base = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let registry = Registry::new();
    plugins::register_all(&registry);
    registry.register_outlet("collect", {
        let seen = Arc::clone(&seen);
        move |_| Ok(Box::new(Collect(Arc::clone(&seen))))
    });

    let project = Config::parse(&format!(
        r#"
pipelines:
  - name: windows
    inlets:
      - plugin: static
        batch_size: 10
        records:
          - {{at: "{t0}", temp: 20}}
          - {{at: "{t3}", humidity: 40}}
          - {{at: "{t12}", temp: 21}}
    flows:
      - plugin: merge
        window: 10
        wait_limit: 5s
        time_field: at
    outlets:
      - plugin: collect
"#,
        t0 = base.to_rfc3339(),
        t3 = (base + chrono::TimeDelta::seconds(3)).to_rfc3339(),
        t12 = (base + chrono::TimeDelta::seconds(12)).to_rfc3339(),
    ))
    .unwrap();

    let now = base + chrono::TimeDelta::seconds(12);
    clock::set(move || now);
    let pipeline = Pipeline::new(
        project.pipelines[0].clone(),
        &project.defaults,
        Arc::new(registry),
    );
    pipeline.run().await.unwrap();
    clock::reset();

    let records = seen.lock().unwrap().clone();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("temp"), Some(&Value::Int(20)));
    assert_eq!(records[0].get("humidity"), Some(&Value::Int(40)));
    assert_eq!(records[0].get("time"), Some(&Value::Time(base)));
}
