#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parcel_core::{FetchOutcome, RetryPolicy, OBJECT_ID_COLUMN, OUTPUT_COLUMNS};
use parcel_engine::{AttributeClient, HarvestEvent, ProgressSink};

type Responder = dyn Fn(&str, u32) -> FetchOutcome + Send + Sync;

/// In-memory attribute API answering from a closure of `(object_id, attempt)`.
pub struct ScriptedClient {
    respond: Box<Responder>,
    calls: Mutex<HashMap<String, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Duration,
}

impl ScriptedClient {
    pub fn new(respond: impl Fn(&str, u32) -> FetchOutcome + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls_for(&self, object_id: &str) -> u32 {
        self.calls.lock().unwrap().get(object_id).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AttributeClient for ScriptedClient {
    async fn fetch_attributes(&self, object_id: &str) -> FetchOutcome {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(object_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.respond)(object_id, attempt)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<HarvestEvent>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<HarvestEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: HarvestEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 5,
        rate_limit_base: Duration::from_millis(1),
        transient_delay: Duration::from_millis(1),
    }
}

/// Input table with object ids `1..=count`.
pub fn write_input(dir: &Path, count: usize) -> PathBuf {
    let path = dir.join("input.csv");
    let mut content = String::from("parcel_id,parcel_objectid,lon,lat\n");
    for id in 1..=count {
        content.push_str(&format!("P{id},{id},46.{id},24.{id}\n"));
    }
    fs::write(&path, content).unwrap();
    path
}

pub struct OutputTable {
    pub raw: String,
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl OutputTable {
    pub fn column(&self, name: &str) -> Vec<String> {
        self.rows.iter().map(|row| row[name].clone()).collect()
    }

    pub fn header_lines(&self) -> usize {
        self.raw
            .lines()
            .filter(|line| line.trim_start_matches('\u{feff}').starts_with("parcel_id,parcel_objectid"))
            .count()
    }
}

pub fn read_output(path: &Path) -> OutputTable {
    let raw = fs::read_to_string(path).unwrap();
    let mut reader = csv::Reader::from_reader(raw.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .unwrap()
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    let rows = reader
        .records()
        .map(|record| {
            let record = record.unwrap();
            headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect()
        })
        .collect();
    OutputTable { raw, headers, rows }
}

pub fn expected_headers() -> Vec<String> {
    OUTPUT_COLUMNS.iter().map(|c| c.to_string()).collect()
}

pub fn object_ids(table: &OutputTable) -> Vec<String> {
    table.column(OBJECT_ID_COLUMN)
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}

/// Vector tile holding one 100x100 square per `(x0, y0, object_id)`, with
/// corners in the codec's y-down space.
pub fn parcel_tile(extent: u32, parcels: &[(f64, f64, &str)]) -> Vec<u8> {
    let mut tile = mvt::Tile::new(extent);
    let mut layer = tile.create_layer("parcels");
    for (x0, y0, object_id) in parcels {
        let geom = [
            (*x0, *y0),
            (x0 + 100.0, *y0),
            (x0 + 100.0, y0 + 100.0),
            (*x0, y0 + 100.0),
        ]
        .iter()
        .try_fold(
            mvt::GeomEncoder::new(mvt::GeomType::Polygon),
            |enc, (x, y)| enc.point(*x, *y),
        )
        .and_then(|enc| enc.complete())
        .and_then(|enc| enc.encode())
        .unwrap();
        let mut feature = layer.into_feature(geom);
        feature.add_tag_string("parcel_objectid", object_id);
        feature.add_tag_string("parcel_id", &format!("P{object_id}"));
        layer = feature.into_layer();
    }
    tile.add_layer(layer).unwrap();
    tile.to_bytes().unwrap()
}
