//! Append-only JSONL history store with a bounded in-memory cache.
//!
//! Every care stream (moisture readings, water events, light events,
//! thoughts, actions, camera usage, plant status) is one `JsonlHistory`
//! backed by one newline-delimited JSON file. The file is the source of
//! truth and is never rewritten; the deque is a fixed-size cache replayed
//! lazily from disk on first access. Records carry a UTC RFC3339
//! `timestamp` field supplied by the caller at write time, so appends are
//! non-decreasing in time by construction.

use crate::error::ToolError;
use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Hard cap on `get_recent` page size.
pub const MAX_RECENT: usize = 50;

/// Widest supported lookback window (one leap year). Timestamp arithmetic
/// with arbitrarily large caller-supplied windows would overflow chrono's
/// `DateTime` range and panic, so every window query is bounded by this.
pub const MAX_QUERY_HOURS: f64 = 24.0 * 366.0;

/// Bucket selection / aggregation strategy for time-bucketed queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Return the earliest raw record per non-empty bucket.
    First,
    /// Return the latest raw record per non-empty bucket.
    Last,
    /// Return the middle raw record per non-empty bucket.
    Middle,
    /// Return `{bucket_start, bucket_end, value: record count, count}`.
    Count,
    /// Sum a numeric field per bucket.
    Sum,
    /// Mean of a numeric field per bucket.
    Mean,
}

impl Aggregation {
    pub fn needs_value_field(self) -> bool {
        matches!(self, Aggregation::Sum | Aggregation::Mean)
    }

    fn is_sampling(self) -> bool {
        matches!(
            self,
            Aggregation::First | Aggregation::Last | Aggregation::Middle
        )
    }
}

impl FromStr for Aggregation {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(Aggregation::First),
            "last" => Ok(Aggregation::Last),
            "middle" => Ok(Aggregation::Middle),
            "count" => Ok(Aggregation::Count),
            "sum" => Ok(Aggregation::Sum),
            "mean" => Ok(Aggregation::Mean),
            other => Err(ToolError::Validation(format!(
                "unknown aggregation '{other}'; expected first|last|middle|count|sum|mean"
            ))),
        }
    }
}

/// Parameters for [`JsonlHistory::get_bucketed`].
#[derive(Debug, Clone)]
pub struct BucketQuery {
    /// Window length looking back from `end_time`.
    pub hours: f64,
    /// Bucket density: 6 = every 10 minutes, 1 = hourly.
    pub samples_per_hour: f64,
    pub aggregation: Aggregation,
    /// Field to aggregate; required for sum/mean.
    pub value_field: Option<String>,
    /// End of the window, typically "now" from the caller's clock.
    pub end_time: DateTime<Utc>,
}

struct Inner {
    entries: VecDeque<Value>,
    loaded: bool,
}

pub struct JsonlHistory {
    path: PathBuf,
    max_memory_entries: usize,
    inner: Mutex<Inner>,
}

impl JsonlHistory {
    pub fn new(path: impl Into<PathBuf>, max_memory_entries: usize) -> Self {
        Self {
            path: path.into(),
            max_memory_entries: max_memory_entries.max(1),
            inner: Mutex::new(Inner {
                entries: VecDeque::new(),
                loaded: false,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record: disk first, then the cache, so a failed disk
    /// write never leaves the cache claiming a record the file lacks.
    /// Disk failure is logged and propagated, not retried.
    pub fn append(&self, record: Value) -> Result<(), ToolError> {
        let mut inner = self.inner.lock();
        self.ensure_loaded(&mut inner);

        if let Err(e) = self.write_line(&record) {
            tracing::warn!(path = %self.path.display(), "history append failed: {e}");
            return Err(ToolError::Io(e));
        }

        inner.entries.push_back(record);
        while inner.entries.len() > self.max_memory_entries {
            inner.entries.pop_front();
        }
        Ok(())
    }

    fn write_line(&self, record: &Value) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(record).map_err(std::io::Error::other)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    /// Replay the backing file into the cache. Idempotent; a no-op after the
    /// first pass. Malformed lines are skipped with a warning so partial
    /// corruption never prevents startup.
    fn ensure_loaded(&self, inner: &mut Inner) {
        if inner.loaded {
            return;
        }
        inner.loaded = true;

        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no existing history");
                return;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "failed to replay history: {e}");
                return;
            }
        };

        let mut entries: VecDeque<Value> = VecDeque::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(record) => {
                    entries.push_back(record);
                    if entries.len() > self.max_memory_entries {
                        entries.pop_front();
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        "skipping malformed history line: {e}"
                    );
                }
            }
        }
        tracing::debug!(
            path = %self.path.display(),
            entries = entries.len(),
            "replayed history"
        );
        inner.entries = entries;
    }

    /// The `n` most recent records, skipping `offset` from the end.
    /// `n` is clamped to [`MAX_RECENT`]. The returned slice is in
    /// chronological order (oldest first); callers wanting newest-first
    /// reverse it. Every stream uses this one convention.
    pub fn get_recent(&self, n: usize, offset: usize) -> Vec<Value> {
        let n = n.clamp(1, MAX_RECENT);
        let mut inner = self.inner.lock();
        self.ensure_loaded(&mut inner);

        let total = inner.entries.len();
        let end = total.saturating_sub(offset);
        let start = end.saturating_sub(n);
        inner.entries.iter().skip(start).take(end - start).cloned().collect()
    }

    /// All cached records with `timestamp` in `[start, end]` inclusive.
    /// Reads only the in-memory cache: a window predating the cache's
    /// oldest entry returns silently incomplete results by design.
    pub fn get_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Value> {
        let mut inner = self.inner.lock();
        self.ensure_loaded(&mut inner);

        inner
            .entries
            .iter()
            .filter(|record| {
                record_timestamp(record).is_some_and(|ts| ts >= start && ts <= end)
            })
            .cloned()
            .collect()
    }

    /// Records within the trailing `hours` window ending at `now`.
    /// Non-finite or out-of-range `hours` clamp to `[0, MAX_QUERY_HOURS]`
    /// so the subtraction below cannot leave chrono's timestamp range.
    pub fn get_window(&self, hours: f64, now: DateTime<Utc>) -> Vec<Value> {
        let hours = if hours.is_finite() {
            hours.clamp(0.0, MAX_QUERY_HOURS)
        } else {
            0.0
        };
        let cutoff = now - chrono::Duration::milliseconds((hours * 3_600_000.0) as i64);
        self.get_range(cutoff, now)
    }

    /// Case-insensitive substring match over every string-valued field
    /// (nested fields included) of records in the trailing window.
    pub fn search(&self, keyword: &str, hours: f64, now: DateTime<Utc>) -> Vec<Value> {
        let needle = keyword.to_lowercase();
        self.get_window(hours, now)
            .into_iter()
            .filter(|record| contains_keyword(record, &needle))
            .collect()
    }

    /// Partition `[end_time - hours, end_time]` into equal-width buckets of
    /// `1/samples_per_hour` hours and reduce each bucket per the query's
    /// aggregation. Sampling modes return the selected raw record per
    /// non-empty bucket; aggregate modes return
    /// `{bucket_start, bucket_end, value, count}`. Buckets holding no
    /// records are omitted, not zero-filled. For sum/mean, records whose
    /// `value_field` is missing or non-numeric are skipped and do not count
    /// toward `count`.
    pub fn get_bucketed(&self, query: &BucketQuery) -> Result<Vec<Value>, ToolError> {
        if !query.hours.is_finite() || query.hours <= 0.0 || query.hours > MAX_QUERY_HOURS {
            return Err(ToolError::Validation(format!(
                "hours must be a positive number up to {MAX_QUERY_HOURS} (got {})",
                query.hours
            )));
        }
        if !query.samples_per_hour.is_finite() || query.samples_per_hour <= 0.0 {
            return Err(ToolError::Validation(
                "samples_per_hour must be a positive number".into(),
            ));
        }
        if query.aggregation.needs_value_field() && query.value_field.is_none() {
            return Err(ToolError::Validation(
                "value_field is required for sum/mean aggregation".into(),
            ));
        }

        let end = query.end_time;
        let window_ms = (query.hours * 3_600_000.0) as i64;
        if window_ms < 1 {
            return Err(ToolError::Validation(
                "hours window is too small to hold a bucket".into(),
            ));
        }
        let start = end - chrono::Duration::milliseconds(window_ms);
        let bucket_ms_f = 3_600_000.0 / query.samples_per_hour;
        if bucket_ms_f < 1.0 {
            return Err(ToolError::Validation(
                "samples_per_hour is too dense for the requested window".into(),
            ));
        }
        // A bucket wider than the window degenerates to one bucket; capping
        // here keeps the bucket-advance arithmetic inside the window.
        let bucket_ms = (bucket_ms_f.min(window_ms as f64) as i64).max(1);

        // Window records paired with parsed timestamps, in insertion order.
        let records: Vec<(DateTime<Utc>, Value)> = self
            .get_range(start, end)
            .into_iter()
            .filter_map(|record| record_timestamp(&record).map(|ts| (ts, record)))
            .collect();

        let mut out = Vec::new();
        let mut bucket_start = start;
        while bucket_start < end {
            let bucket_end = (bucket_start + chrono::Duration::milliseconds(bucket_ms)).min(end);
            let last_bucket = bucket_end == end;
            let bucket: Vec<&(DateTime<Utc>, Value)> = records
                .iter()
                .filter(|(ts, _)| {
                    *ts >= bucket_start && (*ts < bucket_end || (last_bucket && *ts <= bucket_end))
                })
                .collect();

            if !bucket.is_empty() {
                if query.aggregation.is_sampling() {
                    let picked = match query.aggregation {
                        Aggregation::First => bucket.first(),
                        Aggregation::Last => bucket.last(),
                        _ => bucket.get(bucket.len() / 2),
                    };
                    if let Some((_, record)) = picked {
                        out.push(record.clone());
                    }
                } else {
                    out.push(reduce_bucket(
                        &bucket,
                        query.aggregation,
                        query.value_field.as_deref(),
                        bucket_start,
                        bucket_end,
                    ));
                }
            }

            bucket_start = bucket_end;
        }
        Ok(out)
    }

    /// Number of records currently cached.
    pub fn len(&self) -> usize {
        let mut inner = self.inner.lock();
        self.ensure_loaded(&mut inner);
        inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn reduce_bucket(
    bucket: &[&(DateTime<Utc>, Value)],
    aggregation: Aggregation,
    value_field: Option<&str>,
    bucket_start: DateTime<Utc>,
    bucket_end: DateTime<Utc>,
) -> Value {
    let (value, count) = match aggregation {
        Aggregation::Count => (bucket.len() as f64, bucket.len()),
        _ => {
            let field = value_field.unwrap_or_default();
            let numbers: Vec<f64> = bucket
                .iter()
                .filter_map(|(_, record)| record.get(field).and_then(Value::as_f64))
                .collect();
            let sum: f64 = numbers.iter().sum();
            let value = match aggregation {
                Aggregation::Sum => sum,
                // Mean of an empty set is reported as 0 with count 0.
                _ => {
                    if numbers.is_empty() {
                        0.0
                    } else {
                        sum / numbers.len() as f64
                    }
                }
            };
            (value, numbers.len())
        }
    };

    serde_json::json!({
        "bucket_start": bucket_start.to_rfc3339(),
        "bucket_end": bucket_end.to_rfc3339(),
        "value": value,
        "count": count,
    })
}

/// Parse a record's `timestamp` field. Accepts RFC3339 (with offset or `Z`)
/// and falls back to naive ISO-8601 interpreted as UTC, matching what older
/// history files contain.
pub fn record_timestamp(record: &Value) -> Option<DateTime<Utc>> {
    let raw = record.get("timestamp")?.as_str()?;
    parse_timestamp(raw)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn contains_keyword(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Array(items) => items.iter().any(|item| contains_keyword(item, needle)),
        Value::Object(map) => map.values().any(|item| contains_keyword(item, needle)),
        _ => false,
    }
}
