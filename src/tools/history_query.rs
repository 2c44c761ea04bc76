//! Generic query tool over one JSONL history stream. One instance is
//! registered per stream (`moisture_history`, `water_pump_history`, ...),
//! each dispatching on an `action` parameter: recent, range, search, or
//! bucketed.

use super::traits::{Tool, ToolResult};
use crate::clock::Clock;
use crate::history::{Aggregation, BucketQuery, JsonlHistory, MAX_QUERY_HOURS, MAX_RECENT};
use async_trait::async_trait;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

pub struct HistoryQueryTool {
    name: String,
    description: String,
    history: Arc<JsonlHistory>,
    clock: Arc<dyn Clock>,
}

impl HistoryQueryTool {
    pub fn new(stream: &str, history: Arc<JsonlHistory>, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: format!("{stream}_history"),
            description: format!(
                "Query the {stream} history stream. Actions: recent (last N \
                 records, oldest first, max {MAX_RECENT}), range (between two \
                 RFC3339 timestamps), search (keyword over string fields \
                 within a lookback window), bucketed (time-bucketed sampling \
                 or aggregation, e.g. hourly means)."
            ),
            history,
            clock,
        }
    }

    fn handle_recent(&self, args: &serde_json::Value) -> ToolResult {
        let limit = args
            .get("limit")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(10) as usize;
        let offset = args
            .get("offset")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0) as usize;
        let records = self.history.get_recent(limit, offset);
        records_result(records)
    }

    fn handle_range(&self, args: &serde_json::Value) -> anyhow::Result<ToolResult> {
        let start = required_timestamp(args, "start")?;
        let end = required_timestamp(args, "end")?;
        if end < start {
            return Ok(ToolResult::rejected("'end' is before 'start'"));
        }
        Ok(records_result(self.history.get_range(start, end)))
    }

    fn handle_search(&self, args: &serde_json::Value) -> anyhow::Result<ToolResult> {
        let keyword = args
            .get("keyword")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("Missing 'keyword' parameter for search"))?;
        let hours = args
            .get("hours")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(24.0);
        if !hours.is_finite() || hours <= 0.0 || hours > MAX_QUERY_HOURS {
            return Ok(ToolResult::rejected(format!(
                "hours must be a positive number up to {MAX_QUERY_HOURS} (got {hours})"
            )));
        }
        Ok(records_result(
            self.history.search(keyword, hours, self.clock.now()),
        ))
    }

    fn handle_bucketed(&self, args: &serde_json::Value) -> anyhow::Result<ToolResult> {
        let hours = args
            .get("hours")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(24.0);
        let samples_per_hour = args
            .get("samples_per_hour")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(1.0);
        let aggregation = args
            .get("aggregation")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("last");
        let aggregation = match Aggregation::from_str(aggregation) {
            Ok(aggregation) => aggregation,
            Err(e) => return Ok(ToolResult::rejected(e.to_string())),
        };
        let value_field = args
            .get("value_field")
            .and_then(serde_json::Value::as_str)
            .map(String::from);

        let query = BucketQuery {
            hours,
            samples_per_hour,
            aggregation,
            value_field,
            end_time: self.clock.now(),
        };
        match self.history.get_bucketed(&query) {
            Ok(buckets) => Ok(records_result(buckets)),
            Err(e) => Ok(ToolResult::rejected(format!("[{}] {e}", e.kind()))),
        }
    }
}

fn required_timestamp(
    args: &serde_json::Value,
    field: &str,
) -> anyhow::Result<chrono::DateTime<chrono::Utc>> {
    let raw = args
        .get(field)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("Missing '{field}' parameter for range"))?;
    crate::history::parse_timestamp(raw)
        .ok_or_else(|| anyhow::anyhow!("'{field}' is not an RFC3339 timestamp: {raw}"))
}

fn records_result(records: Vec<serde_json::Value>) -> ToolResult {
    match serde_json::to_string_pretty(&json!({
        "count": records.len(),
        "records": records,
    })) {
        Ok(output) => ToolResult::ok(output),
        Err(e) => ToolResult::rejected(format!("failed to render records: {e}")),
    }
}

#[async_trait]
impl Tool for HistoryQueryTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["recent", "range", "search", "bucketed"],
                    "description": "Query to run"
                },
                "limit": {
                    "type": "integer",
                    "description": "recent: number of records (1-50, default 10)"
                },
                "offset": {
                    "type": "integer",
                    "description": "recent: records to skip from the newest end"
                },
                "start": {
                    "type": "string",
                    "description": "range: RFC3339 start (inclusive)"
                },
                "end": {
                    "type": "string",
                    "description": "range: RFC3339 end (inclusive)"
                },
                "keyword": {
                    "type": "string",
                    "description": "search: case-insensitive keyword"
                },
                "hours": {
                    "type": "number",
                    "description": "search/bucketed: lookback window, default 24, max 8784"
                },
                "samples_per_hour": {
                    "type": "number",
                    "description": "bucketed: bucket density, default 1 (hourly)"
                },
                "aggregation": {
                    "type": "string",
                    "enum": ["first", "last", "middle", "count", "sum", "mean"],
                    "description": "bucketed: how to reduce each bucket, default last"
                },
                "value_field": {
                    "type": "string",
                    "description": "bucketed: numeric field for sum/mean"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let action = args
            .get("action")
            .and_then(|value| value.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing 'action' parameter"))?;

        match action {
            "recent" => Ok(self.handle_recent(&args)),
            "range" => self.handle_range(&args),
            "search" => self.handle_search(&args),
            "bucketed" => self.handle_bucketed(&args),
            other => Ok(ToolResult::rejected(format!(
                "Unknown action '{other}'. Use recent/range/search/bucketed."
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;

    fn tool(tmp: &TempDir) -> (HistoryQueryTool, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap(),
        ));
        let history = Arc::new(JsonlHistory::new(tmp.path().join("moisture.jsonl"), 1000));
        let now = clock.now();
        for i in 0..48 {
            history
                .append(json!({
                    "timestamp": (now - Duration::minutes(30 * (48 - i))).to_rfc3339(),
                    "value": 1500 + i * 10,
                    "note": if i == 5 { "sensor recalibrated" } else { "steady" },
                }))
                .unwrap();
        }
        (
            HistoryQueryTool::new("moisture", history, clock.clone()),
            clock,
        )
    }

    #[tokio::test]
    async fn recent_returns_newest_records_oldest_first() {
        let tmp = TempDir::new().unwrap();
        let (tool, _clock) = tool(&tmp);

        let result = tool
            .execute(json!({ "action": "recent", "limit": 3 }))
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(body["count"], 3);
        let records = body["records"].as_array().unwrap();
        assert_eq!(records[0]["value"], 1950);
        assert_eq!(records[2]["value"], 1970);
    }

    #[tokio::test]
    async fn search_finds_keyword_within_window() {
        let tmp = TempDir::new().unwrap();
        let (tool, _clock) = tool(&tmp);

        let result = tool
            .execute(json!({ "action": "search", "keyword": "RECALIBRATED", "hours": 48.0 }))
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn bucketed_hourly_count_over_24h() {
        let tmp = TempDir::new().unwrap();
        let (tool, _clock) = tool(&tmp);

        let result = tool
            .execute(json!({
                "action": "bucketed", "hours": 24.0,
                "samples_per_hour": 1.0, "aggregation": "count"
            }))
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&result.output).unwrap();
        // Two records per hour, 24 buckets.
        assert_eq!(body["count"], 24);
        let records = body["records"].as_array().unwrap();
        assert!(records.iter().all(|b| b["value"] == 2));
    }

    #[tokio::test]
    async fn sum_without_value_field_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let (tool, _clock) = tool(&tmp);

        let result = tool
            .execute(json!({ "action": "bucketed", "aggregation": "sum" }))
            .await
            .unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn range_requires_well_formed_bounds() {
        let tmp = TempDir::new().unwrap();
        let (tool, _clock) = tool(&tmp);

        assert!(tool
            .execute(json!({ "action": "range", "start": "not-a-time", "end": "also-not" }))
            .await
            .is_err());

        let result = tool
            .execute(json!({
                "action": "range",
                "start": "2025-06-01T23:00:00Z",
                "end": "2025-06-02T00:00:00Z"
            }))
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(body["count"], 2);
    }

    #[tokio::test]
    async fn extreme_window_arguments_are_rejected_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let (tool, _clock) = tool(&tmp);

        // Windows past the supported range come back as rejections; the
        // arithmetic behind them must never bring the process down.
        let result = tool
            .execute(json!({ "action": "search", "keyword": "steady", "hours": 1e15 }))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("hours"));

        let result = tool
            .execute(json!({ "action": "bucketed", "hours": 1e15 }))
            .await
            .unwrap();
        assert!(!result.success);

        let result = tool
            .execute(json!({ "action": "bucketed", "hours": -1.0 }))
            .await
            .unwrap();
        assert!(!result.success);

        // Near-zero density collapses to one bucket over the whole window.
        let result = tool
            .execute(json!({
                "action": "bucketed", "hours": 24.0,
                "samples_per_hour": 1e-15, "aggregation": "count"
            }))
            .await
            .unwrap();
        assert!(result.success);
        let body: serde_json::Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(body["count"], 1);
        assert_eq!(body["records"][0]["value"], 48.0);
    }

    #[tokio::test]
    async fn unknown_action_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let (tool, _clock) = tool(&tmp);
        let result = tool.execute(json!({ "action": "drop" })).await.unwrap();
        assert!(!result.success);
    }
}
