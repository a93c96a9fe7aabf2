//! Health Prober: status endpoint polling
//!
//! The report is free-form JSON with at least an `ok` flag. Fields the
//! dashboard backend is known to send are typed; anything else, including a
//! known field carrying an unexpected type, is kept in `extra`. Decoding a
//! JSON object never fails.

use crate::client::ApiClient;
use crate::error::ConnectResult;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Source of health reports
#[async_trait]
pub trait HealthSource: Send + Sync {
    async fn probe(&self) -> ConnectResult<HealthReport>;
}

/// Entity counts reported by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCounts {
    pub events: u64,
    pub assets: u64,
    pub alerts: u64,
}

impl HealthCounts {
    /// Missing entries count as zero; any unreadable entry rejects the whole object
    fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let entry = |name: &str| match object.get(name) {
            None | Some(Value::Null) => Some(0),
            Some(v) => as_count(v),
        };
        Some(Self {
            events: entry("events")?,
            assets: entry("assets")?,
            alerts: entry("alerts")?,
        })
    }
}

/// Parsed `GET /api/health` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct HealthReport {
    pub ok: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub utc: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<HealthCounts>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_backlog: Option<u64>,

    /// Backing store status, `{ "ok": bool, ... }`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<Value>,

    /// Server-side latest timestamps per collection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,

    /// Set on synthesized reports when the probe itself failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<Map<String, Value>> for HealthReport {
    fn from(mut fields: Map<String, Value>) -> Self {
        // anything but an explicit true is not healthy
        let ok = match fields.remove("ok") {
            Some(Value::Bool(ok)) => ok,
            Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        };

        Self {
            ok,
            utc: take_typed(&mut fields, "utc"),
            started_at: take_typed(&mut fields, "started_at"),
            uptime_seconds: take_with(&mut fields, "uptime_seconds", as_count),
            counts: take_with(&mut fields, "counts", HealthCounts::from_value),
            stream_backlog: take_with(&mut fields, "stream_backlog", as_count),
            redis: take_typed(&mut fields, "redis"),
            freshness: take_typed(&mut fields, "freshness"),
            latency_ms: take_with(&mut fields, "latency_ms", Value::as_f64),
            error: take_typed(&mut fields, "error"),
            extra: fields,
        }
    }
}

/// Non-negative integer, accepting whole-number floats and numeric strings
fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.round() as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Remove `key` and convert it; a value that does not convert goes back into
/// `fields` so it ends up in `extra`
fn take_with<T>(
    fields: &mut Map<String, Value>,
    key: &str,
    convert: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    let value = fields.remove(key)?;
    if value.is_null() {
        return None;
    }
    let converted = convert(&value);
    if converted.is_none() {
        fields.insert(key.to_string(), value);
    }
    converted
}

fn take_typed<T: DeserializeOwned>(fields: &mut Map<String, Value>, key: &str) -> Option<T> {
    take_with(fields, key, |value| T::deserialize(value).ok())
}

/// Coarse classification shown on the status chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthClass {
    Healthy,
    Degraded,
}

impl fmt::Display for HealthClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthClass::Healthy => write!(f, "healthy"),
            HealthClass::Degraded => write!(f, "degraded"),
        }
    }
}

impl HealthReport {
    /// Report standing in for a failed probe
    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            utc: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// False only when the backend explicitly reports its store as down
    pub fn dependencies_ok(&self) -> bool {
        self.redis
            .as_ref()
            .and_then(|redis| redis.get("ok"))
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    pub fn classify(&self) -> HealthClass {
        if self.ok && self.dependencies_ok() {
            HealthClass::Healthy
        } else {
            HealthClass::Degraded
        }
    }
}

/// HTTP implementation of `HealthSource`
#[derive(Debug, Clone)]
pub struct HealthProber {
    client: ApiClient,
}

impl HealthProber {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HealthSource for HealthProber {
    async fn probe(&self) -> ConnectResult<HealthReport> {
        self.client.get_json("api/health", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_backend_report() {
        let report: HealthReport = serde_json::from_value(json!({
            "ok": true,
            "utc": "2024-01-01T00:00:00Z",
            "uptime_seconds": 42,
            "counts": {"events": 10, "assets": 5, "alerts": 2},
            "stream_backlog": 17,
            "redis": {"ok": true, "hits": 3},
            "latency_ms": 1.25,
            "build": "abc123"
        }))
        .unwrap();

        assert!(report.ok);
        assert_eq!(report.counts.unwrap().events, 10);
        assert_eq!(report.extra.get("build"), Some(&json!("abc123")));
        assert_eq!(report.classify(), HealthClass::Healthy);
    }

    #[test]
    fn test_minimal_report() {
        let report: HealthReport = serde_json::from_value(json!({"ok": true})).unwrap();
        assert_eq!(report.classify(), HealthClass::Healthy);

        let report: HealthReport = serde_json::from_value(json!({})).unwrap();
        assert!(!report.ok);
        assert_eq!(report.classify(), HealthClass::Degraded);
    }

    #[test]
    fn test_unexpected_field_types_do_not_fail_report() {
        let report: HealthReport = serde_json::from_value(json!({
            "ok": true,
            "utc": 1714557600,
            "uptime_seconds": 12.5,
            "counts": {"events": "n/a", "assets": 3},
            "stream_backlog": "17",
            "latency_ms": "fast"
        }))
        .unwrap();

        assert!(report.ok);
        assert_eq!(report.classify(), HealthClass::Healthy);
        assert_eq!(report.uptime_seconds, Some(13));
        assert_eq!(report.stream_backlog, Some(17));

        // unreadable values are kept verbatim
        assert_eq!(report.utc, None);
        assert_eq!(report.extra.get("utc"), Some(&json!(1714557600)));
        assert_eq!(report.counts, None);
        assert_eq!(
            report.extra.get("counts"),
            Some(&json!({"events": "n/a", "assets": 3}))
        );
        assert_eq!(report.latency_ms, None);
        assert_eq!(report.extra.get("latency_ms"), Some(&json!("fast")));
    }

    #[test]
    fn test_non_bool_ok() {
        let report: HealthReport = serde_json::from_value(json!({"ok": "true"})).unwrap();
        assert!(report.ok);

        let report: HealthReport = serde_json::from_value(json!({"ok": 1})).unwrap();
        assert!(!report.ok);
        assert_eq!(report.classify(), HealthClass::Degraded);
    }

    #[test]
    fn test_store_down_is_degraded() {
        let report: HealthReport =
            serde_json::from_value(json!({"ok": true, "redis": {"ok": false}})).unwrap();
        assert_eq!(report.classify(), HealthClass::Degraded);
    }

    #[test]
    fn test_synthesized_degraded_report() {
        let report = HealthReport::degraded("connection refused");

        assert!(!report.ok);
        assert_eq!(report.error.as_deref(), Some("connection refused"));
        assert!(report.utc.is_some());
        assert_eq!(report.classify(), HealthClass::Degraded);
        assert_eq!(report.classify().to_string(), "degraded");
    }
}
