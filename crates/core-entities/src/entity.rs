//! Entity model: events, assets and alerts
//!
//! The three telemetry collections share one generic shape: a uniquely
//! identified record carrying a timestamp, a few domain fields
//! (severity/status/priority) and optional cross references.
//!
//! Decoding is deliberately lenient. Push updates frequently carry partial
//! records (an `asset_updated` may only hold `asset_id` and `status`), so
//! every field falls back to a default, unknown enum values map to an
//! `Unknown` variant and unrecognised fields are kept in `extra` so that a
//! cache round trip never loses data. The same goes for timestamps that do
//! not parse: the typed field stays `None` and the raw value moves to `extra`
//! under its own name.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Static description of one entity collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityKind {
    /// Collection name, also used as the cache blob name
    pub name: &'static str,

    /// Name of the identity field in the wire format
    pub id_field: &'static str,

    /// Name of the timestamp field in the wire format
    pub timestamp_field: &'static str,

    /// Maximum number of entries retained after an incremental mutation
    pub max_size: usize,

    /// Whether the sequence is kept sorted newest-first
    pub ordered: bool,
}

impl EntityKind {
    pub const EVENTS: EntityKind = EntityKind {
        name: "events",
        id_field: "event_id",
        timestamp_field: "created_at",
        max_size: 300,
        ordered: true,
    };

    pub const ASSETS: EntityKind = EntityKind {
        name: "assets",
        id_field: "asset_id",
        timestamp_field: "last_update",
        max_size: 500,
        ordered: false,
    };

    pub const ALERTS: EntityKind = EntityKind {
        name: "alerts",
        id_field: "alert_id",
        timestamp_field: "created_at",
        max_size: 300,
        ordered: true,
    };
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Common behaviour of every telemetry record
pub trait Entity:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Collection descriptor for this entity type
    const KIND: EntityKind;

    /// Identity of the record, `None` when the identity field is missing or empty
    fn id(&self) -> Option<&str>;

    /// Creation/update timestamp used for ordering
    fn timestamp(&self) -> Option<DateTime<Utc>>;
}

fn non_empty(id: &str) -> Option<&str> {
    if id.trim().is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Parse an RFC 3339 timestamp, tolerating a missing offset (assumed UTC)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Unparseable or non-string timestamps decode as `None` instead of failing the record
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(Value::as_str).and_then(parse_timestamp))
}

/// Decode a record from a JSON object, moving timestamp values that do not
/// parse into `extra` so they are written back unchanged.
fn decode_keeping_raw_timestamps<'de, D, T>(
    deserializer: D,
    timestamp_fields: &[&str],
    decode: fn(Value) -> Result<T, serde_json::Error>,
    extra: fn(&mut T) -> &mut Map<String, Value>,
) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
{
    let mut object = Map::<String, Value>::deserialize(deserializer)?;

    let mut raw = Vec::new();
    for &field in timestamp_fields {
        let unparsed = match object.get(field) {
            None | Some(Value::Null) => false,
            Some(value) => value.as_str().and_then(parse_timestamp).is_none(),
        };
        if let Some(value) = unparsed.then(|| object.remove(field)).flatten() {
            raw.push((field.to_string(), value));
        }
    }

    let mut record = decode(Value::Object(object)).map_err(de::Error::custom)?;
    extra(&mut record).extend(raw);
    Ok(record)
}

/// Serde impls for an entity whose derive is declared `remote = "Self"`
macro_rules! entity_serde {
    ($ty:ident, [$($field:literal),+]) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                $ty::serialize(self, serializer)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                decode_keeping_raw_timestamps(
                    deserializer,
                    &[$($field),+],
                    |value| $ty::deserialize(value),
                    |record| &mut record.extra,
                )
            }
        }
    };
}

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Operational status of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Active,
    Degraded,
    Offline,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Alert priority (`p1` is the most urgent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    P1,
    P2,
    P3,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A detected or inferred situation in space and time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", default)]
pub struct Event {
    pub event_id: String,

    #[serde(
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,

    #[serde(rename = "type")]
    pub event_type: String,

    pub severity: Severity,

    pub source: String,

    pub confidence: f64,

    /// Arbitrary metadata (asset linkage, region, etc.)
    pub meta: Map<String, Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            event_id: String::new(),
            created_at: None,
            lat: None,
            lon: None,
            event_type: String::new(),
            severity: Severity::Unknown,
            source: "synthetic".to_string(),
            confidence: 0.75,
            meta: Map::new(),
            extra: Map::new(),
        }
    }
}

entity_serde!(Event, ["created_at"]);

impl Event {
    /// Asset this event is linked to through `meta.asset_id`, if any
    pub fn linked_asset_id(&self) -> Option<&str> {
        self.meta.get("asset_id").and_then(Value::as_str)
    }
}

impl Entity for Event {
    const KIND: EntityKind = EntityKind::EVENTS;

    fn id(&self) -> Option<&str> {
        non_empty(&self.event_id)
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

/// A monitored entity (sensor, vehicle, drone, relay)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", default)]
pub struct Asset {
    pub asset_id: String,

    pub name: String,

    pub asset_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,

    pub status: AssetStatus,

    #[serde(
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_update: Option<DateTime<Utc>>,

    pub owner_team: String,

    /// Simulated route as `[[lat, lon], ...]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<Vec<Vec<f64>>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_idx: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_kmh: Option<f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            asset_id: String::new(),
            name: String::new(),
            asset_type: String::new(),
            lat: None,
            lon: None,
            status: AssetStatus::Unknown,
            last_update: None,
            owner_team: "blue".to_string(),
            route: None,
            route_idx: None,
            speed_kmh: None,
            extra: Map::new(),
        }
    }
}

entity_serde!(Asset, ["last_update"]);

impl Entity for Asset {
    const KIND: EntityKind = EntityKind::ASSETS;

    fn id(&self) -> Option<&str> {
        non_empty(&self.asset_id)
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }
}

/// A correlated warning requiring attention
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", default)]
pub struct Alert {
    pub alert_id: String,

    #[serde(
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,

    pub priority: Priority,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_event_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_asset_id: Option<String>,

    /// Correlation key used by the generator for deduplication
    pub fingerprint: String,

    #[serde(
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

entity_serde!(Alert, ["created_at", "expires_at"]);

impl Alert {
    /// An alert without `expires_at` never expires
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl Entity for Alert {
    const KIND: EntityKind = EntityKind::ALERTS;

    fn id(&self) -> Option<&str> {
        non_empty(&self.alert_id)
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_partial_asset_payload_decodes() {
        let asset: Asset =
            serde_json::from_value(json!({"asset_id": "a1", "status": "offline"})).unwrap();

        assert_eq!(asset.id(), Some("a1"));
        assert_eq!(asset.status, AssetStatus::Offline);
        assert_eq!(asset.owner_team, "blue");
        assert!(asset.last_update.is_none());
    }

    #[test]
    fn test_event_decodes_original_backend_shape() {
        let event: Event = serde_json::from_value(json!({
            "event_id": "evt_a3f91c2b1e",
            "created_at": "2024-01-01T00:00:00.123456+00:00",
            "lat": 51.5,
            "lon": -0.12,
            "type": "intrusion",
            "severity": "high",
            "source": "synthetic",
            "confidence": 0.9,
            "meta": {"asset_id": "ast_1", "region": "north"}
        }))
        .unwrap();

        assert_eq!(event.id(), Some("evt_a3f91c2b1e"));
        assert_eq!(event.severity, Severity::High);
        assert_eq!(event.event_type, "intrusion");
        assert_eq!(event.linked_asset_id(), Some("ast_1"));
        assert!(event.extra.is_empty());
        assert_eq!(
            event.timestamp().map(|ts| ts.timestamp()),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap().timestamp())
        );
    }

    #[test]
    fn test_unknown_enum_values_map_to_unknown() {
        let event: Event =
            serde_json::from_value(json!({"event_id": "e1", "severity": "apocalyptic"})).unwrap();
        assert_eq!(event.severity, Severity::Unknown);

        let alert: Alert =
            serde_json::from_value(json!({"alert_id": "x", "priority": "p0"})).unwrap();
        assert_eq!(alert.priority, Priority::Unknown);
    }

    #[test]
    fn test_unparseable_timestamp_is_none() {
        let event: Event =
            serde_json::from_value(json!({"event_id": "e1", "created_at": "yesterday"})).unwrap();
        assert_eq!(event.timestamp(), None);

        let event: Event =
            serde_json::from_value(json!({"event_id": "e2", "created_at": 12345})).unwrap();
        assert_eq!(event.timestamp(), None);

        let event: Event =
            serde_json::from_value(json!({"event_id": "e3", "created_at": null})).unwrap();
        assert_eq!(event.timestamp(), None);
        assert!(event.extra.is_empty());
    }

    #[test]
    fn test_unparseable_timestamp_survives_round_trip() {
        let raw = json!({
            "alert_id": "alr_1",
            "created_at": "yesterday",
            "expires_at": 1714557600,
            "priority": "p2"
        });

        let alert: Alert = serde_json::from_value(raw).unwrap();
        assert_eq!(alert.created_at, None);
        assert_eq!(alert.expires_at, None);
        assert_eq!(alert.extra.get("created_at"), Some(&json!("yesterday")));
        assert_eq!(alert.extra.get("expires_at"), Some(&json!(1714557600)));

        let encoded = serde_json::to_string(&alert).unwrap();
        let decoded: Alert = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, alert);

        let value = serde_json::to_value(&decoded).unwrap();
        assert_eq!(value["created_at"], json!("yesterday"));
        assert_eq!(value["expires_at"], json!(1714557600));
    }

    #[test]
    fn test_parsed_timestamp_not_duplicated_in_extra() {
        let asset: Asset = serde_json::from_value(json!({
            "asset_id": "a1",
            "last_update": "2024-05-01T10:00:00Z"
        }))
        .unwrap();

        assert!(asset.last_update.is_some());
        assert!(asset.extra.is_empty());
    }

    #[test]
    fn test_missing_or_blank_identity() {
        let event: Event = serde_json::from_value(json!({"severity": "low"})).unwrap();
        assert_eq!(event.id(), None);

        let asset: Asset = serde_json::from_value(json!({"asset_id": "  "})).unwrap();
        assert_eq!(asset.id(), None);
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let raw = json!({
            "alert_id": "alr_1",
            "created_at": "2024-01-01T00:00:00Z",
            "priority": "p1",
            "message": "perimeter breach",
            "fingerprint": "fp",
            "escalation_level": 3
        });

        let alert: Alert = serde_json::from_value(raw).unwrap();
        assert_eq!(alert.extra.get("escalation_level"), Some(&json!(3)));

        let encoded = serde_json::to_value(&alert).unwrap();
        assert_eq!(encoded["escalation_level"], json!(3));
        assert_eq!(encoded["priority"], json!("p1"));
    }

    #[test]
    fn test_naive_timestamp_assumed_utc() {
        let ts = parse_timestamp("2024-03-01T12:30:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_alert_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut alert = Alert {
            alert_id: "a".to_string(),
            ..Default::default()
        };
        assert!(!alert.is_expired(now));

        alert.expires_at = Some(now - chrono::Duration::seconds(1));
        assert!(alert.is_expired(now));
    }

    #[test]
    fn test_kind_descriptors() {
        assert_eq!(Event::KIND.max_size, 300);
        assert_eq!(Asset::KIND.max_size, 500);
        assert_eq!(Alert::KIND.max_size, 300);
        assert!(Event::KIND.ordered);
        assert!(!Asset::KIND.ordered);
        assert_eq!(Alert::KIND.to_string(), "alerts");
    }
}
