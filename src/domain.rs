//! ==============================================================================
//! domain.rs - the reading shape shared by hub and monitor
//! ==============================================================================
//!
//! purpose:
//!     a device push, a hub response and a synthetic placeholder all end up as
//!     the same `Reading`. this module owns that shape plus the lenient-but-
//!     checked coercion of incoming json into it.
//!
//! relationships:
//!     - used by: store.rs (ingest), acquire.rs (response parsing), supervisor.rs
//!     - uses: error.rs (IngestError)
//!
//! ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::IngestError;

/// one timestamped sensor sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// air temperature in celsius
    pub temperature: f64,
    /// relative humidity (0-100%)
    pub humidity: f64,
    /// volumetric soil moisture (0-100%)
    pub soil_moisture: f64,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// the placeholder served before anything has been ingested
    pub fn zeroed(timestamp: DateTime<Utc>) -> Self {
        Measurements::default().at(timestamp)
    }
}

/// the three sensor values without a timestamp
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurements {
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
}

impl Measurements {
    pub fn at(self, timestamp: DateTime<Utc>) -> Reading {
        Reading {
            temperature: self.temperature,
            humidity: self.humidity,
            soil_moisture: self.soil_moisture,
            timestamp,
        }
    }
}

/// raw body of a push (or of an endpoint response)
///
/// fields stay untyped so that numeric strings like `"23.5"` from firmware
/// can be coerced, and anything else rejected with a named field.
/// only a json object deserializes; arrays, scalars and null do not.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct SensorPayload {
    pub temperature: Option<Value>,
    pub humidity: Option<Value>,
    pub soil_moisture: Option<Value>,
    /// present when the payload came from a hub's current-data endpoint
    pub timestamp: Option<Value>,
}

impl From<Map<String, Value>> for SensorPayload {
    fn from(mut fields: Map<String, Value>) -> Self {
        Self {
            temperature: fields.remove("temperature"),
            humidity: fields.remove("humidity"),
            soil_moisture: fields.remove("soilMoisture"),
            timestamp: fields.remove("timestamp"),
        }
    }
}

impl SensorPayload {
    pub fn measurements(&self) -> Result<Measurements, IngestError> {
        Ok(Measurements {
            temperature: coerce("temperature", self.temperature.as_ref())?,
            humidity: coerce("humidity", self.humidity.as_ref())?,
            soil_moisture: coerce("soilMoisture", self.soil_moisture.as_ref())?,
        })
    }

    /// the payload's own timestamp, if it carries a valid RFC 3339 one
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self.timestamp.as_ref()? {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            _ => None,
        }
    }
}

fn coerce(field: &'static str, value: Option<&Value>) -> Result<f64, IngestError> {
    let number = match value {
        None | Some(Value::Null) => return Err(IngestError::MissingField(field)),
        Some(Value::Number(n)) => n.as_f64().ok_or(IngestError::NotNumeric(field))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| IngestError::NotNumeric(field))?,
        Some(_) => return Err(IngestError::NotNumeric(field)),
    };

    if number.is_finite() {
        Ok(number)
    } else {
        Err(IngestError::NotFinite(field))
    }
}

/// client-side link status, derived from the latest acquisition cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// outcome of one acquisition cycle
///
/// consumers match on this to tell real telemetry from placeholder data.
#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition {
    Live {
        endpoint: String,
        reading: Reading,
        /// attempts made across all endpoints, including the successful one
        attempts: u32,
    },
    Synthetic {
        reading: Reading,
        attempts: u32,
    },
}

impl Acquisition {
    pub fn reading(&self) -> &Reading {
        match self {
            Acquisition::Live { reading, .. } | Acquisition::Synthetic { reading, .. } => reading,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Acquisition::Live { attempts, .. } | Acquisition::Synthetic { attempts, .. } => *attempts,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Acquisition::Live { .. })
    }

    pub fn connection_state(&self) -> ConnectionState {
        if self.is_live() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> SensorPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_numbers_and_numeric_strings_coerce() {
        let m = payload(json!({"temperature": 24.5, "humidity": "61", "soilMoisture": " 72.25 "}))
            .measurements()
            .unwrap();
        assert_eq!(m, Measurements { temperature: 24.5, humidity: 61.0, soil_moisture: 72.25 });
    }

    #[test]
    fn test_rejects_missing_and_garbage_fields() {
        let err = payload(json!({"temperature": 20, "humidity": 50})).measurements();
        assert_eq!(err, Err(IngestError::MissingField("soilMoisture")));

        let err = payload(json!({"temperature": "abc", "humidity": 50, "soilMoisture": 1}))
            .measurements();
        assert_eq!(err, Err(IngestError::NotNumeric("temperature")));

        let err = payload(json!({"temperature": 1, "humidity": true, "soilMoisture": 1}))
            .measurements();
        assert_eq!(err, Err(IngestError::NotNumeric("humidity")));

        let err = payload(json!({"temperature": 1, "humidity": 2, "soilMoisture": "NaN"}))
            .measurements();
        assert_eq!(err, Err(IngestError::NotFinite("soilMoisture")));
    }

    #[test]
    fn test_only_objects_deserialize() {
        assert!(serde_json::from_value::<SensorPayload>(json!([21.0, 40.0, 66.0])).is_err());
        assert!(serde_json::from_value::<SensorPayload>(json!(42)).is_err());
        assert!(serde_json::from_value::<SensorPayload>(Value::Null).is_err());

        let p = payload(json!({"temperature": 1, "humidity": 2, "soilMoisture": 3, "extra": true}));
        assert!(p.measurements().is_ok());
    }

    #[test]
    fn test_reading_serializes_camel_case() {
        let ts = DateTime::parse_from_rfc3339("2026-05-01T10:00:00Z").unwrap().with_timezone(&Utc);
        let value = serde_json::to_value(Reading::zeroed(ts)).unwrap();
        assert_eq!(value["soilMoisture"], json!(0.0));
        assert_eq!(value["timestamp"], json!("2026-05-01T10:00:00Z"));
    }

    #[test]
    fn test_payload_timestamp_is_optional() {
        let p = payload(json!({"timestamp": "2026-05-01T10:00:00.000Z"}));
        assert!(p.timestamp().is_some());
        assert!(payload(json!({"timestamp": 12})).timestamp().is_none());
        assert!(payload(json!({})).timestamp().is_none());
    }

    #[test]
    fn test_acquisition_maps_to_connection_state() {
        let reading = Reading::zeroed(Utc::now());
        let live = Acquisition::Live { endpoint: "a".into(), reading, attempts: 1 };
        let synthetic = Acquisition::Synthetic { reading, attempts: 9 };
        assert_eq!(live.connection_state(), ConnectionState::Connected);
        assert_eq!(synthetic.connection_state(), ConnectionState::Disconnected);
        assert_eq!(synthetic.attempts(), 9);
    }
}
