use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Label used when the location comes from a device position fix.
pub const DEVICE_LOCATION_LABEL: &str = "Your Location";

/// A place the dashboard shows weather for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub label: String,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, label: impl Into<String>) -> Self {
        Self { latitude, longitude, label: label.into() }
    }

    /// Location built from a geolocation fix.
    pub fn from_device(fix: Coordinates) -> Self {
        Self::new(fix.latitude, fix.longitude, DEVICE_LOCATION_LABEL)
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new(40.7128, -74.0060, "New York City")
    }
}

/// A bare position fix, as returned by a geolocation provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Current conditions block of a weather payload. Field names follow the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature_2m: f64,
    pub apparent_temperature: f64,
    pub relative_humidity_2m: f64,
    pub wind_speed_10m: f64,
    pub wind_direction_10m: f64,
    pub cloud_cover: f64,
    pub precipitation: f64,
    pub weather_code: i64,
    pub description: String,
}

/// Location as resolved and reported back by the weather service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

/// One complete answer from the weather service. Never patched; a newer
/// snapshot replaces it entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub current: CurrentConditions,
    pub prediction: String,
    pub location: ReportedLocation,
    /// Wall-clock time at the reported location.
    #[serde(with = "timestamp")]
    pub timestamp: NaiveDateTime,
}

pub mod timestamp {
    //! Accepts RFC 3339 and the offset-less ISO forms Open-Meteo emits
    //! (`2026-10-19T08:15`, `2026-10-19T08:15:30`).

    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
    const LOCAL_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_local());
        }
        LOCAL_FORMATS.iter().find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    }

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(WIRE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("unrecognised timestamp '{raw}'")))
    }
}
