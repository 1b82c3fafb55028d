use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    model::{CurrentConditions, Location, ReportedLocation, WeatherSnapshot, timestamp},
    provider::{FetchError, REQUEST_TIMEOUT},
};

use super::WeatherProvider;

pub const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";

const CURRENT_VARIABLES: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,\
precipitation,weather_code,cloud_cover,wind_speed_10m,wind_direction_10m";

pub const NO_PREDICTION: &str =
    "No short-term prediction available: reading conditions directly from Open-Meteo.";

/// Reads current conditions straight from Open-Meteo, bypassing the backend.
/// There is no prediction model behind this source.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    base_url: String,
    http: Client,
}

impl OpenMeteoProvider {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_base_url(OPEN_METEO_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { base_url: base_url.into(), http })
    }
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    time: String,
    temperature_2m: f64,
    relative_humidity_2m: f64,
    apparent_temperature: f64,
    precipitation: f64,
    weather_code: i64,
    cloud_cover: f64,
    wind_speed_10m: f64,
    wind_direction_10m: f64,
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    #[serde(default)]
    timezone: Option<String>,
    current: OmCurrent,
}

impl OmResponse {
    fn into_snapshot(self, location: &Location) -> Result<WeatherSnapshot, FetchError> {
        let c = self.current;
        let observed = timestamp::parse(&c.time).ok_or_else(|| {
            FetchError::Decode(serde::de::Error::custom(format!(
                "unrecognised timestamp '{}'",
                c.time
            )))
        })?;

        Ok(WeatherSnapshot {
            current: CurrentConditions {
                temperature_2m: c.temperature_2m,
                apparent_temperature: c.apparent_temperature,
                relative_humidity_2m: c.relative_humidity_2m,
                wind_speed_10m: c.wind_speed_10m,
                wind_direction_10m: c.wind_direction_10m,
                cloud_cover: c.cloud_cover,
                precipitation: c.precipitation,
                weather_code: c.weather_code,
                description: describe_weather_code(c.weather_code).to_string(),
            },
            prediction: NO_PREDICTION.to_string(),
            location: ReportedLocation {
                latitude: location.latitude,
                longitude: location.longitude,
                timezone: self.timezone.unwrap_or_else(|| "Unknown".to_string()),
            },
            timestamp: observed,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    async fn fetch(&self, location: &Location) -> Result<WeatherSnapshot, FetchError> {
        tracing::debug!(
            lat = location.latitude,
            lon = location.longitude,
            "requesting current conditions from Open-Meteo"
        );

        let lat = location.latitude.to_string();
        let lon = location.longitude.to_string();
        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("latitude", lat.as_str()),
                ("longitude", lon.as_str()),
                ("current", CURRENT_VARIABLES),
                ("temperature_unit", "fahrenheit"),
                ("wind_speed_unit", "mph"),
                ("timezone", "auto"),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }

        let body = res.text().await?;
        let parsed: OmResponse = serde_json::from_str(&body)?;
        parsed.into_snapshot(location)
    }
}

/// WMO weather interpretation code to a short English description.
pub fn describe_weather_code(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Foggy",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        71 => "Slight snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_known_codes() {
        assert_eq!(describe_weather_code(0), "Clear sky");
        assert_eq!(describe_weather_code(65), "Heavy rain");
        assert_eq!(describe_weather_code(99), "Thunderstorm with heavy hail");
    }

    #[test]
    fn unknown_code_is_unknown() {
        assert_eq!(describe_weather_code(4), "Unknown");
        assert_eq!(describe_weather_code(-1), "Unknown");
    }

    #[test]
    fn snapshot_reports_requested_coordinates() {
        let raw = serde_json::json!({
            "latitude": 40.71,
            "longitude": -74.0,
            "timezone": "America/New_York",
            "current": {
                "time": "2026-10-19T08:15",
                "interval": 900,
                "temperature_2m": 60.3,
                "relative_humidity_2m": 71,
                "apparent_temperature": 58.0,
                "precipitation": 0.2,
                "weather_code": 61,
                "cloud_cover": 100,
                "wind_speed_10m": 11.5,
                "wind_direction_10m": 45
            }
        });
        let parsed: OmResponse = serde_json::from_value(raw).unwrap();
        let loc = Location::default();
        let snapshot = parsed.into_snapshot(&loc).unwrap();

        assert_eq!(snapshot.location.latitude, loc.latitude);
        assert_eq!(snapshot.location.timezone, "America/New_York");
        assert_eq!(snapshot.current.description, "Slight rain");
        assert_eq!(snapshot.prediction, NO_PREDICTION);
    }
}
