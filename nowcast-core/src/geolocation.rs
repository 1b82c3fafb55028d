//! Device position lookup.
//!
//! A terminal has no GPS; the host capability is an IP geolocation service.
//! When geolocation is disabled in config the session gets no provider at all,
//! which is how "capability absent" is represented.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::{fmt::Debug, time::Duration};

use crate::model::Coordinates;

pub const DEFAULT_GEOLOCATION_URL: &str = "http://ip-api.com/json";

/// Shown to the user for every kind of geolocation failure.
pub const GEOLOCATION_FAILED_MESSAGE: &str = "Could not get your location";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum GeolocationError {
    #[error("Location lookup failed: {0}")]
    Lookup(#[from] reqwest::Error),
    #[error("Location service returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("Location service gave no usable position: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait GeolocationProvider: Send + Sync + Debug {
    /// Single-shot position request.
    async fn current_position(&self) -> Result<Coordinates, GeolocationError>;
}

#[derive(Debug, Clone)]
pub struct IpGeolocator {
    url: String,
    http: Client,
}

impl IpGeolocator {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { url: url.into(), http })
    }
}

/// Both the ip-api.com (`lat`/`lon`) and the ipapi.co (`latitude`/`longitude`)
/// shapes are accepted.
#[derive(Debug, Deserialize)]
struct IpLookup {
    #[serde(alias = "latitude")]
    lat: Option<f64>,
    #[serde(alias = "longitude")]
    lon: Option<f64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl IpLookup {
    fn into_coordinates(self) -> Result<Coordinates, GeolocationError> {
        if self.status.as_deref() == Some("fail") {
            return Err(GeolocationError::Unavailable(
                self.message.unwrap_or_else(|| "lookup refused".to_string()),
            ));
        }
        match (self.lat, self.lon) {
            (Some(latitude), Some(longitude)) => Ok(Coordinates { latitude, longitude }),
            _ => Err(GeolocationError::Unavailable("response had no coordinates".to_string())),
        }
    }
}

#[async_trait]
impl GeolocationProvider for IpGeolocator {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        tracing::debug!(url = %self.url, "looking up device position");

        let res = self.http.get(&self.url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(GeolocationError::Status(status));
        }

        let body = res.text().await?;
        let lookup: IpLookup = serde_json::from_str(&body)
            .map_err(|e| GeolocationError::Unavailable(e.to_string()))?;

        lookup.into_coordinates()
    }
}
