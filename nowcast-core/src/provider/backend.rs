use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::{
    model::{Location, WeatherSnapshot},
    provider::{FetchError, REQUEST_TIMEOUT},
};

use super::WeatherProvider;

/// The dashboard backend: `GET {endpoint}/api/weather?lat=..&lon=..` returns a
/// ready-made snapshot including the prediction text.
#[derive(Debug, Clone)]
pub struct BackendProvider {
    url: Url,
    http: Client,
}

impl BackendProvider {
    pub fn new(endpoint: &str) -> anyhow::Result<Self> {
        let mut base = Url::parse(endpoint)
            .with_context(|| format!("Invalid backend endpoint '{endpoint}'"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let url = base.join("api/weather").context("Failed to build weather URL")?;

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { url, http })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl WeatherProvider for BackendProvider {
    async fn fetch(&self, location: &Location) -> Result<WeatherSnapshot, FetchError> {
        tracing::debug!(
            url = %self.url,
            lat = location.latitude,
            lon = location.longitude,
            "requesting weather from backend"
        );

        let res = self
            .http
            .get(self.url.clone())
            .query(&[("lat", location.latitude), ("lon", location.longitude)])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }

        let body = res.text().await?;
        let snapshot: WeatherSnapshot = serde_json::from_str(&body)?;

        Ok(snapshot)
    }
}
