use crate::{
    Config, Location, WeatherSnapshot,
    provider::{backend::BackendProvider, open_meteo::OpenMeteoProvider},
};
use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug, sync::Arc, time::Duration};

pub mod backend;
pub mod open_meteo;

pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Backend,
    OpenMeteo,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Backend => "backend",
            ProviderId::OpenMeteo => "open-meteo",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::Backend, ProviderId::OpenMeteo]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "backend" => Ok(ProviderId::Backend),
            "open-meteo" | "openmeteo" => Ok(ProviderId::OpenMeteo),
            _ => Err(anyhow::anyhow!(
                "Unknown weather source '{value}'. Supported sources: backend, open-meteo."
            )),
        }
    }
}

/// Why a weather fetch failed. Every variant is treated the same way by the
/// session; the split only matters for the message.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to fetch weather data (HTTP {status})")]
    Status { status: reqwest::StatusCode },
    #[error("Failed to fetch weather data: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Malformed weather data: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Issue exactly one query for `location`. No retries.
    async fn fetch(&self, location: &Location) -> Result<WeatherSnapshot, FetchError>;
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let provider: Arc<dyn WeatherProvider> = match id {
        ProviderId::Backend => {
            let endpoint = config.endpoint().ok_or_else(|| {
                anyhow::anyhow!(
                    "No backend endpoint configured.\n\
                     Hint: run `nowcast configure` or set NOWCAST_ENDPOINT."
                )
            })?;
            Arc::new(BackendProvider::new(&endpoint)?)
        }
        ProviderId::OpenMeteo => Arc::new(OpenMeteoProvider::new()?),
    };

    Ok(provider)
}

/// Construct the provider named by the `source` field.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let id = config.source_id()?;
    provider_from_config(id, config)
}
