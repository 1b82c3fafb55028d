use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{Args, Parser, Subcommand};
use nowcast_core::{
    Config, Location, ProviderId, Session, View,
    provider::default_provider_from_config,
};

use crate::{
    configure, dashboard,
    render::{self, RenderOptions},
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "nowcast", version, about = "Weather dashboard with a 5-minute prediction")]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set, e.g. "info" or "nowcast_core=debug".
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Append logs to this file instead of stderr; useful with `watch`.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Live dashboard that refreshes every two minutes.
    Watch {
        #[command(flatten)]
        target: Target,
    },

    /// Fetch once, print the dashboard and exit.
    Show {
        #[command(flatten)]
        target: Target,

        /// Print the raw weather snapshot as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Interactively set endpoint, default location and geolocation.
    Configure,
}

/// Per-invocation overrides on top of the config file.
#[derive(Debug, Clone, Args)]
pub struct Target {
    /// Latitude in decimal degrees.
    #[arg(long, allow_negative_numbers = true, requires = "lon")]
    pub lat: Option<f64>,

    /// Longitude in decimal degrees.
    #[arg(long, allow_negative_numbers = true, requires = "lat")]
    pub lon: Option<f64>,

    /// Display name for the location.
    #[arg(long)]
    pub label: Option<String>,

    /// Weather source: "backend" or "open-meteo".
    #[arg(long)]
    pub source: Option<String>,

    /// Backend base address, e.g. http://127.0.0.1:8000.
    #[arg(long)]
    pub endpoint: Option<String>,
}

impl Target {
    /// Apply the overrides to `config` and pick the starting location.
    pub fn resolve(&self, mut config: Config) -> anyhow::Result<(Config, Location)> {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = Some(endpoint.clone());
        }
        if let Some(source) = &self.source {
            config.set_source(ProviderId::try_from(source.as_str())?);
        }

        let location = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => {
                let label = self.label.clone().unwrap_or_else(|| format!("{lat:.4}, {lon:.4}"));
                Location::new(lat, lon, label)
            }
            _ => {
                let mut location = config.location.clone();
                if let Some(label) = &self.label {
                    location.label = label.clone();
                }
                location
            }
        };

        Ok((config, location))
    }
}

pub fn source_description(config: &Config) -> anyhow::Result<String> {
    Ok(match config.source_id()? {
        ProviderId::Backend => format!(
            "{} {}",
            ProviderId::Backend,
            config.endpoint().unwrap_or_else(|| "(no endpoint)".to_string())
        ),
        id => id.to_string(),
    })
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure::run(),
            Command::Watch { target } => {
                let (config, location) = target.resolve(Config::load()?)?;
                dashboard::run(&config, location).await
            }
            Command::Show { target, json } => {
                let (config, location) = target.resolve(Config::load()?)?;
                show(&config, location, json).await
            }
        }
    }
}

async fn show(config: &Config, location: Location, json: bool) -> anyhow::Result<()> {
    let provider = default_provider_from_config(config)?;
    let session = Session::start(location, provider, None);

    let mut state = session.subscribe();
    let settled = state
        .wait_for(|s| !s.loading)
        .await
        .map(|s| (*s).clone())
        .context("Dashboard session stopped before the first fetch finished")?;
    session.shutdown().await;

    let view = View::project(&settled);
    if let View::Error { message } = &view {
        return Err(anyhow!("{message}"));
    }

    if json {
        let snapshot = settled.snapshot.context("No weather data received")?;
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
    } else {
        let opts = RenderOptions { source: source_description(config)? };
        print!("{}", render::to_text(&view, &opts));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Target {
        Target { lat: None, lon: None, label: None, source: None, endpoint: None }
    }

    #[test]
    fn parses_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "nowcast", "show", "--lat", "-33.8688", "--lon", "151.2093", "--label", "Sydney",
        ])
        .unwrap();
        let Command::Show { target, json } = cli.command else {
            panic!("expected show");
        };
        assert!(!json);
        assert_eq!(target.lat, Some(-33.8688));
        assert_eq!(target.label.as_deref(), Some("Sydney"));
    }

    #[test]
    fn log_file_is_global() {
        let cli = Cli::try_parse_from(["nowcast", "watch", "--log-file", "/tmp/nowcast.log"]).unwrap();
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/nowcast.log")));
    }

    #[test]
    fn lat_without_lon_is_rejected() {
        assert!(Cli::try_parse_from(["nowcast", "watch", "--lat", "10"]).is_err());
    }

    #[test]
    fn config_location_used_without_coordinates() {
        let (_, location) = target().resolve(Config::default()).unwrap();
        assert_eq!(location, Location::default());
    }

    #[test]
    fn coordinates_without_label_get_numeric_label() {
        let t = Target { lat: Some(1.5), lon: Some(-2.25), ..target() };
        let (_, location) = t.resolve(Config::default()).unwrap();
        assert_eq!(location.label, "1.5000, -2.2500");
    }

    #[test]
    fn overrides_source_and_endpoint() {
        let t = Target {
            source: Some("open-meteo".into()),
            endpoint: Some("http://example.test".into()),
            ..target()
        };
        let (config, _) = t.resolve(Config::default()).unwrap();
        assert_eq!(config.source_id().unwrap(), ProviderId::OpenMeteo);
        assert_eq!(config.endpoint().as_deref(), Some("http://example.test"));
    }

    #[test]
    fn bad_source_is_an_error() {
        let t = Target { source: Some("nope".into()), ..target() };
        assert!(t.resolve(Config::default()).is_err());
    }
}
