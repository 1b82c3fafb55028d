use anyhow::{Context, Result};
use inquire::{Confirm, CustomType, Select, Text};
use nowcast_core::{
    Config, Location, ProviderId, config::DEFAULT_ENDPOINT, provider::backend::BackendProvider,
};

/// Prompt for every setting, starting from what is on disk, and save.
pub fn run() -> Result<()> {
    let path = Config::config_file_path()?;
    // File values only; environment overrides are not written back.
    let mut cfg = Config::load_from(&path)?;

    let current = cfg.source_id().unwrap_or(ProviderId::Backend);
    let start = ProviderId::all().iter().position(|id| *id == current).unwrap_or(0);
    let source = Select::new("Weather source:", ProviderId::all().to_vec())
        .with_starting_cursor(start)
        .prompt()
        .context("Source selection cancelled")?;
    cfg.set_source(source);

    if source == ProviderId::Backend {
        let default_endpoint = cfg.endpoint().unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let endpoint = Text::new("Backend endpoint:")
            .with_default(&default_endpoint)
            .prompt()
            .context("Endpoint prompt cancelled")?;
        BackendProvider::new(&endpoint).context("Endpoint rejected")?;
        cfg.endpoint = Some(endpoint);
    }

    let label = Text::new("Default location name:")
        .with_default(&cfg.location.label)
        .prompt()
        .context("Location prompt cancelled")?;
    let latitude = CustomType::<f64>::new("Latitude:")
        .with_default(cfg.location.latitude)
        .with_error_message("Enter a number in decimal degrees")
        .prompt()
        .context("Latitude prompt cancelled")?;
    let longitude = CustomType::<f64>::new("Longitude:")
        .with_default(cfg.location.longitude)
        .with_error_message("Enter a number in decimal degrees")
        .prompt()
        .context("Longitude prompt cancelled")?;
    cfg.location = Location::new(latitude, longitude, label);

    cfg.geolocation.enabled = Confirm::new("Allow \"use my location\" via IP lookup?")
        .with_default(cfg.geolocation.enabled)
        .prompt()
        .context("Geolocation prompt cancelled")?;

    cfg.save_to(&path)?;
    println!("Saved configuration to {}", path.display());

    Ok(())
}
