//! Core library for the `nowcast` weather dashboard.
//!
//! This crate defines:
//! - The dashboard session: fetch, periodic refresh and geolocation lifecycle
//! - A side-effect free projection from session state to a view
//! - Weather and geolocation sources behind traits
//! - Configuration handling
//!
//! It is used by `nowcast-cli`, but any front end that can render a [`View`]
//! can drive a [`Session`].

pub mod config;
pub mod geolocation;
pub mod model;
pub mod provider;
pub mod session;
pub mod view;

pub use config::{Config, GeolocationConfig};
pub use geolocation::{GeolocationError, GeolocationProvider, IpGeolocator};
pub use model::{Coordinates, CurrentConditions, Location, ReportedLocation, WeatherSnapshot};
pub use provider::{FetchError, ProviderId, WeatherProvider};
pub use session::{DashboardState, LocateOutcome, REFRESH_INTERVAL, Session};
pub use view::{Background, DashboardView, View};
