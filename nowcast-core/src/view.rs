//! Projection from dashboard state to what the screen shows.
//!
//! Nothing here has side effects; the terminal front end turns a [`View`] into
//! text and maps the actions it offers back onto [`crate::Session`] calls.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::{model::WeatherSnapshot, session::DashboardState};

/// Visual treatment picked from the weather code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Background {
    #[default]
    Clear,
    Cloudy,
    Rain,
    Snow,
    Thunderstorm,
}

impl Background {
    /// WMO code to background category. First match wins and unknown codes
    /// fall back to [`Background::Clear`], so this never fails.
    pub fn from_weather_code(code: i64) -> Self {
        match code {
            0 | 1 => Self::Clear,
            2 | 3 => Self::Cloudy,
            61..=65 => Self::Rain,
            71..=77 => Self::Snow,
            c if c >= 95 => Self::Thunderstorm,
            _ => Self::Clear,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Cloudy => "cloudy",
            Self::Rain => "rain",
            Self::Snow => "snow",
            Self::Thunderstorm => "thunderstorm",
        }
    }
}

/// Full dashboard: current conditions plus prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub location_label: String,
    pub background: Background,
    /// A refresh is in flight; the data shown is from the last good fetch.
    pub refreshing: bool,
    pub snapshot: Arc<WeatherSnapshot>,
}

impl DashboardView {
    pub fn observed_at(&self) -> NaiveDateTime {
        self.snapshot.timestamp
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum View {
    /// Nothing to show yet.
    Loading,
    /// No data ever arrived; offers a retry.
    Error { message: String },
    Dashboard(DashboardView),
}

impl View {
    pub fn project(state: &DashboardState) -> Self {
        match (&state.snapshot, &state.error) {
            (None, _) if state.loading => View::Loading,
            (None, Some(message)) => View::Error { message: message.clone() },
            (None, None) => View::Loading,
            (Some(snapshot), _) => View::Dashboard(DashboardView {
                location_label: state.location.label.clone(),
                background: Background::from_weather_code(snapshot.current.weather_code),
                refreshing: state.loading,
                snapshot: Arc::clone(snapshot),
            }),
        }
    }
}
