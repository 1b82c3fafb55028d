//! Fetch / refresh / teardown behaviour of a dashboard session, driven with
//! scripted sources and tokio's paused clock.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use nowcast_core::{
    Coordinates, CurrentConditions, DashboardState, FetchError, GeolocationError,
    GeolocationProvider, LocateOutcome, Location, ReportedLocation, Session, View,
    WeatherProvider, WeatherSnapshot, model::timestamp,
};
use tokio::sync::{oneshot, watch};

enum Outcome {
    Ok(&'static str),
    Fail,
}

struct Step {
    gate: Option<oneshot::Receiver<()>>,
    outcome: Outcome,
}

impl Step {
    fn ok(tag: &'static str) -> Self {
        Self { gate: None, outcome: Outcome::Ok(tag) }
    }

    fn fail() -> Self {
        Self { gate: None, outcome: Outcome::Fail }
    }

    fn gated(self, gate: oneshot::Receiver<()>) -> Self {
        Self { gate: Some(gate), ..self }
    }
}

/// Answers fetches from a script; once the script runs out every fetch
/// succeeds with the tag "default".
struct ScriptedProvider {
    calls: AtomicUsize,
    script: Mutex<VecDeque<Step>>,
}

impl std::fmt::Debug for ScriptedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedProvider").field("calls", &self.calls()).finish()
    }
}

impl ScriptedProvider {
    fn new(script: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), script: Mutex::new(script.into_iter().collect()) })
    }

    fn always_ok() -> Arc<Self> {
        Self::new(Vec::<Step>::new())
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn snapshot_for(location: &Location, tag: &str) -> WeatherSnapshot {
    WeatherSnapshot {
        current: CurrentConditions {
            temperature_2m: 64.0,
            apparent_temperature: 63.0,
            relative_humidity_2m: 50.0,
            wind_speed_10m: 6.0,
            wind_direction_10m: 270.0,
            cloud_cover: 10.0,
            precipitation: 0.0,
            weather_code: 1,
            description: "Mainly clear".to_string(),
        },
        prediction: tag.to_string(),
        location: ReportedLocation {
            latitude: location.latitude,
            longitude: location.longitude,
            timezone: "UTC".to_string(),
        },
        timestamp: timestamp::parse("2026-10-19T08:15").unwrap(),
    }
}

#[async_trait]
impl WeatherProvider for ScriptedProvider {
    async fn fetch(&self, location: &Location) -> Result<WeatherSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front();
        let Some(Step { gate, outcome }) = step else {
            return Ok(snapshot_for(location, "default"));
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        match outcome {
            Outcome::Ok(tag) => Ok(snapshot_for(location, tag)),
            Outcome::Fail => {
                Err(FetchError::Status { status: reqwest::StatusCode::INTERNAL_SERVER_ERROR })
            }
        }
    }
}

#[derive(Debug)]
struct FixedGeolocator(Option<Coordinates>);

#[async_trait]
impl GeolocationProvider for FixedGeolocator {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        self.0.ok_or_else(|| GeolocationError::Unavailable("denied".to_string()))
    }
}

/// Let the session actor and its request tasks run until they block.
async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

async fn wait_until(rx: &mut watch::Receiver<DashboardState>, f: impl FnMut(&DashboardState) -> bool) {
    rx.wait_for(f).await.expect("session ended while waiting");
}

fn prediction(state: &DashboardState) -> Option<&str> {
    state.snapshot.as_ref().map(|s| s.prediction.as_str())
}

fn london() -> Location {
    Location::new(51.5074, -0.1278, "London")
}

#[tokio::test]
async fn initial_activation_fetches_once_and_shows_loading() {
    let (release, gate) = oneshot::channel();
    let provider = ScriptedProvider::new([Step::ok("first").gated(gate)]);
    let session = Session::start(Location::default(), provider.clone(), None);

    settle().await;
    assert_eq!(provider.calls(), 1);
    assert_eq!(View::project(&session.state()), View::Loading);

    release.send(()).unwrap();
    let mut rx = session.subscribe();
    wait_until(&mut rx, |s| !s.loading).await;

    assert_eq!(provider.calls(), 1);
    assert!(matches!(View::project(&session.state()), View::Dashboard(_)));

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn location_change_fetches_once_and_restarts_refresh_window() {
    let provider = ScriptedProvider::always_ok();
    let session = Session::start(Location::default(), provider.clone(), None);
    let mut rx = session.subscribe();
    wait_until(&mut rx, |s| s.snapshot.is_some() && !s.loading).await;
    assert_eq!(provider.calls(), 1);

    tokio::time::advance(Duration::from_secs(100)).await;
    settle().await;
    assert_eq!(provider.calls(), 1);

    session.set_location(london());
    wait_until(&mut rx, |s| {
        !s.loading && s.snapshot.as_ref().is_some_and(|snap| snap.location.latitude == 51.5074)
    })
    .await;
    assert_eq!(provider.calls(), 2);

    // 200s since activation, 100s since the location change.
    tokio::time::advance(Duration::from_secs(100)).await;
    settle().await;
    assert_eq!(provider.calls(), 2);

    tokio::time::advance(Duration::from_secs(25)).await;
    settle().await;
    assert_eq!(provider.calls(), 3);

    session.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_location_is_published_together_with_pending_fetch() {
    let (release, gate) = oneshot::channel();
    let provider = ScriptedProvider::new([Step::fail(), Step::ok("london").gated(gate)]);
    let session = Session::start(Location::default(), provider.clone(), None);
    let mut rx = session.subscribe();
    wait_until(&mut rx, |s| s.error.is_some() && !s.loading).await;

    let mut watcher = session.subscribe();
    let first_seen = tokio::spawn(async move {
        watcher
            .wait_for(|s| s.location.label == "London")
            .await
            .map(|s| (s.loading, s.error.clone()))
            .ok()
    });
    session.set_location(london());
    assert_eq!(first_seen.await.unwrap(), Some((true, None)));

    release.send(()).unwrap();
    wait_until(&mut rx, |s| prediction(s) == Some("london") && !s.loading).await;
    assert_eq!(provider.calls(), 2);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn timer_refreshes_every_interval() {
    let provider = ScriptedProvider::always_ok();
    let session = Session::start(Location::default(), provider.clone(), None);
    let mut rx = session.subscribe();
    wait_until(&mut rx, |s| !s.loading).await;

    for expected in 2..=4 {
        tokio::time::advance(nowcast_core::REFRESH_INTERVAL).await;
        settle().await;
        assert_eq!(provider.calls(), expected);
    }

    session.shutdown().await;
}

#[tokio::test]
async fn failed_refresh_keeps_previous_snapshot() {
    let provider = ScriptedProvider::new([Step::ok("first"), Step::fail()]);
    let session = Session::start(Location::default(), provider.clone(), None);
    let mut rx = session.subscribe();
    wait_until(&mut rx, |s| s.snapshot.is_some() && !s.loading).await;

    session.refresh();
    wait_until(&mut rx, |s| s.error.is_some() && !s.loading).await;

    let state = session.state();
    assert_eq!(prediction(&state), Some("first"));
    assert!(matches!(View::project(&state), View::Dashboard(_)));

    session.shutdown().await;
}

#[tokio::test]
async fn failure_without_data_shows_error_until_retry_succeeds() {
    let provider = ScriptedProvider::new([Step::fail(), Step::ok("second")]);
    let session = Session::start(Location::default(), provider.clone(), None);
    let mut rx = session.subscribe();
    wait_until(&mut rx, |s| s.error.is_some() && !s.loading).await;

    let View::Error { message } = View::project(&session.state()) else {
        panic!("expected the error view");
    };
    assert!(message.contains("Failed to fetch weather data"));

    session.refresh();
    wait_until(&mut rx, |s| s.snapshot.is_some() && !s.loading).await;

    let state = session.state();
    assert_eq!(state.error, None);
    assert_eq!(prediction(&state), Some("second"));
    assert_eq!(provider.calls(), 2);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn teardown_stops_periodic_fetches() {
    let provider = ScriptedProvider::always_ok();
    let session = Session::start(Location::default(), provider.clone(), None);
    let mut rx = session.subscribe();
    wait_until(&mut rx, |s| !s.loading).await;

    session.shutdown().await;

    tokio::time::advance(Duration::from_secs(600)).await;
    settle().await;
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn completion_after_teardown_changes_nothing() {
    let (release, gate) = oneshot::channel();
    let provider = ScriptedProvider::new([Step::ok("late").gated(gate)]);
    let session = Session::start(Location::default(), provider.clone(), None);
    let rx = session.subscribe();
    settle().await;

    session.shutdown().await;
    let _ = release.send(());
    settle().await;

    let state = rx.borrow().clone();
    assert!(state.loading);
    assert!(state.snapshot.is_none());
}

#[tokio::test]
async fn last_issued_request_wins() {
    let (release_slow, slow) = oneshot::channel();
    let provider = ScriptedProvider::new([
        Step::ok("initial"),
        Step::ok("slow").gated(slow),
        Step::ok("fast"),
    ]);
    let session = Session::start(Location::default(), provider.clone(), None);
    let mut rx = session.subscribe();
    wait_until(&mut rx, |s| prediction(s) == Some("initial")).await;

    session.refresh();
    session.refresh();
    wait_until(&mut rx, |s| prediction(s) == Some("fast") && !s.loading).await;

    release_slow.send(()).unwrap();
    settle().await;

    let state = session.state();
    assert_eq!(prediction(&state), Some("fast"));
    assert!(!state.loading);

    session.shutdown().await;
}

#[tokio::test]
async fn superseded_completion_does_not_clear_loading() {
    let (release_a, a) = oneshot::channel();
    let (release_b, b) = oneshot::channel();
    let provider = ScriptedProvider::new([
        Step::ok("initial"),
        Step::ok("a").gated(a),
        Step::ok("b").gated(b),
    ]);
    let session = Session::start(Location::default(), provider.clone(), None);
    let mut rx = session.subscribe();
    wait_until(&mut rx, |s| prediction(s) == Some("initial") && !s.loading).await;

    session.refresh();
    session.refresh();
    settle().await;
    assert_eq!(provider.calls(), 3);

    release_a.send(()).unwrap();
    settle().await;
    let state = session.state();
    assert!(state.loading);
    assert_eq!(prediction(&state), Some("initial"));

    release_b.send(()).unwrap();
    wait_until(&mut rx, |s| prediction(s) == Some("b") && !s.loading).await;

    session.shutdown().await;
}

#[tokio::test]
async fn device_location_updates_coordinates_and_label_together() {
    let provider = ScriptedProvider::always_ok();
    let fix = Coordinates { latitude: 47.6062, longitude: -122.3321 };
    let geolocation: Arc<dyn GeolocationProvider> = Arc::new(FixedGeolocator(Some(fix)));
    let session = Session::start(Location::default(), provider.clone(), Some(geolocation));
    let mut rx = session.subscribe();
    wait_until(&mut rx, |s| !s.loading).await;

    assert_eq!(session.use_device_location(), LocateOutcome::Requested);

    let default = Location::default();
    loop {
        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        let loc = &state.location;
        if loc.label == "Your Location" {
            assert_eq!((loc.latitude, loc.longitude), (fix.latitude, fix.longitude));
        } else {
            assert_eq!(loc, &default);
        }
        if !state.loading
            && state.snapshot.as_ref().is_some_and(|s| s.location.latitude == fix.latitude)
        {
            break;
        }
    }

    assert_eq!(provider.calls(), 2);
    session.shutdown().await;
}

#[tokio::test]
async fn geolocation_failure_sets_message_and_keeps_state() {
    let provider = ScriptedProvider::new([Step::ok("first")]);
    let geolocation: Arc<dyn GeolocationProvider> = Arc::new(FixedGeolocator(None));
    let session = Session::start(Location::default(), provider.clone(), Some(geolocation));
    let mut rx = session.subscribe();
    wait_until(&mut rx, |s| s.snapshot.is_some() && !s.loading).await;

    assert_eq!(session.use_device_location(), LocateOutcome::Requested);
    wait_until(&mut rx, |s| s.error.is_some()).await;

    let state = session.state();
    assert_eq!(state.error.as_deref(), Some("Could not get your location"));
    assert_eq!(state.location, Location::default());
    assert_eq!(prediction(&state), Some("first"));
    assert_eq!(provider.calls(), 1);

    session.shutdown().await;
}

#[tokio::test]
async fn missing_geolocation_capability_is_a_no_op() {
    let provider = ScriptedProvider::always_ok();
    let session = Session::start(london(), provider.clone(), None);
    let mut rx = session.subscribe();
    wait_until(&mut rx, |s| !s.loading).await;
    let before = session.state();

    assert_eq!(session.use_device_location(), LocateOutcome::Unsupported);
    settle().await;

    assert_eq!(session.state(), before);
    assert_eq!(provider.calls(), 1);

    session.shutdown().await;
}
