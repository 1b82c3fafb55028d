//! The fetch controller.
//!
//! A [`Session`] owns one dashboard's state for as long as the view is up. All
//! state lives in a single actor task; the handle sends commands to it and
//! reads published [`DashboardState`] values through a `watch` channel, so a
//! reader always sees location, snapshot, loading flag and error from the same
//! update.
//!
//! Requests are tagged with a sequence number when issued. A completion that
//! is not for the latest issued request is dropped, so a slow response can
//! never overwrite a newer one.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, watch},
    task::{JoinHandle, JoinSet},
    time::{self, Instant, Interval, MissedTickBehavior},
};

use crate::{
    geolocation::{GEOLOCATION_FAILED_MESSAGE, GeolocationError, GeolocationProvider},
    model::{Coordinates, Location, WeatherSnapshot},
    provider::{FetchError, WeatherProvider},
};

/// Period of the automatic refresh, measured from activation or from the
/// latest location change.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(120);

/// Everything a render pass needs. Loading and a stale snapshot may coexist.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub location: Location,
    pub snapshot: Option<Arc<WeatherSnapshot>>,
    pub loading: bool,
    pub error: Option<String>,
}

impl DashboardState {
    fn initial(location: Location) -> Self {
        Self { location, snapshot: None, loading: true, error: None }
    }
}

/// What happened to a "use my location" request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateOutcome {
    /// A position lookup was started; its result arrives through the state.
    Requested,
    /// No geolocation capability. Nothing was changed.
    Unsupported,
}

#[derive(Debug)]
enum Command {
    Refresh,
    SetLocation(Location),
    UseDeviceLocation,
}

enum Completion {
    Fetch { seq: u64, result: Result<WeatherSnapshot, FetchError> },
    Locate(Result<Coordinates, GeolocationError>),
}

/// Handle to a running dashboard session.
///
/// Dropping the handle also ends the session; [`Session::shutdown`] additionally
/// waits until the actor is gone.
#[derive(Debug)]
pub struct Session {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<DashboardState>,
    geolocation_available: bool,
    task: JoinHandle<()>,
}

impl Session {
    /// Activate a session. Issues the initial fetch and arms the refresh
    /// timer. Must be called from within a tokio runtime.
    pub fn start(
        location: Location,
        weather: Arc<dyn WeatherProvider>,
        geolocation: Option<Arc<dyn GeolocationProvider>>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(DashboardState::initial(location));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let geolocation_available = geolocation.is_some();

        let controller = Controller {
            weather,
            geolocation,
            state: state_tx,
            issued: 0,
            in_flight: JoinSet::new(),
            timer: refresh_timer(),
        };
        let task = tokio::spawn(controller.run(cmd_rx));

        Self { commands: cmd_tx, state: state_rx, geolocation_available, task }
    }

    /// Fetch again for the current location. Also the retry action.
    pub fn refresh(&self) {
        self.send(Command::Refresh);
    }

    /// Replace the location; triggers one fetch and restarts the refresh window.
    pub fn set_location(&self, location: Location) {
        self.send(Command::SetLocation(location));
    }

    pub fn use_device_location(&self) -> LocateOutcome {
        if !self.geolocation_available {
            tracing::warn!("geolocation requested but no location capability is configured");
            return LocateOutcome::Unsupported;
        }
        self.send(Command::UseDeviceLocation);
        LocateOutcome::Requested
    }

    /// Copy of the most recently published state.
    pub fn state(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.clone()
    }

    /// Tear the session down: cancels the timer and abandons in-flight
    /// requests. Returns once no further state change can happen.
    pub async fn shutdown(self) {
        let Session { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "session task ended abnormally");
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("session already stopped; command ignored");
        }
    }
}

fn refresh_timer() -> Interval {
    let mut timer = time::interval_at(Instant::now() + REFRESH_INTERVAL, REFRESH_INTERVAL);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

struct Controller {
    weather: Arc<dyn WeatherProvider>,
    geolocation: Option<Arc<dyn GeolocationProvider>>,
    state: watch::Sender<DashboardState>,
    /// Sequence number of the latest issued fetch.
    issued: u64,
    in_flight: JoinSet<Completion>,
    timer: Interval,
}

impl Controller {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        {
            let state = self.state.borrow();
            tracing::info!(location = %state.location.label, "dashboard session started");
        }

        // Activation and the first observation of the location are one event.
        self.refresh();

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Refresh) => self.refresh(),
                    Some(Command::SetLocation(location)) => self.set_location(location),
                    Some(Command::UseDeviceLocation) => self.locate(),
                    None => break,
                },
                Some(joined) = self.in_flight.join_next() => match joined {
                    Ok(completion) => self.complete(completion),
                    Err(e) => tracing::warn!(error = %e, "background request task failed"),
                },
                _ = self.timer.tick() => {
                    tracing::debug!("periodic refresh");
                    self.refresh();
                }
            }
        }

        // Dropping `in_flight` aborts anything still running.
        self.in_flight.abort_all();
        tracing::info!("dashboard session stopped");
    }

    fn refresh(&mut self) {
        self.fetch_with(|_| {});
    }

    fn set_location(&mut self, location: Location) {
        tracing::info!(
            label = %location.label,
            lat = location.latitude,
            lon = location.longitude,
            "location changed"
        );
        self.timer = refresh_timer();
        self.fetch_with(move |s| s.location = location);
    }

    /// Apply `update` and mark a fetch as pending in one publish, then fetch
    /// for the resulting location.
    fn fetch_with(&mut self, update: impl FnOnce(&mut DashboardState)) {
        self.issued += 1;
        let seq = self.issued;

        self.state.send_modify(|s| {
            update(s);
            s.loading = true;
            s.error = None;
        });
        let location = self.state.borrow().location.clone();

        let weather = Arc::clone(&self.weather);
        self.in_flight.spawn(async move {
            let result = weather.fetch(&location).await;
            Completion::Fetch { seq, result }
        });
    }

    fn locate(&mut self) {
        let Some(geolocation) = self.geolocation.clone() else {
            return;
        };
        self.in_flight.spawn(async move { Completion::Locate(geolocation.current_position().await) });
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Fetch { seq, .. } if seq != self.issued => {
                tracing::debug!(seq, latest = self.issued, "dropping superseded weather response");
            }
            Completion::Fetch { result: Ok(snapshot), .. } => {
                let snapshot = Arc::new(snapshot);
                self.state.send_modify(|s| {
                    s.snapshot = Some(snapshot);
                    s.error = None;
                    s.loading = false;
                });
            }
            Completion::Fetch { result: Err(err), .. } => {
                if self.state.borrow().snapshot.is_some() {
                    tracing::warn!(error = %err, "refresh failed; keeping previous weather");
                } else {
                    tracing::warn!(error = %err, "weather fetch failed");
                }
                self.state.send_modify(|s| {
                    s.error = Some(err.to_string());
                    s.loading = false;
                });
            }
            Completion::Locate(Ok(fix)) => self.set_location(Location::from_device(fix)),
            Completion::Locate(Err(err)) => {
                tracing::warn!(error = %err, "geolocation failed");
                self.state.send_modify(|s| s.error = Some(GEOLOCATION_FAILED_MESSAGE.to_string()));
            }
        }
    }
}
