//! The `watch` loop: draws every published state with ratatui and turns key
//! presses into session commands.

use std::{
    io::{self, Stdout},
    pin::pin,
    thread,
    time::Duration,
};

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use nowcast_core::{
    Config, LocateOutcome, Location, Session, View, provider::default_provider_from_config,
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;

use crate::{
    cli::source_description,
    render::{self, RenderOptions},
};

const INPUT_POLL: Duration = Duration::from_millis(100);
const LOCATE_DISABLED: &str = "Location lookup is disabled; enable it with `nowcast configure`.";

type Tui = Terminal<CrosstermBackend<Stdout>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Refresh,
    Locate,
    Quit,
}

impl Key {
    pub fn from_event(key: KeyEvent) -> Option<Self> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        match key.code {
            // Raw mode swallows SIGINT.
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Key::Quit),
            KeyCode::Char('r' | 'R') => Some(Key::Refresh),
            KeyCode::Char('l' | 'L') => Some(Key::Locate),
            KeyCode::Char('q' | 'Q') | KeyCode::Esc => Some(Key::Quit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Refresh,
    Locate,
    Quit,
}

/// What `key` does on the screen currently shown. Refresh is off while a
/// refresh is in flight; the location key only exists on the dashboard.
pub fn action(key: Key, view: &View) -> Option<Action> {
    match (key, view) {
        (Key::Quit, _) => Some(Action::Quit),
        (Key::Refresh, View::Error { .. }) => Some(Action::Refresh),
        (Key::Refresh, View::Dashboard(d)) if !d.refreshing => Some(Action::Refresh),
        (Key::Locate, View::Dashboard(_)) => Some(Action::Locate),
        _ => None,
    }
}

pub async fn run(config: &Config, location: Location) -> anyhow::Result<()> {
    let provider = default_provider_from_config(config)?;
    let geolocation = config.geolocation_provider()?;
    let opts = RenderOptions { source: source_description(config)? };

    let mut terminal = setup_terminal()?;
    let session = Session::start(location, provider, geolocation);
    tracing::info!("dashboard started");

    let result = event_loop(&mut terminal, &session, &opts).await;
    let restored = restore_terminal(&mut terminal);
    session.shutdown().await;
    result.and(restored)
}

async fn event_loop(terminal: &mut Tui, session: &Session, opts: &RenderOptions) -> anyhow::Result<()> {
    let mut state = session.subscribe();
    let mut input = spawn_input_reader();
    let mut input_open = true;
    let mut ctrl_c = pin!(tokio::signal::ctrl_c());
    let mut notice: Option<&'static str> = None;

    let mut view = View::project(&state.borrow_and_update());
    terminal.draw(|frame| render::draw(frame, &view, opts, notice))?;

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                view = View::project(&state.borrow_and_update());
            }
            ev = input.recv(), if input_open => {
                let Some(ev) = ev else {
                    // Keep refreshing until interrupted.
                    input_open = false;
                    continue;
                };
                let Event::Key(ev) = ev else {
                    // Resize and friends: just redraw.
                    terminal.draw(|frame| render::draw(frame, &view, opts, notice))?;
                    continue;
                };
                let Some(key) = Key::from_event(ev) else {
                    continue;
                };
                notice = None;
                match action(key, &view) {
                    Some(Action::Refresh) => session.refresh(),
                    Some(Action::Locate) => {
                        if session.use_device_location() == LocateOutcome::Unsupported {
                            notice = Some(LOCATE_DISABLED);
                        }
                    }
                    Some(Action::Quit) => break,
                    None => tracing::debug!(?key, "key has no action on this screen"),
                }
            }
            _ = &mut ctrl_c => break,
        }
        terminal.draw(|frame| render::draw(frame, &view, opts, notice))?;
    }

    Ok(())
}

/// Polls terminal events on a plain thread; a blocked read must not hold up
/// runtime shutdown. Stops once the receiver is gone.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        while !tx.is_closed() {
            match event::poll(INPUT_POLL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(err) => {
                    tracing::debug!(error = %err, "terminal input closed");
                    break;
                }
            }
            match event::read() {
                Ok(ev) => {
                    if tx.send(ev).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::debug!(error = %err, "terminal input closed");
                    break;
                }
            }
        }
    });
    rx
}

fn setup_terminal() -> anyhow::Result<Tui> {
    terminal::enable_raw_mode()?;
    let mut out = io::stdout();
    execute!(out, EnterAlternateScreen, cursor::Hide)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(out))?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Tui) -> anyhow::Result<()> {
    execute!(io::stdout(), cursor::Show, LeaveAlternateScreen)?;
    terminal::disable_raw_mode()?;
    terminal.show_cursor()?;
    Ok(())
}
