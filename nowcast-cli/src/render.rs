//! Draws a [`View`] with ratatui.
//!
//! Every screen is split the same way: a body on top and a one-line key bar at
//! the bottom. The body is drawn by one helper per region, so `watch` (a live
//! terminal) and `show` (a buffer printed once) share the same layout.

use ratatui::{
    Frame,
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use nowcast_core::{Background, DashboardView, View};

/// Columns used by `show`.
pub const TEXT_WIDTH: u16 = 64;

mod colors {
    use ratatui::style::Color;

    pub const LABEL: Color = Color::Gray;
    pub const ERROR: Color = Color::Red;
    pub const NOTICE: Color = Color::Yellow;
    pub const MUTED: Color = Color::DarkGray;
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Shown in the footer, e.g. "backend http://127.0.0.1:8000".
    pub source: String,
}

/// Draw one frame of the live dashboard.
pub fn draw(frame: &mut Frame, view: &View, opts: &RenderOptions, notice: Option<&str>) {
    let area = frame.area();
    render_view(view, opts, notice, area, frame.buffer_mut());
}

/// Render into an off-screen buffer and return it as plain lines, trailing
/// blanks removed.
pub fn to_text(view: &View, opts: &RenderOptions) -> String {
    let height = match view {
        View::Loading => 4,
        View::Error { .. } => 10,
        View::Dashboard(_) => 28,
    };
    let area = Rect::new(0, 0, TEXT_WIDTH, height);
    let mut buf = Buffer::empty(area);
    render_view(view, opts, None, area, &mut buf);

    let mut rows: Vec<String> = (area.top()..area.bottom())
        .map(|y| {
            let row: String = (area.left()..area.right())
                .map(|x| buf.cell((x, y)).map_or(" ", |cell| cell.symbol()))
                .collect();
            row.trim_end().to_string()
        })
        .collect();
    while rows.last().is_some_and(|row| row.is_empty()) {
        rows.pop();
    }

    let mut out = rows.join("\n");
    out.push('\n');
    out
}

fn render_view(
    view: &View,
    opts: &RenderOptions,
    notice: Option<&str>,
    area: Rect,
    buf: &mut Buffer,
) {
    let [body, keys] = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(area);

    match view {
        View::Loading => draw_loading(body, buf),
        View::Error { message } => draw_error(message, body, buf),
        View::Dashboard(d) => draw_dashboard(d, opts, body, buf),
    }
    draw_key_bar(view, notice, keys, buf);
}

/// Colour used for titles and borders under each sky category.
pub fn accent(background: Background) -> Color {
    match background {
        Background::Clear => Color::Blue,
        Background::Cloudy => Color::Gray,
        Background::Rain => Color::Cyan,
        Background::Snow => Color::White,
        Background::Thunderstorm => Color::Magenta,
    }
}

fn draw_loading(area: Rect, buf: &mut Buffer) {
    let [_, line, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(1),
        Constraint::Fill(1),
    ])
    .areas(area);

    Paragraph::new("Loading weather data...")
        .centered()
        .style(Style::default().fg(colors::LABEL))
        .render(line, buf);
}

fn draw_error(message: &str, area: Rect, buf: &mut Buffer) {
    let lines = vec![
        Line::from("Error".bold().fg(colors::ERROR)),
        Line::default(),
        Line::from(message.to_string()),
    ];

    Paragraph::new(lines)
        .centered()
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(colors::ERROR)))
        .render(area, buf);
}

fn draw_dashboard(d: &DashboardView, opts: &RenderOptions, area: Rect, buf: &mut Buffer) {
    let accent = accent(d.background);
    let [header, current, prediction, footer] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(9),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .areas(area);

    draw_header(d, accent, header, buf);
    draw_current(d, accent, current, buf);
    draw_prediction(d, accent, prediction, buf);

    Paragraph::new(format!(
        "source: {} | {} | sky: {}",
        opts.source,
        d.snapshot.location.timezone,
        d.background.as_str()
    ))
    .style(Style::default().fg(colors::MUTED))
    .render(footer, buf);
}

fn draw_header(d: &DashboardView, accent: Color, area: Rect, buf: &mut Buffer) {
    let lines = vec![
        Line::from("Weather Prediction".bold().fg(accent)).centered(),
        Line::from("5-Minute Forecast").centered(),
        Line::from(vec![Span::styled("@ ", Style::default().fg(accent)), Span::raw(d.location_label.clone())]),
    ];
    Paragraph::new(lines).render(area, buf);
}

fn draw_current(d: &DashboardView, accent: Color, area: Rect, buf: &mut Buffer) {
    let c = &d.snapshot.current;
    let row = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(format!("{label:<15}"), Style::default().fg(colors::LABEL)),
            Span::raw(value),
        ])
    };

    let lines = vec![
        row(
            "Temperature",
            format!("{}°F (feels like {}°F)", round(c.temperature_2m), round(c.apparent_temperature)),
        ),
        row("Humidity", format!("{}%", c.relative_humidity_2m)),
        row("Wind", format!("{} mph {}", round(c.wind_speed_10m), compass(c.wind_direction_10m))),
        row("Cloud cover", format!("{}%", c.cloud_cover)),
        row("Precipitation", format!("{} mm", c.precipitation)),
        Line::default(),
        Line::from(Span::styled(c.description.clone(), Style::default().add_modifier(Modifier::BOLD))),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent))
        .title_top(" Current Weather ")
        .title_top(Line::from(format!(" {} ", d.observed_at().format("%H:%M"))).right_aligned());

    Paragraph::new(lines).block(block).render(area, buf);
}

fn draw_prediction(d: &DashboardView, accent: Color, area: Rect, buf: &mut Buffer) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent))
        .title_top(" 5-Minute Prediction ");

    Paragraph::new(d.snapshot.prediction.clone())
        .wrap(Wrap { trim: true })
        .block(block)
        .render(area, buf);
}

fn draw_key_bar(view: &View, notice: Option<&str>, area: Rect, buf: &mut Buffer) {
    let line = match notice {
        Some(notice) => Line::from(Span::styled(notice.to_string(), Style::default().fg(colors::NOTICE))),
        None => Line::from(key_hints(view)).style(Style::default().fg(colors::MUTED)),
    };
    Paragraph::new(line).render(area, buf);
}

/// Keys that do something on `view`.
fn key_hints(view: &View) -> &'static str {
    match view {
        View::Loading => "[q] Quit",
        View::Error { .. } => "[r] Try again   [q] Quit",
        View::Dashboard(d) if d.refreshing => "[r] Refreshing...   [l] Use my location   [q] Quit",
        View::Dashboard(_) => "[r] Refresh   [l] Use my location   [q] Quit",
    }
}

fn round(value: f64) -> i64 {
    value.round() as i64
}

/// Eight-point compass direction for a bearing in degrees.
pub fn compass(degrees: f64) -> &'static str {
    const POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let normalized = degrees.rem_euclid(360.0);
    let idx = ((normalized + 22.5) / 45.0).floor() as usize % POINTS.len();
    POINTS[idx]
}
