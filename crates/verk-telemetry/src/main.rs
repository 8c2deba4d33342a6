//! verk-telemetry — TUI dashboard for a running verk scheduler.
//!
//! Listens for the JSON frame reports a scheduler sends when its config has
//! a `diagnostics_addr`, and shows how each stage was split between the
//! worker pool and the calling thread, plus per-system timings.
//!
//! ```text
//! cargo run -p verk-telemetry [bind-addr]     # default 127.0.0.1:9100
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Stdout};
use std::net::UdpSocket;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Sparkline};
use serde::Deserialize;

const DEFAULT_ADDR: &str = "127.0.0.1:9100";

// ── Wire types (must match verk's diag snapshot) ─────────────────────────

#[derive(Deserialize, Clone, Default)]
struct DiagSnapshot {
    fps: f32,
    delta_ms: f32,
    elapsed_secs: f32,
    frame: u64,
    #[serde(default)]
    stages: Vec<StageInfo>,
    #[serde(default)]
    systems: Vec<SystemTimingInfo>,
    total_us: f64,
    #[serde(default)]
    logs: Vec<LogEntryInfo>,
}

#[derive(Deserialize, Clone, Default)]
struct StageInfo {
    stage: String,
    parallel: Vec<String>,
    exclusive: Vec<String>,
    duration_us: f64,
}

#[derive(Deserialize, Clone, Default)]
struct SystemTimingInfo {
    name: String,
    stage: String,
    duration_us: f64,
    ran: bool,
}

#[derive(Deserialize, Clone, Default)]
struct LogEntryInfo {
    level: String,
    message: String,
    timestamp_secs: f32,
}

impl LogEntryInfo {
    fn is_problem(&self) -> bool {
        matches!(self.level.as_str(), "WARN" | "ERROR")
    }
}

// ── Views ────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq)]
enum View {
    Stages,
    Systems,
}

impl View {
    fn toggled(self) -> Self {
        match self {
            View::Stages => View::Systems,
            View::Systems => View::Stages,
        }
    }
}

// ── Aggregated system row ────────────────────────────────────────────────

/// One system's time in the latest frame. A system linked into several
/// parents can run more than once per frame; its runs are summed.
#[derive(Clone, Debug, PartialEq)]
struct SystemRow {
    name: String,
    stage: String,
    total_us: f64,
    runs: usize,
    skipped: usize,
}

fn aggregate_systems(timings: &[SystemTimingInfo]) -> Vec<SystemRow> {
    let mut rows: BTreeMap<(String, String), SystemRow> = BTreeMap::new();
    for timing in timings {
        let row = rows
            .entry((timing.stage.clone(), timing.name.clone()))
            .or_insert_with(|| SystemRow {
                name: timing.name.clone(),
                stage: timing.stage.clone(),
                total_us: 0.0,
                runs: 0,
                skipped: 0,
            });
        row.total_us += timing.duration_us;
        if timing.ran {
            row.runs += 1;
        } else {
            row.skipped += 1;
        }
    }
    let mut rows: Vec<SystemRow> = rows.into_values().collect();
    rows.sort_by(|a, b| b.total_us.total_cmp(&a.total_us));
    rows
}

/// Share of the frame's system time spent in the parallel set, per stage.
fn parallel_share(snap: &DiagSnapshot) -> BTreeMap<&str, f64> {
    let mut parallel: BTreeMap<&str, f64> = BTreeMap::new();
    let mut total: BTreeMap<&str, f64> = BTreeMap::new();
    for stage in &snap.stages {
        for timing in snap.systems.iter().filter(|t| t.stage == stage.stage) {
            *total.entry(stage.stage.as_str()).or_default() += timing.duration_us;
            if stage.parallel.contains(&timing.name) {
                *parallel.entry(stage.stage.as_str()).or_default() += timing.duration_us;
            }
        }
    }
    total
        .into_iter()
        .map(|(stage, us)| {
            let share = if us > 0.0 {
                parallel.get(stage).copied().unwrap_or(0.0) / us
            } else {
                0.0
            };
            (stage, share)
        })
        .collect()
}

// ── Dashboard state ──────────────────────────────────────────────────────

const HISTORY_CAP: usize = 600;
const LOG_CAP: usize = 200;
const FRAME_TARGET_MS: f64 = 16.6;

struct Dashboard {
    latest: Option<DiagSnapshot>,
    fps: VecDeque<u64>,
    /// Scheduler time per received frame, in microseconds.
    sched_us: VecDeque<u64>,
    logs: VecDeque<LogEntryInfo>,
    /// Frames the scheduler reported as aborted.
    aborts: usize,
    view: View,
    problems_only: bool,
    frozen: bool,
}

impl Dashboard {
    fn new() -> Self {
        Self {
            latest: None,
            fps: VecDeque::with_capacity(HISTORY_CAP),
            sched_us: VecDeque::with_capacity(HISTORY_CAP),
            logs: VecDeque::with_capacity(LOG_CAP),
            aborts: 0,
            view: View::Stages,
            problems_only: false,
            frozen: false,
        }
    }

    fn ingest(&mut self, snap: DiagSnapshot) {
        if self.frozen {
            return;
        }
        push_capped(&mut self.fps, snap.fps.round().max(0.0) as u64, HISTORY_CAP);
        push_capped(
            &mut self.sched_us,
            snap.total_us.round().max(0.0) as u64,
            HISTORY_CAP,
        );
        for entry in &snap.logs {
            if entry.level == "ERROR" && entry.message.contains("aborted") {
                self.aborts += 1;
            }
            push_capped(&mut self.logs, entry.clone(), LOG_CAP);
        }
        self.latest = Some(snap);
    }

    fn visible_logs(&self, rows: usize) -> Vec<&LogEntryInfo> {
        let mut shown: Vec<&LogEntryInfo> = self
            .logs
            .iter()
            .rev()
            .filter(|entry| !self.problems_only || entry.is_problem())
            .take(rows)
            .collect();
        shown.reverse();
        shown
    }

    /// Returns `false` once the user asked to quit.
    fn on_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return false,
            KeyCode::Tab | KeyCode::BackTab => self.view = self.view.toggled(),
            KeyCode::Char('s') => self.view = View::Stages,
            KeyCode::Char('t') => self.view = View::Systems,
            KeyCode::Char('w') => self.problems_only = !self.problems_only,
            KeyCode::Char(' ') => self.frozen = !self.frozen,
            _ => {}
        }
        true
    }
}

fn push_capped<T>(queue: &mut VecDeque<T>, value: T, cap: usize) {
    if queue.len() == cap {
        queue.pop_front();
    }
    queue.push_back(value);
}

// ── Terminal ─────────────────────────────────────────────────────────────

/// Raw-mode alternate screen, restored when dropped.
struct Screen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Screen {
    fn open() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        Ok(Self {
            terminal: Terminal::new(CrosstermBackend::new(stdout))?,
        })
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

fn main() -> io::Result<()> {
    let addr = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let socket = UdpSocket::bind(&addr).map_err(|err| {
        io::Error::new(err.kind(), format!("cannot listen on {addr}: {err}"))
    })?;
    socket.set_nonblocking(true)?;

    let mut screen = Screen::open()?;
    let mut dashboard = Dashboard::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        while let Ok(len) = socket.recv(&mut buf) {
            match serde_json::from_slice::<DiagSnapshot>(&buf[..len]) {
                Ok(snap) => dashboard.ingest(snap),
                Err(_) => continue,
            }
        }

        screen.terminal.draw(|f| render(f, &dashboard, &addr))?;

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if !dashboard.on_key(key) {
                return Ok(());
            }
        }
    }
}

// ── Rendering ────────────────────────────────────────────────────────────

fn render(f: &mut ratatui::Frame, dash: &Dashboard, addr: &str) {
    let [status, body, logs, keys] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(7),
            Constraint::Length(1),
        ])
        .areas(f.area());

    render_status(f, dash, addr, status);
    match (&dash.latest, dash.view) {
        (None, _) => placeholder(f, body, &format!("listening on {addr}, no frames yet")),
        (Some(snap), View::Stages) => render_stages_view(f, dash, snap, body),
        (Some(snap), View::Systems) => render_systems_view(f, snap, body),
    }
    render_logs(f, dash, logs);
    render_keys(f, keys);
}

fn dim() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn panel(title: String) -> Block<'static> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(dim())
}

fn placeholder(f: &mut ratatui::Frame, area: Rect, text: &str) {
    let block = panel(" verk ".to_string());
    let inner = block.inner(area);
    f.render_widget(block, area);
    f.render_widget(Paragraph::new(Span::styled(format!("  {text}"), dim())), inner);
}

fn render_status(f: &mut ratatui::Frame, dash: &Dashboard, addr: &str, area: Rect) {
    let (badge, color) = match (&dash.latest, dash.frozen) {
        (_, true) => ("FROZEN", Color::Yellow),
        (Some(_), false) => ("LIVE", Color::Green),
        (None, false) => ("IDLE", Color::DarkGray),
    };
    let mut spans = vec![Span::styled(
        format!(" {badge} "),
        Style::default().bg(color).fg(Color::Black),
    )];

    if let Some(snap) = &dash.latest {
        let fields = [
            ("frame", snap.frame.to_string()),
            ("fps", format!("{:.1}", snap.fps)),
            ("dt", format!("{:.2}ms", snap.delta_ms)),
            ("sched", format!("{:.3}ms", snap.total_us / 1000.0)),
            ("up", format_uptime(snap.elapsed_secs)),
            ("aborts", dash.aborts.to_string()),
        ];
        for (label, value) in fields {
            spans.push(Span::styled(format!("  {label} "), dim()));
            spans.push(Span::styled(
                value,
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ));
        }
    }

    let block = Block::default()
        .title(format!(" verk-telemetry @ {addr} "))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_stages_view(f: &mut ratatui::Frame, dash: &Dashboard, snap: &DiagSnapshot, area: Rect) {
    let [history, stages] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(3)])
        .areas(area);
    let [fps_area, sched_area] = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .areas(history);

    let fps: Vec<u64> = dash.fps.iter().copied().collect();
    let (lo, mean, hi) = stats(&fps);
    render_history(
        f,
        fps_area,
        format!(" fps  {lo:.0} / {mean:.0} / {hi:.0} "),
        &fps,
        Color::Green,
    );

    let sched: Vec<u64> = dash.sched_us.iter().copied().collect();
    let (lo, mean, hi) = stats(&sched);
    render_history(
        f,
        sched_area,
        format!(" scheduler µs  {lo:.0} / {mean:.0} / {hi:.0} "),
        &sched,
        Color::Yellow,
    );

    let shares = parallel_share(snap);
    let block = panel(" stages   ∥ worker pool   → calling thread ".to_string());
    let inner = block.inner(stages);
    f.render_widget(block, stages);

    let mut lines = Vec::new();
    for stage in &snap.stages {
        let share = shares.get(stage.stage.as_str()).copied().unwrap_or(0.0);
        lines.push(Line::from(vec![
            Span::styled(
                format!(" {:<13}", stage.stage),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("{:>9.1}µs", stage.duration_us), dim()),
            Span::styled(
                format!("  {:>3.0}% pooled", share * 100.0),
                Style::default().fg(Color::Green),
            ),
        ]));
        for (marker, color, names, sep) in [
            ("∥", Color::Green, &stage.parallel, "  "),
            ("→", Color::Yellow, &stage.exclusive, " → "),
        ] {
            if !names.is_empty() {
                lines.push(Line::from(vec![
                    Span::styled(format!("     {marker} "), Style::default().fg(color)),
                    Span::raw(names.join(sep)),
                ]));
            }
        }
    }
    f.render_widget(Paragraph::new(lines), inner);
}

fn render_history(f: &mut ratatui::Frame, area: Rect, title: String, data: &[u64], color: Color) {
    let block = panel(title);
    let inner = block.inner(area);
    f.render_widget(block, area);
    f.render_widget(
        Sparkline::default().data(data).style(Style::default().fg(color)),
        inner,
    );
}

fn render_systems_view(f: &mut ratatui::Frame, snap: &DiagSnapshot, area: Rect) {
    let load = snap.total_us / 1000.0 / FRAME_TARGET_MS;
    let block = panel(format!(
        " systems   {:.0}% of a {FRAME_TARGET_MS}ms frame ",
        load * 100.0
    ));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = aggregate_systems(&snap.systems);
    if rows.is_empty() {
        f.render_widget(Paragraph::new(Span::styled("  no systems ran", dim())), inner);
        return;
    }

    let widest = rows.iter().map(|r| r.name.len()).max().unwrap_or(8).min(28);
    let bar_room = inner.width.saturating_sub(widest as u16 + 34) as usize;
    let slowest = rows[0].total_us.max(1.0);

    let lines: Vec<Line> = rows
        .iter()
        .take(inner.height as usize)
        .map(|row| {
            let filled = ((row.total_us / slowest) * bar_room as f64).round() as usize;
            let heat = match row.total_us {
                _ if row.runs == 0 => Color::DarkGray,
                us if us < 1_000.0 => Color::Green,
                us if us < 4_000.0 => Color::Yellow,
                _ => Color::Red,
            };
            let runs = match row.skipped {
                0 => format!("×{}", row.runs),
                skipped => format!("×{} ({skipped} skipped)", row.runs),
            };
            Line::from(vec![
                Span::raw(format!(" {:<widest$}", row.name)),
                Span::styled(format!(" {:<12}", row.stage), dim()),
                Span::styled(format!("{:>9.1}µs ", row.total_us), dim()),
                Span::styled("▇".repeat(filled.max(1)), Style::default().fg(heat)),
                Span::styled(format!(" {runs}"), dim()),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(lines), inner);
}

fn render_logs(f: &mut ratatui::Frame, dash: &Dashboard, area: Rect) {
    let scope = if dash.problems_only { "warnings" } else { "all" };
    let block = panel(format!(" log ({scope}) "));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let lines: Vec<Line> = dash
        .visible_logs(inner.height as usize)
        .into_iter()
        .map(|entry| {
            let color = match entry.level.as_str() {
                "ERROR" => Color::Red,
                "WARN" => Color::Yellow,
                "INFO" => Color::Cyan,
                _ => Color::DarkGray,
            };
            Line::from(vec![
                Span::styled(format!(" {:>7.1}s ", entry.timestamp_secs), dim()),
                Span::styled(format!("{:<5} ", entry.level), Style::default().fg(color)),
                Span::raw(entry.message.clone()),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(lines), inner);
}

fn render_keys(f: &mut ratatui::Frame, area: Rect) {
    let mut spans = Vec::new();
    for (key, action) in [
        ("tab", "switch view"),
        ("w", "warnings only"),
        ("space", "freeze"),
        ("q", "quit"),
    ] {
        spans.push(Span::styled(format!(" {key}"), Style::default().fg(Color::Cyan)));
        spans.push(Span::styled(format!(" {action} "), dim()));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn stats(data: &[u64]) -> (f64, f64, f64) {
    let (Some(min), Some(max)) = (data.iter().min(), data.iter().max()) else {
        return (0.0, 0.0, 0.0);
    };
    let avg = data.iter().sum::<u64>() as f64 / data.len() as f64;
    (*min as f64, avg, *max as f64)
}

fn format_uptime(secs: f32) -> String {
    let total = secs as u64;
    match (total / 3600, (total % 3600) / 60, total % 60) {
        (0, 0, _) => format!("{secs:.1}s"),
        (0, m, s) => format!("{m}m{s}s"),
        (h, m, s) => format!("{h}h{m}m{s}s"),
    }
}
