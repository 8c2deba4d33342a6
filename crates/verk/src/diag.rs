//! Diagnostics sender: ships frame reports to `verk-telemetry` over UDP.
//!
//! Enabled by the `diagnostics` feature flag. A scheduler built from a
//! [`SchedulerConfig`](crate::SchedulerConfig) with a `diagnostics_addr`
//! owns a [`DiagSender`] and hands it the [`FrameReport`] after every run.
//! Sending is throttled to 10 Hz and fire-and-forget: a missing listener
//! never slows the frame down.
//!
//! [`init_logger`] installs a logger that forwards to `env_logger` and keeps
//! recent records in a ring buffer, so they can ride along in the next
//! snapshot.

use std::collections::VecDeque;
use std::io;
use std::net::UdpSocket;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::schedule::FrameReport;
use crate::time::FrameTime;

/// Default address `verk-telemetry` listens on.
pub const DEFAULT_ADDR: &str = "127.0.0.1:9100";

const SEND_INTERVAL: Duration = Duration::from_millis(100);
const LOG_CAPACITY: usize = 500;
const LOGS_PER_SNAPSHOT: usize = 50;

// ── DiagSender ───────────────────────────────────────────────────────────

/// Owns the outbound UDP socket and the throttle state.
pub struct DiagSender {
    socket: UdpSocket,
    last_send: Option<Instant>,
}

impl DiagSender {
    /// Bind an ephemeral local port and connect it to `addr`.
    pub fn connect(addr: &str) -> io::Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0")?;
        socket.connect(addr)?;
        socket.set_nonblocking(true)?;
        log::info!("diagnostics streaming to {addr}");
        Ok(Self {
            socket,
            last_send: None,
        })
    }

    /// Send a snapshot unless one went out less than 100 ms ago.
    /// Returns `true` if a datagram was sent.
    pub fn send(&mut self, report: &FrameReport, time: &FrameTime) -> bool {
        let now = Instant::now();
        if self
            .last_send
            .is_some_and(|last| now.duration_since(last) < SEND_INTERVAL)
        {
            return false;
        }
        self.last_send = Some(now);

        let snapshot = DiagSnapshot {
            fps: time.fps(),
            delta_ms: time.delta_secs() * 1000.0,
            elapsed_secs: time.elapsed_secs(),
            report,
            logs: drain_captured_logs(LOGS_PER_SNAPSHOT),
        };
        match serde_json::to_vec(&snapshot) {
            Ok(json) => self.socket.send(&json).is_ok(),
            Err(err) => {
                log::warn!("failed to encode diagnostics snapshot: {err}");
                false
            }
        }
    }
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct DiagSnapshot<'a> {
    fps: f32,
    delta_ms: f32,
    elapsed_secs: f32,
    #[serde(flatten)]
    report: &'a FrameReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    logs: Vec<CapturedLog>,
}

/// One captured log record.
#[derive(Clone, Debug, Serialize)]
struct CapturedLog {
    level: String,
    target: String,
    message: String,
    timestamp_secs: f32,
}

// ── Log capture ──────────────────────────────────────────────────────────

struct LogRing {
    entries: VecDeque<CapturedLog>,
    start: Instant,
}

impl LogRing {
    fn push(&mut self, entry: CapturedLog) {
        if self.entries.len() >= LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    fn drain(&mut self, max: usize) -> Vec<CapturedLog> {
        let n = self.entries.len().min(max);
        self.entries.drain(..n).collect()
    }
}

static LOG_RING: Mutex<Option<LogRing>> = Mutex::new(None);

/// Captures into [`LOG_RING`] and delegates to env_logger for stderr.
struct DiagLogger {
    inner: env_logger::Logger,
}

impl log::Log for DiagLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata) || metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record) {
        if self.inner.enabled(record.metadata()) {
            self.inner.log(record);
        }
        if record.level() > log::Level::Info && !self.inner.enabled(record.metadata()) {
            return;
        }
        capture(record);
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

fn capture(record: &log::Record) {
    let mut guard = LOG_RING.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(ring) = guard.as_mut() {
        let entry = CapturedLog {
            level: record.level().to_string(),
            target: record.target().to_string(),
            message: record.args().to_string(),
            timestamp_secs: ring.start.elapsed().as_secs_f32(),
        };
        ring.push(entry);
    }
}

static DIAG_LOGGER: OnceLock<DiagLogger> = OnceLock::new();

/// Install the capturing logger. `RUST_LOG` controls stderr output as usual;
/// `info` and above are always captured.
///
/// Returns `false` if another logger was installed first; capture is then
/// disabled.
pub fn init_logger() -> bool {
    *LOG_RING.lock().unwrap_or_else(PoisonError::into_inner) = Some(LogRing {
        entries: VecDeque::new(),
        start: Instant::now(),
    });

    let inner = env_logger::Builder::new().parse_default_env().build();
    let max_level = inner.filter();
    let logger = DIAG_LOGGER.get_or_init(|| DiagLogger { inner });

    if log::set_logger(logger).is_err() {
        eprintln!("[verk] a logger is already set; log capture disabled");
        return false;
    }
    log::set_max_level(max_level.max(log::LevelFilter::Info));
    true
}

fn drain_captured_logs(max: usize) -> Vec<CapturedLog> {
    LOG_RING
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .as_mut()
        .map(|ring| ring.drain(max))
        .unwrap_or_default()
}
