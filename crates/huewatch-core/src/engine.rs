//! Watch loop: state machine + poll thread.

use crate::color::{matches_any, Color, ColorSpec};
use crate::coords::ParseError;
use crate::{Point, Region, WatchConfig, WatchTarget};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

/// Granularity at which a sleeping loop notices a stop request.
const SLEEP_CHUNK_MS: u64 = 50;

/// Consecutive capture failures tolerated before the session fails.
const MAX_CAPTURE_ATTEMPTS: u32 = 3;

/// Watch session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchState {
    /// No session running.
    Idle,
    /// Poll loop active.
    Running,
    /// Cancelled by the caller (clean exit, terminal).
    Stopped,
    /// Terminated by a fatal capture error (terminal).
    Failed,
}

impl Default for WatchState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Commands sent to the poll thread.
#[derive(Debug, Clone)]
pub enum WatchCommand {
    /// Cooperative cancellation, observed at tick/sleep-chunk boundaries.
    Stop,
}

/// Captured pixel data for one region: row-major grid of colors.
#[derive(Debug, Clone)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl PixelGrid {
    pub fn new(width: u32, height: u32, pixels: Vec<Color>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }
}

/// Screen sampling failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("capture failed: {0}")]
pub struct CaptureError(pub String);

/// Pixel source boundary. Platform capture code lives behind this; the
/// loop never touches the OS directly.
pub trait ScreenSampler: Send + Sync {
    /// Capture every pixel of `region`. An impossible size (zero or
    /// negative width/height) is a `CaptureError`, not a panic.
    fn capture(&self, region: &Region) -> Result<PixelGrid, CaptureError>;

    /// Sample a single screen pixel.
    fn sample_at(&self, point: Point) -> Result<Color, CaptureError>;
}

/// One confirmed match: where, what color, and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// Absolute screen coordinates of the matching pixel.
    pub location: Point,
    pub color: Color,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

impl Detection {
    /// Wall-clock `HH:MM:SS` of the detection, for user-facing messages.
    pub fn time_display(&self) -> String {
        let fmt = time::macros::format_description!("[hour]:[minute]:[second]");
        self.at.format(fmt).unwrap_or_default()
    }

    /// The user-facing detection message.
    pub fn message(&self) -> String {
        format!(
            "{} found at {}/{} ({})",
            self.color,
            self.location.x,
            self.location.y,
            self.time_display()
        )
    }
}

/// Events emitted by the poll thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WatchEvent {
    /// State changed.
    StateChanged { old: WatchState, new: WatchState },
    /// A pixel matched the configured target set.
    MatchFound(Detection),
    /// A capture failed; the loop will retry after a backoff.
    CaptureRetry { attempt: u32, message: String },
    /// Fatal error; the session is over.
    Error { message: String },
}

/// Alert boundary: notification sound + user-facing message.
/// Implementations swallow their own failures; a broken sink must never
/// affect the loop.
pub trait AlertSink: Send + Sync {
    fn notify(&self, detection: &Detection);
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("a watch session is already running")]
    AlreadyRunning,
    #[error("no usable coordinates")]
    NoCoordinates,
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Cloneable cancellation handle, safe to trigger from a signal handler.
#[derive(Clone)]
pub struct StopSignal {
    cmd_tx: Sender<WatchCommand>,
}

impl StopSignal {
    pub fn request(&self) {
        let _ = self.cmd_tx.try_send(WatchCommand::Stop);
    }
}

/// Owns at most one watch session and the capabilities it samples and
/// alerts through. A new session is created on each `start`.
pub struct Watcher {
    sampler: Arc<dyn ScreenSampler>,
    sink: Arc<dyn AlertSink>,
    session: Option<Session>,
}

struct Session {
    cmd_tx: Sender<WatchCommand>,
    event_rx: Receiver<WatchEvent>,
    state: Arc<Mutex<WatchState>>,
    thread: Option<JoinHandle<()>>,
}

impl Watcher {
    pub fn new(sampler: Arc<dyn ScreenSampler>, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            sampler,
            sink,
            session: None,
        }
    }

    /// Spawn the poll thread for `config` and return immediately.
    /// Rejected while a session is running; the config is immutable for
    /// the life of the session.
    pub fn start(&mut self, config: WatchConfig) -> Result<(), StartError> {
        if self.state() == WatchState::Running {
            return Err(StartError::AlreadyRunning);
        }
        if let WatchTarget::Points(points) = &config.target {
            if points.is_empty() {
                return Err(StartError::NoCoordinates);
            }
        }

        // Reap the previous session's thread before replacing it.
        if let Some(mut old) = self.session.take() {
            if let Some(handle) = old.thread.take() {
                let _ = handle.join();
            }
        }

        let (cmd_tx, cmd_rx) = bounded(32);
        let (event_tx, event_rx) = bounded(256);
        let state = Arc::new(Mutex::new(WatchState::Idle));

        let runner = Runner {
            config,
            sampler: Arc::clone(&self.sampler),
            sink: Arc::clone(&self.sink),
            state: Arc::clone(&state),
            cmd_rx,
            event_tx,
        };
        let thread = thread::spawn(move || runner.run());

        self.session = Some(Session {
            cmd_tx,
            event_rx,
            state,
            thread: Some(thread),
        });
        Ok(())
    }

    pub fn state(&self) -> WatchState {
        self.session
            .as_ref()
            .map(|session| *session.state.lock().unwrap())
            .unwrap_or(WatchState::Idle)
    }

    /// Request cancellation. The loop observes it at the next tick or
    /// sleep-chunk boundary; an in-flight sample is never preempted.
    pub fn stop(&self) {
        if let Some(session) = &self.session {
            if session.cmd_tx.try_send(WatchCommand::Stop).is_err() {
                debug!("stop requested but the session is already gone");
            }
        }
    }

    /// Handle for requesting a stop from another thread.
    pub fn stop_signal(&self) -> Option<StopSignal> {
        self.session.as_ref().map(|session| StopSignal {
            cmd_tx: session.cmd_tx.clone(),
        })
    }

    pub fn try_recv(&self) -> Option<WatchEvent> {
        self.session
            .as_ref()
            .and_then(|session| session.event_rx.try_recv().ok())
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<WatchEvent> {
        self.session
            .as_ref()
            .and_then(|session| session.event_rx.recv_timeout(timeout).ok())
    }

    /// Wait for the poll thread to exit and return the terminal state.
    /// Callers re-enable their start control only after this returns.
    pub fn wait(&mut self) -> WatchState {
        if let Some(session) = self.session.as_mut() {
            if let Some(handle) = session.thread.take() {
                let _ = handle.join();
            }
        }
        self.state()
    }
}

/// Poll loop. Runs on its own thread, one instance per session.
struct Runner {
    config: WatchConfig,
    sampler: Arc<dyn ScreenSampler>,
    sink: Arc<dyn AlertSink>,
    state: Arc<Mutex<WatchState>>,
    cmd_rx: Receiver<WatchCommand>,
    event_tx: Sender<WatchEvent>,
}

impl Runner {
    fn run(self) {
        info!(
            watch_target = ?self.config.target,
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "watch session started"
        );
        self.transition(WatchState::Running);

        let mut failures = 0u32;
        loop {
            if self.should_stop() {
                break;
            }

            match self.tick() {
                Ok(()) => failures = 0,
                Err(e) => {
                    failures += 1;
                    if failures >= MAX_CAPTURE_ATTEMPTS {
                        error!(error = %e, "capture failed, giving up");
                        self.emit(WatchEvent::Error {
                            message: e.to_string(),
                        });
                        self.transition(WatchState::Failed);
                        return;
                    }
                    warn!(error = %e, attempt = failures, "capture failed, will retry");
                    self.emit(WatchEvent::CaptureRetry {
                        attempt: failures,
                        message: e.to_string(),
                    });
                    // grow the wait with each consecutive failure
                    if !self.sleep_cancellable(self.config.poll_interval * failures) {
                        break;
                    }
                    continue;
                }
            }

            if !self.sleep_cancellable(self.config.poll_interval) {
                break;
            }
        }

        self.transition(WatchState::Stopped);
        info!("watch session stopped");
    }

    /// One sample + match + optional alert.
    fn tick(&self) -> Result<(), CaptureError> {
        match &self.config.target {
            WatchTarget::Region(region) => {
                let grid = self.sampler.capture(region)?;
                match scan_grid(&grid, &self.config.colors) {
                    Some((dx, dy, color)) => self.report(
                        Point {
                            x: region.x + dx as i32,
                            y: region.y + dy as i32,
                        },
                        color,
                    ),
                    None => debug!("no match this tick"),
                }
            }
            WatchTarget::Points(points) => {
                // every matching point alerts independently, no early stop
                for point in points {
                    let color = self.sampler.sample_at(*point)?;
                    if matches_any(color, &self.config.colors) {
                        self.report(*point, color);
                    }
                }
            }
        }
        Ok(())
    }

    fn report(&self, location: Point, color: Color) {
        let at = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let detection = Detection {
            location,
            color,
            at,
        };
        info!(color = %detection.color, x = location.x, y = location.y, "match found");
        self.emit(WatchEvent::MatchFound(detection.clone()));
        self.sink.notify(&detection);
    }

    /// Sleep `duration`, waking early on a stop request. Returns false if
    /// the session should end.
    fn sleep_cancellable(&self, duration: Duration) -> bool {
        let total_ms = duration.as_millis() as u64;
        let mut waited = 0u64;
        while waited < total_ms {
            if self.should_stop() {
                return false;
            }
            let chunk = (total_ms - waited).min(SLEEP_CHUNK_MS);
            thread::sleep(Duration::from_millis(chunk));
            waited += chunk;
        }
        !self.should_stop()
    }

    fn should_stop(&self) -> bool {
        match self.cmd_rx.try_recv() {
            Ok(WatchCommand::Stop) => true,
            Err(TryRecvError::Empty) => false,
            // watcher dropped mid-session: treat as a stop request
            Err(TryRecvError::Disconnected) => true,
        }
    }

    fn transition(&self, new: WatchState) {
        let old = {
            let mut guard = self.state.lock().unwrap();
            let old = *guard;
            if old == new {
                return;
            }
            *guard = new;
            old
        };
        debug!(?old, ?new, "state transition");
        self.emit(WatchEvent::StateChanged { old, new });
    }

    fn emit(&self, event: WatchEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("event channel full or closed, dropping event");
        }
    }
}

/// Scan a captured grid for the first matching pixel, x outer / y inner.
/// Returns grid-relative coordinates and the matched color.
fn scan_grid(grid: &PixelGrid, specs: &[ColorSpec]) -> Option<(u32, u32, Color)> {
    for x in 0..grid.width() {
        for y in 0..grid.height() {
            let Some(color) = grid.get(x, y) else {
                continue;
            };
            if matches_any(color, specs) {
                return Some((x, y, color));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColorSpec, WatchConfig};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct GridSampler {
        width: u32,
        height: u32,
        pixels: Vec<Color>,
        captures: AtomicUsize,
    }

    impl GridSampler {
        fn new(width: u32, height: u32, pixels: Vec<Color>) -> Arc<Self> {
            Arc::new(Self {
                width,
                height,
                pixels,
                captures: AtomicUsize::new(0),
            })
        }
    }

    impl ScreenSampler for GridSampler {
        fn capture(&self, _region: &Region) -> Result<PixelGrid, CaptureError> {
            self.captures.fetch_add(1, Ordering::SeqCst);
            Ok(PixelGrid::new(self.width, self.height, self.pixels.clone()))
        }

        fn sample_at(&self, _point: Point) -> Result<Color, CaptureError> {
            Ok(Color::default())
        }
    }

    struct MapSampler {
        colors: HashMap<(i32, i32), Color>,
        samples: AtomicUsize,
    }

    impl ScreenSampler for MapSampler {
        fn capture(&self, _region: &Region) -> Result<PixelGrid, CaptureError> {
            Err(CaptureError("region capture unavailable".into()))
        }

        fn sample_at(&self, point: Point) -> Result<Color, CaptureError> {
            self.samples.fetch_add(1, Ordering::SeqCst);
            self.colors
                .get(&(point.x, point.y))
                .copied()
                .ok_or_else(|| CaptureError("off screen".into()))
        }
    }

    struct FailingSampler {
        attempts: AtomicUsize,
    }

    impl ScreenSampler for FailingSampler {
        fn capture(&self, _region: &Region) -> Result<PixelGrid, CaptureError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(CaptureError("boom".into()))
        }

        fn sample_at(&self, _point: Point) -> Result<Color, CaptureError> {
            Err(CaptureError("boom".into()))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        detections: StdMutex<Vec<Detection>>,
    }

    impl AlertSink for RecordingSink {
        fn notify(&self, detection: &Detection) {
            self.detections.lock().unwrap().push(detection.clone());
        }
    }

    fn wait_for(what: &str, cond: impl Fn() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("timed out waiting for {}", what);
    }

    fn white() -> Color {
        Color::new(0xFF, 0xFF, 0xFF)
    }

    #[test]
    fn region_match_raises_one_alert_per_tick() {
        // row-major 2x2: (1,0) holds the only matching pixel
        let sampler = GridSampler::new(
            2,
            2,
            vec![
                white(),
                Color::new(0xE1, 0xB0, 0x00),
                Color::default(),
                Color::default(),
            ],
        );
        let sink = Arc::new(RecordingSink::default());
        let mut watcher = Watcher::new(sampler.clone(), sink.clone());

        let region = Region {
            x: 0,
            y: 0,
            width: 2,
            height: 2,
        };
        let config = WatchConfig::for_region(region, &[ColorSpec::parse("#E1B").unwrap()])
            .with_interval(Duration::from_secs(60));
        watcher.start(config).unwrap();

        wait_for("first detection", || {
            !sink.detections.lock().unwrap().is_empty()
        });
        watcher.stop();
        assert_eq!(watcher.wait(), WatchState::Stopped);

        let detections = sink.detections.lock().unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].color.to_hex(), "#E1B000");
        assert_eq!(detections[0].location, Point { x: 1, y: 0 });
        assert_eq!(sampler.captures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn region_offset_is_added_to_detection_location() {
        let sampler = GridSampler::new(1, 1, vec![Color::new(0xE1, 0xB0, 0x00)]);
        let sink = Arc::new(RecordingSink::default());
        let mut watcher = Watcher::new(sampler, sink.clone());

        let region = Region {
            x: 300,
            y: 400,
            width: 1,
            height: 1,
        };
        let config = WatchConfig::for_region(region, &[])
            .with_interval(Duration::from_secs(60));
        watcher.start(config).unwrap();

        wait_for("detection", || !sink.detections.lock().unwrap().is_empty());
        watcher.stop();
        watcher.wait();

        let detections = sink.detections.lock().unwrap();
        assert_eq!(detections[0].location, Point { x: 300, y: 400 });
    }

    #[test]
    fn each_matching_point_alerts_independently() {
        let sampler = Arc::new(MapSampler {
            colors: HashMap::from([
                ((10, 10), Color::new(0x12, 0x34, 0x56)),
                ((20, 20), Color::new(0xAB, 0xCD, 0xEF)),
            ]),
            samples: AtomicUsize::new(0),
        });
        let sink = Arc::new(RecordingSink::default());
        let mut watcher = Watcher::new(sampler.clone(), sink.clone());

        let config = WatchConfig::for_points(
            vec![Point { x: 10, y: 10 }, Point { x: 20, y: 20 }],
            ColorSpec::parse("#123456").unwrap(),
        )
        .with_interval(Duration::from_secs(60));
        watcher.start(config).unwrap();

        // the whole tick runs before the loop sleeps: both points get
        // sampled even though only the first one matches
        wait_for("both points sampled", || {
            sampler.samples.load(Ordering::SeqCst) >= 2
        });
        wait_for("detection", || !sink.detections.lock().unwrap().is_empty());
        watcher.stop();
        assert_eq!(watcher.wait(), WatchState::Stopped);

        let detections = sink.detections.lock().unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].location, Point { x: 10, y: 10 });
    }

    #[test]
    fn empty_point_list_is_rejected_before_any_sampling() {
        let sampler = Arc::new(MapSampler {
            colors: HashMap::new(),
            samples: AtomicUsize::new(0),
        });
        let sink = Arc::new(RecordingSink::default());
        let mut watcher = Watcher::new(sampler.clone(), sink);

        let config =
            WatchConfig::for_points(Vec::new(), ColorSpec::parse("#123456").unwrap());
        assert!(matches!(
            watcher.start(config),
            Err(StartError::NoCoordinates)
        ));
        assert_eq!(watcher.state(), WatchState::Idle);
        assert_eq!(sampler.samples.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stop_during_sleep_prevents_the_next_sample() {
        let sampler = GridSampler::new(1, 1, vec![Color::default()]);
        let sink = Arc::new(RecordingSink::default());
        let mut watcher = Watcher::new(sampler.clone(), sink);

        let region = Region {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        };
        let config = WatchConfig::for_region(region, &[]).with_interval(Duration::from_secs(60));
        watcher.start(config).unwrap();

        wait_for("first capture", || {
            sampler.captures.load(Ordering::SeqCst) >= 1
        });
        watcher.stop();
        assert_eq!(watcher.wait(), WatchState::Stopped);
        // the 60s interval was cut short and no second capture happened
        assert_eq!(sampler.captures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn capture_failure_is_fatal_after_bounded_retries() {
        let sampler = Arc::new(FailingSampler {
            attempts: AtomicUsize::new(0),
        });
        let sink = Arc::new(RecordingSink::default());
        let mut watcher = Watcher::new(sampler.clone(), sink);

        let region = Region {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        };
        let config = WatchConfig::for_region(region, &[]).with_interval(Duration::from_millis(10));
        watcher.start(config).unwrap();

        wait_for("failed state", || watcher.state() == WatchState::Failed);
        assert_eq!(watcher.wait(), WatchState::Failed);
        assert_eq!(
            sampler.attempts.load(Ordering::SeqCst),
            MAX_CAPTURE_ATTEMPTS as usize
        );

        let mut saw_error = false;
        while let Some(event) = watcher.try_recv() {
            if matches!(event, WatchEvent::Error { .. }) {
                saw_error = true;
            }
        }
        assert!(saw_error, "fatal capture error must be observable");
    }

    #[test]
    fn second_start_while_running_is_rejected() {
        let sampler = GridSampler::new(1, 1, vec![Color::default()]);
        let sink = Arc::new(RecordingSink::default());
        let mut watcher = Watcher::new(sampler.clone(), sink);

        let region = Region {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        };
        let config = WatchConfig::for_region(region, &[]).with_interval(Duration::from_secs(60));
        watcher.start(config.clone()).unwrap();
        wait_for("running state", || watcher.state() == WatchState::Running);

        assert!(matches!(
            watcher.start(config.clone()),
            Err(StartError::AlreadyRunning)
        ));

        watcher.stop();
        assert_eq!(watcher.wait(), WatchState::Stopped);
        // a fresh session is allowed once the previous one ended
        watcher.start(config).unwrap();
        watcher.stop();
        assert_eq!(watcher.wait(), WatchState::Stopped);
    }

    #[test]
    fn scan_grid_is_column_major_first_match() {
        // (0,1) and (1,0) both match; x outer / y inner must pick (0,1)
        let grid = PixelGrid::new(
            2,
            2,
            vec![
                white(),
                Color::new(0xE1, 0xB0, 0x01),
                Color::new(0xE1, 0xB0, 0x02),
                white(),
            ],
        );
        let specs = vec![ColorSpec::parse("#E1B").unwrap()];
        let hit = scan_grid(&grid, &specs).unwrap();
        assert_eq!((hit.0, hit.1), (0, 1));
        assert_eq!(hit.2, Color::new(0xE1, 0xB0, 0x02));
    }
}
