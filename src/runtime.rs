use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

/// What the main loop reacts to
#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Anything that can hand the main loop input, waiting at most `timeout`
pub trait EventSource: Send + 'static {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Map a raw terminal event, dropping the ones the trainer ignores
/// (mouse, focus, paste and key releases).
fn translate(ev: CtEvent) -> Option<AppEvent> {
    match ev {
        CtEvent::Key(key) if key.kind != KeyEventKind::Release => Some(AppEvent::Key(key)),
        CtEvent::Resize(..) => Some(AppEvent::Resize),
        _ => None,
    }
}

/// Reads crossterm events on a background thread
pub struct CrosstermEventSource {
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            while let Ok(raw) = event::read() {
                let Some(ev) = translate(raw) else {
                    continue;
                };
                // receiver gone: the app is shutting down
                if tx.send(ev).is_err() {
                    return;
                }
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// How long the loop may sit idle before it redraws
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    every: Duration,
}

impl FixedTicker {
    pub fn new(every: Duration) -> Self {
        Self { every }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.every
    }
}

/// Channel-fed source for driving the loop without a terminal
pub struct TestEventSource {
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Milliseconds since the app started; drives the session controller's clock
pub trait Clock {
    fn now_ms(&self) -> u64;
}

#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// Pairs an event source with a tick rate. Each `step` yields exactly one
/// event.
pub struct Runner<E: EventSource, T: Ticker> {
    source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(source: E, ticker: T) -> Self {
        Self { source, ticker }
    }

    /// Next input, or Tick once the interval passes. A closed source also
    /// degrades to ticking so the clock keeps running.
    pub fn step(&self) -> AppEvent {
        self.source
            .recv_timeout(self.ticker.interval())
            .unwrap_or(AppEvent::Tick)
    }
}
