//! Session controller: the only writer of [`Session`].
//!
//! Scheduling is expressed with a [`TimerQueue`] on a virtual clock the host
//! advances with [`SessionController::advance_to`]. Each timer the controller
//! owns lives in one named slot and is tagged with the schedule id it was
//! created under, so callbacks that outlive their session are dropped.

use crate::audio::{AudioMode, AudioPlayer};
use crate::catalog::{Catalog, PositionId};
use crate::config::{Config, MAX_CADENCE_SECS, MAX_TIME_LIMIT_SECS, MIN_CADENCE_SECS};
use crate::draw::{DrawState, PositionSelector};
use crate::session::{Session, SessionPhase, SessionSnapshot};
use crate::timer::{Fired, TimerHandle, TimerKind, TimerQueue};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Warm-up before the first draw of a session
pub const PRE_ROLL_MS: u64 = 1000;
/// Grace window after start before the watchdog checks for a live draw timer
pub const START_WATCHDOG_MS: u64 = 700;
/// Grace window after a reconfiguration that rebuilt the cadence timer
pub const RECONFIGURE_WATCHDOG_MS: u64 = 300;
pub const COUNTDOWN_PERIOD_MS: u64 = 1000;
/// Lower bound on the cadence period while speech is on, so one utterance
/// finishes before the next starts
pub const SPEECH_SETTLE_MS: u64 = 1200;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("a session is already running")]
    AlreadyRunning,
    #[error("a session is already starting")]
    AlreadyStarting,
    #[error("mode '{0}' has no positions")]
    EmptyMode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModeError {
    #[error("unknown mode '{0}'")]
    UnknownMode(String),
    #[error("mode '{0}' has no positions")]
    EmptyMode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum StopReason {
    User,
    TimeExpired,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub schedule_id: u64,
    pub mode: String,
    pub cadence_secs: u32,
    pub time_limit_secs: u32,
    pub score: u64,
    pub total_score: u64,
    pub reason: StopReason,
}

/// Outbound notifications for the host (renderer, status line, history)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started {
        schedule_id: u64,
        mode: String,
    },
    PositionDrawn {
        schedule_id: u64,
        position: PositionId,
        redraw_counter: u64,
        score: u64,
    },
    ManualPosition {
        position: PositionId,
        redraw_counter: u64,
    },
    WatchdogRecovered {
        schedule_id: u64,
    },
    Stopped(SessionSummary),
    /// Score and clock cleared, settings kept
    ScoreReset,
    /// Settings and totals back to defaults
    Reset,
}

/// Result of the start/stop toggle key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggled {
    Started(u64),
    Stopped(Option<SessionSummary>),
}

#[derive(Debug, Default)]
struct TimerSlots {
    pre_roll: Option<TimerHandle>,
    cadence: Option<TimerHandle>,
    countdown: Option<TimerHandle>,
    watchdog: Option<TimerHandle>,
}

impl TimerSlots {
    fn slot_mut(&mut self, kind: TimerKind) -> &mut Option<TimerHandle> {
        match kind {
            TimerKind::PreRoll => &mut self.pre_roll,
            TimerKind::Cadence => &mut self.cadence,
            TimerKind::Countdown => &mut self.countdown,
            TimerKind::Watchdog => &mut self.watchdog,
        }
    }

    fn get(&self, kind: TimerKind) -> Option<TimerHandle> {
        match kind {
            TimerKind::PreRoll => self.pre_roll,
            TimerKind::Cadence => self.cadence,
            TimerKind::Countdown => self.countdown,
            TimerKind::Watchdog => self.watchdog,
        }
    }

    fn holds(&self, handle: TimerHandle) -> bool {
        [self.pre_roll, self.cadence, self.countdown, self.watchdog].contains(&Some(handle))
    }
}

pub struct SessionController<A: AudioPlayer> {
    session: Session,
    catalog: Catalog,
    timers: TimerQueue,
    slots: TimerSlots,
    selector: Box<dyn PositionSelector>,
    rng: StdRng,
    audio: A,
    now_ms: u64,
    events: Vec<SessionEvent>,
}

impl<A: AudioPlayer> SessionController<A> {
    pub fn new(cfg: &Config, audio: A) -> Self {
        Self::with_rng(cfg, audio, StdRng::from_entropy())
    }

    pub fn with_rng(cfg: &Config, audio: A, rng: StdRng) -> Self {
        let cfg = cfg.clone().sanitized();
        Self {
            session: Session::from_config(&cfg),
            catalog: Catalog::with_custom_modes(&cfg.custom_modes),
            timers: TimerQueue::new(),
            slots: TimerSlots::default(),
            selector: cfg.draw_policy.selector(cfg.pair_rule),
            rng,
            audio,
            now_ms: 0,
            events: Vec::new(),
        }
    }

    pub fn seeded(cfg: &Config, audio: A, seed: u64) -> Self {
        Self::with_rng(cfg, audio, StdRng::seed_from_u64(seed))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn is_running(&self) -> bool {
        self.session.is_running()
    }

    /// Durable fields merged into `base`
    pub fn config(&self, base: &Config) -> Config {
        let mut cfg = base.clone();
        self.session.apply_to(&mut cfg);
        cfg
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Whether the slot for `kind` holds a timer that is still queued
    pub fn has_timer(&self, kind: TimerKind) -> bool {
        self.slots
            .get(kind)
            .is_some_and(|h| self.timers.is_pending(h))
    }

    pub fn timer_period_ms(&self, kind: TimerKind) -> Option<u64> {
        self.slots
            .get(kind)
            .and_then(|h| self.timers.period_of(h))
    }

    /// Number of timers queued, whoever owns them
    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// Make the host lose the timer in `kind`'s slot without the controller
    /// noticing. Used to exercise watchdog recovery.
    pub fn lose_timer(&mut self, kind: TimerKind) -> bool {
        match self.slots.get(kind) {
            Some(handle) => self.timers.drop_timer(handle),
            None => false,
        }
    }

    /// Move the clock forward, running every timer callback that falls due.
    /// Callbacks run one at a time at their own due time, so a long jump
    /// replays every period in between.
    pub fn advance_to(&mut self, now_ms: u64) {
        while let Some(due) = self.timers.next_due().filter(|&due| due <= now_ms) {
            let Some(fired) = self.timers.pop_due(due) else {
                break;
            };
            self.now_ms = self.now_ms.max(fired.due_ms);
            self.on_timer(fired);
        }
        self.now_ms = self.now_ms.max(now_ms);
    }

    pub fn advance_by(&mut self, delta_ms: u64) {
        self.advance_to(self.now_ms + delta_ms);
    }

    pub fn start(&mut self) -> Result<u64, StartError> {
        match self.session.phase {
            SessionPhase::Running => return Err(StartError::AlreadyRunning),
            SessionPhase::Starting => return Err(StartError::AlreadyStarting),
            SessionPhase::Idle => {}
        }
        if self.catalog.allowed(&self.session.mode).is_empty() {
            return Err(StartError::EmptyMode(self.session.mode.clone()));
        }

        self.session.phase = SessionPhase::Starting;
        self.cancel_all_timers();
        self.session.last_position = None;
        self.session.active_position = None;
        self.session.draw_state = DrawState::default();
        self.session.time_remaining_secs = self.session.time_limit_secs;
        self.session.score = 0;
        self.session.schedule_id += 1;
        let schedule_id = self.session.schedule_id;

        if !self.audio.prime() {
            warn!(schedule_id, "audio output not ready, continuing without it");
        }
        self.session.phase = SessionPhase::Running;

        self.slots.pre_roll = Some(self.timers.schedule_once(
            TimerKind::PreRoll,
            schedule_id,
            self.now_ms,
            PRE_ROLL_MS,
        ));
        if self.session.has_time_limit() {
            self.install_countdown();
        }
        self.arm_watchdog(START_WATCHDOG_MS);

        info!(
            schedule_id,
            mode = %self.session.mode,
            cadence_secs = self.session.cadence_secs,
            time_limit_secs = self.session.time_limit_secs,
            "session started"
        );
        self.events.push(SessionEvent::Started {
            schedule_id,
            mode: self.session.mode.clone(),
        });
        Ok(schedule_id)
    }

    /// Stop the running session. Calling it again is a no-op returning None.
    pub fn stop(&mut self) -> Option<SessionSummary> {
        self.finish(StopReason::User)
    }

    pub fn toggle(&mut self) -> Result<Toggled, StartError> {
        if self.session.is_idle() {
            self.start().map(Toggled::Started)
        } else {
            Ok(Toggled::Stopped(self.stop()))
        }
    }

    /// Stop and clear the session score and clock. Settings and the running
    /// total stay; the discarded session is reported with `StopReason::Reset`.
    pub fn reset(&mut self) {
        if !self.session.is_idle() {
            self.finish(StopReason::Reset);
        }
        self.cancel_all_timers();
        self.audio.cancel_in_flight();
        self.session.score = 0;
        self.session.active_position = None;
        self.session.last_position = None;
        self.session.draw_state = DrawState::default();
        self.session.time_remaining_secs = self.session.time_limit_secs;

        info!(schedule_id = self.session.schedule_id, "score reset");
        self.events.push(SessionEvent::ScoreReset);
    }

    /// Back to factory settings from any state; clears both scores
    pub fn hard_reset(&mut self) {
        if !self.session.is_idle() {
            self.finish(StopReason::Reset);
        }
        self.cancel_all_timers();
        self.audio.cancel_in_flight();

        let defaults = Config {
            audio_mode: self.session.audio_mode,
            ..Config::default()
        };
        let schedule_id = self.session.schedule_id;
        self.session = Session::from_config(&defaults);
        // keep ids monotonic so nothing scheduled before the reset can match later
        self.session.schedule_id = schedule_id;

        info!(schedule_id, "hard reset");
        self.events.push(SessionEvent::Reset);
    }

    /// Returns the cadence actually applied after clamping
    pub fn change_cadence(&mut self, secs: u32) -> u32 {
        let secs = secs.clamp(MIN_CADENCE_SECS, MAX_CADENCE_SECS);
        self.session.cadence_secs = secs;
        if self.session.is_running() && !self.session.controls_locked && self.slots.cadence.is_some()
        {
            self.install_cadence();
            debug!(
                schedule_id = self.session.schedule_id,
                period_ms = self.cadence_period_ms(),
                "cadence rebuilt"
            );
        }
        secs
    }

    pub fn change_time_limit(&mut self, secs: u32) -> u32 {
        let secs = secs.min(MAX_TIME_LIMIT_SECS);
        let had_countdown = self.slots.countdown.is_some();
        self.session.time_limit_secs = secs;

        if !self.session.is_running() {
            self.session.time_remaining_secs = secs;
        } else if secs == 0 {
            // min(remaining, 0): the limit is lifted for the rest of the session
            self.cancel_slot(TimerKind::Countdown);
            self.session.time_remaining_secs = 0;
        } else if had_countdown {
            self.session.time_remaining_secs = self.session.time_remaining_secs.min(secs);
        } else {
            // an unlimited session has no countdown to shorten; start one
            self.session.time_remaining_secs = secs;
            self.install_countdown();
        }
        secs
    }

    pub fn change_mode(&mut self, name: &str) -> Result<(), ModeError> {
        if !self.catalog.contains_mode(name) {
            return Err(ModeError::UnknownMode(name.to_string()));
        }
        // an idle session may sit on an empty mode; start() rejects it
        if self.session.is_running() && self.catalog.allowed(name).is_empty() {
            return Err(ModeError::EmptyMode(name.to_string()));
        }
        self.session.mode = name.to_string();
        self.session.last_position = None;
        self.session.draw_state = DrawState::default();
        let allowed = self.catalog.allowed(name);
        if let Some(active) = self.session.active_position {
            if !allowed.contains(&active) {
                self.session.active_position = None;
            }
        }
        debug!(schedule_id = self.session.schedule_id, mode = name, "mode changed");
        Ok(())
    }

    pub fn next_mode(&mut self) -> Result<(), ModeError> {
        let name = self.cycle_mode(Catalog::next_mode_name);
        self.change_mode(&name)
    }

    pub fn prev_mode(&mut self) -> Result<(), ModeError> {
        let name = self.cycle_mode(Catalog::prev_mode_name);
        self.change_mode(&name)
    }

    /// Neighbouring mode name; while running, empty modes are stepped over
    fn cycle_mode(&self, step: for<'a> fn(&'a Catalog, &'a str) -> &'a str) -> String {
        let mut name = step(&self.catalog, &self.session.mode);
        if self.session.is_running() {
            for _ in 0..self.catalog.modes().len() {
                if !self.catalog.allowed(name).is_empty() {
                    break;
                }
                name = step(&self.catalog, name);
            }
        }
        name.to_string()
    }

    pub fn toggle_audio_mode(&mut self) -> AudioMode {
        self.session.audio_mode = self.session.audio_mode.toggled();
        self.audio.cancel_in_flight();
        if !self.audio.prime() {
            debug!(schedule_id = self.session.schedule_id, "audio not ready after toggle");
        }
        if self.session.is_running() {
            if self.slots.cadence.is_some() {
                self.install_cadence();
            }
            self.arm_watchdog(RECONFIGURE_WATCHDOG_MS);
        }
        self.session.audio_mode
    }

    /// Show a position directly (digit keys). Leaves the draw bookkeeping and
    /// the cadence alone.
    pub fn manual_trigger(&mut self, id: PositionId) {
        self.session.active_position = Some(id);
        self.session.redraw_counter += 1;
        self.announce(id);
        self.events.push(SessionEvent::ManualPosition {
            position: id,
            redraw_counter: self.session.redraw_counter,
        });
    }

    pub fn set_controls_locked(&mut self, locked: bool) {
        self.session.controls_locked = locked;
    }

    fn cadence_period_ms(&self) -> u64 {
        let settle = match self.session.audio_mode {
            AudioMode::Speech => SPEECH_SETTLE_MS,
            AudioMode::Tone => 0,
        };
        (u64::from(self.session.cadence_secs) * 1000).max(settle)
    }

    fn install_cadence(&mut self) {
        self.cancel_slot(TimerKind::Cadence);
        let period = self.cadence_period_ms();
        self.slots.cadence = Some(self.timers.schedule_repeating(
            TimerKind::Cadence,
            self.session.schedule_id,
            self.now_ms,
            period,
        ));
    }

    fn install_countdown(&mut self) {
        self.cancel_slot(TimerKind::Countdown);
        self.slots.countdown = Some(self.timers.schedule_repeating(
            TimerKind::Countdown,
            self.session.schedule_id,
            self.now_ms,
            COUNTDOWN_PERIOD_MS,
        ));
    }

    fn arm_watchdog(&mut self, grace_ms: u64) {
        self.cancel_slot(TimerKind::Watchdog);
        self.slots.watchdog = Some(self.timers.schedule_once(
            TimerKind::Watchdog,
            self.session.schedule_id,
            self.now_ms,
            grace_ms,
        ));
    }

    fn cancel_slot(&mut self, kind: TimerKind) {
        if let Some(handle) = self.slots.slot_mut(kind).take() {
            self.timers.cancel(handle);
        }
    }

    fn cancel_all_timers(&mut self) {
        for kind in [
            TimerKind::PreRoll,
            TimerKind::Cadence,
            TimerKind::Countdown,
            TimerKind::Watchdog,
        ] {
            self.cancel_slot(kind);
        }
        // anything left over belongs to no slot and can only be stale
        self.timers.clear();
    }

    fn finish(&mut self, reason: StopReason) -> Option<SessionSummary> {
        if self.session.is_idle() {
            debug!(schedule_id = self.session.schedule_id, "stop ignored, session idle");
            return None;
        }
        self.cancel_all_timers();
        self.audio.cancel_in_flight();
        self.session.phase = SessionPhase::Idle;
        self.session.active_position = None;
        self.session.last_position = None;
        self.session.time_remaining_secs = self.session.time_limit_secs;

        let summary = SessionSummary {
            schedule_id: self.session.schedule_id,
            mode: self.session.mode.clone(),
            cadence_secs: self.session.cadence_secs,
            time_limit_secs: self.session.time_limit_secs,
            score: self.session.score,
            total_score: self.session.total_score,
            reason,
        };
        info!(
            schedule_id = summary.schedule_id,
            score = summary.score,
            reason = %reason,
            "session stopped"
        );
        self.events.push(SessionEvent::Stopped(summary.clone()));
        Some(summary)
    }

    fn on_timer(&mut self, fired: Fired) {
        if fired.tag != self.session.schedule_id || !self.session.is_running() {
            debug!(
                kind = ?fired.kind,
                tag = fired.tag,
                schedule_id = self.session.schedule_id,
                "stale timer callback ignored"
            );
            if !self.slots.holds(fired.handle) {
                self.timers.cancel(fired.handle);
            }
            return;
        }
        if self.slots.get(fired.kind) != Some(fired.handle) {
            debug!(kind = ?fired.kind, "orphaned timer callback ignored");
            self.timers.cancel(fired.handle);
            return;
        }

        match fired.kind {
            TimerKind::PreRoll => self.on_pre_roll(),
            TimerKind::Cadence => self.on_cadence(),
            TimerKind::Countdown => self.on_countdown(),
            TimerKind::Watchdog => self.on_watchdog(),
        }
    }

    fn on_pre_roll(&mut self) {
        self.slots.pre_roll = None;
        if self.has_timer(TimerKind::Cadence) {
            debug!(schedule_id = self.session.schedule_id, "pre-roll after recovery, skipped");
            return;
        }
        self.draw_and_publish();
        self.install_cadence();
    }

    fn on_cadence(&mut self) {
        if self.slots.countdown.is_some() && self.session.time_remaining_secs == 0 {
            debug!(schedule_id = self.session.schedule_id, "cadence tick after expiry ignored");
            return;
        }
        self.draw_and_publish();
    }

    fn on_countdown(&mut self) {
        if self.session.time_remaining_secs == 0 {
            return;
        }
        self.session.time_remaining_secs -= 1;
        if self.session.time_remaining_secs == 0 {
            info!(schedule_id = self.session.schedule_id, "time expired");
            self.finish(StopReason::TimeExpired);
        }
    }

    fn on_watchdog(&mut self) {
        self.slots.watchdog = None;
        let schedule_id = self.session.schedule_id;
        if self.has_timer(TimerKind::PreRoll) || self.has_timer(TimerKind::Cadence) {
            debug!(schedule_id, "watchdog: scheduling healthy");
            return;
        }

        warn!(schedule_id, "watchdog: no live draw timer, recovering");
        self.slots.pre_roll = None;
        self.slots.cadence = None;
        if self.session.score == 0 {
            self.draw_and_publish();
        }
        self.install_cadence();
        self.events.push(SessionEvent::WatchdogRecovered { schedule_id });
    }

    fn draw_and_publish(&mut self) {
        let allowed = self.catalog.allowed(&self.session.mode);
        let picked = self.selector.select(
            allowed,
            self.session.last_position,
            &self.session.draw_state,
            &mut self.rng,
        );
        let (position, draw_state) = match picked {
            Ok(pick) => pick,
            Err(err) => {
                warn!(schedule_id = self.session.schedule_id, mode = %self.session.mode, %err, "draw skipped");
                return;
            }
        };

        self.session.draw_state = draw_state;
        self.session.last_position = Some(position);
        self.session.active_position = Some(position);
        self.session.score += 1;
        self.session.total_score += 1;
        self.session.redraw_counter += 1;
        self.announce(position);

        debug!(
            schedule_id = self.session.schedule_id,
            position = position.get(),
            at_ms = self.now_ms,
            "position drawn"
        );
        self.events.push(SessionEvent::PositionDrawn {
            schedule_id: self.session.schedule_id,
            position,
            redraw_counter: self.session.redraw_counter,
            score: self.session.score,
        });
    }

    fn announce(&mut self, id: PositionId) {
        self.audio.cancel_in_flight();
        match self.session.audio_mode {
            AudioMode::Speech => self.audio.announce(id),
            AudioMode::Tone => self.audio.play_fallback_tone(),
        }
    }
}
