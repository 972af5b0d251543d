use crate::audio::AudioMode;
use crate::catalog::PositionId;
use crate::config::Config;
use crate::draw::DrawState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum_macros::Display)]
pub enum SessionPhase {
    #[default]
    Idle,
    Starting,
    Running,
}

/// Mutable state of the trainer. Only the session controller writes to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub phase: SessionPhase,
    /// Bumped once per successful start; timer callbacks carry the value they
    /// were scheduled under
    pub schedule_id: u64,
    pub active_position: Option<PositionId>,
    pub last_position: Option<PositionId>,
    pub cadence_secs: u32,
    /// 0 means unlimited
    pub time_limit_secs: u32,
    pub time_remaining_secs: u32,
    pub mode: String,
    pub audio_mode: AudioMode,
    pub draw_state: DrawState,
    pub score: u64,
    pub total_score: u64,
    /// Changes on every publish so the renderer restarts its animation even
    /// when the same position comes up again
    pub redraw_counter: u64,
    pub controls_locked: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Session {
    /// Hydrate durable fields; a session never comes back as running
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            phase: SessionPhase::Idle,
            schedule_id: 0,
            active_position: None,
            last_position: None,
            cadence_secs: cfg.cadence_secs,
            time_limit_secs: cfg.time_limit_secs,
            time_remaining_secs: cfg.time_limit_secs,
            mode: cfg.mode.clone(),
            audio_mode: cfg.audio_mode,
            draw_state: DrawState::default(),
            score: 0,
            total_score: cfg.total_score,
            redraw_counter: 0,
            controls_locked: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == SessionPhase::Running
    }

    pub fn is_idle(&self) -> bool {
        self.phase == SessionPhase::Idle
    }

    pub fn has_time_limit(&self) -> bool {
        self.time_limit_secs > 0
    }

    /// Durable view written back to the config store
    pub fn apply_to(&self, cfg: &mut Config) {
        cfg.cadence_secs = self.cadence_secs;
        cfg.time_limit_secs = self.time_limit_secs;
        cfg.mode = self.mode.clone();
        cfg.audio_mode = self.audio_mode;
        cfg.total_score = self.total_score;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            schedule_id: self.schedule_id,
            active_position: self.active_position,
            redraw_counter: self.redraw_counter,
            cadence_secs: self.cadence_secs,
            time_limit_secs: self.time_limit_secs,
            time_remaining_secs: self.time_remaining_secs,
            mode: self.mode.clone(),
            audio_mode: self.audio_mode,
            score: self.score,
            total_score: self.total_score,
            controls_locked: self.controls_locked,
        }
    }
}

/// Read-only copy handed to renderers
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub schedule_id: u64,
    pub active_position: Option<PositionId>,
    pub redraw_counter: u64,
    pub cadence_secs: u32,
    pub time_limit_secs: u32,
    pub time_remaining_secs: u32,
    pub mode: String,
    pub audio_mode: AudioMode,
    pub score: u64,
    pub total_score: u64,
    pub controls_locked: bool,
}

impl SessionSnapshot {
    pub fn is_running(&self) -> bool {
        self.phase == SessionPhase::Running
    }

    /// Remaining time as m:ss, None when there is no limit
    pub fn countdown_label(&self) -> Option<String> {
        (self.time_limit_secs > 0).then(|| format_clock(self.time_remaining_secs))
    }
}

pub fn format_clock(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_session_is_idle() {
        let session = Session::default();
        assert_eq!(session.phase, SessionPhase::Idle);
        assert!(session.is_idle());
        assert!(!session.is_running());
        assert_eq!(session.time_remaining_secs, session.time_limit_secs);
        assert_eq!(session.score, 0);
        assert!(session.active_position.is_none());
    }

    #[test]
    fn hydrates_durable_fields() {
        let cfg = Config {
            cadence_secs: 6,
            time_limit_secs: 120,
            mode: "corners".into(),
            audio_mode: AudioMode::Speech,
            total_score: 99,
            ..Config::default()
        };
        let session = Session::from_config(&cfg);
        assert_eq!(session.cadence_secs, 6);
        assert_eq!(session.time_remaining_secs, 120);
        assert_eq!(session.mode, "corners");
        assert_eq!(session.audio_mode, AudioMode::Speech);
        assert_eq!(session.total_score, 99);
        assert!(session.is_idle());
    }

    #[test]
    fn apply_to_writes_durable_fields_only() {
        let mut session = Session::default();
        session.cadence_secs = 8;
        session.total_score = 12;
        session.phase = SessionPhase::Running;
        let mut cfg = Config::default();
        session.apply_to(&mut cfg);
        assert_eq!(cfg.cadence_secs, 8);
        assert_eq!(cfg.total_score, 12);
    }

    #[test]
    fn countdown_label_formats_minutes() {
        let mut session = Session::default();
        session.time_limit_secs = 300;
        session.time_remaining_secs = 65;
        assert_eq!(session.snapshot().countdown_label().as_deref(), Some("1:05"));
        session.time_limit_secs = 0;
        assert!(session.snapshot().countdown_label().is_none());
        assert_eq!(format_clock(600), "10:00");
    }
}
