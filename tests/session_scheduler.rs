use std::collections::BTreeMap;

use assert_matches::assert_matches;
use footwork::audio::{AudioCall, AudioMode, NullAudio, RecordingAudio};
use footwork::catalog::PositionId;
use footwork::config::Config;
use footwork::controller::{
    SessionController, SessionEvent, StartError, StopReason, Toggled, PRE_ROLL_MS,
};
use footwork::timer::TimerKind;

fn drawn(events: &[SessionEvent]) -> Vec<PositionId> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::PositionDrawn { position, .. } => Some(*position),
            _ => None,
        })
        .collect()
}

fn running(cfg: Config, seed: u64) -> SessionController<RecordingAudio> {
    let mut c = SessionController::seeded(&cfg, RecordingAudio::default(), seed);
    c.start().unwrap();
    c
}

#[test]
fn draws_stay_balanced_and_never_repeat() {
    for seed in 0..20 {
        let mut c = running(
            Config {
                cadence_secs: 1,
                time_limit_secs: 0,
                ..Config::default()
            },
            seed,
        );
        let allowed = c.catalog().allowed("full-court").to_vec();
        let mut previous = None;
        for step in 0..80u64 {
            c.advance_to(PRE_ROLL_MS + step * 1000);
            let picks = drawn(&c.drain_events());
            assert_eq!(picks.len(), 1, "seed {seed} step {step}");
            assert_ne!(Some(picks[0]), previous, "seed {seed} repeated");
            previous = Some(picks[0]);
            assert!(c.session().draw_state.spread(&allowed) <= 1, "seed {seed}");
        }
    }
}

#[test]
fn single_position_mode_keeps_drawing_it() {
    let mut custom_modes = BTreeMap::new();
    custom_modes.insert("solo".to_string(), vec![4]);
    let mut c = running(
        Config {
            mode: "solo".into(),
            cadence_secs: 1,
            time_limit_secs: 0,
            custom_modes,
            ..Config::default()
        },
        3,
    );
    c.advance_to(PRE_ROLL_MS + 5000);
    let picks = drawn(&c.drain_events());
    assert_eq!(picks.len(), 6);
    assert!(picks.iter().all(|p| p.get() == 4));
    assert_eq!(c.session().score, 6);
}

#[test]
fn two_position_mode_alternates() {
    let mut c = running(
        Config {
            mode: "random-1-5".into(),
            cadence_secs: 1,
            time_limit_secs: 0,
            ..Config::default()
        },
        11,
    );
    c.advance_to(PRE_ROLL_MS + 9000);
    let picks = drawn(&c.drain_events());
    assert_eq!(picks.len(), 10);
    assert!(picks.windows(2).all(|w| w[0] != w[1]));
}

#[test]
fn stop_is_idempotent() {
    let mut c = running(Config::default(), 1);
    c.advance_to(PRE_ROLL_MS);
    let first = c.stop().unwrap();
    assert_eq!(first.reason, StopReason::User);
    assert_eq!(first.score, 1);
    assert!(c.stop().is_none());

    let stops = c
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::Stopped(_)))
        .count();
    assert_eq!(stops, 1);
    assert_eq!(c.pending_timers(), 0);
    assert_eq!(c.session().score, 1);
    assert!(c.session().active_position.is_none());
}

#[test]
fn rejected_start_leaves_state_unchanged() {
    let mut c = running(Config::default(), 2);
    c.advance_to(PRE_ROLL_MS + 3000);
    let before = c.session().clone();
    let timers = c.pending_timers();

    assert_eq!(c.start(), Err(StartError::AlreadyRunning));
    assert_eq!(c.session(), &before);
    assert_eq!(c.pending_timers(), timers);
}

#[test]
fn cadence_is_honoured_in_virtual_time() {
    let mut c = running(
        Config {
            cadence_secs: 2,
            audio_mode: AudioMode::Tone,
            ..Config::default()
        },
        5,
    );
    let mut draw_times = Vec::new();
    for now in (0..=11_000u64).step_by(100) {
        c.advance_to(now);
        if !drawn(&c.drain_events()).is_empty() {
            draw_times.push(now);
        }
    }
    assert_eq!(draw_times, vec![1000, 3000, 5000, 7000, 9000, 11000]);
    assert_eq!(c.audio().count(AudioCall::Tone), 6);
}

#[test]
fn shortening_the_limit_clamps_remaining_time() {
    let mut c = running(Config::default(), 8);
    c.advance_to(180_000);
    assert_eq!(c.session().time_remaining_secs, 120);
    assert_eq!(c.change_time_limit(60), 60);
    assert_eq!(c.session().time_remaining_secs, 60);
    assert!(c.is_running());
}

#[test]
fn lengthening_the_limit_keeps_remaining_time() {
    let mut c = running(Config::default(), 8);
    c.advance_to(180_000);
    assert_eq!(c.change_time_limit(600), 600);
    assert_eq!(c.session().time_remaining_secs, 120);
    assert_eq!(c.session().time_limit_secs, 600);
}

#[test]
fn countdown_expiry_ends_the_session() {
    let mut c = running(
        Config {
            time_limit_secs: 30,
            ..Config::default()
        },
        4,
    );
    c.advance_to(60_000);
    assert!(!c.is_running());
    let summaries: Vec<_> = c
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::Stopped(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].reason, StopReason::TimeExpired);
    assert_eq!(c.pending_timers(), 0);
}

#[test]
fn hard_reset_clears_scores() {
    let mut c = running(
        Config {
            total_score: 35,
            ..Config::default()
        },
        9,
    );
    c.advance_to(19_000);
    assert_eq!(c.session().score, 7);
    assert_eq!(c.session().total_score, 42);

    c.hard_reset();
    assert_eq!(c.session().score, 0);
    assert_eq!(c.session().total_score, 0);
    assert!(!c.is_running());
    assert_eq!(c.pending_timers(), 0);
    assert_eq!(c.config(&Config::default()).total_score, 0);
}

#[test]
fn watchdog_recovers_a_lost_pre_roll() {
    let mut c = running(Config::default(), 6);
    assert!(c.lose_timer(TimerKind::PreRoll));

    c.advance_to(700);
    let events = c.drain_events();
    assert_eq!(drawn(&events).len(), 1);
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::WatchdogRecovered { .. })));
    assert!(c.has_timer(TimerKind::Cadence));

    // the lost pre-roll never comes back to draw a second time
    c.advance_to(1500);
    assert!(drawn(&c.drain_events()).is_empty());
    assert_eq!(c.session().score, 1);
}

#[test]
fn stale_timers_from_an_old_session_do_nothing() {
    let mut c = SessionController::seeded(&Config::default(), NullAudio, 10);
    c.start().unwrap();
    c.stop();
    c.advance_to(500);
    let second = c.start().unwrap();
    assert_eq!(second, 2);

    // the first session's pre-roll would have fired at 1000
    c.advance_to(1000);
    assert_eq!(c.session().score, 0);
    c.advance_to(1500);
    assert_eq!(c.session().score, 1);
}

#[test]
fn toggle_reports_what_it_did() {
    let mut c = SessionController::seeded(&Config::default(), NullAudio, 12);
    assert_matches!(c.toggle(), Ok(Toggled::Started(1)));
    c.advance_to(PRE_ROLL_MS);
    assert_matches!(
        c.toggle(),
        Ok(Toggled::Stopped(Some(summary))) if summary.score == 1
    );
    // a mode whose positions were all invalid cannot start
    let mut custom_modes = BTreeMap::new();
    custom_modes.insert("empty".to_string(), vec![9]);
    let mut c = SessionController::seeded(
        &Config {
            mode: "empty".into(),
            custom_modes,
            ..Config::default()
        },
        NullAudio,
        12,
    );
    assert_matches!(c.toggle(), Err(StartError::EmptyMode(name)) if name == "empty");
    assert!(!c.is_running());
}
