pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use footwork::{
    app_dirs::AppDirs,
    audio::{AudioMode, AudioPlayer, TerminalAudio},
    catalog::{Catalog, PositionId},
    config::{Config, ConfigStore, FileConfigStore, MemoryConfigStore, TIME_LIMIT_STEP_SECS},
    controller::{SessionController, SessionEvent, StopReason},
    draw::DrawPolicy,
    history::SessionHistory,
    logging,
    runtime::{AppEvent, Clock, CrosstermEventSource, FixedTicker, MonotonicClock, Runner},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    time::Duration,
};
use tracing::warn;

const TICK_RATE_MS: u64 = 50;
const STATUS_TTL_MS: u64 = 2500;
/// How long the active position stays highlighted after it is (re)published
pub const FLASH_MS: u64 = 400;

/// court footwork trainer: move to the highlighted position before the next one appears
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A court footwork trainer for the terminal. Positions light up at a fixed cadence, drawn fairly from the selected mode, with optional spoken or tone cues and a session timer."
)]
pub struct Cli {
    /// seconds between position changes (1-10)
    #[clap(short = 'c', long)]
    cadence: Option<u32>,

    /// session length in seconds, 0 for unlimited (max 600)
    #[clap(short = 't', long)]
    time_limit: Option<u32>,

    /// training mode, see --list-modes
    #[clap(short = 'm', long)]
    mode: Option<String>,

    /// announce positions with speech instead of a tone
    #[clap(long)]
    speech: bool,

    /// command used to speak position numbers (default: espeak, or say on macOS)
    #[clap(long)]
    speech_command: Option<String>,

    /// how positions are drawn
    #[clap(long, value_enum)]
    policy: Option<PolicyArg>,

    /// seed for a reproducible sequence of positions
    #[clap(long)]
    seed: Option<u64>,

    /// start the session right away
    #[clap(short = 's', long)]
    start: bool,

    /// print the available modes and exit
    #[clap(long)]
    list_modes: bool,

    /// do not write settings or session history
    #[clap(long)]
    no_save: bool,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum PolicyArg {
    LeastDrawn,
    Uniform,
}

impl From<PolicyArg> for DrawPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::LeastDrawn => DrawPolicy::LeastDrawn,
            PolicyArg::Uniform => DrawPolicy::Uniform,
        }
    }
}

impl Cli {
    /// Layer command line overrides on top of the stored configuration.
    /// The result drives this run only; it is never written back as a whole.
    fn apply(&self, mut cfg: Config) -> Config {
        if let Some(cadence) = self.cadence {
            cfg.cadence_secs = cadence;
        }
        if let Some(limit) = self.time_limit {
            cfg.time_limit_secs = limit;
        }
        if let Some(mode) = &self.mode {
            cfg.mode = mode.clone();
        }
        if self.speech {
            cfg.audio_mode = AudioMode::Speech;
        }
        if let Some(cmd) = &self.speech_command {
            cfg.speech_command = Some(cmd.clone());
        }
        if let Some(policy) = self.policy {
            cfg.draw_policy = policy.into();
        }
        cfg
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusLevel {
    Info,
    Warning,
}

/// Transient notification shown under the controls
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub text: String,
    pub level: StatusLevel,
    pub until_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App<A: AudioPlayer> {
    pub controller: SessionController<A>,
    pub status: Option<StatusMessage>,
    pub flash_started_ms: Option<u64>,
    pub best_score: Option<u64>,
    /// Settings as they are in the store, without command line overrides
    stored: Config,
    /// Session settings at the last sync; only fields that move away from
    /// this are written back
    seen: Config,
    store: Box<dyn ConfigStore>,
    history: Option<SessionHistory>,
    seen_redraw: u64,
}

impl<A: AudioPlayer> App<A> {
    /// `stored` is the configuration as loaded, before command line
    /// overrides were applied to build `controller`.
    pub fn new(
        stored: Config,
        controller: SessionController<A>,
        store: Box<dyn ConfigStore>,
        history: Option<SessionHistory>,
    ) -> Self {
        let seen = controller.config(&stored);
        let mut app = Self {
            controller,
            status: None,
            flash_started_ms: None,
            best_score: None,
            stored,
            seen,
            store,
            history,
            seen_redraw: 0,
        };
        app.refresh_best_score();
        app
    }

    fn refresh_best_score(&mut self) {
        let mode = &self.controller.session().mode;
        self.best_score = match &self.history {
            Some(history) => history.best_score(mode).unwrap_or_else(|err| {
                warn!(%err, "could not read session history");
                None
            }),
            None => None,
        };
    }

    pub fn catalog(&self) -> &Catalog {
        self.controller.catalog()
    }

    pub fn now_ms(&self) -> u64 {
        self.controller.now_ms()
    }

    /// Move the session clock to `now_ms`, running any due timers
    pub fn advance(&mut self, now_ms: u64) {
        self.controller.advance_to(now_ms);
        self.sync();
    }

    pub fn is_flashing(&self) -> bool {
        self.flash_started_ms
            .is_some_and(|t| self.now_ms().saturating_sub(t) < FLASH_MS)
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Flow {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }

        let snapshot = self.controller.snapshot();
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return Flow::Quit,
            KeyCode::Char(' ') => {
                if let Err(err) = self.controller.toggle() {
                    self.notify(StatusLevel::Warning, format!("Cannot start: {err}"));
                }
            }
            KeyCode::Char(c @ '1'..='8') => {
                if let Some(id) = PositionId::from_digit(c) {
                    self.controller.manual_trigger(id);
                }
            }
            KeyCode::Char('m') | KeyCode::Char('M') => {
                let changed = if key.code == KeyCode::Char('m') {
                    self.controller.next_mode()
                } else {
                    self.controller.prev_mode()
                };
                match changed {
                    Ok(()) => {
                        let label = self.mode_label();
                        self.notify(StatusLevel::Info, format!("Mode: {label}"));
                    }
                    Err(err) => self.notify(StatusLevel::Warning, err.to_string()),
                }
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let secs = self.controller.change_cadence(snapshot.cadence_secs + 1);
                self.notify(StatusLevel::Info, format!("Cadence: {secs}s"));
            }
            KeyCode::Char('-') => {
                let secs = self
                    .controller
                    .change_cadence(snapshot.cadence_secs.saturating_sub(1));
                self.notify(StatusLevel::Info, format!("Cadence: {secs}s"));
            }
            KeyCode::Char(']') => {
                let secs = self
                    .controller
                    .change_time_limit(snapshot.time_limit_secs + TIME_LIMIT_STEP_SECS);
                self.notify(StatusLevel::Info, format!("Time limit: {}", limit_label(secs)));
            }
            KeyCode::Char('[') => {
                let secs = self.controller.change_time_limit(
                    snapshot.time_limit_secs.saturating_sub(TIME_LIMIT_STEP_SECS),
                );
                self.notify(StatusLevel::Info, format!("Time limit: {}", limit_label(secs)));
            }
            KeyCode::Char('a') => {
                let mode = self.controller.toggle_audio_mode();
                self.notify(StatusLevel::Info, format!("Audio: {mode}"));
            }
            KeyCode::Char('l') => {
                let locked = !snapshot.controls_locked;
                self.controller.set_controls_locked(locked);
                let text = if locked {
                    "Controls locked"
                } else {
                    "Controls unlocked"
                };
                self.notify(StatusLevel::Info, text.to_string());
            }
            KeyCode::Char('r') => self.controller.reset(),
            KeyCode::Char('R') => self.controller.hard_reset(),
            _ => {}
        }
        self.sync();
        Flow::Continue
    }

    pub fn mode_label(&self) -> String {
        let name = &self.controller.session().mode;
        self.catalog()
            .mode(name)
            .map_or_else(|| name.clone(), |m| m.label.clone())
    }

    fn notify(&mut self, level: StatusLevel, text: String) {
        self.status = Some(StatusMessage {
            text,
            level,
            until_ms: self.now_ms() + STATUS_TTL_MS,
        });
    }

    /// React to controller events, persist settings and expire notifications
    fn sync(&mut self) {
        for event in self.controller.drain_events() {
            match event {
                SessionEvent::Started { .. } => {
                    let label = self.mode_label();
                    self.notify(StatusLevel::Info, format!("Training started · {label}"));
                }
                SessionEvent::Stopped(summary) => {
                    match summary.reason {
                        StopReason::User => self.notify(
                            StatusLevel::Info,
                            format!("Training stopped · Score: {}", summary.score),
                        ),
                        StopReason::TimeExpired => self.notify(
                            StatusLevel::Warning,
                            format!("Time's up! Final score: {}", summary.score),
                        ),
                        StopReason::Reset => {}
                    }
                    match self.history.as_ref().map(|h| h.record(&summary)) {
                        Some(Ok(true)) => self.refresh_best_score(),
                        Some(Err(err)) => warn!(%err, "could not write session history"),
                        Some(Ok(false)) | None => {}
                    }
                }
                SessionEvent::ScoreReset => {
                    self.notify(StatusLevel::Info, "Training reset".to_string());
                }
                SessionEvent::Reset => {
                    self.notify(StatusLevel::Info, "Settings restored to defaults".to_string());
                }
                SessionEvent::PositionDrawn { .. }
                | SessionEvent::ManualPosition { .. }
                | SessionEvent::WatchdogRecovered { .. } => {}
            }
        }

        let redraw = self.controller.session().redraw_counter;
        if redraw != self.seen_redraw {
            self.seen_redraw = redraw;
            self.flash_started_ms = Some(self.now_ms());
        }

        if self
            .status
            .as_ref()
            .is_some_and(|s| s.until_ms <= self.now_ms())
        {
            self.status = None;
        }

        let now = self.controller.config(&self.seen);
        if now.mode != self.seen.mode {
            self.refresh_best_score();
        }
        if self.stored.merge_changes(&self.seen, &now) {
            if let Err(err) = self.store.save(&self.stored) {
                warn!(%err, "could not save settings");
            }
        }
        self.seen = now;
    }
}

pub fn limit_label(secs: u32) -> String {
    if secs == 0 {
        "off".to_string()
    } else {
        footwork::session::format_clock(secs)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let store: Box<dyn ConfigStore> = if cli.no_save {
        Box::new(MemoryConfigStore::default())
    } else {
        Box::new(FileConfigStore::new())
    };
    let stored = store.load();
    let cfg = cli.apply(stored.clone());
    let catalog = Catalog::with_custom_modes(&cfg.custom_modes);

    if cli.list_modes {
        for mode in catalog.modes() {
            println!("{:<18} {}", mode.name, mode.label);
        }
        return Ok(());
    }

    if !catalog.contains_mode(&cfg.mode) {
        let mut cmd = Cli::command();
        cmd.error(
            ErrorKind::InvalidValue,
            format!("unknown mode '{}' (see --list-modes)", cfg.mode),
        )
        .exit();
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(path) = AppDirs::log_path() {
        if let Err(err) = logging::init(&path) {
            eprintln!("footwork: logging disabled: {err}");
        }
    }

    let audio = TerminalAudio::new(cfg.speech_command.clone());
    let controller = match cli.seed {
        Some(seed) => SessionController::seeded(&cfg, audio, seed),
        None => SessionController::new(&cfg, audio),
    };
    let history = if cli.no_save {
        None
    } else {
        SessionHistory::new()
    };
    let mut app = App::new(stored, controller, store, history);

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, cli.start);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, A: AudioPlayer>(
    terminal: &mut Terminal<B>,
    app: &mut App<A>,
    autostart: bool,
) -> Result<(), Box<dyn Error>> {
    let clock = MonotonicClock::new();
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    if autostart {
        app.on_key(KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE));
    }
    terminal.draw(|f| ui(app, f))?;

    loop {
        let event = runner.step();
        app.advance(clock.now_ms());

        if let AppEvent::Key(key) = event {
            if app.on_key(key) == Flow::Quit {
                app.controller.stop();
                app.advance(clock.now_ms());
                break;
            }
        }

        terminal.draw(|f| ui(app, f))?;
    }

    Ok(())
}

fn ui<A: AudioPlayer>(app: &App<A>, f: &mut Frame) {
    f.render_widget(app, f.area());
}
