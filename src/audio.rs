use crate::catalog::PositionId;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use tracing::{debug, warn};

/// How a drawn position is announced
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "kebab-case")]
pub enum AudioMode {
    Speech,
    #[default]
    Tone,
}

impl AudioMode {
    pub fn toggled(self) -> Self {
        match self {
            AudioMode::Speech => AudioMode::Tone,
            AudioMode::Tone => AudioMode::Speech,
        }
    }
}

/// Audio effect boundary. Implementations swallow their own failures; nothing
/// here may abort the session scheduler.
pub trait AudioPlayer {
    /// Try to get the output ready. Returns whether it is.
    fn prime(&mut self) -> bool;
    fn announce(&mut self, id: PositionId);
    fn cancel_in_flight(&mut self);
    fn play_fallback_tone(&mut self);
}

/// Silent player for headless use
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudio;

impl AudioPlayer for NullAudio {
    fn prime(&mut self) -> bool {
        true
    }

    fn announce(&mut self, _id: PositionId) {}

    fn cancel_in_flight(&mut self) {}

    fn play_fallback_tone(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCall {
    Prime,
    Announce(PositionId),
    Cancel,
    Tone,
}

/// Player that only records what it was asked to do
#[derive(Debug, Clone)]
pub struct RecordingAudio {
    pub calls: Vec<AudioCall>,
    pub prime_result: bool,
}

impl Default for RecordingAudio {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            prime_result: true,
        }
    }
}

impl RecordingAudio {
    pub fn announced(&self) -> Vec<PositionId> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                AudioCall::Announce(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: AudioCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }
}

impl AudioPlayer for RecordingAudio {
    fn prime(&mut self) -> bool {
        self.calls.push(AudioCall::Prime);
        self.prime_result
    }

    fn announce(&mut self, id: PositionId) {
        self.calls.push(AudioCall::Announce(id));
    }

    fn cancel_in_flight(&mut self) {
        self.calls.push(AudioCall::Cancel);
    }

    fn play_fallback_tone(&mut self) {
        self.calls.push(AudioCall::Tone);
    }
}

/// Speech command used when none is configured
pub fn default_speech_command() -> &'static str {
    if cfg!(target_os = "macos") {
        "say"
    } else {
        "espeak"
    }
}

/// Terminal bell for tones; speech through an external command (`espeak`, `say`)
/// that receives the position number as its only argument.
#[derive(Debug)]
pub struct TerminalAudio {
    speech_command: String,
    child: Option<Child>,
}

impl TerminalAudio {
    /// `None` picks the platform's speech command
    pub fn new(speech_command: Option<String>) -> Self {
        Self {
            speech_command: speech_command
                .unwrap_or_else(|| default_speech_command().to_string()),
            child: None,
        }
    }

    pub fn speech_command(&self) -> &str {
        &self.speech_command
    }

    fn command_available(cmd: &str) -> bool {
        if Path::new(cmd).components().count() > 1 {
            return Path::new(cmd).is_file();
        }
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(cmd).is_file()))
            .unwrap_or(false)
    }

    fn bell() -> io::Result<()> {
        let mut out = io::stdout();
        out.write_all(b"\x07")?;
        out.flush()
    }
}

impl AudioPlayer for TerminalAudio {
    fn prime(&mut self) -> bool {
        let ready = Self::command_available(&self.speech_command);
        if !ready {
            warn!(command = %self.speech_command, "speech command not found, tones will be used");
        }
        ready
    }

    fn announce(&mut self, id: PositionId) {
        match Command::new(&self.speech_command)
            .arg(id.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => self.child = Some(child),
            Err(err) => {
                warn!(command = %self.speech_command, %err, "speech failed, using tone fallback");
                self.play_fallback_tone();
            }
        }
    }

    fn cancel_in_flight(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Ok(None) = child.try_wait() {
                debug!("cancelling in-flight announcement");
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }

    fn play_fallback_tone(&mut self) {
        if let Err(err) = Self::bell() {
            debug!(%err, "tone failed");
        }
    }
}

impl Drop for TerminalAudio {
    fn drop(&mut self) {
        self.cancel_in_flight();
    }
}
