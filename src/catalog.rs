use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_MODE: &str = "full-court";

/// Court dimensions used by the position coordinates
pub const COURT_WIDTH: f64 = 610.0;
pub const COURT_HEIGHT: f64 = 670.0;

/// Ready stance in the middle of the court, where the direction arrow starts
pub const COURT_CENTER: (f64, f64) = (305.0, 360.0);

/// Stable identifier of a court position (1..=8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(u8);

impl PositionId {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 8;

    pub fn new(id: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&id).then_some(Self(id))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Map a digit key ('1'..='8') to a position
    pub fn from_digit(c: char) -> Option<Self> {
        c.to_digit(10).and_then(|d| Self::new(d as u8))
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub id: PositionId,
    pub x: f64,
    pub y: f64,
    pub label: &'static str,
}

pub const POSITIONS: [Position; 8] = [
    Position {
        id: PositionId(1),
        x: 56.0,
        y: 38.0,
        label: "Front left corner (near net)",
    },
    Position {
        id: PositionId(2),
        x: 305.0,
        y: 36.0,
        label: "Front center (near net)",
    },
    Position {
        id: PositionId(3),
        x: 554.0,
        y: 38.0,
        label: "Front right corner (near net)",
    },
    Position {
        id: PositionId(4),
        x: 552.0,
        y: 318.0,
        label: "Right mid-court",
    },
    Position {
        id: PositionId(5),
        x: 554.0,
        y: 587.0,
        label: "Back right corner",
    },
    Position {
        id: PositionId(6),
        x: 305.0,
        y: 587.0,
        label: "Back center",
    },
    Position {
        id: PositionId(7),
        x: 56.0,
        y: 587.0,
        label: "Back left corner",
    },
    Position {
        id: PositionId(8),
        x: 58.0,
        y: 318.0,
        label: "Left mid-court",
    },
];

const STANDARD_MODES: [(&str, &str, &[u8]); 15] = [
    ("full-court", "Full court (1-2-3-4-5-6-7-8)", &[1, 2, 3, 4, 5, 6, 7, 8]),
    ("front-court", "Front court (1-2-3)", &[1, 2, 3]),
    ("back-court", "Back court (5-6-7)", &[5, 6, 7]),
    ("corners", "Corners (1-3-5-7)", &[1, 3, 5, 7]),
    ("left-side", "Left side (1-7-8)", &[1, 7, 8]),
    ("right-side", "Right side (3-4-5)", &[3, 4, 5]),
    ("random-1-2-3-4-8", "Random 1-2-3-4-8", &[1, 2, 3, 4, 8]),
    ("random-4-5-6-7-8", "Random 4-5-6-7-8", &[4, 5, 6, 7, 8]),
    ("random-4-8", "Random 4-8", &[4, 8]),
    ("random-2-4-6-8", "Random 2-4-6-8", &[2, 4, 6, 8]),
    ("random-1-5", "Random 1-5", &[1, 5]),
    ("random-2-6", "Random 2-6", &[2, 6]),
    ("random-3-7", "Random 3-7", &[3, 7]),
    ("random-5-7", "Random 5-7", &[5, 7]),
    ("random-1-3-6", "Random 1-3-6", &[1, 3, 6]),
];

/// A named subset of court positions eligible for a session
#[derive(Debug, Clone, PartialEq)]
pub struct Mode {
    pub name: String,
    pub label: String,
    pub positions: Vec<PositionId>,
}

impl Mode {
    /// Build a mode from raw ids, keeping catalog order and dropping anything outside 1..=8
    pub fn from_ids(name: impl Into<String>, label: impl Into<String>, ids: &[u8]) -> Self {
        let mut positions: Vec<PositionId> = ids.iter().copied().filter_map(PositionId::new).collect();
        positions.sort();
        positions.dedup();
        Self {
            name: name.into(),
            label: label.into(),
            positions,
        }
    }
}

/// Static positions plus the modes available for a session
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    modes: Vec<Mode>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl Catalog {
    pub fn standard() -> Self {
        let modes = STANDARD_MODES
            .iter()
            .map(|(name, label, ids)| Mode::from_ids(*name, *label, ids))
            .collect();
        Self { modes }
    }

    /// Standard modes followed by user-defined ones. A custom mode with a standard
    /// name replaces the standard entry in place.
    pub fn with_custom_modes(custom: &BTreeMap<String, Vec<u8>>) -> Self {
        let mut catalog = Self::standard();
        for (name, ids) in custom {
            let mode = Mode::from_ids(name.clone(), format!("Custom {name}"), ids);
            match catalog.modes.iter_mut().find(|m| m.name == *name) {
                Some(existing) => *existing = mode,
                None => catalog.modes.push(mode),
            }
        }
        catalog
    }

    pub fn positions(&self) -> &'static [Position] {
        &POSITIONS
    }

    pub fn position(&self, id: PositionId) -> &'static Position {
        &POSITIONS[(id.get() - 1) as usize]
    }

    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }

    pub fn mode(&self, name: &str) -> Option<&Mode> {
        self.modes.iter().find(|m| m.name == name)
    }

    pub fn contains_mode(&self, name: &str) -> bool {
        self.mode(name).is_some()
    }

    /// Allowed positions of a mode; unknown modes resolve to an empty set
    pub fn allowed(&self, name: &str) -> &[PositionId] {
        self.mode(name).map(|m| m.positions.as_slice()).unwrap_or(&[])
    }

    pub fn next_mode_name(&self, current: &str) -> &str {
        self.cycle(current, 1)
    }

    pub fn prev_mode_name(&self, current: &str) -> &str {
        self.cycle(current, self.modes.len().saturating_sub(1))
    }

    fn cycle(&self, current: &str, step: usize) -> &str {
        if self.modes.is_empty() {
            return DEFAULT_MODE;
        }
        let idx = self
            .modes
            .iter()
            .position(|m| m.name == current)
            .map_or(0, |i| (i + step) % self.modes.len());
        &self.modes[idx].name
    }
}
