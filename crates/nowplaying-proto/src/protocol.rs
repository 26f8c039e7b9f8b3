use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of preset slots the display offers (numbered 1..=4).
pub const PRESET_COUNT: usize = 4;

/// Raw preset labels as reported by a backend or the config file.
pub type PresetLabels = [Option<String>; PRESET_COUNT];

// ── Player status ─────────────────────────────────────────────────────────────

/// Playback condition reported by the remote player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    Playing,
    Paused,
    #[default]
    Stopped,
}

impl TransportState {
    pub fn is_playing(self) -> bool {
        matches!(self, TransportState::Playing)
    }

    pub fn is_paused(self) -> bool {
        matches!(self, TransportState::Paused)
    }
}

/// Normalized status record produced by a `PlayerClient` for one poll.
/// Superseded on every poll; never stored beyond the current cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayerStatus {
    pub transport: TransportState,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub total_duration_ms: Option<u64>,
    pub position_ms: Option<u64>,
}

impl PlayerStatus {
    pub fn track_identity(&self) -> TrackIdentity {
        TrackIdentity {
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
        }
    }

    /// Milliseconds left in the current track, when the player reports both a
    /// non-zero duration and a position.
    pub fn remaining_ms(&self) -> Option<u64> {
        match (self.total_duration_ms, self.position_ms) {
            (Some(total), Some(pos)) if total > 0 => Some(total.saturating_sub(pos)),
            _ => None,
        }
    }
}

/// Change-detection key for the track on screen. Equality only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TrackIdentity {
    pub title: String,
    pub artist: String,
    pub album: String,
}

impl fmt::Display for TrackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.title, self.artist, self.album)
    }
}

/// Extra per-track data fetched only when a redraw needs it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackMetadata {
    pub art_url: Option<String>,
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Transport commands the display can send to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Pause,
    Resume,
    Next,
    Previous,
    /// Load preset slot `n` (1..=4).
    LoadPreset(u8),
}

impl fmt::Display for PlayerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerCommand::Pause => f.write_str("pause"),
            PlayerCommand::Resume => f.write_str("resume"),
            PlayerCommand::Next => f.write_str("next"),
            PlayerCommand::Previous => f.write_str("previous"),
            PlayerCommand::LoadPreset(n) => write!(f, "preset {}", n),
        }
    }
}

// ── Presets ───────────────────────────────────────────────────────────────────

/// One quick-launch slot. A slot without a label is inactive and gets no
/// touch region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetSlot {
    pub number: u8,
    pub label: Option<String>,
}

impl PresetSlot {
    pub fn is_active(&self) -> bool {
        self.label.is_some()
    }
}

/// Build the full slot list from raw labels. Blank labels count as absent.
pub fn preset_slots(labels: &PresetLabels) -> Vec<PresetSlot> {
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| PresetSlot {
            number: i as u8 + 1,
            label: label
                .as_ref()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        })
        .collect()
}

// ── Screen ────────────────────────────────────────────────────────────────────

/// Which screen is currently on the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenState {
    /// Clock/weather, shown while stopped, paused or disconnected.
    #[default]
    Clock,
    /// Now-playing track with album art.
    Playing,
}
