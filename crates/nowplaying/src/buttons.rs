//! Touch regions of the 480×480 panel.
//!
//! Playback and resume buttons sit at fixed positions. Preset buttons are
//! laid out from whatever slots currently carry a label; the set is rebuilt
//! as a whole and published as one immutable snapshot, so a hit-test never
//! sees half of an old layout and half of a new one.

use std::sync::Arc;

use nowplaying_proto::protocol::{PresetSlot, PRESET_COUNT};

pub const SCREEN_WIDTH: u16 = 480;
pub const SCREEN_HEIGHT: u16 = 480;

/// Axis-aligned rectangle in panel pixels. Left/top edges are inside,
/// right/bottom edges are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

impl Rect {
    pub const fn new(x: u16, y: u16, w: u16, h: u16) -> Self {
        Self { x, y, w, h }
    }

    pub fn contains(&self, x: u16, y: u16) -> bool {
        let (x, y) = (u32::from(x), u32::from(y));
        let (left, top) = (u32::from(self.x), u32::from(self.y));
        x >= left && x < left + u32::from(self.w) && y >= top && y < top + u32::from(self.h)
    }
}

pub const PREVIOUS_BUTTON: Rect = Rect::new(60, 390, 100, 60);
pub const PAUSE_BUTTON: Rect = Rect::new(190, 390, 100, 60);
pub const NEXT_BUTTON: Rect = Rect::new(320, 390, 100, 60);
pub const RESUME_BUTTON: Rect = Rect::new(140, 400, 200, 70);

// Presets form a 2×2 grid above the resume button.
const PRESET_ORIGIN_Y: u16 = 250;
const PRESET_WIDTH: u16 = 200;
const PRESET_HEIGHT: u16 = 60;
const PRESET_COLUMNS: [u16; 2] = [30, 250];
const PRESET_ROW_STEP: u16 = 70;

/// Fixed cell of preset `number` (1-based) in the grid.
pub fn preset_rect(number: u8) -> Option<Rect> {
    if number == 0 || usize::from(number) > PRESET_COUNT {
        return None;
    }
    let index = usize::from(number - 1);
    let column = PRESET_COLUMNS[index % PRESET_COLUMNS.len()];
    let row = (index / PRESET_COLUMNS.len()) as u16;
    Some(Rect::new(
        column,
        PRESET_ORIGIN_Y + row * PRESET_ROW_STEP,
        PRESET_WIDTH,
        PRESET_HEIGHT,
    ))
}

/// Named touch target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Previous,
    Pause,
    Next,
    Resume,
    Preset(u8),
}

/// Playback controls in hit-test order.
pub const PLAYBACK_BUTTONS: [(Region, Rect); 3] = [
    (Region::Previous, PREVIOUS_BUTTON),
    (Region::Pause, PAUSE_BUTTON),
    (Region::Next, NEXT_BUTTON),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetButton {
    pub number: u8,
    pub label: String,
    pub rect: Rect,
}

/// Immutable view of the active preset buttons.
pub type PresetSnapshot = Arc<[PresetButton]>;

#[derive(Debug, Clone)]
pub struct ButtonRegistry {
    presets: PresetSnapshot,
}

impl Default for ButtonRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ButtonRegistry {
    pub fn new() -> Self {
        Self {
            presets: Arc::from(Vec::new()),
        }
    }

    /// Replace the preset layout. Inactive slots get no region.
    pub fn rebuild_presets(&mut self, slots: &[PresetSlot]) {
        let buttons: Vec<PresetButton> = slots
            .iter()
            .filter_map(|slot| {
                let label = slot.label.clone()?;
                let rect = preset_rect(slot.number)?;
                Some(PresetButton {
                    number: slot.number,
                    label,
                    rect,
                })
            })
            .collect();
        tracing::debug!("buttons: {} active preset(s)", buttons.len());
        self.presets = Arc::from(buttons);
    }

    pub fn presets(&self) -> PresetSnapshot {
        Arc::clone(&self.presets)
    }

    pub fn rect(&self, region: Region) -> Option<Rect> {
        match region {
            Region::Previous => Some(PREVIOUS_BUTTON),
            Region::Pause => Some(PAUSE_BUTTON),
            Region::Next => Some(NEXT_BUTTON),
            Region::Resume => Some(RESUME_BUTTON),
            Region::Preset(n) => self
                .presets
                .iter()
                .find(|button| button.number == n)
                .map(|button| button.rect),
        }
    }

    pub fn contains(&self, region: Region, x: u16, y: u16) -> bool {
        self.rect(region).is_some_and(|rect| rect.contains(x, y))
    }

    /// Playback control under the point, if any.
    pub fn hit_playback(&self, x: u16, y: u16) -> Option<Region> {
        PLAYBACK_BUTTONS
            .iter()
            .find(|(_, rect)| rect.contains(x, y))
            .map(|(region, _)| *region)
    }

    /// Clock-screen control under the point, restricted to what is shown.
    pub fn hit_clock(&self, x: u16, y: u16, resume: bool, presets: bool) -> Option<Region> {
        if resume && RESUME_BUTTON.contains(x, y) {
            return Some(Region::Resume);
        }
        if presets {
            let snapshot = self.presets();
            return snapshot
                .iter()
                .find(|button| button.rect.contains(x, y))
                .map(|button| Region::Preset(button.number));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nowplaying_proto::protocol::preset_slots;

    fn labels(names: [Option<&str>; 4]) -> Vec<PresetSlot> {
        preset_slots(&names.map(|n| n.map(str::to_string)))
    }

    #[test]
    fn test_rect_edges_half_open() {
        let rect = Rect::new(10, 20, 30, 40);
        assert!(rect.contains(10, 20));
        assert!(rect.contains(39, 59));
        assert!(!rect.contains(40, 20));
        assert!(!rect.contains(10, 60));
        assert!(!rect.contains(9, 30));
    }

    #[test]
    fn test_rect_no_overflow_at_panel_edge() {
        let rect = Rect::new(u16::MAX - 5, u16::MAX - 5, 10, 10);
        assert!(rect.contains(u16::MAX, u16::MAX));
    }

    #[test]
    fn test_hit_playback() {
        let registry = ButtonRegistry::new();
        assert_eq!(registry.hit_playback(100, 420), Some(Region::Previous));
        assert_eq!(registry.hit_playback(240, 420), Some(Region::Pause));
        assert_eq!(registry.hit_playback(370, 420), Some(Region::Next));
        assert_eq!(registry.hit_playback(240, 100), None);
        // gap between previous and pause
        assert_eq!(registry.hit_playback(175, 420), None);
    }

    #[test]
    fn test_inactive_presets_have_no_region() {
        let mut registry = ButtonRegistry::new();
        registry.rebuild_presets(&labels([Some("Jazz"), None, Some(" "), Some("Chill")]));
        let numbers: Vec<u8> = registry.presets().iter().map(|b| b.number).collect();
        assert_eq!(numbers, vec![1, 4]);
        assert!(registry.rect(Region::Preset(2)).is_none());
        assert!(registry.rect(Region::Preset(3)).is_none());

        let second = preset_rect(2).unwrap();
        assert_eq!(
            registry.hit_clock(second.x + 1, second.y + 1, false, true),
            None
        );
    }

    #[test]
    fn test_hit_clock_respects_visibility() {
        let mut registry = ButtonRegistry::new();
        registry.rebuild_presets(&labels([Some("Jazz"), Some("Rock"), None, None]));
        let first = preset_rect(1).unwrap();

        assert_eq!(registry.hit_clock(240, 430, true, false), Some(Region::Resume));
        assert_eq!(registry.hit_clock(240, 430, false, true), None);
        assert_eq!(registry.hit_clock(first.x, first.y, true, false), None);
        assert_eq!(
            registry.hit_clock(first.x, first.y, false, true),
            Some(Region::Preset(1))
        );
    }

    #[test]
    fn test_preset_grid_clear_of_resume() {
        for number in 1..=PRESET_COUNT as u8 {
            let rect = preset_rect(number).unwrap();
            assert!(u32::from(rect.y) + u32::from(rect.h) <= u32::from(RESUME_BUTTON.y));
            assert!(u32::from(rect.x) + u32::from(rect.w) <= u32::from(SCREEN_WIDTH));
        }
        assert_eq!(preset_rect(0), None);
        assert_eq!(preset_rect(5), None);
    }

    #[test]
    fn test_snapshot_survives_rebuild() {
        let mut registry = ButtonRegistry::new();
        registry.rebuild_presets(&labels([Some("A"), Some("B"), Some("C"), Some("D")]));
        let before = registry.presets();

        registry.rebuild_presets(&labels([Some("X"), None, None, None]));
        let after = registry.presets();

        assert_eq!(before.len(), 4);
        assert_eq!(before[1].label, "B");
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].label, "X");
    }
}
