//! Touch routing and control visibility.
//!
//! Each screen has its own small state machine:
//!
//! ```text
//! Playing:  Hidden --touch--> Shown --touch on control--> Hidden (+command)
//!                              |  \--touch elsewhere----> Hidden
//!                              \----timeout-------------> Hidden
//!
//! Clock:    Hidden --touch--> Shown{resume if paused | presets if stopped}
//!           Shown{no presets} --touch elsewhere--> Shown{+presets}
//!           Shown{presets}    --touch elsewhere--> Hidden
//!           Shown --touch on resume/preset--> Hidden (+command)
//!           Shown --timeout--> Hidden
//! ```
//!
//! Controls count as visible while `now - shown_at < timeout`; the hide
//! intent fires on the first evaluation at or past the deadline.

use std::time::{Duration, Instant};

use nowplaying_proto::protocol::{PlayerCommand, ScreenState};

use crate::buttons::{ButtonRegistry, Region};
use crate::touch::TouchPoint;

/// What a touch (or its absence) asks the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    ShowControls,
    /// Clock screen escalated to the full control set.
    ShowPresets,
    HideControls,
    Command(PlayerCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayingControls {
    Hidden,
    Shown { since: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClockControlsState {
    Hidden,
    Shown {
        resume: bool,
        presets: bool,
        since: Instant,
    },
}

/// Which clock controls are on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockVisibility {
    pub resume: bool,
    pub presets: bool,
}

impl ClockVisibility {
    pub fn any(&self) -> bool {
        self.resume || self.presets
    }
}

/// Saved visibility, used to roll back after a failed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterSnapshot {
    playing: PlayingControls,
    clock: ClockControlsState,
}

#[derive(Debug, Clone)]
pub struct UiTouchRouter {
    playing: PlayingControls,
    clock: ClockControlsState,
    timeout: Duration,
}

fn command_for(region: Region) -> PlayerCommand {
    match region {
        Region::Previous => PlayerCommand::Previous,
        Region::Pause => PlayerCommand::Pause,
        Region::Next => PlayerCommand::Next,
        Region::Resume => PlayerCommand::Resume,
        Region::Preset(n) => PlayerCommand::LoadPreset(n),
    }
}

impl UiTouchRouter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            playing: PlayingControls::Hidden,
            clock: ClockControlsState::Hidden,
            timeout,
        }
    }

    fn expired(&self, since: Instant, now: Instant) -> bool {
        now.saturating_duration_since(since) >= self.timeout
    }

    /// Route one cycle's touch for the current screen. `None` touch only
    /// checks the timeout.
    pub fn route(
        &mut self,
        screen: ScreenState,
        touch: Option<TouchPoint>,
        paused: bool,
        registry: &ButtonRegistry,
        now: Instant,
    ) -> Option<Intent> {
        match (screen, touch) {
            (ScreenState::Playing, Some(point)) => Some(self.touch_playing(point, registry, now)),
            (ScreenState::Clock, Some(point)) => {
                Some(self.touch_clock(point, paused, registry, now))
            }
            (screen, None) => self.check_timeout(screen, now),
        }
    }

    fn touch_playing(&mut self, point: TouchPoint, registry: &ButtonRegistry, now: Instant) -> Intent {
        let visible = self.playing_controls_visible(now);
        if !visible {
            self.playing = PlayingControls::Shown { since: now };
            return Intent::ShowControls;
        }
        self.playing = PlayingControls::Hidden;
        match registry.hit_playback(point.x, point.y) {
            Some(region) => Intent::Command(command_for(region)),
            None => Intent::HideControls,
        }
    }

    fn touch_clock(
        &mut self,
        point: TouchPoint,
        paused: bool,
        registry: &ButtonRegistry,
        now: Instant,
    ) -> Intent {
        let shown = self.clock_visibility(now);
        if !shown.any() {
            // Resume only makes sense for a paused player; a stopped one
            // goes straight to presets.
            self.clock = ClockControlsState::Shown {
                resume: paused,
                presets: !paused,
                since: now,
            };
            return Intent::ShowControls;
        }

        if let Some(region) = registry.hit_clock(point.x, point.y, shown.resume, shown.presets) {
            self.clock = ClockControlsState::Hidden;
            return Intent::Command(command_for(region));
        }

        if !shown.presets {
            self.clock = ClockControlsState::Shown {
                resume: shown.resume,
                presets: true,
                since: now,
            };
            return Intent::ShowPresets;
        }

        self.clock = ClockControlsState::Hidden;
        Intent::HideControls
    }

    fn check_timeout(&mut self, screen: ScreenState, now: Instant) -> Option<Intent> {
        match screen {
            ScreenState::Playing => match self.playing {
                PlayingControls::Shown { since } if self.expired(since, now) => {
                    self.playing = PlayingControls::Hidden;
                    Some(Intent::HideControls)
                }
                _ => None,
            },
            ScreenState::Clock => match self.clock {
                ClockControlsState::Shown { since, .. } if self.expired(since, now) => {
                    self.clock = ClockControlsState::Hidden;
                    Some(Intent::HideControls)
                }
                _ => None,
            },
        }
    }

    pub fn playing_controls_visible(&self, now: Instant) -> bool {
        match self.playing {
            PlayingControls::Shown { since } => !self.expired(since, now),
            PlayingControls::Hidden => false,
        }
    }

    pub fn clock_visibility(&self, now: Instant) -> ClockVisibility {
        match self.clock {
            ClockControlsState::Shown {
                resume,
                presets,
                since,
            } if !self.expired(since, now) => ClockVisibility { resume, presets },
            _ => ClockVisibility::default(),
        }
    }

    /// Controls visible on `screen` right now.
    pub fn controls_visible(&self, screen: ScreenState, now: Instant) -> bool {
        match screen {
            ScreenState::Playing => self.playing_controls_visible(now),
            ScreenState::Clock => self.clock_visibility(now).any(),
        }
    }

    /// Show only the resume button on the clock screen, as after a pause.
    pub fn show_resume(&mut self, now: Instant) {
        self.clock = ClockControlsState::Shown {
            resume: true,
            presets: false,
            since: now,
        };
    }

    pub fn hide_playing(&mut self) {
        self.playing = PlayingControls::Hidden;
    }

    pub fn hide_clock(&mut self) {
        self.clock = ClockControlsState::Hidden;
    }

    pub fn hide_all(&mut self) {
        self.hide_playing();
        self.hide_clock();
    }

    pub fn snapshot(&self) -> RouterSnapshot {
        RouterSnapshot {
            playing: self.playing,
            clock: self.clock,
        }
    }

    pub fn restore(&mut self, snapshot: RouterSnapshot) {
        self.playing = snapshot.playing;
        self.clock = snapshot.clock;
    }
}
