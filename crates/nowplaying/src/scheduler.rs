use std::time::{Duration, Instant};

use nowplaying_proto::config::PollingConfig;
use nowplaying_proto::protocol::ScreenState;

/// Everything the next poll delay depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollInputs {
    pub screen: ScreenState,
    pub controls_visible: bool,
    pub is_paused: bool,
    pub failure_count: u32,
    pub remaining_track_ms: Option<u64>,
}

/// Decides when the next status poll is due.
///
/// The session never sleeps for a whole poll interval: it sleeps in short
/// idle slices and asks [`PollScheduler::is_due`] each cycle, so touches are
/// picked up promptly whatever the cadence.
#[derive(Debug, Clone)]
pub struct PollScheduler {
    config: PollingConfig,
    next_due: Option<Instant>,
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

impl PollScheduler {
    pub fn new(config: &PollingConfig) -> Self {
        Self {
            config: config.clone(),
            next_due: None,
        }
    }

    pub fn next_delay(&self, inputs: &PollInputs) -> Duration {
        if inputs.failure_count > 0 {
            return self.backoff(inputs.failure_count);
        }
        match inputs.screen {
            ScreenState::Clock if inputs.controls_visible => ms(self.config.clock_controls_ms),
            ScreenState::Clock => ms(self.config.clock_idle_ms),
            ScreenState::Playing if inputs.controls_visible => ms(self.config.controls_ms),
            ScreenState::Playing => {
                // A paused track has no end coming up.
                let near_end = !inputs.is_paused
                    && inputs
                        .remaining_track_ms
                        .is_some_and(|left| left <= self.config.track_end_threshold_ms);
                if near_end {
                    ms(self.config.fast_ms)
                } else {
                    ms(self.config.slow_ms)
                }
            }
        }
    }

    /// `min(base * failures, cap)`.
    pub fn backoff(&self, failure_count: u32) -> Duration {
        let delay = self
            .config
            .backoff_base_ms
            .saturating_mul(u64::from(failure_count.max(1)));
        ms(delay.min(self.config.backoff_cap_ms))
    }

    /// Consecutive failures at which the player counts as gone.
    pub fn connection_lost(&self, failure_count: u32) -> bool {
        failure_count >= self.config.failure_threshold
    }

    pub fn failure_threshold(&self) -> u32 {
        self.config.failure_threshold
    }

    pub fn idle_slice(&self) -> Duration {
        ms(self.config.idle_slice_ms)
    }

    pub fn command_settle(&self) -> Duration {
        ms(self.config.command_settle_ms)
    }

    pub fn art_retry_limit(&self) -> u32 {
        self.config.art_retry_limit
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due.map_or(true, |due| now >= due)
    }

    pub fn schedule(&mut self, now: Instant, delay: Duration) {
        self.next_due = Some(now + delay);
    }

    /// Bring the next poll forward to `now + delay` if it is due later.
    pub fn pull_in(&mut self, now: Instant, delay: Duration) {
        let candidate = now + delay;
        if self.next_due.map_or(false, |due| due > candidate) {
            self.next_due = Some(candidate);
        }
    }

    /// Make the next cycle poll regardless of the schedule.
    pub fn poll_now(&mut self) {
        self.next_due = None;
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }
}
