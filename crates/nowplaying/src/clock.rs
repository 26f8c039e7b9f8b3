use chrono::{DateTime, FixedOffset, Local, Utc};

use crate::weather::WeatherInfo;

/// Everything drawn on the clock screen apart from controls. Two faces
/// compare equal when nothing visible changed, which is how the session
/// decides whether a clock redraw is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockFace {
    /// `HH:MM`
    pub time: String,
    /// e.g. `Monday, 19 October`
    pub date: String,
    pub weather: Option<WeatherInfo>,
}

#[derive(Debug, Clone, Copy)]
pub struct ClockSource {
    offset: Option<FixedOffset>,
    pinned: Option<DateTime<Utc>>,
}

impl ClockSource {
    /// Fixed UTC offset in minutes, or the host's local zone when `None`.
    pub fn new(utc_offset_minutes: Option<i32>) -> Self {
        let offset = utc_offset_minutes.and_then(|m| FixedOffset::east_opt(m.saturating_mul(60)));
        if utc_offset_minutes.is_some() && offset.is_none() {
            tracing::warn!("clock: utc offset out of range, using local time");
        }
        Self {
            offset,
            pinned: None,
        }
    }

    /// A clock stuck at `at` (UTC).
    pub fn pinned_at(at: DateTime<Utc>) -> Self {
        Self {
            offset: FixedOffset::east_opt(0),
            pinned: Some(at),
        }
    }

    pub fn face_at(&self, now: DateTime<Utc>, weather: Option<WeatherInfo>) -> ClockFace {
        let (time, date) = match self.offset {
            Some(offset) => {
                let t = now.with_timezone(&offset);
                (t.format("%H:%M").to_string(), t.format("%A, %-d %B").to_string())
            }
            None => {
                let t = now.with_timezone(&Local);
                (t.format("%H:%M").to_string(), t.format("%A, %-d %B").to_string())
            }
        };
        ClockFace {
            time,
            date,
            weather,
        }
    }

    pub fn face(&self, weather: Option<WeatherInfo>) -> ClockFace {
        self.face_at(self.pinned.unwrap_or_else(Utc::now), weather)
    }
}
