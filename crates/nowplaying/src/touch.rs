//! Touch sampling.
//!
//! A sampler task polls the panel driver and posts each new contact (the
//! rising edge, not every sample while the finger rests) into a single-slot
//! mailbox. The session consumes the slot at most once per cycle. The slot
//! is one atomic word, so neither side ever waits on the other.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nowplaying_proto::config::TouchConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Contact point in panel pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchPoint {
    pub x: u16,
    pub y: u16,
}

impl TouchPoint {
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// Panel driver. `sample` reports the current contact, `None` while released.
pub trait TouchPanel: Send {
    fn sample(&mut self) -> Option<TouchPoint>;
}

const PENDING: u64 = 1 << 32;

/// Latest-wins, consume-once slot for one touch.
#[derive(Debug, Default)]
pub struct TouchMailbox {
    slot: AtomicU64,
}

impl TouchMailbox {
    pub fn post(&self, point: TouchPoint) {
        let word = PENDING | (u64::from(point.x) << 16) | u64::from(point.y);
        self.slot.store(word, Ordering::Release);
    }

    pub fn take(&self) -> Option<TouchPoint> {
        let word = self.slot.swap(0, Ordering::AcqRel);
        if word & PENDING == 0 {
            return None;
        }
        Some(TouchPoint {
            x: ((word >> 16) & 0xFFFF) as u16,
            y: (word & 0xFFFF) as u16,
        })
    }

    pub fn clear(&self) {
        self.slot.store(0, Ordering::Release);
    }
}

/// Consumer half held by the session.
#[derive(Debug, Clone)]
pub struct TouchReceiver {
    mailbox: Arc<TouchMailbox>,
    enabled: Arc<AtomicBool>,
}

impl TouchReceiver {
    /// Receiver over a bare mailbox, not attached to any sampler.
    pub fn detached() -> Self {
        Self {
            mailbox: Arc::new(TouchMailbox::default()),
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Pending touch, if any. A touch is returned at most once, and never
    /// while disabled: a post racing with `disable` is swallowed here.
    pub fn consume_touch(&self) -> Option<TouchPoint> {
        let point = self.mailbox.take();
        if self.is_enabled() {
            point
        } else {
            None
        }
    }

    pub fn enable(&self) {
        if !self.enabled.swap(true, Ordering::AcqRel) {
            debug!("touch: enabled");
        }
    }

    /// Stop accepting touches; anything not yet consumed is dropped.
    pub fn disable(&self) {
        if self.enabled.swap(false, Ordering::AcqRel) {
            debug!("touch: disabled");
        }
        self.mailbox.clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn mailbox(&self) -> &TouchMailbox {
        &self.mailbox
    }
}

/// Producer half: owns the panel and turns samples into posted touches.
pub struct TouchInput<P> {
    panel: P,
    receiver: TouchReceiver,
    was_down: bool,
    sample_interval: Duration,
    disabled_interval: Duration,
}

impl<P: TouchPanel> TouchInput<P> {
    pub fn new(panel: P, config: &TouchConfig) -> Self {
        Self {
            panel,
            receiver: TouchReceiver::detached(),
            was_down: false,
            sample_interval: Duration::from_millis(config.sample_interval_ms.max(1)),
            disabled_interval: Duration::from_millis(config.disabled_interval_ms.max(1)),
        }
    }

    pub fn receiver(&self) -> TouchReceiver {
        self.receiver.clone()
    }

    /// Take one sample. While disabled the panel is left alone and a contact
    /// that spans the re-enable is not reported until it is released.
    pub fn poll_once(&mut self) {
        if !self.receiver.is_enabled() {
            self.was_down = true;
            return;
        }
        let contact = self.panel.sample();
        if let (Some(point), false) = (contact, self.was_down) {
            trace!("touch: contact at ({}, {})", point.x, point.y);
            self.receiver.mailbox.post(point);
        }
        self.was_down = contact.is_some();
    }

    fn current_interval(&self) -> Duration {
        if self.receiver.is_enabled() {
            self.sample_interval
        } else {
            self.disabled_interval
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        debug!("touch: sampler started");
        loop {
            self.poll_once();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.current_interval()) => {}
            }
        }
        debug!("touch: sampler stopped");
    }
}
