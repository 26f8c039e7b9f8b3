/// SessionStateMachine: single-owner polling/redraw loop.
///
/// Owns the screen state, the render caches and the failure counters; the
/// touch sampler and the weather task only hand values in through their
/// channels. One cycle does at most one of two things:
///
/// 1. A pending touch (or a control timeout) is routed and executed. That
///    cycle makes no status request.
/// 2. Otherwise, when the poll schedule says so, fetch status, switch screen
///    if needed and redraw only when something visible changed.
///
/// Between cycles the loop sleeps for a short idle slice, so touch latency
/// stays bounded by the slice plus one in-flight request.
use std::time::{Duration, Instant};

use nowplaying_proto::config::Config;
use nowplaying_proto::protocol::{
    preset_slots, PlayerCommand, PlayerStatus, PresetLabels, ScreenState, TrackIdentity,
    TransportState,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::buttons::ButtonRegistry;
use crate::client::{ClientError, PlayerClient};
use crate::clock::{ClockFace, ClockSource};
use crate::presenter::{ClockControls, DisplayPresenter};
use crate::router::{Intent, RouterSnapshot, UiTouchRouter};
use crate::scheduler::{PollInputs, PollScheduler};
use crate::touch::TouchReceiver;
use crate::weather::WeatherFeed;

#[cfg(test)]
mod tests;

/// Consecutive failures, reset on the first success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureCounters {
    pub status: u32,
    pub art: u32,
}

/// Art state of the track on screen. Dropped on track change and when the
/// Playing screen is left.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ArtCache {
    url: Option<String>,
    shown: bool,
    /// The metadata request failed; `url` is unknown rather than absent.
    lookup_failed: bool,
}

impl ArtCache {
    /// Art that should be on screen but is not.
    fn missing(&self) -> bool {
        !self.shown && (self.url.is_some() || self.lookup_failed)
    }
}

fn loading_message(command: PlayerCommand) -> Option<String> {
    match command {
        PlayerCommand::Resume => Some("Resuming…".to_string()),
        PlayerCommand::LoadPreset(n) => Some(format!("Loading preset {}…", n)),
        PlayerCommand::Pause | PlayerCommand::Next | PlayerCommand::Previous => None,
    }
}

pub struct SessionStateMachine<C, D> {
    client: C,
    presenter: D,
    touch: TouchReceiver,
    weather: WeatherFeed,
    clock: ClockSource,
    router: UiTouchRouter,
    registry: ButtonRegistry,
    scheduler: PollScheduler,
    /// Labels used when the backend cannot list its presets.
    fallback_presets: PresetLabels,
    screen: ScreenState,
    /// Last reported transport; decides resume vs presets on the clock.
    transport: TransportState,
    remaining_ms: Option<u64>,
    failures: FailureCounters,
    /// Track currently drawn on the Playing screen.
    last_track: Option<TrackIdentity>,
    art: Option<ArtCache>,
    /// Whether the last Playing draw included the controls.
    drawn_controls: bool,
    /// Last clock frame that reached the display.
    drawn_clock: Option<(ClockFace, ClockControls)>,
}

impl<C: PlayerClient, D: DisplayPresenter> SessionStateMachine<C, D> {
    pub fn new(
        client: C,
        presenter: D,
        touch: TouchReceiver,
        weather: WeatherFeed,
        config: &Config,
    ) -> Self {
        Self {
            client,
            presenter,
            touch,
            weather,
            clock: ClockSource::new(config.display.utc_offset_minutes),
            router: UiTouchRouter::new(Duration::from_millis(config.touch.button_timeout_ms)),
            registry: ButtonRegistry::new(),
            scheduler: PollScheduler::new(&config.polling),
            fallback_presets: config.presets.slot_labels(),
            screen: ScreenState::Clock,
            transport: TransportState::Stopped,
            remaining_ms: None,
            failures: FailureCounters::default(),
            last_track: None,
            art: None,
            drawn_controls: false,
            drawn_clock: None,
        }
    }

    pub fn with_clock(mut self, clock: ClockSource) -> Self {
        self.clock = clock;
        self
    }

    pub fn screen(&self) -> ScreenState {
        self.screen
    }

    pub fn failures(&self) -> FailureCounters {
        self.failures
    }

    pub fn presenter(&self) -> &D {
        &self.presenter
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Boot: enable touch, load preset labels and put the clock up.
    pub async fn start(&mut self, now: Instant) {
        info!("Session: starting on {:?}", self.screen);
        self.touch.enable();
        self.refresh_presets().await;
        self.refresh_clock(now).await;
    }

    /// Run cycles until cancelled. Cancellation is only observed between
    /// cycles; a request in flight always completes or times out first.
    pub async fn run(mut self, cancel: CancellationToken) {
        self.start(Instant::now()).await;
        while !cancel.is_cancelled() {
            let pause = self.cycle(Instant::now()).await;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
        self.touch.disable();
        info!("Session: stopped");
    }

    /// One iteration. Returns how long to sleep before the next one.
    pub async fn cycle(&mut self, now: Instant) -> Duration {
        let before = self.router.snapshot();
        let touch = self.touch.consume_touch();
        if let Some(point) = touch {
            debug!("Session: touch at ({}, {}) on {:?}", point.x, point.y, self.screen);
        }

        let paused = self.transport.is_paused();
        if let Some(intent) = self
            .router
            .route(self.screen, touch, paused, &self.registry, now)
        {
            return self.execute(intent, before, now).await;
        }

        if self.scheduler.is_due(now) {
            self.poll(now).await;
        }
        self.scheduler.idle_slice()
    }

    // ── Touch intents ─────────────────────────────────────────────────────────

    async fn execute(&mut self, intent: Intent, before: RouterSnapshot, now: Instant) -> Duration {
        match intent {
            Intent::ShowControls | Intent::ShowPresets | Intent::HideControls => {
                debug!("Session: {:?} on {:?}", intent, self.screen);
                match self.screen {
                    ScreenState::Clock => self.refresh_clock(now).await,
                    ScreenState::Playing => self.redraw_track(now).await,
                }
                // Shown controls poll faster; never push an earlier poll back.
                let delay = self.scheduler.next_delay(&self.poll_inputs(now));
                self.scheduler.pull_in(now, delay);
                self.scheduler.idle_slice()
            }
            Intent::Command(command) => self.run_command(command, before, now).await,
        }
    }

    async fn run_command(
        &mut self,
        command: PlayerCommand,
        before: RouterSnapshot,
        now: Instant,
    ) -> Duration {
        info!("Session: {} requested", command);

        if let Some(message) = loading_message(command) {
            if let Err(e) = self.presenter.draw_loading(&message).await {
                warn!("Session: loading screen failed: {:#}", e);
            }
            self.drawn_clock = None;
        }

        if !self.client.send_command(command).await {
            warn!("Session: {} failed, screen unchanged", command);
            self.router.restore(before);
            if self.screen == ScreenState::Clock {
                self.refresh_clock(now).await;
            }
            return self.scheduler.idle_slice();
        }

        info!("Session: {} acknowledged", command);
        match command {
            PlayerCommand::Pause => {
                self.transport = TransportState::Paused;
                self.remaining_ms = None;
                self.enter_clock();
                self.router.show_resume(now);
                self.refresh_presets().await;
                self.refresh_clock(now).await;
            }
            PlayerCommand::Next | PlayerCommand::Previous => {
                self.last_track = None;
            }
            PlayerCommand::Resume | PlayerCommand::LoadPreset(_) => {}
        }
        self.scheduler.poll_now();
        self.scheduler.command_settle()
    }

    // ── Polling ───────────────────────────────────────────────────────────────

    fn poll_inputs(&self, now: Instant) -> PollInputs {
        PollInputs {
            screen: self.screen,
            controls_visible: self.router.controls_visible(self.screen, now),
            is_paused: self.transport.is_paused(),
            failure_count: self.failures.status,
            remaining_track_ms: self.remaining_ms,
        }
    }

    async fn poll(&mut self, now: Instant) {
        let status = match self.client.fetch_status().await {
            Ok(status) => status,
            Err(e) => {
                let delay = self.on_status_failure(e, now).await;
                self.scheduler.schedule(now, delay);
                return;
            }
        };

        if self.failures.status > 0 {
            info!(
                "Session: player reachable again after {} failure(s)",
                self.failures.status
            );
            self.failures.status = 0;
        }
        self.transport = status.transport;
        self.remaining_ms = status.remaining_ms();

        if status.transport.is_playing() {
            self.show_playing(&status, now).await;
        } else {
            self.show_clock(now).await;
        }

        let delay = self.scheduler.next_delay(&self.poll_inputs(now));
        self.scheduler.schedule(now, delay);
    }

    async fn on_status_failure(&mut self, err: ClientError, now: Instant) -> Duration {
        self.failures.status += 1;
        let count = self.failures.status;
        warn!(
            "Session: status fetch failed ({}/{}): {}",
            count,
            self.scheduler.failure_threshold(),
            err
        );
        let delay = self.scheduler.backoff(count);

        if self.scheduler.connection_lost(count) {
            self.failures.status = 0;
            self.transport = TransportState::Stopped;
            self.remaining_ms = None;
            if self.screen != ScreenState::Clock {
                warn!("Session: player lost after {} attempts, showing clock", count);
                self.enter_clock();
                self.router.hide_clock();
            }
        }

        // Keep the clock ticking while the player is away.
        if self.screen == ScreenState::Clock {
            self.refresh_clock(now).await;
        }
        delay
    }

    // ── Clock screen ──────────────────────────────────────────────────────────

    fn enter_clock(&mut self) {
        self.screen = ScreenState::Clock;
        self.router.hide_playing();
        self.last_track = None;
        self.art = None;
        self.drawn_controls = false;
        self.drawn_clock = None;
    }

    async fn show_clock(&mut self, now: Instant) {
        if self.screen != ScreenState::Clock {
            info!("Session: screen Playing → Clock ({:?})", self.transport);
            self.enter_clock();
            self.refresh_presets().await;
        }
        self.refresh_clock(now).await;
    }

    fn clock_controls(&self, now: Instant) -> ClockControls {
        let visible = self.router.clock_visibility(now);
        ClockControls {
            resume: visible.resume,
            presets: if visible.presets {
                self.registry.presets().to_vec()
            } else {
                Vec::new()
            },
        }
    }

    /// Draw the clock unless the last frame already shows the same minute,
    /// weather and controls.
    async fn refresh_clock(&mut self, now: Instant) {
        let weather = self.weather.borrow().clone();
        let face = self.clock.face(weather);
        let controls = self.clock_controls(now);
        if self
            .drawn_clock
            .as_ref()
            .is_some_and(|(f, c)| *f == face && *c == controls)
        {
            return;
        }
        match self.presenter.draw_clock(&face, &controls).await {
            Ok(()) => self.drawn_clock = Some((face, controls)),
            Err(e) => {
                warn!("Session: clock draw failed: {:#}", e);
                self.drawn_clock = None;
            }
        }
    }

    pub async fn refresh_presets(&mut self) {
        let labels = match self.client.fetch_preset_labels().await {
            Ok(labels) => labels,
            Err(e) => {
                debug!("Session: using configured preset labels ({})", e);
                self.fallback_presets.clone()
            }
        };
        self.registry.rebuild_presets(&preset_slots(&labels));
    }

    // ── Playing screen ────────────────────────────────────────────────────────

    async fn show_playing(&mut self, status: &PlayerStatus, now: Instant) {
        let track = status.track_identity();
        let controls = self.router.playing_controls_visible(now);
        let returning = self.screen != ScreenState::Playing;
        let track_changed = self.last_track.as_ref() != Some(&track);
        let controls_changed = controls != self.drawn_controls;
        let art_budget = self.art_budget_left();
        let art_retry = art_budget && self.art.as_ref().is_some_and(ArtCache::missing);

        if !(returning || track_changed || controls_changed || art_retry) {
            return;
        }

        if returning {
            info!("Session: screen Clock → Playing");
            self.screen = ScreenState::Playing;
            self.router.hide_clock();
            self.drawn_clock = None;
        }
        if track_changed {
            info!("Session: track {}", track);
            self.art = None;
            self.failures.art = 0;
        } else if art_retry {
            debug!(
                "Session: retrying art ({}/{})",
                self.failures.art + 1,
                self.scheduler.art_retry_limit()
            );
        }

        let needs_lookup = match &self.art {
            None => true,
            Some(art) => art.url.is_none() && (!art.lookup_failed || art_budget),
        };
        if needs_lookup {
            self.art = Some(match self.client.fetch_metadata().await {
                Ok(meta) => ArtCache {
                    url: meta.art_url,
                    shown: false,
                    lookup_failed: false,
                },
                Err(e) => {
                    self.failures.art += 1;
                    warn!(
                        "Session: metadata fetch failed ({}/{}), drawing without art: {}",
                        self.failures.art,
                        self.scheduler.art_retry_limit(),
                        e
                    );
                    ArtCache {
                        url: None,
                        shown: false,
                        lookup_failed: true,
                    }
                }
            });
        }

        self.last_track = Some(track);
        self.redraw_track(now).await;
    }

    fn art_budget_left(&self) -> bool {
        self.failures.art < self.scheduler.art_retry_limit()
    }

    /// Redraw the cached track with the current control visibility. No
    /// network calls apart from whatever the presenter does for the art.
    /// Once the art budget for the track is spent the art is left out.
    async fn redraw_track(&mut self, now: Instant) {
        let Some(track) = self.last_track.clone() else {
            return;
        };
        let controls = self.router.playing_controls_visible(now);
        let url = if self.art_budget_left() {
            self.art.as_ref().and_then(|art| art.url.clone())
        } else {
            None
        };
        let shown = self
            .presenter
            .draw_playing(&track, url.as_deref(), controls)
            .await;
        self.drawn_controls = controls;

        let Some(art) = self.art.as_mut().filter(|_| url.is_some()) else {
            return;
        };
        art.shown = shown;
        if shown {
            self.failures.art = 0;
        } else {
            self.failures.art += 1;
            warn!(
                "Session: album art not shown ({}/{})",
                self.failures.art,
                self.scheduler.art_retry_limit()
            );
        }
    }
}
