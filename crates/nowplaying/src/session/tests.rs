use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use nowplaying_proto::config::Config;
use nowplaying_proto::protocol::{
    PlayerCommand, PlayerStatus, PresetLabels, ScreenState, TrackIdentity, TrackMetadata,
    TransportState,
};

use super::SessionStateMachine;
use crate::buttons::{preset_rect, Rect, NEXT_BUTTON, PAUSE_BUTTON, RESUME_BUTTON};
use crate::client::{ClientError, PlayerClient};
use crate::clock::{ClockFace, ClockSource};
use crate::presenter::{ClockControls, DisplayPresenter};
use crate::touch::{TouchPoint, TouchReceiver};
use crate::weather::no_weather;

// ── Fakes ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct ClientState {
    statuses: VecDeque<Result<PlayerStatus, ClientError>>,
    art_url: Option<String>,
    command_ok: bool,
    commands: Vec<PlayerCommand>,
    status_calls: usize,
    metadata_calls: usize,
    /// Metadata requests that time out before the first success.
    metadata_failures: usize,
    presets: Option<PresetLabels>,
}

#[derive(Clone, Default)]
struct FakeClient(Arc<Mutex<ClientState>>);

impl FakeClient {
    fn push(&self, status: Result<PlayerStatus, ClientError>) {
        self.0.lock().unwrap().statuses.push_back(status);
    }
}

impl PlayerClient for FakeClient {
    async fn fetch_status(&self) -> Result<PlayerStatus, ClientError> {
        let mut state = self.0.lock().unwrap();
        state.status_calls += 1;
        state.statuses.pop_front().unwrap_or(Err(ClientError::Timeout))
    }

    async fn fetch_metadata(&self) -> Result<TrackMetadata, ClientError> {
        let mut state = self.0.lock().unwrap();
        state.metadata_calls += 1;
        if state.metadata_failures > 0 {
            state.metadata_failures -= 1;
            return Err(ClientError::Timeout);
        }
        Ok(TrackMetadata {
            art_url: state.art_url.clone(),
        })
    }

    async fn send_command(&self, command: PlayerCommand) -> bool {
        let mut state = self.0.lock().unwrap();
        state.commands.push(command);
        state.command_ok
    }

    async fn fetch_preset_labels(&self) -> Result<PresetLabels, ClientError> {
        self.0
            .lock()
            .unwrap()
            .presets
            .clone()
            .ok_or(ClientError::Unsupported)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Draw {
    Clock {
        face: ClockFace,
        controls: ClockControls,
    },
    Playing {
        title: String,
        art_url: Option<String>,
        controls: bool,
    },
    Loading(String),
}

#[derive(Clone, Default)]
struct FakePresenter {
    draws: Arc<Mutex<Vec<Draw>>>,
    art_ok: bool,
}

impl FakePresenter {
    fn draws(&self) -> Vec<Draw> {
        self.draws.lock().unwrap().clone()
    }

    fn playing_draws(&self) -> Vec<(String, bool)> {
        self.draws()
            .into_iter()
            .filter_map(|d| match d {
                Draw::Playing {
                    title, controls, ..
                } => Some((title, controls)),
                _ => None,
            })
            .collect()
    }

    /// Playing draws that asked the presenter for art.
    fn art_attempts(&self) -> usize {
        self.draws()
            .iter()
            .filter(|d| matches!(d, Draw::Playing { art_url: Some(_), .. }))
            .count()
    }

    fn last_art_url(&self) -> Option<String> {
        self.draws().into_iter().rev().find_map(|d| match d {
            Draw::Playing { art_url, .. } => Some(art_url),
            _ => None,
        })?
    }

    fn clock_draws(&self) -> Vec<ClockControls> {
        self.draws()
            .into_iter()
            .filter_map(|d| match d {
                Draw::Clock { controls, .. } => Some(controls),
                _ => None,
            })
            .collect()
    }
}

impl DisplayPresenter for FakePresenter {
    async fn draw_clock(&mut self, face: &ClockFace, controls: &ClockControls) -> anyhow::Result<()> {
        self.draws.lock().unwrap().push(Draw::Clock {
            face: face.clone(),
            controls: controls.clone(),
        });
        Ok(())
    }

    async fn draw_playing(
        &mut self,
        track: &TrackIdentity,
        art_url: Option<&str>,
        show_controls: bool,
    ) -> bool {
        self.draws.lock().unwrap().push(Draw::Playing {
            title: track.title.clone(),
            art_url: art_url.map(str::to_string),
            controls: show_controls,
        });
        self.art_ok && art_url.is_some()
    }

    async fn draw_loading(&mut self, message: &str) -> anyhow::Result<()> {
        self.draws
            .lock()
            .unwrap()
            .push(Draw::Loading(message.to_string()));
        Ok(())
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

struct Harness {
    session: SessionStateMachine<FakeClient, FakePresenter>,
    client: FakeClient,
    presenter: FakePresenter,
    touch: TouchReceiver,
    t0: Instant,
}

impl Harness {
    fn new(art_ok: bool) -> Self {
        let client = FakeClient::default();
        client.0.lock().unwrap().command_ok = true;
        let presenter = FakePresenter {
            art_ok,
            ..Default::default()
        };
        let touch = TouchReceiver::detached();
        let pinned = Utc.with_ymd_and_hms(2026, 10, 19, 9, 41, 0).unwrap();
        let session = SessionStateMachine::new(
            client.clone(),
            presenter.clone(),
            touch.clone(),
            no_weather(),
            &Config::default(),
        )
        .with_clock(ClockSource::pinned_at(pinned));
        Self {
            session,
            client,
            presenter,
            touch,
            t0: Instant::now(),
        }
    }

    fn at(&self, ms: u64) -> Instant {
        self.t0 + Duration::from_millis(ms)
    }

    /// Force a status poll at `ms` with the given response.
    async fn poll(&mut self, ms: u64, status: Result<PlayerStatus, ClientError>) -> Duration {
        self.client.push(status);
        self.session.scheduler.poll_now();
        self.session.cycle(self.at(ms)).await
    }

    async fn tap(&mut self, ms: u64, point: TouchPoint) -> Duration {
        self.touch.mailbox().post(point);
        self.session.cycle(self.at(ms)).await
    }

    fn status_calls(&self) -> usize {
        self.client.0.lock().unwrap().status_calls
    }

    fn commands(&self) -> Vec<PlayerCommand> {
        self.client.0.lock().unwrap().commands.clone()
    }

    fn set_command_ok(&self, ok: bool) {
        self.client.0.lock().unwrap().command_ok = ok;
    }
}

fn playing(title: &str) -> Result<PlayerStatus, ClientError> {
    Ok(PlayerStatus {
        transport: TransportState::Playing,
        title: title.to_string(),
        artist: "Artist".to_string(),
        album: "Album".to_string(),
        total_duration_ms: Some(240_000),
        position_ms: Some(10_000),
    })
}

fn with_transport(transport: TransportState) -> Result<PlayerStatus, ClientError> {
    Ok(PlayerStatus {
        transport,
        ..Default::default()
    })
}

fn centre(rect: Rect) -> TouchPoint {
    TouchPoint::new(rect.x + rect.w / 2, rect.y + rect.h / 2)
}

const EMPTY_SPOT: TouchPoint = TouchPoint { x: 240, y: 120 };

// ── Redraw policy ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_same_track_not_redrawn() {
    let mut h = Harness::new(true);
    h.client.0.lock().unwrap().art_url = Some("http://art/a.jpg".to_string());

    h.poll(0, playing("A")).await;
    h.poll(1000, playing("A")).await;

    assert_eq!(h.session.screen(), ScreenState::Playing);
    assert_eq!(h.presenter.playing_draws(), vec![("A".to_string(), false)]);
    assert_eq!(h.client.0.lock().unwrap().metadata_calls, 1);
}

#[tokio::test]
async fn test_track_sequence_with_controls_shown() {
    let mut h = Harness::new(true);

    h.poll(0, playing("A")).await;
    assert_eq!(h.presenter.playing_draws().len(), 1);

    h.poll(1000, playing("A")).await;
    assert_eq!(h.presenter.playing_draws().len(), 1);

    h.tap(2000, EMPTY_SPOT).await;
    assert_eq!(
        h.presenter.playing_draws().last(),
        Some(&("A".to_string(), true))
    );

    h.poll(3000, playing("B")).await;
    assert_eq!(
        h.presenter.playing_draws(),
        vec![
            ("A".to_string(), false),
            ("A".to_string(), true),
            ("B".to_string(), true),
        ]
    );
}

#[tokio::test]
async fn test_broken_art_retried_up_to_limit() {
    let mut h = Harness::new(false);
    h.client.0.lock().unwrap().art_url = Some("http://art/broken.jpg".to_string());

    for i in 0..6 {
        h.poll(i * 1000, playing("A")).await;
    }

    assert_eq!(h.presenter.playing_draws().len(), 3);
    assert_eq!(h.session.failures().art, 3);
    assert_eq!(h.client.0.lock().unwrap().metadata_calls, 1);

    // a new track gets a fresh budget
    h.poll(7000, playing("B")).await;
    assert_eq!(h.presenter.playing_draws().len(), 4);
    assert_eq!(h.session.failures().art, 1);
}

#[tokio::test]
async fn test_spent_art_budget_leaves_art_out() {
    let mut h = Harness::new(false);
    h.client.0.lock().unwrap().art_url = Some("http://art/broken.jpg".to_string());

    for i in 0..4 {
        h.poll(i * 1000, playing("A")).await;
    }
    assert_eq!(h.session.failures().art, 3);
    assert_eq!(h.presenter.art_attempts(), 3);

    // show, then hide the controls
    h.tap(5000, EMPTY_SPOT).await;
    h.tap(5500, EMPTY_SPOT).await;

    let draws = h.presenter.playing_draws();
    assert_eq!(
        draws[draws.len() - 2..],
        [("A".to_string(), true), ("A".to_string(), false)]
    );
    assert_eq!(h.presenter.art_attempts(), 3);
    assert_eq!(h.presenter.last_art_url(), None);
    assert_eq!(h.session.failures().art, 3);
}

#[tokio::test]
async fn test_failed_metadata_lookup_retried() {
    let mut h = Harness::new(true);
    {
        let mut client = h.client.0.lock().unwrap();
        client.art_url = Some("http://art/a.jpg".to_string());
        client.metadata_failures = 1;
    }

    h.poll(0, playing("A")).await;
    assert_eq!(h.presenter.last_art_url(), None);
    assert_eq!(h.session.failures().art, 1);

    h.poll(1000, playing("A")).await;
    assert_eq!(h.client.0.lock().unwrap().metadata_calls, 2);
    assert_eq!(h.presenter.last_art_url().as_deref(), Some("http://art/a.jpg"));
    assert_eq!(h.session.failures().art, 0);

    // art is up: nothing left to retry
    h.poll(2000, playing("A")).await;
    assert_eq!(h.client.0.lock().unwrap().metadata_calls, 2);
    assert_eq!(h.presenter.playing_draws().len(), 2);
}

#[tokio::test]
async fn test_metadata_lookups_share_art_budget() {
    let mut h = Harness::new(true);
    {
        let mut client = h.client.0.lock().unwrap();
        client.art_url = Some("http://art/a.jpg".to_string());
        client.metadata_failures = 10;
    }

    for i in 0..6 {
        h.poll(i * 1000, playing("A")).await;
    }

    assert_eq!(h.client.0.lock().unwrap().metadata_calls, 3);
    assert_eq!(h.session.failures().art, 3);
    assert_eq!(h.presenter.playing_draws().len(), 3);
    assert_eq!(h.presenter.art_attempts(), 0);
}

#[tokio::test]
async fn test_clock_redraw_suppressed() {
    let mut h = Harness::new(true);

    h.poll(0, with_transport(TransportState::Paused)).await;
    h.poll(5000, with_transport(TransportState::Paused)).await;
    h.poll(10_000, with_transport(TransportState::Stopped)).await;

    assert_eq!(h.session.screen(), ScreenState::Clock);
    assert_eq!(h.presenter.clock_draws().len(), 1);
}

#[tokio::test]
async fn test_leaving_playing_draws_clock() {
    let mut h = Harness::new(true);
    h.poll(0, playing("A")).await;
    h.poll(1000, with_transport(TransportState::Stopped)).await;

    assert_eq!(h.session.screen(), ScreenState::Clock);
    assert_eq!(h.presenter.clock_draws(), vec![ClockControls::default()]);

    // back to the same track: full redraw
    h.poll(2000, playing("A")).await;
    assert_eq!(h.presenter.playing_draws().len(), 2);
}

// ── Touch ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_touch_preempts_status_fetch() {
    let mut h = Harness::new(true);
    h.poll(0, playing("A")).await;
    let calls = h.status_calls();

    h.session.scheduler.poll_now();
    h.tap(500, EMPTY_SPOT).await;

    assert_eq!(h.status_calls(), calls);
    assert_eq!(
        h.presenter.playing_draws().last(),
        Some(&("A".to_string(), true))
    );
}

#[tokio::test]
async fn test_controls_hide_on_timeout() {
    let mut h = Harness::new(true);
    h.poll(0, playing("A")).await;
    h.tap(1000, EMPTY_SPOT).await;
    let draws = h.presenter.playing_draws().len();

    h.session.cycle(h.at(5999)).await;
    assert_eq!(h.presenter.playing_draws().len(), draws);

    h.session.cycle(h.at(6000)).await;
    assert_eq!(
        h.presenter.playing_draws().last(),
        Some(&("A".to_string(), false))
    );
}

#[tokio::test]
async fn test_controls_poll_faster() {
    let mut h = Harness::new(true);
    h.poll(0, playing("A")).await;
    assert_eq!(
        h.session.scheduler.next_due(),
        Some(h.at(10_000))
    );

    h.tap(1000, EMPTY_SPOT).await;
    assert_eq!(h.session.scheduler.next_due(), Some(h.at(3000)));
}

// ── Commands ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pause_moves_to_clock_with_resume() {
    let mut h = Harness::new(true);
    h.poll(0, playing("A")).await;
    h.tap(1000, EMPTY_SPOT).await;

    let sleep = h.tap(2000, centre(PAUSE_BUTTON)).await;

    assert_eq!(h.commands(), vec![PlayerCommand::Pause]);
    assert_eq!(sleep, Duration::from_millis(200));
    assert_eq!(h.session.screen(), ScreenState::Clock);
    let last = h.presenter.clock_draws().pop().unwrap();
    assert!(last.resume);
    assert!(last.presets.is_empty());
}

#[tokio::test]
async fn test_pause_refreshes_preset_labels() {
    let mut h = Harness::new(true);
    h.client.0.lock().unwrap().presets = Some([Some("Radio 1".to_string()), None, None, None]);
    h.session.start(h.at(0)).await;
    h.poll(0, playing("A")).await;

    h.client.0.lock().unwrap().presets = Some([
        Some("Radio 1".to_string()),
        Some("Radio 2".to_string()),
        None,
        None,
    ]);
    h.tap(1000, EMPTY_SPOT).await;
    h.tap(2000, centre(PAUSE_BUTTON)).await;

    assert_eq!(h.session.screen(), ScreenState::Clock);
    let labels: Vec<String> = h
        .session
        .registry
        .presets()
        .iter()
        .map(|p| p.label.clone())
        .collect();
    assert_eq!(labels, vec!["Radio 1".to_string(), "Radio 2".to_string()]);
}

#[tokio::test]
async fn test_failed_command_changes_nothing() {
    let mut h = Harness::new(true);
    h.poll(0, playing("A")).await;
    h.tap(1000, EMPTY_SPOT).await;
    h.set_command_ok(false);
    let draws = h.presenter.draws().len();

    h.tap(2000, centre(PAUSE_BUTTON)).await;

    assert_eq!(h.commands(), vec![PlayerCommand::Pause]);
    assert_eq!(h.session.screen(), ScreenState::Playing);
    assert!(h.session.router.playing_controls_visible(h.at(2000)));
    assert_eq!(h.presenter.draws().len(), draws);

    // the user can simply try again
    h.set_command_ok(true);
    h.tap(2500, centre(PAUSE_BUTTON)).await;
    assert_eq!(h.session.screen(), ScreenState::Clock);
}

#[tokio::test]
async fn test_next_forces_redraw_of_same_track() {
    let mut h = Harness::new(true);
    h.poll(0, playing("A")).await;
    h.tap(1000, EMPTY_SPOT).await;
    h.tap(1500, centre(NEXT_BUTTON)).await;
    assert_eq!(h.commands(), vec![PlayerCommand::Next]);
    assert!(h.session.scheduler.is_due(h.at(1500)));

    // player still reports A right after the skip
    h.poll(1700, playing("A")).await;
    assert_eq!(
        h.presenter.playing_draws().last(),
        Some(&("A".to_string(), false))
    );
    assert_eq!(h.presenter.playing_draws().len(), 3);
}

#[tokio::test]
async fn test_failed_resume_restores_clock_controls() {
    let mut h = Harness::new(true);
    h.poll(0, with_transport(TransportState::Paused)).await;
    h.tap(1000, EMPTY_SPOT).await;
    h.set_command_ok(false);

    h.tap(1500, centre(RESUME_BUTTON)).await;

    let draws = h.presenter.draws();
    assert_eq!(
        draws[draws.len() - 2],
        Draw::Loading("Resuming…".to_string())
    );
    match draws.last() {
        Some(Draw::Clock { controls, .. }) => assert!(controls.resume),
        other => panic!("expected clock redraw, got {:?}", other),
    }
    assert_eq!(h.session.screen(), ScreenState::Clock);
    assert!(h.session.router.clock_visibility(h.at(1500)).resume);
}

#[tokio::test]
async fn test_resume_success_redraws_on_next_poll() {
    let mut h = Harness::new(true);
    h.poll(0, with_transport(TransportState::Paused)).await;
    h.tap(1000, EMPTY_SPOT).await;
    let sleep = h.tap(1500, centre(RESUME_BUTTON)).await;
    assert_eq!(sleep, Duration::from_millis(200));
    assert_eq!(h.commands(), vec![PlayerCommand::Resume]);

    // player has not caught up yet: the loading message is replaced anyway
    h.client.push(with_transport(TransportState::Paused));
    h.session.cycle(h.at(1700)).await;
    assert!(matches!(h.presenter.draws().last(), Some(Draw::Clock { .. })));

    h.poll(2200, playing("A")).await;
    assert_eq!(h.session.screen(), ScreenState::Playing);
}

#[tokio::test]
async fn test_presets_fall_back_to_config_labels() {
    let mut h = Harness::new(true);
    h.session.start(h.at(0)).await;
    h.poll(0, with_transport(TransportState::Stopped)).await;

    // stopped player: first touch goes straight to presets
    h.tap(1000, EMPTY_SPOT).await;
    let controls = h.presenter.clock_draws().pop().unwrap();
    assert!(!controls.resume);
    let labels: Vec<&str> = controls.presets.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(labels, vec!["Jazz", "Classical", "Rock", "Chill"]);

    let sleep = h.tap(1500, centre(preset_rect(3).unwrap())).await;
    assert_eq!(sleep, Duration::from_millis(200));
    assert_eq!(h.commands(), vec![PlayerCommand::LoadPreset(3)]);
    assert!(h
        .presenter
        .draws()
        .contains(&Draw::Loading("Loading preset 3…".to_string())));
}

#[tokio::test]
async fn test_device_preset_labels_win() {
    let mut h = Harness::new(true);
    h.client.0.lock().unwrap().presets = Some([Some("Radio 1".to_string()), None, None, None]);
    h.session.start(h.at(0)).await;

    let presets = h.session.registry.presets();
    assert_eq!(presets.len(), 1);
    assert_eq!(presets[0].label, "Radio 1");
}

// ── Failures ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_repeated_failures_force_clock() {
    let mut h = Harness::new(true);
    h.poll(0, playing("A")).await;

    for i in 1..=3 {
        let _ = h.poll(i * 100, Err(ClientError::Timeout)).await;
        assert_eq!(h.session.screen(), ScreenState::Playing);
        assert_eq!(h.session.failures().status, i as u32);
    }
    assert!(h.presenter.clock_draws().is_empty());

    h.poll(400, Err(ClientError::Connect("refused".to_string())))
        .await;

    assert_eq!(h.session.screen(), ScreenState::Clock);
    assert_eq!(h.presenter.clock_draws().len(), 1);
    assert_eq!(h.session.failures().status, 0);
}

#[tokio::test]
async fn test_backoff_schedules_next_poll() {
    let mut h = Harness::new(true);
    h.poll(0, playing("A")).await;

    h.poll(100, Err(ClientError::Timeout)).await;
    assert_eq!(h.session.scheduler.next_due(), Some(h.at(600)));

    h.poll(200, Err(ClientError::Timeout)).await;
    assert_eq!(h.session.scheduler.next_due(), Some(h.at(1200)));

    h.poll(300, playing("A")).await;
    assert_eq!(h.session.failures().status, 0);
    assert_eq!(h.session.scheduler.next_due(), Some(h.at(10_300)));
}

#[tokio::test]
async fn test_idle_cycle_sleeps_one_slice() {
    let mut h = Harness::new(true);
    h.poll(0, playing("A")).await;
    let calls = h.status_calls();

    let sleep = h.session.cycle(h.at(50)).await;
    assert_eq!(sleep, Duration::from_millis(50));
    assert_eq!(h.status_calls(), calls);
}
