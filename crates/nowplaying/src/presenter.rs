use nowplaying_proto::protocol::TrackIdentity;

use crate::buttons::PresetButton;
use crate::clock::ClockFace;

/// Controls drawn on top of the clock face.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockControls {
    pub resume: bool,
    pub presets: Vec<PresetButton>,
}

/// Output side of the display. Rendering details (fonts, art decoding,
/// pixel layout) stay behind this trait.
#[allow(async_fn_in_trait)]
pub trait DisplayPresenter {
    async fn draw_clock(&mut self, face: &ClockFace, controls: &ClockControls) -> anyhow::Result<()>;

    /// Draw the now-playing screen. Returns whether album art was fetched,
    /// decoded and shown; `false` when there is no URL or the art failed.
    async fn draw_playing(
        &mut self,
        track: &TrackIdentity,
        art_url: Option<&str>,
        show_controls: bool,
    ) -> bool;

    /// Transient full-screen message while a command is in flight.
    async fn draw_loading(&mut self, message: &str) -> anyhow::Result<()>;
}
