use std::time::Duration;

use anyhow::bail;
use nowplaying_proto::config::DisplayConfig;
use nowplaying_proto::protocol::TrackIdentity;
use ratatui::{
    backend::Backend,
    layout::Alignment,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame, Terminal,
};
use tracing::{debug, warn};

use super::{fit, panel_to_cells};
use crate::buttons::{Rect, Region, PLAYBACK_BUTTONS, RESUME_BUTTON, SCREEN_WIDTH};
use crate::clock::ClockFace;
use crate::presenter::{ClockControls, DisplayPresenter};

// ── Palette ───────────────────────────────────────────────────────────────────

const C_BG: Color = Color::Rgb(18, 18, 18);
const C_PRIMARY: Color = Color::Rgb(210, 210, 225);
const C_SECONDARY: Color = Color::Rgb(115, 115, 138);
const C_ACCENT: Color = Color::Rgb(255, 95, 95);
const C_BUTTON: Color = Color::Rgb(120, 100, 200);
const C_ART: Color = Color::Rgb(80, 160, 220);

// ── Panel layout ──────────────────────────────────────────────────────────────

const CLOCK_TIME: Rect = Rect::new(0, 90, SCREEN_WIDTH, 60);
const CLOCK_DATE: Rect = Rect::new(0, 160, SCREEN_WIDTH, 40);
const CLOCK_WEATHER: Rect = Rect::new(0, 200, SCREEN_WIDTH, 40);
const ART_BOX: Rect = Rect::new(140, 20, 200, 200);
const TRACK_TEXT: Rect = Rect::new(0, 235, SCREEN_WIDTH, 140);

/// Image formats the real panel can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ImageFormat::Jpeg)
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some(ImageFormat::Png)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArtInfo {
    format: ImageFormat,
    bytes: usize,
}

impl ArtInfo {
    fn label(&self) -> String {
        let kind = match self.format {
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png => "PNG",
        };
        format!("{} · {} KiB", kind, self.bytes.div_ceil(1024))
    }
}

pub struct TerminalPresenter<B: Backend> {
    terminal: Terminal<B>,
    http: reqwest::Client,
    art_max_bytes: usize,
    /// Last art that loaded, so a controls-only redraw does not refetch it.
    art: Option<(String, ArtInfo)>,
}

impl<B: Backend> TerminalPresenter<B> {
    pub fn new(terminal: Terminal<B>, config: &DisplayConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.art_timeout_ms))
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self {
            terminal,
            http,
            art_max_bytes: config.art_max_bytes,
            art: None,
        })
    }

    pub fn backend(&self) -> &B {
        self.terminal.backend()
    }

    fn draw<F>(&mut self, render: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut Frame<'_>),
    {
        self.terminal
            .draw(render)
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("terminal draw failed: {}", e))
    }

    /// Download at most `art_max_bytes` and check the image signature.
    async fn fetch_art(&self, url: &str) -> anyhow::Result<ArtInfo> {
        let mut response = self.http.get(url).send().await?.error_for_status()?;
        if response
            .content_length()
            .is_some_and(|len| len > self.art_max_bytes as u64)
        {
            bail!("art larger than {} bytes", self.art_max_bytes);
        }
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() > self.art_max_bytes {
                bail!("art larger than {} bytes", self.art_max_bytes);
            }
        }
        let format = sniff_format(&body).ok_or_else(|| anyhow::anyhow!("not a JPEG or PNG"))?;
        Ok(ArtInfo {
            format,
            bytes: body.len(),
        })
    }

    async fn load_art(&mut self, url: &str) -> Option<ArtInfo> {
        if let Some((cached_url, info)) = &self.art {
            if cached_url == url {
                return Some(*info);
            }
        }
        match self.fetch_art(url).await {
            Ok(info) => {
                debug!("terminal: art {} ({})", url, info.label());
                self.art = Some((url.to_string(), info));
                Some(info)
            }
            Err(e) => {
                warn!("terminal: art {} failed: {:#}", url, e);
                None
            }
        }
    }
}

impl<B: Backend> DisplayPresenter for TerminalPresenter<B> {
    async fn draw_clock(&mut self, face: &ClockFace, controls: &ClockControls) -> anyhow::Result<()> {
        self.draw(|frame| render_clock(frame, face, controls))
    }

    async fn draw_playing(
        &mut self,
        track: &TrackIdentity,
        art_url: Option<&str>,
        show_controls: bool,
    ) -> bool {
        let art = match art_url {
            Some(url) => self.load_art(url).await,
            None => None,
        };
        let art_label = match (art_url, art) {
            (_, Some(info)) => info.label(),
            (Some(_), None) => "art unavailable".to_string(),
            (None, None) => "no art".to_string(),
        };
        if let Err(e) = self.draw(|frame| render_playing(frame, track, &art_label, show_controls)) {
            warn!("terminal: {:#}", e);
            return false;
        }
        art.is_some()
    }

    async fn draw_loading(&mut self, message: &str) -> anyhow::Result<()> {
        self.draw(|frame| render_loading(frame, message))
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

fn background(frame: &mut Frame<'_>) {
    let area = frame.area();
    frame.render_widget(Clear, area);
    frame.render_widget(Block::default().style(Style::default().bg(C_BG)), area);
}

fn centred_line(frame: &mut Frame<'_>, rect: Rect, text: &str, style: Style) {
    let cells = panel_to_cells(rect, frame.area());
    let line = Line::from(Span::styled(fit(text, usize::from(cells.width)), style));
    frame.render_widget(Paragraph::new(line).alignment(Alignment::Center), cells);
}

fn button(frame: &mut Frame<'_>, rect: Rect, label: &str) {
    let cells = panel_to_cells(rect, frame.area());
    let inner_width = usize::from(cells.width.saturating_sub(2));
    frame.render_widget(Clear, cells);
    frame.render_widget(
        Paragraph::new(fit(label, inner_width))
            .alignment(Alignment::Center)
            .style(Style::default().fg(C_PRIMARY).bg(C_BG))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(C_BUTTON)),
            ),
        cells,
    );
}

fn render_clock(frame: &mut Frame<'_>, face: &ClockFace, controls: &ClockControls) {
    background(frame);
    centred_line(
        frame,
        CLOCK_TIME,
        &face.time,
        Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
    );
    centred_line(frame, CLOCK_DATE, &face.date, Style::default().fg(C_SECONDARY));
    if let Some(weather) = &face.weather {
        let text = if weather.location.is_empty() {
            weather.summary()
        } else {
            format!("{}  ·  {}", weather.summary(), weather.location)
        };
        centred_line(frame, CLOCK_WEATHER, &text, Style::default().fg(C_ART));
    }

    if controls.resume {
        button(frame, RESUME_BUTTON, "▶ Resume");
    }
    for preset in &controls.presets {
        button(frame, preset.rect, &preset.label);
    }
}

fn playback_label(region: Region) -> &'static str {
    match region {
        Region::Previous => "⏮ Prev",
        Region::Pause => "⏸ Pause",
        Region::Next => "⏭ Next",
        Region::Resume | Region::Preset(_) => "",
    }
}

fn render_playing(frame: &mut Frame<'_>, track: &TrackIdentity, art_label: &str, controls: bool) {
    background(frame);

    let art_cells = panel_to_cells(ART_BOX, frame.area());
    frame.render_widget(
        Paragraph::new(fit(art_label, usize::from(art_cells.width.saturating_sub(2))))
            .alignment(Alignment::Center)
            .style(Style::default().fg(C_SECONDARY))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(C_ART)),
            ),
        art_cells,
    );

    let text_cells = panel_to_cells(TRACK_TEXT, frame.area());
    let width = usize::from(text_cells.width);
    let lines = vec![
        Line::from(Span::styled(
            fit(&track.title, width),
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            fit(&track.artist, width),
            Style::default().fg(C_ACCENT),
        )),
        Line::from(Span::styled(
            fit(&track.album, width),
            Style::default().fg(C_SECONDARY),
        )),
    ];
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), text_cells);

    if controls {
        for (region, rect) in PLAYBACK_BUTTONS {
            button(frame, rect, playback_label(region));
        }
    }
}

fn render_loading(frame: &mut Frame<'_>, message: &str) {
    background(frame);
    centred_line(
        frame,
        Rect::new(0, 210, SCREEN_WIDTH, 60),
        message,
        Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
    );
}
