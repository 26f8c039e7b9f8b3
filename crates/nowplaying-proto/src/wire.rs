//! Wire payloads of the two supported player backends.
//!
//! - WiiM HTTP API (`httpapi.asp?command=...`), either reached directly or
//!   through a relay that prefixes the JSON body with its own noise.
//! - Roon HTTP proxy (`/status`, `/control/*`, `/preset/N`, `/image/<key>`).
//!
//! Everything here is pure parsing: bodies in, normalized records out.

use serde::Deserialize;
use serde_json::Value;

use crate::protocol::{PlayerStatus, PresetLabels, TrackMetadata, TransportState, PRESET_COUNT};

/// Locate the JSON object inside a response body. Relays may prepend headers
/// or append trailing bytes such as `%` and CRLF.
pub fn extract_json(body: &str) -> Option<&str> {
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&body[start..=end])
}

/// Decode a hex-encoded UTF-8 string. Invalid input yields an empty string,
/// invalid UTF-8 sequences are replaced.
pub fn hex_to_text(hex: &str) -> String {
    let hex = hex.trim();
    if hex.is_empty() || hex.len() % 2 != 0 {
        return String::new();
    }
    let bytes: Option<Vec<u8>> = (0..hex.len())
        .step_by(2)
        .map(|i| hex.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect();
    match bytes {
        Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        None => String::new(),
    }
}

/// Accepts `123`, `"123"` and `123.4`; anything else is absent.
fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn secs_to_ms(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| *f >= 0.0).map(|f| (f * 1000.0) as u64),
        _ => None,
    }
}

// ── WiiM ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct WiimPlayerStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "Title")]
    pub title: String,
    #[serde(default, rename = "Artist")]
    pub artist: String,
    #[serde(default, rename = "Album")]
    pub album: String,
    #[serde(default)]
    pub totlen: Value,
    #[serde(default)]
    pub curpos: Value,
}

impl WiimPlayerStatus {
    pub fn into_status(self) -> PlayerStatus {
        let transport = match self.status.as_str() {
            "play" => TransportState::Playing,
            "pause" => TransportState::Paused,
            _ => TransportState::Stopped,
        };
        PlayerStatus {
            transport,
            title: hex_to_text(&self.title),
            artist: hex_to_text(&self.artist),
            album: hex_to_text(&self.album),
            total_duration_ms: lenient_u64(&self.totlen),
            position_ms: lenient_u64(&self.curpos),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct WiimMetaInfo {
    #[serde(rename = "metaData")]
    meta_data: Option<WiimMetaData>,
}

#[derive(Debug, Clone, Deserialize)]
struct WiimMetaData {
    #[serde(default, rename = "albumArtURI")]
    album_art_uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct WiimPresetInfo {
    #[serde(default)]
    preset_list: Vec<WiimPreset>,
}

#[derive(Debug, Clone, Deserialize)]
struct WiimPreset {
    number: Value,
    #[serde(default)]
    name: String,
}

pub fn parse_wiim_status(body: &str) -> anyhow::Result<PlayerStatus> {
    let json = extract_json(body).ok_or_else(|| anyhow::anyhow!("no JSON object in body"))?;
    let raw: WiimPlayerStatus = serde_json::from_str(json)?;
    Ok(raw.into_status())
}

/// The device reports placeholders such as `un_known` when no art exists;
/// only absolute http(s) URLs are kept.
pub fn parse_wiim_metadata(body: &str) -> anyhow::Result<TrackMetadata> {
    let json = extract_json(body).ok_or_else(|| anyhow::anyhow!("no JSON object in body"))?;
    let raw: WiimMetaInfo = serde_json::from_str(json)?;
    let meta = raw
        .meta_data
        .ok_or_else(|| anyhow::anyhow!("metaData missing"))?;
    let art_url = meta
        .album_art_uri
        .map(|u| u.trim().to_string())
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"));
    Ok(TrackMetadata { art_url })
}

pub fn parse_wiim_presets(body: &str) -> anyhow::Result<PresetLabels> {
    let json = extract_json(body).ok_or_else(|| anyhow::anyhow!("no JSON object in body"))?;
    let raw: WiimPresetInfo = serde_json::from_str(json)?;
    let mut labels: PresetLabels = Default::default();
    for preset in raw.preset_list {
        let Some(number) = lenient_u64(&preset.number) else {
            continue;
        };
        if (1..=PRESET_COUNT as u64).contains(&number) && !preset.name.trim().is_empty() {
            labels[number as usize - 1] = Some(preset.name.trim().to_string());
        }
    }
    Ok(labels)
}

/// WiiM acknowledges commands with a bare `OK` body.
pub fn is_wiim_ack(body: &str) -> bool {
    body.trim().eq_ignore_ascii_case("ok")
}

// ── Roon proxy ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RoonZoneStatus {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub now_playing: Option<RoonNowPlaying>,
    #[serde(default)]
    pub seek_position: Value,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RoonNowPlaying {
    #[serde(default)]
    pub three_line: RoonThreeLine,
    #[serde(default)]
    pub length: Value,
    #[serde(default)]
    pub image_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RoonThreeLine {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub line3: Option<String>,
}

impl RoonZoneStatus {
    pub fn into_status(self) -> PlayerStatus {
        let transport = match self.state.as_str() {
            "playing" => TransportState::Playing,
            "paused" => TransportState::Paused,
            _ => TransportState::Stopped,
        };
        let now_playing = self.now_playing.unwrap_or_default();
        let lines = now_playing.three_line;
        PlayerStatus {
            transport,
            title: lines.line1.unwrap_or_else(|| "Unknown".to_string()),
            artist: lines.line2.unwrap_or_else(|| "Unknown Artist".to_string()),
            album: lines.line3.unwrap_or_default(),
            total_duration_ms: secs_to_ms(&now_playing.length),
            position_ms: secs_to_ms(&self.seek_position),
        }
    }

    pub fn image_key(&self) -> Option<&str> {
        self.now_playing
            .as_ref()
            .and_then(|np| np.image_key.as_deref())
            .filter(|k| !k.is_empty())
    }
}

pub fn parse_roon_status(body: &str) -> anyhow::Result<RoonZoneStatus> {
    let status: RoonZoneStatus = serde_json::from_str(body.trim())?;
    Ok(status)
}

#[derive(Debug, Deserialize)]
struct RoonAck {
    #[serde(default)]
    ok: bool,
}

/// The proxy answers `{"ok": true}` on success and `{"error": ...}` otherwise.
pub fn is_roon_ack(body: &str) -> bool {
    serde_json::from_str::<RoonAck>(body.trim())
        .map(|ack| ack.ok)
        .unwrap_or(false)
}
