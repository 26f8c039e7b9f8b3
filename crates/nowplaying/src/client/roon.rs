use std::time::Duration;

use nowplaying_proto::config::RoonConfig;
use nowplaying_proto::protocol::{
    PlayerCommand, PlayerStatus, PresetLabels, TrackMetadata, PRESET_COUNT,
};
use nowplaying_proto::wire;
use tracing::{debug, warn};

use super::{build_http_client, get_text, ClientError, PlayerClient};

/// Client for the Roon HTTP proxy. The proxy speaks to the Roon core; this
/// side only sees `/status`, `/control/*`, `/preset/N` and `/image/<key>`.
pub struct RoonClient {
    http: reqwest::Client,
    base_url: String,
    zone_id: Option<String>,
}

impl RoonClient {
    pub fn new(config: &RoonConfig, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = format!("http://{}:{}", config.proxy_host, config.proxy_port);
        Self::with_base_url(base_url, config.zone_id.clone(), timeout)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        zone_id: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let base_url: String = base_url.into();
        Ok(Self {
            http: build_http_client(timeout, false)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            zone_id,
        })
    }

    fn url(&self, path: &str) -> String {
        match &self.zone_id {
            Some(zone) => format!("{}{}?zone_id={}", self.base_url, path, zone),
            None => format!("{}{}", self.base_url, path),
        }
    }

    async fn zone(&self) -> Result<wire::RoonZoneStatus, ClientError> {
        let url = self.url("/status");
        debug!("roon: GET {}", url);
        let body = get_text(&self.http, &url).await?;
        wire::parse_roon_status(&body).map_err(ClientError::malformed)
    }
}

fn command_path(command: PlayerCommand) -> Option<String> {
    match command {
        PlayerCommand::Pause => Some("/control/pause".to_string()),
        PlayerCommand::Resume => Some("/control/play".to_string()),
        PlayerCommand::Next => Some("/control/next".to_string()),
        PlayerCommand::Previous => Some("/control/previous".to_string()),
        PlayerCommand::LoadPreset(n) if (1..=PRESET_COUNT as u8).contains(&n) => {
            Some(format!("/preset/{}", n))
        }
        PlayerCommand::LoadPreset(_) => None,
    }
}

impl PlayerClient for RoonClient {
    async fn fetch_status(&self) -> Result<PlayerStatus, ClientError> {
        Ok(self.zone().await?.into_status())
    }

    async fn fetch_metadata(&self) -> Result<TrackMetadata, ClientError> {
        let zone = self.zone().await?;
        let art_url = zone
            .image_key()
            .map(|key| format!("{}/image/{}", self.base_url, key));
        Ok(TrackMetadata { art_url })
    }

    async fn send_command(&self, command: PlayerCommand) -> bool {
        let Some(path) = command_path(command) else {
            warn!("roon: refusing out-of-range command {}", command);
            return false;
        };
        let url = self.url(&path);
        debug!("roon: GET {}", url);
        match get_text(&self.http, &url).await {
            Ok(body) if wire::is_roon_ack(&body) => true,
            Ok(body) => {
                warn!("roon: {} not acknowledged: {}", command, body.trim());
                false
            }
            Err(e) => {
                warn!("roon: {} failed: {}", command, e);
                false
            }
        }
    }

    /// The proxy has no preset listing; configured labels apply.
    async fn fetch_preset_labels(&self) -> Result<PresetLabels, ClientError> {
        Err(ClientError::Unsupported)
    }
}
