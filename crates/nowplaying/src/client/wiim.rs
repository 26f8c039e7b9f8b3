use std::time::Duration;

use nowplaying_proto::config::{WiimConfig, WiimTransport};
use nowplaying_proto::protocol::{
    PlayerCommand, PlayerStatus, PresetLabels, TrackMetadata, PRESET_COUNT,
};
use nowplaying_proto::wire;
use tracing::{debug, warn};

use super::{build_http_client, get_text, ClientError, PlayerClient};

/// Where WiiM API requests go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WiimEndpoint {
    /// `<base>?command=...`, normally `https://<ip>/httpapi.asp`.
    Direct { base_url: String },
    /// `<base>?ip=<ip>&command=...` through an HTTP relay.
    Relay { base_url: String, device_ip: String },
}

impl WiimEndpoint {
    pub fn from_config(config: &WiimConfig) -> Self {
        match config.transport {
            WiimTransport::Direct => WiimEndpoint::Direct {
                base_url: format!("https://{}/httpapi.asp", config.ip),
            },
            WiimTransport::Relay => WiimEndpoint::Relay {
                base_url: format!("http://{}:{}/", config.relay_host, config.relay_port),
                device_ip: config.ip.clone(),
            },
        }
    }

    pub fn command_url(&self, command: &str) -> String {
        match self {
            WiimEndpoint::Direct { base_url } => format!("{}?command={}", base_url, command),
            WiimEndpoint::Relay {
                base_url,
                device_ip,
            } => format!("{}?ip={}&command={}", base_url, device_ip, command),
        }
    }
}

fn command_string(command: PlayerCommand) -> Option<String> {
    match command {
        PlayerCommand::Pause => Some("setPlayerCmd:pause".to_string()),
        PlayerCommand::Resume => Some("setPlayerCmd:resume".to_string()),
        PlayerCommand::Next => Some("setPlayerCmd:next".to_string()),
        PlayerCommand::Previous => Some("setPlayerCmd:prev".to_string()),
        PlayerCommand::LoadPreset(n) if (1..=PRESET_COUNT as u8).contains(&n) => {
            Some(format!("MCUKeyShortClick:{}", n))
        }
        PlayerCommand::LoadPreset(_) => None,
    }
}

pub struct WiimClient {
    http: reqwest::Client,
    endpoint: WiimEndpoint,
}

impl WiimClient {
    pub fn new(config: &WiimConfig, timeout: Duration) -> anyhow::Result<Self> {
        let http = build_http_client(timeout, !config.verify_tls)?;
        Ok(Self {
            http,
            endpoint: WiimEndpoint::from_config(config),
        })
    }

    pub fn with_endpoint(endpoint: WiimEndpoint, timeout: Duration) -> anyhow::Result<Self> {
        let http = build_http_client(timeout, false)?;
        Ok(Self { http, endpoint })
    }

    async fn call(&self, command: &str) -> Result<String, ClientError> {
        let url = self.endpoint.command_url(command);
        debug!("wiim: GET {}", url);
        get_text(&self.http, &url).await
    }
}

impl PlayerClient for WiimClient {
    async fn fetch_status(&self) -> Result<PlayerStatus, ClientError> {
        let body = self.call("getPlayerStatus").await?;
        wire::parse_wiim_status(&body).map_err(ClientError::malformed)
    }

    async fn fetch_metadata(&self) -> Result<TrackMetadata, ClientError> {
        let body = self.call("getMetaInfo").await?;
        wire::parse_wiim_metadata(&body).map_err(ClientError::malformed)
    }

    async fn send_command(&self, command: PlayerCommand) -> bool {
        let Some(wire_command) = command_string(command) else {
            warn!("wiim: refusing out-of-range command {}", command);
            return false;
        };
        match self.call(&wire_command).await {
            Ok(body) if wire::is_wiim_ack(&body) => true,
            Ok(body) => {
                warn!("wiim: {} not acknowledged: {:?}", command, body.trim());
                false
            }
            Err(e) => {
                warn!("wiim: {} failed: {}", command, e);
                false
            }
        }
    }

    async fn fetch_preset_labels(&self) -> Result<PresetLabels, ClientError> {
        let body = self.call("getPresetInfo").await?;
        wire::parse_wiim_presets(&body).map_err(ClientError::malformed)
    }
}
