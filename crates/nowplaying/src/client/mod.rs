//! Player backends.
//!
//! Every request builds on a client with no idle pool, so each call opens
//! and closes its own connection and nothing leaks across cycles. Command
//! sends collapse every failure into `false`; status and metadata fetches
//! report a [`ClientError`] that the session only logs and counts.

mod roon;
mod wiim;

pub use roon::RoonClient;
pub use wiim::{WiimClient, WiimEndpoint};

use std::time::Duration;

use nowplaying_proto::config::{Backend, Config};
use nowplaying_proto::protocol::{PlayerCommand, PlayerStatus, PresetLabels, TrackMetadata};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("not supported by this backend")]
    Unsupported,
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() {
            ClientError::Connect(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::Status(status.as_u16())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl ClientError {
    pub(crate) fn malformed(err: impl std::fmt::Display) -> Self {
        ClientError::Malformed(err.to_string())
    }
}

/// One remote player. Every call completes within the configured request
/// timeout.
#[allow(async_fn_in_trait)]
pub trait PlayerClient {
    async fn fetch_status(&self) -> Result<PlayerStatus, ClientError>;

    async fn fetch_metadata(&self) -> Result<TrackMetadata, ClientError>;

    /// `true` only when the player acknowledged the command.
    async fn send_command(&self, command: PlayerCommand) -> bool;

    async fn fetch_preset_labels(&self) -> Result<PresetLabels, ClientError>;
}

/// Backend chosen from config at startup.
pub enum AnyPlayerClient {
    Wiim(WiimClient),
    Roon(RoonClient),
}

impl AnyPlayerClient {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let timeout = config.player.request_timeout();
        match config.player.backend {
            Backend::Wiim => {
                info!(
                    "player: WiiM at {} ({:?})",
                    config.wiim.ip, config.wiim.transport
                );
                Ok(AnyPlayerClient::Wiim(WiimClient::new(&config.wiim, timeout)?))
            }
            Backend::Roon => {
                info!(
                    "player: Roon proxy at {}:{}",
                    config.roon.proxy_host, config.roon.proxy_port
                );
                Ok(AnyPlayerClient::Roon(RoonClient::new(&config.roon, timeout)?))
            }
        }
    }
}

impl PlayerClient for AnyPlayerClient {
    async fn fetch_status(&self) -> Result<PlayerStatus, ClientError> {
        match self {
            AnyPlayerClient::Wiim(c) => c.fetch_status().await,
            AnyPlayerClient::Roon(c) => c.fetch_status().await,
        }
    }

    async fn fetch_metadata(&self) -> Result<TrackMetadata, ClientError> {
        match self {
            AnyPlayerClient::Wiim(c) => c.fetch_metadata().await,
            AnyPlayerClient::Roon(c) => c.fetch_metadata().await,
        }
    }

    async fn send_command(&self, command: PlayerCommand) -> bool {
        match self {
            AnyPlayerClient::Wiim(c) => c.send_command(command).await,
            AnyPlayerClient::Roon(c) => c.send_command(command).await,
        }
    }

    async fn fetch_preset_labels(&self) -> Result<PresetLabels, ClientError> {
        match self {
            AnyPlayerClient::Wiim(c) => c.fetch_preset_labels().await,
            AnyPlayerClient::Roon(c) => c.fetch_preset_labels().await,
        }
    }
}

pub(crate) fn build_http_client(
    timeout: Duration,
    accept_invalid_certs: bool,
) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .pool_max_idle_per_host(0)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .user_agent(concat!("nowplaying/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// GET `url` and return the body of a 2xx response.
pub(crate) async fn get_text(http: &reqwest::Client, url: &str) -> Result<String, ClientError> {
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Status(status.as_u16()));
    }
    Ok(response.text().await?)
}
