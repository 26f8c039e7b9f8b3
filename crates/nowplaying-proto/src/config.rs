use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::platform;
use super::protocol::PresetLabels;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub wiim: WiimConfig,
    #[serde(default)]
    pub roon: RoonConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub touch: TouchConfig,
    #[serde(default)]
    pub presets: PresetsConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Which adapter talks to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Wiim,
    Roon,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub backend: Backend,
    /// Upper bound for a single request, connect included.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// How the WiiM device is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WiimTransport {
    /// `https://<ip>/httpapi.asp?command=...`
    #[default]
    Direct,
    /// `http://<relay_host>:<relay_port>/?ip=<ip>&command=...`
    Relay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WiimConfig {
    #[serde(default = "default_wiim_ip")]
    pub ip: String,
    #[serde(default)]
    pub transport: WiimTransport,
    /// WiiM devices ship self-signed certificates.
    #[serde(default)]
    pub verify_tls: bool,
    #[serde(default = "default_relay_host")]
    pub relay_host: String,
    #[serde(default = "default_relay_port")]
    pub relay_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoonConfig {
    #[serde(default = "default_roon_host")]
    pub proxy_host: String,
    #[serde(default = "default_roon_port")]
    pub proxy_port: u16,
    /// `None` lets the proxy pick its default zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
}

/// Poll cadence and failure policy. All values in milliseconds unless noted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Playing screen, controls hidden, far from the track end.
    #[serde(default = "default_slow_ms")]
    pub slow_ms: u64,
    /// Playing screen close to the track end.
    #[serde(default = "default_fast_ms")]
    pub fast_ms: u64,
    /// Playing screen with controls shown.
    #[serde(default = "default_controls_ms")]
    pub controls_ms: u64,
    /// Clock screen with controls shown.
    #[serde(default = "default_clock_controls_ms")]
    pub clock_controls_ms: u64,
    /// Clock screen, nothing shown.
    #[serde(default = "default_clock_idle_ms")]
    pub clock_idle_ms: u64,
    #[serde(default = "default_track_end_threshold_ms")]
    pub track_end_threshold_ms: u64,
    /// Sleep between cycles when no poll is due.
    #[serde(default = "default_idle_slice_ms")]
    pub idle_slice_ms: u64,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
    /// Consecutive status failures before the clock screen is forced.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Album art attempts per track before giving up.
    #[serde(default = "default_art_retry_limit")]
    pub art_retry_limit: u32,
    /// Pause after a successful command so the player can settle.
    #[serde(default = "default_command_settle_ms")]
    pub command_settle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TouchConfig {
    #[serde(default = "default_button_timeout_ms")]
    pub button_timeout_ms: u64,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    #[serde(default = "default_disabled_interval_ms")]
    pub disabled_interval_ms: u64,
}

/// Fallback labels for backends that cannot report their presets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetsConfig {
    #[serde(default = "default_preset_labels")]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_weather_location")]
    pub location: String,
    /// `metric` or `imperial`.
    #[serde(default = "default_weather_units")]
    pub units: String,
    #[serde(default = "default_weather_cache_secs")]
    pub cache_secs: u64,
    #[serde(default = "default_weather_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Fixed offset from UTC for the clock; local time when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset_minutes: Option<i32>,
    #[serde(default = "default_art_max_bytes")]
    pub art_max_bytes: usize,
    #[serde(default = "default_art_timeout_ms")]
    pub art_timeout_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for WiimConfig {
    fn default() -> Self {
        Self {
            ip: default_wiim_ip(),
            transport: WiimTransport::default(),
            verify_tls: false,
            relay_host: default_relay_host(),
            relay_port: default_relay_port(),
        }
    }
}

impl Default for RoonConfig {
    fn default() -> Self {
        Self {
            proxy_host: default_roon_host(),
            proxy_port: default_roon_port(),
            zone_id: None,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            slow_ms: default_slow_ms(),
            fast_ms: default_fast_ms(),
            controls_ms: default_controls_ms(),
            clock_controls_ms: default_clock_controls_ms(),
            clock_idle_ms: default_clock_idle_ms(),
            track_end_threshold_ms: default_track_end_threshold_ms(),
            idle_slice_ms: default_idle_slice_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            failure_threshold: default_failure_threshold(),
            art_retry_limit: default_art_retry_limit(),
            command_settle_ms: default_command_settle_ms(),
        }
    }
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            button_timeout_ms: default_button_timeout_ms(),
            sample_interval_ms: default_sample_interval_ms(),
            disabled_interval_ms: default_disabled_interval_ms(),
        }
    }
}

impl Default for PresetsConfig {
    fn default() -> Self {
        Self {
            labels: default_preset_labels(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            location: default_weather_location(),
            units: default_weather_units(),
            cache_secs: default_weather_cache_secs(),
            timeout_ms: default_weather_timeout_ms(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: None,
            art_max_bytes: default_art_max_bytes(),
            art_timeout_ms: default_art_timeout_ms(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    3000
}

fn default_wiim_ip() -> String {
    "192.168.1.50".to_string()
}

fn default_relay_host() -> String {
    "192.168.1.1".to_string()
}

fn default_relay_port() -> u16 {
    8081
}

fn default_roon_host() -> String {
    "192.168.1.100".to_string()
}

fn default_roon_port() -> u16 {
    9876
}

fn default_slow_ms() -> u64 {
    10_000
}

fn default_fast_ms() -> u64 {
    1000
}

fn default_controls_ms() -> u64 {
    2000
}

fn default_clock_controls_ms() -> u64 {
    500
}

fn default_clock_idle_ms() -> u64 {
    5000
}

fn default_track_end_threshold_ms() -> u64 {
    5000
}

fn default_idle_slice_ms() -> u64 {
    50
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_cap_ms() -> u64 {
    5000
}

fn default_failure_threshold() -> u32 {
    4
}

fn default_art_retry_limit() -> u32 {
    3
}

fn default_command_settle_ms() -> u64 {
    200
}

fn default_button_timeout_ms() -> u64 {
    5000
}

fn default_sample_interval_ms() -> u64 {
    50
}

fn default_disabled_interval_ms() -> u64 {
    500
}

fn default_preset_labels() -> Vec<String> {
    ["Jazz", "Classical", "Rock", "Chill"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_weather_location() -> String {
    "Dublin,IE".to_string()
}

fn default_weather_units() -> String {
    "metric".to_string()
}

fn default_weather_cache_secs() -> u64 {
    3600
}

fn default_weather_timeout_ms() -> u64 {
    10_000
}

fn default_art_max_bytes() -> usize {
    512 * 1024
}

fn default_art_timeout_ms() -> u64 {
    5000
}

impl PlayerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl PresetsConfig {
    /// Labels padded or truncated to the four preset slots; empty strings
    /// disable a slot.
    pub fn slot_labels(&self) -> PresetLabels {
        let mut labels: PresetLabels = Default::default();
        for (slot, label) in labels.iter_mut().zip(self.labels.iter()) {
            if !label.trim().is_empty() {
                *slot = Some(label.clone());
            }
        }
        labels
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.validate();
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Clamp values that would break the loop's guarantees: a request must
    /// finish within 2–6 s, the loss threshold stays within 3–8 failures and
    /// shown controls stay up for 5–10 s.
    pub fn validate(&mut self) {
        let timeout = self.player.request_timeout_ms.clamp(2000, 6000);
        if timeout != self.player.request_timeout_ms {
            tracing::warn!(
                "request_timeout_ms {} out of range, using {}",
                self.player.request_timeout_ms,
                timeout
            );
            self.player.request_timeout_ms = timeout;
        }

        let threshold = self.polling.failure_threshold.clamp(3, 8);
        if threshold != self.polling.failure_threshold {
            tracing::warn!(
                "failure_threshold {} out of range, using {}",
                self.polling.failure_threshold,
                threshold
            );
            self.polling.failure_threshold = threshold;
        }

        let button_timeout = self.touch.button_timeout_ms.clamp(5000, 10_000);
        if button_timeout != self.touch.button_timeout_ms {
            tracing::warn!(
                "button_timeout_ms {} out of range, using {}",
                self.touch.button_timeout_ms,
                button_timeout
            );
            self.touch.button_timeout_ms = button_timeout;
        }

        if self.polling.backoff_cap_ms < self.polling.backoff_base_ms {
            self.polling.backoff_cap_ms = self.polling.backoff_base_ms;
        }
        if self.polling.idle_slice_ms == 0 {
            self.polling.idle_slice_ms = default_idle_slice_ms();
        }
    }
}
