//! Weather line for the clock screen.
//!
//! A background task refreshes OpenWeatherMap once per cache window and
//! publishes through a `watch` channel. The session only ever reads the
//! latest value, so a slow weather API never holds up a cycle. A failed
//! refresh keeps the previous value and retries sooner.

use std::time::Duration;

use anyhow::Context;
use nowplaying_proto::config::WeatherConfig;
use serde::Deserialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const API_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const RETRY_AFTER_FAILURE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherInfo {
    /// e.g. `12°C`
    pub temperature: String,
    pub description: String,
    pub location: String,
    /// Rain volume over the last hour or three, when reported.
    pub rain: Option<String>,
}

impl WeatherInfo {
    pub fn summary(&self) -> String {
        let mut line = format!("{}  {}", self.temperature, self.description);
        if let Some(rain) = &self.rain {
            line.push_str("  ");
            line.push_str(rain);
        }
        line
    }
}

/// Read side handed to the session.
pub type WeatherFeed = watch::Receiver<Option<WeatherInfo>>;

/// A feed that never produces anything.
pub fn no_weather() -> WeatherFeed {
    let (_tx, rx) = watch::channel(None);
    rx
}

#[derive(Debug, Deserialize)]
struct OwmResponse {
    #[serde(default)]
    name: String,
    main: OwmMain,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    #[serde(default)]
    rain: Option<OwmRain>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwmRain {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
    #[serde(rename = "3h")]
    three_hours: Option<f64>,
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn parse_weather(body: &str, units: &str) -> anyhow::Result<WeatherInfo> {
    let raw: OwmResponse = serde_json::from_str(body).context("weather response")?;
    let unit = if units == "imperial" { "°F" } else { "°C" };
    let rain = raw.rain.and_then(|r| match (r.one_hour, r.three_hours) {
        (Some(mm), _) => Some(format!("{:.1} mm/1h", mm)),
        (None, Some(mm)) => Some(format!("{:.1} mm/3h", mm)),
        _ => None,
    });
    Ok(WeatherInfo {
        temperature: format!("{:.0}{}", raw.main.temp, unit),
        description: raw
            .weather
            .first()
            .map(|c| capitalize(&c.description))
            .unwrap_or_default(),
        location: raw.name,
        rain,
    })
}

pub struct OpenWeatherMap {
    http: reqwest::Client,
    url: String,
    api_key: String,
    location: String,
    units: String,
    cache_window: Duration,
}

impl OpenWeatherMap {
    pub fn new(config: &WeatherConfig) -> anyhow::Result<Self> {
        Self::with_url(config, API_URL)
    }

    pub fn with_url(config: &WeatherConfig, url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
            api_key: config.api_key.clone(),
            location: config.location.clone(),
            units: config.units.clone(),
            cache_window: Duration::from_secs(config.cache_secs.max(60)),
        })
    }

    pub async fn fetch(&self) -> anyhow::Result<WeatherInfo> {
        let response = self
            .http
            .get(&self.url)
            .query(&[
                ("q", self.location.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", self.units.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        parse_weather(&body, &self.units)
    }

    /// Refresh loop. Stops on cancel or when nobody reads the feed anymore.
    pub async fn run(self, tx: watch::Sender<Option<WeatherInfo>>, cancel: CancellationToken) {
        loop {
            let wait = match self.fetch().await {
                Ok(info) => {
                    debug!("weather: {} {}", info.location, info.summary());
                    tx.send_replace(Some(info));
                    self.cache_window
                }
                Err(e) => {
                    warn!("weather: refresh failed, keeping last value: {:#}", e);
                    self.cache_window.min(RETRY_AFTER_FAILURE)
                }
            };
            if tx.is_closed() {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }
        debug!("weather: refresh loop stopped");
    }
}

/// Start the refresh task when weather is configured.
pub fn spawn_feed(config: &WeatherConfig, cancel: CancellationToken) -> anyhow::Result<WeatherFeed> {
    if !config.enabled || config.api_key.trim().is_empty() {
        info!("weather: disabled");
        return Ok(no_weather());
    }
    let provider = OpenWeatherMap::new(config)?;
    let (tx, rx) = watch::channel(None);
    info!("weather: enabled for {}", config.location);
    tokio::spawn(provider.run(tx, cancel));
    Ok(rx)
}
