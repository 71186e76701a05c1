use crate::registry::RegistryOptions;
use shared::models::StudyRoomClientConfigDto;
use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};
use tracing::warn;

const DEFAULT_LISTEN_PORT: u16 = 8080;
const DEFAULT_PUBLIC_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_UNIQUE_TITLES: bool = true;
const DEFAULT_DURATION_SECS: u64 = 25 * 60;
const DEFAULT_MAX_DURATION_SECS: u64 = 24 * 60 * 60;
const DEFAULT_IDLE_TTL_SECS: u64 = 0;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 0;
const DEFAULT_ROOM_POLL_SECS: u64 = 1;
const DEFAULT_LIST_POLL_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct StudyRoomConfig {
    pub listen_addr: SocketAddr,
    pub public_base_url: String,
    pub unique_titles: bool,
    pub default_duration: Duration,
    pub max_duration: Duration,
    /// Zero disables idle expiry.
    pub idle_ttl: Duration,
    /// Zero disables the background sweep.
    pub sweep_interval: Duration,
    pub room_poll_interval: Duration,
    pub list_poll_interval: Duration,
}

impl StudyRoomConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::from_lookup(|key| env::var(key).ok()))
    }

    /// Builds the config from an arbitrary key lookup. Unparseable values
    /// fall back to their defaults; a default duration above the maximum is
    /// lowered to the maximum.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secs = |key: &str, default: u64| {
            lookup(key)
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or_else(|| Duration::from_secs(default))
        };

        let listen_port = lookup("STUDYROOM_PORT")
            .and_then(|raw| raw.parse::<u16>().ok())
            .unwrap_or(DEFAULT_LISTEN_PORT);

        let listen_addr = lookup("STUDYROOM_ADDR")
            .and_then(|raw| raw.parse::<IpAddr>().ok())
            .map(|ip| SocketAddr::new(ip, listen_port))
            .unwrap_or(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), listen_port));

        let public_base_url =
            lookup("STUDYROOM_PUBLIC_URL").unwrap_or_else(|| DEFAULT_PUBLIC_URL.to_string());

        let unique_titles = lookup("STUDYROOM_UNIQUE_TITLES")
            .and_then(|raw| parse_bool(&raw))
            .unwrap_or(DEFAULT_UNIQUE_TITLES);

        let max_duration = secs("STUDYROOM_MAX_DURATION_SECS", DEFAULT_MAX_DURATION_SECS);
        let mut default_duration =
            secs("STUDYROOM_DEFAULT_DURATION_SECS", DEFAULT_DURATION_SECS);
        if default_duration > max_duration {
            warn!(?default_duration, ?max_duration, "default duration above maximum, clamping");
            default_duration = max_duration;
        }

        Self {
            listen_addr,
            public_base_url,
            unique_titles,
            default_duration,
            max_duration,
            idle_ttl: secs("STUDYROOM_IDLE_TTL_SECS", DEFAULT_IDLE_TTL_SECS),
            sweep_interval: secs("STUDYROOM_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS),
            room_poll_interval: secs("STUDYROOM_ROOM_POLL_SECS", DEFAULT_ROOM_POLL_SECS),
            list_poll_interval: secs("STUDYROOM_LIST_POLL_SECS", DEFAULT_LIST_POLL_SECS),
        }
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            unique_titles: self.unique_titles,
            default_duration_secs: self.default_duration.as_secs(),
            max_duration_secs: self.max_duration.as_secs(),
            idle_ttl: (!self.idle_ttl.is_zero()).then_some(self.idle_ttl),
        }
    }

    pub fn client_config(&self) -> StudyRoomClientConfigDto {
        StudyRoomClientConfigDto::new(
            &self.public_base_url,
            self.room_poll_interval,
            self.list_poll_interval,
        )
    }
}

impl Default for StudyRoomConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
