use clap::Parser;
use lib_realtime::RealtimeConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "notify_client.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Internship marketplace real-time notification client", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "NOTIFY_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "NOTIFY_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "NOTIFY_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "NOTIFY_SOCKET_URL", help = "WebSocket endpoint of the real-time server.")]
    pub socket_url: Option<String>,

    #[clap(long, env = "NOTIFY_API_URL", help = "Base URL of the REST API.")]
    pub api_base_url: Option<String>,

    #[clap(long, env = "NOTIFY_SESSION_PATH", help = "Session file holding the signed-in credential.")]
    pub session_path: Option<PathBuf>,

    #[clap(long, env = "NOTIFY_TOKEN", hide_env_values = true, help = "Bearer token; takes precedence over the session file.")]
    #[serde(skip_serializing)]
    pub token: Option<String>,

    #[clap(long, env = "NOTIFY_CONNECT_TIMEOUT_MS", help = "Milliseconds a connection attempt may take before it counts as failed.")]
    pub connect_timeout_ms: Option<u64>,

    #[clap(long, env = "NOTIFY_MAX_RECONNECT_ATTEMPTS", help = "Reconnection attempts after a network drop before giving up.")]
    pub max_reconnect_attempts: Option<u32>,

    #[clap(long, env = "NOTIFY_RECONNECT_BASE_DELAY_MS", help = "Base delay in milliseconds between reconnection attempts.")]
    pub reconnect_base_delay_ms: Option<u64>,

    #[clap(long, env = "NOTIFY_RECONNECT_MAX_DELAY_MS", help = "Maximum delay in milliseconds between reconnection attempts.")]
    pub reconnect_max_delay_ms: Option<u64>,

    #[clap(long, env = "NOTIFY_POLL_INTERVAL_SECONDS", help = "Seconds between notification pulls.")]
    pub poll_interval_secs: Option<u64>,

    #[clap(long, env = "NOTIFY_PAGE_SIZE", help = "Notifications per page.")]
    pub page_size: Option<u32>,

    #[clap(long, env = "NOTIFY_LOSSLESS_EVENTS", value_delimiter = ',', help = "Outbound events queued individually while offline.")]
    pub lossless_events: Option<Vec<String>>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            socket_url: other.socket_url.or(self.socket_url),
            api_base_url: other.api_base_url.or(self.api_base_url),
            session_path: other.session_path.or(self.session_path),
            token: other.token.or(self.token),
            connect_timeout_ms: other.connect_timeout_ms.or(self.connect_timeout_ms),
            max_reconnect_attempts: other.max_reconnect_attempts.or(self.max_reconnect_attempts),
            reconnect_base_delay_ms: other.reconnect_base_delay_ms.or(self.reconnect_base_delay_ms),
            reconnect_max_delay_ms: other.reconnect_max_delay_ms.or(self.reconnect_max_delay_ms),
            poll_interval_secs: other.poll_interval_secs.or(self.poll_interval_secs),
            page_size: other.page_size.or(self.page_size),
            lossless_events: other.lossless_events.or(self.lossless_events),
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    /// Library configuration: library defaults, overridden by whatever was set here.
    pub fn to_realtime(&self) -> RealtimeConfig {
        let mut realtime = RealtimeConfig::default();
        if let Some(url) = &self.socket_url {
            realtime.socket_url = url.clone();
        }
        if let Some(url) = &self.api_base_url {
            realtime.api_base_url = url.clone();
        }
        if let Some(ms) = self.connect_timeout_ms {
            realtime.connect_timeout_ms = ms;
        }
        if let Some(attempts) = self.max_reconnect_attempts {
            realtime.max_reconnect_attempts = attempts;
        }
        if let Some(ms) = self.reconnect_base_delay_ms {
            realtime.reconnect_base_delay_ms = ms;
        }
        if let Some(ms) = self.reconnect_max_delay_ms {
            realtime.reconnect_max_delay_ms = ms;
        }
        if let Some(secs) = self.poll_interval_secs {
            realtime.poll_interval_secs = secs;
        }
        if let Some(size) = self.page_size {
            realtime.page_size = size;
        }
        if let Some(events) = &self.lossless_events {
            realtime.lossless_events = events.clone();
        }
        realtime
    }
}

fn defaults() -> Config {
    Config {
        log_dir: Some(PathBuf::from("./logs")),
        log_level: Some("info".to_string()),
        ..Default::default()
    }
}

/// Reads a JSON config file. Problems are reported on stderr because logging
/// is not set up yet.
fn read_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        return None;
    }
    let config_str = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read config file {}: {}. Falling back to other sources.", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str::<Config>(&config_str) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Failed to parse config file {}: {}. Falling back to other sources.", path.display(), e);
            None
        }
    }
}

/// Defaults, then the JSON file, then environment and CLI (clap resolves both).
pub fn resolve(cli: Config) -> Config {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current_config = defaults();
    if let Some(file_config) = read_file(&config_file_path) {
        current_config = current_config.merge(file_config);
    }
    current_config.merge(cli)
}

pub fn load_config() -> Config {
    resolve(Config::parse())
}
