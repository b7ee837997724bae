use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "swapmeet.toml",
    "config/swapmeet.toml",
    "crates/config/swapmeet.toml",
    "../swapmeet.toml",
    "../config/swapmeet.toml",
    "../crates/config/swapmeet.toml",
    "backend/swapmeet.toml",
    "backend/config/swapmeet.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://swapmeet.db".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "AuthConfig::default_session_ttl")]
    pub session_ttl_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: 86_400,
        }
    }
}

impl AuthConfig {
    fn default_session_ttl() -> u64 {
        86_400
    }
}

/// Tuning for the real-time layer.
///
/// ```
/// use swapmeet_config::RealtimeConfig;
///
/// let realtime = RealtimeConfig::default();
/// assert_eq!(realtime.channel_capacity, 100);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Outbound event buffer per connection. A receiver that falls this far
    /// behind starts dropping events rather than stalling the sender.
    #[serde(default = "RealtimeConfig::default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: Self::default_channel_capacity(),
        }
    }
}

impl RealtimeConfig {
    const fn default_channel_capacity() -> usize {
        100
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use swapmeet_config::load;
///
/// std::env::remove_var("SWAPMEET_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let session_ttl = defaults.auth.session_ttl_seconds;
    let session_ttl_i64 = if session_ttl > i64::MAX as u64 {
        i64::MAX
    } else {
        session_ttl as i64
    };

    let mut builder = config::Config::builder();
    builder = builder
        .set_default("http.address", defaults.http.address.clone())
        .unwrap()
        .set_default("http.port", i64::from(defaults.http.port))
        .unwrap()
        .set_default("database.url", defaults.database.url.clone())
        .unwrap()
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )
        .unwrap()
        .set_default("auth.session_ttl_seconds", session_ttl_i64)
        .unwrap()
        .set_default(
            "realtime.channel_capacity",
            i64::try_from(defaults.realtime.channel_capacity).unwrap_or(i64::MAX),
        )
        .unwrap();

    let environment_overrides = config::Environment::with_prefix("SWAPMEET").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("SWAPMEET_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via SWAPMEET_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.auth.session_ttl_seconds > i64::MAX as u64 {
        config.auth.session_ttl_seconds = i64::MAX as u64;
    }

    debug!(?config, "loaded backend configuration");
    Ok(config)
}
