//! Environment configuration.
//!
//!   MEDIAGATE_PORT          - Listen port (default: 8080)
//!   MEDIAGATE_BIND          - Listen address (default: 0.0.0.0)
//!   MEDIAGATE_CERT          - Server certificate PEM (default: ./127.0.0.1.crt)
//!   MEDIAGATE_KEY           - Server RSA private key PEM (default: ./privkey.pem)
//!   MEDIAGATE_CATALOG       - Catalog manifest JSON (default: ./catalog.json)
//!   MEDIAGATE_CATALOG_DIR   - Directory holding media files (default: ./catalog)
//!   MEDIAGATE_REQUIRE_AUTH  - "false" lets unauthenticated sessions list/download (default: true)
//!   MEDIAGATE_SWEEP_SECS    - Expired-session sweep interval, 0 disables (default: 300)
//!   MEDIAGATE_LOG_FORMAT    - "json" for structured logging, "pretty" for dev

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

impl LogFormat {
    /// Reads only `MEDIAGATE_LOG_FORMAT`, so logging can be set up before the
    /// rest of the configuration is parsed.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Falls back to pretty output silently; [`ServerConfig::from_lookup`]
    /// reports the bad value once a subscriber is installed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        lookup("MEDIAGATE_LOG_FORMAT")
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(Self::Pretty)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub bind: String,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub catalog_path: PathBuf,
    pub catalog_dir: PathBuf,
    pub require_auth: bool,
    pub sweep_interval: Option<Duration>,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind: "0.0.0.0".into(),
            cert_path: "./127.0.0.1.crt".into(),
            key_path: "./privkey.pem".into(),
            catalog_path: "./catalog.json".into(),
            catalog_dir: "./catalog".into(),
            require_auth: true,
            sweep_interval: Some(Duration::from_secs(300)),
            log_format: LogFormat::Pretty,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Unparsable values keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |name: &str| -> Option<String> { lookup(name).filter(|v| !v.is_empty()) };

        let sweep_secs: u64 = parse_or(&parsed, "MEDIAGATE_SWEEP_SECS", 300);

        Self {
            port: parse_or(&parsed, "MEDIAGATE_PORT", defaults.port),
            bind: parsed("MEDIAGATE_BIND").unwrap_or(defaults.bind),
            cert_path: parsed("MEDIAGATE_CERT").map_or(defaults.cert_path, PathBuf::from),
            key_path: parsed("MEDIAGATE_KEY").map_or(defaults.key_path, PathBuf::from),
            catalog_path: parsed("MEDIAGATE_CATALOG").map_or(defaults.catalog_path, PathBuf::from),
            catalog_dir: parsed("MEDIAGATE_CATALOG_DIR")
                .map_or(defaults.catalog_dir, PathBuf::from),
            require_auth: parse_or(&parsed, "MEDIAGATE_REQUIRE_AUTH", defaults.require_auth),
            sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
            log_format: parse_or(&parsed, "MEDIAGATE_LOG_FORMAT", defaults.log_format),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
    match lookup(name) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(variable = name, value = %raw, "invalid value, using default");
            default
        }),
    }
}
