use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub client: Client,
    pub http: Http,
    pub log: Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Auth {
    pub backend: String, // "mock"
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Client {
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_refresh_timeout_ms")]
    pub refresh_timeout_ms: u64,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    /// Logs request and response bodies at debug level.
    #[serde(default)]
    pub debug: bool,
    pub token_store: TokenStore,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenStore {
    pub backend: String, // "memory" or "file"
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Http {
    pub address: String,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub filter: String,
}

fn default_access_ttl_secs() -> u64 {
    5 * 60
}

fn default_refresh_ttl_secs() -> u64 {
    60 * 60
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_refresh_timeout_ms() -> u64 {
    10_000
}

fn default_refresh_path() -> String {
    "/api/auth/refresh".to_string()
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

const ENV_PREFIX: &str = "TOKENWARD";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
