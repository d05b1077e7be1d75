// rivet-common/src/config.rs
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::UserDirs;
use tracing::debug;

use super::credentials::CredentialEntry;
use super::error::{Result, RivetError};

// Fallback used when RIVET_HOME is unset and no home directory can be determined.
const DEFAULT_FALLBACK_RIVET_HOME: &str = "/tmp/rivet";
const SETTINGS_FILENAME: &str = "settings.toml";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Proxy host and the two named proxy-credential values.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProxySettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ProxySettings {
    /// Proxy username as configured, or `None` when it is blank.
    pub fn effective_user(&self) -> Option<&str> {
        self.user.as_deref().filter(|u| !u.trim().is_empty())
    }
}

impl fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub rivet_home: PathBuf,
    pub settings_path: PathBuf,
    pub proxy: ProxySettings,
    pub http_timeout: Duration,
    pub validate: bool,
    pub credentials: Vec<CredentialEntry>,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading rivet configuration");
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let rivet_home = var("RIVET_HOME").map(PathBuf::from).unwrap_or_else(|| {
            let home = UserDirs::new()
                .map(|ud| ud.home_dir().join(".rivet"))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FALLBACK_RIVET_HOME));
            debug!(
                "RIVET_HOME not set or empty, falling back to default: {}",
                home.display()
            );
            home
        });
        debug!("Effective RIVET_HOME set to: {}", rivet_home.display());

        let settings_path = var("RIVET_SETTINGS")
            .map(PathBuf::from)
            .unwrap_or_else(|| rivet_home.join(SETTINGS_FILENAME));

        let port = match var("RIVET_HTTP_PROXY_PORT") {
            Some(raw) => Some(raw.trim().parse::<u16>().map_err(|e| {
                RivetError::Config(format!("Invalid RIVET_HTTP_PROXY_PORT '{raw}': {e}"))
            })?),
            None => None,
        };
        let proxy = ProxySettings {
            host: var("RIVET_HTTP_PROXY_HOST"),
            port,
            user: var("RIVET_HTTP_PROXY_USER"),
            password: lookup("RIVET_HTTP_PROXY_PASSWORD"),
        };

        let http_timeout = match var("RIVET_HTTP_TIMEOUT") {
            Some(raw) => humantime::parse_duration(raw.trim()).map_err(|e| {
                RivetError::Config(format!("Invalid RIVET_HTTP_TIMEOUT '{raw}': {e}"))
            })?,
            None => DEFAULT_HTTP_TIMEOUT,
        };

        let validate = match var("RIVET_VALIDATE") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                RivetError::Config(format!("Invalid RIVET_VALIDATE '{raw}': expected true/false"))
            })?,
            None => true,
        };

        let credentials = match var("RIVET_CREDENTIALS") {
            Some(raw) => serde_json::from_str::<Vec<CredentialEntry>>(&raw)?,
            None => Vec::new(),
        };

        debug!("Configuration loaded successfully.");
        Ok(Self {
            rivet_home,
            settings_path,
            proxy,
            http_timeout,
            validate,
            credentials,
        })
    }

    pub fn rivet_home(&self) -> &Path {
        &self.rivet_home
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    pub fn proxy_settings(&self) -> &ProxySettings {
        &self.proxy
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.rivet_home.join("cache")
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn load_config() -> Result<Config> {
    Config::load()
}
