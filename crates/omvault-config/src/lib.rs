//! Shared configuration for omvault consumers.
//!
//! TOML profiles, credential resolution (keyring + env + plaintext),
//! and translation to `omvault_core::ControllerConfig`. The core crate
//! never reads config files; whatever embeds it loads a profile here
//! and hands the result in.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use omvault_core::ControllerConfig;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("unknown profile '{profile}'")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named appliance profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Fast poll cycle period in seconds.
    #[serde(default = "default_fast_interval")]
    pub fast_interval: u64,

    #[serde(default = "default_smart")]
    pub smart: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            fast_interval: default_fast_interval(),
            smart: default_smart(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_fast_interval() -> u64 {
    60
}
fn default_smart() -> bool {
    true
}

/// A named appliance profile.
#[derive(Debug, Deserialize, Serialize)]
pub struct Profile {
    /// Appliance host, optionally with port (e.g. "nas.local").
    pub host: String,

    /// Use HTTPS.
    #[serde(default)]
    pub ssl: bool,

    /// Verify the TLS certificate. Self-signed appliance certs need this off.
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,

    /// WebGUI account.
    #[serde(default = "default_username")]
    pub username: String,

    /// Password in plaintext — prefer keyring or env var.
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Override request timeout (seconds).
    pub timeout: Option<u64>,

    /// Override fast poll cycle period (seconds).
    pub fast_interval: Option<u64>,

    /// Override SMART polling.
    pub smart: Option<bool>,
}

fn default_verify_ssl() -> bool {
    true
}
fn default_username() -> String {
    "admin".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "omvault", "omvault").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Per-profile state directory (persisted session cookies).
pub fn profile_state_dir(profile_name: &str) -> PathBuf {
    ProjectDirs::from("com", "omvault", "omvault").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push(profile_name);
            p
        },
        |dirs| dirs.data_local_dir().join(profile_name),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("omvault");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = config_path();

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("OMV_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a profile's password from the credential chain.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Well-known env var
    if let Ok(val) = std::env::var("OMV_PASSWORD") {
        return Ok(SecretString::from(val));
    }

    // 3. System keyring
    if let Ok(entry) = keyring::Entry::new("omvault", &format!("{profile_name}/password")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Build a `ControllerConfig` from a named profile.
pub fn profile_to_controller_config(
    config: &Config,
    profile_name: &str,
) -> Result<ControllerConfig, ConfigError> {
    let profile = config
        .profiles
        .get(profile_name)
        .ok_or_else(|| ConfigError::UnknownProfile {
            profile: profile_name.into(),
        })?;

    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }

    let password = resolve_password(profile, profile_name)?;
    let timeout = profile.timeout.unwrap_or(config.defaults.timeout);
    let fast_interval = profile.fast_interval.unwrap_or(config.defaults.fast_interval);

    Ok(ControllerConfig {
        host: profile.host.clone(),
        username: profile.username.clone(),
        password,
        use_ssl: profile.ssl,
        verify_ssl: profile.verify_ssl,
        cookie_dir: profile_state_dir(profile_name),
        timeout: Duration::from_secs(timeout),
        fast_interval: Duration::from_secs(fast_interval),
        smart_enabled: profile.smart.unwrap_or(config.defaults.smart),
        ..ControllerConfig::default()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn profile(host: &str) -> Profile {
        Profile {
            host: host.into(),
            ssl: false,
            verify_ssl: true,
            username: "admin".into(),
            password: Some("hunter2".into()),
            password_env: None,
            timeout: None,
            fast_interval: Some(120),
            smart: Some(false),
        }
    }

    #[test]
    fn profile_overrides_defaults() {
        let mut config = Config::default();
        config.profiles.insert("nas".into(), profile("nas.local"));

        let cc = profile_to_controller_config(&config, "nas").unwrap();
        assert_eq!(cc.host, "nas.local");
        assert_eq!(cc.timeout, Duration::from_secs(30));
        assert_eq!(cc.fast_interval, Duration::from_secs(120));
        assert!(!cc.smart_enabled);
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let config = Config::default();
        let result = profile_to_controller_config(&config, "nope");
        assert!(matches!(result, Err(ConfigError::UnknownProfile { .. })));
    }

    #[test]
    fn empty_host_is_rejected() {
        let mut config = Config::default();
        config.profiles.insert("bad".into(), profile("  "));

        let result = profile_to_controller_config(&config, "bad");
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn plaintext_password_resolves_last() {
        let p = profile("nas.local");
        let secret = resolve_password(&p, "nas").unwrap();
        assert_eq!(secrecy::ExposeSecret::expose_secret(&secret), "hunter2");
    }

    #[test]
    fn missing_credentials_is_an_error() {
        let mut p = profile("nas.local");
        p.password = None;
        let result = resolve_password(&p, "nas");
        assert!(matches!(result, Err(ConfigError::NoCredentials { .. })));
    }
}
