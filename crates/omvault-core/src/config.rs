// ── Runtime connection configuration ──
//
// Describes *how* to reach one appliance. Carries credentials and
// polling tuning, but never touches disk -- the config layer constructs
// a `ControllerConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// Configuration for polling a single appliance.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Appliance host, optionally with port (e.g. `nas.local` or `10.0.0.1:8080`).
    pub host: String,
    /// WebGUI account used for the RPC session.
    pub username: String,
    pub password: SecretString,
    /// Use HTTPS instead of HTTP.
    pub use_ssl: bool,
    /// Verify the TLS certificate. Ignored over plain HTTP.
    pub verify_ssl: bool,
    /// Directory holding the persisted cookie file.
    pub cookie_dir: PathBuf,
    /// Per-request transport timeout.
    pub timeout: Duration,
    /// Fast poll cycle period (filesystems, network, services...).
    pub fast_interval: Duration,
    /// Slow poll cycle period (hardware, plugin and disk inventory).
    pub slow_interval: Duration,
    /// Poll SMART attributes. Some controllers make disks spin up for
    /// them, so users can opt out.
    pub smart_enabled: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: "10.0.0.1".into(),
            username: "admin".into(),
            password: SecretString::from(String::new()),
            use_ssl: false,
            verify_ssl: true,
            cookie_dir: PathBuf::from("."),
            timeout: Duration::from_secs(30),
            fast_interval: Duration::from_secs(60),
            slow_interval: Duration::from_secs(3600),
            smart_enabled: true,
        }
    }
}
