// Session-managed RPC client.
//
// Owns a single authenticated HTTP session to one appliance. Login is
// cookie-based and can silently expire server-side; rather than probing
// session validity, the client queries optimistically and re-authenticates
// exactly once when the server answers with its "session is gone"
// signatures. All network I/O -- login and query alike -- is serialized
// through one async mutex, so at most one request is in flight per client.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use reqwest::cookie::Jar;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, error, warn};
use url::Url;

use crate::cookies;
use crate::error::{Error, ErrorKind};
use crate::rpc::{self, RpcRequest, RpcResponse};
use crate::transport::{TlsMode, TransportConfig};

/// Minimum seconds between reconnect attempts after a failed login, so a
/// down or misconfigured host isn't hammered on every poll tick.
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(58);

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Mutable client state. Guarded by a std mutex; never held across awaits.
#[derive(Default)]
struct ClientState {
    connected: bool,
    /// One-shot edge flag, set on every successful login and cleared by
    /// [`OmvClient::has_reconnected`].
    reconnected: bool,
    /// Timestamp of the last connect attempt, success or not.
    last_attempt: Option<Instant>,
    /// Classification of the last connect failure.
    error: Option<ErrorKind>,
    /// Log-throttle latch: one error line per outage, not one per tick.
    error_reported: bool,
}

/// RPC client for one appliance.
pub struct OmvClient {
    endpoint: Url,
    host: String,
    username: String,
    password: SecretString,
    tls: TlsMode,
    timeout: Duration,
    cookie_file: PathBuf,
    retry_interval: Duration,

    /// Serializes every HTTP request to the appliance.
    io_lock: tokio::sync::Mutex<()>,
    /// Current HTTP session; rebuilt from scratch on every connect.
    session: RwLock<Option<reqwest::Client>>,
    state: Mutex<ClientState>,
}

impl OmvClient {
    /// Create a client for `host`. No network I/O happens until
    /// [`connect`](Self::connect) or the first [`query`](Self::query).
    ///
    /// `cookie_dir` is the directory holding the persisted cookie file;
    /// one file per client instance.
    pub fn new(
        host: &str,
        username: &str,
        password: SecretString,
        use_ssl: bool,
        verify_ssl: bool,
        cookie_dir: &Path,
    ) -> Result<Self, Error> {
        let scheme = if use_ssl { "https" } else { "http" };
        let endpoint = Url::parse(&format!("{scheme}://{host}{}", rpc::RPC_PATH))?;

        // The verify flag only means something over TLS.
        let tls = if use_ssl && !verify_ssl {
            TlsMode::DangerAcceptInvalid
        } else {
            TlsMode::System
        };

        Ok(Self {
            endpoint,
            host: host.to_owned(),
            username: username.to_owned(),
            password,
            tls,
            timeout: DEFAULT_TIMEOUT,
            cookie_file: cookie_dir.join(cookies::COOKIE_FILE_NAME),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            io_lock: tokio::sync::Mutex::new(()),
            session: RwLock::new(None),
            state: Mutex::new(ClientState::default()),
        })
    }

    /// Override the reconnect backoff interval.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Override the per-request transport timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The appliance host this client talks to.
    pub fn host(&self) -> &str {
        &self.host
    }

    // ── State reads ──────────────────────────────────────────────────

    /// Pure state read, no side effect.
    pub fn connected(&self) -> bool {
        self.state().connected
    }

    /// Classification of the last connect failure, if any.
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.state().error
    }

    /// One-shot edge detector: `true` exactly once after a successful
    /// reconnect, then resets. Lets the poller refresh slow-changing
    /// resources immediately after an outage instead of waiting for the
    /// next scheduled slow cycle.
    pub fn has_reconnected(&self) -> bool {
        let mut st = self.state();
        if st.reconnected {
            st.reconnected = false;
            true
        } else {
            false
        }
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Establish a fresh authenticated session.
    ///
    /// Any prior session is discarded. Persisted cookies are preloaded
    /// into the new jar before login so an un-expired remote session can
    /// continue. The attempt timestamp is updated whatever the outcome;
    /// backoff gating in [`connection_check`](Self::connection_check)
    /// keys off it.
    pub async fn connect(&self) -> bool {
        {
            let mut st = self.state();
            st.connected = false;
            st.error = None;
            st.last_attempt = Some(Instant::now());
        }

        let jar = Arc::new(Jar::default());
        if let Some(saved) = cookies::load(&self.cookie_file) {
            debug!(host = %self.host, "resuming persisted session cookies");
            cookies::apply_to_jar(&saved, &jar, &self.endpoint);
        }

        let transport = TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
            cookie_jar: Some(Arc::clone(&jar)),
        };
        let client = match transport.build_client() {
            Ok(client) => client,
            Err(e) => {
                self.record_connect_failure(&e);
                return false;
            }
        };

        let outcome = {
            let _io = self.io_lock.lock().await;
            self.login(&client).await
        };

        match outcome {
            Ok(()) => {
                *self.session_mut() = Some(client);
                {
                    let mut st = self.state();
                    st.connected = true;
                    st.reconnected = true;
                    if st.error_reported {
                        st.error_reported = false;
                        warn!(host = %self.host, "reconnected");
                    } else {
                        debug!(host = %self.host, "connected");
                    }
                }
                let persisted = cookies::from_jar(&jar, &self.endpoint);
                if let Err(e) = cookies::save(&self.cookie_file, &persisted) {
                    warn!(host = %self.host, error = %e, "failed to persist session cookies");
                }
                true
            }
            Err(e) => {
                *self.session_mut() = None;
                self.record_connect_failure(&e);
                false
            }
        }
    }

    /// Connected fast-path, or one gated reconnect attempt.
    ///
    /// Returns `false` without touching the network while the backoff
    /// window since the last attempt is still open.
    pub async fn connection_check(&self) -> bool {
        {
            let st = self.state();
            if st.connected {
                return true;
            }
            if let Some(last) = st.last_attempt {
                if last.elapsed() < self.retry_interval {
                    return false;
                }
            }
        }

        self.connect().await
    }

    /// Drop the session without a farewell to the server.
    pub fn disconnect(&self) {
        {
            let mut st = self.state();
            st.connected = false;
            st.reconnected = false;
            st.last_attempt = None;
        }
        *self.session_mut() = None;
        debug!(host = %self.host, "session dropped");
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Call `service.method` with the default options.
    pub async fn query(&self, service: &str, method: &str, params: Value) -> Option<Value> {
        self.query_with_options(service, method, params, rpc::default_options())
            .await
    }

    /// Call `service.method`, returning the `response` payload.
    ///
    /// `None` means: not connected (and backoff still open), transport
    /// failure, malformed body, or an RPC error. A session-expiry error
    /// triggers exactly one silent reconnect-and-retry of the same call.
    pub async fn query_with_options(
        &self,
        service: &str,
        method: &str,
        params: Value,
        options: Value,
    ) -> Option<Value> {
        let mut retried = false;

        loop {
            if !self.connection_check().await {
                return None;
            }
            let Some(client) = self.http_client() else {
                return None;
            };

            let params = if params.is_null() {
                json!({})
            } else {
                params.clone()
            };
            let request = RpcRequest::new(service, method, params, options.clone());

            let outcome = {
                let _io = self.io_lock.lock().await;
                self.post_envelope(&client, &request).await
            };

            let envelope = match outcome {
                Ok(envelope) => envelope,
                Err(e) => {
                    // Dropped connection and unparseable body take the
                    // same path: tear down and let the next tick retry.
                    self.teardown("query", &e);
                    return None;
                }
            };

            match envelope.error {
                None => {
                    self.state().error = None;
                    return Some(envelope.response);
                }
                Some(err) if err.is_session_expired() && !retried => {
                    debug!(host = %self.host, "session expired, re-authenticating");
                    retried = true;
                    if self.connect().await {
                        continue;
                    }
                    return None;
                }
                Some(err) => {
                    warn!(
                        host = %self.host,
                        service,
                        method,
                        code = err.code,
                        message = %err.message,
                        "rpc call failed"
                    );
                    return None;
                }
            }
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn login(&self, client: &reqwest::Client) -> Result<(), Error> {
        let request = RpcRequest::login(&self.username, self.password.expose_secret());
        let envelope = self.post_envelope(client, &request).await?;

        if let Some(err) = envelope.error {
            return Err(Error::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        if envelope.response.get("authenticated").and_then(Value::as_bool) != Some(true) {
            return Err(Error::Authentication {
                message: "appliance reported authenticated: false".into(),
            });
        }

        Ok(())
    }

    async fn post_envelope(
        &self,
        client: &reqwest::Client,
        request: &RpcRequest<'_>,
    ) -> Result<RpcResponse, Error> {
        debug!(
            host = %self.host,
            service = request.service,
            method = request.method,
            "rpc request"
        );

        let response = client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(Error::Transport)?
            .error_for_status()
            .map_err(Error::Transport)?;

        let body = response.text().await.map_err(Error::Transport)?;
        serde_json::from_str::<RpcResponse>(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// Record a failed connect: classify, log once per outage.
    fn record_connect_failure(&self, err: &Error) {
        let kind = ErrorKind::from(err);
        let mut st = self.state();
        st.connected = false;
        st.error = Some(kind);
        if !st.error_reported {
            error!(host = %self.host, error = %err, code = %kind, "unable to connect");
            st.error_reported = true;
        }
    }

    /// Tear the session down after a mid-query failure. Clearing the
    /// attempt timestamp lets the very next tick reconnect without
    /// waiting out the backoff window.
    fn teardown(&self, location: &str, err: &Error) {
        {
            let mut st = self.state();
            if !st.error_reported {
                error!(host = %self.host, location, error = %err, "connection closed");
                st.error_reported = true;
            }
            st.error = Some(ErrorKind::from(err));
            st.connected = false;
            st.reconnected = false;
            st.last_attempt = None;
        }
        *self.session_mut() = None;
    }

    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().expect("client state lock poisoned")
    }

    fn http_client(&self) -> Option<reqwest::Client> {
        self.session
            .read()
            .expect("session lock poisoned")
            .clone()
    }

    fn session_mut(&self) -> std::sync::RwLockWriteGuard<'_, Option<reqwest::Client>> {
        self.session.write().expect("session lock poisoned")
    }
}

impl std::fmt::Debug for OmvClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OmvClient")
            .field("host", &self.host)
            .field("endpoint", &self.endpoint.as_str())
            .field("connected", &self.connected())
            .finish_non_exhaustive()
    }
}
