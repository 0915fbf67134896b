// ── Controller / poller ──
//
// Orchestrates periodic fetch cycles across every resource kind,
// merging normalized results into the shared snapshot and publishing
// one change notification per cycle. Two timers drive it: a fast cycle
// for volatile data and a slow one for hardware, plugin, and disk
// inventory. A reconnect after an outage refreshes the slow baselines
// immediately instead of waiting out the slow timer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{Value, json};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use omvault_api::{ErrorKind, OmvClient};

use crate::command::Command;
use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::metrics::{self, CounterSample};
use crate::normalize::{normalize, normalize_keyed};
use crate::resources;
use crate::schema::FieldValue;
use crate::store::{ResourceSnapshot, SnapshotStore};

/// Bounded waits for the poll lock. A cycle that can't get the lock in
/// time is skipped, never queued; the next timer tick covers it.
const FAST_LOCK_WAIT: Duration = Duration::from_secs(10);
const SLOW_LOCK_WAIT: Duration = Duration::from_secs(30);

// ── Controller ───────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. The presentation layer
/// holds a direct reference passed at construction -- there is no global
/// registry of live controllers.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    api: OmvClient,
    store: SnapshotStore,
    /// Prevents a timer-triggered and a reconnect-triggered cycle from
    /// interleaving writes into the snapshot.
    poll_lock: Mutex<()>,
    /// Previous cycle's interface counters, for throughput deltas.
    counters: std::sync::Mutex<HashMap<String, CounterSample>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    /// Create a controller from configuration. Does NOT connect -- call
    /// [`connect()`](Self::connect) to authenticate, load initial data,
    /// and start the poll timers.
    pub fn new(config: ControllerConfig) -> Result<Self, CoreError> {
        let api = OmvClient::new(
            &config.host,
            &config.username,
            config.password.clone(),
            config.use_ssl,
            config.verify_ssl,
            &config.cookie_dir,
        )
        .map_err(|e| CoreError::Config {
            message: e.to_string(),
        })?
        .with_timeout(config.timeout);

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                api,
                store: SnapshotStore::new(),
                poll_lock: Mutex::new(()),
                counters: std::sync::Mutex::new(HashMap::new()),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Access the controller configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Authenticate, load initial data, and spawn the poll timers.
    ///
    /// A failed login surfaces its classified error code so a setup flow
    /// can tell "wrong password" from "unreachable host".
    pub async fn connect(&self) -> Result<(), CoreError> {
        if !self.inner.api.connect().await {
            return Err(self
                .inner
                .api
                .last_error()
                .map_or(CoreError::Disconnected, CoreError::from));
        }

        // The initial load below covers what the reconnect edge would
        // otherwise trigger on the first fast cycle.
        let _ = self.inner.api.has_reconnected();

        self.slow_refresh().await;
        self.fast_refresh().await;

        let mut handles = self.inner.task_handles.lock().await;
        let fast = self.clone();
        let cancel = self.inner.cancel.clone();
        handles.push(tokio::spawn(refresh_task(
            fast,
            self.inner.config.fast_interval,
            false,
            cancel,
        )));

        let slow = self.clone();
        let cancel = self.inner.cancel.clone();
        handles.push(tokio::spawn(refresh_task(
            slow,
            self.inner.config.slow_interval,
            true,
            cancel,
        )));

        info!(host = %self.inner.config.host, "controller connected");
        Ok(())
    }

    /// Cancel the poll timers and drop the session.
    pub async fn disconnect(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        self.inner.api.disconnect();
        debug!(host = %self.inner.config.host, "controller disconnected");
    }

    // ── Collaborator surface ─────────────────────────────────────────

    /// Session state passthrough.
    pub fn connected(&self) -> bool {
        self.inner.api.connected()
    }

    /// Classification of the last connection failure, if any.
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.inner.api.last_error()
    }

    /// The current snapshot (cheap `Arc` clone, consistent view).
    pub fn snapshot(&self) -> Arc<ResourceSnapshot> {
        self.inner.store.current()
    }

    /// Subscribe to the per-cycle change notification.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ResourceSnapshot>> {
        self.inner.store.subscribe()
    }

    /// When the last poll cycle published.
    pub fn last_refresh(&self) -> Option<chrono::DateTime<Utc>> {
        self.inner.store.last_refresh()
    }

    /// Raw RPC passthrough for callers that need an unnormalized answer.
    pub async fn query(&self, service: &str, method: &str, params: Value) -> Option<Value> {
        self.inner.api.query(service, method, params).await
    }

    /// Execute a fire-and-forget command outside the polling cycle.
    pub async fn execute(&self, command: Command) -> Result<(), CoreError> {
        if !self.inner.api.connected() {
            return Err(CoreError::Disconnected);
        }

        // VM and container commands need their plugin on the appliance.
        let required = match &command {
            Command::Vm { .. } => Some(resources::PLUGIN_KVM),
            Command::Compose { .. } => Some(resources::PLUGIN_COMPOSE),
            _ => None,
        };
        if let Some(plugin) = required {
            if !plugin_installed(&self.inner.store.current(), plugin) {
                return Err(CoreError::PluginNotInstalled {
                    plugin: plugin.into(),
                });
            }
        }

        let (service, method, params) = command.request();
        match self.inner.api.query(service, method, params).await {
            Some(_) => Ok(()),
            None => Err(CoreError::CommandRejected {
                message: format!("{service}.{method} returned no response"),
            }),
        }
    }

    // ── Poll cycles ──────────────────────────────────────────────────

    /// Slow cycle: hardware info, plugin inventory, disk inventory.
    pub async fn slow_refresh(&self) {
        let Ok(_guard) = timeout(SLOW_LOCK_WAIT, self.inner.poll_lock.lock()).await else {
            debug!(host = %self.inner.config.host, "slow cycle skipped, poller busy");
            return;
        };

        let mut snap = (*self.inner.store.current()).clone();
        self.slow_cycle(&mut snap).await;
        self.inner.store.publish(snap);
    }

    /// Fast cycle: system info, filesystems, SMART, network, services,
    /// and -- plugin-gated -- VMs and containers.
    pub async fn fast_refresh(&self) {
        let Ok(_guard) = timeout(FAST_LOCK_WAIT, self.inner.poll_lock.lock()).await else {
            debug!(host = %self.inner.config.host, "fast cycle skipped, poller busy");
            return;
        };

        let mut snap = (*self.inner.store.current()).clone();

        // Coming back from an outage: rebuild the slow baselines now
        // instead of serving stale hardware data until the slow timer.
        if self.inner.api.has_reconnected() {
            warn!(host = %self.inner.config.host, "reconnected, refreshing inventory baselines");
            self.slow_cycle(&mut snap).await;
        }

        self.fast_cycle(&mut snap).await;
        self.inner.store.publish(snap);
    }

    async fn slow_cycle(&self, snap: &mut ResourceSnapshot) {
        self.get_hwinfo(snap).await;
        if self.inner.api.connected() {
            self.get_plugin(snap).await;
        }
        if self.inner.api.connected() {
            self.get_disk(snap).await;
        }
    }

    /// Connectivity is re-checked before every step so a session lost
    /// mid-cycle degrades the remaining resources instead of erroring.
    async fn fast_cycle(&self, snap: &mut ResourceSnapshot) {
        self.get_hwinfo(snap).await;

        if self.inner.api.connected() {
            self.get_fs(snap).await;
        }
        if self.inner.api.connected() && self.inner.config.smart_enabled {
            self.get_smart(snap).await;
        }
        if self.inner.api.connected() {
            self.get_network(snap).await;
        }
        if self.inner.api.connected() {
            self.get_service(snap).await;
        }
        if self.inner.api.connected() && plugin_installed(snap, resources::PLUGIN_KVM) {
            self.get_kvm(snap).await;
        }
        if self.inner.api.connected() && plugin_installed(snap, resources::PLUGIN_COMPOSE) {
            self.get_compose(snap).await;
        }
    }

    // ── Per-resource fetches ─────────────────────────────────────────

    async fn get_hwinfo(&self, snap: &mut ResourceSnapshot) {
        let source = self
            .inner
            .api
            .query("System", "getInformation", json!({}))
            .await;

        let mut hwinfo = normalize(
            std::mem::take(&mut snap.hwinfo),
            source.as_ref(),
            resources::HWINFO,
            resources::HWINFO_ENSURE,
        );

        let cpu = hwinfo
            .get("cpuUsage")
            .and_then(FieldValue::as_f64)
            .unwrap_or(0.0);
        hwinfo.insert("cpuUsage", FieldValue::Float(metrics::round1(cpu)));

        let total = hwinfo
            .get("memTotal")
            .and_then(FieldValue::as_i64)
            .unwrap_or(0);
        let used = hwinfo
            .get("memUsed")
            .and_then(FieldValue::as_i64)
            .unwrap_or(0);
        hwinfo.insert(
            "memUsage",
            FieldValue::Float(metrics::memory_usage_pct(used, total)),
        );

        // Only a fresh uptime reading moves the boot epoch; recomputing
        // from a stale one would make it drift on every failed cycle.
        if source.is_some() {
            let parsed = hwinfo
                .get("uptime")
                .and_then(FieldValue::as_str)
                .and_then(metrics::parse_uptime_secs);
            if let Some(secs) = parsed {
                hwinfo.insert(
                    "uptimeEpoch",
                    FieldValue::Int(metrics::boot_epoch(secs, Utc::now())),
                );
            }
        }

        snap.hwinfo = hwinfo;
    }

    async fn get_disk(&self, snap: &mut ResourceSnapshot) {
        let source = self
            .inner
            .api
            .query("DiskMgmt", "enumerateDevices", json!({ "start": 0, "limit": -1 }))
            .await;

        snap.disk = normalize_keyed(
            std::mem::take(&mut snap.disk),
            source.as_ref(),
            resources::DISK,
            "devicename",
            resources::DISK_ENSURE,
            &[],
        );
    }

    async fn get_smart(&self, snap: &mut ResourceSnapshot) {
        let source = self
            .inner
            .api
            .query("Smart", "getList", json!({ "start": 0, "limit": -1 }))
            .await;

        // Enrich the disk inventory in place, keyed by device name.
        snap.disk = normalize_keyed(
            std::mem::take(&mut snap.disk),
            source.as_ref(),
            resources::SMART,
            "devicename",
            &[],
            &[],
        );
    }

    async fn get_fs(&self, snap: &mut ResourceSnapshot) {
        let source = self
            .inner
            .api
            .query(
                "FileSystemMgmt",
                "enumerateMountedFilesystems",
                json!({ "includeroot": true }),
            )
            .await;
        let fetched = source.is_some();

        let mut fs = normalize_keyed(
            std::mem::take(&mut snap.fs),
            source.as_ref(),
            resources::FS,
            "uuid",
            &[],
            resources::FS_SKIP,
        );

        // Byte counts come in as strings of bytes; report GiB. Skipped
        // when the fetch failed so held-over values aren't re-divided.
        if fetched {
            for entry in fs.values_mut() {
                for field in ["size", "available"] {
                    let bytes = entry.get(field).and_then(FieldValue::as_f64).unwrap_or(0.0);
                    entry.insert(field, FieldValue::Float(metrics::round1(bytes / metrics::GIB)));
                }
            }
        }

        snap.fs = fs;
    }

    async fn get_network(&self, snap: &mut ResourceSnapshot) {
        let source = self
            .inner
            .api
            .query("Network", "enumerateDevices", json!({ "start": 0, "limit": -1 }))
            .await;
        let fetched = source.is_some();

        let mut network = normalize_keyed(
            std::mem::take(&mut snap.network),
            source.as_ref(),
            resources::NETWORK,
            "devicename",
            resources::NETWORK_ENSURE,
            resources::NETWORK_SKIP,
        );

        if fetched {
            let now = Instant::now();
            let mut counters = self
                .inner
                .counters
                .lock()
                .expect("counter lock poisoned");

            for (name, entry) in &mut network {
                let rx = entry.get("rxBytes").and_then(FieldValue::as_u64).unwrap_or(0);
                let tx = entry.get("txBytes").and_then(FieldValue::as_u64).unwrap_or(0);

                if let Some(prev) = counters.get(name) {
                    let elapsed = now.duration_since(prev.at);
                    entry.insert(
                        "rxBps",
                        FieldValue::Float(metrics::throughput_bps(prev.rx_bytes, rx, elapsed)),
                    );
                    entry.insert(
                        "txBps",
                        FieldValue::Float(metrics::throughput_bps(prev.tx_bytes, tx, elapsed)),
                    );
                }

                counters.insert(
                    name.clone(),
                    CounterSample {
                        rx_bytes: rx,
                        tx_bytes: tx,
                        at: now,
                    },
                );
            }
        }

        snap.network = network;
    }

    async fn get_service(&self, snap: &mut ResourceSnapshot) {
        let source = self.inner.api.query("Services", "getStatus", json!({})).await;

        snap.service = normalize_keyed(
            std::mem::take(&mut snap.service),
            source.as_ref(),
            resources::SERVICE,
            "name",
            &[],
            &[],
        );
    }

    async fn get_plugin(&self, snap: &mut ResourceSnapshot) {
        let source = self
            .inner
            .api
            .query("Plugin", "enumeratePlugins", json!({}))
            .await;

        snap.plugin = normalize_keyed(
            std::mem::take(&mut snap.plugin),
            source.as_ref(),
            resources::PLUGIN,
            "name",
            &[],
            &[],
        );
    }

    async fn get_kvm(&self, snap: &mut ResourceSnapshot) {
        let source = self
            .inner
            .api
            .query("Kvm", "getVmList", json!({ "start": 0, "limit": -1 }))
            .await;

        snap.kvm = normalize_keyed(
            std::mem::take(&mut snap.kvm),
            source.as_ref(),
            resources::KVM,
            "vmname",
            &[],
            &[],
        );
    }

    async fn get_compose(&self, snap: &mut ResourceSnapshot) {
        let source = self
            .inner
            .api
            .query("Compose", "getContainerList", json!({ "start": 0, "limit": -1 }))
            .await;

        snap.compose = normalize_keyed(
            std::mem::take(&mut snap.compose),
            source.as_ref(),
            resources::COMPOSE,
            "name",
            &[],
            &[],
        );
    }
}

/// `true` when the plugin inventory reports `name` as installed.
fn plugin_installed(snap: &ResourceSnapshot, name: &str) -> bool {
    snap.plugin
        .get(name)
        .and_then(|plugin| plugin.get("installed"))
        .and_then(FieldValue::as_bool)
        .unwrap_or(false)
}

// ── Background tasks ─────────────────────────────────────────────────

/// Drive one of the two cycles on its timer until cancelled.
async fn refresh_task(
    controller: Controller,
    period: Duration,
    slow: bool,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if slow {
                    controller.slow_refresh().await;
                } else {
                    controller.fast_refresh().await;
                }
            }
        }
    }
}
