// ── Per-resource schemas ──
//
// Static declarations of every resource kind the poller tracks: which
// RPC to call, which fields to keep, and what stands in when the server
// omits one. Field names follow the server's own spelling so entries
// read like the WebGUI's RPC responses.

use crate::schema::{DefaultValue as D, FieldSpec, Kind as K, SkipRule};

/// Plugin package that provides the VM inventory RPC.
pub const PLUGIN_KVM: &str = "openmediavault-kvm";

/// Plugin package that provides the container inventory RPC.
pub const PLUGIN_COMPOSE: &str = "openmediavault-compose";

// ── System information (singleton) ──────────────────────────────────

pub const HWINFO: &[FieldSpec] = &[
    FieldSpec::new("hostname", K::Str, D::Str("unknown")),
    FieldSpec::new("version", K::Str, D::Str("unknown")),
    FieldSpec::new("cpuUsage", K::Float, D::Float(0.0)),
    FieldSpec::new("memTotal", K::Int, D::Int(0)),
    FieldSpec::new("memUsed", K::Int, D::Int(0)),
    FieldSpec::new("uptime", K::Str, D::Str("")),
    FieldSpec::new("load1min", K::Float, D::Float(0.0)).nested("loadAverage", "1min"),
    FieldSpec::new("load5min", K::Float, D::Float(0.0)).nested("loadAverage", "5min"),
    FieldSpec::new("load15min", K::Float, D::Float(0.0)).nested("loadAverage", "15min"),
    FieldSpec::new("configDirty", K::Bool, D::Bool(false)),
    FieldSpec::new("rebootRequired", K::Bool, D::Bool(false)),
    FieldSpec::new("pkgUpdatesAvailable", K::Bool, D::Bool(false)),
];

/// Computed after the fetch; seeded so readers never miss them.
pub const HWINFO_ENSURE: &[FieldSpec] = &[
    FieldSpec::new("memUsage", K::Float, D::Float(0.0)),
    FieldSpec::new("uptimeEpoch", K::Int, D::Int(0)),
];

// ── Disk inventory, enriched with SMART data ────────────────────────

pub const DISK: &[FieldSpec] = &[
    FieldSpec::new("devicename", K::Str, D::Str("")),
    FieldSpec::new("canonicaldevicefile", K::Str, D::Str("unknown")),
    FieldSpec::new("model", K::Str, D::Str("unknown")),
    FieldSpec::new("vendor", K::Str, D::Str("unknown")),
    FieldSpec::new("serialnumber", K::Str, D::Str("unknown")),
    FieldSpec::new("size", K::Int, D::Int(0)),
    FieldSpec::new("israid", K::Bool, D::Bool(false)),
    FieldSpec::new("isroot", K::Bool, D::Bool(false)),
];

/// SMART fields exist even when SMART polling is disabled.
pub const DISK_ENSURE: &[FieldSpec] = &[
    FieldSpec::new("temperature", K::Int, D::Int(0)),
    FieldSpec::new("overallstatus", K::Str, D::Str("unknown")),
];

/// Merged into [`DISK`] entries by device name.
pub const SMART: &[FieldSpec] = &[
    FieldSpec::new("temperature", K::Int, D::Int(0)),
    FieldSpec::new("overallstatus", K::Str, D::Str("unknown")),
];

// ── Mounted filesystems ─────────────────────────────────────────────

pub const FS: &[FieldSpec] = &[
    FieldSpec::new("uuid", K::Str, D::Str("")),
    FieldSpec::new("parentdevicefile", K::Str, D::Str("unknown")),
    FieldSpec::new("label", K::Str, D::Str("unknown")),
    FieldSpec::new("type", K::Str, D::Str("unknown")),
    FieldSpec::new("mountpoint", K::Str, D::Str("unknown")),
    FieldSpec::new("size", K::Float, D::Float(0.0)),
    FieldSpec::new("available", K::Float, D::Float(0.0)),
    FieldSpec::new("percentage", K::Int, D::Int(0)),
];

/// Swap and optical images aren't filesystems worth reporting.
pub const FS_SKIP: &[SkipRule] = &[
    SkipRule::new("type", "swap"),
    SkipRule::new("type", "iso9660"),
];

// ── Network interfaces ──────────────────────────────────────────────

pub const NETWORK: &[FieldSpec] = &[
    FieldSpec::new("devicename", K::Str, D::Str("")),
    FieldSpec::new("type", K::Str, D::Str("unknown")),
    FieldSpec::new("method", K::Str, D::Str("unknown")),
    FieldSpec::new("address", K::Str, D::Str("")),
    FieldSpec::new("gateway", K::Str, D::Str("")),
    FieldSpec::new("link", K::Bool, D::Bool(false)),
    FieldSpec::new("speed", K::Int, D::Int(0)),
    FieldSpec::new("rxBytes", K::Int, D::Int(0)).nested("stats", "rx_bytes"),
    FieldSpec::new("txBytes", K::Int, D::Int(0)).nested("stats", "tx_bytes"),
];

/// Throughput is a delta against the previous cycle, computed by the
/// fetch method.
pub const NETWORK_ENSURE: &[FieldSpec] = &[
    FieldSpec::new("rxBps", K::Float, D::Float(0.0)),
    FieldSpec::new("txBps", K::Float, D::Float(0.0)),
];

pub const NETWORK_SKIP: &[SkipRule] = &[
    SkipRule::new("devicename", "lo"),
    SkipRule::new("type", "loopback"),
];

// ── Services ────────────────────────────────────────────────────────

pub const SERVICE: &[FieldSpec] = &[
    FieldSpec::new("name", K::Str, D::Str("")),
    FieldSpec::new("title", K::Str, D::Str("unknown")),
    FieldSpec::new("enabled", K::Bool, D::Bool(false)),
    FieldSpec::new("running", K::Bool, D::Bool(false)),
];

// ── Plugins ─────────────────────────────────────────────────────────

pub const PLUGIN: &[FieldSpec] = &[
    FieldSpec::new("name", K::Str, D::Str("")),
    FieldSpec::new("version", K::Str, D::Str("unknown")),
    FieldSpec::new("installed", K::Bool, D::Bool(false)),
];

// ── Virtual machines (openmediavault-kvm) ───────────────────────────

pub const KVM: &[FieldSpec] = &[
    FieldSpec::new("vmname", K::Str, D::Str("")),
    FieldSpec::new("state", K::Str, D::Str("unknown")),
    FieldSpec::new("arch", K::Str, D::Str("unknown")),
    FieldSpec::new("mem", K::Int, D::Int(0)),
    FieldSpec::new("cpu", K::Int, D::Int(0)),
    FieldSpec::new("autostart", K::Bool, D::Bool(false)),
    FieldSpec::new("snapshots", K::Int, D::Int(0)),
];

// ── Containers (openmediavault-compose) ─────────────────────────────

pub const COMPOSE: &[FieldSpec] = &[
    FieldSpec::new("name", K::Str, D::Str("")),
    FieldSpec::new("state", K::Str, D::Str("unknown")),
    FieldSpec::new("image", K::Str, D::Str("unknown")),
    FieldSpec::new("project", K::Str, D::Str("unknown")),
];
