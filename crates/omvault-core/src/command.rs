// ── Direct command passthroughs ──
//
// Fire-and-forget actions outside the polling cycle: power control and
// VM/container lifecycle. A closed set of variants, each knowing the
// RPC call it maps to; no normalization on the way back.

use serde_json::{Value, json};
use strum::Display;

/// VM lifecycle operations supported by the kvm plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum VmOp {
    Start,
    Stop,
    Restart,
    Snapshot,
}

/// Container operations supported by the compose plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ComposeOp {
    Start,
    Stop,
    Restart,
}

/// A command to execute against the appliance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Reboot,
    Shutdown,
    Standby,
    Vm { name: String, op: VmOp },
    Compose { name: String, op: ComposeOp },
}

impl Command {
    /// The `(service, method, params)` triple this command issues.
    pub fn request(&self) -> (&'static str, &'static str, Value) {
        match self {
            Self::Reboot => ("PowerMgmt", "reboot", json!({})),
            Self::Shutdown => ("PowerMgmt", "shutdown", json!({})),
            Self::Standby => ("PowerMgmt", "standby", json!({})),
            Self::Vm {
                name,
                op: VmOp::Snapshot,
            } => ("Kvm", "addSnapshot", json!({ "name": name })),
            Self::Vm { name, op } => (
                "Kvm",
                "setState",
                json!({ "name": name, "state": vm_state(*op) }),
            ),
            Self::Compose { name, op } => (
                "Compose",
                "doServiceCommand",
                json!({ "name": name, "command": op.to_string() }),
            ),
        }
    }
}

/// Power-state argument for `Kvm.setState`.
fn vm_state(op: VmOp) -> &'static str {
    match op {
        VmOp::Start => "poweron",
        VmOp::Stop => "poweroff",
        VmOp::Restart => "restart",
        // Snapshot routes to its own method before reaching here.
        VmOp::Snapshot => "snapshot",
    }
}
