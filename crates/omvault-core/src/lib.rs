// omvault-core: Polling layer between omvault-api and consumers.
//
// Turns the appliance's version-drifting JSON into stable, typed
// snapshots that an entity layer can read without defensive checks.

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod resources;
pub mod schema;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, ComposeOp, VmOp};
pub use config::ControllerConfig;
pub use controller::Controller;
pub use error::CoreError;
pub use schema::{DefaultValue, FieldMap, FieldSpec, FieldValue, KeyedMap, Kind, SkipRule, Source};
pub use store::{ResourceSnapshot, SnapshotStore};
