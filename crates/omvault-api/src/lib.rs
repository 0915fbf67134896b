// omvault-api: Async Rust client for the OpenMediaVault RPC interface.

pub mod client;
pub mod cookies;
pub mod error;
pub mod rpc;
pub mod transport;

pub use client::OmvClient;
pub use error::{Error, ErrorKind};
pub use rpc::{RpcError, RpcRequest, RpcResponse};
pub use transport::{TlsMode, TransportConfig};
