// RPC envelope types for the appliance's single POST endpoint.
//
// Every call -- login included -- is a JSON body
// `{service, method, params, options}` POSTed to `/rpc.php`, answered by
// `{error, response}` where exactly one of the two is meaningful.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Fixed endpoint path on the target host.
pub const RPC_PATH: &str = "/rpc.php";

/// RPC error codes the appliance uses for a dead session.
pub const SESSION_EXPIRED_CODES: [i64; 2] = [5001, 5002];

/// RPC error messages the appliance uses for a dead session. Older
/// firmware reports the condition by message with a non-expiry code.
pub const SESSION_EXPIRED_MESSAGES: [&str; 2] =
    ["Session not authenticated.", "Session expired."];

/// Service and method of the login call.
pub const LOGIN_SERVICE: &str = "session";
pub const LOGIN_METHOD: &str = "login";

/// Request envelope.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub service: &'a str,
    pub method: &'a str,
    pub params: Value,
    pub options: Value,
}

impl<'a> RpcRequest<'a> {
    pub fn new(service: &'a str, method: &'a str, params: Value, options: Value) -> Self {
        Self {
            service,
            method,
            params,
            options,
        }
    }

    /// Login request for the given credentials.
    pub fn login(username: &str, password: &str) -> RpcRequest<'static> {
        RpcRequest {
            service: LOGIN_SERVICE,
            method: LOGIN_METHOD,
            params: json!({ "username": username, "password": password }),
            options: json!({}),
        }
    }
}

/// Options sent when the caller doesn't supply any. Polling must not
/// keep the web UI's session-activity clock alive.
pub fn default_options() -> Value {
    json!({ "updatelastaccess": false })
}

/// Response envelope. `error` is JSON `null` on success.
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    pub error: Option<RpcError>,
    #[serde(default)]
    pub response: Value,
}

/// Error half of the response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn is_session_expired(&self) -> bool {
        SESSION_EXPIRED_CODES.contains(&self.code)
            || SESSION_EXPIRED_MESSAGES.contains(&self.message.as_str())
    }
}
