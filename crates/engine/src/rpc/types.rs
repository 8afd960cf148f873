// EASE Bridge - Scripting Engine Bridge
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! JSON-RPC protocol types.
//!
//! - [`RpcRequest`] - incoming request from the host
//! - [`RpcResponse`] - outgoing response with result or error
//! - [`RpcError`] - JSON-RPC error object
//! - [`RpcId`] - request identifier (string or number)
//!
//! Error codes shared by both directions of the bridge live in
//! [`error_codes`].

use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 request sent by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Method name, e.g. `ease.executeScript`
    pub method: String,
    /// Positional parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Request identifier for matching with response
    pub id: RpcId,
}

impl RpcRequest {
    /// Build a request with positional parameters
    pub fn new(method: &str, params: serde_json::Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params: Some(params),
            id: RpcId::Number(id),
        }
    }
}

/// JSON-RPC 2.0 response.
///
/// Contains either a result or an error, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Successful method result (omitted if error occurred)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error information (omitted if method succeeded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    /// Request identifier matching the original request
    pub id: RpcId,
}

impl RpcResponse {
    /// Successful response
    pub fn success(id: RpcId, result: serde_json::Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), result: Some(result), error: None, id }
    }

    /// Error response
    pub fn failure(id: RpcId, error: RpcError) -> Self {
        Self { jsonrpc: "2.0".to_string(), result: None, error: Some(error), id }
    }
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Optional structured details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// JSON-RPC request/response identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    /// Numeric identifier
    Number(u64),
    /// String identifier
    String(String),
}

/// JSON-RPC error codes.
///
/// Standard JSON-RPC 2.0 codes plus the bridge's own codes.
pub mod error_codes {
    // Standard JSON-RPC 2.0 error codes

    /// Parse error - Invalid JSON was received by the server
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid request - The JSON sent is not a valid request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found - The method does not exist or is not available
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params - Invalid method parameter(s)
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error - Internal JSON-RPC error
    pub const INTERNAL_ERROR: i32 = -32603;

    // Bridge error codes (starting from -33000)

    /// A script called `exit`; `data.exitCode` carries the status
    pub const SCRIPT_TERMINATED: i32 = -33010;
    /// The engine was bound to a host twice
    pub const ENGINE_ALREADY_BOUND: i32 = -33011;
    /// Host-side exception; `data.handle` names the exception object
    pub const REMOTE_EXCEPTION: i32 = -33100;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_ids() {
        let req: RpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "ease.getVariables",
            "id": "abc"
        }))
        .unwrap();
        assert_eq!(req.id, RpcId::String("abc".into()));
        assert!(req.params.is_none());

        let req = RpcRequest::new("ease.hasVariable", json!(["x"]), 7);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["id"], json!(7));
        assert_eq!(value["params"], json!(["x"]));
    }

    #[test]
    fn test_response_omits_empty_fields() {
        let ok = RpcResponse::success(RpcId::Number(1), json!(true));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"jsonrpc": "2.0", "result": true, "id": 1})
        );

        let err = RpcResponse::failure(
            RpcId::Number(2),
            RpcError { code: error_codes::SCRIPT_TERMINATED, message: "exit".into(), data: None },
        );
        let value = serde_json::to_value(&err).unwrap();
        assert!(value.get("result").is_none());
        assert_eq!(value["error"]["code"], json!(-33010));
    }
}
