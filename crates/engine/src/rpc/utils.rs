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

//! Error constructors and parameter extraction shared by the RPC methods.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::rpc::types::{error_codes, RpcError};

/// Convert error to RPC error format
pub fn to_rpc_error(code: i32, message: &str, data: Option<Value>) -> RpcError {
    RpcError { code, message: message.to_string(), data }
}

/// Helper to create internal error responses
pub fn internal_error(message: &str) -> RpcError {
    to_rpc_error(error_codes::INTERNAL_ERROR, message, None)
}

/// Helper to create method not found error
pub fn method_not_found(method: &str) -> RpcError {
    to_rpc_error(error_codes::METHOD_NOT_FOUND, &format!("Method '{}' not found", method), None)
}

/// Helper to create invalid params error
pub fn invalid_params(message: &str) -> RpcError {
    to_rpc_error(error_codes::INVALID_PARAMS, message, None)
}

fn positional(params: &Option<Value>, index: usize) -> Option<&Value> {
    params.as_ref().and_then(|p| p.as_array()).and_then(|arr| arr.get(index))
}

/// Required string parameter at `index`
pub fn str_param<'a>(
    params: &'a Option<Value>,
    index: usize,
    expected: &str,
) -> Result<&'a str, RpcError> {
    positional(params, index)
        .and_then(|v| v.as_str())
        .ok_or_else(|| invalid_params(&format!("Invalid params: expected {expected}")))
}

/// Optional string parameter at `index`; missing and `null` are `None`
pub fn opt_str_param<'a>(
    params: &'a Option<Value>,
    index: usize,
    expected: &str,
) -> Result<Option<&'a str>, RpcError> {
    match positional(params, index) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(invalid_params(&format!("Invalid params: expected {expected}"))),
    }
}

/// Required boolean parameter at `index`
pub fn bool_param(params: &Option<Value>, index: usize, expected: &str) -> Result<bool, RpcError> {
    positional(params, index)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| invalid_params(&format!("Invalid params: expected {expected}")))
}

/// Required parameter at `index`, decoded into `T`
pub fn typed_param<T: DeserializeOwned>(
    params: &Option<Value>,
    index: usize,
    expected: &str,
) -> Result<T, RpcError> {
    let value = positional(params, index)
        .ok_or_else(|| invalid_params(&format!("Invalid params: expected {expected}")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| invalid_params(&format!("Invalid params: expected {expected}: {e}")))
}

/// Serialize a method result
pub fn to_json<T: Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value)
        .map_err(|e| internal_error(&format!("Failed to serialize result: {e}")))
}
