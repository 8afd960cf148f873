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

//! Code execution methods.
//!
//! All three return an `InteractiveReturn`:
//!
//! ```json
//! // Request
//! { "method": "ease.executeInteractive", "params": ["2+2"] }
//!
//! // Response
//! { "result": { "result": { "type": "int", "value": 4 } } }
//! ```
//!
//! A failed fragment is still a successful call; the failure travels in the
//! `exception` field. Only `exit()` turns into a JSON-RPC error.

use serde_json::Value;

use crate::{
    rpc::{
        types::RpcError,
        utils::{opt_str_param, str_param, to_json},
    },
    service::ExecutionService,
};

/// `ease.executeScript [code, filename?]`
pub fn execute_script(
    service: &mut ExecutionService,
    params: Option<Value>,
) -> Result<Value, RpcError> {
    let code = str_param(&params, 0, "[code, filename?]")?;
    let filename = opt_str_param(&params, 1, "[code, filename?]")?;
    to_json(&service.execute_script(code, filename)?)
}

/// `ease.executeInteractive [code]`
pub fn execute_interactive(
    service: &mut ExecutionService,
    params: Option<Value>,
) -> Result<Value, RpcError> {
    let code = str_param(&params, 0, "[code]")?;
    to_json(&service.execute_interactive(code)?)
}

/// `ease.traceScript [code, filename]`
pub fn trace_script(
    service: &mut ExecutionService,
    params: Option<Value>,
) -> Result<Value, RpcError> {
    let code = str_param(&params, 0, "[code, filename]")?;
    let filename = str_param(&params, 1, "[code, filename]")?;
    to_json(&service.trace_script(code, filename)?)
}
