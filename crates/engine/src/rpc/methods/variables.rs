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

//! Namespace methods. Values are reported as their printable representation.

use ease_common::HostValue;
use serde_json::Value;
use tracing::debug;

use crate::{
    rpc::{
        types::RpcError,
        utils::{str_param, to_json, typed_param},
    },
    service::ExecutionService,
};

/// `ease.getVariable [name]`
pub fn get_variable(service: &ExecutionService, params: Option<Value>) -> Result<Value, RpcError> {
    let name = str_param(&params, 0, "[name]")?;
    Ok(Value::String(service.get_variable(name)))
}

/// `ease.getVariables []`
pub fn get_variables(service: &ExecutionService) -> Result<Value, RpcError> {
    to_json(&service.get_variables())
}

/// `ease.hasVariable [name]`
pub fn has_variable(service: &ExecutionService, params: Option<Value>) -> Result<Value, RpcError> {
    let name = str_param(&params, 0, "[name]")?;
    Ok(Value::Bool(service.has_variable(name)))
}

/// `ease.setVariable [name, value]`
pub fn set_variable(
    service: &mut ExecutionService,
    params: Option<Value>,
) -> Result<Value, RpcError> {
    let name = str_param(&params, 0, "[name, value]")?;
    let value: HostValue = typed_param(&params, 1, "[name, value]")?;
    debug!("Setting variable {}", name);
    service.set_variable(name, value);
    Ok(Value::Null)
}

/// `ease.removeVariable [name]`
pub fn remove_variable(
    service: &mut ExecutionService,
    params: Option<Value>,
) -> Result<Value, RpcError> {
    let name = str_param(&params, 0, "[name]")?;
    to_json(&service.remove_variable(name))
}

/// `ease.saveVariableName [name]`
pub fn save_variable_name(params: Option<Value>) -> Result<Value, RpcError> {
    let name = str_param(&params, 0, "[name]")?;
    Ok(Value::String(ExecutionService::save_variable_name(name)))
}
