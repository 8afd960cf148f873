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

//! Session lifecycle methods.

use serde_json::Value;

use crate::{
    rpc::{types::RpcError, utils::bool_param},
    service::ExecutionService,
};

/// `ease.setTracing [enabled]`; returns whether tracing is now active
pub fn set_tracing(service: &mut ExecutionService, params: Option<Value>) -> Result<Value, RpcError> {
    let enabled = bool_param(&params, 0, "[enabled]")?;
    service.set_tracing(enabled);
    Ok(Value::Bool(service.is_tracing()))
}

/// `ease.teardownEngine []`
pub fn teardown_engine(service: &mut ExecutionService) -> Result<Value, RpcError> {
    service.teardown();
    Ok(Value::Null)
}
