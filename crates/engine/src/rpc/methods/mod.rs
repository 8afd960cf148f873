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

//! RPC method dispatch.
//!
//! Methods are grouped by concern:
//! - [`execute`] - running code
//! - [`variables`] - namespace inspection and mutation
//! - [`session`] - tracing and engine lifecycle

mod execute;
mod session;
mod variables;

use serde_json::{json, Value};
use tracing::debug;

use super::{
    types::{error_codes, RpcError, RpcRequest, RpcResponse},
    utils::{internal_error, method_not_found, to_rpc_error},
};
use crate::service::{ExecutionService, ServiceError};

/// Method names served to the host
pub mod names {
    /// `[code, filename?]` -> InteractiveReturn
    pub const EXECUTE_SCRIPT: &str = "ease.executeScript";
    /// `[code]` -> InteractiveReturn
    pub const EXECUTE_INTERACTIVE: &str = "ease.executeInteractive";
    /// `[code, filename]` -> InteractiveReturn
    pub const TRACE_SCRIPT: &str = "ease.traceScript";
    /// `[name]` -> string
    pub const GET_VARIABLE: &str = "ease.getVariable";
    /// `[]` -> {name: string}
    pub const GET_VARIABLES: &str = "ease.getVariables";
    /// `[name]` -> bool
    pub const HAS_VARIABLE: &str = "ease.hasVariable";
    /// `[name, value]` -> null
    pub const SET_VARIABLE: &str = "ease.setVariable";
    /// `[name]` -> string | null
    pub const REMOVE_VARIABLE: &str = "ease.removeVariable";
    /// `[name]` -> string
    pub const SAVE_VARIABLE_NAME: &str = "ease.saveVariableName";
    /// `[enabled]` -> bool
    pub const SET_TRACING: &str = "ease.setTracing";
    /// `[]` -> null
    pub const TEARDOWN_ENGINE: &str = "ease.teardownEngine";
}

/// Dispatches requests to the execution service it owns
#[derive(Debug)]
pub struct MethodHandler {
    service: ExecutionService,
}

impl MethodHandler {
    /// Handler serving `service`
    pub fn new(service: ExecutionService) -> Self {
        Self { service }
    }

    /// Handle one request and build its response
    pub fn handle_request(&mut self, request: RpcRequest) -> RpcResponse {
        let id = request.id.clone();
        match self.handle_method(&request.method, request.params) {
            Ok(result) => RpcResponse::success(id, result),
            Err(error) => RpcResponse::failure(id, error),
        }
    }

    /// Handle an RPC method call
    pub fn handle_method(&mut self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        debug!("Handling RPC method: {}", method);

        let service = &mut self.service;
        match method {
            names::EXECUTE_SCRIPT => execute::execute_script(service, params),
            names::EXECUTE_INTERACTIVE => execute::execute_interactive(service, params),
            names::TRACE_SCRIPT => execute::trace_script(service, params),

            names::GET_VARIABLE => variables::get_variable(service, params),
            names::GET_VARIABLES => variables::get_variables(service),
            names::HAS_VARIABLE => variables::has_variable(service, params),
            names::SET_VARIABLE => variables::set_variable(service, params),
            names::REMOVE_VARIABLE => variables::remove_variable(service, params),
            names::SAVE_VARIABLE_NAME => variables::save_variable_name(params),

            names::SET_TRACING => session::set_tracing(service, params),
            names::TEARDOWN_ENGINE => session::teardown_engine(service),

            _ => Err(method_not_found(method)),
        }
    }
}

impl From<ServiceError> for RpcError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::ScriptTerminated(code) => to_rpc_error(
                error_codes::SCRIPT_TERMINATED,
                &err.to_string(),
                Some(json!({ "exitCode": code })),
            ),
            ServiceError::AlreadyBound => {
                to_rpc_error(error_codes::ENGINE_ALREADY_BOUND, &err.to_string(), None)
            }
            ServiceError::Prelude(_) => internal_error(&err.to_string()),
        }
    }
}
