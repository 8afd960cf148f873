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

//! Request/response façade over the console.
//!
//! The service owns the session namespace and everything that touches it.
//! It is not `Send`: it lives on the executor thread, and the RPC server hands
//! requests to that thread one at a time.

use std::{collections::BTreeMap, io::Write, rc::Rc, sync::Arc};

use ease_common::{
    config::BridgeConfig, ExceptionPayload, HostValue, InteractiveReturn, RemoteHandle,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    console::{CompletionSignal, InteractiveConsole, SCRIPT_FILENAME},
    convert::ConverterRegistry,
    host::{HostGateway, TraceSink},
    script::{Interpreter, Value, KEYWORDS},
    shutdown::ShutdownSignal,
    trace::{FrameFilter, TraceRelay},
};

/// Source name of the bridge prelude; it carries the bridge marker so the
/// prelude's frames never reach the host debugger
pub const PRELUDE_FILENAME: &str = "ease_bridge/prelude.ease";

/// Namespace root standing for the whole host class space
pub const HOST_ROOT: &str = "jvm";

const PRELUDE: &str = "\
fn __call__(f) {
    return f()
}

fn __describe__(value) {
    return type(value) + ': ' + repr(value)
}
";

/// Service errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// `bind_host` was called twice
    #[error("engine is already bound to a host")]
    AlreadyBound,
    /// The bridge prelude failed to run
    #[error("bridge prelude failed: {0}")]
    Prelude(String),
    /// A script requested process termination
    #[error("script terminated the engine with status {0}")]
    ScriptTerminated(i32),
}

/// The execution service
pub struct ExecutionService {
    config: BridgeConfig,
    console: InteractiveConsole,
    converters: ConverterRegistry,
    shutdown: Arc<ShutdownSignal>,
    sink: Option<Rc<dyn TraceSink>>,
    bound: bool,
}

impl std::fmt::Debug for ExecutionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionService")
            .field("console", &self.console)
            .field("bound", &self.bound)
            .field("tracing", &self.is_tracing())
            .finish()
    }
}

impl ExecutionService {
    /// Service whose scripts print to stdout
    pub fn new(config: BridgeConfig, shutdown: Arc<ShutdownSignal>) -> Self {
        Self::with_output(config, shutdown, Box::new(std::io::stdout()))
    }

    /// Service whose scripts print to `output`
    pub fn with_output(
        config: BridgeConfig,
        shutdown: Arc<ShutdownSignal>,
        output: Box<dyn Write>,
    ) -> Self {
        let console = InteractiveConsole::new(Interpreter::with_output(output));
        Self {
            config,
            console,
            converters: ConverterRegistry::default(),
            shutdown,
            sink: None,
            bound: false,
        }
    }

    /// Mutable access to the result converters
    pub fn converters_mut(&mut self) -> &mut ConverterRegistry {
        &mut self.converters
    }

    /// Whether a host has been bound
    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Connect the service to its host; allowed once
    pub fn bind_host<H>(&mut self, host: Rc<H>) -> Result<(), ServiceError>
    where
        H: HostGateway + TraceSink + 'static,
    {
        if self.bound {
            return Err(ServiceError::AlreadyBound);
        }

        let interp = self.console.interpreter_mut();
        for root in &self.config.namespace_roots {
            let handle = if root == HOST_ROOT {
                RemoteHandle::package("")
            } else {
                RemoteHandle::package(root)
            };
            interp.globals_mut().insert(root.clone(), Value::Remote(handle));
        }
        interp.set_host(host.clone());
        self.sink = Some(host);

        self.run_prelude()?;
        self.console.reset();
        self.bound = true;
        info!("Engine bound to host with roots {:?}", self.config.namespace_roots);

        if self.config.trace.enabled {
            self.set_tracing(true);
        }
        Ok(())
    }

    fn run_prelude(&mut self) -> Result<(), ServiceError> {
        match self.console.run_block(PRELUDE, PRELUDE_FILENAME) {
            CompletionSignal::Complete => Ok(()),
            _ => {
                let message = self
                    .console
                    .take_error()
                    .map(|e| ExceptionPayload::from(e).message().to_string())
                    .unwrap_or_default();
                Err(ServiceError::Prelude(message))
            }
        }
    }

    /// Run a script block. The filename is informational only; the code
    /// runs as `<string>`.
    pub fn execute_script(
        &mut self,
        code: &str,
        filename: Option<&str>,
    ) -> Result<InteractiveReturn, ServiceError> {
        debug!("Executing script (filename: {:?})", filename);
        self.console.reset();
        let signal = self.console.run_block(code, SCRIPT_FILENAME);
        self.normalize(signal)
    }

    /// Run a script block under `filename`, so that trace events carry it
    pub fn trace_script(
        &mut self,
        code: &str,
        filename: &str,
    ) -> Result<InteractiveReturn, ServiceError> {
        debug!("Executing traced script {}", filename);
        self.console.reset();
        let signal = self.console.run_block(code, filename);
        self.normalize(signal)
    }

    /// Feed interactive input
    pub fn execute_interactive(&mut self, code: &str) -> Result<InteractiveReturn, ServiceError> {
        self.console.reset();
        let signal = self.console.run_line(code);
        self.normalize(signal)
    }

    fn normalize(&mut self, signal: CompletionSignal) -> Result<InteractiveReturn, ServiceError> {
        let ret = match signal {
            CompletionSignal::NeedsMore => InteractiveReturn::more_input(),
            CompletionSignal::Terminated(code) => {
                self.console.reset();
                warn!("Script requested exit with status {}", code);
                self.shutdown.request_exit(code);
                return Err(ServiceError::ScriptTerminated(code));
            }
            CompletionSignal::Complete | CompletionSignal::Failed => InteractiveReturn {
                result: self.console.take_displayed().map(|value| self.converters.convert(&value)),
                exception: self.console.take_error().map(ExceptionPayload::from),
            },
        };
        self.console.reset();
        Ok(ret)
    }

    /// Printable representation of a variable, `None` when unbound
    pub fn get_variable(&self, name: &str) -> String {
        self.globals().get(name).map_or_else(|| "None".to_string(), Value::repr)
    }

    /// Representations of all variables except `__` names
    pub fn get_variables(&self) -> BTreeMap<String, String> {
        self.globals()
            .iter()
            .filter(|(name, _)| !name.starts_with("__"))
            .map(|(name, value)| (name.clone(), value.repr()))
            .collect()
    }

    /// Whether `name` is bound
    pub fn has_variable(&self, name: &str) -> bool {
        self.globals().contains_key(name)
    }

    /// Bind `name`; the value may be a host object
    pub fn set_variable(&mut self, name: &str, value: HostValue) {
        self.console
            .interpreter_mut()
            .globals_mut()
            .insert(name.to_string(), Value::from_host(value));
    }

    /// Unbind `name`, returning the representation of the removed value
    pub fn remove_variable(&mut self, name: &str) -> Option<String> {
        self.console.interpreter_mut().globals_mut().remove(name).map(|value| value.repr())
    }

    /// Turn an arbitrary string into a usable variable name
    pub fn save_variable_name(name: &str) -> String {
        let mut safe: String = name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        let starts_ok = safe.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_');
        if !starts_ok || KEYWORDS.contains(&safe.as_str()) {
            safe.insert(0, '_');
        }
        safe
    }

    /// Install or remove the trace relay
    pub fn set_tracing(&mut self, enabled: bool) {
        let interp = self.console.interpreter_mut();
        match (enabled, &self.sink) {
            (true, Some(sink)) => {
                let filter = FrameFilter::from_config(&self.config.trace);
                interp.set_observer(Some(Box::new(TraceRelay::new(filter, sink.clone()))));
                info!("Tracing enabled");
            }
            (true, None) => warn!("Tracing requested before a host was bound"),
            (false, _) => {
                if interp.set_observer(None).is_some() {
                    info!("Tracing disabled");
                }
            }
        }
    }

    /// Whether the trace relay is installed
    pub fn is_tracing(&self) -> bool {
        self.console.interpreter().has_observer()
    }

    /// Request shutdown; safe to call repeatedly
    pub fn teardown(&self) {
        self.shutdown.trigger();
    }

    /// Block until teardown has been requested
    pub fn await_shutdown(&self) {
        self.shutdown.wait();
    }

    fn globals(&self) -> &crate::script::Namespace {
        self.console.interpreter().globals()
    }
}
