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

//! JSON-RPC server exposing the execution service to the host.
//!
//! - **Server** ([`server`]) - HTTP server and the executor thread
//! - **Methods** ([`methods`]) - method implementations grouped by concern
//! - **Types** ([`types`]) - request/response structures and error codes
//! - **Utils** ([`utils`]) - error helpers and parameter extraction
//!
//! All methods follow JSON-RPC 2.0 with positional parameters and are posted
//! to `/`. `GET /health` reports liveness.
//!
//! ```rust,ignore
//! use ease_engine::rpc::EngineRpcServer;
//!
//! let server = EngineRpcServer::new(config, shutdown.clone());
//! let handle = server.start(host).await?;
//! host_client.startup_complete(handle.port()).await?;
//! ```

pub mod methods;
pub mod server;
pub mod types;
pub mod utils;

pub use server::*;
pub use types::*;
