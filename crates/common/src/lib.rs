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

//! EASE Common - Shared functionality for the scripting bridge
//!
//! This crate provides the pieces shared by the engine crate and the bridge
//! binary: the wire types exchanged with the host, the bridge configuration
//! and the logging setup.

/// Wire types exchanged with the host: transferable values, execution results and trace events
pub mod types;

/// Bridge configuration loaded from TOML files and overridden by the command line
pub mod config;
/// Logging setup and utilities for consistent logging across bridge components
pub mod logging;

pub use config::*;
pub use logging::*;
pub use types::*;
