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

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Prefix of handles that name a package root on the host.
pub const PACKAGE_HANDLE_PREFIX: &str = "package:";

/// Opaque reference to an object living in the host process.
///
/// The bridge never interprets the identifier beyond the well-known
/// `package:` form; it is handed back to the host verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteHandle(String);

impl RemoteHandle {
    /// Wrap a host-assigned identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Handle of a host package root such as `java` (empty name = the whole root)
    pub fn package(name: &str) -> Self {
        Self(format!("{PACKAGE_HANDLE_PREFIX}{name}"))
    }

    /// The raw identifier
    pub fn id(&self) -> &str {
        &self.0
    }

    /// Whether this handle names a package root
    pub fn is_package(&self) -> bool {
        self.0.starts_with(PACKAGE_HANDLE_PREFIX)
    }
}

impl fmt::Display for RemoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value that can be transferred across the host boundary.
///
/// Serialized as `{"type": "...", "value": ...}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum HostValue {
    /// Absence of a value
    #[default]
    None,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// Double precision float
    Float(f64),
    /// UTF-8 string
    Str(String),
    /// Ordered sequence
    List(Vec<HostValue>),
    /// String-keyed mapping
    Map(BTreeMap<String, HostValue>),
    /// Object that lives on the host
    Remote(RemoteHandle),
}

impl HostValue {
    /// Whether this is [`HostValue::None`]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Borrow the string payload, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer payload, if any
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Remote handle payload, if any
    pub fn as_remote(&self) -> Option<&RemoteHandle> {
        match self {
            Self::Remote(handle) => Some(handle),
            _ => None,
        }
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<RemoteHandle> for HostValue {
    fn from(value: RemoteHandle) -> Self {
        Self::Remote(value)
    }
}
