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

use super::{HostValue, RemoteHandle};

/// Prompt returned as the result while an interactive statement is incomplete.
pub const MORE_INPUT_PROMPT: &str = "... - more input required to complete statement";

/// Exception part of an [`InteractiveReturn`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExceptionPayload {
    /// Exception object that lives on the host; rethrow it as is
    Remote {
        /// Handle to the host exception
        handle: RemoteHandle,
        /// Message reported by the host alongside the handle
        message: String,
    },
    /// Locally rendered traceback text
    Text {
        /// Full traceback
        message: String,
    },
}

impl ExceptionPayload {
    /// Human readable form of the exception
    pub fn message(&self) -> &str {
        match self {
            Self::Remote { message, .. } | Self::Text { message } => message,
        }
    }
}

/// Result of one execute call as seen by the host.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InteractiveReturn {
    /// Displayed value, already converted into something transferable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<HostValue>,
    /// Captured exception, if the call failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionPayload>,
}

impl InteractiveReturn {
    /// Result asking the host to send the rest of an incomplete statement
    pub fn more_input() -> Self {
        Self { result: Some(HostValue::Str(MORE_INPUT_PROMPT.to_string())), exception: None }
    }

    /// Whether this result is the more-input prompt
    pub fn needs_more_input(&self) -> bool {
        self.exception.is_none()
            && matches!(&self.result, Some(HostValue::Str(s)) if s == MORE_INPUT_PROMPT)
    }

    /// Whether an exception was captured
    pub fn is_error(&self) -> bool {
        self.exception.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_more_input_result() {
        let ret = InteractiveReturn::more_input();
        assert!(ret.needs_more_input());
        assert!(!ret.is_error());
        assert!(MORE_INPUT_PROMPT.starts_with("..."));
    }

    #[test]
    fn test_exception_wire_shape() {
        let ret = InteractiveReturn {
            result: None,
            exception: Some(ExceptionPayload::Remote {
                handle: RemoteHandle::new("exc:3"),
                message: "java.lang.IllegalStateException".into(),
            }),
        };
        let json = serde_json::to_value(&ret).unwrap();
        assert_eq!(
            json,
            json!({
                "exception": {
                    "kind": "remote",
                    "handle": "exc:3",
                    "message": "java.lang.IllegalStateException"
                }
            })
        );
        let back: InteractiveReturn = serde_json::from_value(json).unwrap();
        assert_eq!(back, ret);
    }
}
