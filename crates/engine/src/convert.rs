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

//! Conversion of displayed values into host values.

use std::cell::{Cell, RefCell};

use ease_common::HostValue;

use crate::script::Value;

/// Containers nested deeper than this are sent as their representation
pub const MAX_CONVERT_DEPTH: usize = 32;

/// Budget of one conversion, spent one unit per value and one per byte of
/// representation; the rest of the result is elided as `...`
pub const MAX_CONVERT_NODES: usize = 1 << 16;

/// Converts a family of script values into host values
pub trait ResultConverter {
    /// Whether this converter handles `value`
    fn can_convert(&self, value: &Value) -> bool;

    /// Convert `value`; `elements` converts nested values
    fn convert(&self, value: &Value, elements: &dyn Fn(&Value) -> HostValue) -> HostValue;
}

/// Lists become host lists
#[derive(Debug, Default)]
pub struct ListConverter;

impl ResultConverter for ListConverter {
    fn can_convert(&self, value: &Value) -> bool {
        matches!(value, Value::List(_))
    }

    fn convert(&self, value: &Value, elements: &dyn Fn(&Value) -> HostValue) -> HostValue {
        match value {
            Value::List(items) => HostValue::List(items.borrow().iter().map(elements).collect()),
            other => HostValue::Str(other.repr()),
        }
    }
}

/// Maps become host maps
#[derive(Debug, Default)]
pub struct MapConverter;

impl ResultConverter for MapConverter {
    fn can_convert(&self, value: &Value) -> bool {
        matches!(value, Value::Map(_))
    }

    fn convert(&self, value: &Value, elements: &dyn Fn(&Value) -> HostValue) -> HostValue {
        match value {
            Value::Map(entries) => HostValue::Map(
                entries.borrow().iter().map(|(key, value)| (key.clone(), elements(value))).collect(),
            ),
            other => HostValue::Str(other.repr()),
        }
    }
}

/// Ordered list of converters consulted for non-primitive results
pub struct ConverterRegistry {
    converters: Vec<Box<dyn ResultConverter>>,
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry").field("converters", &self.converters.len()).finish()
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self { converters: vec![Box::new(ListConverter), Box::new(MapConverter)] }
    }
}

impl ConverterRegistry {
    /// Registry without any converter; everything falls back to `repr`
    pub fn empty() -> Self {
        Self { converters: Vec::new() }
    }

    /// Append a converter; earlier registrations take precedence
    pub fn register(&mut self, converter: Box<dyn ResultConverter>) {
        self.converters.push(converter);
    }

    /// Pick the host form of a displayed value.
    ///
    /// Transferable values are returned as they are, then the first matching
    /// converter wins, and anything else is sent as its representation.
    /// A container reached again while it is being converted is sent as
    /// `[...]` or `{...}`.
    pub fn convert(&self, value: &Value) -> HostValue {
        let walk = Walk { active: RefCell::new(Vec::new()), nodes: Cell::new(0) };
        self.convert_at(value, 0, &walk)
    }

    fn convert_at(&self, value: &Value, depth: usize, walk: &Walk) -> HostValue {
        walk.nodes.set(walk.nodes.get() + 1);
        if walk.nodes.get() > MAX_CONVERT_NODES {
            return HostValue::Str("...".into());
        }
        if let Some(value) = value.as_transferable() {
            return value;
        }
        let id = value.container_id();
        if let Some(id) = id {
            if walk.active.borrow().contains(&id) {
                let cycle = if matches!(value, Value::Map(_)) { "{...}" } else { "[...]" };
                return HostValue::Str(cycle.into());
            }
        }
        if depth < MAX_CONVERT_DEPTH {
            if let Some(converter) = self.converters.iter().find(|c| c.can_convert(value)) {
                if let Some(id) = id {
                    walk.active.borrow_mut().push(id);
                }
                let converted = converter
                    .convert(value, &|element| self.convert_at(element, depth + 1, walk));
                if id.is_some() {
                    walk.active.borrow_mut().pop();
                }
                return converted;
            }
        }
        let repr = value.repr();
        walk.nodes.set(walk.nodes.get() + repr.len());
        HostValue::Str(repr)
    }
}

/// State of one conversion
struct Walk {
    /// Containers currently being converted
    active: RefCell<Vec<usize>>,
    /// Budget spent so far
    nodes: Cell<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{parse_program, ExecMode, Interpreter};
    use ease_common::RemoteHandle;
    use std::collections::BTreeMap;

    fn eval(source: &str) -> Value {
        let mut interp = Interpreter::with_output(Box::new(std::io::sink()));
        interp.exec(&parse_program(source).unwrap(), "<test>", ExecMode::Block).unwrap();
        interp.globals().get("v").cloned().unwrap()
    }

    #[test]
    fn test_primitives_pass_through() {
        let registry = ConverterRegistry::default();
        assert_eq!(registry.convert(&Value::Int(4)), HostValue::Int(4));
        assert_eq!(registry.convert(&Value::str("hi")), HostValue::Str("hi".into()));
        let handle = RemoteHandle::new("obj:2");
        assert_eq!(registry.convert(&Value::Remote(handle.clone())), HostValue::Remote(handle));
    }

    #[test]
    fn test_containers_use_converters() {
        let registry = ConverterRegistry::default();
        let value = eval("fn f() { return 1 }\nv = {'a': [1, 'x'], 'f': f}");
        let mut expected = BTreeMap::new();
        expected.insert(
            "a".to_string(),
            HostValue::List(vec![HostValue::Int(1), HostValue::Str("x".into())]),
        );
        expected.insert("f".to_string(), HostValue::Str("<function f>".into()));
        assert_eq!(registry.convert(&value), HostValue::Map(expected));
    }

    #[test]
    fn test_fallback_to_repr() {
        let value = eval("v = [1, 2]");
        assert_eq!(ConverterRegistry::empty().convert(&value), HostValue::Str("[1, 2]".into()));

        let value = eval("v = len");
        assert_eq!(
            ConverterRegistry::default().convert(&value),
            HostValue::Str(value.repr())
        );
    }

    #[test]
    fn test_self_referencing_list_terminates() {
        let value = eval("v = [1]\nv.append(v)");
        let HostValue::List(items) = ConverterRegistry::default().convert(&value) else {
            panic!("expected a list");
        };
        assert_eq!(items[0], HostValue::Int(1));
        assert_eq!(items[1], HostValue::Str("[...]".into()));
    }

    #[test]
    fn test_doubly_self_referencing_list_is_linear() {
        let value = eval("v = []\nv.append(v)\nv.append(v)\nm = {}\nm['me'] = m\nv.append(m)");
        let cycle = HostValue::Str("[...]".into());
        let mut inner = BTreeMap::new();
        inner.insert("me".to_string(), HostValue::Str("{...}".into()));
        assert_eq!(
            ConverterRegistry::default().convert(&value),
            HostValue::List(vec![cycle.clone(), cycle, HostValue::Map(inner)])
        );
        assert_eq!(value.repr(), "[[...], [...], {'me': {...}}]");
    }

    #[test]
    fn test_wide_shared_structure_is_elided() {
        let value = eval("v = [1]\ni = 0\nwhile i < 40 {\n  v = [v, v]\n  i = i + 1\n}");
        let converted = ConverterRegistry::default().convert(&value);
        assert!(format!("{converted:?}").contains("Str(\"...\")"));

        let deep = eval("v = [1]\ni = 0\nwhile i < 60 {\n  v = [v, v]\n  i = i + 1\n}");
        assert!(format!("{:?}", ConverterRegistry::default().convert(&deep)).contains("..."));
    }
}
