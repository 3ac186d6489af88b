//! Defines the [`Value`] enum, representing any runtime datum a template can
//! observe.
//!
//! A value is classified by the capabilities it satisfies. The built-in
//! variants each satisfy a fixed set; host objects ([`Object`]) may satisfy
//! any combination, for example a value that is both a hash and a sequence.

pub(crate) mod compare;
mod date;
mod from;
mod number;
mod object;
#[cfg(feature = "serde")]
mod ser;

pub use std::collections::BTreeMap as Map;
use std::fmt;
use std::sync::Arc;
use std::vec;
pub use std::vec::Vec as List;

use bitflags::bitflags;

pub use crate::value::date::{Date, DateKind};
pub use crate::value::number::Number;
pub use crate::value::object::{Directive, Method, Node, Object};
#[cfg(feature = "serde")]
pub use crate::value::ser::to_value;

use crate::render::{Macro, NamespaceId};

pub(crate) type ListIntoIter = vec::IntoIter<Value>;

bitflags! {
    /// The structural interfaces a [`Value`] satisfies.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u16 {
        const SCALAR = 1 << 0;
        const NUMBER = 1 << 1;
        const BOOLEAN = 1 << 2;
        const DATE = 1 << 3;
        const HASH = 1 << 4;
        const ENUMERABLE_HASH = 1 << 5;
        const SEQUENCE = 1 << 6;
        const COLLECTION = 1 << 7;
        const METHOD = 1 << 8;
        const DIRECTIVE = 1 << 9;
        const NODE = 1 << 10;
    }
}

/// Data to be rendered represented as a recursive enum.
#[derive(Clone)]
pub enum Value {
    /// The host explicitly returned "no value".
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Date(Date),
    List(List<Value>),
    Map(Map<String, Value>),
    /// A macro or function defined by a template.
    Macro(Arc<Macro>),
    /// A namespace created by `#import`, or the main namespace.
    Namespace(NamespaceId),
    Method(Arc<dyn Method>),
    Directive(Arc<dyn Directive>),
    Object(Arc<dyn Object>),
    Node(Arc<dyn Node>),
}

impl Value {
    /// Returns the set of capabilities this value satisfies.
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Value::Null => Capabilities::empty(),
            Value::Bool(_) => Capabilities::BOOLEAN,
            Value::Number(_) => Capabilities::NUMBER,
            Value::String(_) => Capabilities::SCALAR,
            Value::Date(_) => Capabilities::DATE,
            Value::List(_) => Capabilities::SEQUENCE | Capabilities::COLLECTION,
            Value::Map(_) => Capabilities::HASH | Capabilities::ENUMERABLE_HASH,
            Value::Macro(m) if m.is_function() => Capabilities::METHOD,
            Value::Macro(_) => Capabilities::DIRECTIVE,
            Value::Namespace(_) => Capabilities::HASH | Capabilities::ENUMERABLE_HASH,
            Value::Method(_) => Capabilities::METHOD,
            Value::Directive(_) => Capabilities::DIRECTIVE,
            Value::Object(obj) => obj.capabilities(),
            Value::Node(node) => {
                let mut caps = Capabilities::NODE | Capabilities::HASH;
                if node.text().is_some() {
                    caps |= Capabilities::SCALAR;
                }
                caps
            }
        }
    }

    pub fn is(&self, caps: Capabilities) -> bool {
        self.capabilities().contains(caps)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// A human readable name for the kind of value, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::List(_) => "sequence",
            Value::Map(_) => "hash",
            Value::Macro(m) if m.is_function() => "function",
            Value::Macro(_) => "macro",
            Value::Namespace(_) => "namespace",
            Value::Method(_) => "method",
            Value::Directive(_) => "directive",
            Value::Object(obj) => object_kind_name(obj.capabilities()),
            Value::Node(_) => "node",
        }
    }

    pub(crate) fn int(i: i64) -> Self {
        Value::Number(Number::Int(i))
    }
}

fn object_kind_name(caps: Capabilities) -> &'static str {
    let order = [
        (Capabilities::NODE, "node"),
        (Capabilities::SEQUENCE, "sequence"),
        (Capabilities::ENUMERABLE_HASH, "hash"),
        (Capabilities::HASH, "hash"),
        (Capabilities::COLLECTION, "collection"),
        (Capabilities::METHOD, "method"),
        (Capabilities::DIRECTIVE, "directive"),
        (Capabilities::DATE, "date"),
        (Capabilities::NUMBER, "number"),
        (Capabilities::BOOLEAN, "boolean"),
        (Capabilities::SCALAR, "string"),
    ];
    order
        .iter()
        .find(|(cap, _)| caps.contains(*cap))
        .map(|(_, name)| *name)
        .unwrap_or("object")
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::Date(d) => f.debug_tuple("Date").field(d).finish(),
            Self::List(l) => f.debug_tuple("List").field(l).finish(),
            Self::Map(m) => f.debug_tuple("Map").field(m).finish(),
            Self::Macro(m) => f.debug_tuple("Macro").field(&m.name()).finish(),
            Self::Namespace(id) => f.debug_tuple("Namespace").field(id).finish(),
            Self::Method(_) => f.write_str("Method(..)"),
            Self::Directive(_) => f.write_str("Directive(..)"),
            Self::Object(obj) => f.debug_tuple("Object").field(obj).finish(),
            Self::Node(node) => f.debug_tuple("Node").field(node).finish(),
        }
    }
}

/// Structural equality, used by tests and by hosts comparing data models.
///
/// Template-level comparison lives in the renderer and follows the capability
/// rules instead.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(s), Self::Bool(o)) => s == o,
            (Self::Number(s), Self::Number(o)) => s == o,
            (Self::String(s), Self::String(o)) => s == o,
            (Self::Date(s), Self::Date(o)) => s == o,
            (Self::List(s), Self::List(o)) => s == o,
            (Self::Map(s), Self::Map(o)) => s == o,
            (Self::Macro(s), Self::Macro(o)) => Arc::ptr_eq(s, o),
            (Self::Namespace(s), Self::Namespace(o)) => s == o,
            (Self::Method(s), Self::Method(o)) => {
                std::ptr::addr_eq(Arc::as_ptr(s), Arc::as_ptr(o))
            }
            (Self::Directive(s), Self::Directive(o)) => {
                std::ptr::addr_eq(Arc::as_ptr(s), Arc::as_ptr(o))
            }
            (Self::Object(s), Self::Object(o)) => std::ptr::addr_eq(Arc::as_ptr(s), Arc::as_ptr(o)),
            (Self::Node(s), Self::Node(o)) => std::ptr::addr_eq(Arc::as_ptr(s), Arc::as_ptr(o)),
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct HashAndSeq;

    impl Object for HashAndSeq {
        fn capabilities(&self) -> Capabilities {
            Capabilities::HASH | Capabilities::SEQUENCE
        }
    }

    #[test]
    fn builtin_variant_capabilities() {
        assert!(Value::from("a").is(Capabilities::SCALAR));
        assert!(Value::from(1).is(Capabilities::NUMBER));
        assert!(Value::from(vec![1, 2]).is(Capabilities::SEQUENCE | Capabilities::COLLECTION));
        assert!(Value::Map(Map::new()).is(Capabilities::ENUMERABLE_HASH));
        assert!(Value::Null.capabilities().is_empty());
    }

    #[test]
    fn object_may_satisfy_several_capabilities() {
        let v = Value::Object(Arc::new(HashAndSeq));
        assert!(v.is(Capabilities::HASH));
        assert!(v.is(Capabilities::SEQUENCE));
        assert!(!v.is(Capabilities::SCALAR));
        assert_eq!(v.kind_name(), "sequence");
    }

    #[test]
    fn structural_equality() {
        assert_eq!(Value::from(1), Value::from(1));
        assert_ne!(Value::from(1), Value::from("1"));
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::from(false));
    }
}
