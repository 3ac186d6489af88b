//! Traits that host values implement to take part in rendering.
//!
//! Bridging arbitrary host types into the template language is the host's
//! job. Any type that implements one of these traits can be placed in the data
//! model and is used through the capabilities it declares.

use std::fmt;
use std::sync::Arc;

use crate::render::{Body, Environment, Unwind};
use crate::value::{Capabilities, Date, Map, Number, Value};
use crate::{Error, Result};

/// A host object satisfying any combination of capabilities.
///
/// Only the methods matching the declared [`Capabilities`] are consulted. The
/// defaults report "not supported" so implementors override just what they
/// provide.
pub trait Object: fmt::Debug + Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// The string form, for [`Capabilities::SCALAR`].
    fn to_scalar(&self) -> Option<String> {
        None
    }

    /// For [`Capabilities::NUMBER`].
    fn to_number(&self) -> Option<Number> {
        None
    }

    /// For [`Capabilities::BOOLEAN`].
    fn to_bool(&self) -> Option<bool> {
        None
    }

    /// For [`Capabilities::DATE`].
    fn to_date(&self) -> Option<Date> {
        None
    }

    /// Looks up a key, for [`Capabilities::HASH`].
    ///
    /// `Ok(None)` means the key is absent, which is different from a key that
    /// maps to [`Value::Null`].
    fn get(&self, _key: &str) -> Result<Option<Value>> {
        Ok(None)
    }

    /// All keys, for [`Capabilities::ENUMERABLE_HASH`].
    fn keys(&self) -> Option<Vec<Value>> {
        None
    }

    /// All values, for [`Capabilities::ENUMERABLE_HASH`].
    fn values(&self) -> Option<Vec<Value>> {
        None
    }

    /// Indexes, for [`Capabilities::SEQUENCE`].
    fn get_index(&self, _index: usize) -> Result<Option<Value>> {
        Ok(None)
    }

    /// The number of elements, for [`Capabilities::SEQUENCE`].
    fn len(&self) -> Option<usize> {
        None
    }

    /// Produces the elements lazily, for [`Capabilities::COLLECTION`].
    ///
    /// A collection may be single-pass; returning `None` on a second call
    /// makes the renderer report the collection as exhausted.
    fn iter(self: Arc<Self>) -> Option<Box<dyn Iterator<Item = Value>>> {
        None
    }

    /// Invokes the object, for [`Capabilities::METHOD`].
    fn call(&self, _args: Vec<Value>) -> Result<Value> {
        Err(Error::type_mismatch("object is not callable"))
    }
}

/// A host callable taking positional arguments.
pub trait Method: Send + Sync {
    fn call(&self, args: Vec<Value>) -> Result<Value>;
}

impl<F> Method for F
where
    F: Fn(Vec<Value>) -> Result<Value> + Send + Sync,
{
    fn call(&self, args: Vec<Value>) -> Result<Value> {
        self(args)
    }
}

/// A host directive invoked with `<@name ...>`.
///
/// The directive receives its named parameters and, when the call site has
/// nested content, a [`Body`] that renders that content in the caller's
/// scope. Loop variables declared at the call site (`<@name ; a, b>`) are fed
/// through [`Body::render_with`].
pub trait Directive: Send + Sync {
    fn execute(
        &self,
        env: &mut Environment<'_>,
        params: Map<String, Value>,
        body: Option<Body>,
    ) -> std::result::Result<(), Unwind>;
}

/// A node in a host document tree, for example a parsed XML element.
pub trait Node: fmt::Debug + Send + Sync {
    /// The node name; for elements the tag name.
    fn name(&self) -> String;

    /// The node kind, for example `"element"`, `"text"` or `"document"`.
    fn kind(&self) -> String;

    fn namespace(&self) -> Option<String> {
        None
    }

    fn parent(&self) -> Option<Arc<dyn Node>>;

    fn children(&self) -> Vec<Arc<dyn Node>>;

    /// The text content of text-like nodes.
    fn text(&self) -> Option<String> {
        None
    }

    /// Hash-style access, for example attributes.
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }
}
