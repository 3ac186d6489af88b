//! Type tests, hash and node built-ins.

use std::sync::Arc;

use super::Builtin;
use crate::render::Environment;
use crate::value::{Capabilities, Node, Value};
use crate::{Error, Result};

pub(super) static BUILTINS: &[Builtin] = &[
    Builtin::pure("is_string", (0, 0), is_string),
    Builtin::pure("is_number", (0, 0), is_number),
    Builtin::pure("is_boolean", (0, 0), is_boolean),
    Builtin::pure("is_date", (0, 0), is_date),
    Builtin::pure("is_hash", (0, 0), is_hash),
    Builtin::pure("is_hash_ex", (0, 0), is_hash_ex),
    Builtin::pure("is_sequence", (0, 0), is_sequence),
    Builtin::pure("is_collection", (0, 0), is_collection),
    Builtin::pure("is_macro", (0, 0), is_macro),
    Builtin::pure("is_method", (0, 0), is_method),
    Builtin::pure("is_directive", (0, 0), is_directive),
    Builtin::pure("is_node", (0, 0), is_node),
    Builtin::pure("keys", (0, 0), keys),
    Builtin::pure("values", (0, 0), values),
    Builtin::impure("node_name", (0, 0), node_name),
    Builtin::impure("node_type", (0, 0), node_type),
    Builtin::impure("node_namespace", (0, 0), node_namespace),
    Builtin::impure("parent", (0, 0), parent),
    Builtin::impure("children", (0, 0), children),
    Builtin::impure("root", (0, 0), root),
];

fn has(v: &Value, caps: Capabilities) -> Result<Value> {
    Ok(Value::Bool(v.is(caps)))
}

fn is_string(_: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    has(&v, Capabilities::SCALAR)
}

fn is_number(_: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    has(&v, Capabilities::NUMBER)
}

fn is_boolean(_: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    has(&v, Capabilities::BOOLEAN)
}

fn is_date(_: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    has(&v, Capabilities::DATE)
}

fn is_hash(_: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    has(&v, Capabilities::HASH)
}

fn is_hash_ex(_: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    has(&v, Capabilities::ENUMERABLE_HASH)
}

fn is_sequence(_: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    has(&v, Capabilities::SEQUENCE)
}

fn is_collection(_: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    has(&v, Capabilities::COLLECTION)
}

fn is_macro(_: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(matches!(v, Value::Macro(_))))
}

fn is_method(_: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    has(&v, Capabilities::METHOD)
}

fn is_directive(_: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    has(&v, Capabilities::DIRECTIVE)
}

fn is_node(_: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    has(&v, Capabilities::NODE)
}

fn keys(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    Ok(env.to_entries(&v)?.into_iter().map(|(k, _)| k).collect())
}

fn values(env: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    Ok(env.to_entries(&v)?.into_iter().map(|(_, v)| v).collect())
}

fn node(v: &Value) -> Result<&Arc<dyn Node>> {
    match v {
        Value::Node(node) => Ok(node),
        _ => Err(Error::expected("node", v.kind_name())),
    }
}

fn node_name(_: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    Ok(Value::String(node(&v)?.name()))
}

fn node_type(_: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    Ok(Value::String(node(&v)?.kind()))
}

fn node_namespace(_: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    Ok(Value::from(node(&v)?.namespace()))
}

fn parent(_: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    Ok(node(&v)?.parent().map_or(Value::Null, Value::Node))
}

fn children(_: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    Ok(Value::List(
        node(&v)?.children().into_iter().map(Value::Node).collect(),
    ))
}

fn root(_: &mut Environment<'_>, v: Value, _: Vec<Value>) -> Result<Value> {
    let mut current = node(&v)?.clone();
    while let Some(parent) = current.parent() {
        current = parent;
    }
    Ok(Value::Node(current))
}
