//! Converts host data into a [`Value`] through [`serde::Serialize`].
//!
//! This is the object-wrapping service for plain host data: structs become
//! hashes, sequences become lists and so on. Host types that need richer
//! capabilities implement [`Object`][crate::value::Object] instead.

use serde::ser::{Error as _, Serialize};

use crate::value::{List, Map, Number};
use crate::{Error, Result, Value};

/// Convert a `T` to a `Value`.
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
pub fn to_value<T>(value: T) -> Result<Value>
where
    T: Serialize,
{
    value.serialize(Serializer)
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(Number::Int(i)) => serializer.serialize_i64(*i),
            Value::Number(Number::Float(f)) => serializer.serialize_f64(*f),
            Value::String(string) => serializer.serialize_str(string),
            Value::Date(date) => serializer.serialize_i64(date.millis),
            Value::List(list) => list.serialize(serializer),
            Value::Map(map) => {
                use serde::ser::SerializeMap;
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
            Value::Node(node) => match node.text() {
                Some(text) => serializer.serialize_str(&text),
                None => serializer.serialize_str(&node.name()),
            },
            Value::Object(obj) => match obj.to_scalar() {
                Some(s) => serializer.serialize_str(&s),
                None => Err(S::Error::custom("cannot serialize a host object")),
            },
            v @ (Value::Macro(_)
            | Value::Namespace(_)
            | Value::Method(_)
            | Value::Directive(_)) => Err(S::Error::custom(format!(
                "cannot serialize a {}",
                v.kind_name()
            ))),
        }
    }
}

/// Serializer whose output is a `Value`.
///
/// This serializer serializes a `T: Serialize` to a `Value`.
pub struct Serializer;

impl serde::Serializer for Serializer {
    type Ok = Value;
    type Error = Error;

    type SerializeSeq = SerializeList;
    type SerializeTuple = SerializeList;
    type SerializeTupleStruct = SerializeList;
    type SerializeTupleVariant = SerializeList;

    type SerializeMap = SerializeHash;
    type SerializeStruct = SerializeHash;
    type SerializeStructVariant = SerializeHash;

    fn serialize_bool(self, v: bool) -> Result<Self::Ok> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Self::Ok> {
        Ok(Value::int(i64::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<Self::Ok> {
        Ok(Value::int(i64::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<Self::Ok> {
        Ok(Value::int(i64::from(v)))
    }

    fn serialize_i64(self, v: i64) -> Result<Self::Ok> {
        Ok(Value::int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Self::Ok> {
        Ok(Value::int(i64::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<Self::Ok> {
        Ok(Value::int(i64::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<Self::Ok> {
        Ok(Value::int(i64::from(v)))
    }

    fn serialize_u64(self, v: u64) -> Result<Self::Ok> {
        Ok(Value::from(v))
    }

    fn serialize_f32(self, v: f32) -> Result<Self::Ok> {
        Ok(Value::Number(Number::Float(f64::from(v))))
    }

    fn serialize_f64(self, v: f64) -> Result<Self::Ok> {
        Ok(Value::Number(Number::Float(v)))
    }

    fn serialize_char(self, v: char) -> Result<Self::Ok> {
        Ok(Value::String(String::from(v)))
    }

    fn serialize_str(self, v: &str) -> Result<Self::Ok> {
        Ok(Value::String(String::from(v)))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok> {
        Ok(Value::List(
            v.iter()
                .copied()
                .map(i64::from)
                .map(Value::int)
                .collect(),
        ))
    }

    fn serialize_none(self) -> Result<Self::Ok> {
        self.serialize_unit()
    }

    fn serialize_some<T: ?Sized>(self, value: &T) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Self::Ok> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Self::Ok> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: ?Sized>(self, _name: &'static str, value: &T) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        Ok(tagged(Some(variant), to_value(value)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq> {
        Ok(SerializeList::new(None, len.unwrap_or(0)))
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Ok(SerializeList::new(Some(variant), len))
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap> {
        Ok(SerializeHash::new(None))
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<Self::SerializeStruct> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Ok(SerializeHash::new(Some(variant)))
    }
}

/// Wraps `value` in a single entry hash keyed by the enum variant, if any.
fn tagged(variant: Option<&'static str>, value: Value) -> Value {
    match variant {
        Some(name) => Value::Map(Map::from([(name.to_owned(), value)])),
        None => value,
    }
}

/// Collects sequences, tuples and tuple variants into a list.
pub struct SerializeList {
    variant: Option<&'static str>,
    items: List<Value>,
}

impl SerializeList {
    fn new(variant: Option<&'static str>, len: usize) -> Self {
        Self {
            variant,
            items: List::with_capacity(len),
        }
    }

    fn push<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.items.push(to_value(value)?);
        Ok(())
    }

    fn finish(self) -> Result<Value> {
        Ok(tagged(self.variant, Value::List(self.items)))
    }
}

impl serde::ser::SerializeSeq for SerializeList {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        self.finish()
    }
}

impl serde::ser::SerializeTuple for SerializeList {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        self.finish()
    }
}

impl serde::ser::SerializeTupleStruct for SerializeList {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        self.finish()
    }
}

impl serde::ser::SerializeTupleVariant for SerializeList {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        self.finish()
    }
}

/// Collects maps, structs and struct variants into a hash.
pub struct SerializeHash {
    variant: Option<&'static str>,
    entries: Map<String, Value>,
    pending_key: Option<String>,
}

impl SerializeHash {
    fn new(variant: Option<&'static str>) -> Self {
        Self {
            variant,
            entries: Map::new(),
            pending_key: None,
        }
    }

    fn finish(self) -> Result<Value> {
        Ok(tagged(self.variant, Value::Map(self.entries)))
    }
}

/// Hash keys are strings; integers, booleans and unit variants are
/// stringified, anything else is rejected.
fn hash_key<T>(key: &T) -> Result<String>
where
    T: ?Sized + Serialize,
{
    match key.serialize(Serializer)? {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(Number::Int(i)) => Ok(i.to_string()),
        _ => Err(Error::custom("hash key must be a string, number or boolean")),
    }
}

impl serde::ser::SerializeMap for SerializeHash {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.pending_key = Some(hash_key(key)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| Error::custom("hash value serialized before its key"))?;
        self.entries.insert(key, to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        self.finish()
    }
}

impl serde::ser::SerializeStruct for SerializeHash {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.entries.insert(key.to_owned(), to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        self.finish()
    }
}

impl serde::ser::SerializeStructVariant for SerializeHash {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        serde::ser::SerializeStruct::serialize_field(self, key, value)
    }

    fn end(self) -> Result<Value> {
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize)]
    struct User {
        name: &'static str,
        age: u64,
        nick: Option<&'static str>,
    }

    #[derive(serde::Serialize)]
    enum Shape {
        Circle { r: f32 },
        Point(i32, i32),
    }

    #[test]
    fn struct_becomes_hash() {
        let v = to_value(User {
            name: "Ann",
            age: 41,
            nick: None,
        })
        .unwrap();
        let Value::Map(map) = v else {
            panic!("expected map");
        };
        assert_eq!(map["name"], Value::from("Ann"));
        assert_eq!(map["age"], Value::from(41));
        assert_eq!(map["nick"], Value::Null);
    }

    #[test]
    fn large_unsigned_becomes_float() {
        assert_eq!(
            to_value(u64::MAX).unwrap(),
            Value::Number(Number::Float(u64::MAX as f64))
        );
    }

    #[test]
    fn struct_variant_is_wrapped_in_hash() {
        let v = to_value(Shape::Circle { r: 1.5 }).unwrap();
        let Value::Map(map) = v else {
            panic!("expected map");
        };
        assert!(matches!(map.get("Circle"), Some(Value::Map(_))));
    }

    #[test]
    fn tuple_variant_is_wrapped_in_hash() {
        let v = to_value(Shape::Point(1, 2)).unwrap();
        let Value::Map(map) = v else {
            panic!("expected map");
        };
        assert_eq!(
            map.get("Point"),
            Some(&Value::List(vec![Value::from(1), Value::from(2)]))
        );
    }

    struct FloatKeyed;

    impl Serialize for FloatKeyed {
        fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            use serde::ser::SerializeMap;
            let mut m = serializer.serialize_map(Some(1))?;
            m.serialize_entry(&1.5, &1)?;
            m.end()
        }
    }

    #[test]
    fn float_keys_are_rejected() {
        let err = to_value(FloatKeyed).unwrap_err();
        assert!(err.to_string().contains("hash key must be a string"));
    }
}
