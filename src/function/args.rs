use crate::function::FunctionArg;
use crate::value::{List, Map, Number};
use crate::Value;

pub type Result<T> = std::result::Result<T, Error>;

pub enum Error {
    /// When there is a type mismatch.
    Type(
        /// Expected
        &'static str,
        /// Got
        &'static str,
    ),
    /// Failed to convert from a number to the integer type.
    TryFromInt(
        /// Type
        &'static str,
        /// Value
        Number,
    ),
}

impl FunctionArg for bool {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Bool(b) => Ok(b),
            v => Err(Error::Type("boolean", v.kind_name())),
        }
    }
}

macro_rules! impl_for_int {
    ($($ty:ty)+) => {
        $(
            impl FunctionArg for $ty {
                fn from_value(v: Value) -> Result<Self> {
                    match v {
                        Value::Number(n) => n
                            .as_i64()
                            .and_then(|i| i.try_into().ok())
                            .ok_or(Error::TryFromInt(stringify!($ty), n)),
                        v => Err(Error::Type(stringify!($ty), v.kind_name())),
                    }
                }
            }
        )+
    };
}

impl_for_int! { u8 u16 u32 u64 usize i8 i16 i32 i64 isize }

macro_rules! impl_for_float {
    ($($ty:ty)+) => {
        $(
            impl FunctionArg for $ty {
                fn from_value(v: Value) -> Result<Self> {
                    match v {
                        Value::Number(n) => Ok(n.as_f64() as $ty),
                        v => Err(Error::Type(stringify!($ty), v.kind_name())),
                    }
                }
            }
        )+
    }
}

impl_for_float! { f32 f64 }

impl FunctionArg for Number {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Number(n) => Ok(n),
            v => Err(Error::Type("number", v.kind_name())),
        }
    }
}

impl FunctionArg for String {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::String(s) => Ok(s),
            v => Err(Error::Type("string", v.kind_name())),
        }
    }
}

impl FunctionArg for List<Value> {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::List(l) => Ok(l),
            v => Err(Error::Type("sequence", v.kind_name())),
        }
    }
}

impl FunctionArg for Map<String, Value> {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Map(m) => Ok(m),
            v => Err(Error::Type("hash", v.kind_name())),
        }
    }
}

impl FunctionArg for Value {
    fn from_value(v: Value) -> Result<Self> {
        Ok(v)
    }
}

impl<T> FunctionArg for Option<T>
where
    T: FunctionArg,
{
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Null => Ok(None),
            v => T::from_value(v).map(Some),
        }
    }
}
