use std::cmp::Ordering;
use std::fmt;

use crate::{Error, Result};

/// A numeric value.
///
/// Integer arithmetic is checked; an operation that would overflow is carried
/// out in floating point instead.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    /// Returns the value as an integer if it has no fractional part.
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Number::Int(i) => Some(i),
            Number::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some(f as i64),
            Number::Float(_) => None,
        }
    }

    pub fn is_int(self) -> bool {
        matches!(self, Number::Int(_))
    }

    pub fn add(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => match a.checked_add(b) {
                Some(i) => Number::Int(i),
                None => Number::Float(a as f64 + b as f64),
            },
            (a, b) => Number::Float(a.as_f64() + b.as_f64()),
        }
    }

    pub fn sub(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => match a.checked_sub(b) {
                Some(i) => Number::Int(i),
                None => Number::Float(a as f64 - b as f64),
            },
            (a, b) => Number::Float(a.as_f64() - b.as_f64()),
        }
    }

    pub fn mul(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => match a.checked_mul(b) {
                Some(i) => Number::Int(i),
                None => Number::Float(a as f64 * b as f64),
            },
            (a, b) => Number::Float(a.as_f64() * b.as_f64()),
        }
    }

    /// Divides, yielding an integer only when the division is exact.
    pub fn div(self, rhs: Number) -> Result<Number> {
        if rhs.is_zero() {
            return Err(Error::invalid("division by zero"));
        }
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) if a.checked_rem(b) == Some(0) => {
                let exact = a.checked_div(b).map(Number::Int);
                Ok(exact.unwrap_or(Number::Float(a as f64 / b as f64)))
            }
            (a, b) => Ok(Number::Float(a.as_f64() / b.as_f64())),
        }
    }

    pub fn rem(self, rhs: Number) -> Result<Number> {
        if rhs.is_zero() {
            return Err(Error::invalid("division by zero"));
        }
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => {
                Ok(a.checked_rem(b).map_or(Number::Int(0), Number::Int))
            }
            (a, b) => Ok(Number::Float(a.as_f64() % b.as_f64())),
        }
    }

    pub fn neg(self) -> Number {
        match self {
            Number::Int(i) => match i.checked_neg() {
                Some(n) => Number::Int(n),
                None => Number::Float(-(i as f64)),
            },
            Number::Float(f) => Number::Float(-f),
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Int(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }

    /// Numeric ordering, `None` when either side is NaN.
    pub fn partial_cmp_num(self, rhs: Number) -> Option<Ordering> {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl From<i64> for Number {
    fn from(i: i64) -> Self {
        Number::Int(i)
    }
}

impl From<f64> for Number {
    fn from(f: f64) -> Self {
        Number::Float(f)
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp_num(*other) == Some(Ordering::Equal)
    }
}

/// The canonical, locale independent rendering of a number.
impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(x) if x.is_nan() => f.write_str("NaN"),
            Number::Float(x) if x.is_infinite() && x > 0.0 => f.write_str("INF"),
            Number::Float(x) if x.is_infinite() => f.write_str("-INF"),
            Number::Float(x) => write!(f, "{x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_overflow_promotes_to_float() {
        let n = Number::Int(i64::MAX).add(Number::Int(1));
        assert!(!n.is_int());
        assert_eq!(Number::Int(2).mul(Number::Int(3)), Number::Int(6));
    }

    #[test]
    fn exact_division_stays_integral() {
        assert!(Number::Int(6).div(Number::Int(3)).unwrap().is_int());
        let n = Number::Int(7).div(Number::Int(2)).unwrap();
        assert_eq!(n, Number::Float(3.5));
        let err = Number::Int(1).div(Number::Int(0)).unwrap_err();
        assert!(err.is_invalid_operation());
    }

    #[test]
    fn display_is_canonical() {
        assert_eq!(Number::Int(3).to_string(), "3");
        assert_eq!(Number::Float(3.0).to_string(), "3");
        assert_eq!(Number::Float(0.25).to_string(), "0.25");
        assert_eq!(Number::Float(f64::INFINITY).to_string(), "INF");
    }
}
