//! Equality and ordering between two values.
//!
//! Comparison is defined only for matching capability pairs: number/number,
//! date/date of the same known kind, scalar/scalar through the locale
//! collation and boolean/boolean. Everything else is a type mismatch.

use std::cmp::Ordering;

use crate::value::{Capabilities, Date, DateKind, Number, Value};
use crate::{Error, Result};

/// The comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

enum Operand {
    Number(Number),
    Date(Date),
    Scalar(String),
    Bool(bool),
}

/// Compares two values with the given operator.
///
/// `collate` orders two strings according to the active locale.
pub(crate) fn compare(
    lhs: &Value,
    rhs: &Value,
    op: CompareOp,
    collate: &dyn Fn(&str, &str) -> Ordering,
) -> Result<bool> {
    let (a, b) = operands(lhs, rhs, op)?;
    let ordering = match (a, b) {
        (Operand::Number(a), Operand::Number(b)) => match a.partial_cmp_num(b) {
            Some(ord) => ord,
            // NaN is unequal to everything and unordered.
            None => return Ok(op == CompareOp::Ne),
        },
        (Operand::Date(a), Operand::Date(b)) => {
            if a.kind == DateKind::Unknown || b.kind == DateKind::Unknown {
                return Err(Error::type_mismatch(
                    "cannot compare dates of unknown kind; use ?date, ?time or ?datetime",
                ));
            }
            if a.kind != b.kind {
                return Err(Error::type_mismatch(format!(
                    "cannot compare a {} with a {}",
                    date_kind_name(a.kind),
                    date_kind_name(b.kind)
                )));
            }
            a.millis.cmp(&b.millis)
        }
        (Operand::Scalar(a), Operand::Scalar(b)) => collate(&a, &b),
        (Operand::Bool(a), Operand::Bool(b)) => {
            if !matches!(op, CompareOp::Eq | CompareOp::Ne) {
                return Err(Error::type_mismatch(
                    "booleans can only be compared for equality",
                ));
            }
            a.cmp(&b)
        }
        _ => return Err(Error::internal("comparison operands of different kinds")),
    };
    Ok(match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
    })
}

/// Picks the first capability both sides share, in order of precedence.
fn operands(lhs: &Value, rhs: &Value, op: CompareOp) -> Result<(Operand, Operand)> {
    let shared = lhs.capabilities() & rhs.capabilities();
    if shared.contains(Capabilities::NUMBER) {
        if let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) {
            return Ok((Operand::Number(a), Operand::Number(b)));
        }
    }
    if shared.contains(Capabilities::DATE) {
        if let (Some(a), Some(b)) = (as_date(lhs), as_date(rhs)) {
            return Ok((Operand::Date(a), Operand::Date(b)));
        }
    }
    if shared.contains(Capabilities::SCALAR) {
        if let (Some(a), Some(b)) = (as_scalar(lhs), as_scalar(rhs)) {
            return Ok((Operand::Scalar(a), Operand::Scalar(b)));
        }
    }
    if shared.contains(Capabilities::BOOLEAN) {
        if let (Some(a), Some(b)) = (as_bool(lhs), as_bool(rhs)) {
            return Ok((Operand::Bool(a), Operand::Bool(b)));
        }
    }
    Err(Error::type_mismatch(format!(
        "cannot compare {} {} {}",
        lhs.kind_name(),
        op.symbol(),
        rhs.kind_name()
    )))
}

fn as_number(v: &Value) -> Option<Number> {
    match v {
        Value::Number(n) => Some(*n),
        Value::Object(obj) => obj.to_number(),
        _ => None,
    }
}

fn as_date(v: &Value) -> Option<Date> {
    match v {
        Value::Date(d) => Some(*d),
        Value::Object(obj) => obj.to_date(),
        _ => None,
    }
}

fn as_scalar(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.to_scalar(),
        Value::Node(node) => node.text(),
        _ => None,
    }
}

fn as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Object(obj) => obj.to_bool(),
        _ => None,
    }
}

pub(crate) fn date_kind_name(kind: DateKind) -> &'static str {
    match kind {
        DateKind::Date => "date",
        DateKind::Time => "time",
        DateKind::DateTime => "date-time",
        DateKind::Unknown => "date of unknown kind",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(a: impl Into<Value>, op: CompareOp, b: impl Into<Value>) -> Result<bool> {
        compare(&a.into(), &b.into(), op, &|a, b| a.cmp(b))
    }

    #[test]
    fn numbers_compare_across_int_and_float() {
        assert!(cmp(1, CompareOp::Eq, 1.0).unwrap());
        assert!(cmp(1, CompareOp::Lt, 1.5).unwrap());
        assert!(cmp(f64::NAN, CompareOp::Ne, f64::NAN).unwrap());
    }

    #[test]
    fn strings_use_collation() {
        assert!(cmp("a", CompareOp::Lt, "b").unwrap());
        let reversed = compare(
            &Value::from("a"),
            &Value::from("b"),
            CompareOp::Lt,
            &|a, b| b.cmp(a),
        );
        assert!(!reversed.unwrap());
    }

    #[test]
    fn mismatched_pairs_fail() {
        let err = cmp(1, CompareOp::Eq, "1").unwrap_err();
        assert!(err.is_type_mismatch());
        assert_eq!(err.to_string(), "cannot compare number == string");
    }

    #[test]
    fn dates_need_matching_known_kinds() {
        let d = Date::new(0, DateKind::Date);
        let t = Date::new(0, DateKind::Time);
        let u = Date::new(0, DateKind::Unknown);
        assert!(cmp(d, CompareOp::Eq, d).unwrap());
        assert!(cmp(d, CompareOp::Eq, t).unwrap_err().is_type_mismatch());
        assert!(cmp(u, CompareOp::Eq, u).unwrap_err().is_type_mismatch());
    }

    #[test]
    fn booleans_are_not_ordered() {
        assert!(cmp(true, CompareOp::Ne, false).unwrap());
        let err = cmp(true, CompareOp::Lt, false).unwrap_err();
        assert!(err.is_type_mismatch());
    }
}
