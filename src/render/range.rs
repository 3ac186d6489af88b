use std::sync::Arc;

use crate::types::expr::RangeKind;
use crate::value::{Capabilities, Object, Value};
use crate::Result;

/// The lazy sequence a range expression like `1..5` evaluates to.
///
/// A range counts down when its end is below its start. A right-unbounded
/// range (`3..`) is a collection only; it has no size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RangeSeq {
    start: i64,
    step: i64,
    len: Option<usize>,
}

impl RangeSeq {
    pub fn new(start: i64, end: i64, kind: RangeKind) -> Self {
        let (start_w, end_w) = (i128::from(start), i128::from(end));
        let step = if end_w >= start_w { 1 } else { -1 };
        let span = (end_w - start_w).abs();
        let len = match kind {
            RangeKind::Inclusive => span + 1,
            RangeKind::Exclusive => span,
            RangeKind::Unbounded => return Self::unbounded(start),
        };
        Self {
            start,
            step,
            len: Some(usize::try_from(len).unwrap_or(usize::MAX)),
        }
    }

    pub fn unbounded(start: i64) -> Self {
        Self {
            start,
            step: 1,
            len: None,
        }
    }

    fn nth(&self, i: usize) -> Option<i64> {
        if self.len.is_some_and(|len| i >= len) {
            return None;
        }
        i64::try_from(i)
            .ok()
            .and_then(|i| self.step.checked_mul(i))
            .and_then(|d| self.start.checked_add(d))
    }
}

impl Object for RangeSeq {
    fn capabilities(&self) -> Capabilities {
        match self.len {
            Some(_) => Capabilities::SEQUENCE | Capabilities::COLLECTION,
            None => Capabilities::COLLECTION,
        }
    }

    fn get_index(&self, index: usize) -> Result<Option<Value>> {
        Ok(self.nth(index).map(Value::int))
    }

    fn len(&self) -> Option<usize> {
        self.len
    }

    fn iter(self: Arc<Self>) -> Option<Box<dyn Iterator<Item = Value>>> {
        Some(Box::new((0..).map_while(move |i| self.nth(i)).map(Value::int)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(range: RangeSeq) -> Vec<i64> {
        (0..).map_while(|i| range.nth(i)).collect()
    }

    #[test]
    fn inclusive_and_exclusive() {
        assert_eq!(
            collect(RangeSeq::new(1, 3, RangeKind::Inclusive)),
            [1, 2, 3]
        );
        assert_eq!(collect(RangeSeq::new(1, 3, RangeKind::Exclusive)), [1, 2]);
        assert!(collect(RangeSeq::new(2, 2, RangeKind::Exclusive)).is_empty());
    }

    #[test]
    fn counts_down() {
        assert_eq!(
            collect(RangeSeq::new(3, 1, RangeKind::Inclusive)),
            [3, 2, 1]
        );
        assert_eq!(collect(RangeSeq::new(3, 1, RangeKind::Exclusive)), [3, 2]);
    }

    #[test]
    fn unbounded_has_no_size() {
        let range = RangeSeq::unbounded(5);
        assert_eq!(range.len(), None);
        assert!(!range.capabilities().contains(Capabilities::SEQUENCE));
        assert_eq!(range.nth(1000), Some(1005));
    }
}
