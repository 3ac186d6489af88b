//! Defines a [`Span`] which is used to represent a region in the template
//! source code.

use std::cmp::{max, min};
use std::ops::{Index, Range};

/// A byte range in the template source that a node was parsed from.
///
/// Nodes constructed without source information carry [`Span::EMPTY`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub m: usize,
    pub n: usize,
}

impl Span {
    pub const EMPTY: Span = Span { m: 0, n: 0 };

    pub const fn new(m: usize, n: usize) -> Self {
        Self { m, n }
    }

    pub fn combine(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let m = min(self.m, other.m);
        let n = max(self.n, other.n);
        Self { m, n }
    }

    pub const fn is_empty(&self) -> bool {
        self.m == self.n
    }
}

impl Index<Span> for str {
    type Output = str;

    fn index(&self, span: Span) -> &Self::Output {
        let Span { m, n } = span;
        &self[m..n]
    }
}

impl From<Range<usize>> for Span {
    fn from(r: Range<usize>) -> Self {
        Self {
            m: r.start,
            n: r.end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_ignores_empty_spans() {
        let a = Span::new(3, 7);
        assert_eq!(a.combine(Span::EMPTY), a);
        assert_eq!(Span::EMPTY.combine(a), a);
        assert_eq!(a.combine(Span::new(5, 12)), Span::new(3, 12));
    }
}
