//! Defines a [`Span`] which is used to represent a region in the template
//! source code.

use std::cmp::{max, min};
use std::ops::{Index, Range};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub m: usize,
    pub n: usize,
}

/// A resolved position in the template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// The byte offset.
    pub offset: usize,
    /// The one based line number.
    pub line: usize,
    /// The zero based column, in characters.
    pub column: usize,
}

impl Span {
    pub fn combine(self, other: Self) -> Self {
        let m = min(self.m, other.m);
        let n = max(self.n, other.n);
        Self { m, n }
    }

    pub const fn len(self) -> usize {
        self.n - self.m
    }

    pub const fn is_empty(self) -> bool {
        self.m == self.n
    }

    /// Resolves the start of the span to a line and column.
    pub fn start(self, source: &str) -> Location {
        let offset = min(self.m, source.len());
        let before = source.get(..offset).unwrap_or_default();
        let line = before.bytes().filter(|b| *b == b'\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(i) => before[i + 1..].chars().count(),
            None => before.chars().count(),
        };
        Location {
            offset,
            line,
            column,
        }
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
    fn span_start_location() {
        let source = "ab\ncd\nef";
        let loc = Span::from(4..5).start(source);
        assert_eq!(
            loc,
            Location {
                offset: 4,
                line: 2,
                column: 1
            }
        );
        assert_eq!(Span::from(0..1).start(source).line, 1);
        assert_eq!(Span::from(99..99).start(source).line, 3);
    }
}
