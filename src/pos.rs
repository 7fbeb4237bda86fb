//! Source positions and spans shared by every stage of the front end.

/// A single point in the source file.
///
/// Stored 0-indexed throughout the compiler; rendered 1-indexed in diagnostics
/// (LSP-style internal representation, human-friendly display).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub fn new(row: usize, col: usize) -> Self {
        Pos { row, col }
    }
}

/// A lexical range starting at `pos` and covering `len` columns on `pos.row`.
///
/// Multi-line expressions are clamped to the remainder of their starting line;
/// carets are only ever rendered against a single source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub pos: Pos,
    pub len: usize,
}

impl Span {
    pub fn new(pos: Pos, len: usize) -> Self {
        Span { pos, len: len.max(1) }
    }

    pub fn point(pos: Pos) -> Self {
        Span { pos, len: 1 }
    }

    /// The smallest span covering both `self` and `other`, assuming both start
    /// on the same row (callers on different rows fall back to `self`).
    pub fn merge(self, other: Span) -> Span {
        if self.pos.row != other.pos.row {
            return self;
        }
        let start = self.pos.col.min(other.pos.col);
        let end = (self.pos.col + self.len).max(other.pos.col + other.len);
        Span::new(Pos::new(self.pos.row, start), end - start)
    }
}
