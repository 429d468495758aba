//! Source handling for Tiger code.

mod parsing;

pub use parsing::{Rule, TigerParser};

/// A half-open range of byte offsets into a source file.
///
/// Synthesized nodes (the wrapper `main`, the runtime primitives) carry
/// [`Span::nowhere`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Span {
    /// The offset of the first byte.
    pub lo: u32,
    /// The offset one past the last byte.
    pub hi: u32,
}

impl Span {
    /// The span of nodes that have no source location.
    pub fn nowhere() -> Self {
        Self::default()
    }

    /// Join two spans into one covering both.
    pub fn to(self, other: Span) -> Self {
        Self { lo: self.lo, hi: other.hi }
    }
}

impl From<pest::Span<'_>> for Span {
    fn from(span: pest::Span<'_>) -> Self {
        Self {
            lo: span.start() as u32,
            hi: span.end() as u32,
        }
    }
}

/// Compute the 1-based line and column of a byte offset.
pub fn line_col(text: &str, offset: u32) -> (u32, u32) {
    let offset = offset as usize;
    let (mut line, mut col) = (1, 1);
    for (index, ch) in text.char_indices() {
        if index >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}
