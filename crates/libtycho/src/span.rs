//! Source spans and location arithmetic.
//!
//! Every AST node and diagnostic carries a [`Span`]: a byte range into a
//! specific [`SourceFile`]. Line and column numbers are derived on demand so
//! nothing but the offset has to be threaded through the compiler.

use std::ops::Range;

use crate::file::SourceFile;

/// A byte range within a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    /// The position range in the source file
    pub position: Range<usize>,
    /// The source file this span belongs to
    pub file: SourceFile,
}

impl Span {
    /// Creates a new span with the given position and file.
    pub fn new(position: Range<usize>, file: SourceFile) -> Self {
        Self { position, file }
    }

    /// A zero-length span into a synthetic file, for generated nodes.
    pub fn synthetic() -> Self {
        Self::new(0..0, SourceFile::synthetic("generated"))
    }

    /// Returns the position range of this span.
    pub fn to_range(&self) -> Range<usize> {
        self.position.clone()
    }

    /// Computes the 1-based line and column of the span start.
    pub fn line_col(&self) -> (usize, usize) {
        let mut line = 1;
        let mut col = 1;
        for (offset, ch) in self.file.code().char_indices() {
            if offset >= self.position.start {
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

    /// Renders `file:line:col` for the span start.
    pub fn render_location(&self) -> String {
        let (line, col) = self.line_col();
        format!("{}:{}:{}", self.file.display_path(), line, col)
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render_location())
    }
}
