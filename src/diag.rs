use std::fmt::{Display, Formatter, Result as FmtResult};

use thiserror::Error;

use crate::cimport::ImportError;
use crate::ir::VerifyIrError;
use crate::irgen::IrGenError;
use crate::typecheck::TypeCheckError;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    TypeCheck(#[from] TypeCheckError),

    #[error(transparent)]
    IrGen(#[from] IrGenError),

    #[error(transparent)]
    VerifyIr(#[from] VerifyIrError),

    #[error(transparent)]
    Import(#[from] ImportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self { offset, line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

impl Default for Span {
    fn default() -> Self {
        let origin = Position {
            offset: 0,
            line: 1,
            column: 1,
        };
        Self {
            start: origin,
            end: origin,
        }
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// An error kind paired with the source span it was reported at.
///
/// Each pass defines its own kind enum and aliases this wrapper, e.g.
/// `type TypeCheckError = SpannedError<TypeCheckErrorKind>`.
#[derive(Debug, Clone)]
pub struct SpannedError<K> {
    kind: K,
    span: Span,
}

impl<K> SpannedError<K> {
    pub fn new(kind: K, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }
}

impl<K: Display> Display for SpannedError<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        self.kind.fmt(f)
    }
}

impl<K: Display + std::fmt::Debug> std::error::Error for SpannedError<K> {}

fn build_marker(len: usize, single_line: bool) -> String {
    if single_line && len == 1 {
        "^".to_string()
    } else {
        "-".repeat(len.max(1))
    }
}

/// Formats an error message with a source snippet and marker lines highlighting
/// the span.
///
/// Single-line spans get a caret (^) for a single char, dashes for multi-char.
/// Multi-line spans underline each covered line with dashes aligned to the
/// span start/end columns.
///
/// Example:
/// ```text
/// (3:9) use of moved value 'v'
/// │ 3 │ consume(v);
/// │   │         ^
/// ```
pub fn format_error(source: &str, span: Span, error: impl Display) -> String {
    let start_line = span.start.line.max(1);
    let end_line = span.end.line.max(start_line);
    let lines: Vec<&str> = source.lines().collect();
    let number_width = end_line.to_string().len();

    let mut out = String::new();
    out.push_str(&format!(
        "({}:{}) {}\n",
        span.start.line, span.start.column, error
    ));

    let single_line = start_line == end_line;

    for line_no in start_line..=end_line {
        let content = lines.get(line_no - 1).copied().unwrap_or("");
        out.push_str(&format!(
            "│ {:>number_width$} │ {}\n",
            line_no,
            content,
            number_width = number_width
        ));

        let start_col = if line_no == span.start.line {
            span.start.column.max(1)
        } else {
            1
        };
        let end_col_excl = if line_no == span.end.line {
            span.end.column.max(start_col)
        } else {
            content.chars().count() + 1
        };

        if end_col_excl > start_col {
            let len = end_col_excl - start_col;
            let mut marker = String::with_capacity(start_col - 1 + len);
            marker.push_str(&" ".repeat(start_col - 1));
            marker.push_str(&build_marker(len, single_line));
            out.push_str(&format!(
                "│ {:>number_width$} │ {}\n",
                "",
                marker,
                number_width = number_width
            ));
        }
    }
    out
}
