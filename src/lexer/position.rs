//! Position tracking and lexical errors
//!
//! Positions are 0-based offsets with 1-based line/column. The tracker walks
//! the input once and remembers each line's starting offset so later lookups
//! are a binary search, not a rescan.

use std::fmt;

/// A position in the input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Absolute offset in input (0-based, in chars)
    pub offset: usize,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
}

impl Position {
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self { offset, line, column }
    }

    pub fn start() -> Self {
        Self { offset: 0, line: 1, column: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Maps char offsets to line/column positions.
///
/// Built once per tokenization run from the full input.
#[derive(Debug, Clone)]
pub struct PositionTracker {
    /// Offset of the first char of each line
    line_starts: Vec<usize>,
    len: usize,
}

impl PositionTracker {
    pub fn new(input: &[char]) -> Self {
        let mut line_starts = vec![0];
        for (i, &c) in input.iter().enumerate() {
            if c == '\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts, len: input.len() }
    }

    /// Resolve an offset into a full Position. Offsets past the end clamp to
    /// the end of input.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Position {
            offset,
            line: line_idx + 1,
            column: offset - self.line_starts[line_idx] + 1,
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// States for the lexer state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerState {
    Normal,
    InWord,
    InSingleQuote,
    InDoubleQuote,
    InVariable,
    InBraceVar,
    InCommandSub,
    InArithmetic,
    InBacktick,
    InComment,
}

/// Lexical error with position and a rendered context snippet.
#[derive(Debug, Clone)]
pub struct LexerError {
    pub message: String,
    pub position: Position,
    pub snippet: String,
}

impl LexerError {
    pub fn new(message: impl Into<String>, position: Position, input: &str) -> Self {
        let message = message.into();
        let snippet = render_context(input, position);
        Self { message, position, snippet }
    }

    /// Error without source context (used when the input is unavailable).
    pub fn bare(message: impl Into<String>, position: Position) -> Self {
        Self { message: message.into(), position, snippet: String::new() }
    }
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.snippet.is_empty() {
            write!(f, "{}: {}", self.position, self.message)
        } else {
            write!(f, "{}: {}\n{}", self.position, self.message, self.snippet)
        }
    }
}

impl std::error::Error for LexerError {}

/// Error that allows continued tokenization in interactive mode.
///
/// Records where the driver should resume and the state to reset to.
#[derive(Debug, Clone)]
pub struct RecoverableLexerError {
    pub error: LexerError,
    pub recovery_position: usize,
    pub recovery_state: LexerState,
}

impl RecoverableLexerError {
    pub fn new(error: LexerError, recovery_position: usize) -> Self {
        Self { error, recovery_position, recovery_state: LexerState::Normal }
    }
}

/// Render two lines of context either side of the error with a caret under
/// the offending column.
fn render_context(input: &str, position: Position) -> String {
    let lines: Vec<&str> = input.split('\n').collect();
    if lines.is_empty() || position.line == 0 {
        return String::new();
    }

    let start_line = position.line.saturating_sub(2).max(1);
    let end_line = (position.line + 2).min(lines.len());

    let mut out = String::new();
    for line_num in start_line..=end_line {
        let content = lines.get(line_num - 1).copied().unwrap_or("");
        let prefix = if line_num == position.line { "> " } else { "  " };
        out.push_str(&format!("{}{:4} | {}\n", prefix, line_num, content));
        if line_num == position.line {
            out.push_str(&format!("       | {}^\n", " ".repeat(position.column.saturating_sub(1))));
        }
    }
    out
}
