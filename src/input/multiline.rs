//! Multi-line input assembly
//!
//! Decides whether accumulated interactive input forms a complete command.
//! The classifier is deterministic and conservative: it checks line
//! continuations, open quotes, unmatched parens, open control structures,
//! trailing operators, and pending heredocs, in that order.

use std::env;

use crate::lexer::{tokenize_tolerant, TokenType};

const DEFAULT_PS1: &str = "jsh$ ";
const DEFAULT_PS2: &str = "> ";

/// Buffer of input lines being assembled into one command.
#[derive(Debug, Default)]
pub struct MultiLineBuffer {
    lines: Vec<String>,
}

impl MultiLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) {
        self.lines.push(line.trim_end_matches('\n').to_string());
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The accumulated input, newline-joined.
    pub fn joined(&self) -> String {
        self.lines.join("\n")
    }

    /// True when the accumulated input is a complete command.
    pub fn is_complete(&self) -> bool {
        is_complete_command(&self.joined())
    }

    /// Primary prompt for the first line, continuation prompt afterwards.
    pub fn prompt(&self) -> String {
        if self.lines.is_empty() {
            env::var("PS1").unwrap_or_else(|_| DEFAULT_PS1.to_string())
        } else {
            env::var("PS2").unwrap_or_else(|_| DEFAULT_PS2.to_string())
        }
    }

    /// One-line form for history recall: control-structure lines joined with
    /// `; `, original whitespace within each line preserved.
    pub fn history_entry(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.as_str())
            .filter(|l| !l.trim().is_empty())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Take the completed command out of the buffer.
    pub fn take(&mut self) -> String {
        let joined = self.joined();
        self.lines.clear();
        joined
    }
}

/// Classify `text` as a complete command or a fragment needing more input.
pub fn is_complete_command(text: &str) -> bool {
    if text.trim().is_empty() {
        return true;
    }

    // 1. Trailing unescaped backslash: explicit line continuation
    if let Some(last) = text.lines().last() {
        if ends_with_line_continuation(last) {
            return false;
        }
    }

    // 2. Open quote state ('", `)
    let scan = scan_quotes_and_parens(text);
    if scan.open_quote.is_some() {
        return false;
    }

    // 3. Unmatched open parens (subshells, $( and $(( )
    if scan.paren_depth > 0 {
        return false;
    }

    // 4. Open control structures, counted over a tolerant tokenization
    let tokens = tokenize_tolerant(text);
    if open_structure_count(&tokens) > 0 {
        return false;
    }

    // 5. A trailing pipe or logical operator expects another command
    if let Some(kind) = last_significant_token(&tokens) {
        if matches!(
            kind,
            TokenType::Pipe | TokenType::PipeAnd | TokenType::AndAnd | TokenType::OrOr
        ) {
            return false;
        }
    }

    // 6. Pending heredocs
    if has_pending_heredocs(text) {
        return false;
    }

    true
}

/// True when the line ends with an odd number of backslashes.
fn ends_with_line_continuation(line: &str) -> bool {
    let trailing = line.chars().rev().take_while(|&c| c == '\\').count();
    trailing % 2 == 1
}

struct QuoteScan {
    open_quote: Option<char>,
    paren_depth: i32,
}

/// Track quote state and unquoted paren depth across the whole text.
fn scan_quotes_and_parens(text: &str) -> QuoteScan {
    let chars: Vec<char> = text.chars().collect();
    let mut open_quote: Option<char> = None;
    let mut paren_depth = 0i32;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match open_quote {
            Some('\'') => {
                if c == '\'' {
                    open_quote = None;
                }
            }
            Some(q) => {
                // " and ` respect backslash escapes
                if c == '\\' && i + 1 < chars.len() {
                    i += 2;
                    continue;
                }
                if c == q {
                    open_quote = None;
                }
            }
            None => match c {
                '\\' if i + 1 < chars.len() => {
                    i += 2;
                    continue;
                }
                '\'' | '"' | '`' => open_quote = Some(c),
                '#' => {
                    // comment runs to end of line
                    while i < chars.len() && chars[i] != '\n' {
                        i += 1;
                    }
                    continue;
                }
                '(' => paren_depth += 1,
                ')' => paren_depth = (paren_depth - 1).max(0),
                _ => {}
            },
        }
        i += 1;
    }

    QuoteScan { open_quote, paren_depth }
}

/// Net count of open control structures: `if…fi`, loop…`done`,
/// `case…esac`, `{…}`, `((…))`.
fn open_structure_count(tokens: &[crate::lexer::Token]) -> i32 {
    let mut if_depth = 0i32;
    let mut loop_depth = 0i32;
    let mut case_depth = 0i32;
    let mut brace_depth = 0i32;
    let mut arith_depth = 0i32;

    for token in tokens {
        match token.kind {
            TokenType::If => if_depth += 1,
            TokenType::Fi => if_depth -= 1,
            TokenType::While | TokenType::Until | TokenType::For | TokenType::Select => {
                loop_depth += 1
            }
            TokenType::Done => loop_depth -= 1,
            TokenType::Case => case_depth += 1,
            TokenType::Esac => case_depth -= 1,
            TokenType::LBrace => brace_depth += 1,
            TokenType::RBrace => brace_depth -= 1,
            TokenType::DoubleLParen => arith_depth += 1,
            TokenType::DoubleRParen => arith_depth -= 1,
            _ => {}
        }
    }

    if_depth.max(0) + loop_depth.max(0) + case_depth.max(0) + brace_depth.max(0) + arith_depth.max(0)
}

fn last_significant_token(tokens: &[crate::lexer::Token]) -> Option<TokenType> {
    tokens
        .iter()
        .rev()
        .map(|t| t.kind)
        .find(|k| !matches!(k, TokenType::Eof | TokenType::Newline))
}

/// Cheap heredoc pre-scan: collect `<<`/`<<-` delimiters line by line and
/// consume terminator lines in order. True while any delimiter is still
/// waiting for its terminator.
fn has_pending_heredocs(text: &str) -> bool {
    let mut pending: Vec<(String, bool)> = Vec::new();

    for line in text.split('\n') {
        if let Some((delimiter, strip_tabs)) = pending.first() {
            let candidate = if *strip_tabs {
                line.trim_start_matches('\t')
            } else {
                line
            };
            if candidate == delimiter {
                pending.remove(0);
            }
            continue;
        }
        collect_heredoc_delimiters(line, &mut pending);
    }

    !pending.is_empty()
}

/// Scan one line for heredoc operators outside quotes and push their
/// delimiters.
fn collect_heredoc_delimiters(line: &str, pending: &mut Vec<(String, bool)>) {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    let mut in_single = false;
    let mut in_double = false;

    while i < chars.len() {
        let c = chars[i];
        if in_single {
            if c == '\'' {
                in_single = false;
            }
            i += 1;
            continue;
        }
        if in_double {
            if c == '\\' && i + 1 < chars.len() {
                i += 2;
                continue;
            }
            if c == '"' {
                in_double = false;
            }
            i += 1;
            continue;
        }
        match c {
            '\'' => in_single = true,
            '"' => in_double = true,
            '\\' if i + 1 < chars.len() => {
                i += 2;
                continue;
            }
            '#' => return,
            '<' if chars.get(i + 1) == Some(&'<') => {
                // <<< is a here-string, not a heredoc
                if chars.get(i + 2) == Some(&'<') {
                    i += 3;
                    continue;
                }
                let strip_tabs = chars.get(i + 2) == Some(&'-');
                let mut p = i + if strip_tabs { 3 } else { 2 };
                while p < chars.len() && matches!(chars[p], ' ' | '\t') {
                    p += 1;
                }
                let mut delimiter = String::new();
                while p < chars.len() {
                    let d = chars[p];
                    if d.is_whitespace() || matches!(d, ';' | '<' | '>' | '&' | '|' | '(' | ')') {
                        break;
                    }
                    match d {
                        '\'' | '"' => {
                            let quote = d;
                            p += 1;
                            while p < chars.len() && chars[p] != quote {
                                delimiter.push(chars[p]);
                                p += 1;
                            }
                            if p < chars.len() {
                                p += 1;
                            }
                        }
                        '\\' => {
                            p += 1;
                            if p < chars.len() {
                                delimiter.push(chars[p]);
                                p += 1;
                            }
                        }
                        _ => {
                            delimiter.push(d);
                            p += 1;
                        }
                    }
                }
                if !delimiter.is_empty() {
                    pending.push((delimiter, strip_tabs));
                }
                i = p;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
}
