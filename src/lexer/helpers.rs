//! Pure helper functions for lexer operations
//!
//! Stateless scanning primitives shared by the recognizers and the quote and
//! expansion parsers. Everything here is a pure function over
//! `(input, position)`; all state manipulation lives in the recognizers and
//! the driver.

use std::collections::HashMap;

use crate::lexer::token::{QuoteKind, TokenType};
use crate::lexer::unicode::{is_identifier_char, is_identifier_start, is_whitespace};

/// Special single-character variables: `$?`, `$$`, `$!`, `$#`, `$@`, `$*`,
/// `$-`, `$0`..`$9`.
pub fn is_special_variable(c: char) -> bool {
    matches!(c, '?' | '$' | '!' | '#' | '@' | '*' | '-') || c.is_ascii_digit()
}

/// Result of processing one escape sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Escaped {
    pub text: String,
    /// Set for `\$` outside quotes: the dollar is literal and must never be
    /// treated as an expansion by later passes.
    pub literal_dollar: bool,
}

impl Escaped {
    fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), literal_dollar: false }
    }
}

/// Read characters until `target` is found.
///
/// When `escape` is true a backslash consumes the next character, which is
/// included literally.
pub fn read_until_char(input: &[char], start: usize, target: char, escape: bool) -> (String, usize) {
    let mut content = String::new();
    let mut pos = start;

    while pos < input.len() && input[pos] != target {
        if escape && input[pos] == '\\' && pos + 1 < input.len() {
            pos += 1;
            content.push(input[pos]);
            pos += 1;
        } else {
            content.push(input[pos]);
            pos += 1;
        }
    }

    (content, pos)
}

/// Find a matching closing delimiter, handling nesting.
///
/// `start` is the position just after the opening delimiter. When
/// `track_quotes` is set, delimiters inside `'…'` and `"…"` are ignored; when
/// `track_escapes` is set, backslash-escaped characters are skipped.
/// Returns `(position_after_close, found)`.
pub fn find_closing_delimiter(
    input: &[char],
    start: usize,
    open: char,
    close: char,
    track_quotes: bool,
    track_escapes: bool,
) -> (usize, bool) {
    let mut depth = 1usize;
    let mut pos = start;
    let mut in_single = false;
    let mut in_double = false;

    while pos < input.len() && depth > 0 {
        let c = input[pos];

        if track_escapes && c == '\\' && pos + 1 < input.len() {
            pos += 2;
            continue;
        }

        if track_quotes {
            if c == '\'' && !in_double {
                in_single = !in_single;
                pos += 1;
                continue;
            }
            if c == '"' && !in_single {
                in_double = !in_double;
                pos += 1;
                continue;
            }
        }

        if !in_single && !in_double {
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return (pos + 1, true);
                }
            }
        }

        pos += 1;
    }

    (pos, false)
}

/// Find balanced parentheses starting just after an opening `(`.
pub fn find_balanced_parentheses(input: &[char], start: usize, track_quotes: bool) -> (usize, bool) {
    find_closing_delimiter(input, start, '(', ')', track_quotes, true)
}

/// Find the closing `))` of an arithmetic expansion.
///
/// Interior `(`/`)` pairs are depth-counted; the expansion ends at the first
/// `))` seen at depth zero. Returns `(position_after_close, found)`.
pub fn find_balanced_double_parentheses(input: &[char], start: usize) -> (usize, bool) {
    let mut depth = 0i32;
    let mut pos = start;

    while pos < input.len() {
        if pos + 1 < input.len() && input[pos] == ')' && input[pos + 1] == ')' {
            if depth == 0 {
                return (pos + 2, true);
            }
            // Unmatched inner paren: consume one ) and re-check the second.
            depth -= 1;
            pos += 1;
            continue;
        }

        match input[pos] {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        pos += 1;
    }

    (pos, false)
}

/// Process one escape sequence at `pos` (which must point at a backslash).
///
/// This is the single place where escape semantics live:
/// - outside quotes: `\c` yields `c`, backslash-newline vanishes (line
///   continuation), `\$` yields a literal dollar tagged on the result;
/// - inside `"…"`: only ``\" \\ \` \$`` and backslash-newline are processed,
///   everything else keeps its backslash;
/// - inside `'…'`: nothing is processed;
/// - inside `$'…'`: the full ANSI-C escape set.
pub fn handle_escape_sequence(input: &[char], pos: usize, quote: Option<QuoteKind>) -> (Escaped, usize) {
    if pos >= input.len() || input[pos] != '\\' {
        return (Escaped::plain("\\"), pos + 1);
    }
    if pos + 1 >= input.len() {
        return (Escaped::plain("\\"), pos + 1);
    }

    let next = input[pos + 1];

    match quote {
        Some(QuoteKind::AnsiC) => handle_ansi_c_escape(input, pos),
        Some(QuoteKind::Double) => match next {
            '\n' => (Escaped::plain(""), pos + 2),
            '"' | '\\' | '`' => (Escaped::plain(next.to_string()), pos + 2),
            // \$ keeps its backslash so the expansion pass sees and skips it
            '$' => (Escaped::plain("\\$"), pos + 2),
            _ => (Escaped::plain(format!("\\{}", next)), pos + 2),
        },
        Some(QuoteKind::Single) | Some(QuoteKind::Mixed) => {
            (Escaped::plain(format!("\\{}", next)), pos + 2)
        }
        None => match next {
            '\n' => (Escaped::plain(""), pos + 2),
            '$' => (Escaped { text: "$".to_string(), literal_dollar: true }, pos + 2),
            _ => (Escaped::plain(next.to_string()), pos + 2),
        },
    }
}

/// ANSI-C escapes for `$'…'`: the simple C set plus `\xHH`, `\0NNN`,
/// `\uHHHH` and `\UHHHHHHHH`.
pub fn handle_ansi_c_escape(input: &[char], pos: usize) -> (Escaped, usize) {
    if pos + 1 >= input.len() {
        return (Escaped::plain("\\"), pos + 1);
    }

    let next = input[pos + 1];

    let simple = match next {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        'b' => Some('\u{8}'),
        'f' => Some('\u{c}'),
        'v' => Some('\u{b}'),
        'a' => Some('\u{7}'),
        '\\' => Some('\\'),
        '\'' => Some('\''),
        '"' => Some('"'),
        '?' => Some('?'),
        'e' | 'E' => Some('\u{1b}'),
        _ => None,
    };
    if let Some(c) = simple {
        return (Escaped::plain(c.to_string()), pos + 2);
    }

    match next {
        'x' => {
            let (digits, end) = take_digits(input, pos + 2, 2, 16);
            if digits.is_empty() {
                (Escaped::plain("\\x"), pos + 2)
            } else {
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(c) => (Escaped::plain(c.to_string()), end),
                    None => (Escaped::plain(format!("\\x{}", digits)), end),
                }
            }
        }
        '0' => {
            let (digits, end) = take_digits(input, pos + 2, 3, 8);
            if digits.is_empty() {
                (Escaped::plain("\0"), pos + 2)
            } else {
                match u32::from_str_radix(&digits, 8).ok().and_then(char::from_u32) {
                    Some(c) => (Escaped::plain(c.to_string()), end),
                    None => (Escaped::plain(format!("\\0{}", digits)), end),
                }
            }
        }
        'u' => unicode_escape(input, pos, 4),
        'U' => unicode_escape(input, pos, 8),
        _ => (Escaped::plain(format!("\\{}", next)), pos + 2),
    }
}

fn unicode_escape(input: &[char], pos: usize, width: usize) -> (Escaped, usize) {
    let marker = input[pos + 1];
    let (digits, end) = take_digits(input, pos + 2, width, 16);
    if digits.len() == width {
        match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
            Some(c) => (Escaped::plain(c.to_string()), end),
            None => (Escaped::plain(format!("\\{}{}", marker, digits)), end),
        }
    } else {
        (Escaped::plain(format!("\\{}{}", marker, digits)), end)
    }
}

fn take_digits(input: &[char], start: usize, max: usize, radix: u32) -> (String, usize) {
    let mut out = String::new();
    let mut pos = start;
    while pos < input.len() && out.len() < max && input[pos].is_digit(radix) {
        out.push(input[pos]);
        pos += 1;
    }
    (out, pos)
}

/// Extract content from a quoted string.
///
/// `start` is the position just after the opening quote. Returns
/// `(content, position_after_close, found_closing)`.
pub fn extract_quoted_content(
    input: &[char],
    start: usize,
    quote_char: char,
    allow_escapes: bool,
) -> (String, usize, bool) {
    let mut content = String::new();
    let mut pos = start;

    while pos < input.len() {
        let c = input[pos];

        if c == quote_char {
            return (content, pos + 1, true);
        }

        if allow_escapes && c == '\\' && pos + 1 < input.len() {
            let quote = match quote_char {
                '"' => Some(QuoteKind::Double),
                '\'' => Some(QuoteKind::Single),
                _ => None,
            };
            let (escaped, new_pos) = handle_escape_sequence(input, pos, quote);
            content.push_str(&escaped.text);
            pos = new_pos;
        } else {
            content.push(c);
            pos += 1;
        }
    }

    (content, pos, false)
}

/// Extract the longest valid variable name starting at `start` (just after
/// the `$`). Single-character specials are consumed as-is.
pub fn extract_variable_name(input: &[char], start: usize, posix_mode: bool) -> (String, usize) {
    if start >= input.len() {
        return (String::new(), start);
    }

    let c = input[start];
    if is_special_variable(c) {
        return (c.to_string(), start + 1);
    }

    let mut name = String::new();
    let mut pos = start;
    if is_identifier_start(c, posix_mode) {
        name.push(c);
        pos += 1;
        while pos < input.len() && is_identifier_char(input[pos], posix_mode) {
            name.push(input[pos]);
            pos += 1;
        }
    }

    (name, pos)
}

/// Check if `#` at the given position starts a comment.
///
/// Comments start at the beginning of input or after whitespace/operator
/// characters, never mid-word (`file#1` is a single word).
pub fn is_comment_start(input: &[char], pos: usize) -> bool {
    if pos >= input.len() || input[pos] != '#' {
        return false;
    }
    if pos == 0 {
        return true;
    }
    matches!(
        input[pos - 1],
        ' ' | '\t' | '\n' | ';' | '|' | '&' | '<' | '>' | '(' | ')' | '{' | '}' | '[' | ']'
    )
}

/// Scan past whitespace, returning the position after the run.
pub fn scan_whitespace(input: &[char], start: usize, unicode_aware: bool) -> usize {
    let mut pos = start;
    while pos < input.len() && is_whitespace(input[pos], !unicode_aware) {
        pos += 1;
    }
    pos
}

/// Greedy longest-match lookup over a length-indexed operator table.
pub fn find_operator_match(
    input: &[char],
    pos: usize,
    operators_by_length: &HashMap<usize, HashMap<&'static str, TokenType>>,
) -> Option<(String, TokenType, usize)> {
    let mut lengths: Vec<usize> = operators_by_length.keys().copied().collect();
    lengths.sort_unstable_by(|a, b| b.cmp(a));

    for len in lengths {
        if pos + len <= input.len() {
            let candidate: String = input[pos..pos + len].iter().collect();
            if let Some(&kind) = operators_by_length[&len].get(candidate.as_str()) {
                return Some((candidate, kind, pos + len));
            }
        }
    }
    None
}

/// Validate and extract a `${…}` body with brace nesting.
///
/// `start` is the position just after `${`. Returns
/// `(content, position_after_close, found_closing)`.
pub fn validate_brace_expansion(input: &[char], start: usize) -> (String, usize, bool) {
    let mut content = String::new();
    let mut pos = start;
    let mut depth = 1usize;

    while pos < input.len() {
        let c = input[pos];
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return (content, pos + 1, true);
                }
            }
            _ => {}
        }
        content.push(c);
        pos += 1;
    }

    (content, pos, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_read_until_char() {
        let input = chars("abc;def");
        let (content, pos) = read_until_char(&input, 0, ';', false);
        assert_eq!(content, "abc");
        assert_eq!(pos, 3);
    }

    #[test]
    fn test_read_until_char_with_escapes() {
        let input = chars("a\\;b;c");
        let (content, pos) = read_until_char(&input, 0, ';', true);
        assert_eq!(content, "a;b");
        assert_eq!(pos, 4);
    }

    #[test]
    fn test_find_closing_delimiter_nested() {
        let input = chars("a (b) c) tail");
        let (pos, found) = find_closing_delimiter(&input, 0, '(', ')', true, true);
        assert!(found);
        assert_eq!(pos, 8);
    }

    #[test]
    fn test_find_closing_delimiter_ignores_quoted() {
        let input = chars("echo ')' x) rest");
        let (pos, found) = find_closing_delimiter(&input, 0, '(', ')', true, true);
        assert!(found);
        assert_eq!(pos, 11);
    }

    #[test]
    fn test_find_closing_delimiter_unclosed() {
        let input = chars("never closes");
        let (_, found) = find_closing_delimiter(&input, 0, '(', ')', true, true);
        assert!(!found);
    }

    #[test]
    fn test_find_balanced_double_parentheses() {
        // body of $((1 + (2 * 3))) after the $((
        let input = chars("1 + (2 * 3))) tail");
        let (pos, found) = find_balanced_double_parentheses(&input, 0);
        assert!(found);
        // ends after the outer ))
        assert_eq!(pos, 13);
    }

    #[test]
    fn test_double_parens_with_inner_group() {
        // body of $(((1 + 2))) after the $((
        let input = chars("(1 + 2)))");
        let (pos, found) = find_balanced_double_parentheses(&input, 0);
        assert!(found);
        assert_eq!(pos, 9);
    }

    #[test]
    fn test_escape_outside_quotes() {
        let input = chars("\\n");
        let (e, pos) = handle_escape_sequence(&input, 0, None);
        assert_eq!(e.text, "n");
        assert_eq!(pos, 2);
    }

    #[test]
    fn test_escape_line_continuation() {
        let input = chars("\\\nx");
        let (e, _) = handle_escape_sequence(&input, 0, None);
        assert_eq!(e.text, "");
    }

    #[test]
    fn test_escaped_dollar_outside_quotes_is_literal() {
        let input = chars("\\$HOME");
        let (e, pos) = handle_escape_sequence(&input, 0, None);
        assert_eq!(e.text, "$");
        assert!(e.literal_dollar);
        assert_eq!(pos, 2);
    }

    #[test]
    fn test_escape_in_double_quotes() {
        let input = chars("\\\"");
        let (e, _) = handle_escape_sequence(&input, 0, Some(QuoteKind::Double));
        assert_eq!(e.text, "\"");

        // \$ keeps its backslash inside double quotes
        let input = chars("\\$");
        let (e, _) = handle_escape_sequence(&input, 0, Some(QuoteKind::Double));
        assert_eq!(e.text, "\\$");

        // unknown escapes keep the backslash
        let input = chars("\\x");
        let (e, _) = handle_escape_sequence(&input, 0, Some(QuoteKind::Double));
        assert_eq!(e.text, "\\x");
    }

    #[test]
    fn test_ansi_c_simple_escapes() {
        let input = chars("\\n");
        let (e, _) = handle_escape_sequence(&input, 0, Some(QuoteKind::AnsiC));
        assert_eq!(e.text, "\n");

        let input = chars("\\e");
        let (e, _) = handle_escape_sequence(&input, 0, Some(QuoteKind::AnsiC));
        assert_eq!(e.text, "\u{1b}");
    }

    #[test]
    fn test_ansi_c_hex_octal_unicode() {
        let input = chars("\\x41");
        let (e, pos) = handle_ansi_c_escape(&input, 0);
        assert_eq!(e.text, "A");
        assert_eq!(pos, 4);

        let input = chars("\\0101");
        let (e, _) = handle_ansi_c_escape(&input, 0);
        assert_eq!(e.text, "A");

        let input = chars("\\u00e9");
        let (e, _) = handle_ansi_c_escape(&input, 0);
        assert_eq!(e.text, "é");

        let input = chars("\\U0001F600");
        let (e, _) = handle_ansi_c_escape(&input, 0);
        assert_eq!(e.text, "\u{1F600}");
    }

    #[test]
    fn test_extract_quoted_content() {
        let input = chars("hello' rest");
        let (content, pos, closed) = extract_quoted_content(&input, 0, '\'', false);
        assert_eq!(content, "hello");
        assert_eq!(pos, 6);
        assert!(closed);
    }

    #[test]
    fn test_extract_quoted_content_unclosed() {
        let input = chars("no end");
        let (_, _, closed) = extract_quoted_content(&input, 0, '\'', false);
        assert!(!closed);
    }

    #[test]
    fn test_extract_variable_name() {
        let input = chars("USER rest");
        let (name, pos) = extract_variable_name(&input, 0, false);
        assert_eq!(name, "USER");
        assert_eq!(pos, 4);
    }

    #[test]
    fn test_extract_special_variable() {
        let input = chars("?next");
        let (name, pos) = extract_variable_name(&input, 0, false);
        assert_eq!(name, "?");
        assert_eq!(pos, 1);

        let input = chars("1rest");
        let (name, pos) = extract_variable_name(&input, 0, false);
        assert_eq!(name, "1");
        assert_eq!(pos, 1);
    }

    #[test]
    fn test_extract_variable_name_invalid_start() {
        let input = chars(" x");
        let (name, pos) = extract_variable_name(&input, 0, false);
        assert_eq!(name, "");
        assert_eq!(pos, 0);
    }

    #[test]
    fn test_is_comment_start() {
        assert!(is_comment_start(&chars("# hi"), 0));
        assert!(is_comment_start(&chars("ls # hi"), 3));
        assert!(is_comment_start(&chars("(# x"), 1));
        assert!(!is_comment_start(&chars("file#1"), 4));
    }

    #[test]
    fn test_validate_brace_expansion() {
        let input = chars("VAR:-${DEF}} tail");
        let (content, pos, closed) = validate_brace_expansion(&input, 0);
        assert!(closed);
        assert_eq!(content, "VAR:-${DEF}");
        assert_eq!(pos, 12);
    }

    #[test]
    fn test_scan_whitespace() {
        let input = chars("  \t x");
        assert_eq!(scan_whitespace(&input, 0, false), 4);
    }

    #[test]
    fn test_find_operator_match_prefers_longest() {
        use crate::lexer::recognizers::operator::OPERATORS_BY_LENGTH;

        let input = chars("&& rest");
        let (op, kind, end) = find_operator_match(&input, 0, &OPERATORS_BY_LENGTH).unwrap();
        assert_eq!(op, "&&");
        assert_eq!(kind, TokenType::AndAnd);
        assert_eq!(end, 2);

        let input = chars("<<<x");
        let (op, kind, _) = find_operator_match(&input, 0, &OPERATORS_BY_LENGTH).unwrap();
        assert_eq!(op, "<<<");
        assert_eq!(kind, TokenType::HereString);

        let input = chars("abc");
        assert!(find_operator_match(&input, 0, &OPERATORS_BY_LENGTH).is_none());
    }
}
