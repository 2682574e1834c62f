//! Quote parsing
//!
//! A single rule-driven parser handles every quote form (`'…'`, `"…"`,
//! `$'…'`, `` `…` ``), producing token parts that preserve quoting metadata.
//! Expansion handling inside double quotes is delegated to the expansion
//! parser so `"hello $USER"` comes back as two parts.

use crate::lexer::config::LexerConfig;
use crate::lexer::expansion;
use crate::lexer::helpers;
use crate::lexer::position::PositionTracker;
use crate::lexer::token::{ExpansionKind, QuoteKind, TokenPart};

/// Parsing rules for one quote form.
#[derive(Debug, Clone, Copy)]
pub struct QuoteRules {
    /// The closing delimiter
    pub quote_char: char,
    pub kind: QuoteKind,
    /// Process `$…` and backtick expansions inside the quotes
    pub allow_expansions: bool,
    pub allows_newlines: bool,
}

pub const DOUBLE_QUOTE_RULES: QuoteRules = QuoteRules {
    quote_char: '"',
    kind: QuoteKind::Double,
    allow_expansions: true,
    allows_newlines: true,
};

pub const SINGLE_QUOTE_RULES: QuoteRules = QuoteRules {
    quote_char: '\'',
    kind: QuoteKind::Single,
    allow_expansions: false,
    allows_newlines: true,
};

/// ANSI-C `$'…'`: closing quote is a plain `'`, full C escape set.
pub const ANSI_C_RULES: QuoteRules = QuoteRules {
    quote_char: '\'',
    kind: QuoteKind::AnsiC,
    allow_expansions: false,
    allows_newlines: true,
};

/// Result of parsing one quoted region.
#[derive(Debug)]
pub struct ParsedQuote {
    pub parts: Vec<TokenPart>,
    /// Position after the closing quote (or end of input when unclosed)
    pub end: usize,
    pub closed: bool,
}

/// Parse a quoted string, starting just after the opening delimiter.
///
/// Emits one literal part per contiguous literal run and one part per
/// embedded expansion. An empty quoted string yields a single empty literal
/// part so `""` survives word splitting.
pub fn parse_quoted_string(
    input: &[char],
    start: usize,
    rules: &QuoteRules,
    tracker: &PositionTracker,
    config: &LexerConfig,
) -> ParsedQuote {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut literal_start = start;
    let mut pos = start;

    macro_rules! flush_literal {
        ($end:expr) => {
            if !literal.is_empty() || parts.is_empty() {
                parts.push(
                    TokenPart::literal(
                        std::mem::take(&mut literal),
                        tracker.position(literal_start),
                        tracker.position($end),
                    )
                    .with_quote(rules.kind),
                );
            }
        };
    }

    while pos < input.len() {
        let c = input[pos];

        if c == rules.quote_char {
            flush_literal!(pos);
            return ParsedQuote { parts, end: pos + 1, closed: true };
        }

        if rules.allow_expansions && c == '$' {
            if !literal.is_empty() {
                flush_literal!(pos);
            }
            let (part, new_pos) =
                expansion::parse_expansion(input, pos, Some(rules.kind), tracker, config);
            parts.push(part);
            literal_start = new_pos;
            pos = new_pos;
            continue;
        }

        if rules.allow_expansions && c == '`' && config.enable_backtick_quotes {
            if !literal.is_empty() {
                flush_literal!(pos);
            }
            let (part, new_pos) = parse_backtick_substitution(input, pos, tracker);
            parts.push(part);
            literal_start = new_pos;
            pos = new_pos;
            continue;
        }

        if c == '\\' && rules.kind != QuoteKind::Single {
            let (escaped, new_pos) = helpers::handle_escape_sequence(input, pos, Some(rules.kind));
            literal.push_str(&escaped.text);
            pos = new_pos;
            continue;
        }

        literal.push(c);
        pos += 1;
    }

    flush_literal!(pos);
    ParsedQuote { parts, end: pos, closed: false }
}

/// Parse a backtick command substitution starting at the opening backtick.
///
/// Inside backticks only ``\\ \` \$`` are escapes; everything else is
/// literal. The part value keeps the full `` `…` `` text.
pub fn parse_backtick_substitution(
    input: &[char],
    start: usize,
    tracker: &PositionTracker,
) -> (TokenPart, usize) {
    let mut value = String::from("`");
    let mut pos = start + 1;
    let mut closed = false;

    while pos < input.len() {
        let c = input[pos];
        if c == '`' {
            value.push('`');
            pos += 1;
            closed = true;
            break;
        }
        if c == '\\' && pos + 1 < input.len() && matches!(input[pos + 1], '\\' | '`' | '$') {
            value.push(input[pos + 1]);
            pos += 2;
            continue;
        }
        value.push(c);
        pos += 1;
    }

    let kind = if closed { ExpansionKind::Backtick } else { ExpansionKind::BacktickUnclosed };
    let mut part = TokenPart::expansion(value, kind, tracker.position(start), tracker.position(pos));
    if !closed {
        part.error = Some("unclosed backtick substitution".to_string());
    }
    (part, pos)
}
