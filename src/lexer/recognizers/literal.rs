//! Literal (word) recognizer
//!
//! Builds word tokens spanning everything up to the next word terminator,
//! stitching quoted segments and expansions into an ordered part list. Also
//! owns the array-assignment sub-mode that keeps `arr[key]=value` one token.

use crate::lexer::config::LexerConfig;
use crate::lexer::context::LexerContext;
use crate::lexer::expansion;
use crate::lexer::helpers;
use crate::lexer::position::{LexerError, PositionTracker};
use crate::lexer::quotes::{self, ANSI_C_RULES, DOUBLE_QUOTE_RULES};
use crate::lexer::recognizers::{Recognized, Recognizer};
use crate::lexer::token::{ExpansionKind, QuoteKind, Token, TokenPart, TokenType};
use crate::lexer::unicode::validate_identifier;

pub struct LiteralRecognizer;

/// Characters that end a word in the given context.
///
/// Feature-flag modulated: a disabled operator's characters become ordinary
/// word characters.
fn is_word_terminator(c: char, ctx: &LexerContext, config: &LexerConfig) -> bool {
    match c {
        ' ' | '\t' | '\n' | ';' | '(' | ')' => true,
        '|' => config.enable_pipes || config.enable_logical_operators,
        '&' => {
            config.enable_background
                || config.enable_logical_operators
                || config.enable_redirections
        }
        '<' | '>' => config.enable_redirections,
        // Inside [[ ]], brackets close the conditional — except right after
        // =~ where they belong to the regex pattern
        '[' | ']' => ctx.in_double_brackets() && !ctx.after_regex_match,
        _ => false,
    }
}

impl Recognizer for LiteralRecognizer {
    fn priority(&self) -> u32 {
        70
    }

    fn can_recognize(&self, input: &[char], pos: usize, _ctx: &LexerContext) -> bool {
        pos < input.len()
    }

    fn recognize(
        &self,
        input: &[char],
        pos: usize,
        ctx: &mut LexerContext,
        config: &LexerConfig,
        tracker: &PositionTracker,
    ) -> Result<Option<Recognized>, LexerError> {
        let start = pos;
        let mut p = pos;
        let mut parts: Vec<TokenPart> = Vec::new();
        let mut literal = String::new();
        let mut literal_start = pos;

        macro_rules! flush_literal {
            ($end:expr) => {
                if !literal.is_empty() {
                    parts.push(TokenPart::literal(
                        std::mem::take(&mut literal),
                        tracker.position(literal_start),
                        tracker.position($end),
                    ));
                }
            };
        }

        while p < input.len() {
            let c = input[p];

            // Array subscript: NAME[ starts a quote-aware balanced scan so
            // arr[key]=value stays one word
            if c == '['
                && !ctx.in_double_brackets()
                && parts.is_empty()
                && validate_identifier(&literal, config.posix_mode)
            {
                let (end, found) = helpers::find_closing_delimiter(input, p + 1, '[', ']', true, true);
                if found {
                    let segment: String = input[p..end].iter().collect();
                    literal.push_str(&segment);
                    p = end;
                    continue;
                }
            }

            if is_word_terminator(c, ctx, config) {
                break;
            }

            match c {
                '\'' if config.enable_single_quotes => {
                    flush_literal!(p);
                    let (content, end, closed) =
                        helpers::extract_quoted_content(input, p + 1, '\'', false);
                    if !closed {
                        return Err(LexerError::bare(
                            "unexpected EOF while looking for matching `''",
                            tracker.position(p),
                        ));
                    }
                    parts.push(
                        TokenPart::literal(content, tracker.position(p), tracker.position(end))
                            .with_quote(QuoteKind::Single),
                    );
                    literal_start = end;
                    p = end;
                }

                '"' if config.enable_double_quotes => {
                    flush_literal!(p);
                    let parsed =
                        quotes::parse_quoted_string(input, p + 1, &DOUBLE_QUOTE_RULES, tracker, config);
                    if !parsed.closed {
                        return Err(LexerError::bare(
                            "unexpected EOF while looking for matching `\"'",
                            tracker.position(p),
                        ));
                    }
                    parts.extend(parsed.parts);
                    literal_start = parsed.end;
                    p = parsed.end;
                }

                '$' if input.get(p + 1) == Some(&'\'') => {
                    // ANSI-C quoting $'...'
                    flush_literal!(p);
                    let parsed =
                        quotes::parse_quoted_string(input, p + 2, &ANSI_C_RULES, tracker, config);
                    if !parsed.closed {
                        return Err(LexerError::bare(
                            "unexpected EOF while looking for matching `''",
                            tracker.position(p),
                        ));
                    }
                    parts.extend(parsed.parts);
                    literal_start = parsed.end;
                    p = parsed.end;
                }

                '$' if input.get(p + 1) == Some(&'"') => {
                    // Locale string $"..." lexes like a double-quoted string
                    flush_literal!(p);
                    let parsed =
                        quotes::parse_quoted_string(input, p + 2, &DOUBLE_QUOTE_RULES, tracker, config);
                    if !parsed.closed {
                        return Err(LexerError::bare(
                            "unexpected EOF while looking for matching `\"'",
                            tracker.position(p),
                        ));
                    }
                    parts.extend(parsed.parts);
                    literal_start = parsed.end;
                    p = parsed.end;
                }

                '$' => {
                    flush_literal!(p);
                    let (part, end) = expansion::parse_expansion(input, p, None, tracker, config);
                    if part.error.is_some() && config.strict_mode {
                        return Err(LexerError::bare(
                            part.error.unwrap(),
                            tracker.position(p),
                        ));
                    }
                    parts.push(part);
                    literal_start = end;
                    p = end;
                }

                '`' if config.enable_backtick_quotes => {
                    flush_literal!(p);
                    let (part, end) = quotes::parse_backtick_substitution(input, p, tracker);
                    if part.error.is_some() && config.strict_mode {
                        return Err(LexerError::bare(
                            "unexpected EOF while looking for matching ``'",
                            tracker.position(p),
                        ));
                    }
                    parts.push(part);
                    literal_start = end;
                    p = end;
                }

                '\\' => {
                    let (escaped, end) = helpers::handle_escape_sequence(input, p, None);
                    if escaped.literal_dollar {
                        flush_literal!(p);
                        let mut part = TokenPart::literal(
                            "$",
                            tracker.position(p),
                            tracker.position(end),
                        );
                        part.literal_dollar = true;
                        parts.push(part);
                        literal_start = end;
                    } else {
                        literal.push_str(&escaped.text);
                    }
                    p = end;
                }

                // Extended glob @( *( +( ?( !( — consume the balanced pattern
                _ if config.enable_extglob
                    && matches!(c, '@' | '*' | '+' | '?' | '!')
                    && input.get(p + 1) == Some(&'(') =>
                {
                    let (end, found) = helpers::find_balanced_parentheses(input, p + 2, true);
                    if found {
                        let segment: String = input[p..end].iter().collect();
                        literal.push_str(&segment);
                        p = end;
                    } else {
                        literal.push(c);
                        p += 1;
                    }
                }

                _ => {
                    literal.push(c);
                    p += 1;
                }
            }
        }

        flush_literal!(p);

        if parts.is_empty() {
            return Ok(None);
        }

        // After the regex word is consumed, bracket chars terminate again
        if ctx.after_regex_match {
            ctx.after_regex_match = false;
        }

        let token = assemble_token(parts, start, p, tracker);
        Ok(Recognized::token(token, p))
    }
}

/// Decide the token type, value and quote kind from the collected parts.
///
/// The outermost part spans are clamped to the token span so a token always
/// starts where its first part starts and ends where its last part ends,
/// quote marks included.
fn assemble_token(mut parts: Vec<TokenPart>, start: usize, end: usize, tracker: &PositionTracker) -> Token {
    if let Some(first) = parts.first_mut() {
        first.start = tracker.position(start);
    }
    if let Some(last) = parts.last_mut() {
        last.end = tracker.position(end);
    }
    // A single bare expansion becomes a dedicated token type
    if parts.len() == 1 && parts[0].quote.is_none() {
        let part = &parts[0];
        if let Some(kind) = part.expansion {
            let token_kind = match kind {
                ExpansionKind::Variable | ExpansionKind::Parameter | ExpansionKind::ParameterUnclosed => {
                    TokenType::Variable
                }
                ExpansionKind::Command | ExpansionKind::CommandUnclosed => TokenType::CommandSub,
                ExpansionKind::Arithmetic | ExpansionKind::ArithmeticUnclosed => {
                    TokenType::ArithExpansion
                }
                ExpansionKind::Backtick | ExpansionKind::BacktickUnclosed => {
                    TokenType::CommandSubBacktick
                }
            };
            let value = part.value.clone();
            return Token::new(token_kind, value, start, end).with_parts(parts);
        }
    }

    let value: String = parts.iter().map(part_contribution).collect();

    // Token-level quote classification: a uniform quote kind when every part
    // shares it, Mixed when quoted and unquoted pieces meet
    let mut quote: Option<QuoteKind> = None;
    let mut uniform = true;
    let mut any_quoted = false;
    for part in &parts {
        if part.quote.is_some() {
            any_quoted = true;
        }
        if part.quote != parts[0].quote {
            uniform = false;
        }
    }
    if any_quoted {
        quote = if uniform { parts[0].quote } else { Some(QuoteKind::Mixed) };
    }

    let kind = if quote.is_some() { TokenType::String } else { TokenType::Word };
    let mut token = Token::new(kind, value, start, end).with_parts(parts);
    token.quote = quote;
    token
}

/// A part's contribution to the token value: variable parts get their
/// `$`/`${}` wrapping back, everything else contributes its value verbatim.
fn part_contribution(part: &TokenPart) -> String {
    match part.expansion {
        Some(ExpansionKind::Variable) => format!("${}", part.value),
        Some(ExpansionKind::Parameter) | Some(ExpansionKind::ParameterUnclosed) => {
            format!("${{{}}}", part.value)
        }
        _ => part.value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_ctx(s: &str, ctx: &mut LexerContext) -> Result<Option<Token>, LexerError> {
        let input: Vec<char> = s.chars().collect();
        let tracker = PositionTracker::new(&input);
        Ok(LiteralRecognizer
            .recognize(&input, 0, ctx, &LexerConfig::default(), &tracker)?
            .and_then(|r| r.token))
    }

    fn run(s: &str) -> Token {
        run_ctx(s, &mut LexerContext::new()).unwrap().unwrap()
    }

    #[test]
    fn test_simple_word() {
        let tok = run("hello world");
        assert_eq!(tok.kind, TokenType::Word);
        assert_eq!(tok.value, "hello");
        assert_eq!(tok.end, 5);
    }

    #[test]
    fn test_word_stops_at_operator() {
        let tok = run("foo|bar");
        assert_eq!(tok.value, "foo");
        assert_eq!(tok.end, 3);
    }

    #[test]
    fn test_single_quoted_string() {
        let tok = run("'hello world' x");
        assert_eq!(tok.kind, TokenType::String);
        assert_eq!(tok.value, "hello world");
        assert_eq!(tok.quote, Some(QuoteKind::Single));
    }

    #[test]
    fn test_double_quoted_with_expansion() {
        let tok = run("\"hello $USER\"");
        assert_eq!(tok.kind, TokenType::String);
        assert_eq!(tok.value, "hello $USER");
        assert_eq!(tok.quote, Some(QuoteKind::Double));
        assert_eq!(tok.parts.len(), 2);
        assert_eq!(tok.parts[0].value, "hello ");
        assert!(tok.parts[1].is_variable);
    }

    #[test]
    fn test_mixed_quotes() {
        let tok = run("\"a\"'b'");
        assert_eq!(tok.kind, TokenType::String);
        assert_eq!(tok.value, "ab");
        assert_eq!(tok.quote, Some(QuoteKind::Mixed));
    }

    #[test]
    fn test_partially_quoted_word() {
        let tok = run("pre'fix'");
        assert_eq!(tok.kind, TokenType::String);
        assert_eq!(tok.value, "prefix");
        assert_eq!(tok.quote, Some(QuoteKind::Mixed));
    }

    #[test]
    fn test_bare_variable_token() {
        let tok = run("$USER rest");
        assert_eq!(tok.kind, TokenType::Variable);
        assert_eq!(tok.value, "USER");
    }

    #[test]
    fn test_bare_command_sub_token() {
        let tok = run("$(date) rest");
        assert_eq!(tok.kind, TokenType::CommandSub);
        assert_eq!(tok.value, "$(date)");
    }

    #[test]
    fn test_bare_arith_token() {
        let tok = run("$((1 + 2))");
        assert_eq!(tok.kind, TokenType::ArithExpansion);
        assert_eq!(tok.value, "$((1 + 2))");
    }

    #[test]
    fn test_word_with_embedded_expansion() {
        let tok = run("pre$(cmd)post next");
        assert_eq!(tok.kind, TokenType::Word);
        assert_eq!(tok.value, "pre$(cmd)post");
        assert_eq!(tok.parts.len(), 3);
    }

    #[test]
    fn test_parameter_expansion_rewrapped_in_value() {
        let tok = run("a${B}c");
        assert_eq!(tok.value, "a${B}c");
    }

    #[test]
    fn test_assignment_is_one_token() {
        let tok = run("VAR=value next");
        assert_eq!(tok.kind, TokenType::Word);
        assert_eq!(tok.value, "VAR=value");
    }

    #[test]
    fn test_array_assignment_is_one_token() {
        let tok = run("arr[key]=value next");
        assert_eq!(tok.value, "arr[key]=value");
        let tok = run("arr[key]+=v");
        assert_eq!(tok.value, "arr[key]+=v");
    }

    #[test]
    fn test_array_subscript_with_quoted_bracket() {
        let tok = run("arr[']']=v x");
        assert_eq!(tok.value, "arr[']']=v");
    }

    #[test]
    fn test_ansi_c_quoting_inline() {
        let tok = run("a$'\\t'b x");
        assert_eq!(tok.value, "a\tb");
        assert_eq!(tok.quote, Some(QuoteKind::Mixed));
    }

    #[test]
    fn test_escape_outside_quotes() {
        let tok = run("a\\ b x");
        assert_eq!(tok.value, "a b");
        assert_eq!(tok.end, 4);
    }

    #[test]
    fn test_escaped_dollar_is_literal_part() {
        let tok = run("\\$HOME x");
        assert_eq!(tok.value, "$HOME");
        assert!(tok.parts[0].literal_dollar);
        assert!(!tok.parts.iter().any(|part| part.is_expansion));
    }

    #[test]
    fn test_glob_class_stays_in_word() {
        let tok = run("file[12].txt x");
        assert_eq!(tok.value, "file[12].txt");
    }

    #[test]
    fn test_brackets_terminate_inside_double_brackets() {
        let mut ctx = LexerContext::new();
        ctx.enter_double_brackets();
        ctx.command_position = false;
        let tok = run_ctx("abc]] rest", &mut ctx).unwrap().unwrap();
        assert_eq!(tok.value, "abc");
    }

    #[test]
    fn test_regex_word_keeps_brackets() {
        let mut ctx = LexerContext::new();
        ctx.enter_double_brackets();
        ctx.after_regex_match = true;
        ctx.command_position = false;
        let tok = run_ctx("[0-9]+ ]]", &mut ctx).unwrap().unwrap();
        assert_eq!(tok.value, "[0-9]+");
        assert!(!ctx.after_regex_match);
    }

    #[test]
    fn test_unclosed_single_quote_errors() {
        assert!(run_ctx("'never", &mut LexerContext::new()).is_err());
    }

    #[test]
    fn test_unclosed_double_quote_errors() {
        assert!(run_ctx("\"never", &mut LexerContext::new()).is_err());
    }

    #[test]
    fn test_extglob_pattern() {
        let input: Vec<char> = "!(a|b) x".chars().collect();
        let tracker = PositionTracker::new(&input);
        let mut ctx = LexerContext::new();
        let config = LexerConfig { enable_extglob: true, ..LexerConfig::default() };
        let tok = LiteralRecognizer
            .recognize(&input, 0, &mut ctx, &config, &tracker)
            .unwrap()
            .unwrap()
            .token
            .unwrap();
        assert_eq!(tok.value, "!(a|b)");
    }

    #[test]
    fn test_span_invariants() {
        let tok = run("\"hello $USER\"");
        assert_eq!(tok.start, tok.parts[0].start.offset);
        assert_eq!(tok.end, tok.parts.last().unwrap().end.offset);
        assert_eq!(tok.end, 13);
    }
}
