//! Operator recognizer
//!
//! Greedy longest-match over a length-indexed operator table, with the
//! context rules that make shell lexing interesting: `[[`/`]]` gating,
//! `((`/`))` versus nested subshells, fd-prefixed redirects, and fd
//! duplication as a single token.

use std::collections::HashMap;

use crate::lexer::config::LexerConfig;
use crate::lexer::context::LexerContext;
use crate::lexer::position::{LexerError, PositionTracker};
use crate::lexer::recognizers::{Recognized, Recognizer};
use crate::lexer::token::{Token, TokenType};

lazy_static::lazy_static! {
    /// Operators indexed by length for greedy longest-match.
    pub static ref OPERATORS_BY_LENGTH: HashMap<usize, HashMap<&'static str, TokenType>> = {
        let mut by_len: HashMap<usize, HashMap<&'static str, TokenType>> = HashMap::new();

        let three: &[(&str, TokenType)] = &[
            ("<<<", TokenType::HereString),
            ("<<-", TokenType::HeredocStrip),
            (";;&", TokenType::AmpSemicolon),
            ("&>>", TokenType::RedirectAppend),
            ("2>>", TokenType::RedirectErrAppend),
        ];
        let two: &[(&str, TokenType)] = &[
            (">>", TokenType::RedirectAppend),
            ("<<", TokenType::Heredoc),
            ("<>", TokenType::RedirectReadwrite),
            (">|", TokenType::RedirectClobber),
            ("&>", TokenType::RedirectOut),
            ("|&", TokenType::PipeAnd),
            ("&&", TokenType::AndAnd),
            ("||", TokenType::OrOr),
            ("((", TokenType::DoubleLParen),
            ("))", TokenType::DoubleRParen),
            ("[[", TokenType::DoubleLBracket),
            ("]]", TokenType::DoubleRBracket),
            ("=~", TokenType::RegexMatch),
            ("==", TokenType::Equal),
            ("!=", TokenType::NotEqual),
            (";;", TokenType::DoubleSemicolon),
            (";&", TokenType::SemicolonAmp),
            ("2>", TokenType::RedirectErr),
        ];
        let one: &[(&str, TokenType)] = &[
            ("|", TokenType::Pipe),
            ("&", TokenType::Ampersand),
            (";", TokenType::Semicolon),
            ("(", TokenType::LParen),
            (")", TokenType::RParen),
            ("{", TokenType::LBrace),
            ("}", TokenType::RBrace),
            ("[", TokenType::LBracket),
            ("]", TokenType::RBracket),
            ("<", TokenType::RedirectIn),
            (">", TokenType::RedirectOut),
            ("!", TokenType::Exclamation),
            ("\n", TokenType::Newline),
        ];

        by_len.insert(3, three.iter().copied().collect());
        by_len.insert(2, two.iter().copied().collect());
        by_len.insert(1, one.iter().copied().collect());
        by_len
    };
}

/// Characters that can start an operator (digits included, for fd-prefixed
/// redirects and duplication).
fn is_operator_start(c: char) -> bool {
    matches!(
        c,
        '<' | '>' | '&' | '|' | ';' | '(' | ')' | '{' | '}' | '[' | ']' | '!' | '=' | '\n'
    ) || c.is_ascii_digit()
}

/// True when `c` can delimit a standalone shell token.
fn is_token_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '|' | '&' | ';' | '(' | ')' | '{' | '}' | '[' | ']' | '<' | '>')
}

pub struct OperatorRecognizer;

impl OperatorRecognizer {
    /// Parse fd duplication: `N>&M`, `>&N`, `<&N`, with `-` as a valid
    /// target. Emitted as a single REDIRECT_DUP token with the fd prefix
    /// stored in `token.fd`.
    fn try_fd_duplication(&self, input: &[char], pos: usize) -> Option<(Token, usize)> {
        let start = pos;
        let mut p = pos;

        let mut fd = None;
        if input[p].is_ascii_digit() {
            let digit_start = p;
            while p < input.len() && input[p].is_ascii_digit() {
                p += 1;
            }
            let digits: String = input[digit_start..p].iter().collect();
            fd = digits.parse::<i32>().ok();
        }

        if p >= input.len() || !matches!(input[p], '>' | '<') {
            return None;
        }
        p += 1;

        if p >= input.len() || input[p] != '&' {
            return None;
        }
        p += 1;

        if p >= input.len() {
            return None;
        }
        if input[p] == '-' {
            p += 1;
        } else if input[p].is_ascii_digit() {
            while p < input.len() && input[p].is_ascii_digit() {
                p += 1;
            }
        } else {
            return None;
        }

        let value: String = input[start..p].iter().collect();
        let mut token = Token::new(TokenType::RedirectDup, value, start, p);
        token.fd = fd;
        Some((token, p))
    }

    /// Parse fd-prefixed plain redirects: `N>`, `N>>`, `N<`, `N<>`. One token
    /// with the fd stored as metadata; fd 2 keeps its dedicated token types.
    fn try_fd_prefixed_redirect(
        &self,
        input: &[char],
        pos: usize,
        ctx: &LexerContext,
        config: &LexerConfig,
    ) -> Option<(Token, usize)> {
        let start = pos;
        let mut p = pos;
        while p < input.len() && input[p].is_ascii_digit() {
            p += 1;
        }
        if p == pos || p >= input.len() {
            return None;
        }

        let digits: String = input[start..p].iter().collect();
        let fd: i32 = digits.parse().ok()?;

        let ops: &[(&str, TokenType)] = &[
            (">>", TokenType::RedirectAppend),
            ("<>", TokenType::RedirectReadwrite),
            (">", TokenType::RedirectOut),
            ("<", TokenType::RedirectIn),
        ];
        for (op, kind) in ops {
            let op_chars: Vec<char> = op.chars().collect();
            if input.len() - p >= op_chars.len() && input[p..p + op_chars.len()] == op_chars[..] {
                if !config.enable_redirections || !is_valid_in_context(op, ctx) {
                    return None;
                }
                let end = p + op_chars.len();
                let kind = match (fd, kind) {
                    (2, TokenType::RedirectOut) => TokenType::RedirectErr,
                    (2, TokenType::RedirectAppend) => TokenType::RedirectErrAppend,
                    (_, k) => *k,
                };
                let value: String = input[start..end].iter().collect();
                let mut token = Token::new(kind, value, start, end);
                token.fd = Some(fd);
                return Some((token, end));
            }
        }
        None
    }
}

/// Context validity rules for individual operators.
fn is_valid_in_context(op: &str, ctx: &LexerContext) -> bool {
    match op {
        // [[ only opens at command position; ]] only closes an open [[
        "[[" => ctx.command_position,
        "]]" => ctx.bracket_depth > 0,

        // comparison operators exist only inside [[ ]]
        "=~" | "==" | "!=" => ctx.bracket_depth > 0,

        // [ is the test-command operator: command position only, and never
        // inside a case pattern where it starts a glob character class
        "[" => {
            if ctx.in_case_pattern {
                return false;
            }
            ctx.command_position
        }
        // ] closes the test command or lives inside [[ ]]
        "]" => ctx.command_position || ctx.bracket_depth > 0,

        // inside [[ ]], < and > are comparisons, not redirections
        "<" | ">" => ctx.bracket_depth == 0,

        // ! is the negation reserved word only at command position
        "!" => ctx.command_position,

        // )) closes arithmetic only; outside it is two RPARENs
        "))" => ctx.arithmetic_depth > 0,

        _ => true,
    }
}

/// Feature-flag gating for operators.
fn is_operator_enabled(op: &str, config: &LexerConfig) -> bool {
    match op {
        "|" | "|&" => config.enable_pipes,
        "<" | ">" | ">>" | "<>" | ">|" | "&>" | "&>>" | "2>" | "2>>" => {
            config.enable_redirections
        }
        "<<" | "<<-" | "<<<" => config.enable_heredocs,
        "&" => config.enable_background,
        "&&" | "||" => config.enable_logical_operators,
        "((" | "))" | "[[" | "]]" => config.enable_compound_commands,
        "=~" => config.enable_regex_operators,
        _ => true,
    }
}

impl Recognizer for OperatorRecognizer {
    fn priority(&self) -> u32 {
        150
    }

    fn can_recognize(&self, input: &[char], pos: usize, _ctx: &LexerContext) -> bool {
        input.get(pos).is_some_and(|&c| is_operator_start(c))
    }

    fn recognize(
        &self,
        input: &[char],
        pos: usize,
        ctx: &mut LexerContext,
        config: &LexerConfig,
        tracker: &PositionTracker,
    ) -> Result<Option<Recognized>, LexerError> {
        let _ = tracker;
        let c = input[pos];

        if c == '\n' {
            let token = Token::new(TokenType::Newline, "\n", pos, pos + 1);
            return Ok(Recognized::token(token, pos + 1));
        }

        // Inside [[ ]], bare < and > are comparison operators, emitted as
        // words so the conditional evaluator sees them as arguments.
        if ctx.bracket_depth > 0
            && matches!(c, '<' | '>')
            && input.get(pos + 1) != Some(&'(')
            && input.get(pos + 1) != Some(&c)
        {
            let token = Token::new(TokenType::Word, c.to_string(), pos, pos + 1);
            return Ok(Recognized::token(token, pos + 1));
        }

        // Fd duplication must win over plain operator matching so 2>&1 is a
        // single token.
        if config.enable_redirections && ctx.bracket_depth == 0 {
            if c.is_ascii_digit() || (matches!(c, '<' | '>') && input.get(pos + 1) == Some(&'&')) {
                if let Some((token, end)) = self.try_fd_duplication(input, pos) {
                    return Ok(Recognized::token(token, end));
                }
            }
            if c.is_ascii_digit() {
                if let Some((token, end)) = self.try_fd_prefixed_redirect(input, pos, ctx, config) {
                    return Ok(Recognized::token(token, end));
                }
                // Bare digit: a word, not an operator
                return Ok(None);
            }
        } else if c.is_ascii_digit() {
            return Ok(None);
        }

        for len in [3usize, 2, 1] {
            if pos + len > input.len() {
                continue;
            }
            let candidate: String = input[pos..pos + len].iter().collect();
            let Some(&kind) = OPERATORS_BY_LENGTH[&len].get(candidate.as_str()) else {
                continue;
            };

            // Extglob !( is a pattern, not negation
            if candidate == "!"
                && config.enable_extglob
                && input.get(pos + 1) == Some(&'(')
            {
                return Ok(None);
            }

            // ! is a reserved word only when standalone; !! and !name are
            // ordinary words
            if candidate == "!" {
                if let Some(&next) = input.get(pos + 1) {
                    if !is_token_delimiter(next) {
                        continue;
                    }
                }
            }

            // { and } are reserved words only when standalone; {} is a word
            if candidate == "{" {
                if input.get(pos + 1) == Some(&'}') {
                    return Ok(None);
                }
                if let Some(&next) = input.get(pos + 1) {
                    if !is_token_delimiter(next) {
                        continue;
                    }
                }
            }
            if candidate == "}" && !ctx.command_position {
                continue;
            }

            // [[ and ]] must sit at a word boundary
            if matches!(candidate.as_str(), "[[" | "]]") {
                if let Some(&after) = input.get(pos + 2) {
                    if !is_token_delimiter(after) {
                        continue;
                    }
                }
            }

            // (( opens arithmetic only at command position; elsewhere it is
            // two LPARENs
            if candidate == "((" && (!ctx.command_position || ctx.arithmetic_depth > 0) {
                continue;
            }

            if !is_operator_enabled(&candidate, config) {
                continue;
            }
            if !is_valid_in_context(&candidate, ctx) {
                continue;
            }

            let mut token = Token::new(kind, candidate.as_str(), pos, pos + len);
            if matches!(candidate.as_str(), "&>" | "&>>") {
                token.combined_redirect = true;
            }
            if candidate == "2>" || candidate == "2>>" {
                token.fd = Some(2);
            }
            return Ok(Recognized::token(token, pos + len));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_ctx(s: &str, ctx: &mut LexerContext) -> Option<Token> {
        let input: Vec<char> = s.chars().collect();
        let tracker = PositionTracker::new(&input);
        OperatorRecognizer
            .recognize(&input, 0, ctx, &LexerConfig::default(), &tracker)
            .unwrap()
            .and_then(|r| r.token)
    }

    fn run(s: &str) -> Option<Token> {
        run_ctx(s, &mut LexerContext::new())
    }

    #[test]
    fn test_longest_match() {
        assert_eq!(run("&& x").unwrap().kind, TokenType::AndAnd);
        assert_eq!(run("& x").unwrap().kind, TokenType::Ampersand);
        assert_eq!(run(">> f").unwrap().kind, TokenType::RedirectAppend);
        assert_eq!(run("<<< w").unwrap().kind, TokenType::HereString);
        assert_eq!(run("<<- E").unwrap().kind, TokenType::HeredocStrip);
    }

    #[test]
    fn test_combined_redirect_flag() {
        let tok = run("&> f").unwrap();
        assert_eq!(tok.kind, TokenType::RedirectOut);
        assert!(tok.combined_redirect);
        let tok = run("&>> f").unwrap();
        assert_eq!(tok.kind, TokenType::RedirectAppend);
        assert!(tok.combined_redirect);
    }

    #[test]
    fn test_fd_duplication_single_token() {
        let tok = run("2>&1").unwrap();
        assert_eq!(tok.kind, TokenType::RedirectDup);
        assert_eq!(tok.value, "2>&1");
        assert_eq!(tok.fd, Some(2));

        let tok = run(">&2").unwrap();
        assert_eq!(tok.kind, TokenType::RedirectDup);
        assert_eq!(tok.fd, None);

        let tok = run("2>&-").unwrap();
        assert_eq!(tok.value, "2>&-");
    }

    #[test]
    fn test_fd_prefixed_redirects() {
        let tok = run("2> err").unwrap();
        assert_eq!(tok.kind, TokenType::RedirectErr);
        assert_eq!(tok.fd, Some(2));

        let tok = run("3> f").unwrap();
        assert_eq!(tok.kind, TokenType::RedirectOut);
        assert_eq!(tok.fd, Some(3));

        let tok = run("3<> f").unwrap();
        assert_eq!(tok.kind, TokenType::RedirectReadwrite);
        assert_eq!(tok.fd, Some(3));

        let tok = run("2>> err").unwrap();
        assert_eq!(tok.kind, TokenType::RedirectErrAppend);
    }

    #[test]
    fn test_bare_digit_is_not_operator() {
        assert!(run("42 ").is_none());
    }

    #[test]
    fn test_double_bracket_needs_command_position() {
        let mut ctx = LexerContext::new();
        ctx.command_position = true;
        assert_eq!(run_ctx("[[ x ]]", &mut ctx).unwrap().kind, TokenType::DoubleLBracket);

        let mut ctx = LexerContext::new();
        ctx.command_position = false;
        // not [[; falls through; [ requires command position too, so nothing
        assert!(run_ctx("[[ x ]]", &mut ctx).is_none());
    }

    #[test]
    fn test_close_bracket_needs_open() {
        let mut ctx = LexerContext::new();
        ctx.command_position = false;
        assert!(run_ctx("]] x", &mut ctx).is_none());
        ctx.enter_double_brackets();
        assert_eq!(run_ctx("]] x", &mut ctx).unwrap().kind, TokenType::DoubleRBracket);
    }

    #[test]
    fn test_comparison_operators_only_in_brackets() {
        let mut ctx = LexerContext::new();
        ctx.command_position = false;
        assert!(run_ctx("=~ pat", &mut ctx).is_none());
        ctx.enter_double_brackets();
        assert_eq!(run_ctx("=~ pat", &mut ctx).unwrap().kind, TokenType::RegexMatch);
        assert_eq!(run_ctx("== x", &mut ctx).unwrap().kind, TokenType::Equal);
        assert_eq!(run_ctx("!= x", &mut ctx).unwrap().kind, TokenType::NotEqual);
    }

    #[test]
    fn test_angle_brackets_are_words_inside_double_brackets() {
        let mut ctx = LexerContext::new();
        ctx.enter_double_brackets();
        ctx.command_position = false;
        let tok = run_ctx("< b", &mut ctx).unwrap();
        assert_eq!(tok.kind, TokenType::Word);
        assert_eq!(tok.value, "<");
    }

    #[test]
    fn test_double_rparen_needs_arithmetic() {
        let mut ctx = LexerContext::new();
        ctx.command_position = false;
        let tok = run_ctx("))", &mut ctx).unwrap();
        assert_eq!(tok.kind, TokenType::RParen);

        let mut ctx = LexerContext::new();
        ctx.enter_arithmetic();
        let tok = run_ctx("))", &mut ctx).unwrap();
        assert_eq!(tok.kind, TokenType::DoubleRParen);
    }

    #[test]
    fn test_double_lparen_only_at_command_position() {
        let mut ctx = LexerContext::new();
        ctx.command_position = false;
        let tok = run_ctx("((x))", &mut ctx).unwrap();
        assert_eq!(tok.kind, TokenType::LParen);
    }

    #[test]
    fn test_bang_standalone_only() {
        assert_eq!(run("! cmd").unwrap().kind, TokenType::Exclamation);
        assert!(run("!name").is_none());
        assert!(run("!!").is_none());
    }

    #[test]
    fn test_braces_standalone_only() {
        assert_eq!(run("{ cmd; }").unwrap().kind, TokenType::LBrace);
        assert!(run("{}").is_none());
        assert!(run("{a,b}").is_none());

        let mut ctx = LexerContext::new();
        ctx.command_position = true;
        assert_eq!(run_ctx("} ", &mut ctx).unwrap().kind, TokenType::RBrace);
        ctx.command_position = false;
        assert!(run_ctx("} ", &mut ctx).is_none());
    }

    #[test]
    fn test_lbracket_context() {
        let mut ctx = LexerContext::new();
        ctx.command_position = true;
        assert_eq!(run_ctx("[ -f x ]", &mut ctx).unwrap().kind, TokenType::LBracket);

        ctx.command_position = false;
        assert!(run_ctx("[abc]*", &mut ctx).is_none());

        ctx.command_position = true;
        ctx.in_case_pattern = true;
        assert!(run_ctx("[a-z]*", &mut ctx).is_none());
    }

    #[test]
    fn test_case_terminators() {
        assert_eq!(run(";; ").unwrap().kind, TokenType::DoubleSemicolon);
        assert_eq!(run(";& ").unwrap().kind, TokenType::SemicolonAmp);
        assert_eq!(run(";;& ").unwrap().kind, TokenType::AmpSemicolon);
    }
}
