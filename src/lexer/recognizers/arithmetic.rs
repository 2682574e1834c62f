//! Arithmetic content recognizer

use crate::lexer::config::LexerConfig;
use crate::lexer::context::LexerContext;
use crate::lexer::position::{LexerError, PositionTracker};
use crate::lexer::recognizers::{Recognized, Recognizer};
use crate::lexer::token::{Token, TokenType};

/// Inside `(( ))`, consumes the whole expression body up to the matching
/// `))` as a single WORD so redirect and semicolon characters inside the
/// expression are never misread as shell operators.
pub struct ArithmeticContentRecognizer;

impl Recognizer for ArithmeticContentRecognizer {
    fn priority(&self) -> u32 {
        200
    }

    fn can_recognize(&self, input: &[char], pos: usize, ctx: &LexerContext) -> bool {
        ctx.arithmetic_depth > 0 && pos < input.len()
    }

    fn recognize(
        &self,
        input: &[char],
        pos: usize,
        _ctx: &mut LexerContext,
        _config: &LexerConfig,
        tracker: &PositionTracker,
    ) -> Result<Option<Recognized>, LexerError> {
        let mut depth = 0i32;
        let mut p = pos;

        while p < input.len() {
            if depth == 0 && p + 1 < input.len() && input[p] == ')' && input[p + 1] == ')' {
                break;
            }
            match input[p] {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
            p += 1;
        }

        if p == pos {
            // Already sitting on the closing )) — let the operator recognizer
            // take it.
            return Ok(None);
        }

        let value: String = input[pos..p].iter().collect();
        let trimmed = value.trim_end();
        let end = pos + trimmed.chars().count();
        if trimmed.is_empty() {
            return Ok(Recognized::skip(p));
        }

        let _ = tracker;
        let token = Token::new(TokenType::Word, trimmed, pos, end);
        Ok(Recognized::token(token, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(s: &str) -> Option<(Option<Token>, usize)> {
        let input: Vec<char> = s.chars().collect();
        let mut ctx = LexerContext::new();
        ctx.enter_arithmetic();
        let tracker = PositionTracker::new(&input);
        ArithmeticContentRecognizer
            .recognize(&input, 0, &mut ctx, &LexerConfig::default(), &tracker)
            .unwrap()
            .map(|r| (r.token, r.new_pos))
    }

    #[test]
    fn test_consumes_expression_body() {
        let (tok, pos) = run("x + 1 ))").unwrap();
        let tok = tok.unwrap();
        assert_eq!(tok.kind, TokenType::Word);
        assert_eq!(tok.value, "x + 1");
        assert_eq!(pos, 5);
    }

    #[test]
    fn test_inner_parens_are_balanced() {
        let (tok, _) = run("(1 + 2) * 3 ))").unwrap();
        assert_eq!(tok.unwrap().value, "(1 + 2) * 3");
    }

    #[test]
    fn test_redirect_chars_stay_in_expression() {
        let (tok, _) = run("x << 2 ))").unwrap();
        assert_eq!(tok.unwrap().value, "x << 2");
    }

    #[test]
    fn test_declines_at_closing_parens() {
        assert!(run("))").is_none());
    }
}
