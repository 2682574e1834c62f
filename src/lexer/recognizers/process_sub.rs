//! Process substitution recognizer

use crate::lexer::config::LexerConfig;
use crate::lexer::context::LexerContext;
use crate::lexer::helpers::find_balanced_parentheses;
use crate::lexer::position::{LexerError, PositionTracker};
use crate::lexer::recognizers::{Recognized, Recognizer};
use crate::lexer::token::{Token, TokenType};

/// Recognizes `<(…)` and `>(…)`, consuming the balanced parenthesized body
/// with quote awareness. Runs above the operator recognizer so `<(` is never
/// split into a redirect plus a subshell open.
pub struct ProcessSubRecognizer;

impl Recognizer for ProcessSubRecognizer {
    fn priority(&self) -> u32 {
        160
    }

    fn can_recognize(&self, input: &[char], pos: usize, _ctx: &LexerContext) -> bool {
        matches!(input.get(pos), Some('<') | Some('>')) && input.get(pos + 1) == Some(&'(')
    }

    fn recognize(
        &self,
        input: &[char],
        pos: usize,
        _ctx: &mut LexerContext,
        config: &LexerConfig,
        tracker: &PositionTracker,
    ) -> Result<Option<Recognized>, LexerError> {
        if !config.enable_process_substitution {
            return Ok(None);
        }

        let direction = input[pos];
        let (end, found) = find_balanced_parentheses(input, pos + 2, true);
        if !found {
            return Err(LexerError::bare(
                "unclosed process substitution",
                tracker.position(pos),
            ));
        }

        let value: String = input[pos..end].iter().collect();
        let kind = if direction == '<' {
            TokenType::ProcessSubIn
        } else {
            TokenType::ProcessSubOut
        };
        Ok(Recognized::token(Token::new(kind, value, pos, end), end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(s: &str) -> Result<Option<Token>, LexerError> {
        let input: Vec<char> = s.chars().collect();
        let mut ctx = LexerContext::new();
        let tracker = PositionTracker::new(&input);
        Ok(ProcessSubRecognizer
            .recognize(&input, 0, &mut ctx, &LexerConfig::default(), &tracker)?
            .and_then(|r| r.token))
    }

    #[test]
    fn test_process_sub_in() {
        let tok = run("<(sort file)").unwrap().unwrap();
        assert_eq!(tok.kind, TokenType::ProcessSubIn);
        assert_eq!(tok.value, "<(sort file)");
    }

    #[test]
    fn test_process_sub_out() {
        let tok = run(">(tee log)").unwrap().unwrap();
        assert_eq!(tok.kind, TokenType::ProcessSubOut);
    }

    #[test]
    fn test_quote_aware_body() {
        let tok = run("<(echo ')')").unwrap().unwrap();
        assert_eq!(tok.value, "<(echo ')')");
    }

    #[test]
    fn test_unclosed_is_error() {
        assert!(run("<(sort file").is_err());
    }

    #[test]
    fn test_plain_redirect_not_claimed() {
        let input: Vec<char> = "< file".chars().collect();
        let ctx = LexerContext::new();
        assert!(!ProcessSubRecognizer.can_recognize(&input, 0, &ctx));
    }
}
