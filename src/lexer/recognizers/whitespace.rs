//! Whitespace recognizer

use crate::lexer::config::LexerConfig;
use crate::lexer::context::LexerContext;
use crate::lexer::position::{LexerError, PositionTracker};
use crate::lexer::recognizers::{Recognized, Recognizer};
use crate::lexer::unicode::is_horizontal_whitespace;

/// Consumes runs of horizontal whitespace and backslash-newline line
/// continuations. Newline itself is an operator token and is never skipped.
pub struct WhitespaceRecognizer;

impl Recognizer for WhitespaceRecognizer {
    fn priority(&self) -> u32 {
        30
    }

    fn can_recognize(&self, input: &[char], pos: usize, _ctx: &LexerContext) -> bool {
        match input.get(pos) {
            Some(&c) => {
                c != '\n'
                    && (c.is_whitespace()
                        || (c == '\\' && input.get(pos + 1) == Some(&'\n')))
            }
            None => false,
        }
    }

    fn recognize(
        &self,
        input: &[char],
        pos: usize,
        _ctx: &mut LexerContext,
        config: &LexerConfig,
        _tracker: &PositionTracker,
    ) -> Result<Option<Recognized>, LexerError> {
        let mut p = pos;
        loop {
            match input.get(p) {
                Some(&c) if is_horizontal_whitespace(c, config.posix_mode) => p += 1,
                Some('\\') if input.get(p + 1) == Some(&'\n') => p += 2,
                _ => break,
            }
        }
        if p == pos {
            return Ok(None);
        }
        Ok(Recognized::skip(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_spaces_and_tabs() {
        let input: Vec<char> = "  \t x".chars().collect();
        let r = WhitespaceRecognizer;
        let mut ctx = LexerContext::new();
        let tracker = PositionTracker::new(&input);
        let out = r
            .recognize(&input, 0, &mut ctx, &LexerConfig::default(), &tracker)
            .unwrap()
            .unwrap();
        assert!(out.token.is_none());
        assert_eq!(out.new_pos, 4);
    }

    #[test]
    fn test_skips_line_continuation() {
        let input: Vec<char> = "\\\nfoo".chars().collect();
        let r = WhitespaceRecognizer;
        let mut ctx = LexerContext::new();
        let tracker = PositionTracker::new(&input);
        let out = r
            .recognize(&input, 0, &mut ctx, &LexerConfig::default(), &tracker)
            .unwrap()
            .unwrap();
        assert_eq!(out.new_pos, 2);
    }

    #[test]
    fn test_does_not_skip_newline() {
        let input: Vec<char> = "\n".chars().collect();
        let r = WhitespaceRecognizer;
        let ctx = LexerContext::new();
        assert!(!r.can_recognize(&input, 0, &ctx));
    }
}
