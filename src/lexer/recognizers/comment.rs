//! Comment recognizer

use crate::lexer::config::LexerConfig;
use crate::lexer::context::LexerContext;
use crate::lexer::helpers::is_comment_start;
use crate::lexer::position::{LexerError, PositionTracker};
use crate::lexer::recognizers::{Recognized, Recognizer};

/// Consumes `#` through end-of-line. Comments are skipped, not tokenized;
/// `#` mid-word (`file#1`) is left for the literal recognizer.
pub struct CommentRecognizer;

impl Recognizer for CommentRecognizer {
    fn priority(&self) -> u32 {
        60
    }

    fn can_recognize(&self, input: &[char], pos: usize, _ctx: &LexerContext) -> bool {
        input.get(pos) == Some(&'#')
    }

    fn recognize(
        &self,
        input: &[char],
        pos: usize,
        ctx: &mut LexerContext,
        _config: &LexerConfig,
        _tracker: &PositionTracker,
    ) -> Result<Option<Recognized>, LexerError> {
        // # inside (( )) is part of base notation (2#101), never a comment
        if ctx.arithmetic_depth > 0 {
            return Ok(None);
        }
        if !is_comment_start(input, pos) {
            return Ok(None);
        }
        let mut p = pos;
        while p < input.len() && input[p] != '\n' {
            p += 1;
        }
        Ok(Recognized::skip(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(s: &str, pos: usize) -> Option<usize> {
        let input: Vec<char> = s.chars().collect();
        let mut ctx = LexerContext::new();
        let tracker = PositionTracker::new(&input);
        CommentRecognizer
            .recognize(&input, pos, &mut ctx, &LexerConfig::default(), &tracker)
            .unwrap()
            .map(|r| r.new_pos)
    }

    #[test]
    fn test_comment_to_end_of_line() {
        assert_eq!(run("# hello\necho", 0), Some(7));
    }

    #[test]
    fn test_comment_after_command() {
        assert_eq!(run("ls # trailing", 3), Some(13));
    }

    #[test]
    fn test_hash_mid_word_declined() {
        assert_eq!(run("file#1", 4), None);
    }
}
