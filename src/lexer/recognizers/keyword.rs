//! Keyword recognizer

use std::collections::HashMap;

use crate::lexer::config::LexerConfig;
use crate::lexer::context::LexerContext;
use crate::lexer::position::{LexerError, PositionTracker};
use crate::lexer::recognizers::{Recognized, Recognizer};
use crate::lexer::token::{Token, TokenType};
use crate::lexer::unicode::{is_identifier_char, is_identifier_start};

lazy_static::lazy_static! {
    /// Reserved words and their token types.
    pub static ref KEYWORDS: HashMap<&'static str, TokenType> = {
        let mut m = HashMap::new();
        m.insert("if", TokenType::If);
        m.insert("then", TokenType::Then);
        m.insert("else", TokenType::Else);
        m.insert("elif", TokenType::Elif);
        m.insert("fi", TokenType::Fi);
        m.insert("while", TokenType::While);
        m.insert("until", TokenType::Until);
        m.insert("for", TokenType::For);
        m.insert("select", TokenType::Select);
        m.insert("in", TokenType::In);
        m.insert("do", TokenType::Do);
        m.insert("done", TokenType::Done);
        m.insert("case", TokenType::Case);
        m.insert("esac", TokenType::Esac);
        m.insert("function", TokenType::Function);
        m.insert("time", TokenType::Time);
        m.insert("coproc", TokenType::Coproc);
        m.insert("break", TokenType::Break);
        m.insert("continue", TokenType::Continue);
        m.insert("return", TokenType::Return);
        m
    };
}

/// Recognizes reserved words. Almost all of them require command position;
/// `in` is the exception — it only appears after `for NAME`, `select NAME`
/// or `case WORD`, which the driver tracks via `ctx.expect_in`.
pub struct KeywordRecognizer;

impl Recognizer for KeywordRecognizer {
    fn priority(&self) -> u32 {
        90
    }

    fn can_recognize(&self, input: &[char], pos: usize, _ctx: &LexerContext) -> bool {
        input
            .get(pos)
            .is_some_and(|&c| is_identifier_start(c, true))
    }

    fn recognize(
        &self,
        input: &[char],
        pos: usize,
        ctx: &mut LexerContext,
        config: &LexerConfig,
        tracker: &PositionTracker,
    ) -> Result<Option<Recognized>, LexerError> {
        let _ = (config, tracker);

        // Collect the candidate word (keywords are ASCII)
        let mut end = pos;
        while end < input.len() && is_identifier_char(input[end], true) {
            end += 1;
        }
        let word: String = input[pos..end].iter().collect();

        let Some(&kind) = KEYWORDS.get(word.as_str()) else {
            return Ok(None);
        };

        // A keyword followed by word characters is part of a larger word
        // (e.g. "iffy", "format")
        if let Some(&next) = input.get(end) {
            if !next.is_whitespace() && !matches!(next, ';' | '&' | '|' | '(' | ')' | '<' | '>') {
                return Ok(None);
            }
        }

        let valid = match kind {
            TokenType::In => ctx.expect_in,
            _ => ctx.command_position,
        };
        if !valid {
            return Ok(None);
        }

        let token = Token::new(kind, word, pos, end);
        Ok(Recognized::token(token, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_ctx(s: &str, ctx: &mut LexerContext) -> Option<Token> {
        let input: Vec<char> = s.chars().collect();
        let tracker = PositionTracker::new(&input);
        KeywordRecognizer
            .recognize(&input, 0, ctx, &LexerConfig::default(), &tracker)
            .unwrap()
            .and_then(|r| r.token)
    }

    #[test]
    fn test_keyword_at_command_position() {
        let mut ctx = LexerContext::new();
        assert_eq!(run_ctx("if true", &mut ctx).unwrap().kind, TokenType::If);
        assert_eq!(run_ctx("while :", &mut ctx).unwrap().kind, TokenType::While);
        assert_eq!(run_ctx("done", &mut ctx).unwrap().kind, TokenType::Done);
    }

    #[test]
    fn test_keyword_as_argument_declined() {
        let mut ctx = LexerContext::new();
        ctx.command_position = false;
        assert!(run_ctx("if", &mut ctx).is_none());
        assert!(run_ctx("done", &mut ctx).is_none());
    }

    #[test]
    fn test_keyword_prefix_of_word_declined() {
        let mut ctx = LexerContext::new();
        assert!(run_ctx("iffy", &mut ctx).is_none());
        assert!(run_ctx("format", &mut ctx).is_none());
    }

    #[test]
    fn test_in_requires_expectation() {
        let mut ctx = LexerContext::new();
        ctx.command_position = false;
        assert!(run_ctx("in 1 2", &mut ctx).is_none());
        ctx.expect_in = true;
        assert_eq!(run_ctx("in 1 2", &mut ctx).unwrap().kind, TokenType::In);
    }

    #[test]
    fn test_keyword_before_semicolon() {
        let mut ctx = LexerContext::new();
        assert_eq!(run_ctx("fi;", &mut ctx).unwrap().kind, TokenType::Fi);
    }
}
