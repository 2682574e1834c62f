//! Token recognizers
//!
//! Recognizers are pluggable units selected by priority. Each one either
//! claims the current position — producing a token (or nothing, for skipped
//! text like whitespace and comments) and a new position — or declines and
//! the next recognizer in priority order is tried.

pub mod arithmetic;
pub mod comment;
pub mod keyword;
pub mod literal;
pub mod operator;
pub mod process_sub;
pub mod whitespace;

use crate::lexer::config::LexerConfig;
use crate::lexer::context::LexerContext;
use crate::lexer::position::{LexerError, PositionTracker};
use crate::lexer::token::Token;

pub use arithmetic::ArithmeticContentRecognizer;
pub use comment::CommentRecognizer;
pub use keyword::KeywordRecognizer;
pub use literal::LiteralRecognizer;
pub use operator::OperatorRecognizer;
pub use process_sub::ProcessSubRecognizer;
pub use whitespace::WhitespaceRecognizer;

/// Outcome of one recognizer claiming a position.
///
/// `token` is `None` for skipped text (whitespace, comments).
pub struct Recognized {
    pub token: Option<Token>,
    pub new_pos: usize,
}

impl Recognized {
    pub fn token(token: Token, new_pos: usize) -> Option<Self> {
        Some(Self { token: Some(token), new_pos })
    }

    pub fn skip(new_pos: usize) -> Option<Self> {
        Some(Self { token: None, new_pos })
    }
}

/// A pluggable token recognizer.
pub trait Recognizer {
    /// Higher priorities are consulted first. Immutable after construction.
    fn priority(&self) -> u32;

    /// Cheap pre-check before `recognize` is attempted.
    fn can_recognize(&self, input: &[char], pos: usize, ctx: &LexerContext) -> bool;

    /// Attempt to produce a token at `pos`. Returns `Ok(None)` to decline.
    fn recognize(
        &self,
        input: &[char],
        pos: usize,
        ctx: &mut LexerContext,
        config: &LexerConfig,
        tracker: &PositionTracker,
    ) -> Result<Option<Recognized>, LexerError>;
}

/// The recognizer registry, built once at lexer construction.
///
/// Recognizers are stored sorted by descending priority so iteration is
/// allocation-free.
pub struct RecognizerRegistry {
    recognizers: Vec<Box<dyn Recognizer>>,
}

impl RecognizerRegistry {
    /// The standard pipeline: arithmetic content (200), process substitution
    /// (160), operators (150), keywords (90), literals (70), comments (60),
    /// whitespace (30).
    pub fn standard() -> Self {
        let mut recognizers: Vec<Box<dyn Recognizer>> = vec![
            Box::new(ArithmeticContentRecognizer),
            Box::new(ProcessSubRecognizer),
            Box::new(OperatorRecognizer),
            Box::new(KeywordRecognizer),
            Box::new(LiteralRecognizer),
            Box::new(CommentRecognizer),
            Box::new(WhitespaceRecognizer),
        ];
        recognizers.sort_by(|a, b| b.priority().cmp(&a.priority()));
        Self { recognizers }
    }

    /// Ask each recognizer in priority order; first success wins.
    pub fn recognize(
        &self,
        input: &[char],
        pos: usize,
        ctx: &mut LexerContext,
        config: &LexerConfig,
        tracker: &PositionTracker,
    ) -> Result<Option<Recognized>, LexerError> {
        for recognizer in &self.recognizers {
            if !recognizer.can_recognize(input, pos, ctx) {
                continue;
            }
            if let Some(result) = recognizer.recognize(input, pos, ctx, config, tracker)? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_priority_order() {
        let registry = RecognizerRegistry::standard();
        let priorities: Vec<u32> = registry.recognizers.iter().map(|r| r.priority()).collect();
        let mut sorted = priorities.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(priorities, sorted);
        assert_eq!(priorities[0], 200);
        assert_eq!(*priorities.last().unwrap(), 30);
    }
}
