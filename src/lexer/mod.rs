//! Lexer for shell input
//!
//! The lexer turns raw command text into a token stream ending in EOF. It is
//! built as a recognizer pipeline over a char stream: each recognizer claims
//! positions by priority, consulting a shared `LexerContext` for the rules
//! that depend on where in the command we are (command position, `[[ ]]`
//! depth, arithmetic depth, case patterns).

pub mod config;
pub mod context;
pub mod driver;
pub mod expansion;
pub mod helpers;
pub mod position;
pub mod quotes;
pub mod recognizers;
pub mod token;
pub mod unicode;

pub use config::LexerConfig;
pub use context::{HeredocDelimiter, LexerContext};
pub use driver::{tokenize, tokenize_tolerant, tokenize_with, Lexer};
pub use position::{LexerError, LexerState, Position, PositionTracker, RecoverableLexerError};
pub use token::{ExpansionKind, QuoteKind, Token, TokenPart, TokenType};
