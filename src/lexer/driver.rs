//! Lexer driver
//!
//! Owns the `LexerContext` and the `PositionTracker`, and pushes the input
//! through the recognizer pipeline. The driver also owns the cross-token
//! bookkeeping that no single recognizer can see: command-position updates,
//! `[[ ]]`/`(( ))` depth transitions, case-pattern tracking, the `for … in`
//! lookahead, heredoc delimiter registration, and error recovery.

use log::trace;

use crate::lexer::config::LexerConfig;
use crate::lexer::context::{HeredocDelimiter, LexerContext};
use crate::lexer::position::{LexerError, PositionTracker, RecoverableLexerError};
use crate::lexer::recognizers::{Recognized, RecognizerRegistry};
use crate::lexer::token::{QuoteKind, Token, TokenType};

/// Tracks whether the next word may be the `in` reserved word, and whether
/// that `in` opens a case pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
enum InExpect {
    None,
    AfterFor,
    AfterForWord,
    AfterCase,
    AfterCaseWord,
}

/// The lexer: one instance per tokenization run.
pub struct Lexer {
    input: Vec<char>,
    source: String,
    pos: usize,
    config: LexerConfig,
    ctx: LexerContext,
    tracker: PositionTracker,
    registry: RecognizerRegistry,
    tokens: Vec<Token>,
    errors: Vec<LexerError>,
    in_expect: InExpect,
    case_depth: usize,
}

impl Lexer {
    pub fn new(input: &str, config: LexerConfig) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let tracker = PositionTracker::new(&chars);
        Self {
            input: chars,
            source: input.to_string(),
            pos: 0,
            config,
            ctx: LexerContext::new(),
            tracker,
            registry: RecognizerRegistry::standard(),
            tokens: Vec::new(),
            errors: Vec::new(),
            in_expect: InExpect::None,
            case_depth: 0,
        }
    }

    /// Tokenize the entire input. In strict mode the first error aborts; in
    /// recovery mode diagnostics are collected and the token stream is still
    /// produced (ending in EOF either way).
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexerError> {
        self.run()?;
        Ok(self.tokens)
    }

    /// Tokenize and return recovered diagnostics alongside the tokens.
    pub fn tokenize_with_diagnostics(mut self) -> (Vec<Token>, Vec<LexerError>) {
        match self.run() {
            Ok(()) => (self.tokens, self.errors),
            Err(e) => {
                let mut errors = self.errors;
                errors.push(e);
                (self.tokens, errors)
            }
        }
    }

    fn run(&mut self) -> Result<(), LexerError> {
        while self.pos < self.input.len() {
            // Pending heredocs are collected right after the newline that
            // terminates the command line
            if !self.ctx.heredoc_delimiters.is_empty()
                && self.tokens.last().map(|t| t.kind) == Some(TokenType::Newline)
            {
                self.collect_heredoc_bodies();
                continue;
            }

            let mut ctx = std::mem::take(&mut self.ctx);
            ctx.expect_in =
                matches!(self.in_expect, InExpect::AfterForWord | InExpect::AfterCaseWord);
            let result =
                self.registry
                    .recognize(&self.input, self.pos, &mut ctx, &self.config, &self.tracker);
            self.ctx = ctx;

            match result {
                Ok(Some(Recognized { token: Some(token), new_pos })) => {
                    self.pos = new_pos;
                    self.push_token(token);
                }
                Ok(Some(Recognized { token: None, new_pos })) => {
                    self.pos = new_pos;
                }
                Ok(None) => {
                    let token = self.fallback_word();
                    self.push_token(token);
                }
                Err(e) => self.handle_error(e)?,
            }
        }

        if !self.ctx.is_terminal() {
            let err = LexerError::new(
                "unexpected EOF: unclosed construct",
                self.tracker.position(self.pos),
                &self.source,
            );
            if self.config.strict_mode {
                return Err(err);
            }
            self.errors.push(err);
            self.ctx.reset_to_normal();
        }

        self.tokens
            .push(Token::new(TokenType::Eof, "", self.pos, self.pos));
        Ok(())
    }

    /// Append a token and apply every cross-token context update.
    fn push_token(&mut self, mut token: Token) {
        if let Some(prev) = self.tokens.last() {
            token.adjacent_to_previous = prev.end == token.start;
        }
        let kind = token.kind;
        trace!("token {:?} {:?} at {}..{}", kind, token.value, token.start, token.end);
        self.tokens.push(token);

        match kind {
            TokenType::DoubleLParen => self.ctx.enter_arithmetic(),
            TokenType::DoubleRParen => self.ctx.exit_arithmetic(),
            TokenType::DoubleLBracket => self.ctx.enter_double_brackets(),
            TokenType::DoubleRBracket => self.ctx.exit_double_brackets(),
            TokenType::RegexMatch => self.ctx.after_regex_match = true,
            TokenType::Heredoc => self.register_heredoc(false),
            TokenType::HeredocStrip => self.register_heredoc(true),
            _ => {}
        }

        // Case-pattern tracking
        let mut closed_case_pattern = false;
        match kind {
            TokenType::Case => self.case_depth += 1,
            TokenType::Esac => {
                self.case_depth = self.case_depth.saturating_sub(1);
                self.ctx.in_case_pattern = false;
            }
            TokenType::RParen if self.ctx.in_case_pattern => {
                self.ctx.in_case_pattern = false;
                closed_case_pattern = true;
            }
            TokenType::DoubleSemicolon | TokenType::SemicolonAmp | TokenType::AmpSemicolon
                if self.case_depth > 0 =>
            {
                self.ctx.in_case_pattern = true;
            }
            _ => {}
        }

        // `in` lookahead: for NAME / select NAME / case WORD
        self.in_expect = match (self.in_expect, kind) {
            (_, TokenType::For) | (_, TokenType::Select) => InExpect::AfterFor,
            (_, TokenType::Case) => InExpect::AfterCase,
            (InExpect::AfterFor, k) if is_word_like(k) => InExpect::AfterForWord,
            (InExpect::AfterCase, k) if is_word_like(k) => InExpect::AfterCaseWord,
            (InExpect::AfterCaseWord, TokenType::In) => {
                if self.case_depth > 0 {
                    self.ctx.in_case_pattern = true;
                }
                InExpect::None
            }
            _ => InExpect::None,
        };

        self.ctx.update_for_token(kind);

        // The ) that closes a case pattern is followed by a command
        if closed_case_pattern {
            self.ctx.command_position = true;
        }
    }

    /// Scan ahead (without consuming) for the delimiter word that follows a
    /// `<<` / `<<-` operator and queue it for body collection.
    fn register_heredoc(&mut self, strip_tabs: bool) {
        let input = &self.input;
        let mut p = self.pos;
        while p < input.len() && matches!(input[p], ' ' | '\t') {
            p += 1;
        }

        let mut delimiter = String::new();
        let mut quoted = false;
        while p < input.len() {
            let c = input[p];
            if c.is_whitespace() || matches!(c, ';' | '<' | '>' | '&' | '|' | '(' | ')') {
                break;
            }
            match c {
                '\'' | '"' => {
                    quoted = true;
                    let quote = c;
                    p += 1;
                    while p < input.len() && input[p] != quote {
                        delimiter.push(input[p]);
                        p += 1;
                    }
                    if p < input.len() {
                        p += 1;
                    }
                }
                '\\' => {
                    quoted = true;
                    p += 1;
                    if p < input.len() {
                        delimiter.push(input[p]);
                        p += 1;
                    }
                }
                _ => {
                    delimiter.push(c);
                    p += 1;
                }
            }
        }

        if !delimiter.is_empty() {
            self.ctx.heredoc_delimiters.push(HeredocDelimiter {
                delimiter,
                strip_tabs,
                quoted,
            });
        }
    }

    /// Read heredoc bodies line by line, in order of appearance, closing
    /// each when a line equals its delimiter (after optional tab stripping).
    fn collect_heredoc_bodies(&mut self) {
        while !self.ctx.heredoc_delimiters.is_empty() {
            let heredoc = self.ctx.heredoc_delimiters.remove(0);
            let start = self.pos;
            let mut content = String::new();

            while self.pos < self.input.len() {
                let line_start = self.pos;
                while self.pos < self.input.len() && self.input[self.pos] != '\n' {
                    self.pos += 1;
                }
                let line: String = self.input[line_start..self.pos].iter().collect();
                let has_newline = self.pos < self.input.len();
                if has_newline {
                    self.pos += 1;
                }

                let candidate = if heredoc.strip_tabs {
                    line.trim_start_matches('\t')
                } else {
                    line.as_str()
                };
                if candidate == heredoc.delimiter {
                    break;
                }

                if heredoc.strip_tabs {
                    content.push_str(line.trim_start_matches('\t'));
                } else {
                    content.push_str(&line);
                }
                if has_newline {
                    content.push('\n');
                }
            }

            let mut token = Token::new(TokenType::HeredocContent, content, start, self.pos);
            // A quoted delimiter suppresses expansion of the body; single
            // quoting carries exactly that meaning downstream
            if heredoc.quoted {
                token.quote = Some(QuoteKind::Single);
            }
            self.tokens.push(token);
        }
    }

    /// Last-resort recognizer: consume until the next unambiguous terminator
    /// and call it a word.
    fn fallback_word(&mut self) -> Token {
        let start = self.pos;
        while self.pos < self.input.len()
            && !self.input[self.pos].is_whitespace()
            && !matches!(self.input[self.pos], ';' | '|' | '&' | '(' | ')' | '<' | '>')
        {
            self.pos += 1;
        }
        if self.pos == start {
            // Lone operator char that every recognizer declined; emit it as a
            // word so the driver always makes progress
            self.pos += 1;
        }
        let value: String = self.input[start..self.pos].iter().collect();
        Token::new(TokenType::Word, value, start, self.pos)
    }

    /// Strict mode: rethrow with context. Recovery mode: record a diagnostic
    /// with a continuation point, resume there with reset state.
    fn handle_error(&mut self, e: LexerError) -> Result<(), LexerError> {
        let err = LexerError::new(e.message.clone(), e.position, &self.source);
        if self.config.strict_mode || !self.config.recovery_mode {
            return Err(err);
        }

        // Resume at the next whitespace or `;`
        let mut resume = self.pos;
        while resume < self.input.len()
            && !self.input[resume].is_whitespace()
            && self.input[resume] != ';'
        {
            resume += 1;
        }
        let recoverable = RecoverableLexerError::new(err, resume);

        self.errors.push(recoverable.error);
        if self.errors.len() >= self.config.max_errors {
            return Err(LexerError::new(
                format!("aborting after {} errors", self.errors.len()),
                self.tracker.position(self.pos),
                &self.source,
            ));
        }

        self.pos = recoverable.recovery_position;
        self.ctx.reset_to_normal();
        self.ctx.state = recoverable.recovery_state;
        Ok(())
    }
}

fn is_word_like(kind: TokenType) -> bool {
    matches!(
        kind,
        TokenType::Word | TokenType::String | TokenType::Variable | TokenType::CommandSub
    )
}

/// Tokenize with the default configuration.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexerError> {
    Lexer::new(input, LexerConfig::default()).tokenize()
}

/// Tokenize with an explicit configuration.
pub fn tokenize_with(input: &str, config: LexerConfig) -> Result<Vec<Token>, LexerError> {
    Lexer::new(input, config).tokenize()
}

/// Best-effort tokenization that never fails, used by the multi-line input
/// assembler to probe incomplete commands.
pub fn tokenize_tolerant(input: &str) -> Vec<Token> {
    let config = LexerConfig {
        strict_mode: false,
        recovery_mode: true,
        max_errors: usize::MAX,
        ..LexerConfig::interactive()
    };
    let (tokens, _) = Lexer::new(input, config).tokenize_with_diagnostics();
    tokens
}
