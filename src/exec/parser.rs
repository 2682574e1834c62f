//! Minimal command front-end
//!
//! A thin recursive-descent pass over the token stream, covering simple
//! commands, pipelines, `&&`/`||` lists, redirections, heredocs, subshell
//! and brace groups, background jobs, and the basic `if`/`while`/`until`/
//! `for` structures. It exists to drive the launcher and job control end to
//! end; anything fancier belongs to a full parser.

use crate::lexer::{QuoteKind, Token, TokenType};

/// Connector between pipelines in an and-or list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And, // &&
    Or,  // ||
}

/// A redirection as parsed; targets stay as tokens until expansion time.
#[derive(Debug, Clone)]
pub enum RedirectSpec {
    In { fd: i32, target: Token },
    Out { fd: i32, target: Token, append: bool },
    Combined { target: Token, append: bool },
    ReadWrite { fd: i32, target: Token },
    Dup { fd: i32, target: i32, input: bool },
    Close { fd: i32 },
    Here { fd: i32, body: String, quoted: bool },
    HereString { fd: i32, target: Token },
}

/// One node of the executable tree.
#[derive(Debug, Clone)]
pub enum Node {
    Simple {
        assignments: Vec<(String, String)>,
        words: Vec<Token>,
        redirects: Vec<RedirectSpec>,
    },
    Subshell {
        body: Vec<Node>,
        redirects: Vec<RedirectSpec>,
        display: String,
    },
    Brace {
        body: Vec<Node>,
        redirects: Vec<RedirectSpec>,
        display: String,
    },
    Pipeline {
        negate: bool,
        commands: Vec<Node>,
        display: String,
    },
    AndOr {
        first: Box<Node>,
        rest: Vec<(Connector, Node)>,
    },
    Background {
        inner: Box<Node>,
        display: String,
    },
    If {
        cond: Vec<Node>,
        then_body: Vec<Node>,
        elifs: Vec<(Vec<Node>, Vec<Node>)>,
        else_body: Option<Vec<Node>>,
    },
    Loop {
        until: bool,
        cond: Vec<Node>,
        body: Vec<Node>,
    },
    For {
        var: String,
        items: Vec<Token>,
        body: Vec<Node>,
    },
}

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "syntax error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

pub struct CommandParser {
    tokens: Vec<Token>,
    pos: usize,
    /// Heredoc bodies in stream order, paired FIFO with heredoc operators
    bodies: Vec<(String, bool)>,
    next_body: usize,
}

impl CommandParser {
    pub fn new(tokens: Vec<Token>) -> Self {
        // Heredoc bodies trail the newline that ended their command; pull
        // them out up front so operators can claim them in order
        let mut bodies = Vec::new();
        let mut rest = Vec::new();
        for token in tokens {
            if token.kind == TokenType::HeredocContent {
                let quoted = token.quote == Some(QuoteKind::Single);
                bodies.push((token.value, quoted));
            } else {
                rest.push(token);
            }
        }
        Self { tokens: rest, pos: 0, bodies, next_body: 0 }
    }

    pub fn parse(mut self) -> Result<Vec<Node>, ParseError> {
        if self.tokens.is_empty() {
            return Ok(Vec::new());
        }
        let program = self.parse_list(&[])?;
        match self.peek_kind() {
            TokenType::Eof => Ok(program),
            other => Err(ParseError::new(format!("unexpected token `{}'", other.as_str()))),
        }
    }

    fn peek_kind(&self) -> TokenType {
        if self.pos >= self.tokens.len() {
            TokenType::Eof
        } else {
            self.tokens[self.pos].kind
        }
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenType) -> Result<Token, ParseError> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(ParseError::new(format!(
                "expected `{}', found `{}'",
                kind.as_str(),
                self.peek_kind().as_str()
            )))
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek_kind(), TokenType::Newline | TokenType::Semicolon) {
            self.advance();
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek_kind() == TokenType::Newline {
            self.advance();
        }
    }

    /// Parse a statement list until EOF or one of `stop`.
    fn parse_list(&mut self, stop: &[TokenType]) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        loop {
            self.skip_separators();
            let kind = self.peek_kind();
            if kind == TokenType::Eof || stop.contains(&kind) {
                return Ok(nodes);
            }

            let node = self.parse_and_or()?;
            if self.peek_kind() == TokenType::Ampersand {
                self.advance();
                let display = display_of(&node);
                nodes.push(Node::Background { inner: Box::new(node), display });
            } else {
                nodes.push(node);
            }
        }
    }

    fn parse_and_or(&mut self) -> Result<Node, ParseError> {
        let first = self.parse_pipeline()?;
        let mut rest = Vec::new();
        loop {
            let connector = match self.peek_kind() {
                TokenType::AndAnd => Connector::And,
                TokenType::OrOr => Connector::Or,
                _ => break,
            };
            self.advance();
            self.skip_newlines();
            rest.push((connector, self.parse_pipeline()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Node::AndOr { first: Box::new(first), rest })
        }
    }

    fn parse_pipeline(&mut self) -> Result<Node, ParseError> {
        let negate = if self.peek_kind() == TokenType::Exclamation {
            self.advance();
            true
        } else {
            false
        };

        let mut commands = vec![self.parse_command()?];
        while matches!(self.peek_kind(), TokenType::Pipe | TokenType::PipeAnd) {
            let stderr_too = self.peek_kind() == TokenType::PipeAnd;
            self.advance();
            self.skip_newlines();
            if stderr_too {
                // |& is shorthand for 2>&1 on the upstream command
                if let Some(prev) = commands.last_mut() {
                    push_redirect(prev, RedirectSpec::Dup { fd: 2, target: 1, input: false });
                }
            }
            commands.push(self.parse_command()?);
        }

        if commands.len() == 1 && !negate {
            Ok(commands.pop().unwrap())
        } else {
            let display = commands.iter().map(display_of).collect::<Vec<_>>().join(" | ");
            Ok(Node::Pipeline { negate, commands, display })
        }
    }

    fn parse_command(&mut self) -> Result<Node, ParseError> {
        match self.peek_kind() {
            TokenType::If => self.parse_if(),
            TokenType::While => self.parse_loop(false),
            TokenType::Until => self.parse_loop(true),
            TokenType::For => self.parse_for(),
            TokenType::LParen => self.parse_group(TokenType::LParen, TokenType::RParen),
            TokenType::LBrace => self.parse_group(TokenType::LBrace, TokenType::RBrace),
            _ => self.parse_simple(),
        }
    }

    fn parse_if(&mut self) -> Result<Node, ParseError> {
        self.expect(TokenType::If)?;
        let cond = self.parse_list(&[TokenType::Then])?;
        self.expect(TokenType::Then)?;
        let then_body = self.parse_list(&[TokenType::Elif, TokenType::Else, TokenType::Fi])?;

        let mut elifs = Vec::new();
        while self.peek_kind() == TokenType::Elif {
            self.advance();
            let elif_cond = self.parse_list(&[TokenType::Then])?;
            self.expect(TokenType::Then)?;
            let elif_body =
                self.parse_list(&[TokenType::Elif, TokenType::Else, TokenType::Fi])?;
            elifs.push((elif_cond, elif_body));
        }

        let else_body = if self.peek_kind() == TokenType::Else {
            self.advance();
            Some(self.parse_list(&[TokenType::Fi])?)
        } else {
            None
        };

        self.expect(TokenType::Fi)?;
        Ok(Node::If { cond, then_body, elifs, else_body })
    }

    fn parse_loop(&mut self, until: bool) -> Result<Node, ParseError> {
        self.advance(); // while / until
        let cond = self.parse_list(&[TokenType::Do])?;
        self.expect(TokenType::Do)?;
        let body = self.parse_list(&[TokenType::Done])?;
        self.expect(TokenType::Done)?;
        Ok(Node::Loop { until, cond, body })
    }

    fn parse_for(&mut self) -> Result<Node, ParseError> {
        self.expect(TokenType::For)?;
        let var = match self.peek_kind() {
            TokenType::Word | TokenType::String => self.advance().value,
            other => {
                return Err(ParseError::new(format!(
                    "expected variable name after `for', found `{}'",
                    other.as_str()
                )))
            }
        };

        let mut items = Vec::new();
        if self.peek_kind() == TokenType::In {
            self.advance();
            while is_word_token(self.peek_kind()) {
                items.push(self.advance());
            }
        }

        self.skip_separators();
        self.expect(TokenType::Do)?;
        let body = self.parse_list(&[TokenType::Done])?;
        self.expect(TokenType::Done)?;
        Ok(Node::For { var, items, body })
    }

    fn parse_group(&mut self, open: TokenType, close: TokenType) -> Result<Node, ParseError> {
        self.expect(open)?;
        let body = self.parse_list(&[close])?;
        self.expect(close)?;
        let redirects = self.parse_redirects()?;

        if open == TokenType::LParen {
            Ok(Node::Subshell { body, redirects, display: "<subshell>".to_string() })
        } else {
            Ok(Node::Brace { body, redirects, display: "<brace-group>".to_string() })
        }
    }

    fn parse_simple(&mut self) -> Result<Node, ParseError> {
        let mut assignments = Vec::new();
        let mut words: Vec<Token> = Vec::new();
        let mut redirects = Vec::new();

        loop {
            let kind = self.peek_kind();
            if kind.is_redirect() {
                let spec = self.parse_one_redirect()?;
                redirects.push(spec);
                continue;
            }
            if !is_word_token(kind) {
                break;
            }
            let token = self.advance();
            if words.is_empty() {
                if let Some((name, value)) = split_assignment(&token) {
                    assignments.push((name, value));
                    continue;
                }
            }
            words.push(token);
        }

        if assignments.is_empty() && words.is_empty() && redirects.is_empty() {
            return Err(ParseError::new(format!(
                "unexpected token `{}'",
                self.peek_kind().as_str()
            )));
        }
        Ok(Node::Simple { assignments, words, redirects })
    }

    fn parse_redirects(&mut self) -> Result<Vec<RedirectSpec>, ParseError> {
        let mut redirects = Vec::new();
        while self.peek_kind().is_redirect() {
            redirects.push(self.parse_one_redirect()?);
        }
        Ok(redirects)
    }

    fn parse_one_redirect(&mut self) -> Result<RedirectSpec, ParseError> {
        let op = self.advance();
        let spec = match op.kind {
            TokenType::RedirectIn => RedirectSpec::In {
                fd: op.fd.unwrap_or(0),
                target: self.expect_word("redirection target")?,
            },
            TokenType::RedirectOut | TokenType::RedirectErr => {
                let target = self.expect_word("redirection target")?;
                if op.combined_redirect {
                    RedirectSpec::Combined { target, append: false }
                } else {
                    let fd = op.fd.unwrap_or(if op.kind == TokenType::RedirectErr { 2 } else { 1 });
                    RedirectSpec::Out { fd, target, append: false }
                }
            }
            TokenType::RedirectAppend | TokenType::RedirectErrAppend => {
                let target = self.expect_word("redirection target")?;
                if op.combined_redirect {
                    RedirectSpec::Combined { target, append: true }
                } else {
                    let fd = op
                        .fd
                        .unwrap_or(if op.kind == TokenType::RedirectErrAppend { 2 } else { 1 });
                    RedirectSpec::Out { fd, target, append: true }
                }
            }
            TokenType::RedirectClobber => RedirectSpec::Out {
                fd: op.fd.unwrap_or(1),
                target: self.expect_word("redirection target")?,
                append: false,
            },
            TokenType::RedirectReadwrite => RedirectSpec::ReadWrite {
                fd: op.fd.unwrap_or(0),
                target: self.expect_word("redirection target")?,
            },
            TokenType::RedirectDup => parse_dup_spec(&op)?,
            TokenType::Heredoc | TokenType::HeredocStrip => {
                // The delimiter word was only for the lexer; consume it
                let _ = self.expect_word("heredoc delimiter")?;
                let (body, quoted) = self
                    .bodies
                    .get(self.next_body)
                    .cloned()
                    .unwrap_or_else(|| (String::new(), false));
                self.next_body += 1;
                RedirectSpec::Here { fd: op.fd.unwrap_or(0), body, quoted }
            }
            TokenType::HereString => RedirectSpec::HereString {
                fd: op.fd.unwrap_or(0),
                target: self.expect_word("here-string word")?,
            },
            other => {
                return Err(ParseError::new(format!(
                    "unsupported redirection `{}'",
                    other.as_str()
                )))
            }
        };
        Ok(spec)
    }

    fn expect_word(&mut self, what: &str) -> Result<Token, ParseError> {
        if is_word_token(self.peek_kind()) {
            Ok(self.advance())
        } else {
            Err(ParseError::new(format!(
                "expected {}, found `{}'",
                what,
                self.peek_kind().as_str()
            )))
        }
    }
}

/// `N>&M` / `>&N` / `<&N` / `N>&-` from the single REDIRECT_DUP token.
fn parse_dup_spec(op: &Token) -> Result<RedirectSpec, ParseError> {
    let value = &op.value;
    let direction_idx = value
        .find(['>', '<'])
        .ok_or_else(|| ParseError::new(format!("malformed duplication `{}'", value)))?;
    let input = value.as_bytes()[direction_idx] == b'<';
    let fd = op.fd.unwrap_or(if input { 0 } else { 1 });

    let target_str = &value[direction_idx + 2..];
    if target_str == "-" {
        return Ok(RedirectSpec::Close { fd });
    }
    let target: i32 = target_str
        .parse()
        .map_err(|_| ParseError::new(format!("malformed duplication `{}'", value)))?;
    Ok(RedirectSpec::Dup { fd, target, input })
}

fn push_redirect(node: &mut Node, spec: RedirectSpec) {
    match node {
        Node::Simple { redirects, .. }
        | Node::Subshell { redirects, .. }
        | Node::Brace { redirects, .. } => redirects.push(spec),
        _ => {}
    }
}

pub fn is_word_token(kind: TokenType) -> bool {
    matches!(
        kind,
        TokenType::Word
            | TokenType::String
            | TokenType::Variable
            | TokenType::CommandSub
            | TokenType::CommandSubBacktick
            | TokenType::ArithExpansion
            | TokenType::ProcessSubIn
            | TokenType::ProcessSubOut
    )
}

/// `NAME=value` / `NAME+=value` prefix of a simple command.
fn split_assignment(token: &Token) -> Option<(String, String)> {
    if token.kind != TokenType::Word || token.quote.is_some() {
        return None;
    }
    let eq = token.value.find('=')?;
    let (name, value) = token.value.split_at(eq);
    let name = name.strip_suffix('+').unwrap_or(name);
    if name.is_empty() || !crate::lexer::unicode::validate_identifier(name, false) {
        return None;
    }
    Some((name.to_string(), value[1..].to_string()))
}

/// Human-readable command text for job display.
pub fn display_of(node: &Node) -> String {
    match node {
        Node::Simple { assignments, words, .. } => {
            let mut parts: Vec<String> =
                assignments.iter().map(|(n, v)| format!("{}={}", n, v)).collect();
            parts.extend(words.iter().map(|w| w.value.clone()));
            parts.join(" ")
        }
        Node::Subshell { display, .. } | Node::Brace { display, .. } => display.clone(),
        Node::Pipeline { display, .. } => display.clone(),
        Node::AndOr { first, rest } => {
            let mut s = display_of(first);
            for (connector, node) in rest {
                let op = match connector {
                    Connector::And => "&&",
                    Connector::Or => "||",
                };
                s.push_str(&format!(" {} {}", op, display_of(node)));
            }
            s
        }
        Node::Background { display, .. } => format!("{} &", display),
        Node::If { .. } => "if …".to_string(),
        Node::Loop { until: false, .. } => "while …".to_string(),
        Node::Loop { until: true, .. } => "until …".to_string(),
        Node::For { var, .. } => format!("for {} …", var),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse(input: &str) -> Vec<Node> {
        CommandParser::new(tokenize(input).unwrap()).parse().unwrap()
    }

    #[test]
    fn test_simple_command() {
        let nodes = parse("echo hello world");
        assert_eq!(nodes.len(), 1);
        match &nodes[0] {
            Node::Simple { words, .. } => {
                assert_eq!(words.len(), 3);
                assert_eq!(words[0].value, "echo");
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_pipeline_structure() {
        let nodes = parse("ls | grep txt | wc -l");
        match &nodes[0] {
            Node::Pipeline { commands, negate, .. } => {
                assert_eq!(commands.len(), 3);
                assert!(!negate);
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_and_or_chain() {
        let nodes = parse("true && echo yes || echo no");
        match &nodes[0] {
            Node::AndOr { rest, .. } => {
                assert_eq!(rest.len(), 2);
                assert_eq!(rest[0].0, Connector::And);
                assert_eq!(rest[1].0, Connector::Or);
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_background_node() {
        let nodes = parse("sleep 10 &");
        match &nodes[0] {
            Node::Background { display, .. } => assert_eq!(display, "sleep 10 &"),
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_redirect_parsing() {
        let nodes = parse("cmd 2>&1 >log");
        match &nodes[0] {
            Node::Simple { redirects, .. } => {
                assert_eq!(redirects.len(), 2);
                assert!(matches!(redirects[0], RedirectSpec::Dup { fd: 2, target: 1, input: false }));
                assert!(matches!(
                    &redirects[1],
                    RedirectSpec::Out { fd: 1, append: false, .. }
                ));
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_close_fd_spec() {
        let nodes = parse("cmd 2>&-");
        match &nodes[0] {
            Node::Simple { redirects, .. } => {
                assert!(matches!(redirects[0], RedirectSpec::Close { fd: 2 }));
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_heredoc_body_attached() {
        let nodes = parse("cat <<EOF\nhello\nEOF\n");
        match &nodes[0] {
            Node::Simple { redirects, words, .. } => {
                assert_eq!(words.len(), 1);
                match &redirects[0] {
                    RedirectSpec::Here { body, quoted, .. } => {
                        assert_eq!(body, "hello\n");
                        assert!(!quoted);
                    }
                    other => panic!("unexpected redirect {:?}", other),
                }
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_assignment_prefix() {
        let nodes = parse("X=1 env");
        match &nodes[0] {
            Node::Simple { assignments, words, .. } => {
                assert_eq!(assignments, &[("X".to_string(), "1".to_string())]);
                assert_eq!(words.len(), 1);
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_bare_assignment() {
        let nodes = parse("X=hello");
        match &nodes[0] {
            Node::Simple { assignments, words, .. } => {
                assert_eq!(assignments.len(), 1);
                assert!(words.is_empty());
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_subshell_group() {
        let nodes = parse("(echo a; echo b) > out");
        match &nodes[0] {
            Node::Subshell { body, redirects, .. } => {
                assert_eq!(body.len(), 2);
                assert_eq!(redirects.len(), 1);
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_brace_group() {
        let nodes = parse("{ echo a; echo b; }");
        match &nodes[0] {
            Node::Brace { body, .. } => assert_eq!(body.len(), 2),
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_if_statement() {
        let nodes = parse("if true; then echo ok; fi");
        match &nodes[0] {
            Node::If { cond, then_body, elifs, else_body } => {
                assert_eq!(cond.len(), 1);
                assert_eq!(then_body.len(), 1);
                assert!(elifs.is_empty());
                assert!(else_body.is_none());
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_if_else() {
        let nodes = parse("if false; then echo a; else echo b; fi");
        match &nodes[0] {
            Node::If { else_body, .. } => assert!(else_body.is_some()),
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_multiline_if() {
        let nodes = parse("if true; then\necho ok\nfi");
        assert_eq!(nodes.len(), 1);
        assert!(matches!(nodes[0], Node::If { .. }));
    }

    #[test]
    fn test_for_loop() {
        let nodes = parse("for i in 1 2 3; do echo $i; done");
        match &nodes[0] {
            Node::For { var, items, body } => {
                assert_eq!(var, "i");
                assert_eq!(items.len(), 3);
                assert_eq!(body.len(), 1);
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_while_loop() {
        let nodes = parse("while true; do echo x; done");
        assert!(matches!(nodes[0], Node::Loop { until: false, .. }));
        let nodes = parse("until false; do echo x; done");
        assert!(matches!(nodes[0], Node::Loop { until: true, .. }));
    }

    #[test]
    fn test_negated_pipeline() {
        let nodes = parse("! true");
        match &nodes[0] {
            Node::Pipeline { negate, commands, .. } => {
                assert!(negate);
                assert_eq!(commands.len(), 1);
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_missing_fi_is_error() {
        let tokens = tokenize("if true; then echo ok").unwrap();
        assert!(CommandParser::new(tokens).parse().is_err());
    }

    #[test]
    fn test_pipe_and_adds_dup() {
        let nodes = parse("cmd |& wc");
        match &nodes[0] {
            Node::Pipeline { commands, .. } => match &commands[0] {
                Node::Simple { redirects, .. } => {
                    assert!(matches!(redirects[0], RedirectSpec::Dup { fd: 2, target: 1, input: false }));
                }
                other => panic!("unexpected command {:?}", other),
            },
            other => panic!("unexpected node {:?}", other),
        }
    }
}
