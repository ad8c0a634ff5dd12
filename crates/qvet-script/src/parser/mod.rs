//! Parser for circuit scripts.

mod expression;
mod statement;

use crate::ast::Program;
use crate::error::{ParseResult, SyntaxError};
use crate::lexer::{SpannedToken, Token, tokenize};

/// Default bound on expression and block nesting.
pub const DEFAULT_MAX_NESTING: usize = 100;

/// Parse a script into an AST.
pub fn parse(source: &str) -> ParseResult<Program> {
    parse_with_nesting_limit(source, DEFAULT_MAX_NESTING)
}

/// Parse a script, rejecting nesting deeper than `max_nesting`.
pub fn parse_with_nesting_limit(source: &str, max_nesting: usize) -> ParseResult<Program> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens, max_nesting);
    parser.parse_program()
}

/// Parser state.
pub(super) struct Parser {
    pub(super) tokens: Vec<SpannedToken>,
    pub(super) pos: usize,
    depth: usize,
    max_nesting: usize,
    pub(super) loop_depth: usize,
    pub(super) function_depth: usize,
}

impl Parser {
    /// Create a parser over a token stream ending in [`Token::EndOfFile`].
    pub(super) fn new(mut tokens: Vec<SpannedToken>, max_nesting: usize) -> Self {
        if !matches!(tokens.last().map(|t| &t.token), Some(Token::EndOfFile)) {
            let (end, line) = tokens
                .last()
                .map_or((0, 1), |t| (t.span.end, t.line));
            tokens.push(SpannedToken {
                token: Token::EndOfFile,
                span: end..end,
                line,
            });
        }
        Self {
            tokens,
            pos: 0,
            depth: 0,
            max_nesting,
            loop_depth: 0,
            function_depth: 0,
        }
    }

    /// Check if we've reached the end.
    pub(super) fn is_eof(&self) -> bool {
        matches!(self.peek(), Token::EndOfFile)
    }

    /// Peek at the current token.
    pub(super) fn peek(&self) -> &Token {
        let idx = self.pos.min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    /// Peek `n` tokens ahead.
    pub(super) fn peek_nth(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    /// Line of the current token.
    pub(super) fn line(&self) -> usize {
        let idx = self.pos.min(self.tokens.len() - 1);
        self.tokens[idx].line
    }

    /// Advance and return the current token.
    pub(super) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_eof() {
            self.pos += 1;
        }
        token
    }

    /// Expect a specific token.
    pub(super) fn expect(&mut self, expected: &Token) -> ParseResult<()> {
        if self.check(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{expected}'")))
        }
    }

    /// Check if current token matches.
    pub(super) fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    /// Consume token if it matches.
    pub(super) fn consume(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Error for an unexpected current token.
    pub(super) fn unexpected(&self, expected: &str) -> SyntaxError {
        let message = match self.peek() {
            Token::EndOfFile => format!("unexpected end of input, expected {expected}"),
            Token::Newline => format!("invalid syntax: expected {expected} before end of line"),
            Token::Indent => "unexpected indent".to_string(),
            found => format!("invalid syntax: expected {expected}, found '{found}'"),
        };
        SyntaxError::new(self.line(), message)
    }

    pub(super) fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.line(), message)
    }

    /// Enter one nesting level.
    pub(super) fn enter(&mut self) -> ParseResult<()> {
        self.enter_with("too many nested parentheses")
    }

    /// Enter one nesting level, failing with `message` past the limit.
    ///
    /// Operator chains such as `a + b + c` and `f()()` build one tree level
    /// per link, so their links count here too.
    pub(super) fn enter_with(&mut self, message: &str) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > self.max_nesting {
            return Err(self.error(message));
        }
        Ok(())
    }

    /// Leave one nesting level.
    pub(super) fn leave(&mut self) {
        self.leave_levels(1);
    }

    pub(super) fn leave_levels(&mut self, levels: usize) {
        self.depth = self.depth.saturating_sub(levels);
    }

    /// Parse an identifier.
    pub(super) fn parse_identifier(&mut self) -> ParseResult<String> {
        match self.peek() {
            Token::Identifier(_) => match self.advance() {
                Token::Identifier(name) => Ok(name),
                _ => Err(self.unexpected("identifier")),
            },
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// Parse the entire program.
    fn parse_program(&mut self) -> ParseResult<Program> {
        let mut body = Vec::new();
        while !self.is_eof() {
            if self.consume(&Token::Newline) {
                continue;
            }
            self.parse_statement(&mut body)?;
        }
        Ok(Program { body })
    }
}
