//! Lexer for circuit scripts.
//!
//! Raw tokens come from a `logos` lexer. A layout pass then turns physical
//! lines into logical ones: newlines inside brackets are dropped and changes
//! in leading whitespace become [`Token::Indent`] / [`Token::Dedent`].

use std::fmt;

use logos::Logos;

use crate::error::{ParseResult, SyntaxError};

/// Errors raised by individual token callbacks.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LexError {
    #[default]
    InvalidCharacter,
    UnterminatedString,
    UnterminatedTripleString,
    IntegerTooLarge,
    BytesLiteral,
    InvalidStringPrefix,
    InvalidEscape,
}

/// A string literal after escape processing.
#[derive(Debug, Clone, PartialEq)]
pub struct StringLiteral {
    pub value: String,
    /// `f"..."` literal whose braces hold expressions.
    pub formatted: bool,
}

/// Tokens for circuit scripts.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexError)]
#[logos(skip r"[ \t\f\r]+")]
#[logos(skip r"#[^\n]*")]
#[logos(skip r"\\\r?\n")]
pub enum Token {
    // Keywords
    #[token("False")]
    False,
    #[token("None")]
    None,
    #[token("True")]
    True,
    #[token("and")]
    And,
    #[token("as")]
    As,
    #[token("assert")]
    Assert,
    #[token("async")]
    Async,
    #[token("await")]
    Await,
    #[token("break")]
    Break,
    #[token("class")]
    Class,
    #[token("continue")]
    Continue,
    #[token("def")]
    Def,
    #[token("del")]
    Del,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("except")]
    Except,
    #[token("finally")]
    Finally,
    #[token("for")]
    For,
    #[token("from")]
    From,
    #[token("global")]
    Global,
    #[token("if")]
    If,
    #[token("import")]
    Import,
    #[token("in")]
    In,
    #[token("is")]
    Is,
    #[token("lambda")]
    Lambda,
    #[token("nonlocal")]
    Nonlocal,
    #[token("not")]
    Not,
    #[token("or")]
    Or,
    #[token("pass")]
    Pass,
    #[token("raise")]
    Raise,
    #[token("return")]
    Return,
    #[token("try")]
    Try,
    #[token("while")]
    While,
    #[token("with")]
    With,
    #[token("yield")]
    Yield,

    // Literals
    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9]+)?", lex_float)]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?", lex_float)]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9]+", lex_float)]
    FloatLiteral(f64),

    #[regex(r"[0-9][0-9_]*", lex_int)]
    #[regex(r"0[xX][0-9a-fA-F_]+", lex_int)]
    #[regex(r"0[oO][0-7_]+", lex_int)]
    #[regex(r"0[bB][01_]+", lex_int)]
    IntLiteral(i64),

    #[regex(r#"["']"#, lex_string)]
    #[regex(r#"[rRfFuUbB]["']"#, lex_string)]
    #[regex(r#"[rRfFbB][rRfFbB]["']"#, lex_string)]
    StringLiteral(StringLiteral),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    Power,
    #[token("/")]
    Slash,
    #[token("//")]
    DoubleSlash,
    #[token("%")]
    Percent,
    #[token("@")]
    At,
    #[token("<<")]
    LShift,
    #[token(">>")]
    RShift,
    #[token("&")]
    Ampersand,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("=")]
    Eq,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("//=")]
    DoubleSlashEq,
    #[token("%=")]
    PercentEq,
    #[token("**=")]
    PowerEq,
    #[token("&=")]
    AmpersandEq,
    #[token("|=")]
    PipeEq,
    #[token("^=")]
    CaretEq,
    #[token("<<=")]
    LShiftEq,
    #[token(">>=")]
    RShiftEq,
    #[token(":=")]
    Walrus,
    #[token("->")]
    Arrow,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,

    #[token("\n")]
    Newline,

    /// Integer literal outside the 64-bit range, digits kept verbatim.
    /// Produced by [`tokenize_raw`] rather than a pattern.
    WideIntLiteral(String),

    // Produced by the layout pass only.
    Indent,
    Dedent,
    EndOfFile,
}

fn lex_float(lex: &mut logos::Lexer<'_, Token>) -> Option<f64> {
    lex.slice().replace('_', "").parse().ok()
}

fn split_radix(digits: &str) -> (u32, &str) {
    match digits.get(..2) {
        Some("0x" | "0X") => (16, &digits[2..]),
        Some("0o" | "0O") => (8, &digits[2..]),
        Some("0b" | "0B") => (2, &digits[2..]),
        _ => (10, digits),
    }
}

fn lex_int(lex: &mut logos::Lexer<'_, Token>) -> Result<i64, LexError> {
    let digits = lex.slice().replace('_', "");
    let (radix, body) = split_radix(&digits);
    if body.is_empty() {
        return Err(LexError::InvalidCharacter);
    }
    i64::from_str_radix(body, radix).map_err(|_| LexError::IntegerTooLarge)
}

/// Magnitude of a [`Token::WideIntLiteral`], or `None` past 128 bits.
pub fn wide_int_magnitude(digits: &str) -> Option<u128> {
    let (radix, body) = split_radix(digits);
    u128::from_str_radix(body, radix).ok()
}

fn lex_string(lex: &mut logos::Lexer<'_, Token>) -> Result<StringLiteral, LexError> {
    let slice = lex.slice();
    let quote = slice.chars().last().ok_or(LexError::InvalidCharacter)?;
    let prefix = slice[..slice.len() - 1].to_ascii_lowercase();
    let (raw, formatted) = match prefix.as_str() {
        "" | "u" => (false, false),
        "r" => (true, false),
        "f" => (false, true),
        "rf" | "fr" => (true, true),
        p if p.contains('b') => return Err(LexError::BytesLiteral),
        _ => return Err(LexError::InvalidStringPrefix),
    };

    let remainder = lex.remainder();
    let doubled: String = [quote, quote].iter().collect();
    let triple = remainder.starts_with(&doubled);
    let opening = if triple { 2 } else { 0 };
    let delimiter: String = if triple {
        [quote, quote, quote].iter().collect()
    } else {
        quote.to_string()
    };

    let body = &remainder[opening..];
    let mut value = String::new();
    let mut chars = body.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if body[idx..].starts_with(&delimiter) {
            lex.bump(opening + idx + delimiter.len());
            return Ok(StringLiteral { value, formatted });
        }
        match c {
            '\n' if !triple => return Err(LexError::UnterminatedString),
            '\\' => {
                let Some((_, next)) = chars.next() else {
                    break;
                };
                if raw {
                    value.push('\\');
                    value.push(next);
                    continue;
                }
                match next {
                    '\n' => {}
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    'a' => value.push('\x07'),
                    'b' => value.push('\x08'),
                    'f' => value.push('\x0c'),
                    'v' => value.push('\x0b'),
                    '\\' | '\'' | '"' => value.push(next),
                    'x' | 'u' | 'U' => {
                        let width = match next {
                            'x' => 2,
                            'u' => 4,
                            _ => 8,
                        };
                        let mut code = 0u32;
                        for _ in 0..width {
                            let digit = chars
                                .next()
                                .and_then(|(_, d)| d.to_digit(16))
                                .ok_or(LexError::InvalidEscape)?;
                            code = code * 16 + digit;
                        }
                        value.push(char::from_u32(code).ok_or(LexError::InvalidEscape)?);
                    }
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
            }
            _ => value.push(c),
        }
    }

    Err(if triple {
        LexError::UnterminatedTripleString
    } else {
        LexError::UnterminatedString
    })
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::FloatLiteral(v) => return write!(f, "{v}"),
            Token::IntLiteral(v) => return write!(f, "{v}"),
            Token::WideIntLiteral(s) => return write!(f, "{s}"),
            Token::StringLiteral(s) => return write!(f, "{:?}", s.value),
            Token::Identifier(s) => return write!(f, "{s}"),
            Token::False => "False",
            Token::None => "None",
            Token::True => "True",
            Token::And => "and",
            Token::As => "as",
            Token::Assert => "assert",
            Token::Async => "async",
            Token::Await => "await",
            Token::Break => "break",
            Token::Class => "class",
            Token::Continue => "continue",
            Token::Def => "def",
            Token::Del => "del",
            Token::Elif => "elif",
            Token::Else => "else",
            Token::Except => "except",
            Token::Finally => "finally",
            Token::For => "for",
            Token::From => "from",
            Token::Global => "global",
            Token::If => "if",
            Token::Import => "import",
            Token::In => "in",
            Token::Is => "is",
            Token::Lambda => "lambda",
            Token::Nonlocal => "nonlocal",
            Token::Not => "not",
            Token::Or => "or",
            Token::Pass => "pass",
            Token::Raise => "raise",
            Token::Return => "return",
            Token::Try => "try",
            Token::While => "while",
            Token::With => "with",
            Token::Yield => "yield",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Power => "**",
            Token::Slash => "/",
            Token::DoubleSlash => "//",
            Token::Percent => "%",
            Token::At => "@",
            Token::LShift => "<<",
            Token::RShift => ">>",
            Token::Ampersand => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::Tilde => "~",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::LtEq => "<=",
            Token::GtEq => ">=",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Eq => "=",
            Token::PlusEq => "+=",
            Token::MinusEq => "-=",
            Token::StarEq => "*=",
            Token::SlashEq => "/=",
            Token::DoubleSlashEq => "//=",
            Token::PercentEq => "%=",
            Token::PowerEq => "**=",
            Token::AmpersandEq => "&=",
            Token::PipeEq => "|=",
            Token::CaretEq => "^=",
            Token::LShiftEq => "<<=",
            Token::RShiftEq => ">>=",
            Token::Walrus => ":=",
            Token::Arrow => "->",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Semicolon => ";",
            Token::Dot => ".",
            Token::Newline => "newline",
            Token::Indent => "indent",
            Token::Dedent => "dedent",
            Token::EndOfFile => "end of input",
        };
        f.write_str(text)
    }
}

/// A token with its position.
#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: std::ops::Range<usize>,
    /// 1-based line where the token starts.
    pub line: usize,
}

/// Byte offsets of line starts, for mapping spans to line numbers.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(line) => line + 1,
            Err(line) => line,
        }
    }

    fn line_start(&self, line: usize) -> usize {
        self.starts[line - 1]
    }
}

fn describe(err: &LexError, slice: &str) -> String {
    match err {
        LexError::InvalidCharacter => match slice.chars().next() {
            Some(c) => format!("invalid character '{c}' (U+{:04X})", c as u32),
            None => "invalid syntax".into(),
        },
        LexError::UnterminatedString => "unterminated string literal".into(),
        LexError::UnterminatedTripleString => "unterminated triple-quoted string literal".into(),
        LexError::IntegerTooLarge => "integer literal is too large".into(),
        LexError::BytesLiteral => "bytes literals are not supported".into(),
        LexError::InvalidStringPrefix => "invalid string prefix".into(),
        LexError::InvalidEscape => "invalid escape sequence in string literal".into(),
    }
}

/// Tokenize raw source without the layout pass.
pub fn tokenize_raw(source: &str) -> ParseResult<Vec<SpannedToken>> {
    let index = LineIndex::new(source);
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let line = index.line_of(span.start);
        match result {
            Ok(token) => tokens.push(SpannedToken { token, span, line }),
            Err(LexError::IntegerTooLarge) => {
                let token = Token::WideIntLiteral(lexer.slice().replace('_', ""));
                tokens.push(SpannedToken { token, span, line });
            }
            Err(err) => {
                return Err(SyntaxError::new(line, describe(&err, lexer.slice())));
            }
        }
    }
    Ok(tokens)
}

fn indentation_width(prefix: &str) -> usize {
    prefix.chars().fold(0, |col, c| match c {
        '\t' => (col / 8 + 1) * 8,
        _ => col + 1,
    })
}

fn closing_for(token: &Token) -> Option<Token> {
    match token {
        Token::LParen => Some(Token::RParen),
        Token::LBracket => Some(Token::RBracket),
        Token::LBrace => Some(Token::RBrace),
        _ => None,
    }
}

/// Tokenize a script into logical lines with indentation tokens.
///
/// The returned stream always ends with [`Token::EndOfFile`], preceded by
/// enough [`Token::Dedent`]s to close every open block.
pub fn tokenize(source: &str) -> ParseResult<Vec<SpannedToken>> {
    let index = LineIndex::new(source);
    let raw = tokenize_raw(source)?;

    let mut out = Vec::with_capacity(raw.len() + 8);
    let mut indents = vec![0usize];
    let mut brackets: Vec<(Token, usize)> = Vec::new();
    let mut at_line_start = true;
    let mut last_line = 1;

    for tok in raw {
        last_line = tok.line;
        if tok.token == Token::Newline {
            if brackets.is_empty() && !at_line_start {
                out.push(tok);
                at_line_start = true;
            }
            continue;
        }

        if at_line_start {
            let line_start = index.line_start(tok.line);
            let width = indentation_width(&source[line_start..tok.span.start]);
            let top = indents.last().copied().unwrap_or(0);
            if width > top {
                indents.push(width);
                out.push(SpannedToken {
                    token: Token::Indent,
                    span: tok.span.start..tok.span.start,
                    line: tok.line,
                });
            } else {
                while width < indents.last().copied().unwrap_or(0) {
                    indents.pop();
                    out.push(SpannedToken {
                        token: Token::Dedent,
                        span: tok.span.start..tok.span.start,
                        line: tok.line,
                    });
                }
                if width != indents.last().copied().unwrap_or(0) {
                    return Err(SyntaxError::new(
                        tok.line,
                        "unindent does not match any outer indentation level",
                    ));
                }
            }
            at_line_start = false;
        }

        match &tok.token {
            Token::LParen | Token::LBracket | Token::LBrace => {
                brackets.push((tok.token.clone(), tok.line));
            }
            Token::RParen | Token::RBracket | Token::RBrace => match brackets.pop() {
                Some((open, _)) if closing_for(&open).as_ref() == Some(&tok.token) => {}
                Some((open, open_line)) => {
                    let message = if open_line == tok.line {
                        format!(
                            "closing parenthesis '{}' does not match opening parenthesis '{open}'",
                            tok.token
                        )
                    } else {
                        format!(
                            "closing parenthesis '{}' does not match opening parenthesis '{open}' on line {open_line}",
                            tok.token
                        )
                    };
                    return Err(SyntaxError::new(tok.line, message));
                }
                None => {
                    return Err(SyntaxError::new(
                        tok.line,
                        format!("unmatched '{}'", tok.token),
                    ));
                }
            },
            _ => {}
        }
        out.push(tok);
    }

    if let Some((open, open_line)) = brackets.first() {
        return Err(SyntaxError::new(
            *open_line,
            format!("'{open}' was never closed"),
        ));
    }

    let end = source.len();
    if !at_line_start {
        out.push(SpannedToken {
            token: Token::Newline,
            span: end..end,
            line: last_line,
        });
    }
    for _ in 1..indents.len() {
        out.push(SpannedToken {
            token: Token::Dedent,
            span: end..end,
            line: last_line,
        });
    }
    out.push(SpannedToken {
        token: Token::EndOfFile,
        span: end..end,
        line: last_line,
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_basic_tokens() {
        let tokens = kinds("qc.h(0)");
        assert!(matches!(tokens[0], Token::Identifier(ref s) if s == "qc"));
        assert_eq!(tokens[1], Token::Dot);
        assert!(matches!(tokens[2], Token::Identifier(ref s) if s == "h"));
        assert_eq!(tokens[3], Token::LParen);
        assert_eq!(tokens[4], Token::IntLiteral(0));
        assert_eq!(tokens[5], Token::RParen);
        assert_eq!(tokens[6], Token::Newline);
        assert_eq!(tokens[7], Token::EndOfFile);
    }

    #[test]
    fn test_numbers() {
        let tokens = kinds("1_000 0x1f 0b101 1.5 .5 2e3 3.");
        assert_eq!(tokens[0], Token::IntLiteral(1000));
        assert_eq!(tokens[1], Token::IntLiteral(31));
        assert_eq!(tokens[2], Token::IntLiteral(5));
        assert_eq!(tokens[3], Token::FloatLiteral(1.5));
        assert_eq!(tokens[4], Token::FloatLiteral(0.5));
        assert_eq!(tokens[5], Token::FloatLiteral(2000.0));
        assert_eq!(tokens[6], Token::FloatLiteral(3.0));
    }

    #[test]
    fn test_strings() {
        let tokens = kinds(r#"'a\tb' r"\n" f"{x}" """multi
line""""#);
        let values: Vec<_> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::StringLiteral(s) => Some((s.value.clone(), s.formatted)),
                _ => None,
            })
            .collect();
        assert_eq!(values[0], ("a\tb".to_string(), false));
        assert_eq!(values[1], ("\\n".to_string(), false));
        assert_eq!(values[2], ("{x}".to_string(), true));
        assert_eq!(values[3], ("multi\nline".to_string(), false));
    }

    #[test]
    fn test_empty_string_is_not_triple() {
        let tokens = kinds("x = ''");
        assert!(matches!(&tokens[2], Token::StringLiteral(s) if s.value.is_empty()));
    }

    #[test]
    fn test_keywords_beat_identifiers() {
        let tokens = kinds("for fork in range(2): pass");
        assert_eq!(tokens[0], Token::For);
        assert!(matches!(tokens[1], Token::Identifier(ref s) if s == "fork"));
        assert_eq!(tokens[2], Token::In);
    }

    #[test]
    fn test_indentation() {
        let tokens = kinds("for i in x:\n    a\n    b\nc\n");
        let layout: Vec<_> = tokens
            .iter()
            .filter(|t| matches!(t, Token::Indent | Token::Dedent | Token::Newline))
            .cloned()
            .collect();
        assert_eq!(
            layout,
            vec![
                Token::Newline,
                Token::Indent,
                Token::Newline,
                Token::Newline,
                Token::Dedent,
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_newlines_inside_brackets_are_joined() {
        let tokens = kinds("f(1,\n  2)\n");
        assert_eq!(
            tokens.iter().filter(|t| **t == Token::Newline).count(),
            1
        );
        assert!(!tokens.contains(&Token::Indent));
    }

    #[test]
    fn test_blank_lines_and_comments_ignored() {
        let tokens = kinds("a\n\n   # comment\n\nb\n");
        assert!(!tokens.contains(&Token::Indent));
        assert_eq!(
            tokens.iter().filter(|t| **t == Token::Newline).count(),
            2
        );
    }

    #[test]
    fn test_unclosed_paren_reports_opening_line() {
        let err = tokenize("from qiskit import QuantumCircuit\nqc = QuantumCircuit(2\nqc.h(0")
            .unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.message, "'(' was never closed");

        let err = tokenize("x = (1,\n2").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_mismatched_brackets() {
        let err = tokenize("x = [1, 2)").unwrap_err();
        assert!(err.message.contains("does not match"));
        let err = tokenize("x = 1)").unwrap_err();
        assert_eq!(err.message, "unmatched ')'");
    }

    #[test]
    fn test_bad_dedent() {
        let err = tokenize("if x:\n    a\n  b\n").unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_invalid_character_line() {
        let err = tokenize("a = 1\nb = $\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.starts_with("invalid character '$'"));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("x = 'abc\n").unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
    }

    #[test]
    fn test_wide_integer_literal_tokens() {
        let tokens = kinds("x = 99_999_999_999_999_999_999 + 0x1_0000_0000_0000_0000");
        assert_eq!(tokens[2], Token::WideIntLiteral("99999999999999999999".into()));
        assert_eq!(tokens[4], Token::WideIntLiteral("0x10000000000000000".into()));

        let tokens = kinds("9223372036854775807");
        assert_eq!(tokens[0], Token::IntLiteral(i64::MAX));
    }
}
