//! Expression parsing.

use std::rc::Rc;

use super::Parser;
use crate::ast::{
    Argument, BinaryOp, CompareOp, Comprehension, Expr, FormatPart, LogicalOp, Target, UnaryOp,
};
use crate::error::{ParseResult, SyntaxError};
use crate::lexer::{Token, tokenize_raw, wide_int_magnitude};

const CHAIN_TOO_DEEP: &str = "expression is too deeply nested";

impl Parser {
    /// Parse a full expression, including `a if c else b`.
    pub(super) fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.enter()?;
        if self.check(&Token::Lambda) {
            return Err(self.error("lambda expressions are not supported"));
        }
        if matches!(self.peek(), Token::Yield | Token::Await) {
            return Err(self.error(format!("'{}' is not supported", self.peek())));
        }
        let body = self.parse_or()?;
        let expr = if self.consume(&Token::If) {
            let test = self.parse_or()?;
            self.expect(&Token::Else)?;
            let orelse = self.parse_expression()?;
            Expr::Conditional {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            }
        } else {
            body
        };
        self.leave();
        Ok(expr)
    }

    /// Parse `a, b, c` as a tuple, or a single expression without a comma.
    pub(super) fn parse_expression_list(&mut self) -> ParseResult<Expr> {
        let first = self.parse_expression()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.consume(&Token::Comma) {
            if self.at_expression_end() {
                break;
            }
            items.push(self.parse_expression()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn at_expression_end(&self) -> bool {
        matches!(
            self.peek(),
            Token::Newline
                | Token::EndOfFile
                | Token::Semicolon
                | Token::Eq
                | Token::RParen
                | Token::RBracket
                | Token::RBrace
                | Token::Colon
        ) || augmented_op(self.peek()).is_some()
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_and()?;
        let mut links = 0;
        while self.consume(&Token::Or) {
            self.enter_with(CHAIN_TOO_DEEP)?;
            links += 1;
            let right = self.parse_and()?;
            left = Expr::Logical {
                left: Box::new(left),
                op: LogicalOp::Or,
                right: Box::new(right),
            };
        }
        self.leave_levels(links);
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_not()?;
        let mut links = 0;
        while self.consume(&Token::And) {
            self.enter_with(CHAIN_TOO_DEEP)?;
            links += 1;
            let right = self.parse_not()?;
            left = Expr::Logical {
                left: Box::new(left),
                op: LogicalOp::And,
                right: Box::new(right),
            };
        }
        self.leave_levels(links);
        Ok(left)
    }

    fn parse_not(&mut self) -> ParseResult<Expr> {
        if self.consume(&Token::Not) {
            self.enter()?;
            let operand = self.parse_not()?;
            self.leave();
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn comparison_op(&mut self) -> Option<CompareOp> {
        let op = match self.peek() {
            Token::EqEq => CompareOp::Eq,
            Token::NotEq => CompareOp::NotEq,
            Token::Lt => CompareOp::Lt,
            Token::LtEq => CompareOp::LtEq,
            Token::Gt => CompareOp::Gt,
            Token::GtEq => CompareOp::GtEq,
            Token::In => CompareOp::In,
            Token::Not if matches!(self.peek_nth(1), Token::In) => {
                self.advance();
                CompareOp::NotIn
            }
            Token::Is if matches!(self.peek_nth(1), Token::Not) => {
                self.advance();
                CompareOp::IsNot
            }
            Token::Is => CompareOp::Is,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let left = self.parse_binary_expr(0)?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_op() {
            rest.push((op, self.parse_binary_expr(0)?));
        }
        if rest.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                rest,
            })
        }
    }

    /// Parse binary expression with precedence climbing.
    fn parse_binary_expr(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        let mut links = 0;

        while let Some((op, prec)) = binary_op(self.peek()) {
            if prec < min_prec {
                break;
            }
            self.advance();
            self.enter_with(CHAIN_TOO_DEEP)?;
            links += 1;
            let right = self.parse_binary_expr(prec + 1)?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        self.leave_levels(links);
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Pos,
            Token::Tilde => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        self.advance();
        if op == UnaryOp::Neg && self.at_min_int_magnitude() {
            self.advance();
            return Ok(Expr::Int(i64::MIN));
        }
        self.enter()?;
        let operand = self.parse_unary()?;
        self.leave();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// `-9223372036854775808` is the one negative literal whose magnitude
    /// does not fit in an `i64`.
    fn at_min_int_magnitude(&self) -> bool {
        let Token::WideIntLiteral(digits) = self.peek() else {
            return false;
        };
        let binds_tighter = matches!(
            self.peek_nth(1),
            Token::Power | Token::LParen | Token::LBracket | Token::Dot
        );
        !binds_tighter && wide_int_magnitude(digits) == Some(1 << 63)
    }

    fn parse_power(&mut self) -> ParseResult<Expr> {
        let base = self.parse_postfix()?;
        if self.consume(&Token::Power) {
            self.enter()?;
            let exponent = self.parse_unary()?;
            self.leave();
            return Ok(Expr::Binary {
                left: Box::new(base),
                op: BinaryOp::Pow,
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    /// Parse an atom followed by calls, subscripts and attribute accesses.
    pub(super) fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_atom()?;
        let mut links = 0;
        loop {
            if matches!(self.peek(), Token::LParen | Token::LBracket | Token::Dot) {
                self.enter_with(CHAIN_TOO_DEEP)?;
                links += 1;
            }
            match self.peek() {
                Token::LParen => {
                    self.advance();
                    let args = self.parse_arguments()?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                    };
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_subscript()?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Token::Dot => {
                    self.advance();
                    let name = self.parse_identifier()?;
                    expr = Expr::Attribute {
                        value: Box::new(expr),
                        name,
                    };
                }
                _ => {
                    self.leave_levels(links);
                    return Ok(expr);
                }
            }
        }
    }

    fn parse_atom(&mut self) -> ParseResult<Expr> {
        match self.peek() {
            Token::IntLiteral(v) => {
                let v = *v;
                self.advance();
                Ok(Expr::Int(v))
            }
            Token::WideIntLiteral(digits) => {
                let digits = Rc::from(digits.as_str());
                self.advance();
                Ok(Expr::WideInt(digits))
            }
            Token::FloatLiteral(v) => {
                let v = *v;
                self.advance();
                Ok(Expr::Float(v))
            }
            Token::StringLiteral(_) => self.parse_strings(),
            Token::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            Token::None => {
                self.advance();
                Ok(Expr::None)
            }
            Token::Identifier(_) => Ok(Expr::Name(self.parse_identifier()?)),
            Token::LParen => {
                self.advance();
                self.parse_parenthesized()
            }
            Token::LBracket => {
                self.advance();
                self.parse_list_display()
            }
            Token::LBrace => {
                self.advance();
                self.parse_dict_display()
            }
            Token::Lambda => Err(self.error("lambda expressions are not supported")),
            Token::Yield | Token::Await => {
                Err(self.error(format!("'{}' is not supported", self.peek())))
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    /// After `(`: unit tuple, parenthesized expression, tuple, or generator.
    fn parse_parenthesized(&mut self) -> ParseResult<Expr> {
        if self.consume(&Token::RParen) {
            return Ok(Expr::Tuple(Vec::new()));
        }
        let first = self.parse_expression()?;
        if self.check(&Token::For) {
            let clauses = self.parse_comprehension_clauses()?;
            self.expect(&Token::RParen)?;
            return Ok(Expr::ListComp {
                element: Box::new(first),
                clauses,
            });
        }
        if self.consume(&Token::RParen) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.consume(&Token::Comma) {
            if self.check(&Token::RParen) {
                break;
            }
            items.push(self.parse_expression()?);
        }
        self.expect(&Token::RParen)?;
        Ok(Expr::Tuple(items))
    }

    fn parse_list_display(&mut self) -> ParseResult<Expr> {
        if self.consume(&Token::RBracket) {
            return Ok(Expr::List(Vec::new()));
        }
        let first = self.parse_expression()?;
        if self.check(&Token::For) {
            let clauses = self.parse_comprehension_clauses()?;
            self.expect(&Token::RBracket)?;
            return Ok(Expr::ListComp {
                element: Box::new(first),
                clauses,
            });
        }
        let mut items = vec![first];
        while self.consume(&Token::Comma) {
            if self.check(&Token::RBracket) {
                break;
            }
            items.push(self.parse_expression()?);
        }
        self.expect(&Token::RBracket)?;
        Ok(Expr::List(items))
    }

    fn parse_dict_display(&mut self) -> ParseResult<Expr> {
        let mut entries = Vec::new();
        while !self.check(&Token::RBrace) {
            let key = self.parse_expression()?;
            if !self.check(&Token::Colon) {
                return Err(self.error("set literals are not supported"));
            }
            self.advance();
            let value = self.parse_expression()?;
            if self.check(&Token::For) {
                return Err(self.error("dict comprehensions are not supported"));
            }
            entries.push((key, value));
            if !self.consume(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(Expr::Dict(entries))
    }

    /// Parse `for t in it [if c]*` clauses, at least one.
    fn parse_comprehension_clauses(&mut self) -> ParseResult<Vec<Comprehension>> {
        let mut clauses = Vec::new();
        while self.consume(&Token::For) {
            let target = self.parse_target_list()?;
            self.expect(&Token::In)?;
            let iter = self.parse_or()?;
            let mut conditions = Vec::new();
            while self.consume(&Token::If) {
                conditions.push(self.parse_or()?);
            }
            clauses.push(Comprehension {
                target,
                iter,
                conditions,
            });
        }
        Ok(clauses)
    }

    /// Parse the target of a `for` loop or comprehension.
    pub(super) fn parse_target_list(&mut self) -> ParseResult<Target> {
        let line = self.line();
        let first = self.parse_postfix()?;
        if !self.check(&Token::Comma) {
            return to_target(first, line);
        }
        let mut items = vec![first];
        while self.consume(&Token::Comma) {
            if self.check(&Token::In) {
                break;
            }
            items.push(self.parse_postfix()?);
        }
        to_target(Expr::Tuple(items), line)
    }

    /// After `(` of a call.
    fn parse_arguments(&mut self) -> ParseResult<Vec<Argument>> {
        let mut args = Vec::new();
        let mut seen_keyword = false;
        while !self.check(&Token::RParen) {
            if self.consume(&Token::Star) {
                args.push(Argument::Unpack(self.parse_expression()?));
            } else if self.check(&Token::Power) {
                return Err(self.error("'**' argument unpacking is not supported"));
            } else if matches!(self.peek(), Token::Identifier(_))
                && matches!(self.peek_nth(1), Token::Eq)
            {
                let name = self.parse_identifier()?;
                self.advance();
                args.push(Argument::Keyword(name, self.parse_expression()?));
                seen_keyword = true;
            } else {
                if seen_keyword {
                    return Err(self.error("positional argument follows keyword argument"));
                }
                let value = self.parse_expression()?;
                if self.check(&Token::For) {
                    let clauses = self.parse_comprehension_clauses()?;
                    args.push(Argument::Positional(Expr::ListComp {
                        element: Box::new(value),
                        clauses,
                    }));
                } else {
                    args.push(Argument::Positional(value));
                }
            }
            if !self.consume(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    /// After `[` of a subscript: index, slice, or tuple of them.
    fn parse_subscript(&mut self) -> ParseResult<Expr> {
        let first = self.parse_slice_item()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.consume(&Token::Comma) {
            if self.check(&Token::RBracket) {
                break;
            }
            items.push(self.parse_slice_item()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn parse_slice_item(&mut self) -> ParseResult<Expr> {
        let lower = if self.check(&Token::Colon) {
            None
        } else {
            let expr = self.parse_expression()?;
            if !self.check(&Token::Colon) {
                return Ok(expr);
            }
            Some(Box::new(expr))
        };
        self.expect(&Token::Colon)?;
        let upper = self.parse_optional_slice_bound()?;
        let step = if self.consume(&Token::Colon) {
            self.parse_optional_slice_bound()?
        } else {
            None
        };
        Ok(Expr::Slice { lower, upper, step })
    }

    fn parse_optional_slice_bound(&mut self) -> ParseResult<Option<Box<Expr>>> {
        if matches!(
            self.peek(),
            Token::Colon | Token::Comma | Token::RBracket
        ) {
            Ok(None)
        } else {
            Ok(Some(Box::new(self.parse_expression()?)))
        }
    }

    /// Adjacent string literals concatenate; any f-string makes the result
    /// formatted.
    fn parse_strings(&mut self) -> ParseResult<Expr> {
        let line = self.line();
        let mut parts = Vec::new();
        let mut formatted = false;
        while let Token::StringLiteral(_) = self.peek() {
            let Token::StringLiteral(lit) = self.advance() else {
                break;
            };
            if lit.formatted {
                formatted = true;
                parts.extend(self.parse_format_string(&lit.value, line)?);
            } else {
                parts.push(FormatPart::Literal(lit.value));
            }
        }

        if !formatted {
            let text: String = parts
                .into_iter()
                .filter_map(|p| match p {
                    FormatPart::Literal(s) => Some(s),
                    FormatPart::Field { .. } => None,
                })
                .collect();
            return Ok(Expr::Str(Rc::from(text)));
        }
        Ok(Expr::FormattedStr(merge_literals(parts)))
    }

    fn parse_format_string(&mut self, text: &str, line: usize) -> ParseResult<Vec<FormatPart>> {
        let fail = |msg: &str| SyntaxError::new(line, format!("f-string: {msg}"));
        let chars: Vec<char> = text.chars().collect();
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '{' if chars.get(i + 1) == Some(&'{') => {
                    literal.push('{');
                    i += 2;
                }
                '}' if chars.get(i + 1) == Some(&'}') => {
                    literal.push('}');
                    i += 2;
                }
                '}' => return Err(fail("single '}' is not allowed")),
                '{' => {
                    if !literal.is_empty() {
                        parts.push(FormatPart::Literal(std::mem::take(&mut literal)));
                    }
                    let start = i + 1;
                    let mut j = start;
                    let mut nesting = 0usize;
                    let mut quote: Option<char> = None;
                    while j < chars.len() {
                        let c = chars[j];
                        if let Some(q) = quote {
                            if c == q {
                                quote = None;
                            }
                        } else {
                            match c {
                                '\'' | '"' => quote = Some(c),
                                '(' | '[' | '{' => nesting += 1,
                                ')' | ']' if nesting > 0 => nesting -= 1,
                                '}' if nesting > 0 => nesting -= 1,
                                '}' | ':' if nesting == 0 => break,
                                '!' if nesting == 0 && chars.get(j + 1) != Some(&'=') => break,
                                _ => {}
                            }
                        }
                        j += 1;
                    }
                    let source: String = chars[start..j].iter().collect();
                    if source.trim().is_empty() {
                        return Err(fail("empty expression not allowed"));
                    }

                    let mut conversion = None;
                    if chars.get(j) == Some(&'!') {
                        match chars.get(j + 1) {
                            Some(c @ ('r' | 's' | 'a')) => conversion = Some(*c),
                            _ => return Err(fail("invalid conversion character")),
                        }
                        j += 2;
                    }
                    let mut spec = None;
                    if chars.get(j) == Some(&':') {
                        let spec_start = j + 1;
                        while j < chars.len() && chars[j] != '}' {
                            j += 1;
                        }
                        spec = Some(chars[spec_start..j].iter().collect());
                    }
                    if chars.get(j) != Some(&'}') {
                        return Err(fail("expecting '}'"));
                    }

                    let expr = self.parse_embedded_expression(&source, line)?;
                    parts.push(FormatPart::Field {
                        expr,
                        conversion,
                        spec,
                    });
                    i = j + 1;
                }
                c => {
                    literal.push(c);
                    i += 1;
                }
            }
        }
        if !literal.is_empty() {
            parts.push(FormatPart::Literal(literal));
        }
        Ok(parts)
    }

    fn parse_embedded_expression(&mut self, source: &str, line: usize) -> ParseResult<Expr> {
        let relocate = |err: SyntaxError| SyntaxError::new(line, format!("f-string: {}", err.message));
        let mut tokens = tokenize_raw(source).map_err(relocate)?;
        tokens.retain(|t| t.token != Token::Newline);
        for token in &mut tokens {
            token.line = line;
        }
        let mut inner = Parser::new(tokens, self.max_nesting.saturating_sub(self.depth));
        let expr = inner.parse_expression().map_err(relocate)?;
        if !inner.is_eof() {
            return Err(relocate(inner.unexpected("'}'")));
        }
        Ok(expr)
    }
}

fn merge_literals(parts: Vec<FormatPart>) -> Vec<FormatPart> {
    let mut merged: Vec<FormatPart> = Vec::with_capacity(parts.len());
    for part in parts {
        match (merged.last_mut(), part) {
            (Some(FormatPart::Literal(prev)), FormatPart::Literal(next)) => prev.push_str(&next),
            (_, part) => merged.push(part),
        }
    }
    merged
}

/// Binary operator and precedence for the current token.
fn binary_op(token: &Token) -> Option<(BinaryOp, u8)> {
    Some(match token {
        Token::Pipe => (BinaryOp::BitOr, 1),
        Token::Caret => (BinaryOp::BitXor, 2),
        Token::Ampersand => (BinaryOp::BitAnd, 3),
        Token::LShift => (BinaryOp::LShift, 4),
        Token::RShift => (BinaryOp::RShift, 4),
        Token::Plus => (BinaryOp::Add, 5),
        Token::Minus => (BinaryOp::Sub, 5),
        Token::Star => (BinaryOp::Mul, 6),
        Token::Slash => (BinaryOp::Div, 6),
        Token::DoubleSlash => (BinaryOp::FloorDiv, 6),
        Token::Percent => (BinaryOp::Mod, 6),
        Token::At => (BinaryOp::MatMul, 6),
        _ => return None,
    })
}

/// Operator of an augmented assignment token such as `+=`.
pub(super) fn augmented_op(token: &Token) -> Option<BinaryOp> {
    Some(match token {
        Token::PlusEq => BinaryOp::Add,
        Token::MinusEq => BinaryOp::Sub,
        Token::StarEq => BinaryOp::Mul,
        Token::SlashEq => BinaryOp::Div,
        Token::DoubleSlashEq => BinaryOp::FloorDiv,
        Token::PercentEq => BinaryOp::Mod,
        Token::PowerEq => BinaryOp::Pow,
        Token::AmpersandEq => BinaryOp::BitAnd,
        Token::PipeEq => BinaryOp::BitOr,
        Token::CaretEq => BinaryOp::BitXor,
        Token::LShiftEq => BinaryOp::LShift,
        Token::RShiftEq => BinaryOp::RShift,
        _ => return None,
    })
}

/// Convert a parsed expression into an assignment target.
pub(super) fn to_target(expr: Expr, line: usize) -> ParseResult<Target> {
    let refuse = |what: &str| SyntaxError::new(line, format!("cannot assign to {what}"));
    match expr {
        Expr::Name(name) => Ok(Target::Name(name)),
        Expr::Subscript { value, index } => Ok(Target::Subscript {
            value: *value,
            index,
        }),
        Expr::Attribute { value, name } => Ok(Target::Attribute {
            value: *value,
            name,
        }),
        Expr::Tuple(items) | Expr::List(items) => Ok(Target::Tuple(
            items
                .into_iter()
                .map(|item| to_target(item, line))
                .collect::<ParseResult<_>>()?,
        )),
        Expr::None | Expr::Bool(_) => Err(refuse("keyword")),
        Expr::Int(_)
        | Expr::WideInt(_)
        | Expr::Float(_)
        | Expr::Str(_)
        | Expr::FormattedStr(_) => {
            Err(refuse("literal"))
        }
        Expr::Call { .. } => Err(refuse("function call")),
        Expr::Dict(_) => Err(refuse("dict literal")),
        Expr::ListComp { .. } => Err(refuse("list comprehension")),
        Expr::Compare { .. } => Err(refuse("comparison")),
        Expr::Conditional { .. } => Err(refuse("conditional expression")),
        _ => Err(refuse("expression")),
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{BinaryOp, CompareOp, Expr, FormatPart, StmtKind, UnaryOp};
    use crate::parser::parse;

    fn expr(source: &str) -> Expr {
        let program = parse(source).unwrap();
        match program.body.into_iter().next().map(|s| s.kind) {
            Some(StmtKind::Expr(e)) => e,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_precedence() {
        let e = expr("1 + 2 * 3");
        let Expr::Binary { op, right, .. } = e else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_power_binds_tighter_than_unary_minus() {
        let e = expr("-2 ** 2");
        assert!(matches!(
            e,
            Expr::Unary { op: UnaryOp::Neg, ref operand } if matches!(**operand, Expr::Binary { op: BinaryOp::Pow, .. })
        ));
    }

    #[test]
    fn test_chained_comparison() {
        let e = expr("0 <= i < n");
        let Expr::Compare { rest, .. } = e else {
            panic!("expected comparison");
        };
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[1].0, CompareOp::Lt);
    }

    #[test]
    fn test_not_in_and_is_not() {
        let Expr::Compare { rest, .. } = expr("a not in b") else {
            panic!("expected comparison");
        };
        assert_eq!(rest[0].0, CompareOp::NotIn);
        let Expr::Compare { rest, .. } = expr("a is not None") else {
            panic!("expected comparison");
        };
        assert_eq!(rest[0].0, CompareOp::IsNot);
    }

    #[test]
    fn test_list_comprehension() {
        let e = expr("[i * 2 for i in range(4) if i % 2 == 0]");
        let Expr::ListComp { clauses, .. } = e else {
            panic!("expected comprehension");
        };
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].conditions.len(), 1);
    }

    #[test]
    fn test_generator_argument() {
        let e = expr("sum(x for x in range(3))");
        let Expr::Call { args, .. } = e else {
            panic!("expected call");
        };
        assert!(matches!(
            &args[0],
            crate::ast::Argument::Positional(Expr::ListComp { .. })
        ));
    }

    #[test]
    fn test_slices() {
        assert!(matches!(
            expr("a[1:]"),
            Expr::Subscript { ref index, .. } if matches!(**index, Expr::Slice { upper: None, .. })
        ));
        assert!(matches!(
            expr("a[::-1]"),
            Expr::Subscript { ref index, .. } if matches!(**index, Expr::Slice { lower: None, step: Some(_), .. })
        ));
    }

    #[test]
    fn test_fstring() {
        let Expr::FormattedStr(parts) = expr("f'q{i}: {theta:.2f} {{x}}'") else {
            panic!("expected f-string");
        };
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], FormatPart::Literal("q".into()));
        assert!(matches!(&parts[3], FormatPart::Field { spec: Some(s), .. } if s == ".2f"));
        assert_eq!(parts[4], FormatPart::Literal(" {x}".into()));
    }

    #[test]
    fn test_fstring_errors() {
        assert!(parse("f'{}'").unwrap_err().message.contains("empty expression"));
        assert!(parse("f'a}'").unwrap_err().message.contains("single '}'"));
        assert!(parse("x = 1\nf'{1 +}'").unwrap_err().line == 2);
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(expr("'ab' 'cd'"), Expr::Str("abcd".into()));
    }

    #[test]
    fn test_refused_expressions() {
        assert!(parse("f = lambda x: x").unwrap_err().message.contains("lambda"));
        assert!(parse("s = {1, 2}").unwrap_err().message.contains("set literals"));
        assert!(parse("f(a=1, 2)").unwrap_err().message.contains("positional argument follows"));
    }
}
