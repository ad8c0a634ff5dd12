//! Statement parsing.

use std::rc::Rc;

use super::Parser;
use super::expression::{augmented_op, to_target};
use crate::ast::{FunctionDef, Param, Stmt, StmtKind, Target};
use crate::error::ParseResult;
use crate::lexer::Token;

impl Parser {
    /// Parse one statement line (compound, or `;`-separated simple ones).
    pub(super) fn parse_statement(&mut self, out: &mut Vec<Stmt>) -> ParseResult<()> {
        let line = self.line();
        let kind = match self.peek() {
            Token::Indent => return Err(self.error("unexpected indent")),
            Token::If => self.parse_if()?,
            Token::While => self.parse_while()?,
            Token::For => self.parse_for()?,
            Token::Def => self.parse_def()?,
            Token::Class => return Err(self.error("class definitions are not supported")),
            Token::Try => return Err(self.error("'try' statements are not supported")),
            Token::With => return Err(self.error("'with' statements are not supported")),
            Token::Async => return Err(self.error("async code is not supported")),
            Token::At => return Err(self.error("decorators are not supported")),
            Token::Global | Token::Nonlocal => {
                return Err(self.error(format!(
                    "'{}' declarations are not supported",
                    self.peek()
                )));
            }
            Token::Del => return Err(self.error("'del' statements are not supported")),
            Token::Raise => return Err(self.error("'raise' statements are not supported")),
            Token::Else | Token::Elif => return Err(self.unexpected("statement")),
            _ => return self.parse_simple_statements(out),
        };
        out.push(Stmt { line, kind });
        Ok(())
    }

    /// `simple (';' simple)* [';'] NEWLINE`
    fn parse_simple_statements(&mut self, out: &mut Vec<Stmt>) -> ParseResult<()> {
        loop {
            let line = self.line();
            let kind = self.parse_simple_statement()?;
            out.push(Stmt { line, kind });
            if !self.consume(&Token::Semicolon) {
                break;
            }
            if matches!(self.peek(), Token::Newline | Token::EndOfFile) {
                break;
            }
        }
        if self.consume(&Token::Newline) || self.is_eof() {
            Ok(())
        } else {
            Err(self.unexpected("end of line"))
        }
    }

    fn parse_simple_statement(&mut self) -> ParseResult<StmtKind> {
        match self.peek() {
            Token::Pass => {
                self.advance();
                Ok(StmtKind::Pass)
            }
            Token::Break => {
                if self.loop_depth == 0 {
                    return Err(self.error("'break' outside loop"));
                }
                self.advance();
                Ok(StmtKind::Break)
            }
            Token::Continue => {
                if self.loop_depth == 0 {
                    return Err(self.error("'continue' not properly in loop"));
                }
                self.advance();
                Ok(StmtKind::Continue)
            }
            Token::Return => {
                if self.function_depth == 0 {
                    return Err(self.error("'return' outside function"));
                }
                self.advance();
                if matches!(
                    self.peek(),
                    Token::Newline | Token::Semicolon | Token::EndOfFile
                ) {
                    Ok(StmtKind::Return(None))
                } else {
                    Ok(StmtKind::Return(Some(self.parse_expression_list()?)))
                }
            }
            Token::Assert => {
                self.advance();
                let test = self.parse_expression()?;
                let message = if self.consume(&Token::Comma) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                Ok(StmtKind::Assert { test, message })
            }
            Token::Import => self.parse_import(),
            Token::From => self.parse_from_import(),
            Token::Yield => Err(self.error("'yield' is not supported")),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_expression_statement(&mut self) -> ParseResult<StmtKind> {
        let line = self.line();
        let first = self.parse_expression_list()?;

        if let Some(op) = augmented_op(self.peek()) {
            self.advance();
            let target = match to_target(first, line)? {
                Target::Tuple(_) => {
                    return Err(self.error(
                        "'tuple' is an illegal expression for augmented assignment",
                    ));
                }
                target => target,
            };
            let value = self.parse_expression_list()?;
            return Ok(StmtKind::AugAssign { target, op, value });
        }

        if !self.check(&Token::Eq) {
            if self.check(&Token::Walrus) {
                return Err(self.error("assignment expressions are not supported"));
            }
            return Ok(StmtKind::Expr(first));
        }

        let mut targets = vec![to_target(first, line)?];
        let mut value;
        loop {
            self.expect(&Token::Eq)?;
            value = self.parse_expression_list()?;
            if !self.check(&Token::Eq) {
                break;
            }
            targets.push(to_target(value, line)?);
        }
        Ok(StmtKind::Assign { targets, value })
    }

    fn parse_dotted_name(&mut self) -> ParseResult<String> {
        if self.check(&Token::Dot) {
            return Err(self.error("relative imports are not supported"));
        }
        let mut name = self.parse_identifier()?;
        while self.consume(&Token::Dot) {
            name.push('.');
            name.push_str(&self.parse_identifier()?);
        }
        Ok(name)
    }

    fn parse_alias(&mut self) -> ParseResult<Option<String>> {
        if self.consume(&Token::As) {
            Ok(Some(self.parse_identifier()?))
        } else {
            Ok(None)
        }
    }

    /// `import a.b [as c]`, one module per statement.
    fn parse_import(&mut self) -> ParseResult<StmtKind> {
        self.expect(&Token::Import)?;
        let module = self.parse_dotted_name()?;
        let alias = self.parse_alias()?;
        if self.check(&Token::Comma) {
            return Err(self.error("import one module per statement"));
        }
        Ok(StmtKind::Import { module, alias })
    }

    fn parse_from_import(&mut self) -> ParseResult<StmtKind> {
        self.expect(&Token::From)?;
        let module = self.parse_dotted_name()?;
        self.expect(&Token::Import)?;

        if self.consume(&Token::Star) {
            return Ok(StmtKind::ImportFrom {
                module,
                names: None,
            });
        }

        let parenthesized = self.consume(&Token::LParen);
        let mut names = Vec::new();
        loop {
            let name = self.parse_identifier()?;
            let alias = self.parse_alias()?;
            names.push((name, alias));
            if !self.consume(&Token::Comma) {
                break;
            }
            if parenthesized && self.check(&Token::RParen) {
                break;
            }
        }
        if parenthesized {
            self.expect(&Token::RParen)?;
        }
        Ok(StmtKind::ImportFrom {
            module,
            names: Some(names),
        })
    }

    /// Parse a block after `:`, either indented or on the same line.
    fn parse_block(&mut self, header: &str, header_line: usize) -> ParseResult<Vec<Stmt>> {
        self.expect(&Token::Colon)?;
        self.enter_with("too many nested blocks")?;
        let mut body = Vec::new();
        if self.consume(&Token::Newline) {
            if !self.consume(&Token::Indent) {
                return Err(self.error(format!(
                    "expected an indented block after {header} on line {header_line}"
                )));
            }
            while !self.consume(&Token::Dedent) {
                if self.is_eof() {
                    break;
                }
                self.parse_statement(&mut body)?;
            }
        } else {
            self.parse_simple_statements(&mut body)?;
        }
        self.leave();
        Ok(body)
    }

    fn parse_if(&mut self) -> ParseResult<StmtKind> {
        let line = self.line();
        self.advance();
        let test = self.parse_expression()?;
        let body = self.parse_block("'if' statement", line)?;
        let orelse = self.parse_else_chain()?;
        Ok(StmtKind::If { test, body, orelse })
    }

    fn parse_else_chain(&mut self) -> ParseResult<Vec<Stmt>> {
        let line = self.line();
        match self.peek() {
            Token::Elif => {
                self.advance();
                let test = self.parse_expression()?;
                let body = self.parse_block("'elif' statement", line)?;
                self.enter_with("too many nested blocks")?;
                let orelse = self.parse_else_chain()?;
                self.leave();
                Ok(vec![Stmt {
                    line,
                    kind: StmtKind::If { test, body, orelse },
                }])
            }
            Token::Else => {
                self.advance();
                self.parse_block("'else' statement", line)
            }
            _ => Ok(Vec::new()),
        }
    }

    fn parse_loop_body(&mut self, header: &str, line: usize) -> ParseResult<Vec<Stmt>> {
        self.loop_depth += 1;
        let body = self.parse_block(header, line);
        self.loop_depth -= 1;
        let body = body?;
        if self.check(&Token::Else) {
            return Err(self.error("'else' clauses on loops are not supported"));
        }
        Ok(body)
    }

    fn parse_while(&mut self) -> ParseResult<StmtKind> {
        let line = self.line();
        self.advance();
        let test = self.parse_expression()?;
        let body = self.parse_loop_body("'while' statement", line)?;
        Ok(StmtKind::While { test, body })
    }

    fn parse_for(&mut self) -> ParseResult<StmtKind> {
        let line = self.line();
        self.advance();
        let target = self.parse_target_list()?;
        self.expect(&Token::In)?;
        let iter = self.parse_expression_list()?;
        let body = self.parse_loop_body("'for' statement", line)?;
        Ok(StmtKind::For { target, iter, body })
    }

    fn parse_def(&mut self) -> ParseResult<StmtKind> {
        let line = self.line();
        self.advance();
        let name = self.parse_identifier()?;
        self.expect(&Token::LParen)?;

        let mut params: Vec<Param> = Vec::new();
        while !self.check(&Token::RParen) {
            if matches!(self.peek(), Token::Star | Token::Power | Token::Slash) {
                return Err(self.error("only positional parameters with defaults are supported"));
            }
            let param = self.parse_identifier()?;
            if params.iter().any(|p| p.name == param) {
                return Err(self.error(format!(
                    "duplicate argument '{param}' in function definition"
                )));
            }
            if self.consume(&Token::Colon) {
                self.parse_expression()?;
            }
            let default = if self.consume(&Token::Eq) {
                Some(self.parse_expression()?)
            } else {
                if params.iter().any(|p| p.default.is_some()) {
                    return Err(self.error("non-default argument follows default argument"));
                }
                None
            };
            params.push(Param {
                name: param,
                default,
            });
            if !self.consume(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        if self.consume(&Token::Arrow) {
            self.parse_expression()?;
        }

        let saved_loops = std::mem::take(&mut self.loop_depth);
        self.function_depth += 1;
        let body = self.parse_block("function definition", line);
        self.function_depth -= 1;
        self.loop_depth = saved_loops;

        Ok(StmtKind::FunctionDef(Rc::new(FunctionDef {
            name,
            params,
            body: body?,
        })))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{StmtKind, Target};
    use crate::parser::parse;

    #[test]
    fn test_if_elif_else() {
        let program = parse("if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n").unwrap();
        assert_eq!(program.body.len(), 1);
        let StmtKind::If { orelse, .. } = &program.body[0].kind else {
            panic!("expected if");
        };
        assert!(matches!(orelse[0].kind, StmtKind::If { .. }));
    }

    #[test]
    fn test_one_line_block() {
        let program = parse("for i in range(3): qc.h(i)\n").unwrap();
        assert!(matches!(&program.body[0].kind, StmtKind::For { body, .. } if body.len() == 1));
    }

    #[test]
    fn test_tuple_unpacking_and_chained_assignment() {
        let program = parse("a, b = 1, 2\nx = y = 0\n").unwrap();
        assert!(matches!(
            &program.body[0].kind,
            StmtKind::Assign { targets, .. } if matches!(targets[0], Target::Tuple(ref t) if t.len() == 2)
        ));
        assert!(matches!(&program.body[1].kind, StmtKind::Assign { targets, .. } if targets.len() == 2));
    }

    #[test]
    fn test_augmented_assignment() {
        let program = parse("theta += 0.5\n").unwrap();
        assert!(matches!(program.body[0].kind, StmtKind::AugAssign { .. }));
        assert!(parse("a, b += 1\n").is_err());
    }

    #[test]
    fn test_def_with_defaults() {
        let program = parse("def build(n, name='ghz'):\n    return n\n").unwrap();
        let StmtKind::FunctionDef(def) = &program.body[0].kind else {
            panic!("expected def");
        };
        assert_eq!(def.params.len(), 2);
        assert!(def.params[1].default.is_some());
        assert!(parse("def f(a=1, b):\n    pass\n").is_err());
    }

    #[test]
    fn test_imports() {
        let program = parse(
            "import math\nimport qiskit.circuit.library as lib\nfrom qiskit import (QuantumCircuit,)\nfrom math import *\n",
        )
        .unwrap();
        assert!(matches!(&program.body[1].kind, StmtKind::Import { module, alias: Some(a) } if module == "qiskit.circuit.library" && a == "lib"));
        assert!(matches!(&program.body[3].kind, StmtKind::ImportFrom { names: None, .. }));
    }

    #[test]
    fn test_refused_statements() {
        for source in [
            "class A:\n    pass\n",
            "try:\n    pass\nexcept:\n    pass\n",
            "with open('x') as f:\n    pass\n",
            "global x\n",
            "del x\n",
            "raise ValueError()\n",
            "@dec\ndef f():\n    pass\n",
        ] {
            assert!(parse(source).is_err(), "{source}");
        }
    }

    #[test]
    fn test_control_flow_placement() {
        assert_eq!(parse("break\n").unwrap_err().message, "'break' outside loop");
        assert_eq!(parse("return 1\n").unwrap_err().message, "'return' outside function");
        assert!(parse("for i in x:\n    def f():\n        break\n").is_err());
        assert!(parse("def f():\n    for i in x:\n        return i\n").is_ok());
    }

    #[test]
    fn test_missing_indent_reports_header_line() {
        let err = parse("for i in x:\nqc.h(i)\n").unwrap_err();
        assert!(err.message.contains("after 'for' statement on line 1"));
    }

    #[test]
    fn test_unexpected_indent() {
        let err = parse("a = 1\n    b = 2\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.message, "unexpected indent");
    }
}
