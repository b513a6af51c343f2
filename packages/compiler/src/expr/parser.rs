//! Recursive-descent / precedence-climbing parser over [`super::lexer`].
//!
//! Parse failures never propagate as `Result::Err`: the grammar recovers
//! with an `Expr::UnknownStatement` carrying a `reason_kind`, so later
//! stages still see an `ExprTableEntry` (§4.2 "Errors").

use crate::expr::ast::{BinaryOp, Expr, NamedArgs, ObjectProperty, Primitive, UnaryOp};
use crate::expr::lexer::{Lexer, Token, TokenKind};
use crate::span::TextSpan;

pub struct ParseOutcome {
    pub ast: Expr,
    pub recovered: bool,
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    recovered: bool,
}

/// Parse `src` as a standalone binding expression (no surrounding
/// `${...}`). Always returns a usable AST.
pub fn parse(src: &str) -> ParseOutcome {
    let mut lexer = Lexer::new(src);
    let mut tokens = Vec::new();
    loop {
        let tok = lexer.next_token();
        let is_eof = matches!(tok.kind, TokenKind::Eof);
        tokens.push(tok);
        if is_eof {
            break;
        }
    }
    let mut parser = Parser { src, tokens, pos: 0, recovered: false };
    let ast = parser.parse_pipe_chain();
    if !parser.at_eof() {
        parser.recovered = true;
    }
    ParseOutcome { ast, recovered: parser.recovered }
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Punct(q) if *q == p)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) {
        if !self.eat_punct(p) {
            self.recovered = true;
        }
    }

    fn ident_name(&self) -> Option<String> {
        match &self.peek().kind {
            TokenKind::Ident(name) => Some(name.clone()),
            _ => None,
        }
    }

    fn unknown(&mut self, reason: &str, start: u32) -> Expr {
        self.recovered = true;
        let end = self.peek().start.max(start);
        Expr::UnknownStatement { reason_kind: reason.to_string(), span: TextSpan::new(start, end) }
    }

    fn parse_pipe_chain(&mut self) -> Expr {
        let start = self.peek().start;
        let mut expr = self.parse_assign();
        while self.is_punct("|") {
            self.advance();
            let Some(name) = self.ident_name() else {
                return self.unknown("missing-converter-name", start);
            };
            self.advance();
            let args = self.parse_pipe_args();
            let end = self.tokens[self.pos.saturating_sub(1)].end;
            expr = Expr::ValueConverter {
                expr: Box::new(expr),
                converter: NamedArgs { name, args },
                span: TextSpan::new(start, end),
            };
        }
        while self.is_punct("&") {
            self.advance();
            let Some(name) = self.ident_name() else {
                return self.unknown("missing-behavior-name", start);
            };
            self.advance();
            let args = self.parse_pipe_args();
            let end = self.tokens[self.pos.saturating_sub(1)].end;
            expr = Expr::BindingBehavior {
                expr: Box::new(expr),
                behavior: NamedArgs { name, args },
                span: TextSpan::new(start, end),
            };
        }
        expr
    }

    fn parse_pipe_args(&mut self) -> Vec<Expr> {
        let mut args = Vec::new();
        while self.eat_punct(":") {
            args.push(self.parse_assign());
        }
        args
    }

    fn parse_assign(&mut self) -> Expr {
        let start = self.peek().start;
        let left = self.parse_conditional();
        if self.is_punct("=") {
            self.advance();
            let value = self.parse_assign();
            let end = value.span().end;
            if !left.is_assignable() {
                self.recovered = true;
            }
            return Expr::Assign { target: Box::new(left), value: Box::new(value), span: TextSpan::new(start, end) };
        }
        left
    }

    fn parse_conditional(&mut self) -> Expr {
        let start = self.peek().start;
        let test = self.parse_binary(0);
        if self.eat_punct("?") {
            let consequent = self.parse_assign();
            self.expect_punct(":");
            let alternate = self.parse_assign();
            let end = alternate.span().end;
            return Expr::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
                span: TextSpan::new(start, end),
            };
        }
        test
    }

    fn binary_op(&self) -> Option<(BinaryOp, u8)> {
        let (op, prec) = match &self.peek().kind {
            TokenKind::Punct("||") => (BinaryOp::Or, 1),
            TokenKind::Punct("&&") => (BinaryOp::And, 2),
            TokenKind::Ident(name) if name == "instanceof" => (BinaryOp::Instanceof, 3),
            TokenKind::Ident(name) if name == "in" => (BinaryOp::In, 3),
            TokenKind::Punct("==") => (BinaryOp::Eq, 3),
            TokenKind::Punct("!=") => (BinaryOp::Neq, 3),
            TokenKind::Punct("===") => (BinaryOp::StrictEq, 3),
            TokenKind::Punct("!==") => (BinaryOp::StrictNeq, 3),
            TokenKind::Punct("<") => (BinaryOp::Lt, 4),
            TokenKind::Punct(">") => (BinaryOp::Gt, 4),
            TokenKind::Punct("<=") => (BinaryOp::Le, 4),
            TokenKind::Punct(">=") => (BinaryOp::Ge, 4),
            TokenKind::Punct("+") => (BinaryOp::Add, 5),
            TokenKind::Punct("-") => (BinaryOp::Sub, 5),
            TokenKind::Punct("*") => (BinaryOp::Mul, 6),
            TokenKind::Punct("/") => (BinaryOp::Div, 6),
            TokenKind::Punct("%") => (BinaryOp::Mod, 6),
            _ => return None,
        };
        Some((op, prec))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Expr {
        let start = self.peek().start;
        let mut left = self.parse_unary();
        loop {
            let Some((op, prec)) = self.binary_op() else { break };
            if prec < min_prec {
                break;
            }
            self.advance();
            let right = self.parse_binary(prec + 1);
            let end = right.span().end;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span: TextSpan::new(start, end) };
        }
        left
    }

    fn parse_unary(&mut self) -> Expr {
        let start = self.peek().start;
        let op = match &self.peek().kind {
            TokenKind::Punct("!") => Some(UnaryOp::Not),
            TokenKind::Punct("-") => Some(UnaryOp::Neg),
            TokenKind::Punct("+") => Some(UnaryOp::Plus),
            TokenKind::Ident(name) if name == "typeof" => Some(UnaryOp::TypeOf),
            TokenKind::Ident(name) if name == "void" => Some(UnaryOp::Void),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary();
            let end = operand.span().end;
            return Expr::Unary { op, operand: Box::new(operand), span: TextSpan::new(start, end) };
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Expr {
        let start = self.peek().start;
        let mut expr = self.parse_primary();
        loop {
            if self.eat_punct(".") {
                let Some(name) = self.ident_name() else {
                    return self.unknown("missing-member-name", start);
                };
                self.advance();
                if self.is_punct("(") {
                    let args = self.parse_args();
                    let end = self.tokens[self.pos.saturating_sub(1)].end;
                    expr = Expr::CallMember { object: Box::new(expr), name, args, optional: false, span: TextSpan::new(start, end) };
                } else {
                    let end = self.tokens[self.pos.saturating_sub(1)].end;
                    expr = Expr::AccessMember { object: Box::new(expr), name, optional: false, span: TextSpan::new(start, end) };
                }
            } else if self.eat_punct("?.") {
                if self.is_punct("[") {
                    self.advance();
                    let key = self.parse_assign();
                    self.expect_punct("]");
                    let end = self.tokens[self.pos.saturating_sub(1)].end;
                    expr = Expr::AccessKeyed { object: Box::new(expr), key: Box::new(key), optional: true, span: TextSpan::new(start, end) };
                    continue;
                }
                let Some(name) = self.ident_name() else {
                    return self.unknown("missing-member-name", start);
                };
                self.advance();
                if self.is_punct("(") {
                    let args = self.parse_args();
                    let end = self.tokens[self.pos.saturating_sub(1)].end;
                    expr = Expr::CallMember { object: Box::new(expr), name, args, optional: true, span: TextSpan::new(start, end) };
                } else {
                    let end = self.tokens[self.pos.saturating_sub(1)].end;
                    expr = Expr::AccessMember { object: Box::new(expr), name, optional: true, span: TextSpan::new(start, end) };
                }
            } else if self.eat_punct("[") {
                let key = self.parse_assign();
                self.expect_punct("]");
                let end = self.tokens[self.pos.saturating_sub(1)].end;
                expr = Expr::AccessKeyed { object: Box::new(expr), key: Box::new(key), optional: false, span: TextSpan::new(start, end) };
            } else if self.is_punct("(") {
                let args = self.parse_args();
                let end = self.tokens[self.pos.saturating_sub(1)].end;
                expr = Expr::CallFunction { callee: Box::new(expr), args, span: TextSpan::new(start, end) };
            } else {
                break;
            }
        }
        expr
    }

    fn parse_args(&mut self) -> Vec<Expr> {
        self.expect_punct("(");
        let mut args = Vec::new();
        if !self.is_punct(")") {
            loop {
                args.push(self.parse_assign());
                if !self.eat_punct(",") {
                    break;
                }
            }
        }
        self.expect_punct(")");
        args
    }

    /// Count a leading `$parent`/`$this` ancestor chain, returning the hop
    /// count and whether the chain started with `$this` (vs. an implicit
    /// member access root).
    fn parse_ancestor_prefix(&mut self) -> Option<u32> {
        let mut ancestors = 0u32;
        let mut saw_any = false;
        loop {
            match self.ident_name().as_deref() {
                Some("$parent") => {
                    ancestors += 1;
                    saw_any = true;
                    self.advance();
                    if !self.eat_punct(".") {
                        break;
                    }
                }
                Some("$this") if !saw_any => {
                    saw_any = true;
                    self.advance();
                    if !self.eat_punct(".") {
                        break;
                    }
                }
                _ => break,
            }
        }
        if saw_any {
            Some(ancestors)
        } else {
            None
        }
    }

    fn parse_primary(&mut self) -> Expr {
        let start = self.peek().start;

        if let Some(ancestors) = self.parse_ancestor_prefix() {
            if let Some(name) = self.ident_name() {
                self.advance();
                if self.is_punct("(") {
                    let args = self.parse_args();
                    let end = self.tokens[self.pos.saturating_sub(1)].end;
                    return Expr::CallScope { name, ancestors, args, span: TextSpan::new(start, end) };
                }
                let end = self.tokens[self.pos.saturating_sub(1)].end;
                return Expr::AccessScope { name, ancestors, span: TextSpan::new(start, end) };
            }
            let end = self.tokens[self.pos.saturating_sub(1).max(0)].end;
            return Expr::AccessThis { ancestors, span: TextSpan::new(start, end) };
        }

        match self.peek().kind.clone() {
            TokenKind::Number(value) => {
                let end = self.peek().end;
                self.advance();
                Expr::PrimitiveLiteral { value: Primitive::Number(value), span: TextSpan::new(start, end) }
            }
            TokenKind::String(value) => {
                let end = self.peek().end;
                self.advance();
                Expr::PrimitiveLiteral { value: Primitive::String(value), span: TextSpan::new(start, end) }
            }
            TokenKind::Ident(name) => {
                let end = self.peek().end;
                self.advance();
                match name.as_str() {
                    "true" => Expr::PrimitiveLiteral { value: Primitive::Bool(true), span: TextSpan::new(start, end) },
                    "false" => Expr::PrimitiveLiteral { value: Primitive::Bool(false), span: TextSpan::new(start, end) },
                    "null" => Expr::PrimitiveLiteral { value: Primitive::Null, span: TextSpan::new(start, end) },
                    "undefined" => Expr::PrimitiveLiteral { value: Primitive::Undefined, span: TextSpan::new(start, end) },
                    _ => {
                        if self.is_punct("(") {
                            let args = self.parse_args();
                            let call_end = self.tokens[self.pos.saturating_sub(1)].end;
                            Expr::CallScope { name, ancestors: 0, args, span: TextSpan::new(start, call_end) }
                        } else {
                            Expr::AccessScope { name, ancestors: 0, span: TextSpan::new(start, end) }
                        }
                    }
                }
            }
            TokenKind::Punct("(") => {
                self.advance();
                let inner = self.parse_assign();
                self.expect_punct(")");
                inner
            }
            TokenKind::Punct("[") => {
                self.advance();
                let mut elements = Vec::new();
                if !self.is_punct("]") {
                    loop {
                        elements.push(self.parse_assign());
                        if !self.eat_punct(",") {
                            break;
                        }
                    }
                }
                self.expect_punct("]");
                let end = self.tokens[self.pos.saturating_sub(1)].end;
                Expr::ArrayLiteral { elements, span: TextSpan::new(start, end) }
            }
            TokenKind::Punct("{") => {
                self.advance();
                let mut properties = Vec::new();
                if !self.is_punct("}") {
                    loop {
                        let (key, computed) = if self.eat_punct("[") {
                            let key_expr = self.parse_assign();
                            self.expect_punct("]");
                            (format!("{:?}", key_expr.span()), true)
                        } else {
                            match self.peek().kind.clone() {
                                TokenKind::Ident(n) => {
                                    self.advance();
                                    (n, false)
                                }
                                TokenKind::String(s) => {
                                    self.advance();
                                    (s, false)
                                }
                                _ => {
                                    self.recovered = true;
                                    (String::new(), false)
                                }
                            }
                        };
                        self.expect_punct(":");
                        let value = self.parse_assign();
                        properties.push(ObjectProperty { key, value, computed });
                        if !self.eat_punct(",") {
                            break;
                        }
                    }
                }
                self.expect_punct("}");
                let end = self.tokens[self.pos.saturating_sub(1)].end;
                Expr::ObjectLiteral { properties, span: TextSpan::new(start, end) }
            }
            _ => self.unknown("unparseable-primary", start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_property_read() {
        let out = parse("name");
        assert!(!out.recovered);
        match out.ast {
            Expr::AccessScope { name, ancestors, .. } => {
                assert_eq!(name, "name");
                assert_eq!(ancestors, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_member_chain() {
        let out = parse("item.name");
        assert!(!out.recovered);
        match out.ast {
            Expr::AccessMember { name, .. } => assert_eq!(name, "name"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_parent_hop() {
        let out = parse("$parent.foo");
        match out.ast {
            Expr::AccessScope { name, ancestors, .. } => {
                assert_eq!(name, "foo");
                assert_eq!(ancestors, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_value_converter_chain() {
        let out = parse("name | upper:'x'");
        match out.ast {
            Expr::ValueConverter { converter, .. } => {
                assert_eq!(converter.name, "upper");
                assert_eq!(converter.args.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn recovers_on_garbage() {
        let out = parse("@@@");
        assert!(out.recovered);
        assert!(out.ast.is_recovery());
    }

    #[test]
    fn parses_call_scope() {
        let out = parse("doThing(1, 2)");
        match out.ast {
            Expr::CallScope { name, args, .. } => {
                assert_eq!(name, "doThing");
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
