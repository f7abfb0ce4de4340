//! Expression parsing implementation
//!
//! This module handles parsing of C expressions using precedence climbing
//! for binary operators and recursive descent for other expression forms.
//!
//! # Supported Expressions
//!
//! - Literals: integers, floats, characters, strings, `true`/`false`, `NULL`
//! - Identifiers and variables
//! - Binary operators: arithmetic, comparison, logical, bitwise
//! - Unary operators: `-`, `+`, `!`, `~`, `&`, `*`, `++`, `--`
//! - Postfix: `[]`, `.`, `->`, `()`, `++`, `--`
//! - Ternary `? :`, assignment and compound assignment, comma
//! - Type casts: `(type)expr`
//! - `sizeof` operator
//!
//! # Spans
//!
//! Parentheses are not represented in the tree. A node's span starts at the
//! first token of its leftmost operand, so `(a + b) * c` spans the opening
//! parenthesis while the inner `a + b` does not.

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};

/// One rung of the binary-operator precedence ladder, loosest first.
const BINARY_LEVELS: &[&[(TokenKind, BinOp)]] = &[
    &[(TokenKind::OrOr, BinOp::Or)],
    &[(TokenKind::AndAnd, BinOp::And)],
    &[(TokenKind::Pipe, BinOp::BitOr)],
    &[(TokenKind::Caret, BinOp::BitXor)],
    &[(TokenKind::Amp, BinOp::BitAnd)],
    &[(TokenKind::EqEq, BinOp::Eq), (TokenKind::NotEq, BinOp::Ne)],
    &[
        (TokenKind::Lt, BinOp::Lt),
        (TokenKind::Le, BinOp::Le),
        (TokenKind::Gt, BinOp::Gt),
        (TokenKind::Ge, BinOp::Ge),
    ],
    &[(TokenKind::LtLt, BinOp::BitShl), (TokenKind::GtGt, BinOp::BitShr)],
    &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)],
    &[
        (TokenKind::Star, BinOp::Mul),
        (TokenKind::Slash, BinOp::Div),
        (TokenKind::Percent, BinOp::Mod),
    ],
];

const COMPOUND_ASSIGNMENTS: &[(TokenKind, BinOp)] = &[
    (TokenKind::PlusEq, BinOp::AddAssign),
    (TokenKind::MinusEq, BinOp::SubAssign),
    (TokenKind::StarEq, BinOp::MulAssign),
    (TokenKind::SlashEq, BinOp::DivAssign),
    (TokenKind::PercentEq, BinOp::ModAssign),
    (TokenKind::AmpEq, BinOp::AndAssign),
    (TokenKind::PipeEq, BinOp::OrAssign),
    (TokenKind::CaretEq, BinOp::XorAssign),
    (TokenKind::LtLtEq, BinOp::ShlAssign),
    (TokenKind::GtGtEq, BinOp::ShrAssign),
];

impl Parser {
    /// Parse expression (top-level entry point, comma operator included)
    pub(crate) fn parse_expression(&mut self) -> Result<AstNode, ParseError> {
        let start = self.current_span();
        let mut expr = self.parse_assignment_expression()?;

        while self.match_token(&TokenKind::Comma) {
            let right = self.parse_assignment_expression()?;
            expr = AstNode::Comma {
                left: Box::new(expr),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        Ok(expr)
    }

    /// Parse assignment or ternary (right-associative)
    pub(crate) fn parse_assignment_expression(&mut self) -> Result<AstNode, ParseError> {
        let start = self.current_span();
        let lhs = self.parse_ternary_expression()?;

        if self.match_token(&TokenKind::Eq) {
            let rhs = self.parse_assignment_expression()?;
            return Ok(AstNode::Assignment {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span: self.span_from(start),
            });
        }

        let op = COMPOUND_ASSIGNMENTS
            .iter()
            .find(|(kind, _)| self.check(kind))
            .map(|(_, op)| op.clone());

        if let Some(op) = op {
            self.advance();
            let rhs = self.parse_assignment_expression()?;
            return Ok(AstNode::CompoundAssignment {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
                span: self.span_from(start),
            });
        }

        Ok(lhs)
    }

    /// Parse ternary: condition ? true_expr : false_expr
    pub(crate) fn parse_ternary_expression(&mut self) -> Result<AstNode, ParseError> {
        let start = self.current_span();
        let condition = self.parse_binary(0)?;

        if !self.match_token(&TokenKind::Question) {
            return Ok(condition);
        }

        let true_expr = self.parse_expression()?;
        self.expect_token(&TokenKind::Colon, "Expected ':' in ternary expression")?;
        let false_expr = self.parse_ternary_expression()?;

        Ok(AstNode::TernaryOp {
            condition: Box::new(condition),
            true_expr: Box::new(true_expr),
            false_expr: Box::new(false_expr),
            span: self.span_from(start),
        })
    }

    /// Left-associative binary operators at `BINARY_LEVELS[level]` and tighter
    fn parse_binary(&mut self, level: usize) -> Result<AstNode, ParseError> {
        let Some(operators) = BINARY_LEVELS.get(level) else {
            return self.parse_cast();
        };

        let start = self.current_span();
        let mut left = self.parse_binary(level + 1)?;

        loop {
            let Some(op) = operators
                .iter()
                .find(|(kind, _)| self.check(kind))
                .map(|(_, op)| op.clone())
            else {
                break;
            };
            self.advance();

            let right = self.parse_binary(level + 1)?;
            left = AstNode::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        Ok(left)
    }

    /// Parse cast: (Type*)expr
    fn parse_cast(&mut self) -> Result<AstNode, ParseError> {
        let is_cast = self.check(&TokenKind::LParen) && self.peek_ahead(1).is_some_and(|t| t.starts_type());
        if !is_cast {
            return self.parse_unary();
        }

        let start = self.current_span();
        self.advance(); // consume '('
        let target_type = self.parse_type()?;
        self.expect_rparen("after cast type")?;

        // Compound literal `(struct P){...}` is an initializer, not a cast
        let expr = if self.check(&TokenKind::LBrace) {
            self.parse_initializer()?
        } else {
            self.parse_cast()?
        };

        Ok(AstNode::Cast {
            target_type,
            expr: Box::new(expr),
            span: self.span_from(start),
        })
    }

    /// Parse unary (! ~ - + & * ++ -- sizeof)
    fn parse_unary(&mut self) -> Result<AstNode, ParseError> {
        let start = self.current_span();

        let op = match self.peek() {
            TokenKind::Bang => Some(UnOp::Not),
            TokenKind::Tilde => Some(UnOp::BitNot),
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Amp => Some(UnOp::AddrOf),
            TokenKind::Star => Some(UnOp::Deref),
            TokenKind::PlusPlus => Some(UnOp::PreInc),
            TokenKind::MinusMinus => Some(UnOp::PreDec),
            TokenKind::Plus => {
                // Unary plus: just return the operand
                self.advance();
                return self.parse_cast();
            }
            TokenKind::Sizeof => {
                self.advance();
                return self.parse_sizeof(start);
            }
            _ => None,
        };

        let Some(op) = op else {
            return self.parse_postfix();
        };

        self.advance();
        let operand = self.parse_cast()?;
        Ok(AstNode::UnaryOp {
            op,
            operand: Box::new(operand),
            span: self.span_from(start),
        })
    }

    /// Parse the operand of `sizeof`; the keyword has been consumed
    fn parse_sizeof(&mut self, start: Span) -> Result<AstNode, ParseError> {
        if self.check(&TokenKind::LParen) && self.peek_ahead(1).is_some_and(|t| t.starts_type()) {
            self.advance();
            let mut target_type = self.parse_type()?;
            self.parse_array_dims(&mut target_type)?;
            self.expect_rparen("after sizeof type")?;
            return Ok(AstNode::SizeofType {
                target_type,
                span: self.span_from(start),
            });
        }

        let expr = self.parse_unary()?;
        Ok(AstNode::SizeofExpr {
            expr: Box::new(expr),
            span: self.span_from(start),
        })
    }

    /// Parse postfix (++ -- [] . -> ())
    fn parse_postfix(&mut self) -> Result<AstNode, ParseError> {
        let start = self.current_span();
        let mut expr = self.parse_primary()?;

        loop {
            if self.match_token(&TokenKind::PlusPlus) {
                expr = AstNode::UnaryOp {
                    op: UnOp::PostInc,
                    operand: Box::new(expr),
                    span: self.span_from(start),
                };
            } else if self.match_token(&TokenKind::MinusMinus) {
                expr = AstNode::UnaryOp {
                    op: UnOp::PostDec,
                    operand: Box::new(expr),
                    span: self.span_from(start),
                };
            } else if self.match_token(&TokenKind::LBracket) {
                let index = self.parse_expression()?;
                self.expect_token(&TokenKind::RBracket, "Expected ']' after array index")?;
                expr = AstNode::ArrayAccess {
                    array: Box::new(expr),
                    index: Box::new(index),
                    span: self.span_from(start),
                };
            } else if self.match_token(&TokenKind::Dot) {
                let (member, _) = self.expect_identifier()?;
                expr = AstNode::MemberAccess {
                    object: Box::new(expr),
                    member,
                    span: self.span_from(start),
                };
            } else if self.match_token(&TokenKind::Arrow) {
                let (member, _) = self.expect_identifier()?;
                expr = AstNode::PointerMemberAccess {
                    object: Box::new(expr),
                    member,
                    span: self.span_from(start),
                };
            } else if self.check(&TokenKind::LParen) {
                // Only direct calls through a plain identifier
                let AstNode::Variable(name, name_span) = expr else {
                    return Err(self.error("Function call must be on identifier"));
                };
                self.advance();
                let args = self.parse_argument_list()?;
                self.expect_rparen("after function arguments")?;

                expr = AstNode::FunctionCall {
                    name,
                    name_span,
                    args,
                    span: self.span_from(start),
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Parse argument list: (expr, expr, ...)
    fn parse_argument_list(&mut self) -> Result<Vec<AstNode>, ParseError> {
        let mut args = Vec::new();

        if self.check(&TokenKind::RParen) {
            return Ok(args);
        }

        loop {
            args.push(self.parse_assignment_expression()?);

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(args)
    }

    /// Parse primary (literals, variables, parenthesized expressions)
    fn parse_primary(&mut self) -> Result<AstNode, ParseError> {
        let start = self.current_span();

        let node = match self.peek().clone() {
            TokenKind::IntLiteral(n) => AstNode::IntLiteral(n, start),
            TokenKind::FloatLiteral(n) => AstNode::FloatLiteral(n, start),
            TokenKind::CharLiteral(c) => AstNode::CharLiteral(c, start),
            TokenKind::True => AstNode::BoolLiteral(true, start),
            TokenKind::False => AstNode::BoolLiteral(false, start),
            TokenKind::Null => AstNode::Null { span: start },
            TokenKind::Ident(name) => AstNode::Variable(name, start),
            TokenKind::StringLiteral(first) => {
                // Adjacent literals concatenate: "ab" "cd"
                let mut value = first;
                self.advance();
                while let TokenKind::StringLiteral(next) = self.peek().clone() {
                    value.push_str(&next);
                    self.advance();
                }
                return Ok(AstNode::StringLiteral(value, self.span_from(start)));
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_rparen("after expression")?;
                return Ok(expr);
            }
            other => return Err(self.error(format!("Unexpected token: {}", other))),
        };

        self.advance();
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::Parser;

    fn parse_expr(src: &str) -> AstNode {
        let mut parser = Parser::new(src).unwrap();
        parser.parse_expression().unwrap()
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expr("a + b * c == d && e");
        let AstNode::BinaryOp { op: BinOp::And, left, .. } = expr else {
            panic!("Expected && at the root");
        };
        let AstNode::BinaryOp { op: BinOp::Eq, left, .. } = *left else {
            panic!("Expected == under &&");
        };
        assert!(matches!(*left, AstNode::BinaryOp { op: BinOp::Add, .. }));
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let src = "x = y += f(1, 2)";
        let expr = parse_expr(src);
        let AstNode::Assignment { rhs, span, .. } = expr else {
            panic!("Expected assignment");
        };
        assert_eq!(&src[span.start..span.end], src);
        assert!(matches!(*rhs, AstNode::CompoundAssignment { op: BinOp::AddAssign, .. }));
    }

    #[test]
    fn test_cast_and_sizeof() {
        let src = "(unsigned char)sizeof(int) + sizeof x";
        let expr = parse_expr(src);
        let AstNode::BinaryOp { left, right, .. } = expr else {
            panic!("Expected addition");
        };
        assert!(matches!(*left, AstNode::Cast { ref target_type, .. } if target_type.is_unsigned));
        assert!(matches!(*right, AstNode::SizeofExpr { .. }));
    }

    #[test]
    fn test_call_spans() {
        let src = "g(h(1), s.v[2])->next";
        let expr = parse_expr(src);
        let AstNode::PointerMemberAccess { object, .. } = expr else {
            panic!("Expected ->");
        };
        let AstNode::FunctionCall { name, name_span, args, span } = *object else {
            panic!("Expected call");
        };
        assert_eq!(name, "g");
        assert_eq!(&src[name_span.start..name_span.end], "g");
        assert_eq!(&src[span.start..span.end], "g(h(1), s.v[2])");
        assert_eq!(&src[args[1].span().start..args[1].span().end], "s.v[2]");
    }
}
