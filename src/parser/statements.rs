//! Statement parsing implementation
//!
//! This module handles parsing of all C statement types:
//!
//! - Variable declarations: `int x = 42;`, `static int calls;`
//! - Control flow: `if`, `while`, `for`, `do-while`, `switch`
//! - Jump statements: `return`, `break`, `continue`, `goto`
//! - Compound statements: `{ ... }`
//! - Expression statements: function calls, assignments
//!
//! # Grammar
//!
//! ```text
//! statement ::= var_decl | if_stmt | while_stmt | for_stmt
//!             | do_while_stmt | switch_stmt | return_stmt
//!             | break_stmt | continue_stmt | goto_stmt | label
//!             | block | expr_stmt | ";"
//! ```
//!
//! Branch and loop bodies are kept as a single child node (a [`AstNode::Block`]
//! when braced), so each statement maps onto one contiguous source range.

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};

impl Parser {
    /// Parse `{ statements }`, braces included in the span
    pub(crate) fn parse_block(&mut self) -> Result<AstNode, ParseError> {
        let start = self.expect_token(&TokenKind::LBrace, "Expected '{'")?;

        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }
        self.expect_rbrace("after block")?;

        Ok(AstNode::Block {
            statements,
            span: self.span_from(start),
        })
    }

    /// Parse a statement
    pub(crate) fn parse_statement(&mut self) -> Result<AstNode, ParseError> {
        let start = self.current_span();

        match self.peek() {
            TokenKind::LBrace => self.parse_block(),
            TokenKind::Return => {
                self.advance();
                self.parse_return_statement(start)
            }
            TokenKind::If => {
                self.advance();
                self.parse_if_statement(start)
            }
            TokenKind::While => {
                self.advance();
                self.parse_while_statement(start)
            }
            TokenKind::Do => {
                self.advance();
                self.parse_do_while_statement(start)
            }
            TokenKind::For => {
                self.advance();
                self.parse_for_statement(start)
            }
            TokenKind::Switch => {
                self.advance();
                self.parse_switch_statement(start)
            }
            TokenKind::Break => {
                self.advance();
                self.expect_semicolon("after 'break'")?;
                Ok(AstNode::Break {
                    span: self.span_from(start),
                })
            }
            TokenKind::Continue => {
                self.advance();
                self.expect_semicolon("after 'continue'")?;
                Ok(AstNode::Continue {
                    span: self.span_from(start),
                })
            }
            TokenKind::Goto => {
                self.advance();
                let (label, _) = self.expect_identifier()?;
                self.expect_semicolon("after 'goto'")?;
                Ok(AstNode::Goto {
                    label,
                    span: self.span_from(start),
                })
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(AstNode::Empty {
                    span: self.span_from(start),
                })
            }
            TokenKind::Ident(_) if self.check_ahead(1, &TokenKind::Colon) => {
                let (name, _) = self.expect_identifier()?;
                self.advance(); // consume ':'
                Ok(AstNode::Label {
                    name,
                    span: self.span_from(start),
                })
            }
            _ if self.is_declaration_start() => self.parse_variable_declaration(),
            _ => {
                let expr = self.parse_expression()?;
                self.expect_semicolon("after expression")?;
                Ok(AstNode::ExpressionStatement {
                    expr: Box::new(expr),
                    span: self.span_from(start),
                })
            }
        }
    }

    /// Parse return statement; `return` has been consumed
    fn parse_return_statement(&mut self, start: Span) -> Result<AstNode, ParseError> {
        let expr = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };

        self.expect_semicolon("after return")?;

        Ok(AstNode::Return {
            expr,
            span: self.span_from(start),
        })
    }

    /// Parenthesized controlling expression of `if`/`while`/`switch`
    fn parse_condition(&mut self, keyword: &str) -> Result<Box<AstNode>, ParseError> {
        self.expect_lparen(&format!("after '{}'", keyword))?;
        let condition = self.parse_expression()?;
        self.expect_rparen(&format!("after {} condition", keyword))?;
        Ok(Box::new(condition))
    }

    fn parse_if_statement(&mut self, start: Span) -> Result<AstNode, ParseError> {
        let condition = self.parse_condition("if")?;
        let then_branch = Box::new(self.parse_statement()?);

        let else_branch = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(AstNode::If {
            condition,
            then_branch,
            else_branch,
            span: self.span_from(start),
        })
    }

    fn parse_while_statement(&mut self, start: Span) -> Result<AstNode, ParseError> {
        let condition = self.parse_condition("while")?;
        let body = Box::new(self.parse_statement()?);

        Ok(AstNode::While {
            condition,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_do_while_statement(&mut self, start: Span) -> Result<AstNode, ParseError> {
        let body = Box::new(self.parse_statement()?);

        self.expect_token(&TokenKind::While, "Expected 'while' after do body")?;
        let condition = self.parse_condition("do-while")?;
        self.expect_semicolon("after do-while")?;

        Ok(AstNode::DoWhile {
            body,
            condition,
            span: self.span_from(start),
        })
    }

    fn parse_for_statement(&mut self, start: Span) -> Result<AstNode, ParseError> {
        self.expect_lparen("after 'for'")?;

        // Init (optional); a declaration consumes its own semicolon
        let init = if self.match_token(&TokenKind::Semicolon) {
            None
        } else if self.is_declaration_start() {
            Some(Box::new(self.parse_variable_declaration()?))
        } else {
            let expr = self.parse_expression()?;
            self.expect_semicolon("after for init")?;
            Some(Box::new(expr))
        };

        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect_semicolon("after for condition")?;

        let increment = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect_rparen("after for clauses")?;

        let body = Box::new(self.parse_statement()?);

        Ok(AstNode::For {
            init,
            condition,
            increment,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_switch_statement(&mut self, start: Span) -> Result<AstNode, ParseError> {
        let expr = self.parse_condition("switch")?;
        self.expect_token(&TokenKind::LBrace, "Expected '{' before switch body")?;

        let mut cases = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let case_start = self.current_span();
            if self.match_token(&TokenKind::Case) {
                let value = self.parse_ternary_expression()?;
                self.expect_token(&TokenKind::Colon, "Expected ':' after case value")?;
                let statements = self.parse_case_body()?;

                cases.push(CaseNode::Case {
                    value: Box::new(value),
                    statements,
                    span: self.span_from(case_start),
                });
            } else if self.match_token(&TokenKind::Default) {
                self.expect_token(&TokenKind::Colon, "Expected ':' after 'default'")?;
                let statements = self.parse_case_body()?;

                cases.push(CaseNode::Default {
                    statements,
                    span: self.span_from(case_start),
                });
            } else {
                return Err(self.error("Expected 'case' or 'default' in switch body"));
            }
        }

        self.expect_rbrace("after switch body")?;

        Ok(AstNode::Switch {
            expr,
            cases,
            span: self.span_from(start),
        })
    }

    fn parse_case_body(&mut self) -> Result<Vec<AstNode>, ParseError> {
        let mut statements = Vec::new();
        while !self.check(&TokenKind::Case)
            && !self.check(&TokenKind::Default)
            && !self.check(&TokenKind::RBrace)
            && !self.is_at_end()
        {
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    /// Parse a local declaration including its semicolon. One declarator
    /// yields a [`AstNode::VarDecl`]; several yield a [`AstNode::DeclGroup`].
    pub(crate) fn parse_variable_declaration(&mut self) -> Result<AstNode, ParseError> {
        let start = self.current_span();
        let storage = self.parse_storage_class();
        let var_type = self.parse_type()?;
        let (name, _) = self.expect_identifier()?;

        let mut decls = self.parse_declarators(start, storage, var_type, name)?;
        self.expect_semicolon("after variable declaration")?;
        let span = self.span_from(start);

        if decls.len() == 1 {
            if let Some(AstNode::VarDecl {
                name,
                var_type,
                storage,
                init,
                ..
            }) = decls.pop()
            {
                return Ok(AstNode::VarDecl {
                    name,
                    var_type,
                    storage,
                    init,
                    span,
                });
            }
        }

        Ok(AstNode::DeclGroup { decls, span })
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::parse_source;

    fn body_statements(src: &str) -> Vec<AstNode> {
        let program = parse_source(src).unwrap();
        let statements = match program.functions().next() {
            Some((_, AstNode::Block { statements, .. })) => statements.clone(),
            _ => panic!("Expected function with block body"),
        };
        statements
    }

    #[test]
    fn test_statement_spans_include_semicolons() {
        let src = "void f() { int a = 1, b; static int calls = 0; a = b; }";
        let stmts = body_statements(src);
        let texts: Vec<_> = stmts.iter().map(|s| &src[s.span().start..s.span().end]).collect();
        assert_eq!(texts, vec!["int a = 1, b;", "static int calls = 0;", "a = b;"]);
        assert!(matches!(&stmts[0], AstNode::DeclGroup { decls, .. } if decls.len() == 2));
        assert!(matches!(&stmts[1], AstNode::VarDecl { storage: StorageClass::Static, .. }));
    }

    #[test]
    fn test_control_flow() {
        let src = r#"
            int f(int n) {
                for (int i = 0; i < n; i++) { n--; }
                while (n) n = n - 1;
                do { n++; } while (n < 3);
                switch (n) { case 1: return 1; default: break; }
                goto done;
            done:
                return 0;
            }
        "#;
        let stmts = body_statements(src);
        assert!(matches!(&stmts[0], AstNode::For { init: Some(_), .. }));
        assert!(matches!(&stmts[1], AstNode::While { body, .. } if matches!(body.as_ref(), AstNode::ExpressionStatement { .. })));
        assert!(matches!(&stmts[2], AstNode::DoWhile { .. }));
        assert!(matches!(&stmts[3], AstNode::Switch { cases, .. } if cases.len() == 2));
        assert!(matches!(&stmts[4], AstNode::Goto { label, .. } if label == "done"));
        assert!(matches!(&stmts[5], AstNode::Label { name, .. } if name == "done"));
    }
}
