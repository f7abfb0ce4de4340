//! Declaration parsing implementation
//!
//! This module handles parsing of top-level declarations in C programs:
//!
//! - Struct definitions: `struct Name { ... };`
//! - Function definitions and prototypes: `type name(params) { ... }` / `type name(params);`
//! - Global variables: `[static|extern] type a = 1, *b;`
//! - Type parsing: qualifiers, base types, pointers, array dimensions
//!
//! # Grammar
//!
//! ```text
//! declaration  ::= struct_def | function_def | prototype | var_decl
//! struct_def   ::= "struct" identifier "{" field_list "}" ";"
//! function_def ::= storage? type identifier "(" params ")" block
//! prototype    ::= storage? type identifier "(" params ")" ";"
//! var_decl     ::= storage? type declarator ("," declarator)* ";"
//! declarator   ::= "*"* identifier ("[" expr? "]")* ("=" initializer)?
//! type         ::= qualifier* base_type qualifier* ("*" "const"?)*
//! ```
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};

impl Parser {
    /// Parse a top-level declaration. Variable declarations with several
    /// declarators yield one node per declarator.
    pub(crate) fn parse_top_level_declaration(&mut self) -> Result<Vec<AstNode>, ParseError> {
        let start = self.current_span();

        // struct Name { ... };  vs  struct Name func_name(...)
        if self.check(&TokenKind::Struct)
            && matches!(self.peek_ahead(1), Some(TokenKind::Ident(_)))
            && self.check_ahead(2, &TokenKind::LBrace)
        {
            self.advance(); // consume 'struct'
            return Ok(vec![self.parse_struct_definition(start)?]);
        }

        let storage = self.parse_storage_class();
        let type_start = self.current_span();
        let base_type = self.parse_type()?;
        let return_type_span = self.span_from(type_start);
        let (name, name_span) = self.expect_identifier()?;

        if self.check(&TokenKind::LParen) {
            let header = self.parse_function_header(name, name_span, base_type, return_type_span, storage)?;
            if self.match_token(&TokenKind::Semicolon) {
                return Ok(vec![AstNode::FunctionDecl {
                    header,
                    span: self.span_from(start),
                }]);
            }
            let body = self.parse_block()?;
            return Ok(vec![AstNode::FunctionDef {
                header,
                body: Box::new(body),
                span: self.span_from(start),
            }]);
        }

        let decls = self.parse_declarators(start, storage, base_type, name)?;
        self.expect_semicolon("after global declaration")?;
        Ok(decls)
    }

    /// Parse struct definition body; `struct` has already been consumed.
    pub(crate) fn parse_struct_definition(&mut self, start: Span) -> Result<AstNode, ParseError> {
        let (name, _) = self.expect_identifier()?;

        self.expect_token(&TokenKind::LBrace, "Expected '{' after struct name")?;

        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let field_type = self.parse_type()?;
            let mut first = true;
            loop {
                let mut ty = field_type.clone();
                if !first {
                    ty.pointer_depth = 0;
                }
                first = false;
                while self.match_token(&TokenKind::Star) {
                    ty.pointer_depth += 1;
                }
                let (field_name, _) = self.expect_identifier()?;
                self.parse_array_dims(&mut ty)?;
                fields.push(Field {
                    name: field_name,
                    field_type: ty,
                });
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect_semicolon("after struct field")?;
        }

        self.expect_rbrace("after struct fields")?;
        self.expect_semicolon("after struct definition")?;

        Ok(AstNode::StructDef {
            name,
            fields,
            span: self.span_from(start),
        })
    }

    /// Parse the parameter list following a function name.
    pub(crate) fn parse_function_header(
        &mut self,
        name: String,
        name_span: Span,
        return_type: Type,
        return_type_span: Span,
        storage: StorageClass,
    ) -> Result<FunctionHeader, ParseError> {
        let lparen = self.expect_lparen("after function name")?;
        let params = self.parse_parameter_list()?;
        self.expect_rparen("after parameters")?;

        Ok(FunctionHeader {
            name,
            name_span,
            params,
            params_span: self.span_from(lparen),
            return_type,
            return_type_span,
            storage,
        })
    }

    /// Parse parameter list: (type name, type name, ...)
    pub(crate) fn parse_parameter_list(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();

        if self.check(&TokenKind::RParen) {
            return Ok(params);
        }

        // Special case: (void) means no parameters in C
        if self.check(&TokenKind::Void) && self.check_ahead(1, &TokenKind::RParen) {
            self.advance();
            return Ok(params);
        }

        loop {
            let start = self.current_span();
            let mut param_type = self.parse_type()?;
            // Prototypes may leave parameters unnamed
            let name = if matches!(self.peek(), TokenKind::Ident(_)) {
                self.expect_identifier()?.0
            } else {
                String::new()
            };
            self.parse_array_dims(&mut param_type)?;
            params.push(Param {
                name,
                param_type,
                span: self.span_from(start),
            });

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(params)
    }

    /// Parse `static` / `extern` / `inline` prefixes.
    pub(crate) fn parse_storage_class(&mut self) -> StorageClass {
        let mut storage = StorageClass::Auto;
        loop {
            if self.match_token(&TokenKind::Static) {
                storage = StorageClass::Static;
            } else if self.match_token(&TokenKind::Extern) {
                storage = StorageClass::Extern;
            } else if !self.match_token(&TokenKind::Inline) {
                return storage;
            }
        }
    }

    /// Parse the declarators of a variable declaration whose type and first
    /// name have already been read. Stops before the terminating `;`.
    pub(crate) fn parse_declarators(
        &mut self,
        start: Span,
        storage: StorageClass,
        first_type: Type,
        first_name: String,
    ) -> Result<Vec<AstNode>, ParseError> {
        let mut decls = Vec::new();
        let mut decl_start = start;
        let mut var_type = first_type.clone();
        let mut name = first_name;

        loop {
            self.parse_array_dims(&mut var_type)?;
            let init = if self.match_token(&TokenKind::Eq) {
                Some(Box::new(self.parse_initializer()?))
            } else {
                None
            };

            decls.push(AstNode::VarDecl {
                name,
                var_type,
                storage,
                init,
                span: self.span_from(decl_start),
            });

            if !self.match_token(&TokenKind::Comma) {
                break;
            }

            // Pointer stars bind to each declarator, not to the shared type
            decl_start = self.current_span();
            var_type = first_type.clone();
            var_type.pointer_depth = 0;
            while self.match_token(&TokenKind::Star) {
                var_type.pointer_depth += 1;
            }
            name = self.expect_identifier()?.0;
        }

        Ok(decls)
    }

    /// Parse `= { a, b, ... }` or a single assignment expression.
    pub(crate) fn parse_initializer(&mut self) -> Result<AstNode, ParseError> {
        let start = self.current_span();
        if !self.match_token(&TokenKind::LBrace) {
            return self.parse_assignment_expression();
        }

        let mut items = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            items.push(self.parse_initializer()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_rbrace("after initializer list")?;

        Ok(AstNode::InitList {
            items,
            span: self.span_from(start),
        })
    }

    /// Parse array dimensions after a declarator name: `[4][]`
    pub(crate) fn parse_array_dims(&mut self, ty: &mut Type) -> Result<(), ParseError> {
        while self.match_token(&TokenKind::LBracket) {
            if self.match_token(&TokenKind::RBracket) {
                ty.array_dims.push(None);
                continue;
            }
            // Non-literal sizes (macros, constant expressions) stay unsized
            let size = match self.parse_expression()? {
                AstNode::IntLiteral(n, _) => usize::try_from(n).ok(),
                _ => None,
            };
            ty.array_dims.push(size);
            self.expect_token(&TokenKind::RBracket, "Expected ']' after array size")?;
        }
        Ok(())
    }

    /// Parse type: qualifiers, base type, pointer stars
    pub(crate) fn parse_type(&mut self) -> Result<Type, ParseError> {
        let mut is_const = false;
        let mut is_unsigned = false;
        let mut saw_sign = false;

        loop {
            if self.match_token(&TokenKind::Const) {
                is_const = true;
            } else if self.match_token(&TokenKind::Unsigned) {
                is_unsigned = true;
                saw_sign = true;
            } else if self.match_token(&TokenKind::Signed) {
                saw_sign = true;
            } else {
                break;
            }
        }

        let base = match self.peek().clone() {
            TokenKind::Int => {
                self.advance();
                BaseType::Int
            }
            TokenKind::Char => {
                self.advance();
                BaseType::Char
            }
            TokenKind::Short => {
                self.advance();
                self.match_token(&TokenKind::Int);
                BaseType::Short
            }
            TokenKind::Long => {
                self.advance();
                if self.match_token(&TokenKind::Double) {
                    BaseType::Double
                } else {
                    self.match_token(&TokenKind::Long);
                    self.match_token(&TokenKind::Int);
                    BaseType::Long
                }
            }
            TokenKind::Float => {
                self.advance();
                BaseType::Float
            }
            TokenKind::Double => {
                self.advance();
                BaseType::Double
            }
            TokenKind::Bool => {
                self.advance();
                BaseType::Bool
            }
            TokenKind::Void => {
                self.advance();
                BaseType::Void
            }
            TokenKind::Struct => {
                self.advance();
                BaseType::Struct(self.expect_identifier()?.0)
            }
            _ if saw_sign => BaseType::Int,
            _ => return Err(self.error(format!("Expected type, found {}", self.peek()))),
        };

        if self.match_token(&TokenKind::Const) {
            is_const = true;
        }

        let mut pointer_depth = 0;
        while self.match_token(&TokenKind::Star) {
            pointer_depth += 1;
            self.match_token(&TokenKind::Const);
        }

        Ok(Type {
            base,
            is_const,
            is_unsigned,
            pointer_depth,
            array_dims: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::parse_source;

    #[test]
    fn test_function_header_spans() {
        let src = "static unsigned long *grow(const char *name, int n[]) { return 0; }";
        let program = parse_source(src).unwrap();
        let AstNode::FunctionDef { header, .. } = &program.nodes[0] else {
            panic!("Expected function definition");
        };

        assert_eq!(header.storage, StorageClass::Static);
        assert_eq!(&src[header.return_type_span.start..header.return_type_span.end], "unsigned long *");
        assert_eq!(&src[header.name_span.start..header.name_span.end], "grow");
        assert_eq!(
            &src[header.params_span.start..header.params_span.end],
            "(const char *name, int n[])"
        );
        assert_eq!(header.params[1].param_type.decayed().to_string(), "int *");
    }

    #[test]
    fn test_unnamed_prototype_parameters() {
        let program = parse_source("int add(int, int);").unwrap();
        let AstNode::FunctionDecl { header, .. } = &program.nodes[0] else {
            panic!("Expected prototype");
        };
        assert_eq!(header.params.len(), 2);
        assert!(header.params[0].name.is_empty());
    }

    #[test]
    fn test_pointer_stars_bind_per_declarator() {
        let program = parse_source("int *a, b, c[3] = {1, 2, 3};").unwrap();
        let types: Vec<_> = program
            .nodes
            .iter()
            .map(|n| match n {
                AstNode::VarDecl { var_type, .. } => var_type.declare("v"),
                _ => panic!("Expected variable"),
            })
            .collect();
        assert_eq!(types, vec!["int *v", "int v", "int v[3]"]);
    }
}
