// AST (Abstract Syntax Tree) definitions for the C front end

use std::fmt;

/// Byte range of a node in its source text, plus the line and column of its
/// first character.
///
/// The rewriter splices source text between spans, so `start..end` must cover
/// exactly the tokens the node was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Span running from the start of `self` to the end of `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end.max(self.end),
            line: self.line,
            column: self.column,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Base types supported by the front end
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BaseType {
    Int,
    Char,
    Short,
    Long,
    Float,
    Double,
    Bool,
    Void,
    Struct(String), // Struct name
}

impl BaseType {
    pub fn is_arithmetic(&self) -> bool {
        !matches!(self, BaseType::Void | BaseType::Struct(_))
    }
}

/// Type representation with qualifiers, pointers, and arrays
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    pub base: BaseType,
    pub is_const: bool,
    pub is_unsigned: bool,
    pub pointer_depth: usize, // 0 = not pointer, 1 = *, 2 = **, etc.
    pub array_dims: Vec<Option<usize>>, // None for unsized dimension (function params)
}

impl Type {
    pub fn new(base: BaseType) -> Self {
        Type {
            base,
            is_const: false,
            is_unsigned: false,
            pointer_depth: 0,
            array_dims: Vec::new(),
        }
    }

    pub fn with_const(mut self) -> Self {
        self.is_const = true;
        self
    }

    pub fn with_pointer(mut self) -> Self {
        self.pointer_depth += 1;
        self
    }

    pub fn with_array(mut self, size: Option<usize>) -> Self {
        self.array_dims.push(size);
        self
    }

    pub fn is_void(&self) -> bool {
        self.base == BaseType::Void && self.pointer_depth == 0 && self.array_dims.is_empty()
    }

    pub fn is_pointer_like(&self) -> bool {
        self.pointer_depth > 0 || !self.array_dims.is_empty()
    }

    pub fn is_arithmetic(&self) -> bool {
        !self.is_pointer_like() && self.base.is_arithmetic()
    }

    /// Array-to-pointer decay, as applied to parameters and record fields.
    pub fn decayed(&self) -> Type {
        let mut ty = self.clone();
        ty.pointer_depth += ty.array_dims.len();
        ty.array_dims.clear();
        ty
    }

    /// Identity used to tell overloads apart: top-level `const` is ignored and
    /// arrays decay.
    pub fn overload_key(&self) -> Type {
        let mut ty = self.decayed();
        ty.is_const = false;
        ty
    }

    /// Identifier-safe spelling (`int`, `uint`, `charp`, `Pointp`).
    pub fn mangled(&self) -> String {
        let ty = self.decayed();
        let mut out = String::new();
        if ty.is_unsigned {
            out.push('u');
        }
        match &ty.base {
            BaseType::Struct(name) => out.push_str(name),
            other => out.push_str(base_spelling(other)),
        }
        for _ in 0..ty.pointer_depth {
            out.push('p');
        }
        out
    }

    /// Declaration of a variable `name` with this type, e.g. `int *xs[4]`.
    pub fn declare(&self, name: &str) -> String {
        let mut out = self.to_string();
        if !out.ends_with('*') {
            out.push(' ');
        }
        out.push_str(name);
        for dim in &self.array_dims {
            match dim {
                Some(n) => out.push_str(&format!("[{}]", n)),
                None => out.push_str("[]"),
            }
        }
        out
    }
}

fn base_spelling(base: &BaseType) -> &'static str {
    match base {
        BaseType::Int => "int",
        BaseType::Char => "char",
        BaseType::Short => "short",
        BaseType::Long => "long",
        BaseType::Float => "float",
        BaseType::Double => "double",
        BaseType::Bool => "bool",
        BaseType::Void => "void",
        BaseType::Struct(_) => "struct",
    }
}

/// C spelling without array dimensions (`const unsigned int *`).
impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_const {
            write!(f, "const ")?;
        }
        if self.is_unsigned {
            write!(f, "unsigned ")?;
        }
        match &self.base {
            BaseType::Struct(name) => write!(f, "struct {}", name)?,
            other => write!(f, "{}", base_spelling(other))?,
        }
        if self.pointer_depth > 0 {
            write!(f, " {}", "*".repeat(self.pointer_depth))?;
        }
        Ok(())
    }
}

/// Storage class of a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageClass {
    #[default]
    Auto,
    Static,
    Extern,
}

/// Binary operators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    BitShl,
    BitShr,
    // Compound assignment
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
}

impl BinOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::And | BinOp::Or
        )
    }

    /// Operators whose right operand is evaluated conditionally.
    pub fn is_short_circuit(&self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

/// Unary operators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnOp {
    Neg,     // -x
    Not,     // !x
    BitNot,  // ~x
    PreInc,  // ++x
    PreDec,  // --x
    PostInc, // x++
    PostDec, // x--
    Deref,   // *x
    AddrOf,  // &x
}

/// Function parameter
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub param_type: Type,
    pub span: Span,
}

/// Struct field
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub field_type: Type,
}

/// Switch case
#[derive(Debug, Clone)]
pub enum CaseNode {
    Case {
        value: Box<AstNode>,
        statements: Vec<AstNode>,
        span: Span,
    },
    Default {
        statements: Vec<AstNode>,
        span: Span,
    },
}

impl CaseNode {
    pub fn statements(&self) -> &[AstNode] {
        match self {
            CaseNode::Case { statements, .. } | CaseNode::Default { statements, .. } => statements,
        }
    }
}

/// The declarator part of a function definition or prototype.
#[derive(Debug, Clone)]
pub struct FunctionHeader {
    pub name: String,
    pub name_span: Span,
    pub params: Vec<Param>,
    /// Parenthesized parameter list, parentheses included.
    pub params_span: Span,
    pub return_type: Type,
    /// Return type tokens, storage class excluded.
    pub return_type_span: Span,
    pub storage: StorageClass,
}

/// AST nodes representing declarations, statements and expressions
#[derive(Debug, Clone)]
pub enum AstNode {
    // Top-level declarations
    FunctionDef {
        header: FunctionHeader,
        body: Box<AstNode>,
        span: Span,
    },
    FunctionDecl {
        header: FunctionHeader,
        span: Span,
    },
    StructDef {
        name: String,
        fields: Vec<Field>,
        span: Span,
    },

    // Statements
    VarDecl {
        name: String,
        var_type: Type,
        storage: StorageClass,
        init: Option<Box<AstNode>>,
        span: Span,
    },
    /// `int a = 1, b;` holds one `VarDecl` per declarator.
    DeclGroup {
        decls: Vec<AstNode>,
        span: Span,
    },
    Block {
        statements: Vec<AstNode>,
        span: Span,
    },
    Return {
        expr: Option<Box<AstNode>>,
        span: Span,
    },
    If {
        condition: Box<AstNode>,
        then_branch: Box<AstNode>,
        else_branch: Option<Box<AstNode>>,
        span: Span,
    },
    While {
        condition: Box<AstNode>,
        body: Box<AstNode>,
        span: Span,
    },
    DoWhile {
        body: Box<AstNode>,
        condition: Box<AstNode>,
        span: Span,
    },
    For {
        init: Option<Box<AstNode>>,
        condition: Option<Box<AstNode>>,
        increment: Option<Box<AstNode>>,
        body: Box<AstNode>,
        span: Span,
    },
    Switch {
        expr: Box<AstNode>,
        cases: Vec<CaseNode>,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    Goto {
        label: String,
        span: Span,
    },
    Label {
        name: String,
        span: Span,
    },
    ExpressionStatement {
        expr: Box<AstNode>,
        span: Span,
    },
    Empty {
        span: Span,
    },

    // Expressions
    IntLiteral(i64, Span),
    FloatLiteral(f64, Span),
    CharLiteral(i8, Span),
    StringLiteral(String, Span),
    BoolLiteral(bool, Span),
    Null {
        span: Span,
    },
    Variable(String, Span),
    Assignment {
        lhs: Box<AstNode>,
        rhs: Box<AstNode>,
        span: Span,
    },
    CompoundAssignment {
        lhs: Box<AstNode>,
        op: BinOp,
        rhs: Box<AstNode>,
        span: Span,
    },
    BinaryOp {
        op: BinOp,
        left: Box<AstNode>,
        right: Box<AstNode>,
        span: Span,
    },
    UnaryOp {
        op: UnOp,
        operand: Box<AstNode>,
        span: Span,
    },
    TernaryOp {
        condition: Box<AstNode>,
        true_expr: Box<AstNode>,
        false_expr: Box<AstNode>,
        span: Span,
    },
    Comma {
        left: Box<AstNode>,
        right: Box<AstNode>,
        span: Span,
    },
    FunctionCall {
        name: String,
        name_span: Span,
        args: Vec<AstNode>,
        span: Span,
    },
    ArrayAccess {
        array: Box<AstNode>,
        index: Box<AstNode>,
        span: Span,
    },
    MemberAccess {
        object: Box<AstNode>,
        member: String,
        span: Span,
    },
    PointerMemberAccess {
        object: Box<AstNode>,
        member: String,
        span: Span,
    },
    Cast {
        target_type: Type,
        expr: Box<AstNode>,
        span: Span,
    },
    SizeofType {
        target_type: Type,
        span: Span,
    },
    SizeofExpr {
        expr: Box<AstNode>,
        span: Span,
    },
    InitList {
        items: Vec<AstNode>,
        span: Span,
    },
}

impl AstNode {
    /// Get the source span of this node
    pub fn span(&self) -> Span {
        match self {
            AstNode::FunctionDef { span, .. }
            | AstNode::FunctionDecl { span, .. }
            | AstNode::StructDef { span, .. }
            | AstNode::VarDecl { span, .. }
            | AstNode::DeclGroup { span, .. }
            | AstNode::Block { span, .. }
            | AstNode::Return { span, .. }
            | AstNode::If { span, .. }
            | AstNode::While { span, .. }
            | AstNode::DoWhile { span, .. }
            | AstNode::For { span, .. }
            | AstNode::Switch { span, .. }
            | AstNode::Break { span }
            | AstNode::Continue { span }
            | AstNode::Goto { span, .. }
            | AstNode::Label { span, .. }
            | AstNode::ExpressionStatement { span, .. }
            | AstNode::Empty { span }
            | AstNode::Null { span }
            | AstNode::Assignment { span, .. }
            | AstNode::CompoundAssignment { span, .. }
            | AstNode::BinaryOp { span, .. }
            | AstNode::UnaryOp { span, .. }
            | AstNode::TernaryOp { span, .. }
            | AstNode::Comma { span, .. }
            | AstNode::FunctionCall { span, .. }
            | AstNode::ArrayAccess { span, .. }
            | AstNode::MemberAccess { span, .. }
            | AstNode::PointerMemberAccess { span, .. }
            | AstNode::Cast { span, .. }
            | AstNode::SizeofType { span, .. }
            | AstNode::SizeofExpr { span, .. }
            | AstNode::InitList { span, .. } => *span,
            AstNode::IntLiteral(_, span)
            | AstNode::FloatLiteral(_, span)
            | AstNode::CharLiteral(_, span)
            | AstNode::StringLiteral(_, span)
            | AstNode::BoolLiteral(_, span)
            | AstNode::Variable(_, span) => *span,
        }
    }

    /// Direct children in source order. Their spans never overlap and all lie
    /// inside `self.span()`.
    pub fn children(&self) -> Vec<&AstNode> {
        fn push<'a>(out: &mut Vec<&'a AstNode>, node: &'a Option<Box<AstNode>>) {
            if let Some(node) = node {
                out.push(node);
            }
        }

        let mut out = Vec::new();
        match self {
            AstNode::FunctionDef { body, .. } => out.push(body.as_ref()),
            AstNode::VarDecl { init, .. } => push(&mut out, init),
            AstNode::DeclGroup { decls, .. } => out.extend(decls.iter()),
            AstNode::Block { statements, .. } => out.extend(statements.iter()),
            AstNode::Return { expr, .. } => push(&mut out, expr),
            AstNode::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                out.push(condition);
                out.push(then_branch);
                push(&mut out, else_branch);
            }
            AstNode::While { condition, body, .. } => {
                out.push(condition);
                out.push(body);
            }
            AstNode::DoWhile { body, condition, .. } => {
                out.push(body);
                out.push(condition);
            }
            AstNode::For {
                init,
                condition,
                increment,
                body,
                ..
            } => {
                push(&mut out, init);
                push(&mut out, condition);
                push(&mut out, increment);
                out.push(body);
            }
            AstNode::Switch { expr, cases, .. } => {
                out.push(expr);
                for case in cases {
                    if let CaseNode::Case { value, .. } = case {
                        out.push(value);
                    }
                    out.extend(case.statements().iter());
                }
            }
            AstNode::ExpressionStatement { expr, .. } => out.push(expr),
            AstNode::Assignment { lhs, rhs, .. } | AstNode::CompoundAssignment { lhs, rhs, .. } => {
                out.push(lhs);
                out.push(rhs);
            }
            AstNode::BinaryOp { left, right, .. } | AstNode::Comma { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            AstNode::UnaryOp { operand, .. } => out.push(operand),
            AstNode::TernaryOp {
                condition,
                true_expr,
                false_expr,
                ..
            } => {
                out.push(condition);
                out.push(true_expr);
                out.push(false_expr);
            }
            AstNode::FunctionCall { args, .. } => out.extend(args.iter()),
            AstNode::ArrayAccess { array, index, .. } => {
                out.push(array);
                out.push(index);
            }
            AstNode::MemberAccess { object, .. } | AstNode::PointerMemberAccess { object, .. } => {
                out.push(object)
            }
            AstNode::Cast { expr, .. } | AstNode::SizeofExpr { expr, .. } => out.push(expr),
            AstNode::InitList { items, .. } => out.extend(items.iter()),
            AstNode::FunctionDecl { .. }
            | AstNode::StructDef { .. }
            | AstNode::Break { .. }
            | AstNode::Continue { .. }
            | AstNode::Goto { .. }
            | AstNode::Label { .. }
            | AstNode::Empty { .. }
            | AstNode::IntLiteral(..)
            | AstNode::FloatLiteral(..)
            | AstNode::CharLiteral(..)
            | AstNode::StringLiteral(..)
            | AstNode::BoolLiteral(..)
            | AstNode::Null { .. }
            | AstNode::Variable(..)
            | AstNode::SizeofType { .. } => {}
        }
        out
    }

    /// Pre-order walk over this node and all of its descendants.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a AstNode)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            AstNode::VarDecl { .. }
                | AstNode::DeclGroup { .. }
                | AstNode::Block { .. }
                | AstNode::Return { .. }
                | AstNode::If { .. }
                | AstNode::While { .. }
                | AstNode::DoWhile { .. }
                | AstNode::For { .. }
                | AstNode::Switch { .. }
                | AstNode::Break { .. }
                | AstNode::Continue { .. }
                | AstNode::Goto { .. }
                | AstNode::Label { .. }
                | AstNode::ExpressionStatement { .. }
                | AstNode::Empty { .. }
        )
    }
}

/// One parsed translation unit
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub nodes: Vec<AstNode>, // All top-level declarations
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    /// Function definitions in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = (&FunctionHeader, &AstNode)> {
        self.nodes.iter().filter_map(|node| match node {
            AstNode::FunctionDef { header, body, .. } => Some((header, body.as_ref())),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_display_and_declare() {
        let ty = Type::new(BaseType::Int).with_const().with_pointer();
        assert_eq!(ty.to_string(), "const int *");
        assert_eq!(ty.declare("p"), "const int *p");

        let arr = Type::new(BaseType::Char).with_array(Some(4));
        assert_eq!(arr.declare("buf"), "char buf[4]");
        assert_eq!(arr.decayed().to_string(), "char *");
    }

    #[test]
    fn test_overload_key_ignores_top_level_const() {
        let a = Type::new(BaseType::Int).with_const();
        let b = Type::new(BaseType::Int);
        assert_eq!(a.overload_key(), b.overload_key());
        assert_eq!(
            Type::new(BaseType::Struct("Point".into())).with_pointer().mangled(),
            "Pointp"
        );
    }
}
