//! Name resolution and a light static type oracle
//!
//! The rewriter needs to know, for every variable reference inside a function
//! body, whether it names a parameter, a local, a static local or a global,
//! and, for overload resolution, roughly what type an argument expression
//! has. [`SymbolTable`] collects program-wide declarations from every parsed
//! unit; [`FunctionBindings`] resolves one function body against it.
//!
//! Names that resolve to nothing are reported as [`BindingKind::Unresolved`].
//! They usually come from headers the lexer skipped (`stdout`, `errno`) and
//! are treated as library state.

use crate::parser::ast::*;
use rustc_hash::FxHashMap;

/// What a variable reference resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Parameter of the enclosing function, by position
    Param(usize),
    Local,
    StaticLocal,
    Global,
    Unresolved,
}

impl BindingKind {
    /// Static storage duration: needs the globals lock when touched from tasks
    pub fn is_shared_state(&self) -> bool {
        matches!(self, BindingKind::Global | BindingKind::StaticLocal)
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub kind: BindingKind,
    pub ty: Option<Type>,
}

/// Program-wide declarations gathered from all parsed units.
#[derive(Debug, Default)]
pub struct SymbolTable {
    globals: FxHashMap<String, Type>,
    structs: FxHashMap<String, Vec<Field>>,
    functions: FxHashMap<String, Vec<FunctionHeader>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_program(&mut self, program: &Program) {
        for node in &program.nodes {
            match node {
                AstNode::VarDecl { name, var_type, .. } => {
                    self.globals.insert(name.clone(), var_type.clone());
                }
                AstNode::StructDef { name, fields, .. } => {
                    self.structs.insert(name.clone(), fields.clone());
                }
                AstNode::FunctionDef { header, .. } | AstNode::FunctionDecl { header, .. } => {
                    self.functions.entry(header.name.clone()).or_default().push(header.clone());
                }
                _ => {}
            }
        }
    }

    pub fn from_programs<'a>(programs: impl IntoIterator<Item = &'a Program>) -> Self {
        let mut table = Self::new();
        for program in programs {
            table.add_program(program);
        }
        table
    }

    pub fn global(&self, name: &str) -> Option<&Type> {
        self.globals.get(name)
    }

    pub fn field_type(&self, struct_name: &str, field: &str) -> Option<&Type> {
        self.structs
            .get(struct_name)?
            .iter()
            .find(|f| f.name == field)
            .map(|f| &f.field_type)
    }

    /// Every declaration or definition seen for `name`
    pub fn function_headers(&self, name: &str) -> &[FunctionHeader] {
        self.functions.get(name).map_or(&[], Vec::as_slice)
    }
}

/// Variable bindings of one function body, keyed by reference span start.
#[derive(Debug, Default)]
pub struct FunctionBindings {
    bindings: FxHashMap<usize, Binding>,
}

impl FunctionBindings {
    /// Resolve every variable reference in `body`.
    pub fn resolve(header: &FunctionHeader, body: &AstNode, symbols: &SymbolTable) -> Self {
        let mut params = FxHashMap::default();
        for (index, param) in header.params.iter().enumerate() {
            if !param.name.is_empty() {
                params.insert(param.name.clone(), (BindingKind::Param(index), param.param_type.clone()));
            }
        }

        let mut resolver = Resolver {
            scopes: vec![params],
            symbols,
            out: FunctionBindings::default(),
        };
        resolver.visit(body);
        resolver.out
    }

    pub fn get(&self, span: Span) -> Option<&Binding> {
        self.bindings.get(&span.start)
    }

    pub fn kind(&self, span: Span) -> BindingKind {
        self.get(span).map_or(BindingKind::Unresolved, |b| b.kind)
    }

    /// Best-effort static type of an expression; `None` when unknown.
    pub fn expr_type(&self, node: &AstNode, symbols: &SymbolTable) -> Option<Type> {
        match node {
            AstNode::IntLiteral(..) => Some(Type::new(BaseType::Int)),
            AstNode::FloatLiteral(..) => Some(Type::new(BaseType::Double)),
            AstNode::CharLiteral(..) => Some(Type::new(BaseType::Char)),
            AstNode::BoolLiteral(..) => Some(Type::new(BaseType::Bool)),
            AstNode::StringLiteral(..) => Some(Type::new(BaseType::Char).with_const().with_pointer()),
            AstNode::Null { .. } => Some(Type::new(BaseType::Void).with_pointer()),
            AstNode::Variable(_, span) => self.get(*span).and_then(|b| b.ty.clone()),
            AstNode::Assignment { lhs, .. } | AstNode::CompoundAssignment { lhs, .. } => {
                self.expr_type(lhs, symbols)
            }
            AstNode::Comma { right, .. } => self.expr_type(right, symbols),
            AstNode::TernaryOp { true_expr, .. } => self.expr_type(true_expr, symbols),
            AstNode::Cast { target_type, .. } => Some(target_type.clone()),
            AstNode::SizeofType { .. } | AstNode::SizeofExpr { .. } => {
                Some(Type { is_unsigned: true, ..Type::new(BaseType::Long) })
            }
            AstNode::BinaryOp { op, left, right, .. } => {
                if op.is_comparison() {
                    return Some(Type::new(BaseType::Int));
                }
                let l = self.expr_type(left, symbols)?;
                let r = self.expr_type(right, symbols)?;
                match (l.is_pointer_like(), r.is_pointer_like()) {
                    (true, true) => Some(Type::new(BaseType::Long)),
                    (true, false) => Some(l.decayed()),
                    (false, true) => Some(r.decayed()),
                    (false, false) => Some(wider(l, r)),
                }
            }
            AstNode::UnaryOp { op, operand, .. } => {
                let ty = self.expr_type(operand, symbols);
                match op {
                    UnOp::Not => Some(Type::new(BaseType::Int)),
                    UnOp::AddrOf => ty.map(Type::with_pointer),
                    UnOp::Deref => ty.map(|t| dereference(&t)),
                    _ => ty,
                }
            }
            AstNode::ArrayAccess { array, .. } => self.expr_type(array, symbols).map(|t| dereference(&t)),
            AstNode::MemberAccess { object, member, .. } | AstNode::PointerMemberAccess { object, member, .. } => {
                let ty = self.expr_type(object, symbols)?;
                match ty.base {
                    BaseType::Struct(name) => symbols.field_type(&name, member).cloned(),
                    _ => None,
                }
            }
            AstNode::FunctionCall { name, args, .. } => {
                let headers = symbols.function_headers(name);
                let mut candidates = headers.iter().filter(|h| h.params.len() == args.len());
                let first = candidates.next()?;
                candidates
                    .all(|h| h.return_type == first.return_type)
                    .then(|| first.return_type.clone())
            }
            _ => None,
        }
    }
}

fn dereference(ty: &Type) -> Type {
    let mut ty = ty.clone();
    if ty.array_dims.is_empty() {
        ty.pointer_depth = ty.pointer_depth.saturating_sub(1);
    } else {
        ty.array_dims.remove(0);
    }
    ty
}

/// Usual arithmetic conversions, approximately
fn wider(l: Type, r: Type) -> Type {
    fn rank(ty: &Type) -> u8 {
        match ty.base {
            BaseType::Double => 6,
            BaseType::Float => 5,
            BaseType::Long => 4,
            BaseType::Int => 3,
            BaseType::Short => 2,
            BaseType::Char | BaseType::Bool => 1,
            BaseType::Void | BaseType::Struct(_) => 0,
        }
    }
    let promoted = if rank(&l) >= rank(&r) { l } else { r };
    if rank(&promoted) < 3 {
        Type::new(BaseType::Int)
    } else {
        Type {
            is_const: false,
            ..promoted
        }
    }
}

type Scope = FxHashMap<String, (BindingKind, Type)>;

struct Resolver<'a> {
    scopes: Vec<Scope>,
    symbols: &'a SymbolTable,
    out: FunctionBindings,
}

impl Resolver<'_> {
    fn lookup(&self, name: &str) -> Binding {
        for scope in self.scopes.iter().rev() {
            if let Some((kind, ty)) = scope.get(name) {
                return Binding {
                    kind: *kind,
                    ty: Some(ty.clone()),
                };
            }
        }
        match self.symbols.global(name) {
            Some(ty) => Binding {
                kind: BindingKind::Global,
                ty: Some(ty.clone()),
            },
            None => Binding {
                kind: BindingKind::Unresolved,
                ty: None,
            },
        }
    }

    fn declare(&mut self, name: &str, storage: StorageClass, ty: &Type) {
        let kind = match storage {
            StorageClass::Auto => BindingKind::Local,
            StorageClass::Static => BindingKind::StaticLocal,
            StorageClass::Extern => BindingKind::Global,
        };
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), (kind, ty.clone()));
        }
    }

    fn with_scope(&mut self, f: impl FnOnce(&mut Self)) {
        self.scopes.push(Scope::default());
        f(self);
        self.scopes.pop();
    }

    fn visit(&mut self, node: &AstNode) {
        match node {
            AstNode::Variable(name, span) => {
                let binding = self.lookup(name);
                self.out.bindings.insert(span.start, binding);
            }
            AstNode::VarDecl {
                name,
                var_type,
                storage,
                init,
                ..
            } => {
                if let Some(init) = init {
                    self.visit(init);
                }
                self.declare(name, *storage, var_type);
            }
            AstNode::Block { .. } | AstNode::For { .. } | AstNode::Switch { .. } => {
                self.with_scope(|this| {
                    for child in node.children() {
                        this.visit(child);
                    }
                });
            }
            // Unbraced branch bodies still open a scope of their own
            AstNode::If { .. } | AstNode::While { .. } | AstNode::DoWhile { .. } => {
                for child in node.children() {
                    if child.is_statement() {
                        self.with_scope(|this| this.visit(child));
                    } else {
                        self.visit(child);
                    }
                }
            }
            _ => {
                for child in node.children() {
                    self.visit(child);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse::parse_source;

    fn references(src: &str) -> (Vec<(String, BindingKind)>, FunctionBindings, SymbolTable) {
        let program = parse_source(src).unwrap();
        let symbols = SymbolTable::from_programs([&program]);
        let (header, body) = program.functions().last().unwrap();
        let bindings = FunctionBindings::resolve(header, body, &symbols);

        let mut refs = Vec::new();
        body.walk(&mut |node| {
            if let AstNode::Variable(name, span) = node {
                refs.push((name.clone(), bindings.kind(*span)));
            }
        });
        (refs, bindings, symbols)
    }

    #[test]
    fn test_binding_kinds() {
        let src = r#"
            int counter;
            int f(int a, int b) {
                static int calls;
                int local = a;
                calls = calls + counter + b + local + errno;
            }
        "#;
        let (refs, _, _) = references(src);
        assert_eq!(
            refs,
            vec![
                ("a".to_string(), BindingKind::Param(0)),
                ("calls".to_string(), BindingKind::StaticLocal),
                ("calls".to_string(), BindingKind::StaticLocal),
                ("counter".to_string(), BindingKind::Global),
                ("b".to_string(), BindingKind::Param(1)),
                ("local".to_string(), BindingKind::Local),
                ("errno".to_string(), BindingKind::Unresolved),
            ]
        );
    }

    #[test]
    fn test_shadowing_respects_scopes() {
        let src = r#"
            int f(int x) {
                { int x = 2; x++; }
                for (int x = 0; x < 3; x++) {}
                return x;
            }
        "#;
        let (refs, _, _) = references(src);
        let kinds: Vec<_> = refs.into_iter().map(|(_, k)| k).collect();
        assert_eq!(
            kinds,
            vec![
                BindingKind::Local,
                BindingKind::Local,
                BindingKind::Local,
                BindingKind::Param(0),
            ]
        );
    }

    #[test]
    fn test_expression_types() {
        let src = r#"
            struct P { double w; };
            int f(struct P *p, char c) {
                return p->w + c;
            }
        "#;
        let program = parse_source(src).unwrap();
        let symbols = SymbolTable::from_programs([&program]);
        let (header, body) = program.functions().next().unwrap();
        let bindings = FunctionBindings::resolve(header, body, &symbols);

        let mut found = None;
        body.walk(&mut |node| {
            if let AstNode::Return { expr: Some(expr), .. } = node {
                found = bindings.expr_type(expr, &symbols);
            }
        });
        assert_eq!(found, Some(Type::new(BaseType::Double)));
    }
}
