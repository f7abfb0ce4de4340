//! Function registry
//!
//! A single pass over every parsed unit decides which functions become tasks.
//! A function is registered when it has a body, is not the entry point, and
//! its parameters can be mirrored by a call record. Everything else stays
//! opaque and is called the ordinary way.
//!
//! Each registered function gets:
//! - a dense [`FunctionId`], the index of its dispatch case;
//! - a generated symbol, unique across the program;
//! - its call-record field list (parameters, then `return_var` and `done`
//!   when it returns a value);
//! - a static weight, the cost proxy fed to the load balancer.
//!
//! Problems that make a function unsafe to rewrite are collected as
//! [`RegistryDiagnostic`]s; the function is then left opaque.
//!
//! `static` definitions are local to their unit: two units may each define
//! `static int helper(int)`, and a call only ever reaches the one in its own
//! unit.

use crate::config::{Naming, ObfuscatorConfig, WeightMetric};
use crate::parser::ast::{AstNode, BaseType, FunctionHeader, Span, StorageClass, Type};
use crate::parser::SourceUnit;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Field names the call record reserves for itself.
pub const RETURN_FIELD: &str = "return_var";
pub const DONE_FIELD: &str = "done";

/// Dense index of a registered function, as used in the dispatch switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub usize);

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Original declaration of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<(Type, String)>,
    pub return_type: Type,
}

impl FunctionSignature {
    pub fn from_header(header: &FunctionHeader) -> Self {
        Self {
            name: header.name.clone(),
            params: header
                .params
                .iter()
                .map(|p| (p.param_type.clone(), p.name.clone()))
                .collect(),
            return_type: header.return_type.clone(),
        }
    }

    pub fn returns_value(&self) -> bool {
        !self.return_type.is_void()
    }

    /// Identity that tells overloads apart
    pub fn overload_key(&self) -> OverloadKey {
        OverloadKey {
            name: self.name.clone(),
            params: self.params.iter().map(|(ty, _)| ty.overload_key()).collect(),
        }
    }

    /// Name followed by the first letter of each parameter's type spelling,
    /// e.g. `funcD_ii`. Distinct types can share a letter.
    pub fn legacy_key(&self) -> String {
        if self.params.is_empty() {
            return self.name.clone();
        }
        let letters: String = self
            .params
            .iter()
            .filter_map(|(ty, _)| ty.to_string().chars().next())
            .collect();
        format!("{}_{}", self.name, letters)
    }

    /// `add__int_int`
    pub fn mangled(&self) -> String {
        if self.params.is_empty() {
            return format!("{}__void", self.name);
        }
        let types: Vec<String> = self.params.iter().map(|(ty, _)| ty.mangled()).collect();
        format!("{}__{}", self.name, types.join("_"))
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(|(ty, name)| ty.declare(name)).collect();
        write!(f, "{} {}({})", self.return_type, self.name, params.join(", "))
    }
}

/// Name plus normalized parameter types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OverloadKey {
    pub name: String,
    pub params: Vec<Type>,
}

/// Role of a call-record field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Param,
    ReturnValue,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordField {
    pub name: String,
    pub ty: Type,
    pub kind: FieldKind,
}

/// One transformable function
#[derive(Debug, Clone)]
pub struct RegisteredFunction {
    pub id: FunctionId,
    pub signature: FunctionSignature,
    /// Identifier used for the rewritten function, its record and its pool.
    pub symbol: String,
    pub legacy_key: String,
    pub weight: u64,
    pub record_fields: Vec<RecordField>,
    /// Index of the defining unit.
    pub unit: usize,
    /// Declared `static`: only callable from `unit`.
    pub file_local: bool,
    pub span: Span,
}

impl RegisteredFunction {
    pub fn returns_value(&self) -> bool {
        self.signature.returns_value()
    }

    pub fn record_type(&self) -> String {
        format!("{}_record", self.symbol)
    }

    pub fn pool_name(&self) -> String {
        format!("{}_pool", self.symbol)
    }

    pub fn enum_name(&self) -> String {
        format!("TASKFOG_FN_{}", self.symbol)
    }
}

/// Why a function was left out of the registry
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryDiagnostic {
    #[error("{unit}:{span}: '{name}' is defined more than once with the same parameter types; later definition left untouched")]
    DuplicateDefinition { unit: String, span: Span, name: String },

    #[error("{unit}:{span}: parameter '{param}' of '{function}' clashes with a call-record field; function left untouched")]
    ReservedParameterName {
        unit: String,
        span: Span,
        function: String,
        param: String,
    },

    #[error("{unit}:{span}: '{function}' has an unnamed parameter; function left untouched")]
    UnnamedParameter { unit: String, span: Span, function: String },

    #[error("{unit}:{span}: the address of '{function}' is taken; function left untouched")]
    AddressTaken { unit: String, span: Span, function: String },

    #[error("{unit}:{span}: overload key '{key}' of '{signature}' collides with '{existing}'; function left untouched")]
    KeyCollision {
        unit: String,
        span: Span,
        key: String,
        signature: String,
        existing: String,
    },
}

/// Outcome of matching a call against known definitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    /// Callee is a registered function.
    Registered(FunctionId),
    /// Callee is unknown, bodiless, the entry point, or excluded.
    Opaque,
    /// The name is registered but no definition accepts these arguments.
    NoMatch { candidates: usize },
    /// More than one definition accepts these arguments.
    Ambiguous { candidates: usize },
}

#[derive(Debug, Clone)]
struct Definition {
    key: OverloadKey,
    /// Defining unit of a `static` function.
    local_to: Option<usize>,
    id: Option<FunctionId>,
}

impl Definition {
    fn visible_from(&self, unit: usize) -> bool {
        self.local_to.map_or(true, |local| local == unit)
    }
}

/// Two definitions can be seen from the same unit.
fn scopes_overlap(a: Option<usize>, b: Option<usize>) -> bool {
    a.is_none() || b.is_none() || a == b
}

/// Registered functions plus enough bookkeeping to resolve call sites.
#[derive(Debug, Default)]
pub struct Registry {
    functions: Vec<RegisteredFunction>,
    by_definition: FxHashMap<(usize, usize), FunctionId>,
    by_name: FxHashMap<String, Vec<Definition>>,
    diagnostics: Vec<RegistryDiagnostic>,
}

impl Registry {
    /// Collect transformable functions from all units.
    pub fn build(units: &[SourceUnit], config: &ObfuscatorConfig) -> Self {
        let mut registry = Registry::default();
        let mut seen: FxHashSet<(OverloadKey, Option<usize>)> = FxHashSet::default();
        let mut legacy_keys: FxHashMap<String, Vec<(Option<usize>, String)>> = FxHashMap::default();
        let mut accepted = Vec::new();
        let referenced = referenced_names(units);

        for (unit_index, unit) in units.iter().enumerate() {
            for node in &unit.program.nodes {
                let AstNode::FunctionDef { header, body, span } = node else {
                    continue;
                };
                let signature = FunctionSignature::from_header(header);
                let key = signature.overload_key();
                let local_to = (header.storage == StorageClass::Static).then_some(unit_index);

                if !seen.insert((key.clone(), local_to)) {
                    registry.diagnostics.push(RegistryDiagnostic::DuplicateDefinition {
                        unit: unit.name.clone(),
                        span: header.name_span,
                        name: header.name.clone(),
                    });
                    continue;
                }

                let mut definition = Definition { key, local_to, id: None };

                if header.name == config.entry_point {
                    registry.by_name.entry(header.name.clone()).or_default().push(definition);
                    continue;
                }

                // A task function no longer has the signature a pointer to it expects.
                if referenced.contains(header.name.as_str()) {
                    registry.diagnostics.push(RegistryDiagnostic::AddressTaken {
                        unit: unit.name.clone(),
                        span: header.name_span,
                        function: header.name.clone(),
                    });
                    registry.by_name.entry(header.name.clone()).or_default().push(definition);
                    continue;
                }

                if let Some(diagnostic) = check_params(unit, header) {
                    registry.diagnostics.push(diagnostic);
                    registry.by_name.entry(header.name.clone()).or_default().push(definition);
                    continue;
                }

                let legacy_key = signature.legacy_key();
                if config.naming == Naming::FirstLetter {
                    let taken = legacy_keys.entry(legacy_key.clone()).or_default();
                    if let Some((_, existing)) = taken.iter().find(|(scope, _)| scopes_overlap(*scope, local_to)) {
                        registry.diagnostics.push(RegistryDiagnostic::KeyCollision {
                            unit: unit.name.clone(),
                            span: header.name_span,
                            key: legacy_key,
                            signature: signature.to_string(),
                            existing: existing.clone(),
                        });
                        registry.by_name.entry(header.name.clone()).or_default().push(definition);
                        continue;
                    }
                    taken.push((local_to, signature.to_string()));
                }

                let id = FunctionId(accepted.len());
                definition.id = Some(id);
                registry.by_name.entry(header.name.clone()).or_default().push(definition);
                registry.by_definition.insert((unit_index, span.start), id);

                let weight = match config.weight {
                    WeightMetric::Lines => unit.text(*span).lines().count().max(1) as u64,
                    WeightMetric::Statements => count_statements(body).max(1),
                };

                accepted.push(RegisteredFunction {
                    id,
                    record_fields: record_fields(&signature),
                    symbol: String::new(),
                    legacy_key,
                    weight,
                    signature,
                    unit: unit_index,
                    file_local: local_to.is_some(),
                    span: *span,
                });
            }
        }

        assign_symbols(&mut accepted, config.naming);
        for function in &accepted {
            debug!(
                symbol = %function.symbol,
                id = function.id.0,
                weight = function.weight,
                "registered {}",
                function.signature
            );
        }
        for diagnostic in &registry.diagnostics {
            warn!("{}", diagnostic);
        }

        registry.functions = accepted;
        registry
    }

    pub fn functions(&self) -> &[RegisteredFunction] {
        &self.functions
    }

    pub fn get(&self, id: FunctionId) -> &RegisteredFunction {
        &self.functions[id.0]
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn diagnostics(&self) -> &[RegistryDiagnostic] {
        &self.diagnostics
    }

    /// Registered entry for the definition at `span` in unit `unit`.
    pub fn definition(&self, unit: usize, span: Span) -> Option<&RegisteredFunction> {
        self.by_definition.get(&(unit, span.start)).map(|id| self.get(*id))
    }

    /// Registered function whose signature a prototype in unit `unit`
    /// declares. The unit's own `static` definition wins over an external one.
    pub fn declared(&self, unit: usize, header: &FunctionHeader) -> Option<&RegisteredFunction> {
        let key = FunctionSignature::from_header(header).overload_key();
        let matching: Vec<&Definition> = self
            .by_name
            .get(&header.name)?
            .iter()
            .filter(|d| d.key == key && d.visible_from(unit))
            .collect();
        matching
            .iter()
            .find(|d| d.local_to.is_some())
            .or_else(|| matching.first())
            .and_then(|d| d.id)
            .map(|id| self.get(id))
    }

    /// Match a call made from unit `unit` by name, arity, then argument
    /// types. `None` entries in `arg_types` are arguments whose type is
    /// unknown.
    pub fn resolve_call(&self, unit: usize, name: &str, arg_types: &[Option<Type>]) -> CallTarget {
        let Some(definitions) = self.by_name.get(name) else {
            return CallTarget::Opaque;
        };
        let visible: Vec<&Definition> = definitions.iter().filter(|d| d.visible_from(unit)).collect();
        if visible.iter().all(|d| d.id.is_none()) {
            return CallTarget::Opaque;
        }

        let mut by_arity: Vec<&Definition> = visible
            .iter()
            .copied()
            .filter(|d| d.key.params.len() == arg_types.len())
            .collect();
        // A unit's own static function hides external ones of the same name.
        if by_arity.iter().any(|d| d.local_to.is_some()) {
            by_arity.retain(|d| d.local_to.is_some());
        }

        let chosen = match by_arity.len() {
            0 => {
                return CallTarget::NoMatch {
                    candidates: visible.len(),
                }
            }
            1 => by_arity[0],
            _ => {
                let exact: Vec<&Definition> = by_arity
                    .iter()
                    .copied()
                    .filter(|d| {
                        d.key
                            .params
                            .iter()
                            .zip(arg_types)
                            .all(|(p, a)| a.as_ref().is_some_and(|a| a.overload_key() == *p))
                    })
                    .collect();
                if exact.len() == 1 {
                    exact[0]
                } else {
                    let loose: Vec<&Definition> = by_arity
                        .iter()
                        .copied()
                        .filter(|d| d.key.params.iter().zip(arg_types).all(|(p, a)| loosely_accepts(p, a)))
                        .collect();
                    match loose.len() {
                        1 => loose[0],
                        0 => {
                            return CallTarget::NoMatch {
                                candidates: by_arity.len(),
                            }
                        }
                        n => return CallTarget::Ambiguous { candidates: n },
                    }
                }
            }
        };

        match chosen.id {
            Some(id) => CallTarget::Registered(id),
            None => CallTarget::Opaque,
        }
    }
}

/// Argument of type `arg` could be passed to a parameter of type `param`
fn loosely_accepts(param: &Type, arg: &Option<Type>) -> bool {
    let Some(arg) = arg else {
        return true;
    };
    let arg = arg.overload_key();
    if param.is_arithmetic() && arg.is_arithmetic() {
        return true;
    }
    param.pointer_depth == arg.pointer_depth && (param.base == arg.base || arg.base == BaseType::Void)
}

fn check_params(unit: &SourceUnit, header: &FunctionHeader) -> Option<RegistryDiagnostic> {
    for param in &header.params {
        if param.name.is_empty() {
            return Some(RegistryDiagnostic::UnnamedParameter {
                unit: unit.name.clone(),
                span: param.span,
                function: header.name.clone(),
            });
        }
        if param.name == RETURN_FIELD || param.name == DONE_FIELD {
            return Some(RegistryDiagnostic::ReservedParameterName {
                unit: unit.name.clone(),
                span: param.span,
                function: header.name.clone(),
                param: param.name.clone(),
            });
        }
    }
    None
}

fn record_fields(signature: &FunctionSignature) -> Vec<RecordField> {
    let mut fields: Vec<RecordField> = signature
        .params
        .iter()
        .map(|(ty, name)| RecordField {
            name: name.clone(),
            ty: assignable(ty),
            kind: FieldKind::Param,
        })
        .collect();

    if signature.returns_value() {
        fields.push(RecordField {
            name: RETURN_FIELD.to_string(),
            ty: assignable(&signature.return_type),
            kind: FieldKind::ReturnValue,
        });
        fields.push(RecordField {
            name: DONE_FIELD.to_string(),
            ty: Type::new(BaseType::Bool),
            kind: FieldKind::Done,
        });
    }
    fields
}

/// Record fields are written once per call, so top-level `const` goes.
fn assignable(ty: &Type) -> Type {
    let mut ty = ty.decayed();
    if ty.pointer_depth == 0 {
        ty.is_const = false;
    }
    ty
}

/// Names used as values anywhere in the program, e.g. `atexit(report)`.
fn referenced_names(units: &[SourceUnit]) -> FxHashSet<&str> {
    let mut names = FxHashSet::default();
    for unit in units {
        for node in &unit.program.nodes {
            node.walk(&mut |node| {
                if let AstNode::Variable(name, _) = node {
                    names.insert(name.as_str());
                }
            });
        }
    }
    names
}

/// Plain name when unique; otherwise a signature-derived name. File-local
/// functions that still clash get their unit index appended.
fn assign_symbols(functions: &mut [RegisteredFunction], naming: Naming) {
    let mut counts: FxHashMap<String, usize> = FxHashMap::default();
    for function in functions.iter() {
        *counts.entry(function.signature.name.clone()).or_default() += 1;
    }

    for function in functions.iter_mut() {
        function.symbol = if counts[&function.signature.name] == 1 {
            function.signature.name.clone()
        } else {
            match naming {
                Naming::Signature => function.signature.mangled(),
                Naming::FirstLetter => function.legacy_key.clone(),
            }
        };
    }

    let mut uses: FxHashMap<String, usize> = FxHashMap::default();
    for function in functions.iter() {
        *uses.entry(function.symbol.clone()).or_default() += 1;
    }
    for function in functions.iter_mut() {
        if function.file_local && uses[&function.symbol] > 1 {
            function.symbol = format!("{}_u{}", function.symbol, function.unit);
        }
    }
}

/// Operators, calls, references and control statements in a body
pub fn count_statements(body: &AstNode) -> u64 {
    let mut count = 0;
    body.walk(&mut |node| {
        count += match node {
            // A call also counts the reference to its callee
            AstNode::FunctionCall { .. } => 2,
            AstNode::BinaryOp { .. }
            | AstNode::Assignment { .. }
            | AstNode::Variable(..)
            | AstNode::If { .. }
            | AstNode::For { .. }
            | AstNode::While { .. }
            | AstNode::Switch { .. }
            | AstNode::Return { .. } => 1,
            _ => 0,
        };
    });
    count
}

#[cfg(test)]
mod tests {
    use super::*;


    fn build(src: &str, config: &ObfuscatorConfig) -> Registry {
        let unit = SourceUnit::parse("unit.c", src).unwrap();
        Registry::build(&[unit], config)
    }

    #[test]
    fn test_registers_defined_functions_only() {
        let src = r#"
            int helper(int x);
            int funcA(int x) { return x + 1; }
            void funcB(void) { funcA(2); }
            int main() { return funcA(1); }
        "#;
        let registry = build(src, &ObfuscatorConfig::default());

        let names: Vec<_> = registry.functions().iter().map(|f| f.symbol.as_str()).collect();
        assert_eq!(names, vec!["funcA", "funcB"]);
        assert!(registry.diagnostics().is_empty());

        let a = &registry.functions()[0];
        let fields: Vec<_> = a.record_fields.iter().map(|f| (f.name.as_str(), f.kind)).collect();
        assert_eq!(
            fields,
            vec![("x", FieldKind::Param), ("return_var", FieldKind::ReturnValue), ("done", FieldKind::Done)]
        );
        assert!(registry.functions()[1].record_fields.is_empty());
    }

    #[test]
    fn test_entry_point_and_prototypes_are_opaque() {
        let src = "int helper(int x);\nint main() { return helper(1); }";
        let registry = build(src, &ObfuscatorConfig::default());
        assert!(registry.is_empty());
        assert_eq!(registry.resolve_call(0, "main", &[]), CallTarget::Opaque);
        assert_eq!(registry.resolve_call(0, "helper", &[None]), CallTarget::Opaque);
        assert_eq!(registry.resolve_call(0, "printf", &[None]), CallTarget::Opaque);
    }

    #[test]
    fn test_overloads_resolve_by_type() {
        let src = r#"
            int add(int a, int b) { return a + b; }
            double add(double a, double b) { return a + b; }
        "#;
        let registry = build(src, &ObfuscatorConfig::default());
        let symbols: Vec<_> = registry.functions().iter().map(|f| f.symbol.clone()).collect();
        assert_eq!(symbols, vec!["add__int_int", "add__double_double"]);

        let int = Some(Type::new(BaseType::Int));
        let double = Some(Type::new(BaseType::Double));
        assert_eq!(registry.resolve_call(0, "add", &[int.clone(), int.clone()]), CallTarget::Registered(FunctionId(0)));
        assert_eq!(
            registry.resolve_call(0, "add", &[double.clone(), double]),
            CallTarget::Registered(FunctionId(1))
        );
        assert_eq!(registry.resolve_call(0, "add", &[None, None]), CallTarget::Ambiguous { candidates: 2 });
        assert_eq!(registry.resolve_call(0, "add", &[int]), CallTarget::NoMatch { candidates: 2 });
    }

    #[test]
    fn test_first_letter_collision_is_reported() {
        let src = r#"
            struct Apple { int a; };
            struct Avocado { int b; };
            int pick(struct Apple *x) { return 1; }
            int pick(struct Avocado *x) { return 2; }
        "#;
        let config = ObfuscatorConfig::builder().naming(Naming::FirstLetter).build();
        let registry = build(src, &config);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.functions()[0].symbol, "pick");
        assert!(matches!(
            &registry.diagnostics()[0],
            RegistryDiagnostic::KeyCollision { key, .. } if key == "pick_s"
        ));
    }

    #[test]
    fn test_reserved_and_duplicate_definitions() {
        let src = r#"
            int f(int done) { return done; }
            int g(int x) { return x; }
            int g(int y) { return y; }
        "#;
        let registry = build(src, &ObfuscatorConfig::default());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.diagnostics().len(), 2);
        assert!(matches!(registry.diagnostics()[0], RegistryDiagnostic::ReservedParameterName { .. }));
        assert!(matches!(registry.diagnostics()[1], RegistryDiagnostic::DuplicateDefinition { .. }));
    }

    #[test]
    fn test_weights() {
        let src = "int f(int x)\n{\n  return x + 1;\n}\n";
        let lines = build(src, &ObfuscatorConfig::default());
        assert_eq!(lines.functions()[0].weight, 4);

        let config = ObfuscatorConfig::builder().weight(WeightMetric::Statements).build();
        let statements = build(src, &config);
        // return, +, x
        assert_eq!(statements.functions()[0].weight, 3);
    }

    #[test]
    fn test_static_functions_stay_in_their_unit() {
        let a = SourceUnit::parse("a.c", "static int helper(int x) { return x + 1; }\nint run_a() { return helper(1); }\n").unwrap();
        let b = SourceUnit::parse("b.c", "static int helper(int x) { return x * 100; }\nint main() { return helper(1); }\n").unwrap();
        let c = SourceUnit::parse("c.c", "int other() { return 0; }\n").unwrap();
        let registry = Registry::build(&[a, b, c], &ObfuscatorConfig::default());

        assert!(registry.diagnostics().is_empty());
        let symbols: Vec<_> = registry.functions().iter().map(|f| f.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["helper__int_u0", "run_a", "helper__int_u1", "other"]);

        let int = [Some(Type::new(BaseType::Int))];
        assert_eq!(registry.resolve_call(0, "helper", &int), CallTarget::Registered(FunctionId(0)));
        assert_eq!(registry.resolve_call(1, "helper", &int), CallTarget::Registered(FunctionId(2)));
        assert_eq!(registry.resolve_call(2, "helper", &int), CallTarget::Opaque);
    }

    #[test]
    fn test_static_hides_external_definition() {
        let a = SourceUnit::parse("a.c", "int helper(int x) { return x; }\n").unwrap();
        let b = SourceUnit::parse("b.c", "static int helper(int x) { return -x; }\n").unwrap();
        let registry = Registry::build(&[a, b], &ObfuscatorConfig::default());

        assert_eq!(registry.functions()[0].symbol, "helper__int");
        assert_eq!(registry.functions()[1].symbol, "helper__int_u1");
        assert_eq!(registry.resolve_call(0, "helper", &[None]), CallTarget::Registered(FunctionId(0)));
        assert_eq!(registry.resolve_call(1, "helper", &[None]), CallTarget::Registered(FunctionId(1)));
    }

    #[test]
    fn test_address_taken_functions_stay_opaque() {
        let src = r#"
            void report(void) { }
            int main() { atexit(report); report(); return 0; }
        "#;
        let registry = build(src, &ObfuscatorConfig::default());

        assert!(registry.is_empty());
        assert!(matches!(
            &registry.diagnostics()[0],
            RegistryDiagnostic::AddressTaken { function, .. } if function == "report"
        ));
        assert_eq!(registry.resolve_call(0, "report", &[]), CallTarget::Opaque);
    }
}
