//! Declaration unit
//!
//! Renders `taskfog_records.hpp`, the header every rewritten unit includes
//! first. It carries:
//!
//! - the struct definitions moved out of the units (records may hold them by
//!   value);
//! - the function-id enum, one entry per registered function;
//! - one record type and one record pool per registered function;
//! - prototypes of the task functions;
//! - `taskfog_dispatch`, the switch the runtime calls to run a task;
//! - `taskfog_initialize()`/`taskfog_teardown()` for the entry point.
//!
//! The static glue those pieces build on is [`RUNTIME_HEADER`].

use crate::config::ObfuscatorConfig;
use crate::parser::ast::AstNode;
use crate::parser::SourceUnit;
use crate::registry::{FieldKind, Registry};
use crate::transform::task_signature;
use rustc_hash::FxHashSet;
use std::fmt::Write;

/// File name of the static runtime glue.
pub const RUNTIME_HEADER_NAME: &str = "taskfog_runtime.hpp";

/// Contents of the static runtime glue.
pub const RUNTIME_HEADER: &str = include_str!("../../include/taskfog_runtime.hpp");

pub struct DeclarationUnit<'a> {
    registry: &'a Registry,
    units: &'a [SourceUnit],
    config: &'a ObfuscatorConfig,
}

impl<'a> DeclarationUnit<'a> {
    pub fn new(registry: &'a Registry, units: &'a [SourceUnit], config: &'a ObfuscatorConfig) -> Self {
        Self {
            registry,
            units,
            config,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.config.records_header
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("// Generated by taskfog. Do not edit.\n");
        out.push_str("#pragma once\n\n");
        let _ = writeln!(out, "#include \"{}\"\n", RUNTIME_HEADER_NAME);

        self.render_structs(&mut out);
        self.render_enum(&mut out);
        self.render_records(&mut out);
        self.render_dispatch(&mut out);
        self.render_bootstrap(&mut out);
        out
    }

    /// First definition of each struct name, in unit order.
    fn render_structs(&self, out: &mut String) {
        let mut seen = FxHashSet::default();
        for unit in self.units {
            for node in &unit.program.nodes {
                if let AstNode::StructDef { name, span, .. } = node {
                    if seen.insert(name.as_str()) {
                        out.push_str(unit.text(*span));
                        out.push_str("\n\n");
                    }
                }
            }
        }
    }

    fn render_enum(&self, out: &mut String) {
        out.push_str("enum taskfog_function_id {\n");
        for function in self.registry.functions() {
            let _ = writeln!(out, "    {} = {},", function.enum_name(), function.id.0);
        }
        out.push_str("    TASKFOG_FN_COUNT\n};\n\n");
    }

    fn render_records(&self, out: &mut String) {
        for function in self.registry.functions() {
            let _ = writeln!(out, "// {}", function.signature);
            let _ = writeln!(out, "struct {} {{", function.record_type());
            for field in &function.record_fields {
                match field.kind {
                    FieldKind::Param | FieldKind::ReturnValue => {
                        let _ = writeln!(out, "    {};", field.ty.declare(&field.name));
                    }
                    FieldKind::Done => {}
                }
            }
            let _ = writeln!(out, "    std::atomic<bool> done{{false}};");
            out.push_str("};\n");
            let _ = writeln!(
                out,
                "inline taskfog::RecordPool<{}> {};",
                function.record_type(),
                function.pool_name()
            );
            let _ = writeln!(out, "{};\n", task_signature(function));
        }
    }

    fn render_dispatch(&self, out: &mut String) {
        out.push_str("inline void taskfog_dispatch(int function, int slot, int index) {\n");
        out.push_str("    taskfog::SlotScope tf_scope(slot);\n");
        out.push_str("    switch (function) {\n");
        for function in self.registry.functions() {
            if function.returns_value() {
                let _ = writeln!(
                    out,
                    "    case {}: {}(slot, index); break;",
                    function.enum_name(),
                    function.symbol
                );
            } else {
                let _ = writeln!(
                    out,
                    "    case {}: {}(slot, index); {}.release(index); break;",
                    function.enum_name(),
                    function.symbol,
                    function.pool_name()
                );
            }
        }
        out.push_str("    default: break;\n    }\n}\n\n");
    }

    fn render_bootstrap(&self, out: &mut String) {
        let _ = writeln!(
            out,
            "inline void taskfog_initialize() {{ taskfog::start({}, taskfog_dispatch); }}",
            self.config.workers
        );
        out.push_str("inline void taskfog_teardown() { taskfog::stop(); }\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_records_and_dispatch() {
        let src = r#"
            struct Point { int x; int y; };
            int norm(struct Point p) { return p.x * p.x + p.y * p.y; }
            void log_value(int v) { }
            int main() { struct Point p; p.x = 1; p.y = 2; return norm(p); }
        "#;
        let units = vec![SourceUnit::parse("geo.c", src).unwrap()];
        let config = ObfuscatorConfig::builder().workers(4).build();
        let registry = Registry::build(&units, &config);
        let header = DeclarationUnit::new(&registry, &units, &config).render();

        assert!(header.contains("#include \"taskfog_runtime.hpp\""));
        assert!(header.contains("struct Point { int x; int y; };"));
        assert!(header.contains("TASKFOG_FN_norm = 0,"));
        assert!(header.contains("TASKFOG_FN_log_value = 1,"));
        assert!(header.contains("struct norm_record {\n    struct Point p;\n    int return_var;\n    std::atomic<bool> done{false};\n};"));
        assert!(header.contains("inline taskfog::RecordPool<norm_record> norm_pool;"));
        assert!(header.contains("void norm(int tf_worker_slot, int tf_record_index);"));
        assert!(header.contains("case TASKFOG_FN_log_value: log_value(slot, index); log_value_pool.release(index); break;"));
        assert!(header.contains("taskfog::start(4, taskfog_dispatch)"));
        assert!(!header.contains("TASKFOG_FN_main"));
    }

    #[test]
    fn test_runtime_header_declares_c_abi() {
        assert!(RUNTIME_HEADER.contains("taskfog_runtime_start"));
        assert!(RUNTIME_HEADER.contains("#define TASKFOG_ENTRY_SLOT (-1)"));
    }
}
