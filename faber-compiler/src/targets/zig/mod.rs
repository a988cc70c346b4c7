//! Zig backend
//!
//! Targets Zig 0.13. Loose statements are hoisted into `pub fn main`.
//! Growing operations take an allocator explicitly: the innermost `cura`
//! allocator when one is open, otherwise the module-level `allocator` the
//! preamble declares. Allocation failure panics. Zig has no closures,
//! exceptions or async, so those constructs fail translation.

mod decl;
mod expr;
mod methods;
mod stmt;

use crate::backend::{
    CodegenBackend, CodegenDiagnostic, CodegenOptions, CompilationTarget, MemoryModel, Target,
};
use crate::context::{Features, GenerationContext, Scoped};
use crate::registry::MethodRegistry;
use crate::targets::{marker_diagnostics, ModuleLayout, StmtEmitter};
use crate::{CodegenError, Result};
use faber_ast::{builtin, Stmt, TypeExpr, Unit};
use std::collections::HashMap;
use tracing::debug;

const FEATURES: &[&str] = &["pattern-matching", "resource-scopes", "format-strings", "allocators"];

/// Zig code generator backend
pub struct ZigBackend {
    registry: &'static MethodRegistry,
}

impl ZigBackend {
    pub fn new() -> Result<Self> {
        Ok(ZigBackend {
            registry: methods::registry()?,
        })
    }
}

impl CodegenBackend for ZigBackend {
    fn target(&self) -> Target {
        Target::Zig
    }

    fn target_info(&self) -> CompilationTarget {
        CompilationTarget {
            target: Target::Zig,
            name: "Zig".to_string(),
            file_extension: Target::Zig.file_extension().to_string(),
            memory: MemoryModel::ExplicitAllocator,
            supports_async: false,
            supports_generators: false,
            supports_closures: false,
        }
    }

    fn supports_feature(&self, feature: &str) -> bool {
        FEATURES.contains(&feature)
    }

    fn generate_unit(&self, unit: &Unit, options: &CodegenOptions) -> Result<String> {
        debug!(unit = %unit.name, backend = "zig", "generating unit");
        let mut emitter = ZigEmitter::new(options.indent_for(Target::Zig), self.registry);
        emitter.ctx.register_unions(&unit.body);
        emitter.register_enums(&unit.body);

        let body = emitter.module(&unit.body)?;
        let preamble = if options.emit_preamble {
            emitter.preamble()
        } else {
            String::new()
        };
        debug!(
            unit = %unit.name,
            backend = "zig",
            features = ?emitter.ctx.features(),
            "generated unit"
        );

        if preamble.is_empty() {
            Ok(body)
        } else if body.is_empty() {
            Ok(preamble)
        } else {
            Ok(format!("{preamble}\n{body}"))
        }
    }

    fn validate_output(&self, code: &str) -> Vec<CodegenDiagnostic> {
        marker_diagnostics(code, methods::MARKER)
    }
}

pub(crate) struct ZigEmitter {
    ctx: GenerationContext,
    registry: &'static MethodRegistry,
    /// Member names of every enum declared in the unit
    enums: HashMap<String, Vec<String>>,
    /// Name of the suite whose tests are being emitted
    suite: Option<String>,
}

impl ZigEmitter {
    fn new(indent: usize, registry: &'static MethodRegistry) -> Self {
        ZigEmitter {
            ctx: GenerationContext::new(indent),
            registry,
            enums: HashMap::new(),
            suite: None,
        }
    }

    fn register_enums(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match stmt {
                Stmt::Enum(decl) => {
                    let members = decl.members.iter().map(|m| m.name.clone()).collect();
                    self.enums.insert(decl.name.clone(), members);
                }
                Stmt::TestSuite { body, .. } => self.register_enums(body),
                _ => {}
            }
        }
    }

    /// Container-level declarations, then `pub fn main` holding everything else
    fn module(&mut self, stmts: &[Stmt]) -> Result<String> {
        if let Some(span) = stmts.iter().find_map(|stmt| match stmt {
            Stmt::Entry { is_async: true, span, .. } => Some(*span),
            _ => None,
        }) {
            return Err(CodegenError::unsupported(span, Target::Zig, "incipiet (async entry)"));
        }
        let layout = ModuleLayout::split(stmts);
        let mut out = self.items(&layout.items)?;
        if !layout.needs_main() {
            return Ok(out);
        }
        if !out.is_empty() {
            out.push('\n');
        }
        let main = &layout.main;
        if main.is_empty() {
            out.push_str(&self.ctx.line("pub fn main() void {}"));
            return Ok(out);
        }
        out.push_str(&self.ctx.line("pub fn main() void {"));
        out.push_str(&self.indented(|this| {
            let mut body = String::new();
            for stmt in main {
                body.push_str(&this.stmt(stmt)?);
            }
            Ok(body)
        })?);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    pub(crate) fn render_type(&mut self, ty: &TypeExpr) -> String {
        match ty {
            TypeExpr::Named { name, args } => {
                let mut args: Vec<String> = args.iter().map(|arg| self.render_type(arg)).collect();
                match name.as_str() {
                    builtin::TEXT => "[]const u8".to_string(),
                    builtin::NUMBER => "i64".to_string(),
                    builtin::FLOAT => "f64".to_string(),
                    builtin::BOOL => "bool".to_string(),
                    builtin::NIL | builtin::VOID => "void".to_string(),
                    builtin::BYTES => "[]u8".to_string(),
                    builtin::UNKNOWN | builtin::ANY => "anytype".to_string(),
                    builtin::LIST => {
                        let element = args.pop().unwrap_or_else(|| "anytype".to_string());
                        format!("std.ArrayListUnmanaged({element})")
                    }
                    builtin::MAP => {
                        let value = args.pop().unwrap_or_else(|| "anytype".to_string());
                        match args.pop().as_deref() {
                            None | Some("[]const u8") => format!("std.StringHashMapUnmanaged({value})"),
                            Some(key) => format!("std.AutoHashMapUnmanaged({key}, {value})"),
                        }
                    }
                    builtin::SET => match args.pop().as_deref() {
                        None | Some("[]const u8") => "std.StringHashMapUnmanaged(void)".to_string(),
                        Some(element) => format!("std.AutoHashMapUnmanaged({element}, void)"),
                    },
                    other if args.is_empty() => other.to_string(),
                    other => format!("{}({})", other, args.join(", ")),
                }
            }
            TypeExpr::Nullable { inner } => format!("?{}", self.render_type(inner)),
            TypeExpr::Function { params, ret } => {
                let params: Vec<String> = params.iter().map(|p| self.render_type(p)).collect();
                format!("*const fn ({}) {}", params.join(", "), self.render_type(ret))
            }
            TypeExpr::Union { .. } => "anytype".to_string(),
            TypeExpr::Literal { value } => {
                if value.starts_with('"') {
                    "[]const u8".to_string()
                } else if value == "verum" || value == "falsum" || value == "true" || value == "false" {
                    "bool".to_string()
                } else if value.contains('.') {
                    "f64".to_string()
                } else {
                    "i64".to_string()
                }
            }
        }
    }

    /// Allocator for a growing operation; falls back to the module binding
    fn allocator(&mut self) -> String {
        match self.ctx.current_allocator() {
            Some(name) => name,
            None => {
                self.ctx.require(Features::DEFAULT_ALLOCATOR);
                "allocator".to_string()
            }
        }
    }

    /// `std` import, the module allocator and input helpers
    fn preamble(&self) -> String {
        let features = self.ctx.features();
        let unit = " ".repeat(self.ctx.indent_width());
        let mut out = String::from("const std = @import(\"std\");\n");
        if features.intersects(Features::DEFAULT_ALLOCATOR | Features::STDIN) {
            out.push('\n');
            out.push_str("const allocator = std.heap.page_allocator;\n");
        }
        if features.contains(Features::STDIN) {
            out.push_str(&format!(
                "\n\
                 fn __lege() []const u8 {{\n\
                 {unit}return std.io.getStdIn().reader().readAllAlloc(allocator, std.math.maxInt(usize)) catch @panic(\"OOM\");\n\
                 }}\n\
                 \n\
                 fn __legeLineam() []const u8 {{\n\
                 {unit}const line = std.io.getStdIn().reader().readUntilDelimiterAlloc(allocator, '\\n', std.math.maxInt(usize)) catch return \"\";\n\
                 {unit}return std.mem.trimRight(u8, line, \"\\r\");\n\
                 }}\n"
            ));
        }
        out
    }
}

impl Scoped for ZigEmitter {
    fn context(&mut self) -> &mut GenerationContext {
        &mut self.ctx
    }
}

impl StmtEmitter for ZigEmitter {
    fn stmt(&mut self, stmt: &Stmt) -> Result<String> {
        self.emit_stmt(stmt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faber_ast::{AllocatorKind, AstBuilder, MathConstant, StructureKind};

    fn emit(body: Vec<Stmt>) -> String {
        let unit = Unit::new("probatio", body);
        ZigBackend::new()
            .unwrap()
            .generate_unit(&unit, &CodegenOptions::default())
            .unwrap()
    }

    #[test]
    fn test_types() {
        let b = AstBuilder::new();
        let mut emitter = ZigEmitter::new(4, methods::registry().unwrap());
        assert_eq!(
            emitter.render_type(&b.list_of(b.ty("numerus"))),
            "std.ArrayListUnmanaged(i64)"
        );
        assert_eq!(
            emitter.render_type(&TypeExpr::generic("tabula", vec![b.ty("textus"), b.ty("fractus")])),
            "std.StringHashMapUnmanaged(f64)"
        );
        assert_eq!(emitter.render_type(&TypeExpr::nullable(b.ty("textus"))), "?[]const u8");
    }

    #[test]
    fn test_unused_arena_is_discarded() {
        let b = AstBuilder::new();
        let code = emit(vec![b.allocator_scope(AllocatorKind::Arena, Some("alloc"), vec![])]);
        assert_eq!(
            code,
            "const std = @import(\"std\");\n\
             \n\
             pub fn main() void {\n    \
             {\n        \
             var arena = std.heap.ArenaAllocator.init(std.heap.page_allocator);\n        \
             defer arena.deinit();\n        \
             const alloc = arena.allocator();\n        \
             _ = alloc;\n    \
             }\n\
             }\n"
        );
    }

    #[test]
    fn test_call_outside_scope_uses_module_allocator() {
        let b = AstBuilder::new();
        let code = emit(vec![b.expr_stmt(b.method(
            b.ident("xs"),
            "adde",
            vec![b.int(3)],
            StructureKind::Sequence,
        ))]);
        assert_eq!(
            code,
            "const std = @import(\"std\");\n\
             \n\
             const allocator = std.heap.page_allocator;\n\
             \n\
             pub fn main() void {\n    \
             xs.append(allocator, 3) catch @panic(\"OOM\");\n\
             }\n"
        );
    }

    #[test]
    fn test_call_inside_scope_uses_scope_allocator() {
        let b = AstBuilder::new();
        let code = emit(vec![b.allocator_scope(
            AllocatorKind::Page,
            Some("mem"),
            vec![b.expr_stmt(b.method(b.ident("xs"), "adde", vec![b.int(3)], StructureKind::Sequence))],
        )]);
        assert!(code.contains("const mem = std.heap.page_allocator;\n        xs.append(mem, 3) catch @panic(\"OOM\");\n    }\n"));
        assert!(!code.contains("_ = mem;"));
        assert!(!code.contains("const allocator"));
    }

    #[test]
    fn test_math_constant() {
        let b = AstBuilder::new();
        let code = emit(vec![b.fixum("p", None, b.constant(MathConstant::Pi))]);
        assert!(code.ends_with("pub fn main() void {\n    const p = std.math.pi;\n}\n"));
    }
}
