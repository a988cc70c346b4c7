//! TypeScript backend

mod decl;
mod expr;
mod methods;
mod stmt;

use crate::backend::{
    CodegenBackend, CodegenDiagnostic, CodegenOptions, CompilationTarget, MemoryModel, Target,
};
use crate::context::{Features, GenerationContext, Scoped};
use crate::registry::MethodRegistry;
use crate::targets::{marker_diagnostics, StmtEmitter};
use crate::Result;
use faber_ast::{builtin, Stmt, TypeExpr, Unit};
use tracing::debug;

const FEATURES: &[&str] = &[
    "async",
    "generators",
    "closures",
    "pattern-matching",
    "resource-scopes",
    "format-strings",
    "collection-filters",
    "object-literals",
];

/// TypeScript code generator backend
pub struct TypeScriptBackend {
    registry: &'static MethodRegistry,
}

impl TypeScriptBackend {
    pub fn new() -> Result<Self> {
        Ok(TypeScriptBackend {
            registry: methods::registry()?,
        })
    }
}

impl CodegenBackend for TypeScriptBackend {
    fn target(&self) -> Target {
        Target::TypeScript
    }

    fn target_info(&self) -> CompilationTarget {
        CompilationTarget {
            target: Target::TypeScript,
            name: "TypeScript".to_string(),
            file_extension: Target::TypeScript.file_extension().to_string(),
            memory: MemoryModel::GarbageCollected,
            supports_async: true,
            supports_generators: true,
            supports_closures: true,
        }
    }

    fn supports_feature(&self, feature: &str) -> bool {
        FEATURES.contains(&feature)
    }

    fn generate_unit(&self, unit: &Unit, options: &CodegenOptions) -> Result<String> {
        debug!(unit = %unit.name, backend = "typescript", "generating unit");
        let mut emitter = TsEmitter::new(options.indent_for(Target::TypeScript), self.registry);
        emitter.ctx.register_unions(&unit.body);

        let body = emitter.top_level(&unit.body)?;
        let preamble = if options.emit_preamble {
            emitter.preamble()
        } else {
            String::new()
        };
        debug!(
            unit = %unit.name,
            backend = "typescript",
            features = ?emitter.ctx.features(),
            "generated unit"
        );

        if preamble.is_empty() {
            Ok(body)
        } else {
            Ok(format!("{preamble}\n{body}"))
        }
    }

    fn validate_output(&self, code: &str) -> Vec<CodegenDiagnostic> {
        marker_diagnostics(code, methods::MARKER)
    }
}

pub(crate) struct TsEmitter {
    ctx: GenerationContext,
    registry: &'static MethodRegistry,
}

impl TsEmitter {
    fn new(indent: usize, registry: &'static MethodRegistry) -> Self {
        TsEmitter {
            ctx: GenerationContext::new(indent),
            registry,
        }
    }

    /// Imports and helpers the body asked for
    fn preamble(&self) -> String {
        let features = self.ctx.features();
        let unit = " ".repeat(self.ctx.indent_width());
        let mut imports = Vec::new();
        let mut helpers = Vec::new();

        if features.contains(Features::TESTING) {
            imports.push("import { describe, test } from \"node:test\";".to_string());
        }
        if features.contains(Features::STDIN) {
            imports.push("import { readFileSync } from \"node:fs\";".to_string());
            helpers.push(format!(
                "const __stdin = readFileSync(0, \"utf8\").split(\"\\n\");\n\
                 let __stdinLine = 0;\n\
                 function __lege(): string {{\n\
                 {unit}const rest = __stdin.slice(__stdinLine).join(\"\\n\");\n\
                 {unit}__stdinLine = __stdin.length;\n\
                 {unit}return rest;\n\
                 }}\n\
                 function __legeLineam(): string {{\n\
                 {unit}return __stdin[__stdinLine++] ?? \"\";\n\
                 }}\n"
            ));
        }
        if features.contains(Features::SCOPE_GUARD) {
            helpers.push(format!(
                "function __scope<T extends object>(resource: T, release: string): T & Disposable {{\n\
                 {unit}return Object.assign(resource, {{\n\
                 {unit}{unit}[Symbol.dispose]: () => (resource as any)[release](),\n\
                 {unit}}});\n\
                 }}\n"
            ));
        }

        let mut out = String::new();
        if !imports.is_empty() {
            out.push_str(&imports.join("\n"));
            out.push('\n');
        }
        for helper in helpers {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&helper);
        }
        out
    }
}

impl Scoped for TsEmitter {
    fn context(&mut self) -> &mut GenerationContext {
        &mut self.ctx
    }
}

impl StmtEmitter for TsEmitter {
    fn stmt(&mut self, stmt: &Stmt) -> Result<String> {
        self.emit_stmt(stmt)
    }
}

fn needs_array_wrapper(ty: &TypeExpr) -> bool {
    matches!(
        ty,
        TypeExpr::Nullable { .. } | TypeExpr::Function { .. } | TypeExpr::Union { .. }
    )
}

pub(crate) fn render_type(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Named { name, args: raw } => {
            let args: Vec<String> = raw.iter().map(render_type).collect();
            match (name.as_str(), raw.as_slice()) {
                (builtin::LIST, [element]) if needs_array_wrapper(element) => {
                    format!("Array<{}>", args[0])
                }
                (builtin::LIST, [_]) => format!("{}[]", args[0]),
                (builtin::LIST, _) => "unknown[]".to_string(),
                (_, []) => simple_type(name).to_string(),
                (_, _) => format!("{}<{}>", simple_type(name), args.join(", ")),
            }
        }
        TypeExpr::Nullable { inner } => format!("{} | null", render_type(inner)),
        TypeExpr::Function { params, ret } => {
            let params: Vec<String> = params
                .iter()
                .enumerate()
                .map(|(i, param)| format!("arg{}: {}", i, render_type(param)))
                .collect();
            format!("({}) => {}", params.join(", "), render_type(ret))
        }
        TypeExpr::Union { members } => members
            .iter()
            .map(render_type)
            .collect::<Vec<_>>()
            .join(" | "),
        TypeExpr::Literal { value } => value.clone(),
    }
}

fn simple_type(name: &str) -> &str {
    match name {
        builtin::TEXT => "string",
        builtin::NUMBER | builtin::FLOAT => "number",
        builtin::BOOL => "boolean",
        builtin::NIL => "null",
        builtin::VOID => "void",
        builtin::UNKNOWN => "unknown",
        builtin::ANY => "any",
        builtin::BYTES => "Uint8Array",
        builtin::LIST => "Array",
        builtin::MAP => "Map",
        builtin::SET => "Set",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faber_ast::{AllocatorKind, AstBuilder, MathConstant, StructureKind};

    fn emit(body: Vec<Stmt>) -> String {
        let unit = Unit::new("probatio", body);
        TypeScriptBackend::new()
            .unwrap()
            .generate_unit(&unit, &CodegenOptions::default())
            .unwrap()
    }

    #[test]
    fn test_types() {
        let b = AstBuilder::new();
        assert_eq!(render_type(&b.list_of(b.ty("textus"))), "string[]");
        assert_eq!(
            render_type(&b.list_of(TypeExpr::nullable(b.ty("numerus")))),
            "Array<number | null>"
        );
        assert_eq!(
            render_type(&TypeExpr::generic("tabula", vec![b.ty("textus"), b.ty("numerus")])),
            "Map<string, number>"
        );
    }

    #[test]
    fn test_method_call_through_registry() {
        let b = AstBuilder::new();
        let code = emit(vec![b.expr_stmt(b.method(
            b.ident("xs"),
            "adde",
            vec![b.int(1)],
            StructureKind::Sequence,
        ))]);
        assert_eq!(code, "xs.push(1);\n");
    }

    #[test]
    fn test_unknown_method_is_unsupported() {
        let b = AstBuilder::new();
        let unit = Unit::new(
            "probatio",
            vec![b.expr_stmt(b.method(b.ident("xs"), "frange", vec![], StructureKind::Sequence))],
        );
        let err = TypeScriptBackend::new()
            .unwrap()
            .generate_unit(&unit, &CodegenOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("method lista.frange"));
    }

    #[test]
    fn test_allocator_scope_is_plain_block() {
        let b = AstBuilder::new();
        let code = emit(vec![b.allocator_scope(
            AllocatorKind::Arena,
            Some("alloc"),
            vec![b.scribe(vec![b.int(1)])],
        )]);
        assert_eq!(code, "{\n    console.log(1);\n}\n");
    }

    #[test]
    fn test_sibling_allocator_scopes_keep_their_bindings() {
        let b = AstBuilder::new();
        let scope = |value| {
            b.allocator_scope(
                AllocatorKind::Arena,
                None,
                vec![b.fixum("x", None, b.int(value)), b.scribe(vec![b.ident("x")])],
            )
        };
        let code = emit(vec![scope(1), scope(2)]);
        assert_eq!(
            code,
            "{\n    const x = 1;\n    console.log(x);\n}\n{\n    const x = 2;\n    console.log(x);\n}\n"
        );
    }

    #[test]
    fn test_math_constant() {
        let b = AstBuilder::new();
        let code = emit(vec![b.fixum("tau", None, b.constant(MathConstant::Tau))]);
        assert_eq!(code, "const tau = (2 * Math.PI);\n");
    }

    #[test]
    fn test_stdin_preamble_emitted_once() {
        let b = AstBuilder::new();
        let code = emit(vec![
            b.fixum("a", None, b.read_line()),
            b.fixum("b", None, b.read_line()),
        ]);
        assert_eq!(code.matches("import { readFileSync }").count(), 1);
        assert!(code.ends_with("const a = __legeLineam();\nconst b = __legeLineam();\n"));
    }
}
