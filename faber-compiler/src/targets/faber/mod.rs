//! Canonical Faber output
//!
//! Re-emits the surface syntax with normalised spacing and four-space
//! indentation. Nothing is lowered: resource scopes, pattern matches and
//! built-in method calls come back exactly as written, so the output can be
//! fed to the parser again.

mod decl;
mod expr;
mod stmt;

use crate::backend::{CodegenBackend, CodegenOptions, CompilationTarget, MemoryModel, Target};
use crate::context::{GenerationContext, Scoped};
use crate::targets::StmtEmitter;
use crate::Result;
use faber_ast::{Stmt, TypeExpr, Unit};
use tracing::debug;

const FEATURES: &[&str] = &[
    "async",
    "generators",
    "closures",
    "pattern-matching",
    "resource-scopes",
    "format-strings",
    "collection-filters",
];

/// Backend that round-trips Faber source
#[derive(Debug, Default)]
pub struct FaberBackend;

impl FaberBackend {
    pub fn new() -> Self {
        FaberBackend
    }
}

impl CodegenBackend for FaberBackend {
    fn target(&self) -> Target {
        Target::Faber
    }

    fn target_info(&self) -> CompilationTarget {
        CompilationTarget {
            target: Target::Faber,
            name: "Faber".to_string(),
            file_extension: Target::Faber.file_extension().to_string(),
            memory: MemoryModel::Source,
            supports_async: true,
            supports_generators: true,
            supports_closures: true,
        }
    }

    fn supports_feature(&self, feature: &str) -> bool {
        FEATURES.contains(&feature)
    }

    fn generate_unit(&self, unit: &Unit, options: &CodegenOptions) -> Result<String> {
        debug!(unit = %unit.name, backend = "faber", "generating unit");
        let mut emitter = FaberEmitter::new(options.indent_for(Target::Faber));
        let output = emitter.top_level(&unit.body)?;
        debug!(unit = %unit.name, backend = "faber", bytes = output.len(), "generated unit");
        Ok(output)
    }
}

pub(crate) struct FaberEmitter {
    ctx: GenerationContext,
}

impl FaberEmitter {
    pub(crate) fn new(indent: usize) -> Self {
        FaberEmitter {
            ctx: GenerationContext::new(indent),
        }
    }
}

impl Scoped for FaberEmitter {
    fn context(&mut self) -> &mut GenerationContext {
        &mut self.ctx
    }
}

impl StmtEmitter for FaberEmitter {
    fn stmt(&mut self, stmt: &Stmt) -> Result<String> {
        self.emit_stmt(stmt)
    }
}

pub(crate) fn render_type(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Named { name, args } if args.is_empty() => name.clone(),
        TypeExpr::Named { name, args } => {
            let args: Vec<String> = args.iter().map(render_type).collect();
            format!("{}<{}>", name, args.join(", "))
        }
        TypeExpr::Nullable { inner } => format!("{}?", render_type(inner)),
        TypeExpr::Function { params, ret } => {
            let params: Vec<String> = params.iter().map(render_type).collect();
            format!("({}) -> {}", params.join(", "), render_type(ret))
        }
        TypeExpr::Union { members } => members
            .iter()
            .map(render_type)
            .collect::<Vec<_>>()
            .join(" | "),
        TypeExpr::Literal { value } => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faber_ast::{AllocatorKind, AstBuilder, BinaryOp, ConversionKind, Radix};

    fn emit(body: Vec<Stmt>) -> String {
        let unit = Unit::new("probatio", body);
        FaberBackend::new()
            .generate_unit(&unit, &CodegenOptions::default())
            .unwrap()
    }

    #[test]
    fn test_variable_and_function() {
        let b = AstBuilder::new();
        let mut add = b.function(
            "adde",
            vec![b.param("a", "numerus"), b.param("b", "numerus")],
            Some(b.ty("numerus")),
            vec![b.redde(Some(b.binary(BinaryOp::Add, b.ident("a"), b.ident("b"))))],
        );
        add.is_public = true;
        let code = emit(vec![
            b.fixum("x", Some(b.ty("numerus")), b.int(1)),
            Stmt::Function(add),
        ]);
        assert_eq!(
            code,
            "fixum x: numerus = 1\n\n@ publica\nfunctio adde(numerus a, numerus b) -> numerus {\n    redde a + b\n}\n"
        );
    }

    #[test]
    fn test_conversion_keeps_radix_annotation() {
        let b = AstBuilder::new();
        let code = emit(vec![b.expr_stmt(b.conversion(
            b.text("ff"),
            ConversionKind::Integer,
            Some(Radix::Hex),
            Some(b.int(0)),
        ))]);
        assert_eq!(code, "\"ff\" numeratum<Hex> vel 0\n");
    }

    #[test]
    fn test_if_else_chain() {
        let b = AstBuilder::new();
        let inner = b.if_else(b.ident("b"), vec![b.scribe(vec![b.int(2)])], Some(vec![]));
        let outer = b.if_else(b.ident("a"), vec![b.scribe(vec![b.int(1)])], None);
        let outer = match outer {
            Stmt::If {
                cond, then, span, ..
            } => Stmt::If {
                cond,
                then,
                otherwise: Some(Box::new(inner)),
                span,
            },
            other => other,
        };
        assert_eq!(
            emit(vec![outer]),
            "si a {\n    scribe 1\n} secus si b {\n    scribe 2\n} secus {}\n"
        );
    }

    #[test]
    fn test_scope_and_match_are_not_lowered() {
        let b = AstBuilder::new();
        let code = emit(vec![
            b.allocator_scope(AllocatorKind::Arena, Some("alloc"), vec![]),
            b.discerne(
                b.ident("forma"),
                Some("Forma"),
                vec![
                    b.arm("Circulus", &["radius"], vec![b.scribe(vec![b.ident("radius")])]),
                    b.wildcard_arm(vec![]),
                ],
            ),
        ]);
        assert_eq!(
            code,
            "cura arena fixum alloc {}\ndiscerne forma {\n    casu Circulus(radius) {\n        scribe radius\n    }\n    casu _ {}\n}\n"
        );
    }

    #[test]
    fn test_nested_types() {
        let ty = TypeExpr::Function {
            params: vec![TypeExpr::generic("lista", vec![TypeExpr::named("textus")])],
            ret: Box::new(TypeExpr::nullable(TypeExpr::named("numerus"))),
        };
        assert_eq!(render_type(&ty), "(lista<textus>) -> numerus?");
    }
}
