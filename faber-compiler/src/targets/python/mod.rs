//! Python backend
//!
//! Targets Python 3.12: generics use the bracket syntax and aliases use
//! `type`. Tagged unions become `TypedDict` variants discriminated by their
//! tag key, so a match statement destructures them as mappings.

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
use std::collections::BTreeSet;
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

/// Python code generator backend
pub struct PythonBackend {
    registry: &'static MethodRegistry,
}

impl PythonBackend {
    pub fn new() -> Result<Self> {
        Ok(PythonBackend {
            registry: methods::registry()?,
        })
    }
}

impl CodegenBackend for PythonBackend {
    fn target(&self) -> Target {
        Target::Python
    }

    fn target_info(&self) -> CompilationTarget {
        CompilationTarget {
            target: Target::Python,
            name: "Python".to_string(),
            file_extension: Target::Python.file_extension().to_string(),
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
        debug!(unit = %unit.name, backend = "python", "generating unit");
        let mut emitter = PyEmitter::new(options.indent_for(Target::Python), self.registry);
        emitter.ctx.register_unions(&unit.body);

        let body = emitter.top_level(&unit.body)?;
        let preamble = if options.emit_preamble {
            emitter.preamble()
        } else {
            String::new()
        };
        debug!(
            unit = %unit.name,
            backend = "python",
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

pub(crate) struct PyEmitter {
    ctx: GenerationContext,
    registry: &'static MethodRegistry,
    /// Names imported from `typing`
    typing: BTreeSet<&'static str>,
    /// Set while emitting the members of a test class
    in_suite: bool,
}

impl PyEmitter {
    fn new(indent: usize, registry: &'static MethodRegistry) -> Self {
        PyEmitter {
            ctx: GenerationContext::new(indent),
            registry,
            typing: BTreeSet::new(),
            in_suite: false,
        }
    }

    fn typing(&mut self, name: &'static str) -> &'static str {
        self.ctx.require(Features::TYPING);
        self.typing.insert(name);
        name
    }

    /// Statements one level deeper, `pass` when they produce nothing
    fn suite(&mut self, stmts: &[Stmt]) -> Result<String> {
        self.indented(|this| {
            let body = this.stmts(stmts)?;
            if body.is_empty() {
                Ok(this.ctx.line("pass"))
            } else {
                Ok(body)
            }
        })
    }

    /// A header line followed by its suite
    fn compound(&mut self, header: &str, stmts: &[Stmt]) -> Result<String> {
        let mut out = self.ctx.line(&format!("{header}:"));
        out.push_str(&self.suite(stmts)?);
        Ok(out)
    }

    pub(crate) fn render_type(&mut self, ty: &TypeExpr) -> String {
        match ty {
            TypeExpr::Named { name, args } => {
                let base = match name.as_str() {
                    builtin::TEXT => "str",
                    builtin::NUMBER => "int",
                    builtin::FLOAT => "float",
                    builtin::BOOL => "bool",
                    builtin::NIL | builtin::VOID => "None",
                    builtin::BYTES => "bytes",
                    builtin::LIST => "list",
                    builtin::MAP => "dict",
                    builtin::SET => "set",
                    builtin::UNKNOWN | builtin::ANY => self.typing("Any"),
                    other => other,
                }
                .to_string();
                if args.is_empty() {
                    base
                } else {
                    let args: Vec<String> = args.iter().map(|arg| self.render_type(arg)).collect();
                    format!("{}[{}]", base, args.join(", "))
                }
            }
            TypeExpr::Nullable { inner } => {
                let optional = self.typing("Optional");
                format!("{}[{}]", optional, self.render_type(inner))
            }
            TypeExpr::Function { params, ret } => {
                let callable = self.typing("Callable");
                let params: Vec<String> = params.iter().map(|p| self.render_type(p)).collect();
                format!("{}[[{}], {}]", callable, params.join(", "), self.render_type(ret))
            }
            TypeExpr::Union { members } => members
                .iter()
                .map(|member| self.render_type(member))
                .collect::<Vec<_>>()
                .join(" | "),
            TypeExpr::Literal { value } => {
                let literal = self.typing("Literal");
                format!("{literal}[{value}]")
            }
        }
    }

    /// Imports and helpers the body asked for
    fn preamble(&self) -> String {
        let features = self.ctx.features();
        let unit = " ".repeat(self.ctx.indent_width());

        let mut imports = Vec::new();
        if features.contains(Features::ASYNC) {
            imports.push("import asyncio".to_string());
        }
        if features.contains(Features::FUNCTIONAL) {
            imports.push("import functools".to_string());
        }
        if features.contains(Features::MATH_CONSTANTS) {
            imports.push("import math".to_string());
        }
        if features.intersects(Features::STDIN | Features::CONSOLE) {
            imports.push("import sys".to_string());
        }
        if features.contains(Features::ABSTRACT) {
            imports.push("from abc import ABC, abstractmethod".to_string());
        }
        if features.contains(Features::SCOPE_GUARD) {
            imports.push("from contextlib import contextmanager".to_string());
        }
        if features.contains(Features::RECORDS) {
            imports.push("from dataclasses import dataclass".to_string());
        }
        if features.contains(Features::ENUMS) {
            imports.push("from enum import Enum, auto".to_string());
        }
        if !self.typing.is_empty() {
            let names: Vec<&str> = self.typing.iter().copied().collect();
            imports.push(format!("from typing import {}", names.join(", ")));
        }

        let mut out = String::new();
        if !imports.is_empty() {
            out.push_str(&imports.join("\n"));
            out.push('\n');
        }
        if features.contains(Features::SCOPE_GUARD) {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!(
                "@contextmanager\n\
                 def _faber_scope(resource, release):\n\
                 {unit}try:\n\
                 {unit}{unit}yield resource\n\
                 {unit}finally:\n\
                 {unit}{unit}getattr(resource, release)()\n"
            ));
        }
        out
    }
}

impl Scoped for PyEmitter {
    fn context(&mut self) -> &mut GenerationContext {
        &mut self.ctx
    }
}

impl StmtEmitter for PyEmitter {
    fn stmt(&mut self, stmt: &Stmt) -> Result<String> {
        self.emit_stmt(stmt)
    }
}

/// `Name` for a test class, `name` for a test function
fn test_identifier(name: &str, capitalize: bool) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = capitalize;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if upper_next {
                out.extend(c.to_uppercase());
            } else if capitalize {
                out.push(c);
            } else {
                out.extend(c.to_lowercase());
            }
            upper_next = false;
        } else if capitalize {
            upper_next = true;
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use faber_ast::{AllocatorKind, AstBuilder, MathConstant, StructureKind};

    fn emit(body: Vec<Stmt>) -> String {
        let unit = Unit::new("probatio", body);
        PythonBackend::new()
            .unwrap()
            .generate_unit(&unit, &CodegenOptions::default())
            .unwrap()
    }

    #[test]
    fn test_types_record_typing_imports() {
        let b = AstBuilder::new();
        let mut emitter = PyEmitter::new(4, methods::registry().unwrap());
        assert_eq!(
            emitter.render_type(&TypeExpr::nullable(b.list_of(b.ty("textus")))),
            "Optional[list[str]]"
        );
        assert_eq!(
            emitter.render_type(&TypeExpr::generic("tabula", vec![b.ty("textus"), b.ty("ignotum")])),
            "dict[str, Any]"
        );
        assert_eq!(emitter.preamble(), "from typing import Any, Optional\n");
    }

    #[test]
    fn test_empty_allocator_scope_is_pass() {
        let b = AstBuilder::new();
        let code = emit(vec![b.allocator_scope(AllocatorKind::Arena, Some("alloc"), vec![])]);
        assert_eq!(code, "pass\n");
    }

    #[test]
    fn test_math_constant_imports_math() {
        let b = AstBuilder::new();
        let code = emit(vec![b.fixum("p", None, b.constant(MathConstant::Pi))]);
        assert_eq!(code, "import math\n\np = math.pi\n");
    }

    #[test]
    fn test_registry_call() {
        let b = AstBuilder::new();
        let code = emit(vec![b.expr_stmt(b.method(
            b.ident("xs"),
            "adde",
            vec![b.int(3)],
            StructureKind::Sequence,
        ))]);
        assert_eq!(code, "xs.append(3)\n");
    }

    #[test]
    fn test_test_identifiers() {
        assert_eq!(test_identifier("parse numbers", true), "ParseNumbers");
        assert_eq!(test_identifier("adds two-values", false), "adds_two_values");
    }
}
