//! Rust backend
//!
//! Declarations stay at module level and every loose statement is hoisted
//! into `fn main`, since Rust has no top-level statements. Text values are
//! owned `String`s, tagged unions are enums with struct variants, and
//! resource scopes are plain blocks whose bindings drop on exit.

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
use crate::Result;
use faber_ast::{builtin, Stmt, TypeExpr, Unit};
use std::collections::{HashMap, HashSet};
use tracing::debug;

const FEATURES: &[&str] = &[
    "async",
    "closures",
    "pattern-matching",
    "resource-scopes",
    "format-strings",
    "collection-filters",
];

/// Rust code generator backend
pub struct RustBackend {
    registry: &'static MethodRegistry,
}

impl RustBackend {
    pub fn new() -> Result<Self> {
        Ok(RustBackend {
            registry: methods::registry()?,
        })
    }
}

impl CodegenBackend for RustBackend {
    fn target(&self) -> Target {
        Target::Rust
    }

    fn target_info(&self) -> CompilationTarget {
        CompilationTarget {
            target: Target::Rust,
            name: "Rust".to_string(),
            file_extension: Target::Rust.file_extension().to_string(),
            memory: MemoryModel::Ownership,
            supports_async: true,
            supports_generators: false,
            supports_closures: true,
        }
    }

    fn supports_feature(&self, feature: &str) -> bool {
        FEATURES.contains(&feature)
    }

    fn generate_unit(&self, unit: &Unit, options: &CodegenOptions) -> Result<String> {
        debug!(unit = %unit.name, backend = "rust", "generating unit");
        let mut emitter = RsEmitter::new(options.indent_for(Target::Rust), self.registry);
        emitter.ctx.register_unions(&unit.body);
        emitter.register_types(&unit.body);

        let body = emitter.module(&unit.body)?;
        let preamble = if options.emit_preamble {
            emitter.preamble()
        } else {
            String::new()
        };
        debug!(
            unit = %unit.name,
            backend = "rust",
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

pub(crate) struct RsEmitter {
    ctx: GenerationContext,
    registry: &'static MethodRegistry,
    /// Enums, unions and classes declared in the unit; members resolve with `::`
    types: HashSet<String>,
    /// Method names of every contract declared in the unit
    contracts: HashMap<String, Vec<String>>,
}

impl RsEmitter {
    fn new(indent: usize, registry: &'static MethodRegistry) -> Self {
        RsEmitter {
            ctx: GenerationContext::new(indent),
            registry,
            types: HashSet::new(),
            contracts: HashMap::new(),
        }
    }

    fn register_types(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match stmt {
                Stmt::Class(decl) => {
                    self.types.insert(decl.name.clone());
                }
                Stmt::Enum(decl) => {
                    self.types.insert(decl.name.clone());
                }
                Stmt::Union(decl) => {
                    self.types.insert(decl.name.clone());
                }
                Stmt::Interface(decl) => {
                    let methods = decl.methods.iter().map(|m| m.name.clone()).collect();
                    self.contracts.insert(decl.name.clone(), methods);
                }
                Stmt::TestSuite { body, .. } => self.register_types(body),
                _ => {}
            }
        }
    }

    /// Module items, then `fn main` holding everything else
    fn module(&mut self, stmts: &[Stmt]) -> Result<String> {
        let layout = ModuleLayout::split(stmts);
        let mut out = self.items(&layout.items)?;
        if !layout.needs_main() {
            return Ok(out);
        }
        if !out.is_empty() {
            out.push('\n');
        }
        if layout.async_main {
            self.ctx.require(Features::ASYNC);
            out.push_str(&self.ctx.line("#[tokio::main]"));
            out.push_str(&self.ctx.line("async fn main() {"));
        } else {
            out.push_str(&self.ctx.line("fn main() {"));
        }
        let main = &layout.main;
        out.push_str(&self.in_function(layout.async_main, false, |this| {
            this.indented(|this| {
                let mut body = String::new();
                for stmt in main {
                    body.push_str(&this.stmt(stmt)?);
                }
                Ok(body)
            })
        })?);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    pub(crate) fn render_type(&mut self, ty: &TypeExpr) -> String {
        match ty {
            TypeExpr::Named { name, args } => {
                let args: Vec<String> = args.iter().map(|arg| self.render_type(arg)).collect();
                let base = match name.as_str() {
                    builtin::TEXT => "String",
                    builtin::NUMBER => "i64",
                    builtin::FLOAT => "f64",
                    builtin::BOOL => "bool",
                    builtin::NIL | builtin::VOID => "()",
                    builtin::BYTES => "Vec<u8>",
                    builtin::UNKNOWN | builtin::ANY => "Box<dyn std::any::Any>",
                    builtin::LIST => "Vec",
                    builtin::MAP => {
                        self.ctx.require(Features::MAP);
                        "HashMap"
                    }
                    builtin::SET => {
                        self.ctx.require(Features::SET);
                        "HashSet"
                    }
                    other => other,
                };
                match (name.as_str(), args.is_empty()) {
                    (builtin::LIST | builtin::SET, true) => format!("{base}<Box<dyn std::any::Any>>"),
                    (builtin::MAP, true) => format!("{base}<String, Box<dyn std::any::Any>>"),
                    (_, true) => base.to_string(),
                    (_, false) => format!("{}<{}>", base, args.join(", ")),
                }
            }
            TypeExpr::Nullable { inner } => format!("Option<{}>", self.render_type(inner)),
            TypeExpr::Function { params, ret } => {
                let params: Vec<String> = params.iter().map(|p| self.render_type(p)).collect();
                if ret.is_void() {
                    format!("Box<dyn Fn({})>", params.join(", "))
                } else {
                    format!("Box<dyn Fn({}) -> {}>", params.join(", "), self.render_type(ret))
                }
            }
            // no anonymous unions; the resolver has already checked every use
            TypeExpr::Union { .. } => "Box<dyn std::any::Any>".to_string(),
            TypeExpr::Literal { value } => {
                if value.starts_with('"') {
                    "&'static str".to_string()
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

    /// `use` lines and helpers the body asked for
    fn preamble(&self) -> String {
        let features = self.ctx.features();
        let unit = " ".repeat(self.ctx.indent_width());
        let mut uses = Vec::new();
        if features.contains(Features::MAP) {
            uses.push("use std::collections::HashMap;");
        }
        if features.contains(Features::SET) {
            uses.push("use std::collections::HashSet;");
        }
        if features.contains(Features::STDIN) {
            uses.push("use std::io::{BufRead, Read};");
        }

        let mut out = String::new();
        if !uses.is_empty() {
            out.push_str(&uses.join("\n"));
            out.push('\n');
        }
        if features.contains(Features::STDIN) {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!(
                "fn __lege() -> String {{\n\
                 {unit}let mut text = String::new();\n\
                 {unit}std::io::stdin().read_to_string(&mut text).unwrap_or_default();\n\
                 {unit}text\n\
                 }}\n\
                 \n\
                 fn __lege_lineam() -> String {{\n\
                 {unit}let mut line = String::new();\n\
                 {unit}std::io::stdin().lock().read_line(&mut line).unwrap_or_default();\n\
                 {unit}line.trim_end_matches(['\\r', '\\n']).to_string()\n\
                 }}\n"
            ));
        }
        out
    }
}

impl Scoped for RsEmitter {
    fn context(&mut self) -> &mut GenerationContext {
        &mut self.ctx
    }
}

impl StmtEmitter for RsEmitter {
    fn stmt(&mut self, stmt: &Stmt) -> Result<String> {
        self.emit_stmt(stmt)
    }
}
