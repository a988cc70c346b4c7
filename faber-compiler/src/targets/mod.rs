//! Per-backend translators
//!
//! Each backend lives in its own module, split by node category
//! (`decl`, `stmt`, `expr`) with its method table in `methods`. Every
//! statement and expression translator matches exhaustively over the node
//! kinds, so adding a node kind fails to build until each backend handles it.

pub mod cpp;
pub mod faber;
pub mod python;
pub mod rust;
pub mod typescript;
pub mod zig;

use crate::backend::utils::count_markers;
use crate::backend::{CodegenDiagnostic, DiagnosticSeverity, Target};
use crate::context::{Scoped, UnionInfo};
use crate::registry::{Lookup, MethodRegistry};
use crate::{CodegenError, Result};
use faber_ast::{BinaryOp, ConversionKind, Expr, Radix, Span, Stmt, StructureKind};

/// Registry lookup that fails loudly when nothing can translate the call
pub(crate) fn lookup_method<'r>(
    registry: &'r MethodRegistry,
    kind: StructureKind,
    name: &str,
    span: Span,
) -> Result<Lookup<'r>> {
    registry.lookup(kind, name).ok_or_else(|| {
        CodegenError::unsupported(
            span,
            registry.target(),
            format!("method {}.{}", kind.type_name(), name),
        )
    })
}

/// One error diagnostic when unsupported-method markers survived into the output
pub(crate) fn marker_diagnostics(code: &str, marker: &str) -> Vec<CodegenDiagnostic> {
    match count_markers(code, marker) {
        0 => Vec::new(),
        count => vec![CodegenDiagnostic {
            severity: DiagnosticSeverity::Error,
            message: format!("{count} built-in call(s) have no translation and will fail to compile"),
            location: None,
        }],
    }
}

/// Arm bindings name variant fields; a name the variant lacks cannot be bound
pub(crate) fn check_bindings(
    info: Option<&UnionInfo>,
    variant: &str,
    bindings: &[String],
    span: Span,
    target: Target,
) -> Result<()> {
    let Some(fields) = info.and_then(|info| info.fields_of(variant)) else {
        return Ok(());
    };
    match bindings.iter().find(|binding| !fields.contains(binding)) {
        Some(binding) => Err(CodegenError::unsupported(
            span,
            target,
            format!("binding `{binding}` names no field of variant {variant}"),
        )),
        None => Ok(()),
    }
}

/// What a text must look like before a numeric conversion with a fallback
/// parses it; anything else yields the fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputCheck {
    /// One or more decimal digits
    Digits,
    /// One or more decimal digits or points
    DigitsOrPoint,
    /// Any non-empty text; the radix parser judges the digits
    NonEmpty,
}

impl InputCheck {
    pub fn for_conversion(kind: ConversionKind, radix: Radix) -> Self {
        match (kind, radix) {
            (ConversionKind::Float, _) => InputCheck::DigitsOrPoint,
            (_, Radix::Dec) => InputCheck::Digits,
            _ => InputCheck::NonEmpty,
        }
    }
}

/// Statement-level plumbing shared by the brace-delimited backends
pub(crate) trait StmtEmitter: Scoped {
    /// One statement as complete lines at the current depth
    fn stmt(&mut self, stmt: &Stmt) -> Result<String>;

    fn stmts(&mut self, stmts: &[Stmt]) -> Result<String> {
        let mut out = String::new();
        for stmt in stmts {
            out.push_str(&self.stmt(stmt)?);
        }
        Ok(out)
    }

    /// Statements one level deeper
    fn body(&mut self, stmts: &[Stmt]) -> Result<String> {
        self.indented(|this| this.stmts(stmts))
    }

    /// `{ ... }` closing at the current depth, `{}` when empty
    fn braced(&mut self, stmts: &[Stmt]) -> Result<String> {
        if stmts.is_empty() {
            return Ok("{}".to_string());
        }
        let body = self.body(stmts)?;
        let indent = self.context().indent();
        Ok(format!("{{\n{body}{indent}}}"))
    }

    /// Module items separated by blank lines; imports stay grouped
    fn items(&mut self, items: &[&Stmt]) -> Result<String> {
        let mut out = String::new();
        let mut previous_was_import = false;
        for (i, stmt) in items.iter().enumerate() {
            let import = matches!(stmt, Stmt::Import(_));
            if i > 0 && !(import && previous_was_import) {
                out.push('\n');
            }
            out.push_str(&self.stmt(stmt)?);
            previous_was_import = import;
        }
        Ok(out)
    }

    /// Top-level statements, with declarations set apart by blank lines
    fn top_level(&mut self, stmts: &[Stmt]) -> Result<String> {
        let mut out = String::new();
        let mut previous_was_decl = false;
        for (i, stmt) in stmts.iter().enumerate() {
            let decl = is_declaration(stmt);
            if i > 0 && (decl || previous_was_decl) {
                out.push('\n');
            }
            out.push_str(&self.stmt(stmt)?);
            previous_was_decl = decl;
        }
        Ok(out)
    }
}

/// Unit body of a backend whose modules hold only declarations
pub(crate) struct ModuleLayout<'a> {
    pub items: Vec<&'a Stmt>,
    /// Loose statements and entry bodies, in source order
    pub main: Vec<&'a Stmt>,
    pub has_entry: bool,
    pub async_main: bool,
}

impl<'a> ModuleLayout<'a> {
    pub fn split(stmts: &'a [Stmt]) -> Self {
        let mut layout = ModuleLayout {
            items: Vec::new(),
            main: Vec::new(),
            has_entry: false,
            async_main: false,
        };
        for stmt in stmts {
            match stmt {
                Stmt::Entry { body, is_async, .. } => {
                    layout.has_entry = true;
                    layout.async_main |= *is_async;
                    layout.main.extend(body.stmts.iter());
                }
                Stmt::Function(_)
                | Stmt::Class(_)
                | Stmt::Interface(_)
                | Stmt::Enum(_)
                | Stmt::Union(_)
                | Stmt::TypeAlias { .. }
                | Stmt::Import(_)
                | Stmt::TestSuite { .. }
                | Stmt::Test { .. } => layout.items.push(stmt),
                _ => layout.main.push(stmt),
            }
        }
        layout
    }

    pub fn needs_main(&self) -> bool {
        self.has_entry || !self.main.is_empty()
    }
}

pub(crate) fn is_declaration(stmt: &Stmt) -> bool {
    matches!(
        stmt,
        Stmt::Function(_)
            | Stmt::Class(_)
            | Stmt::Interface(_)
            | Stmt::Enum(_)
            | Stmt::Union(_)
            | Stmt::Entry { .. }
            | Stmt::TestSuite { .. }
            | Stmt::Test { .. }
    )
}

/// Whether `child` needs parentheses as an operand of `parent`
pub(crate) fn needs_parens(child: &Expr, parent: BinaryOp, right: bool) -> bool {
    match child {
        Expr::Binary { op, .. } => {
            let (child_prec, parent_prec) = (op.precedence(), parent.precedence());
            child_prec < parent_prec || (right && child_prec == parent_prec)
        }
        Expr::Ternary { .. } | Expr::Assign { .. } | Expr::Closure(_) | Expr::Range { .. } => true,
        _ => false,
    }
}

/// Whether `child` needs parentheses under a prefix operator or postfix access
pub(crate) fn needs_parens_tight(child: &Expr) -> bool {
    matches!(
        child,
        Expr::Binary { .. }
            | Expr::Ternary { .. }
            | Expr::Assign { .. }
            | Expr::Closure(_)
            | Expr::Range { .. }
            | Expr::Cast { .. }
            | Expr::Native { .. }
            | Expr::Await { .. }
            | Expr::Unary { .. }
    )
}

pub(crate) fn paren_if(text: String, wrap: bool) -> String {
    if wrap {
        format!("({text})")
    } else {
        text
    }
}
