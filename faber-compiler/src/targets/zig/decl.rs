use super::ZigEmitter;
use crate::backend::utils::{quote, sanitize_identifier};
use crate::backend::Target;
use crate::context::Scoped;
use crate::targets::StmtEmitter;
use crate::{CodegenError, Result};
use faber_ast::{
    ClassDecl, EnumDecl, Expr, FieldDecl, FunctionDecl, ImportDecl, InterfaceDecl, Literal, Param,
    Span, TypeExpr, UnaryOp, UnionDecl, VarDecl, VarKind,
};

fn visibility(is_public: bool) -> &'static str {
    if is_public {
        "pub "
    } else {
        ""
    }
}

fn comptime_params(names: &[String]) -> Vec<String> {
    names.iter().map(|name| format!("comptime {name}: type")).collect()
}

/// `./geometria/forma.fab` → `geometria/forma.zig`
fn import_path(source: &str) -> String {
    let path = source.strip_prefix("./").unwrap_or(source);
    let stem = path.strip_suffix(".fab").unwrap_or(path);
    format!("{stem}.zig")
}

/// Last path segment, usable as a binding name
fn import_stem(source: &str) -> String {
    let base = source.rsplit('/').next().unwrap_or(source);
    let base = base.strip_suffix(".fab").unwrap_or(base);
    sanitize_identifier(&base.replace('-', "_"), Target::Zig)
}

fn mutates_self(body: &str) -> bool {
    body.lines().any(|line| {
        let line = line.trim_start();
        line.starts_with("self.")
            && ([" = ", " += ", " -= ", " *= ", " /= "].iter().any(|op| line.contains(op))
                || line.contains(".append("))
    })
}

/// Numeric literals are comptime-typed in Zig, so a mutable binding needs a runtime type
fn literal_type(expr: &Expr) -> Option<&'static str> {
    match expr {
        Expr::Literal {
            value: Literal::Integer(_),
            ..
        } => Some("i64"),
        Expr::Literal {
            value: Literal::Float(_),
            ..
        } => Some("f64"),
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
            ..
        } => literal_type(operand),
        _ => None,
    }
}

fn is_integer_value(expr: &Expr) -> bool {
    literal_type(expr) == Some("i64")
}

impl ZigEmitter {
    fn params(&mut self, generics: &[String], params: &[Param], receiver: Option<&str>, span: Span) -> Result<String> {
        let mut out = comptime_params(generics);
        if let Some(receiver) = receiver {
            out.push(receiver.to_string());
        }
        for param in params {
            if param.default.is_some() {
                return Err(CodegenError::unsupported(
                    span,
                    Target::Zig,
                    format!("default value for parameter `{}`", param.name),
                ));
            }
            let ty = match &param.ty {
                Some(ty) => self.render_type(ty),
                None => "anytype".to_string(),
            };
            let ty = if param.rest { format!("[]const {ty}") } else { ty };
            out.push(format!("{}: {}", sanitize_identifier(&param.name, Target::Zig), ty));
        }
        Ok(out.join(", "))
    }

    fn signature(&mut self, decl: &FunctionDecl, receiver: Option<&str>, public: bool) -> Result<String> {
        if decl.is_async {
            return Err(CodegenError::unsupported(decl.span, Target::Zig, "async function"));
        }
        if decl.is_generator {
            return Err(CodegenError::unsupported(decl.span, Target::Zig, "generator function"));
        }
        let params = self.params(&decl.generics, &decl.params, receiver, decl.span)?;
        let ret = match &decl.ret {
            Some(ty) => self.render_type(ty),
            None => "void".to_string(),
        };
        Ok(format!(
            "{}fn {}({}) {}",
            visibility(public),
            sanitize_identifier(&decl.name, Target::Zig),
            params,
            ret
        ))
    }

    pub(super) fn var_decl(&mut self, decl: &VarDecl) -> Result<String> {
        let keyword = match decl.kind {
            VarKind::Fixum => "const",
            VarKind::Varia => "var",
        };
        let mut text = format!("{} {}", keyword, sanitize_identifier(&decl.name, Target::Zig));
        match (&decl.ty, &decl.value) {
            (Some(ty), _) => {
                text.push_str(": ");
                text.push_str(&self.render_type(ty));
            }
            (None, Some(value)) if decl.kind == VarKind::Varia => {
                if let Some(ty) = literal_type(value) {
                    text.push_str(": ");
                    text.push_str(ty);
                }
            }
            _ => {}
        }
        let value = match &decl.value {
            Some(value) => self.expr(value)?,
            None => "undefined".to_string(),
        };
        Ok(self.ctx.line(&format!("{text} = {value};")))
    }

    pub(super) fn function(&mut self, decl: &FunctionDecl, public: bool) -> Result<String> {
        let Some(body) = &decl.body else {
            if decl.is_external {
                let signature = self.signature(decl, None, public)?;
                return Ok(self.ctx.line(&format!("extern {signature};")));
            }
            return Err(CodegenError::without_body(decl.span, Target::Zig, &decl.name));
        };
        let signature = self.signature(decl, None, public)?;
        let body = self.in_function(false, false, |this| this.braced(&body.stmts))?;
        Ok(self.ctx.line(&format!("{signature} {body}")))
    }

    fn method(&mut self, decl: &FunctionDecl) -> Result<String> {
        let Some(body) = &decl.body else {
            return Err(CodegenError::without_body(decl.span, Target::Zig, &decl.name));
        };
        let rendered = self.in_function(false, false, |this| this.braced(&body.stmts))?;
        let receiver = if !rendered.contains("self") {
            "_: *const Self"
        } else if mutates_self(&rendered) {
            "self: *Self"
        } else {
            "self: *const Self"
        };
        let signature = self.signature(decl, Some(receiver), decl.is_public)?;
        Ok(self.ctx.line(&format!("{signature} {rendered}")))
    }

    /// `pub const Name = <kind> { .. };`, or a type function when generic
    fn container(
        &mut self,
        name: &str,
        generics: &[String],
        is_public: bool,
        kind: &str,
        members: impl FnOnce(&mut Self) -> Result<String>,
    ) -> Result<String> {
        if generics.is_empty() {
            let mut out = self
                .ctx
                .line(&format!("{}const {} = {} {{", visibility(is_public), name, kind));
            out.push_str(&self.indented(members)?);
            out.push_str(&self.ctx.line("};"));
            return Ok(out);
        }
        let mut out = self.ctx.line(&format!(
            "{}fn {}({}) type {{",
            visibility(is_public),
            name,
            comptime_params(generics).join(", ")
        ));
        out.push_str(&self.indented(|this| {
            let mut inner = this.ctx.line(&format!("return {kind} {{"));
            inner.push_str(&this.indented(members)?);
            inner.push_str(&this.ctx.line("};"));
            Ok(inner)
        })?);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    pub(super) fn class(&mut self, decl: &ClassDecl) -> Result<String> {
        let (statics, fields): (Vec<&FieldDecl>, Vec<&FieldDecl>) =
            decl.fields.iter().partition(|field| field.is_static);
        self.container(&decl.name, &decl.generics, decl.is_public, "struct", |this| {
            let mut sections = vec![this.ctx.line("const Self = @This();")];

            if !fields.is_empty() {
                let mut lines = String::new();
                for field in &fields {
                    let ty = this.render_type(&field.ty);
                    let name = sanitize_identifier(&field.name, Target::Zig);
                    let text = match &field.default {
                        Some(value) => format!("{}: {} = {},", name, ty, this.expr(value)?),
                        None => format!("{name}: {ty},"),
                    };
                    lines.push_str(&this.ctx.line(&text));
                }
                sections.push(lines);
            }

            if !statics.is_empty() {
                let mut lines = String::new();
                for field in &statics {
                    let ty = this.render_type(&field.ty);
                    let name = sanitize_identifier(&field.name, Target::Zig);
                    let text = match &field.default {
                        Some(value) => {
                            format!("{}const {}: {} = {};", visibility(field.is_public), name, ty, this.expr(value)?)
                        }
                        None => format!("{}var {}: {} = undefined;", visibility(field.is_public), name, ty),
                    };
                    lines.push_str(&this.ctx.line(&text));
                }
                sections.push(lines);
            }

            sections.push(this.constructor(&fields)?);
            for method in &decl.methods {
                sections.push(this.method(method)?);
            }

            if !decl.implements.is_empty() {
                let mut check = this.ctx.line("comptime {");
                check.push_str(&this.indented(|inner| {
                    let mut lines = String::new();
                    for contract in &decl.implements {
                        lines.push_str(&inner.ctx.line(&format!("std.debug.assert(is{contract}(Self));")));
                    }
                    Ok(lines)
                })?);
                check.push_str(&this.ctx.line("}"));
                sections.push(check);
            }
            Ok(sections.join("\n"))
        })
    }

    /// `init` taking every field without a default; defaulted fields fill themselves
    fn constructor(&mut self, fields: &[&FieldDecl]) -> Result<String> {
        let mut params = Vec::new();
        let mut inits = Vec::new();
        for field in fields.iter().filter(|field| field.default.is_none()) {
            let name = sanitize_identifier(&field.name, Target::Zig);
            params.push(format!("{}: {}", name, self.render_type(&field.ty)));
            inits.push(format!(".{name} = {name}"));
        }
        let mut out = self.ctx.line(&format!("pub fn init({}) Self {{", params.join(", ")));
        out.push_str(&self.indented(|this| {
            if inits.is_empty() {
                Ok(this.ctx.line("return .{};"))
            } else {
                Ok(this.ctx.line(&format!("return .{{ {} }};", inits.join(", "))))
            }
        })?);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    /// A contract becomes a comptime predicate over the declarations of a type
    pub(super) fn interface(&mut self, decl: &InterfaceDecl) -> Result<String> {
        let mut out = self.ctx.line(&format!(
            "{}fn is{}(comptime T: type) bool {{",
            visibility(decl.is_public),
            decl.name
        ));
        out.push_str(&self.indented(|this| {
            if decl.methods.is_empty() {
                let mut lines = this.ctx.line("_ = T;");
                lines.push_str(&this.ctx.line("return true;"));
                return Ok(lines);
            }
            let checks: Vec<String> = decl
                .methods
                .iter()
                .map(|method| format!("@hasDecl(T, {})", quote(&method.name)))
                .collect();
            Ok(this.ctx.line(&format!("return {};", checks.join(" and "))))
        })?);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    pub(super) fn enum_decl(&mut self, decl: &EnumDecl) -> Result<String> {
        let valued = decl.members.iter().any(|member| member.value.is_some());
        let kind = if valued { "enum(i64)" } else { "enum" };
        self.container(&decl.name, &[], decl.is_public, kind, |this| {
            let mut members = String::new();
            for member in &decl.members {
                let text = match &member.value {
                    Some(value) if is_integer_value(value) => {
                        format!("{} = {},", member.name, this.expr(value)?)
                    }
                    Some(_) => {
                        return Err(CodegenError::unsupported(
                            decl.span,
                            Target::Zig,
                            format!("non-integer value for enum member `{}`", member.name),
                        ))
                    }
                    None => format!("{},", member.name),
                };
                members.push_str(&this.ctx.line(&text));
            }
            Ok(members)
        })
    }

    pub(super) fn union_decl(&mut self, decl: &UnionDecl) -> Result<String> {
        self.container(&decl.name, &decl.generics, decl.is_public, "union(enum)", |this| {
            let mut variants = String::new();
            for variant in &decl.variants {
                if variant.fields.is_empty() {
                    variants.push_str(&this.ctx.line(&format!("{},", variant.name)));
                    continue;
                }
                let fields: Vec<String> = variant
                    .fields
                    .iter()
                    .map(|field| {
                        format!(
                            "{}: {}",
                            sanitize_identifier(&field.name, Target::Zig),
                            this.render_type(&field.ty)
                        )
                    })
                    .collect();
                variants.push_str(
                    &this
                        .ctx
                        .line(&format!("{}: struct {{ {} }},", variant.name, fields.join(", "))),
                );
            }
            Ok(variants)
        })
    }

    pub(super) fn type_alias(
        &mut self,
        name: &str,
        generics: &[String],
        ty: &TypeExpr,
        is_public: bool,
    ) -> Result<String> {
        let ty = self.render_type(ty);
        if generics.is_empty() {
            return Ok(self.ctx.line(&format!("{}const {} = {};", visibility(is_public), name, ty)));
        }
        Ok(self.ctx.line(&format!(
            "{}fn {}({}) type {{ return {}; }}",
            visibility(is_public),
            name,
            comptime_params(generics).join(", "),
            ty
        )))
    }

    pub(super) fn import(&mut self, decl: &ImportDecl) -> Result<String> {
        let path = quote(&import_path(&decl.source));
        if let Some(namespace) = &decl.namespace {
            return Ok(self.ctx.line(&format!("const {namespace} = @import({path});")));
        }
        if decl.items.is_empty() {
            let stem = import_stem(&decl.source);
            return Ok(self.ctx.line(&format!("const {stem} = @import({path});")));
        }
        let mut out = String::new();
        for item in &decl.items {
            let binding = item.alias.as_deref().unwrap_or(&item.name);
            out.push_str(&self.ctx.line(&format!(
                "const {} = @import({}).{};",
                sanitize_identifier(binding, Target::Zig),
                path,
                item.name
            )));
        }
        Ok(out)
    }
}
