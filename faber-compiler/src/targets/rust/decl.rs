use super::RsEmitter;
use crate::backend::utils::sanitize_identifier;
use crate::backend::Target;
use crate::context::Scoped;
use crate::targets::StmtEmitter;
use crate::{CodegenError, Result};
use faber_ast::{
    ClassDecl, EnumDecl, Expr, FunctionDecl, ImportDecl, InterfaceDecl, Literal, Param, Span,
    TypeExpr, UnaryOp, UnionDecl, VarDecl, VarKind,
};

fn generics(names: &[String]) -> String {
    if names.is_empty() {
        String::new()
    } else {
        format!("<{}>", names.join(", "))
    }
}

fn visibility(is_public: bool) -> &'static str {
    if is_public {
        "pub "
    } else {
        ""
    }
}

/// `./geometria/forma.fab` → `crate::geometria::forma`
fn module_path(source: &str) -> String {
    let mut rest = source.trim_end_matches(".fab");
    let mut prefix = vec!["crate"];
    if let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    } else {
        prefix.clear();
        while let Some(stripped) = rest.strip_prefix("../") {
            prefix.push("super");
            rest = stripped;
        }
        if prefix.is_empty() {
            prefix.push("crate");
        }
    }
    let mut segments: Vec<String> = prefix.into_iter().map(str::to_string).collect();
    segments.extend(
        rest.split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.replace('-', "_")),
    );
    segments.join("::")
}

/// Whether a rendered method body writes to a field of `self`
fn assigns_self(body: &str) -> bool {
    body.lines().any(|line| {
        let line = line.trim_start();
        let assigned = line.starts_with("self.")
            && [" = ", " += ", " -= ", " *= ", " /= "]
                .iter()
                .any(|op| line.contains(op));
        assigned || (line.starts_with("self.") && line.contains(".push("))
    })
}

fn is_integer_value(expr: &Expr) -> bool {
    match expr {
        Expr::Literal {
            value: Literal::Integer(_),
            ..
        } => true,
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
            ..
        } => is_integer_value(operand),
        _ => false,
    }
}

impl RsEmitter {
    fn param_type(&mut self, ty: Option<&TypeExpr>) -> String {
        match ty {
            Some(ty) => self.render_type(ty),
            None => "Box<dyn std::any::Any>".to_string(),
        }
    }

    pub(super) fn params(&mut self, params: &[Param], receiver: Option<&str>, span: Span) -> Result<String> {
        let mut out = Vec::with_capacity(params.len() + 1);
        if let Some(receiver) = receiver {
            out.push(receiver.to_string());
        }
        for param in params {
            if param.default.is_some() {
                return Err(CodegenError::unsupported(
                    span,
                    Target::Rust,
                    format!("default value for parameter `{}`", param.name),
                ));
            }
            let ty = self.param_type(param.ty.as_ref());
            let ty = if param.rest { format!("Vec<{ty}>") } else { ty };
            out.push(format!("{}: {}", sanitize_identifier(&param.name, Target::Rust), ty));
        }
        Ok(out.join(", "))
    }

    fn signature(&mut self, decl: &FunctionDecl, receiver: Option<&str>, public: bool) -> Result<String> {
        if decl.is_generator {
            return Err(CodegenError::unsupported(decl.span, Target::Rust, "generator function"));
        }
        let params = self.params(&decl.params, receiver, decl.span)?;
        let ret = match &decl.ret {
            Some(ty) if !ty.is_void() => format!(" -> {}", self.render_type(ty)),
            _ => String::new(),
        };
        Ok(format!(
            "{}{}fn {}{}({}){}",
            visibility(public),
            if decl.is_async { "async " } else { "" },
            sanitize_identifier(&decl.name, Target::Rust),
            generics(&decl.generics),
            params,
            ret
        ))
    }

    pub(super) fn var_decl(&mut self, decl: &VarDecl) -> Result<String> {
        let mut text = String::from("let ");
        if decl.kind == VarKind::Varia {
            text.push_str("mut ");
        }
        text.push_str(&sanitize_identifier(&decl.name, Target::Rust));
        if let Some(ty) = &decl.ty {
            text.push_str(": ");
            text.push_str(&self.render_type(ty));
        }
        if let Some(value) = &decl.value {
            text.push_str(" = ");
            text.push_str(&self.expr(value)?);
        }
        text.push(';');
        Ok(self.ctx.line(&text))
    }

    /// Free function, or a method when `receiver` is set
    pub(super) fn function(&mut self, decl: &FunctionDecl, public: bool) -> Result<String> {
        let Some(body) = &decl.body else {
            if decl.is_external {
                let signature = self.signature(decl, None, public)?;
                let mut out = self.ctx.line("extern \"C\" {");
                out.push_str(&self.indented(|this| Ok(this.ctx.line(&format!("{signature};"))))?);
                out.push_str(&self.ctx.line("}"));
                return Ok(out);
            }
            return Err(CodegenError::without_body(decl.span, Target::Rust, &decl.name));
        };
        let signature = self.signature(decl, None, public)?;
        let body = self.in_function(decl.is_async, false, |this| this.braced(&body.stmts))?;
        Ok(self.ctx.line(&format!("{signature} {body}")))
    }

    fn method(&mut self, decl: &FunctionDecl, public: bool) -> Result<String> {
        let Some(body) = &decl.body else {
            return Err(CodegenError::without_body(decl.span, Target::Rust, &decl.name));
        };
        let rendered = self.in_function(decl.is_async, false, |this| this.braced(&body.stmts))?;
        let receiver = if assigns_self(&rendered) { "&mut self" } else { "&self" };
        let signature = self.signature(decl, Some(receiver), public)?;
        Ok(self.ctx.line(&format!("{signature} {rendered}")))
    }

    pub(super) fn class(&mut self, decl: &ClassDecl) -> Result<String> {
        let params = generics(&decl.generics);
        let name = format!("{}{}", decl.name, params);
        let (statics, fields): (Vec<_>, Vec<_>) = decl.fields.iter().partition(|f| f.is_static);

        let mut out = self.ctx.line("#[derive(Debug, Clone)]");
        if fields.is_empty() {
            out.push_str(&self.ctx.line(&format!("{}struct {} {{}}", visibility(decl.is_public), name)));
        } else {
            out.push_str(&self.ctx.line(&format!("{}struct {} {{", visibility(decl.is_public), name)));
            out.push_str(&self.indented(|this| {
                let mut lines = String::new();
                for field in &fields {
                    let ty = this.render_type(&field.ty);
                    lines.push_str(&this.ctx.line(&format!(
                        "{}{}: {},",
                        visibility(field.is_public),
                        sanitize_identifier(&field.name, Target::Rust),
                        ty
                    )));
                }
                Ok(lines)
            })?);
            out.push_str(&self.ctx.line("}"));
        }

        let contract_methods: Vec<(String, Vec<String>)> = decl
            .implements
            .iter()
            .map(|contract| {
                let methods = self.contracts.get(contract).cloned().unwrap_or_default();
                (contract.clone(), methods)
            })
            .collect();
        let belongs_to_contract =
            |method: &str| contract_methods.iter().any(|(_, methods)| methods.iter().any(|m| m == method));

        out.push('\n');
        out.push_str(&self.ctx.line(&format!("impl{params} {name} {{")));
        let inherent = self.indented(|this| {
            let mut members = Vec::new();
            for field in &statics {
                let ty = this.render_type(&field.ty);
                let value = match &field.default {
                    Some(value) => this.expr(value)?,
                    None => "Default::default()".to_string(),
                };
                members.push(this.ctx.line(&format!(
                    "{}const {}: {} = {};",
                    visibility(field.is_public),
                    field.name.to_uppercase(),
                    ty,
                    value
                )));
            }
            members.push(this.constructor(&fields)?);
            for method in decl.methods.iter().filter(|m| !belongs_to_contract(&m.name)) {
                members.push(this.method(method, method.is_public)?);
            }
            Ok(members.join("\n"))
        })?;
        out.push_str(&inherent);
        out.push_str(&self.ctx.line("}"));

        for (contract, methods) in &contract_methods {
            out.push('\n');
            let implemented: Vec<&FunctionDecl> = decl
                .methods
                .iter()
                .filter(|m| methods.contains(&m.name))
                .collect();
            if implemented.is_empty() {
                out.push_str(&self.ctx.line(&format!("impl{params} {contract} for {name} {{}}")));
                continue;
            }
            out.push_str(&self.ctx.line(&format!("impl{params} {contract} for {name} {{")));
            let body = self.indented(|this| {
                let mut members = Vec::new();
                for method in implemented {
                    members.push(this.method(method, false)?);
                }
                Ok(members.join("\n"))
            })?;
            out.push_str(&body);
            out.push_str(&self.ctx.line("}"));
        }
        Ok(out)
    }

    /// `new` taking every field without a default, in declaration order
    fn constructor(&mut self, fields: &[&faber_ast::FieldDecl]) -> Result<String> {
        let mut params = Vec::new();
        let mut inits = Vec::new();
        for field in fields {
            let name = sanitize_identifier(&field.name, Target::Rust);
            match &field.default {
                Some(value) => inits.push(format!("{}: {}", name, self.expr(value)?)),
                None => {
                    params.push(format!("{}: {}", name, self.render_type(&field.ty)));
                    inits.push(name);
                }
            }
        }
        let mut out = self
            .ctx
            .line(&format!("pub fn new({}) -> Self {{", params.join(", ")));
        out.push_str(&self.indented(|this| {
            if inits.is_empty() {
                Ok(this.ctx.line("Self {}"))
            } else {
                Ok(this.ctx.line(&format!("Self {{ {} }}", inits.join(", "))))
            }
        })?);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    pub(super) fn interface(&mut self, decl: &InterfaceDecl) -> Result<String> {
        let header = format!(
            "{}trait {}{}",
            visibility(decl.is_public),
            decl.name,
            generics(&decl.generics)
        );
        if decl.methods.is_empty() {
            return Ok(self.ctx.line(&format!("{header} {{}}")));
        }
        let mut out = self.ctx.line(&format!("{header} {{"));
        out.push_str(&self.indented(|this| {
            let mut members = String::new();
            for method in &decl.methods {
                match &method.body {
                    Some(_) => members.push_str(&this.method(method, false)?),
                    None => {
                        let signature = this.signature(method, Some("&self"), false)?;
                        members.push_str(&this.ctx.line(&format!("{signature};")));
                    }
                }
            }
            Ok(members)
        })?);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    pub(super) fn enum_decl(&mut self, decl: &EnumDecl) -> Result<String> {
        let mut out = self.ctx.line("#[derive(Debug, Clone, Copy, PartialEq, Eq)]");
        out.push_str(&self.ctx.line(&format!("{}enum {} {{", visibility(decl.is_public), decl.name)));
        out.push_str(&self.indented(|this| {
            let mut members = String::new();
            for member in &decl.members {
                let text = match &member.value {
                    Some(value) if is_integer_value(value) => {
                        format!("{} = {},", member.name, this.expr(value)?)
                    }
                    Some(_) => {
                        return Err(CodegenError::unsupported(
                            decl.span,
                            Target::Rust,
                            format!("non-integer value for enum member `{}`", member.name),
                        ))
                    }
                    None => format!("{},", member.name),
                };
                members.push_str(&this.ctx.line(&text));
            }
            Ok(members)
        })?);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    pub(super) fn union_decl(&mut self, decl: &UnionDecl) -> Result<String> {
        let mut out = self.ctx.line("#[derive(Debug, Clone, PartialEq)]");
        let header = format!(
            "{}enum {}{}",
            visibility(decl.is_public),
            decl.name,
            generics(&decl.generics)
        );
        if decl.variants.is_empty() {
            out.push_str(&self.ctx.line(&format!("{header} {{}}")));
            return Ok(out);
        }
        out.push_str(&self.ctx.line(&format!("{header} {{")));
        out.push_str(&self.indented(|this| {
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
                            sanitize_identifier(&field.name, Target::Rust),
                            this.render_type(&field.ty)
                        )
                    })
                    .collect();
                variants.push_str(&this.ctx.line(&format!("{} {{ {} }},", variant.name, fields.join(", "))));
            }
            Ok(variants)
        })?);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    pub(super) fn type_alias(
        &mut self,
        name: &str,
        params: &[String],
        ty: &TypeExpr,
        is_public: bool,
    ) -> Result<String> {
        let ty = self.render_type(ty);
        Ok(self.ctx.line(&format!(
            "{}type {}{} = {};",
            visibility(is_public),
            name,
            generics(params),
            ty
        )))
    }

    pub(super) fn import(&mut self, decl: &ImportDecl) -> Result<String> {
        let path = module_path(&decl.source);
        let text = match (&decl.namespace, decl.items.as_slice()) {
            (Some(namespace), _) => format!("use {path} as {namespace};"),
            (None, []) => format!("use {path};"),
            (None, [item]) if item.alias.is_none() => format!("use {}::{};", path, item.name),
            (None, items) => {
                let items: Vec<String> = items
                    .iter()
                    .map(|item| match &item.alias {
                        Some(alias) => format!("{} as {}", item.name, alias),
                        None => item.name.clone(),
                    })
                    .collect();
                format!("use {}::{{{}}};", path, items.join(", "))
            }
        };
        Ok(self.ctx.line(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::super::RustBackend;
    use super::*;
    use crate::backend::{CodegenBackend, CodegenOptions};
    use faber_ast::{AstBuilder, BinaryOp, ClassDecl, FieldDecl, Stmt, Unit};

    fn emit(body: Vec<Stmt>) -> Result<String> {
        RustBackend::new()?.generate_unit(&Unit::new("probatio", body), &CodegenOptions::default())
    }

    #[test]
    fn test_module_paths() {
        assert_eq!(module_path("./geometria/forma.fab"), "crate::geometria::forma");
        assert_eq!(module_path("../communia/textus-util"), "super::communia::textus_util");
    }

    #[test]
    fn test_function_with_types() {
        let b = AstBuilder::new();
        let decl = b.function(
            "adde",
            vec![b.param("a", "numerus"), b.param("b", "numerus")],
            Some(b.ty("numerus")),
            vec![b.redde(Some(b.binary(BinaryOp::Add, b.ident("a"), b.ident("b"))))],
        );
        assert_eq!(
            emit(vec![Stmt::Function(decl)]).unwrap(),
            "fn adde(a: i64, b: i64) -> i64 {\n    return a + b;\n}\n"
        );
    }

    #[test]
    fn test_bodyless_function_is_fatal() {
        let b = AstBuilder::new();
        let mut decl = b.function("abstracta", vec![], None, vec![]);
        decl.body = None;
        assert!(matches!(
            emit(vec![Stmt::Function(decl)]),
            Err(CodegenError::AbstractWithoutBody { .. })
        ));
    }

    #[test]
    fn test_class_gets_struct_and_constructor() {
        let b = AstBuilder::new();
        let mut incrementa = b.function(
            "incrementa",
            vec![],
            None,
            vec![b.expr_stmt(b.assign(b.member(b.ego(), "numerus"), b.int(1)))],
        );
        incrementa.is_public = true;
        let class = ClassDecl {
            name: "Numerator".into(),
            generics: vec![],
            fields: vec![
                FieldDecl {
                    name: "nomen".into(),
                    ty: b.ty("textus"),
                    default: None,
                    is_public: true,
                    is_static: false,
                },
                FieldDecl {
                    name: "numerus".into(),
                    ty: b.ty("numerus"),
                    default: Some(b.int(0)),
                    is_public: false,
                    is_static: false,
                },
            ],
            methods: vec![incrementa],
            implements: vec![],
            is_public: false,
            is_abstract: false,
            span: b.span(),
        };
        assert_eq!(
            emit(vec![Stmt::Class(class)]).unwrap(),
            "#[derive(Debug, Clone)]\n\
             struct Numerator {\n    pub nomen: String,\n    numerus: i64,\n}\n\
             \n\
             impl Numerator {\n    \
             pub fn new(nomen: String) -> Self {\n        Self { nomen, numerus: 0 }\n    }\n\
             \n    \
             pub fn incrementa(&mut self) {\n        self.numerus = 1;\n    }\n\
             }\n"
        );
    }

    #[test]
    fn test_union_becomes_enum() {
        let b = AstBuilder::new();
        let code = emit(vec![b.union(
            "Forma",
            vec![
                ("Circulus", vec![("radius", b.ty("fractus"))]),
                ("Vacuum", vec![]),
            ],
        )])
        .unwrap();
        assert_eq!(
            code,
            "#[derive(Debug, Clone, PartialEq)]\nenum Forma {\n    Circulus { radius: f64 },\n    Vacuum,\n}\n"
        );
    }
}
