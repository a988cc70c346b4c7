use super::{render_type, TsEmitter};
use crate::backend::utils::{quote, sanitize_identifier};
use crate::backend::Target;
use crate::context::Scoped;
use crate::targets::StmtEmitter;
use crate::Result;
use faber_ast::{
    ClassDecl, EnumDecl, FunctionDecl, ImportDecl, InterfaceDecl, Param, TypeExpr, UnionDecl,
    VarDecl, VarKind,
};

fn export(is_public: bool) -> &'static str {
    if is_public {
        "export "
    } else {
        ""
    }
}

fn generics(generics: &[String]) -> String {
    if generics.is_empty() {
        String::new()
    } else {
        format!("<{}>", generics.join(", "))
    }
}

/// Declared return type with the async / generator wrapper applied
fn return_type(decl: &FunctionDecl) -> Option<String> {
    let inner = decl.ret.as_ref().map(render_type);
    match (decl.is_async, decl.is_generator) {
        (false, false) => inner,
        (true, false) => Some(format!("Promise<{}>", inner.unwrap_or_else(|| "void".into()))),
        (false, true) => Some(format!("Generator<{}>", inner.unwrap_or_else(|| "unknown".into()))),
        (true, true) => Some(format!(
            "AsyncGenerator<{}>",
            inner.unwrap_or_else(|| "unknown".into())
        )),
    }
}

impl TsEmitter {
    pub(super) fn params(&mut self, params: &[Param]) -> Result<String> {
        let mut out = Vec::with_capacity(params.len());
        for param in params {
            let mut text = String::new();
            if param.rest {
                text.push_str("...");
            }
            text.push_str(&sanitize_identifier(&param.name, Target::TypeScript));
            if let Some(ty) = &param.ty {
                text.push_str(": ");
                text.push_str(&render_type(ty));
            }
            match (&param.default, &param.ty) {
                (Some(default), _) => {
                    text.push_str(" = ");
                    text.push_str(&self.expr(default)?);
                }
                (None, Some(TypeExpr::Nullable { .. })) if !param.rest => text.push_str(" = null"),
                _ => {}
            }
            out.push(text);
        }
        Ok(out.join(", "))
    }

    pub(super) fn var_decl(&mut self, decl: &VarDecl) -> Result<String> {
        let keyword = match decl.kind {
            VarKind::Fixum => "const",
            VarKind::Varia => "let",
        };
        let mut text = format!(
            "{}{} {}",
            export(decl.is_public),
            keyword,
            sanitize_identifier(&decl.name, Target::TypeScript)
        );
        if let Some(ty) = &decl.ty {
            text.push_str(": ");
            text.push_str(&render_type(ty));
        }
        if let Some(value) = &decl.value {
            text.push_str(" = ");
            text.push_str(&self.expr(value)?);
        }
        text.push(';');
        Ok(self.ctx.line(&text))
    }

    fn signature(&mut self, decl: &FunctionDecl) -> Result<String> {
        let mut text = format!(
            "{}{}({})",
            sanitize_identifier(&decl.name, Target::TypeScript),
            generics(&decl.generics),
            self.params(&decl.params)?
        );
        if let Some(ret) = return_type(decl) {
            text.push_str(": ");
            text.push_str(&ret);
        }
        Ok(text)
    }

    fn function_body(&mut self, decl: &FunctionDecl) -> Result<Option<String>> {
        match &decl.body {
            Some(body) => self
                .in_function(decl.is_async, decl.is_generator, |this| this.braced(&body.stmts))
                .map(Some),
            None => Ok(None),
        }
    }

    pub(super) fn function(&mut self, decl: &FunctionDecl) -> Result<String> {
        let signature = self.signature(decl)?;
        let star = if decl.is_generator { "*" } else { "" };
        let asynchronous = if decl.is_async { "async " } else { "" };

        let text = match self.function_body(decl)? {
            Some(body) if !decl.is_external => format!(
                "{}{}function{} {} {}",
                export(decl.is_public),
                asynchronous,
                star,
                signature,
                body
            ),
            _ => format!("{}declare function {};", export(decl.is_public), signature),
        };
        Ok(self.ctx.line(&text))
    }

    pub(super) fn class(&mut self, decl: &ClassDecl) -> Result<String> {
        let abstract_kw = if decl.is_abstract { "abstract " } else { "" };
        let mut head = format!(
            "{}{}class {}{}",
            export(decl.is_public),
            abstract_kw,
            decl.name,
            generics(&decl.generics)
        );
        if !decl.implements.is_empty() {
            head.push_str(" implements ");
            head.push_str(&decl.implements.join(", "));
        }
        if decl.fields.is_empty() && decl.methods.is_empty() {
            return Ok(self.ctx.line(&format!("{head} {{}}")));
        }

        let mut out = self.ctx.line(&format!("{head} {{"));
        let members = self.indented(|this| {
            let mut sections: Vec<String> = Vec::new();

            let mut fields = String::new();
            for field in &decl.fields {
                let visibility = if field.is_public { "" } else { "private " };
                let static_kw = if field.is_static { "static " } else { "" };
                let mut text = format!(
                    "{}{}{}: {}",
                    visibility,
                    static_kw,
                    field.name,
                    render_type(&field.ty)
                );
                if let Some(default) = &field.default {
                    text.push_str(" = ");
                    text.push_str(&this.expr(default)?);
                }
                text.push(';');
                fields.push_str(&this.ctx.line(&text));
            }
            if !fields.is_empty() {
                sections.push(fields);
            }

            let instance: Vec<_> = decl.fields.iter().filter(|f| !f.is_static).collect();
            if !instance.is_empty() {
                let overrides: Vec<String> = instance
                    .iter()
                    .map(|f| format!("{}?: {}", f.name, render_type(&f.ty)))
                    .collect();
                let mut ctor = this.ctx.line(&format!(
                    "constructor(overrides: {{ {} }} = {{}}) {{",
                    overrides.join("; ")
                ));
                ctor.push_str(&this.indented(|this| {
                    Ok(instance
                        .iter()
                        .map(|f| {
                            this.ctx.line(&format!(
                                "if (overrides.{0} !== undefined) this.{0} = overrides.{0};",
                                f.name
                            ))
                        })
                        .collect::<String>())
                })?);
                ctor.push_str(&this.ctx.line("}"));
                sections.push(ctor);
            }

            for method in &decl.methods {
                sections.push(this.method(method, decl.is_abstract)?);
            }
            Ok(sections.join("\n"))
        })?;
        out.push_str(&members);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    fn method(&mut self, decl: &FunctionDecl, in_abstract: bool) -> Result<String> {
        let visibility = if decl.is_public { "" } else { "private " };
        let asynchronous = if decl.is_async { "async " } else { "" };
        let star = if decl.is_generator { "*" } else { "" };
        let signature = self.signature(decl)?;
        let text = match self.function_body(decl)? {
            Some(body) => format!("{visibility}{asynchronous}{star}{signature} {body}"),
            None if in_abstract => format!("abstract {signature};"),
            None => format!("{visibility}{signature};"),
        };
        Ok(self.ctx.line(&text))
    }

    pub(super) fn interface(&mut self, decl: &InterfaceDecl) -> Result<String> {
        let head = format!(
            "{}interface {}{}",
            export(decl.is_public),
            decl.name,
            generics(&decl.generics)
        );
        if decl.methods.is_empty() {
            return Ok(self.ctx.line(&format!("{head} {{}}")));
        }
        let mut out = self.ctx.line(&format!("{head} {{"));
        let methods = self.indented(|this| {
            let mut methods = String::new();
            for method in &decl.methods {
                let signature = this.signature(method)?;
                methods.push_str(&this.ctx.line(&format!("{signature};")));
            }
            Ok(methods)
        })?;
        out.push_str(&methods);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    pub(super) fn enum_decl(&mut self, decl: &EnumDecl) -> Result<String> {
        let mut out = self
            .ctx
            .line(&format!("{}enum {} {{", export(decl.is_public), decl.name));
        let members = self.indented(|this| {
            let mut members = String::new();
            for member in &decl.members {
                let text = match &member.value {
                    Some(value) => format!("{} = {},", member.name, this.expr(value)?),
                    None => format!("{},", member.name),
                };
                members.push_str(&this.ctx.line(&text));
            }
            Ok(members)
        })?;
        out.push_str(&members);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    /// A discriminated union of object types keyed by the tag field
    pub(super) fn union_decl(&mut self, decl: &UnionDecl) -> Result<String> {
        if decl.variants.is_empty() {
            return Ok(self.ctx.line(&format!(
                "{}type {}{} = never;",
                export(decl.is_public),
                decl.name,
                generics(&decl.generics)
            )));
        }
        let mut out = self.ctx.line(&format!(
            "{}type {}{} =",
            export(decl.is_public),
            decl.name,
            generics(&decl.generics)
        ));
        let count = decl.variants.len();
        let variants = self.indented(|this| {
            let mut variants = String::new();
            for (i, variant) in decl.variants.iter().enumerate() {
                let mut members = vec![format!("{}: {}", decl.tag_field, quote(&variant.name))];
                members.extend(
                    variant
                        .fields
                        .iter()
                        .map(|field| format!("{}: {}", field.name, render_type(&field.ty))),
                );
                let end = if i + 1 == count { ";" } else { "" };
                variants.push_str(&this.ctx.line(&format!("| {{ {} }}{}", members.join("; "), end)));
            }
            Ok(variants)
        })?;
        out.push_str(&variants);
        Ok(out)
    }

    pub(super) fn type_alias(
        &mut self,
        name: &str,
        generic_names: &[String],
        ty: &TypeExpr,
        is_public: bool,
    ) -> Result<String> {
        Ok(self.ctx.line(&format!(
            "{}type {}{} = {};",
            export(is_public),
            name,
            generics(generic_names),
            render_type(ty)
        )))
    }

    pub(super) fn import(&mut self, decl: &ImportDecl) -> Result<String> {
        let text = match &decl.namespace {
            Some(namespace) => format!("import * as {} from {};", namespace, quote(&decl.source)),
            None => {
                let items: Vec<String> = decl
                    .items
                    .iter()
                    .map(|item| match &item.alias {
                        Some(alias) => format!("{} as {}", item.name, alias),
                        None => item.name.clone(),
                    })
                    .collect();
                format!("import {{ {} }} from {};", items.join(", "), quote(&decl.source))
            }
        };
        Ok(self.ctx.line(&text))
    }
}
