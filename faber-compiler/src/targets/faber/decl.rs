use super::{render_type, FaberEmitter};
use crate::context::Scoped;
use crate::targets::StmtEmitter;
use crate::Result;
use faber_ast::{
    ClassDecl, EnumDecl, FunctionDecl, ImportDecl, InterfaceDecl, Param, TypeExpr, UnionDecl,
    VarDecl, VarKind,
};

impl FaberEmitter {
    /// `@ publica externa` style annotation line, or nothing
    fn annotations(&self, marks: &[(bool, &str)]) -> String {
        let words: Vec<&str> = marks
            .iter()
            .filter(|(set, _)| *set)
            .map(|(_, word)| *word)
            .collect();
        if words.is_empty() {
            String::new()
        } else {
            self.ctx.line(&format!("@ {}", words.join(" ")))
        }
    }

    fn generics(generics: &[String]) -> String {
        if generics.is_empty() {
            String::new()
        } else {
            format!("<{}>", generics.join(", "))
        }
    }

    pub(super) fn params(&mut self, params: &[Param]) -> Result<String> {
        let mut out = Vec::with_capacity(params.len());
        for param in params {
            let mut text = String::new();
            if param.rest {
                text.push_str("ceteri ");
            }
            if let Some(ty) = &param.ty {
                text.push_str(&render_type(ty));
                text.push(' ');
            }
            text.push_str(&param.name);
            if let Some(default) = &param.default {
                text.push_str(" = ");
                text.push_str(&self.expr(default)?);
            }
            out.push(text);
        }
        Ok(out.join(", "))
    }

    pub(super) fn var_decl(&mut self, decl: &VarDecl) -> Result<String> {
        let keyword = match decl.kind {
            VarKind::Fixum => "fixum",
            VarKind::Varia => "varia",
        };
        let mut text = format!("{keyword} {}", decl.name);
        if let Some(ty) = &decl.ty {
            text.push_str(": ");
            text.push_str(&render_type(ty));
        }
        if let Some(value) = &decl.value {
            text.push_str(" = ");
            text.push_str(&self.expr(value)?);
        }
        Ok(self.annotations(&[(decl.is_public, "publica")]) + &self.ctx.line(&text))
    }

    pub(super) fn function(&mut self, decl: &FunctionDecl) -> Result<String> {
        let mut out = self.annotations(&[
            (decl.is_public, "publica"),
            (decl.is_external, "externa"),
            (decl.is_generator, "cursor"),
        ]);

        let mut head = String::new();
        if decl.is_async {
            head.push_str("asynca ");
        }
        head.push_str(&format!(
            "functio {}{}({})",
            decl.name,
            Self::generics(&decl.generics),
            self.params(&decl.params)?
        ));
        if let Some(ret) = &decl.ret {
            head.push_str(" -> ");
            head.push_str(&render_type(ret));
        }

        if let Some(body) = &decl.body {
            let body = self.in_function(decl.is_async, decl.is_generator, |this| {
                this.braced(&body.stmts)
            })?;
            head.push(' ');
            head.push_str(&body);
        }
        out.push_str(&self.ctx.line(&head));
        Ok(out)
    }

    pub(super) fn class(&mut self, decl: &ClassDecl) -> Result<String> {
        let mut out = self.annotations(&[(decl.is_public, "publica"), (decl.is_abstract, "abstracta")]);
        let mut head = format!("genus {}{}", decl.name, Self::generics(&decl.generics));
        if !decl.implements.is_empty() {
            head.push_str(" implet ");
            head.push_str(&decl.implements.join(", "));
        }

        if decl.fields.is_empty() && decl.methods.is_empty() {
            out.push_str(&self.ctx.line(&format!("{head} {{}}")));
            return Ok(out);
        }

        out.push_str(&self.ctx.line(&format!("{head} {{")));
        let members = self.indented(|this| {
            let mut members = String::new();
            for field in &decl.fields {
                members.push_str(&this.annotations(&[(field.is_public, "publica")]));
                let mut text = String::new();
                if field.is_static {
                    text.push_str("generis ");
                }
                text.push_str(&format!("{}: {}", field.name, render_type(&field.ty)));
                if let Some(default) = &field.default {
                    text.push_str(" = ");
                    text.push_str(&this.expr(default)?);
                }
                members.push_str(&this.ctx.line(&text));
            }
            for (i, method) in decl.methods.iter().enumerate() {
                if i > 0 || !decl.fields.is_empty() {
                    members.push('\n');
                }
                members.push_str(&this.function(method)?);
            }
            Ok(members)
        })?;
        out.push_str(&members);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    pub(super) fn interface(&mut self, decl: &InterfaceDecl) -> Result<String> {
        let mut out = self.annotations(&[(decl.is_public, "publica")]);
        let head = format!("pactum {}{}", decl.name, Self::generics(&decl.generics));
        if decl.methods.is_empty() {
            out.push_str(&self.ctx.line(&format!("{head} {{}}")));
            return Ok(out);
        }
        out.push_str(&self.ctx.line(&format!("{head} {{")));
        let methods = self.indented(|this| {
            let mut methods = String::new();
            for method in &decl.methods {
                methods.push_str(&this.function(method)?);
            }
            Ok(methods)
        })?;
        out.push_str(&methods);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    pub(super) fn enum_decl(&mut self, decl: &EnumDecl) -> Result<String> {
        let mut out = self.annotations(&[(decl.is_public, "publica")]);
        out.push_str(&self.ctx.line(&format!("ordo {} {{", decl.name)));
        let members = self.indented(|this| {
            let mut members = String::new();
            for member in &decl.members {
                let text = match &member.value {
                    Some(value) => format!("{} = {}", member.name, this.expr(value)?),
                    None => member.name.clone(),
                };
                members.push_str(&this.ctx.line(&text));
            }
            Ok(members)
        })?;
        out.push_str(&members);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    pub(super) fn union_decl(&mut self, decl: &UnionDecl) -> Result<String> {
        let mut out = self.annotations(&[(decl.is_public, "publica")]);
        out.push_str(&self.ctx.line(&format!(
            "discretio {}{} {{",
            decl.name,
            Self::generics(&decl.generics)
        )));
        let variants = self.indented(|this| {
            let mut variants = String::new();
            for variant in &decl.variants {
                if variant.fields.is_empty() {
                    variants.push_str(&this.ctx.line(&variant.name));
                    continue;
                }
                variants.push_str(&this.ctx.line(&format!("{} {{", variant.name)));
                let fields = this.indented(|this| {
                    Ok(variant
                        .fields
                        .iter()
                        .map(|field| this.ctx.line(&format!("{} {}", render_type(&field.ty), field.name)))
                        .collect::<String>())
                })?;
                variants.push_str(&fields);
                variants.push_str(&this.ctx.line("}"));
            }
            Ok(variants)
        })?;
        out.push_str(&variants);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    pub(super) fn type_alias(
        &mut self,
        name: &str,
        generics: &[String],
        ty: &TypeExpr,
        is_public: bool,
    ) -> Result<String> {
        Ok(self.annotations(&[(is_public, "publica")])
            + &self.ctx.line(&format!(
                "typus {}{} = {}",
                name,
                Self::generics(generics),
                render_type(ty)
            )))
    }

    pub(super) fn import(&mut self, decl: &ImportDecl) -> Result<String> {
        let items = match &decl.namespace {
            Some(namespace) => format!("* ut {namespace}"),
            None => decl
                .items
                .iter()
                .map(|item| match &item.alias {
                    Some(alias) => format!("{} ut {}", item.name, alias),
                    None => item.name.clone(),
                })
                .collect::<Vec<_>>()
                .join(", "),
        };
        Ok(self.ctx.line(&format!(
            "ex {} importa {}",
            crate::backend::utils::quote(&decl.source),
            items
        )))
    }
}
