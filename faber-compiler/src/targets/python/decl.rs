use super::PyEmitter;
use crate::backend::utils::{quote, sanitize_identifier};
use crate::backend::Target;
use crate::context::{Features, Scoped};
use crate::{CodegenError, Result};
use faber_ast::{
    ClassDecl, EnumDecl, FunctionDecl, ImportDecl, InterfaceDecl, Param, TypeExpr, UnionDecl,
    VarDecl,
};

fn type_params(generics: &[String]) -> String {
    if generics.is_empty() {
        String::new()
    } else {
        format!("[{}]", generics.join(", "))
    }
}

/// `./util/text-tools` becomes `util.text_tools`
fn module_path(source: &str) -> String {
    source
        .trim_start_matches("./")
        .trim_end_matches(".fab")
        .replace('/', ".")
        .replace('-', "_")
}

impl PyEmitter {
    pub(super) fn params(&mut self, params: &[Param], receiver: bool) -> Result<String> {
        let mut out = Vec::with_capacity(params.len() + 1);
        if receiver {
            out.push("self".to_string());
        }
        for param in params {
            let mut text = String::new();
            if param.rest {
                text.push('*');
            }
            text.push_str(&sanitize_identifier(&param.name, Target::Python));
            if let Some(ty) = &param.ty {
                text.push_str(": ");
                text.push_str(&self.render_type(ty));
            }
            if let Some(default) = &param.default {
                text.push_str(" = ");
                text.push_str(&self.expr(default)?);
            }
            out.push(text);
        }
        Ok(out.join(", "))
    }

    fn return_annotation(&mut self, decl: &FunctionDecl) -> String {
        let inner = decl.ret.as_ref().map(|ty| self.render_type(ty));
        let ret = match (decl.is_generator, decl.is_async) {
            (false, _) => inner,
            (true, false) => {
                let iterator = self.typing("Iterator");
                Some(format!("{}[{}]", iterator, inner.unwrap_or_else(|| "None".into())))
            }
            (true, true) => {
                let iterator = self.typing("AsyncIterator");
                Some(format!("{}[{}]", iterator, inner.unwrap_or_else(|| "None".into())))
            }
        };
        ret.map(|ret| format!(" -> {ret}")).unwrap_or_default()
    }

    fn signature(&mut self, decl: &FunctionDecl, receiver: bool) -> Result<String> {
        let asynchronous = if decl.is_async { "async " } else { "" };
        let params = self.params(&decl.params, receiver)?;
        let ret = self.return_annotation(decl);
        Ok(format!(
            "{}def {}{}({}){}",
            asynchronous,
            sanitize_identifier(&decl.name, Target::Python),
            type_params(&decl.generics),
            params,
            ret
        ))
    }

    pub(super) fn var_decl(&mut self, decl: &VarDecl) -> Result<String> {
        let mut text = sanitize_identifier(&decl.name, Target::Python);
        if let Some(ty) = &decl.ty {
            text.push_str(": ");
            text.push_str(&self.render_type(ty));
        }
        let value = match &decl.value {
            Some(value) => self.expr(value)?,
            None => "None".to_string(),
        };
        text.push_str(" = ");
        text.push_str(&value);
        Ok(self.ctx.line(&text))
    }

    /// A function, or a method when `receiver` is set
    pub(super) fn function(&mut self, decl: &FunctionDecl, receiver: bool) -> Result<String> {
        let signature = self.signature(decl, receiver)?;
        match &decl.body {
            Some(body) => {
                let mut out = self.ctx.line(&format!("{signature}:"));
                out.push_str(&self.in_function(decl.is_async, decl.is_generator, |this| {
                    this.suite(&body.stmts)
                })?);
                Ok(out)
            }
            None if decl.is_external => Ok(self.ctx.line(&format!("# external: {signature}"))),
            None => Err(CodegenError::without_body(decl.span, Target::Python, &decl.name)),
        }
    }

    pub(super) fn class(&mut self, decl: &ClassDecl) -> Result<String> {
        self.ctx.require(Features::RECORDS);
        let mut bases: Vec<String> = decl.implements.clone();
        if decl.is_abstract {
            self.ctx.require(Features::ABSTRACT);
            bases.push("ABC".to_string());
        }
        let bases = if bases.is_empty() {
            String::new()
        } else {
            format!("({})", bases.join(", "))
        };

        let mut out = self.ctx.line("@dataclass");
        out.push_str(&self.ctx.line(&format!(
            "class {}{}{}:",
            decl.name,
            type_params(&decl.generics),
            bases
        )));
        if decl.fields.is_empty() && decl.methods.is_empty() {
            out.push_str(&self.indented(|this| Ok(this.ctx.line("pass")))?);
            return Ok(out);
        }

        let members = self.indented(|this| {
            let mut sections = Vec::new();
            let mut fields = String::new();
            for field in &decl.fields {
                let mut ty = this.render_type(&field.ty);
                if field.is_static {
                    ty = format!("{}[{}]", this.typing("ClassVar"), ty);
                }
                let mut text = format!("{}: {}", field.name, ty);
                if let Some(default) = &field.default {
                    text.push_str(" = ");
                    text.push_str(&this.expr(default)?);
                }
                fields.push_str(&this.ctx.line(&text));
            }
            if !fields.is_empty() {
                sections.push(fields);
            }
            for method in &decl.methods {
                sections.push(this.method(method, decl.is_abstract)?);
            }
            Ok(sections.join("\n"))
        })?;
        out.push_str(&members);
        Ok(out)
    }

    fn method(&mut self, decl: &FunctionDecl, in_abstract: bool) -> Result<String> {
        if decl.body.is_some() || !in_abstract {
            return self.function(decl, true);
        }
        let signature = self.signature(decl, true)?;
        let mut out = self.ctx.line("@abstractmethod");
        out.push_str(&self.ctx.line(&format!("{signature}:")));
        out.push_str(&self.indented(|this| Ok(this.ctx.line("...")))?);
        Ok(out)
    }

    pub(super) fn interface(&mut self, decl: &InterfaceDecl) -> Result<String> {
        let protocol = self.typing("Protocol");
        let mut out = self.ctx.line(&format!(
            "class {}{}({}):",
            decl.name,
            type_params(&decl.generics),
            protocol
        ));
        let methods = self.indented(|this| {
            if decl.methods.is_empty() {
                return Ok(this.ctx.line("pass"));
            }
            let mut methods = String::new();
            for method in &decl.methods {
                let signature = this.signature(method, true)?;
                methods.push_str(&this.ctx.line(&format!("{signature}: ...")));
            }
            Ok(methods)
        })?;
        out.push_str(&methods);
        Ok(out)
    }

    pub(super) fn enum_decl(&mut self, decl: &EnumDecl) -> Result<String> {
        self.ctx.require(Features::ENUMS);
        let mut out = self.ctx.line(&format!("class {}(Enum):", decl.name));
        let members = self.indented(|this| {
            if decl.members.is_empty() {
                return Ok(this.ctx.line("pass"));
            }
            let mut members = String::new();
            for member in &decl.members {
                let value = match &member.value {
                    Some(value) => this.expr(value)?,
                    None => "auto()".to_string(),
                };
                members.push_str(&this.ctx.line(&format!("{} = {}", member.name, value)));
            }
            Ok(members)
        })?;
        out.push_str(&members);
        Ok(out)
    }

    /// One `TypedDict` per variant keyed by the tag, then the alias over all of them
    pub(super) fn union_decl(&mut self, decl: &UnionDecl) -> Result<String> {
        if decl.variants.is_empty() {
            let never = self.typing("Never");
            return Ok(self.ctx.line(&format!(
                "type {}{} = {}",
                decl.name,
                type_params(&decl.generics),
                never
            )));
        }

        let typed_dict = self.typing("TypedDict");
        let literal = self.typing("Literal");
        let mut out = String::new();
        for variant in &decl.variants {
            out.push_str(&self.ctx.line(&format!("class {}({}):", variant.name, typed_dict)));
            let fields = self.indented(|this| {
                let mut fields = this.ctx.line(&format!(
                    "{}: {}[{}]",
                    decl.tag_field,
                    literal,
                    quote(&variant.name)
                ));
                for field in &variant.fields {
                    let ty = this.render_type(&field.ty);
                    fields.push_str(&this.ctx.line(&format!("{}: {}", field.name, ty)));
                }
                Ok(fields)
            })?;
            out.push_str(&fields);
            out.push('\n');
        }
        let names: Vec<&str> = decl.variants.iter().map(|v| v.name.as_str()).collect();
        out.push_str(&self.ctx.line(&format!(
            "type {}{} = {}",
            decl.name,
            type_params(&decl.generics),
            names.join(" | ")
        )));
        Ok(out)
    }

    pub(super) fn type_alias(
        &mut self,
        name: &str,
        generics: &[String],
        ty: &TypeExpr,
    ) -> Result<String> {
        let ty = self.render_type(ty);
        Ok(self
            .ctx
            .line(&format!("type {}{} = {}", name, type_params(generics), ty)))
    }

    pub(super) fn import(&mut self, decl: &ImportDecl) -> Result<String> {
        let module = module_path(&decl.source);
        let text = match &decl.namespace {
            Some(namespace) => format!("import {module} as {namespace}"),
            None => {
                let items: Vec<String> = decl
                    .items
                    .iter()
                    .map(|item| match &item.alias {
                        Some(alias) => format!("{} as {}", item.name, alias),
                        None => item.name.clone(),
                    })
                    .collect();
                format!("from {} import {}", module, items.join(", "))
            }
        };
        Ok(self.ctx.line(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::super::PythonBackend;
    use super::module_path;
    use crate::backend::{CodegenBackend, CodegenOptions};
    use crate::CodegenError;
    use faber_ast::{AstBuilder, ClassDecl, FieldDecl, Stmt, Unit};

    fn emit(body: Vec<Stmt>) -> crate::Result<String> {
        PythonBackend::new()
            .unwrap()
            .generate_unit(&Unit::new("probatio", body), &CodegenOptions::default())
    }

    #[test]
    fn test_module_paths() {
        assert_eq!(module_path("./util/text-tools"), "util.text_tools");
        assert_eq!(module_path("norma"), "norma");
    }

    #[test]
    fn test_function_with_types() {
        let b = AstBuilder::new();
        let f = b.function(
            "adde",
            vec![b.param("a", "numerus"), b.param("b", "numerus")],
            Some(b.ty("numerus")),
            vec![b.redde(Some(b.binary(faber_ast::BinaryOp::Add, b.ident("a"), b.ident("b"))))],
        );
        assert_eq!(
            emit(vec![Stmt::Function(f)]).unwrap(),
            "def adde(a: int, b: int) -> int:\n    return a + b\n"
        );
    }

    #[test]
    fn test_bodyless_function_is_fatal() {
        let b = AstBuilder::new();
        let mut f = b.function("vacua", vec![], None, vec![]);
        f.body = None;
        let err = emit(vec![Stmt::Function(f)]).unwrap_err();
        assert!(matches!(err, CodegenError::AbstractWithoutBody { ref name, .. } if name == "vacua"));
    }

    #[test]
    fn test_dataclass_fields() {
        let b = AstBuilder::new();
        let class = ClassDecl {
            name: "Punctum".into(),
            generics: vec![],
            fields: vec![FieldDecl {
                name: "x".into(),
                ty: b.ty("fractus"),
                default: Some(b.float(0.0)),
                is_public: true,
                is_static: false,
            }],
            methods: vec![],
            implements: vec![],
            is_public: true,
            is_abstract: false,
            span: b.span(),
        };
        assert_eq!(
            emit(vec![Stmt::Class(class)]).unwrap(),
            "from dataclasses import dataclass\n\n@dataclass\nclass Punctum:\n    x: float = 0.0\n"
        );
    }

    #[test]
    fn test_union_becomes_typed_dicts() {
        let b = AstBuilder::new();
        let code = emit(vec![b.union(
            "Forma",
            vec![("Circulus", vec![("radius", b.ty("fractus"))]), ("Nihil", vec![])],
        )])
        .unwrap();
        assert!(code.starts_with("from typing import Literal, TypedDict\n"));
        assert!(code.contains(
            "class Circulus(TypedDict):\n    tag: Literal[\"Circulus\"]\n    radius: float\n\n"
        ));
        assert!(code.ends_with("type Forma = Circulus | Nihil\n"));
    }
}
