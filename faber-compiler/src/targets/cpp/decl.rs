use super::CppEmitter;
use crate::backend::utils::{quote, sanitize_identifier};
use crate::backend::Target;
use crate::context::{Features, Scoped};
use crate::targets::StmtEmitter;
use crate::{CodegenError, Result};
use faber_ast::{
    ClassDecl, EnumDecl, Expr, FieldDecl, FunctionDecl, ImportDecl, InterfaceDecl, Literal, Param,
    Stmt, TypeExpr, UnaryOp, UnionDecl, VarDecl, VarKind,
};

/// `./geometria/forma.fab` → `geometria/forma.hpp`
fn include_path(source: &str) -> String {
    let path = source.strip_prefix("./").unwrap_or(source);
    let stem = path.strip_suffix(".fab").unwrap_or(path);
    format!("{stem}.hpp")
}

fn template_header(generics: &[String]) -> Option<String> {
    if generics.is_empty() {
        return None;
    }
    let params: Vec<String> = generics.iter().map(|name| format!("typename {name}")).collect();
    Some(format!("template <{}>", params.join(", ")))
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

/// How a function body is entered: free functions copy, methods also capture `this`
#[derive(Clone, Copy)]
enum Capture {
    Free,
    Member,
}

impl Capture {
    fn list(self) -> &'static str {
        match self {
            Capture::Free => "[=]",
            Capture::Member => "[=, this]",
        }
    }
}

impl CppEmitter {
    fn params(&mut self, params: &[Param]) -> Result<String> {
        let mut out = Vec::with_capacity(params.len());
        for param in params {
            let ty = match &param.ty {
                Some(ty) => self.render_type(ty),
                None => "auto".to_string(),
            };
            let ty = if param.rest {
                self.ctx.require(Features::SEQUENCE);
                format!("std::vector<{ty}>")
            } else {
                ty
            };
            let name = sanitize_identifier(&param.name, Target::Cpp);
            match &param.default {
                Some(default) => out.push(format!("{} {} = {}", ty, name, self.expr(default)?)),
                None => out.push(format!("{ty} {name}")),
            }
        }
        Ok(out.join(", "))
    }

    /// Declared return type; async functions hand back a future
    fn return_type(&mut self, decl: &FunctionDecl) -> Result<(String, String)> {
        if decl.is_generator {
            return Err(CodegenError::unsupported(decl.span, Target::Cpp, "generator function"));
        }
        let value = match &decl.ret {
            Some(ty) => self.render_type(ty),
            None => "void".to_string(),
        };
        if decl.is_async {
            self.ctx.require(Features::ASYNC);
            return Ok((format!("std::future<{value}>"), value));
        }
        Ok((value.clone(), value))
    }

    pub(super) fn var_decl(&mut self, decl: &VarDecl) -> Result<String> {
        let name = sanitize_identifier(&decl.name, Target::Cpp);
        let ty = match &decl.ty {
            Some(ty) => self.render_type(ty),
            None if decl.value.is_some() => "auto".to_string(),
            None => {
                self.ctx.require(Features::TYPING);
                "std::any".to_string()
            }
        };
        let qualified = match decl.kind {
            VarKind::Fixum => format!("const {ty}"),
            VarKind::Varia => ty,
        };
        let text = match &decl.value {
            Some(value) => format!("{} {} = {};", qualified, name, self.expr(value)?),
            None => format!("{qualified} {name};"),
        };
        Ok(self.ctx.line(&text))
    }

    pub(super) fn function(&mut self, decl: &FunctionDecl) -> Result<String> {
        let mut out = String::new();
        if let Some(header) = template_header(&decl.generics) {
            out.push_str(&self.ctx.line(&header));
        }
        let (ret, value) = self.return_type(decl)?;
        let params = self.params(&decl.params)?;
        let name = sanitize_identifier(&decl.name, Target::Cpp);
        let Some(body) = &decl.body else {
            let external = if decl.is_external { "extern " } else { "" };
            out.push_str(&self.ctx.line(&format!("{external}{ret} {name}({params});")));
            return Ok(out);
        };
        let signature = format!("{ret} {name}({params})");
        out.push_str(&self.body_of(&signature, decl, &body.stmts, &value, Capture::Free)?);
        Ok(out)
    }

    /// `signature { body }`, with async bodies running inside `std::async`
    fn body_of(
        &mut self,
        signature: &str,
        decl: &FunctionDecl,
        stmts: &[Stmt],
        value: &str,
        capture: Capture,
    ) -> Result<String> {
        if !decl.is_async {
            let body = self.in_function(false, false, |this| this.braced(stmts))?;
            return Ok(self.ctx.line(&format!("{signature} {body}")));
        }
        let mut out = self.ctx.line(&format!("{signature} {{"));
        out.push_str(&self.indented(|this| {
            let mut inner = this.ctx.line(&format!(
                "return std::async(std::launch::async, {}() -> {} {{",
                capture.list(),
                value
            ));
            inner.push_str(&this.in_function(true, false, |this| this.body(stmts))?);
            inner.push_str(&this.ctx.line("});"));
            Ok(inner)
        })?);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    fn method(&mut self, decl: &FunctionDecl, overrides: bool, is_abstract: bool) -> Result<String> {
        let (ret, value) = self.return_type(decl)?;
        let params = self.params(&decl.params)?;
        let name = sanitize_identifier(&decl.name, Target::Cpp);
        let mut out = String::new();
        if let Some(header) = template_header(&decl.generics) {
            out.push_str(&self.ctx.line(&header));
        }
        let Some(body) = &decl.body else {
            if is_abstract {
                out.push_str(&self.ctx.line(&format!("virtual {ret} {name}({params}) = 0;")));
                return Ok(out);
            }
            return Err(CodegenError::without_body(decl.span, Target::Cpp, &decl.name));
        };
        let suffix = if overrides { " override" } else { "" };
        let signature = format!("{ret} {name}({params}){suffix}");
        out.push_str(&self.body_of(&signature, decl, &body.stmts, &value, Capture::Member)?);
        Ok(out)
    }

    pub(super) fn class(&mut self, decl: &ClassDecl) -> Result<String> {
        let (statics, fields): (Vec<&FieldDecl>, Vec<&FieldDecl>) =
            decl.fields.iter().partition(|field| field.is_static);
        let mut out = String::new();
        if let Some(header) = template_header(&decl.generics) {
            out.push_str(&self.ctx.line(&header));
        }
        let bases = if decl.implements.is_empty() {
            String::new()
        } else {
            let bases: Vec<String> = decl.implements.iter().map(|base| format!("public {base}")).collect();
            format!(" : {}", bases.join(", "))
        };
        let contract_methods: Vec<String> = decl
            .implements
            .iter()
            .filter_map(|contract| self.contracts.get(contract))
            .flatten()
            .cloned()
            .collect();

        out.push_str(&self.ctx.line(&format!("struct {}{} {{", decl.name, bases)));
        let members = self.indented(|this| {
            let mut sections = Vec::new();
            if decl.is_abstract {
                sections.push(this.ctx.line(&format!("virtual ~{}() = default;", decl.name)));
            }

            if !fields.is_empty() {
                let mut lines = String::new();
                for field in &fields {
                    let ty = this.render_type(&field.ty);
                    let name = sanitize_identifier(&field.name, Target::Cpp);
                    let text = match &field.default {
                        Some(value) => format!("{} {} = {};", ty, name, this.expr(value)?),
                        None => format!("{ty} {name};"),
                    };
                    lines.push_str(&this.ctx.line(&text));
                }
                sections.push(lines);
            }

            if !statics.is_empty() {
                let mut lines = String::new();
                for field in &statics {
                    let ty = this.render_type(&field.ty);
                    let name = sanitize_identifier(&field.name, Target::Cpp);
                    let text = match &field.default {
                        Some(value) => format!("static inline {} {} = {};", ty, name, this.expr(value)?),
                        None => format!("static inline {ty} {name}{{}};"),
                    };
                    lines.push_str(&this.ctx.line(&text));
                }
                sections.push(lines);
            }

            if let Some(constructor) = this.constructor(&decl.name, &fields)? {
                sections.push(constructor);
            }
            for method in &decl.methods {
                let overrides = contract_methods.contains(&method.name);
                sections.push(this.method(method, overrides, decl.is_abstract)?);
            }
            Ok(sections.join("\n"))
        })?;
        out.push_str(&members);
        out.push_str(&self.ctx.line("};"));
        Ok(out)
    }

    /// Constructor over every field without a default; none when all have one
    fn constructor(&mut self, class: &str, fields: &[&FieldDecl]) -> Result<Option<String>> {
        let required: Vec<&&FieldDecl> = fields.iter().filter(|field| field.default.is_none()).collect();
        if required.is_empty() {
            return Ok(None);
        }
        let mut params = Vec::with_capacity(required.len());
        let mut inits = Vec::with_capacity(required.len());
        for field in required {
            let name = sanitize_identifier(&field.name, Target::Cpp);
            params.push(format!("{} {}", self.render_type(&field.ty), name));
            inits.push(format!("{name}({name})"));
        }
        Ok(Some(self.ctx.line(&format!(
            "{}({}) : {} {{}}",
            class,
            params.join(", "),
            inits.join(", ")
        ))))
    }

    /// A contract is an abstract base with one pure virtual per method
    pub(super) fn interface(&mut self, decl: &InterfaceDecl) -> Result<String> {
        self.ctx.require(Features::ABSTRACT);
        let mut out = String::new();
        if let Some(header) = template_header(&decl.generics) {
            out.push_str(&self.ctx.line(&header));
        }
        out.push_str(&self.ctx.line(&format!("struct {} {{", decl.name)));
        out.push_str(&self.indented(|this| {
            let mut lines = this.ctx.line(&format!("virtual ~{}() = default;", decl.name));
            for method in &decl.methods {
                let (ret, _) = this.return_type(method)?;
                let params = this.params(&method.params)?;
                let name = sanitize_identifier(&method.name, Target::Cpp);
                lines.push_str(&this.ctx.line(&format!("virtual {ret} {name}({params}) = 0;")));
            }
            Ok(lines)
        })?);
        out.push_str(&self.ctx.line("};"));
        Ok(out)
    }

    pub(super) fn enum_decl(&mut self, decl: &EnumDecl) -> Result<String> {
        self.ctx.require(Features::ENUMS);
        let valued = decl.members.iter().any(|member| member.value.is_some());
        let underlying = if valued { " : int64_t" } else { "" };
        let mut out = self.ctx.line(&format!("enum class {}{} {{", decl.name, underlying));
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
                            Target::Cpp,
                            format!("non-integer value for enum member `{}`", member.name),
                        ))
                    }
                    None => format!("{},", member.name),
                };
                members.push_str(&this.ctx.line(&text));
            }
            Ok(members)
        })?);
        out.push_str(&self.ctx.line("};"));
        Ok(out)
    }

    /// One struct per variant, then the `std::variant` over them
    pub(super) fn union_decl(&mut self, decl: &UnionDecl) -> Result<String> {
        self.ctx.require(Features::VARIANT);
        let header = template_header(&decl.generics);
        let mut sections = Vec::with_capacity(decl.variants.len() + 1);
        for variant in &decl.variants {
            let mut section = String::new();
            if let Some(header) = &header {
                section.push_str(&self.ctx.line(header));
            }
            if variant.fields.is_empty() {
                section.push_str(&self.ctx.line(&format!("struct {} {{}};", variant.name)));
                sections.push(section);
                continue;
            }
            section.push_str(&self.ctx.line(&format!("struct {} {{", variant.name)));
            section.push_str(&self.indented(|this| {
                let mut fields = String::new();
                for field in &variant.fields {
                    let ty = this.render_type(&field.ty);
                    let name = sanitize_identifier(&field.name, Target::Cpp);
                    fields.push_str(&this.ctx.line(&format!("{ty} {name};")));
                }
                Ok(fields)
            })?);
            section.push_str(&self.ctx.line("};"));
            sections.push(section);
        }

        let arguments = if decl.generics.is_empty() {
            String::new()
        } else {
            format!("<{}>", decl.generics.join(", "))
        };
        let alternatives: Vec<String> = decl
            .variants
            .iter()
            .map(|variant| format!("{}{}", variant.name, arguments))
            .collect();
        let mut alias = String::new();
        if let Some(header) = &header {
            alias.push_str(&self.ctx.line(header));
        }
        alias.push_str(&self.ctx.line(&format!(
            "using {} = std::variant<{}>;",
            decl.name,
            alternatives.join(", ")
        )));
        sections.push(alias);
        Ok(sections.join("\n"))
    }

    pub(super) fn type_alias(&mut self, name: &str, generics: &[String], ty: &TypeExpr) -> Result<String> {
        let ty = self.render_type(ty);
        let mut out = String::new();
        if let Some(header) = template_header(generics) {
            out.push_str(&self.ctx.line(&header));
        }
        out.push_str(&self.ctx.line(&format!("using {name} = {ty};")));
        Ok(out)
    }

    /// Every import form includes the whole header
    pub(super) fn import(&mut self, decl: &ImportDecl) -> Result<String> {
        Ok(self
            .ctx
            .line(&format!("#include {}", quote(&include_path(&decl.source)))))
    }
}

#[cfg(test)]
mod tests {
    use super::super::CppBackend;
    use super::*;
    use crate::backend::{CodegenBackend, CodegenOptions};
    use faber_ast::{AstBuilder, BinaryOp, ImportItem, Stmt, Unit};

    fn emit(body: Vec<Stmt>) -> Result<String> {
        let options = CodegenOptions {
            emit_preamble: false,
            ..CodegenOptions::default()
        };
        CppBackend::new()?.generate_unit(&Unit::new("probatio", body), &options)
    }

    #[test]
    fn test_include_path() {
        assert_eq!(include_path("./geometria/forma.fab"), "geometria/forma.hpp");
        assert_eq!(include_path("communia"), "communia.hpp");
    }

    #[test]
    fn test_function() {
        let b = AstBuilder::new();
        let decl = b.function(
            "adde",
            vec![b.param("a", "numerus"), b.param("b", "numerus")],
            Some(b.ty("numerus")),
            vec![b.redde(Some(b.binary(BinaryOp::Add, b.ident("a"), b.ident("b"))))],
        );
        assert_eq!(
            emit(vec![Stmt::Function(decl)]).unwrap(),
            "int64_t adde(int64_t a, int64_t b) {\n    return a + b;\n}\n"
        );
    }

    #[test]
    fn test_bodyless_function_is_prototype() {
        let b = AstBuilder::new();
        let mut decl = b.function("abstracta", vec![b.param("s", "textus")], None, vec![]);
        decl.body = None;
        assert_eq!(
            emit(vec![Stmt::Function(decl)]).unwrap(),
            "void abstracta(std::string s);\n"
        );
    }

    #[test]
    fn test_async_function_returns_future() {
        let b = AstBuilder::new();
        let mut decl = b.function(
            "exspecta",
            vec![],
            Some(b.ty("numerus")),
            vec![b.redde(Some(b.cede(b.call(b.ident("pete"), vec![]))))],
        );
        decl.is_async = true;
        assert_eq!(
            emit(vec![Stmt::Function(decl)]).unwrap(),
            "std::future<int64_t> exspecta() {\n    \
             return std::async(std::launch::async, [=]() -> int64_t {\n        \
             return pete().get();\n    \
             });\n\
             }\n"
        );
    }

    #[test]
    fn test_generator_is_unsupported() {
        let b = AstBuilder::new();
        let mut decl = b.function("genera", vec![], None, vec![]);
        decl.is_generator = true;
        assert!(matches!(
            emit(vec![Stmt::Function(decl)]),
            Err(CodegenError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_class_implements_contract() {
        let b = AstBuilder::new();
        let mut numera = b.function("numera", vec![], Some(b.ty("numerus")), vec![]);
        numera.body = None;
        let contract = InterfaceDecl {
            name: "Numerabilis".into(),
            generics: vec![],
            methods: vec![numera],
            is_public: true,
            span: b.span(),
        };
        let implementation = b.function(
            "numera",
            vec![],
            Some(b.ty("numerus")),
            vec![b.redde(Some(b.member(b.ego(), "numerus")))],
        );
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
            methods: vec![implementation],
            implements: vec!["Numerabilis".into()],
            is_public: true,
            is_abstract: false,
            span: b.span(),
        };
        assert_eq!(
            emit(vec![Stmt::Interface(contract), Stmt::Class(class)]).unwrap(),
            "struct Numerabilis {\n    \
             virtual ~Numerabilis() = default;\n    \
             virtual int64_t numera() = 0;\n\
             };\n\
             \n\
             struct Numerator : public Numerabilis {\n    \
             std::string nomen;\n    \
             int64_t numerus = 0;\n\
             \n    \
             Numerator(std::string nomen) : nomen(nomen) {}\n\
             \n    \
             int64_t numera() override {\n        return this->numerus;\n    }\n\
             };\n"
        );
    }

    #[test]
    fn test_union_becomes_variant() {
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
            "struct Circulus {\n    double radius;\n};\n\
             \n\
             struct Vacuum {};\n\
             \n\
             using Forma = std::variant<Circulus, Vacuum>;\n"
        );
    }

    #[test]
    fn test_import_includes_header() {
        let b = AstBuilder::new();
        let decl = ImportDecl {
            source: "./forma.fab".into(),
            items: vec![ImportItem {
                name: "Forma".into(),
                alias: None,
            }],
            namespace: None,
            span: b.span(),
        };
        assert_eq!(emit(vec![Stmt::Import(decl)]).unwrap(), "#include \"forma.hpp\"\n");
    }
}
