use super::CppEmitter;
use crate::analysis::{escaping_jump, is_trivially_pure, pattern_bindings};
use crate::backend::utils::{quote, sanitize_identifier, snake_identifier};
use crate::backend::Target;
use crate::context::{Features, Scoped};
use crate::targets::{check_bindings, needs_parens_tight, paren_if, StmtEmitter};
use crate::{CodegenError, Result};
use faber_ast::{
    AllocatorKind, Block, CatchClause, Expr, IterMode, Literal, MatchStmt, Pattern, PrintLevel,
    Resource, ScopeStmt, Stmt, SwitchCase,
};

impl CppEmitter {
    pub(super) fn emit_stmt(&mut self, stmt: &Stmt) -> Result<String> {
        match stmt {
            Stmt::Block(block) => {
                let block = self.braced(&block.stmts)?;
                Ok(self.ctx.line(&block))
            }
            Stmt::Expr { expr, .. } => {
                let text = self.expr(expr)?;
                Ok(self.ctx.line(&format!("{text};")))
            }
            Stmt::Var(decl) => self.var_decl(decl),
            Stmt::Function(decl) => self.function(decl),
            Stmt::Class(decl) => self.class(decl),
            Stmt::Interface(decl) => self.interface(decl),
            Stmt::Enum(decl) => self.enum_decl(decl),
            Stmt::Union(decl) => self.union_decl(decl),
            Stmt::TypeAlias {
                name, generics, ty, ..
            } => self.type_alias(name, generics, ty),
            Stmt::Import(decl) => self.import(decl),
            Stmt::If {
                cond,
                then,
                otherwise,
                ..
            } => {
                let chain = self.if_chain(cond, then, otherwise.as_deref())?;
                Ok(self.ctx.line(&chain))
            }
            Stmt::While { cond, body, .. } => {
                let cond = self.expr(cond)?;
                let body = self.braced(&body.stmts)?;
                Ok(self.ctx.line(&format!("while ({cond}) {body}")))
            }
            Stmt::DoWhile { body, cond, .. } => {
                let body = self.braced(&body.stmts)?;
                let cond = self.expr(cond)?;
                Ok(self.ctx.line(&format!("do {body} while ({cond});")))
            }
            Stmt::For {
                binding,
                iterable,
                body,
                mode,
                is_async,
                span,
            } => {
                if *is_async {
                    return Err(CodegenError::unsupported(*span, Target::Cpp, "async iteration"));
                }
                self.for_loop(binding, iterable, body, *mode)
            }
            Stmt::Switch {
                subject,
                cases,
                default,
                ..
            } => self.switch(subject, cases, default.as_ref()),
            Stmt::Match(stmt) => self.match_stmt(stmt),
            Stmt::Guard { clauses, .. } => {
                let mut out = String::new();
                for clause in clauses {
                    let cond = self.expr(&clause.cond)?;
                    let body = self.braced(&clause.body.stmts)?;
                    out.push_str(&self.ctx.line(&format!("if ({cond}) {body}")));
                }
                Ok(out)
            }
            Stmt::Try {
                body,
                catch,
                finally,
                ..
            } => self.try_stmt(body, catch.as_ref(), finally.as_ref()),
            Stmt::Return { value, .. } => match value {
                Some(value) => {
                    let value = self.expr(value)?;
                    Ok(self.ctx.line(&format!("return {value};")))
                }
                None => Ok(self.ctx.line("return;")),
            },
            Stmt::Throw { value, fatal, .. } => {
                let text = self.expr(value)?;
                if *fatal {
                    self.ctx.require(Features::CONSOLE);
                    let mut out = self.ctx.line("{");
                    out.push_str(&self.indented(|this| {
                        let mut inner = this.ctx.line(&format!("std::cerr << {text} << std::endl;"));
                        inner.push_str(&this.ctx.line("std::exit(1);"));
                        Ok(inner)
                    })?);
                    out.push_str(&self.ctx.line("}"));
                    Ok(out)
                } else {
                    self.ctx.require(Features::EXCEPTIONS);
                    Ok(self.ctx.line(&format!("throw std::runtime_error({text});")))
                }
            }
            Stmt::Print { level, args, .. } => self.print(*level, args),
            Stmt::Assert { cond, message, .. } => {
                let cond = self.expr(cond)?;
                match message {
                    Some(Expr::Literal {
                        value: Literal::Text(text),
                        ..
                    }) => {
                        self.ctx.require(Features::ASSERT);
                        Ok(self.ctx.line(&format!("assert(({cond}) && {});", quote(text))))
                    }
                    Some(message) => {
                        self.ctx.require(Features::CONSOLE);
                        let message = self.expr(message)?;
                        Ok(self.ctx.line(&format!(
                            "if (!({cond})) {{ std::cerr << {message} << std::endl; std::abort(); }}"
                        )))
                    }
                    None => {
                        self.ctx.require(Features::ASSERT);
                        Ok(self.ctx.line(&format!("assert({cond});")))
                    }
                }
            }
            Stmt::Break { .. } => Ok(self.ctx.line("break;")),
            Stmt::Continue { .. } => Ok(self.ctx.line("continue;")),
            Stmt::Entry { body, .. } => self.stmts(&body.stmts),
            Stmt::Scope(scope) => self.scope(scope),
            Stmt::TestSuite { name, body, .. } => {
                self.ctx.require(Features::TESTING);
                let saved = self.suite.replace(name.clone());
                let members: Vec<&Stmt> = body.iter().collect();
                let result = self.items(&members);
                self.suite = saved;
                let mut out = self.ctx.line(&format!("// probandum: {name}"));
                out.push_str(&result?);
                Ok(out)
            }
            Stmt::Test { name, body, .. } => {
                self.ctx.require(Features::TESTING);
                let function = match &self.suite {
                    Some(suite) => format!("test_{}_{}", snake_identifier(suite), snake_identifier(name)),
                    None => format!("test_{}", snake_identifier(name)),
                };
                let body = self.in_function(false, false, |this| this.braced(&body.stmts))?;
                Ok(self.ctx.line(&format!("void {function}() {body}")))
            }
        }
    }

    /// `{ prelude; stmts }` closing at the current depth, `{}` when both are empty
    pub(super) fn block_with(&mut self, prelude: &[String], stmts: &[Stmt]) -> Result<String> {
        if prelude.is_empty() {
            return self.braced(stmts);
        }
        let body = self.indented(|this| {
            let mut inner = String::new();
            for line in prelude {
                inner.push_str(&this.ctx.line(line));
            }
            inner.push_str(&this.stmts(stmts)?);
            Ok(inner)
        })?;
        Ok(format!("{{\n{}{}}}", body, self.ctx.indent()))
    }

    fn if_chain(&mut self, cond: &Expr, then: &Block, otherwise: Option<&Stmt>) -> Result<String> {
        let mut text = format!("if ({}) {}", self.expr(cond)?, self.braced(&then.stmts)?);
        match otherwise {
            None => {}
            Some(Stmt::If {
                cond,
                then,
                otherwise,
                ..
            }) => {
                text.push_str(" else ");
                text.push_str(&self.if_chain(cond, then, otherwise.as_deref())?);
            }
            Some(Stmt::Block(block)) => {
                text.push_str(" else ");
                text.push_str(&self.braced(&block.stmts)?);
            }
            Some(other) => {
                text.push_str(" else ");
                text.push_str(&self.braced(std::slice::from_ref(other))?);
            }
        }
        Ok(text)
    }

    fn for_loop(&mut self, binding: &str, iterable: &Expr, body: &Block, mode: IterMode) -> Result<String> {
        let binding = sanitize_identifier(binding, Target::Cpp);
        match (mode, iterable) {
            (
                IterMode::Values,
                Expr::Range {
                    start,
                    end,
                    inclusive,
                    ..
                },
            ) => {
                let start = self.expr(start)?;
                let end = self.expr(end)?;
                let cmp = if *inclusive { "<=" } else { "<" };
                let body = self.braced(&body.stmts)?;
                Ok(self.ctx.line(&format!(
                    "for (int64_t {binding} = {start}; {binding} {cmp} {end}; ++{binding}) {body}"
                )))
            }
            (IterMode::Keys, iterable) => {
                let source = self.expr(iterable)?;
                let prelude = [format!("const auto& {binding} = __entry.first;")];
                let body = self.block_with(&prelude, &body.stmts)?;
                Ok(self.ctx.line(&format!("for (const auto& __entry : {source}) {body}")))
            }
            (IterMode::Values, iterable) => {
                let source = paren_if(self.expr(iterable)?, needs_parens_tight(iterable));
                let body = self.braced(&body.stmts)?;
                Ok(self.ctx.line(&format!("for (const auto& {binding} : {source}) {body}")))
            }
        }
    }

    /// `case` label when a value is an integer or a member of a declared enum
    fn case_label(&self, value: &Expr) -> Option<String> {
        match value {
            Expr::Literal {
                value: Literal::Integer(n),
                ..
            } => Some(n.to_string()),
            Expr::Member { object, name, .. } => match object.as_ref() {
                Expr::Ident { name: owner, .. } if self.enums.contains_key(owner) => {
                    Some(format!("{owner}::{name}"))
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Case body followed by `break;`, so cases never fall through
    fn case_body(&mut self, label: &str, stmts: &[Stmt], breaks: bool) -> Result<String> {
        let mut out = self.ctx.line(&format!("{label}: {{"));
        out.push_str(&self.indented(|this| {
            let mut inner = this.stmts(stmts)?;
            if breaks {
                inner.push_str(&this.ctx.line("break;"));
            }
            Ok(inner)
        })?);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    fn switch(&mut self, subject: &Expr, cases: &[SwitchCase], default: Option<&Block>) -> Result<String> {
        let labels: Option<Vec<String>> = cases.iter().map(|case| self.case_label(&case.value)).collect();

        if let Some(labels) = labels.filter(|labels| !labels.is_empty()) {
            let subject = self.expr(subject)?;
            let mut out = self.ctx.line(&format!("switch ({subject}) {{"));
            out.push_str(&self.indented(|this| {
                let mut arms = String::new();
                for (label, case) in labels.iter().zip(cases) {
                    arms.push_str(&this.case_body(&format!("case {label}"), &case.body.stmts, true)?);
                }
                if let Some(block) = default {
                    arms.push_str(&this.case_body("default", &block.stmts, false)?);
                }
                Ok(arms)
            })?);
            out.push_str(&self.ctx.line("}"));
            return Ok(out);
        }

        let mut out = String::new();
        let name = if is_trivially_pure(subject) {
            self.expr(subject)?
        } else {
            let name = self.ctx.fresh_temp("s");
            let value = self.expr(subject)?;
            out.push_str(&self.ctx.line(&format!("const auto {name} = {value};")));
            name
        };
        if cases.is_empty() {
            if let Some(block) = default {
                let body = self.braced(&block.stmts)?;
                out.push_str(&self.ctx.line(&body));
            }
            return Ok(out);
        }
        let mut chain = String::new();
        for (i, case) in cases.iter().enumerate() {
            let value = self.expr(&case.value)?;
            let body = self.braced(&case.body.stmts)?;
            if i > 0 {
                chain.push_str(" else ");
            }
            chain.push_str(&format!("if ({name} == {value}) {body}"));
        }
        if let Some(block) = default {
            chain.push_str(&format!(" else {}", self.braced(&block.stmts)?));
        }
        out.push_str(&self.ctx.line(&chain));
        Ok(out)
    }

    /// `std::visit` over an overload set with one lambda per arm
    fn match_stmt(&mut self, stmt: &MatchStmt) -> Result<String> {
        self.ctx.require(Features::VISITOR | Features::VARIANT);
        let subject = match &stmt.subject {
            Expr::SelfRef { .. } => "*this".to_string(),
            other => self.expr(other)?,
        };
        let info = stmt
            .union
            .as_deref()
            .and_then(|name| self.ctx.union(name))
            .or_else(|| {
                stmt.arms.iter().find_map(|arm| match &arm.pattern {
                    Pattern::Variant { name, .. } => self.ctx.union_of_variant(name),
                    Pattern::Wildcard => None,
                })
            })
            .cloned();
        let wildcard = stmt.arms.iter().any(|arm| arm.pattern == Pattern::Wildcard);
        let exhaustive = wildcard
            || info.as_ref().is_some_and(|info| {
                info.variants.iter().all(|(variant, _)| {
                    stmt.arms.iter().any(|arm| {
                        matches!(&arm.pattern, Pattern::Variant { name, .. } if name == variant)
                    })
                })
            });

        let mut out = self.ctx.line("std::visit(faber::overloaded{");
        out.push_str(&self.indented(|this| {
            let mut lambdas = String::new();
            for arm in &stmt.arms {
                // Arms become lambdas, so a jump would only leave the lambda
                if let Some(span) = escaping_jump(&arm.body.stmts) {
                    return Err(CodegenError::unsupported(
                        span,
                        Target::Cpp,
                        "control flow out of a discerne arm",
                    ));
                }
                let line = match &arm.pattern {
                    Pattern::Variant { name, .. } => {
                        let bindings = pattern_bindings(&arm.pattern);
                        check_bindings(info.as_ref(), name, bindings, arm.span, Target::Cpp)?;
                        let prelude: Vec<String> = bindings
                            .iter()
                            .map(|binding| {
                                let field = sanitize_identifier(binding, Target::Cpp);
                                format!("const auto& {field} = __v.{field};")
                            })
                            .collect();
                        let parameter = if prelude.is_empty() {
                            format!("const {name}&")
                        } else {
                            format!("const {name}& __v")
                        };
                        let body = this.block_with(&prelude, &arm.body.stmts)?;
                        format!("[&]({parameter}) {body},")
                    }
                    Pattern::Wildcard => {
                        let body = this.braced(&arm.body.stmts)?;
                        format!("[&](const auto&) {body},")
                    }
                };
                lambdas.push_str(&this.ctx.line(&line));
            }
            if !exhaustive {
                lambdas.push_str(&this.ctx.line("[&](const auto&) {},"));
            }
            Ok(lambdas)
        })?);
        out.push_str(&self.ctx.line(&format!("}}, {subject});")));
        Ok(out)
    }

    fn try_stmt(&mut self, body: &Block, catch: Option<&CatchClause>, finally: Option<&Block>) -> Result<String> {
        let finally = finally.filter(|block| !block.is_empty());
        let Some(finally) = finally else {
            let text = self.try_catch(body, catch)?;
            return Ok(self.ctx.line(&text));
        };
        self.ctx.require(Features::SCOPE_GUARD);
        let guard = self.ctx.fresh_temp("finally");
        let mut out = self.ctx.line("{");
        out.push_str(&self.indented(|this| {
            let cleanup = this.braced(&finally.stmts)?;
            let mut inner = this.ctx.line(&format!("faber::ScopeGuard {guard}([&] {cleanup});"));
            match catch {
                Some(_) => {
                    let text = this.try_catch(body, catch)?;
                    inner.push_str(&this.ctx.line(&text));
                }
                None => inner.push_str(&this.stmts(&body.stmts)?),
            }
            Ok(inner)
        })?);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    fn try_catch(&mut self, body: &Block, catch: Option<&CatchClause>) -> Result<String> {
        let body = self.braced(&body.stmts)?;
        match catch {
            Some(clause) => {
                self.ctx.require(Features::EXCEPTIONS);
                let binding = sanitize_identifier(&clause.binding, Target::Cpp);
                let handler = self.braced(&clause.body.stmts)?;
                Ok(format!("try {body} catch (const std::exception& {binding}) {handler}"))
            }
            None => Ok(body),
        }
    }

    fn print(&mut self, level: PrintLevel, args: &[Expr]) -> Result<String> {
        self.ctx.require(Features::CONSOLE);
        let stream = match level {
            PrintLevel::Log => "std::cout",
            PrintLevel::Debug => "std::clog",
            PrintLevel::Warn => "std::cerr",
        };
        let mut pieces = Vec::with_capacity(args.len() * 2);
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                pieces.push("\" \"".to_string());
            }
            let piece = match arg {
                Expr::Literal {
                    value: Literal::Text(text),
                    ..
                } => quote(text),
                other => self.expr(other)?,
            };
            pieces.push(piece);
        }
        pieces.push("std::endl".to_string());
        Ok(self.ctx.line(&format!("{} << {};", stream, pieces.join(" << "))))
    }

    fn scope(&mut self, scope: &ScopeStmt) -> Result<String> {
        match &scope.resource {
            Resource::Allocator { kind } => self.allocator_scope(*kind, scope),
            Resource::Value { init, release } => {
                self.ctx.require(Features::SCOPE_GUARD);
                let init = self.expr(init)?;
                let binding = scope
                    .binding
                    .as_deref()
                    .map(|name| sanitize_identifier(name, Target::Cpp))
                    .unwrap_or_else(|| "resource".to_string());
                let release = release.as_deref().unwrap_or("close");
                let mut out = self.ctx.line("{");
                out.push_str(&self.indented(|this| {
                    let mut inner = this.ctx.line(&format!("auto {binding} = {init};"));
                    inner.push_str(&this.ctx.line(&format!(
                        "faber::ScopeGuard __guard_{binding}([&] {{ {binding}.{release}(); }});"
                    )));
                    inner.push_str(&this.stmts(&scope.body.stmts)?);
                    Ok(inner)
                })?);
                out.push_str(&self.ctx.line("}"));
                Ok(out)
            }
        }
    }

    /// A `std::pmr` memory resource that lives for the block
    fn allocator_scope(&mut self, kind: AllocatorKind, scope: &ScopeStmt) -> Result<String> {
        self.ctx.require(Features::MEMORY_RESOURCE);
        let name = scope
            .binding
            .as_deref()
            .map(|name| sanitize_identifier(name, Target::Cpp))
            .unwrap_or_else(|| "alloc".to_string());

        let mut out = self.ctx.line("{");
        out.push_str(&self.indented(|this| {
            let mut inner = match kind {
                AllocatorKind::Arena => this.ctx.line(&format!("std::pmr::monotonic_buffer_resource {name};")),
                AllocatorKind::Page => this.ctx.line(&format!(
                    "std::pmr::memory_resource* {name} = std::pmr::new_delete_resource();"
                )),
            };
            let (body, used) = this.with_allocator(&name, |inner| inner.stmts(&scope.body.stmts))?;
            inner.push_str(&body);
            if !used && !body.contains(name.as_str()) {
                inner.push_str(&this.ctx.line(&format!("(void){name};")));
            }
            Ok(inner)
        })?);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::super::CppBackend;
    use crate::backend::{CodegenBackend, CodegenOptions};
    use faber_ast::{AllocatorKind, AstBuilder, BinaryOp, CatchClause, Stmt, Unit};

    fn emit(body: Vec<Stmt>) -> String {
        let options = CodegenOptions {
            emit_preamble: false,
            ..CodegenOptions::default()
        };
        CppBackend::new()
            .unwrap()
            .generate_unit(&Unit::new("probatio", body), &options)
            .unwrap()
    }

    #[test]
    fn test_match_expands_to_visit() {
        let b = AstBuilder::new();
        let code = emit(vec![
            b.union(
                "Forma",
                vec![
                    ("Circulus", vec![("radius", b.ty("fractus"))]),
                    ("Vacuum", vec![]),
                ],
            ),
            b.discerne(
                b.ident("forma"),
                Some("Forma"),
                vec![
                    b.arm("Circulus", &["radius"], vec![b.scribe(vec![b.ident("radius")])]),
                    b.arm("Vacuum", &[], vec![]),
                ],
            ),
        ]);
        assert!(code.contains(
            "    std::visit(faber::overloaded{\n        \
             [&](const Circulus& __v) {\n            \
             const auto& radius = __v.radius;\n            \
             std::cout << radius << std::endl;\n        \
             },\n        \
             [&](const Vacuum&) {},\n    \
             }, forma);\n"
        ));
        assert!(!code.contains("const auto&) {}"));
    }

    #[test]
    fn test_match_reads_fields_by_name() {
        let b = AstBuilder::new();
        let code = emit(vec![
            b.union(
                "Punctum",
                vec![("Planum", vec![("x", b.ty("numerus")), ("y", b.ty("numerus"))])],
            ),
            b.discerne(
                b.ident("p"),
                Some("Punctum"),
                vec![b.arm("Planum", &["y", "x"], vec![b.scribe(vec![b.ident("y"), b.ident("x")])])],
            ),
        ]);
        assert!(
            code.contains("const auto& y = __v.y;\n            const auto& x = __v.x;\n"),
            "{code}"
        );
    }

    #[test]
    fn test_jump_out_of_arm_is_unsupported() {
        let b = AstBuilder::new();
        let union = b.union("Forma", vec![("Circulus", vec![]), ("Vacuum", vec![])]);
        let returning = b.function(
            "f",
            vec![b.param("forma", "Forma")],
            Some(b.ty("numerus")),
            vec![
                b.discerne(
                    b.ident("forma"),
                    Some("Forma"),
                    vec![b.arm("Circulus", &[], vec![b.redde(Some(b.int(1)))])],
                ),
                b.redde(Some(b.int(0))),
            ],
        );
        let err = CppBackend::new()
            .unwrap()
            .generate_unit(
                &Unit::new("probatio", vec![union.clone(), Stmt::Function(returning)]),
                &CodegenOptions::default(),
            )
            .unwrap_err();
        assert!(err.is_translation_failure());
        assert!(err.to_string().contains("discerne arm"), "{err}");

        let looping = b.while_loop(
            b.bool(true),
            vec![b.discerne(
                b.ident("forma"),
                Some("Forma"),
                vec![b.arm("Vacuum", &[], vec![Stmt::Break { span: b.span() }])],
            )],
        );
        let err = CppBackend::new()
            .unwrap()
            .generate_unit(
                &Unit::new("probatio", vec![union.clone(), b.entry(vec![looping])]),
                &CodegenOptions::default(),
            )
            .unwrap_err();
        assert!(err.is_translation_failure());

        let contained = b.discerne(
            b.ident("forma"),
            Some("Forma"),
            vec![b.arm(
                "Vacuum",
                &[],
                vec![b.while_loop(b.bool(true), vec![Stmt::Break { span: b.span() }])],
            )],
        );
        let code = emit(vec![union, b.entry(vec![contained])]);
        assert!(code.contains("break;"), "{code}");
    }

    #[test]
    fn test_partial_match_gets_fallback_lambda() {
        let b = AstBuilder::new();
        let code = emit(vec![
            b.union("Forma", vec![("Circulus", vec![]), ("Vacuum", vec![])]),
            b.discerne(b.ident("forma"), None, vec![b.arm("Circulus", &[], vec![])]),
        ]);
        assert!(code.contains("        [&](const auto&) {},\n"));
    }

    #[test]
    fn test_do_while() {
        let b = AstBuilder::new();
        let body = vec![b.expr_stmt(b.assign(b.ident("i"), b.binary(BinaryOp::Add, b.ident("i"), b.int(1))))];
        let code = emit(vec![Stmt::DoWhile {
            body: b.block(body),
            cond: b.binary(BinaryOp::Lt, b.ident("i"), b.int(3)),
            span: b.span(),
        }]);
        assert!(code.contains("    do {\n        i = i + 1;\n    } while (i < 3);\n"));
    }

    #[test]
    fn test_range_loop() {
        let b = AstBuilder::new();
        let code = emit(vec![b.for_each(
            "i",
            b.range(b.int(0), b.int(3), true),
            vec![b.scribe(vec![b.text("i ="), b.ident("i")])],
        )]);
        assert!(code.contains(
            "    for (int64_t i = 0; i <= 3; ++i) {\n        std::cout << \"i =\" << \" \" << i << std::endl;\n    }\n"
        ));
    }

    #[test]
    fn test_resource_scope_uses_guard() {
        let b = AstBuilder::new();
        let code = emit(vec![b.resource_scope(
            b.call(b.ident("aperi"), vec![b.text("data.txt")]),
            "fh",
            vec![],
        )]);
        assert!(code.contains(
            "    {\n        auto fh = aperi(std::string(\"data.txt\"));\n        \
             faber::ScopeGuard __guard_fh([&] { fh.close(); });\n    }\n"
        ));
    }

    #[test]
    fn test_page_scope() {
        let b = AstBuilder::new();
        let code = emit(vec![b.allocator_scope(AllocatorKind::Page, Some("mem"), vec![])]);
        assert!(code.contains(
            "std::pmr::memory_resource* mem = std::pmr::new_delete_resource();\n        (void)mem;\n"
        ));
    }

    #[test]
    fn test_try_catch_finally() {
        let b = AstBuilder::new();
        let code = emit(vec![Stmt::Try {
            body: b.block(vec![b.expr_stmt(b.call(b.ident("f"), vec![]))]),
            catch: Some(CatchClause {
                binding: "e".into(),
                body: b.block(vec![]),
            }),
            finally: Some(b.block(vec![b.expr_stmt(b.call(b.ident("g"), vec![]))])),
            span: b.span(),
        }]);
        assert!(code.contains(
            "    {\n        \
             faber::ScopeGuard __finally0([&] {\n            g();\n        });\n        \
             try {\n            f();\n        } catch (const std::exception& e) {}\n    }\n"
        ));
    }

    #[test]
    fn test_suite_becomes_functions() {
        let b = AstBuilder::new();
        let code = emit(vec![Stmt::TestSuite {
            name: "Arithmetica".into(),
            body: vec![Stmt::Test {
                name: "adde duo".into(),
                body: b.block(vec![]),
                span: b.span(),
            }],
            span: b.span(),
        }]);
        assert_eq!(code, "// probandum: Arithmetica\nvoid test_arithmetica_adde_duo() {}\n");
    }
}
