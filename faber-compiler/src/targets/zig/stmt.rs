use super::expr::{escape_braces, specifier};
use super::{methods, ZigEmitter};
use crate::analysis::{is_trivially_pure, pattern_bindings};
use crate::backend::utils::{quote, sanitize_identifier};
use crate::backend::Target;
use crate::context::{Features, Scoped};
use crate::targets::{check_bindings, needs_parens_tight, paren_if, StmtEmitter};
use crate::{CodegenError, Result};
use faber_ast::{
    AllocatorKind, Block, Expr, IterMode, Literal, MatchStmt, Pattern, PrintLevel, Resource,
    ScopeStmt, Stmt, SwitchCase,
};

/// A call to a built-in whose Zig form yields a value that must be discarded
fn discarded_result(expr: &Expr) -> bool {
    match expr {
        Expr::Call {
            callee,
            receiver: Some(kind),
            ..
        } => match callee.as_ref() {
            Expr::Member { name, .. } => !methods::returns_void(*kind, name),
            _ => false,
        },
        _ => false,
    }
}

impl ZigEmitter {
    pub(super) fn emit_stmt(&mut self, stmt: &Stmt) -> Result<String> {
        match stmt {
            Stmt::Block(block) => {
                let block = self.braced(&block.stmts)?;
                Ok(self.ctx.line(&block))
            }
            Stmt::Expr { expr, .. } => {
                let text = self.expr(expr)?;
                if discarded_result(expr) {
                    Ok(self.ctx.line(&format!("_ = {text};")))
                } else {
                    Ok(self.ctx.line(&format!("{text};")))
                }
            }
            Stmt::Var(decl) => self.var_decl(decl),
            Stmt::Function(decl) => self.function(decl, decl.is_public),
            Stmt::Class(decl) => self.class(decl),
            Stmt::Interface(decl) => self.interface(decl),
            Stmt::Enum(decl) => self.enum_decl(decl),
            Stmt::Union(decl) => self.union_decl(decl),
            Stmt::TypeAlias {
                name,
                generics,
                ty,
                is_public,
                ..
            } => self.type_alias(name, generics, ty, *is_public),
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
                let cond = self.expr(cond)?;
                let mut out = self.ctx.line("while (true) {");
                out.push_str(&self.indented(|this| {
                    let mut inner = this.stmts(&body.stmts)?;
                    inner.push_str(&this.ctx.line(&format!("if (!({cond})) break;")));
                    Ok(inner)
                })?);
                out.push_str(&self.ctx.line("}"));
                Ok(out)
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
                    return Err(CodegenError::unsupported(*span, Target::Zig, "async iteration"));
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
                span,
            } => {
                if catch.is_some() {
                    return Err(CodegenError::unsupported(*span, Target::Zig, "cape (catching errors)"));
                }
                self.try_finally(body, finally.as_ref())
            }
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
                    let spec = specifier(value);
                    let mut out = self.ctx.line("{");
                    out.push_str(&self.indented(|this| {
                        let mut inner = this
                            .ctx
                            .line(&format!("std.debug.print(\"{{{spec}}}\\n\", .{{{text}}});"));
                        inner.push_str(&this.ctx.line("std.process.exit(1);"));
                        Ok(inner)
                    })?);
                    out.push_str(&self.ctx.line("}"));
                    Ok(out)
                } else {
                    Ok(self.ctx.line(&format!("@panic({text});")))
                }
            }
            Stmt::Print { level, args, .. } => self.print(*level, args),
            Stmt::Assert { cond, message, .. } => {
                let cond = self.expr(cond)?;
                let text = match message {
                    Some(message) => format!("if (!({})) @panic({});", cond, self.expr(message)?),
                    None => format!("std.debug.assert({cond});"),
                };
                Ok(self.ctx.line(&text))
            }
            Stmt::Break { .. } => Ok(self.ctx.line("break;")),
            Stmt::Continue { .. } => Ok(self.ctx.line("continue;")),
            Stmt::Entry { body, is_async, span } => {
                if *is_async {
                    return Err(CodegenError::unsupported(*span, Target::Zig, "incipiet (async entry)"));
                }
                self.stmts(&body.stmts)
            }
            Stmt::Scope(scope) => self.scope(scope),
            Stmt::TestSuite { name, body, .. } => {
                self.ctx.require(Features::TESTING);
                let saved = self.suite.replace(name.clone());
                let members: Vec<&Stmt> = body.iter().collect();
                let result = self.items(&members);
                self.suite = saved;
                result
            }
            Stmt::Test { name, body, .. } => {
                self.ctx.require(Features::TESTING);
                let title = match &self.suite {
                    Some(suite) => format!("{suite}: {name}"),
                    None => name.clone(),
                };
                let body = self.braced(&body.stmts)?;
                Ok(self.ctx.line(&format!("test {} {}", quote(&title), body)))
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
        let binding = sanitize_identifier(binding, Target::Zig);
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
                let mut out = self.ctx.line("{");
                out.push_str(&self.indented(|this| {
                    let mut inner = this.ctx.line(&format!("var {binding}: i64 = {start};"));
                    let body = this.braced(&body.stmts)?;
                    inner.push_str(&this.ctx.line(&format!(
                        "while ({binding} {cmp} {end}) : ({binding} += 1) {body}"
                    )));
                    Ok(inner)
                })?);
                out.push_str(&self.ctx.line("}"));
                Ok(out)
            }
            (IterMode::Keys, iterable) => {
                let source = paren_if(self.expr(iterable)?, needs_parens_tight(iterable));
                let cursor = self.ctx.fresh_temp("it");
                let mut out = self.ctx.line("{");
                out.push_str(&self.indented(|this| {
                    let mut inner = this.ctx.line(&format!("var {cursor} = {source}.keyIterator();"));
                    let prelude = [format!("const {binding} = __k.*;")];
                    let body = this.block_with(&prelude, &body.stmts)?;
                    inner.push_str(&this.ctx.line(&format!("while ({cursor}.next()) |__k| {body}")));
                    Ok(inner)
                })?);
                out.push_str(&self.ctx.line("}"));
                Ok(out)
            }
            (IterMode::Values, iterable) => {
                let source = paren_if(self.expr(iterable)?, needs_parens_tight(iterable));
                let body = self.braced(&body.stmts)?;
                Ok(self.ctx.line(&format!("for ({source}.items) |{binding}| {body}")))
            }
        }
    }

    /// Switch prong label when a case value can be matched structurally
    fn case_label(&self, value: &Expr) -> Option<String> {
        match value {
            Expr::Literal {
                value: Literal::Integer(n),
                ..
            } => Some(n.to_string()),
            Expr::Member { object, name, .. } => match object.as_ref() {
                Expr::Ident { name: owner, .. } if self.enums.contains_key(owner) => {
                    Some(format!(".{name}"))
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Enum whose members all appear among the cases
    fn covers_enum(&self, cases: &[SwitchCase]) -> bool {
        let owner = cases.iter().find_map(|case| match &case.value {
            Expr::Member { object, .. } => object.as_ident(),
            _ => None,
        });
        let Some(members) = owner.and_then(|owner| self.enums.get(owner)) else {
            return false;
        };
        members.iter().all(|member| {
            cases
                .iter()
                .any(|case| matches!(&case.value, Expr::Member { name, .. } if name == member))
        })
    }

    fn switch(&mut self, subject: &Expr, cases: &[SwitchCase], default: Option<&Block>) -> Result<String> {
        let labels: Option<Vec<String>> = cases.iter().map(|case| self.case_label(&case.value)).collect();

        if let Some(labels) = labels.filter(|labels| !labels.is_empty()) {
            let exhaustive = self.covers_enum(cases);
            let subject = self.expr(subject)?;
            let mut out = self.ctx.line(&format!("switch ({subject}) {{"));
            out.push_str(&self.indented(|this| {
                let mut prongs = String::new();
                for (label, case) in labels.iter().zip(cases) {
                    let body = this.braced(&case.body.stmts)?;
                    prongs.push_str(&this.ctx.line(&format!("{label} => {body},")));
                }
                match default {
                    Some(block) => {
                        let body = this.braced(&block.stmts)?;
                        prongs.push_str(&this.ctx.line(&format!("else => {body},")));
                    }
                    None if !exhaustive => prongs.push_str(&this.ctx.line("else => {},")),
                    None => {}
                }
                Ok(prongs)
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
            out.push_str(&self.ctx.line(&format!("const {name} = {value};")));
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
            let test = match &case.value {
                Expr::Literal {
                    value: Literal::Text(_),
                    ..
                } => format!("std.mem.eql(u8, {name}, {value})"),
                _ => format!("{name} == {value}"),
            };
            let body = self.braced(&case.body.stmts)?;
            if i > 0 {
                chain.push_str(" else ");
            }
            chain.push_str(&format!("if ({test}) {body}"));
        }
        if let Some(block) = default {
            chain.push_str(&format!(" else {}", self.braced(&block.stmts)?));
        }
        out.push_str(&self.ctx.line(&chain));
        Ok(out)
    }

    fn match_stmt(&mut self, stmt: &MatchStmt) -> Result<String> {
        let subject = match &stmt.subject {
            Expr::SelfRef { .. } => "self.*".to_string(),
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

        let mut out = self.ctx.line(&format!("switch ({subject}) {{"));
        out.push_str(&self.indented(|this| {
            let mut prongs = String::new();
            for arm in &stmt.arms {
                let line = match &arm.pattern {
                    Pattern::Variant { name, .. } => {
                        let bindings = pattern_bindings(&arm.pattern);
                        check_bindings(info.as_ref(), name, bindings, arm.span, Target::Zig)?;
                        let prelude: Vec<String> = bindings
                            .iter()
                            .map(|binding| {
                                let field = sanitize_identifier(binding, Target::Zig);
                                format!("const {field} = __v.{field};")
                            })
                            .collect();
                        let capture = if prelude.is_empty() { "" } else { " |__v|" };
                        let body = this.block_with(&prelude, &arm.body.stmts)?;
                        format!(".{name} =>{capture} {body},")
                    }
                    Pattern::Wildcard => {
                        let body = this.braced(&arm.body.stmts)?;
                        format!("else => {body},")
                    }
                };
                prongs.push_str(&this.ctx.line(&line));
            }
            if !exhaustive {
                prongs.push_str(&this.ctx.line("else => {},"));
            }
            Ok(prongs)
        })?);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    fn try_finally(&mut self, body: &Block, finally: Option<&Block>) -> Result<String> {
        let Some(finally) = finally.filter(|block| !block.is_empty()) else {
            let block = self.braced(&body.stmts)?;
            return Ok(self.ctx.line(&block));
        };
        let mut out = self.ctx.line("{");
        out.push_str(&self.indented(|this| {
            let cleanup = this.braced(&finally.stmts)?;
            let mut inner = this.ctx.line(&format!("defer {cleanup}"));
            inner.push_str(&this.stmts(&body.stmts)?);
            Ok(inner)
        })?);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    fn print(&mut self, level: PrintLevel, args: &[Expr]) -> Result<String> {
        let mut pieces = Vec::with_capacity(args.len());
        let mut values = Vec::new();
        for arg in args {
            match arg {
                Expr::Literal {
                    value: Literal::Text(text),
                    ..
                } if level != PrintLevel::Debug => pieces.push(escape_braces(text)),
                _ => {
                    let spec = if level == PrintLevel::Debug { "any" } else { specifier(arg) };
                    pieces.push(format!("{{{spec}}}"));
                    values.push(self.expr(arg)?);
                }
            }
        }
        let template = quote(&format!("{}\n", pieces.join(" ")));
        let tuple = if values.is_empty() {
            ".{}".to_string()
        } else {
            format!(".{{ {} }}", values.join(", "))
        };
        let text = match level {
            PrintLevel::Log => {
                self.ctx.require(Features::CONSOLE);
                format!("std.io.getStdOut().writer().print({template}, {tuple}) catch {{}};")
            }
            PrintLevel::Debug | PrintLevel::Warn => format!("std.debug.print({template}, {tuple});"),
        };
        Ok(self.ctx.line(&text))
    }

    fn scope(&mut self, scope: &ScopeStmt) -> Result<String> {
        match &scope.resource {
            Resource::Allocator { kind } => self.allocator_scope(*kind, scope),
            Resource::Value { init, release } => {
                let init = self.expr(init)?;
                let binding = scope
                    .binding
                    .as_deref()
                    .map(|name| sanitize_identifier(name, Target::Zig))
                    .unwrap_or_else(|| "resource".to_string());
                let release = release.as_deref().unwrap_or("close");
                let mut out = self.ctx.line("{");
                out.push_str(&self.indented(|this| {
                    let mut inner = this.ctx.line(&format!("const {binding} = {init};"));
                    inner.push_str(&this.ctx.line(&format!("defer {binding}.{release}();")));
                    inner.push_str(&this.stmts(&scope.body.stmts)?);
                    Ok(inner)
                })?);
                out.push_str(&self.ctx.line("}"));
                Ok(out)
            }
        }
    }

    /// Growing calls inside the block take the scope's allocator
    fn allocator_scope(&mut self, kind: AllocatorKind, scope: &ScopeStmt) -> Result<String> {
        let name = scope
            .binding
            .as_deref()
            .map(|name| sanitize_identifier(name, Target::Zig))
            .unwrap_or_else(|| match self.ctx.allocator_depth() {
                0 => "alloc".to_string(),
                depth => format!("alloc{depth}"),
            });
        let arena = match self.ctx.allocator_depth() {
            0 => "arena".to_string(),
            depth => format!("arena{depth}"),
        };

        let mut out = self.ctx.line("{");
        out.push_str(&self.indented(|this| {
            let mut inner = match kind {
                AllocatorKind::Arena => {
                    let mut setup = this.ctx.line(&format!(
                        "var {arena} = std.heap.ArenaAllocator.init(std.heap.page_allocator);"
                    ));
                    setup.push_str(&this.ctx.line(&format!("defer {arena}.deinit();")));
                    setup.push_str(&this.ctx.line(&format!("const {name} = {arena}.allocator();")));
                    setup
                }
                AllocatorKind::Page => this.ctx.line(&format!("const {name} = std.heap.page_allocator;")),
            };
            let (body, used) = this.with_allocator(&name, |inner| inner.stmts(&scope.body.stmts))?;
            inner.push_str(&body);
            if !used {
                inner.push_str(&this.ctx.line(&format!("_ = {name};")));
            }
            Ok(inner)
        })?);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::super::ZigBackend;
    use crate::backend::{CodegenBackend, CodegenOptions};
    use crate::CodegenError;
    use faber_ast::{AllocatorKind, AstBuilder, BinaryOp, Stmt, StructureKind, Unit};

    fn generate(body: Vec<Stmt>) -> crate::Result<String> {
        let options = CodegenOptions {
            emit_preamble: false,
            ..CodegenOptions::default()
        };
        ZigBackend::new()?.generate_unit(&Unit::new("probatio", body), &options)
    }

    fn emit(body: Vec<Stmt>) -> String {
        generate(body).unwrap()
    }

    #[test]
    fn test_match_binds_payload_fields() {
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
            "    switch (forma) {\n        \
             .Circulus => |__v| {\n            \
             const radius = __v.radius;\n            \
             std.io.getStdOut().writer().print(\"{any}\\n\", .{ radius }) catch {};\n        \
             },\n        \
             .Vacuum => {},\n    \
             }\n"
        ));
        assert!(!code.contains("else => {},"));
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
        assert!(code.contains("const y = __v.y;\n            const x = __v.x;\n"), "{code}");
    }

    #[test]
    fn test_match_rejects_unknown_field() {
        let b = AstBuilder::new();
        let err = generate(vec![
            b.union("Punctum", vec![("Planum", vec![("x", b.ty("numerus"))])]),
            b.discerne(
                b.ident("p"),
                Some("Punctum"),
                vec![b.arm("Planum", &["z"], vec![])],
            ),
        ])
        .unwrap_err();
        assert!(err.is_translation_failure());
        assert!(err.to_string().contains("`z`"), "{err}");
    }

    #[test]
    fn test_do_while_checks_after_body() {
        let b = AstBuilder::new();
        let body = vec![b.expr_stmt(b.assign(b.ident("i"), b.binary(BinaryOp::Add, b.ident("i"), b.int(1))))];
        let code = emit(vec![Stmt::DoWhile {
            body: b.block(body),
            cond: b.binary(BinaryOp::Lt, b.ident("i"), b.int(3)),
            span: b.span(),
        }]);
        assert!(code.contains("    while (true) {\n        i = i + 1;\n        if (!(i < 3)) break;\n    }\n"));
    }

    #[test]
    fn test_range_loop_counts_up() {
        let b = AstBuilder::new();
        let code = emit(vec![b.for_each(
            "i",
            b.range(b.int(0), b.int(3), false),
            vec![b.scribe(vec![b.ident("i")])],
        )]);
        assert!(code.contains("var i: i64 = 0;\n        while (i < 3) : (i += 1) {\n"));
    }

    #[test]
    fn test_nested_arenas_get_distinct_names() {
        let b = AstBuilder::new();
        let inner = b.allocator_scope(
            AllocatorKind::Arena,
            Some("inner"),
            vec![b.expr_stmt(b.method(b.ident("xs"), "adde", vec![b.int(1)], StructureKind::Sequence))],
        );
        let code = emit(vec![b.allocator_scope(AllocatorKind::Arena, Some("outer"), vec![inner])]);
        assert!(code.contains("var arena1 = std.heap.ArenaAllocator.init(std.heap.page_allocator);"));
        assert!(code.contains("xs.append(inner, 1) catch @panic(\"OOM\");"));
        assert!(code.contains("_ = outer;"));
        assert!(!code.contains("_ = inner;"));
    }

    #[test]
    fn test_nested_anonymous_scopes_get_distinct_allocators() {
        let b = AstBuilder::new();
        let inner = b.allocator_scope(
            AllocatorKind::Page,
            None,
            vec![b.expr_stmt(b.method(b.ident("xs"), "adde", vec![b.int(1)], StructureKind::Sequence))],
        );
        let code = emit(vec![b.allocator_scope(AllocatorKind::Arena, None, vec![inner])]);
        assert!(code.contains("const alloc = arena.allocator();"), "{code}");
        assert!(code.contains("const alloc1 = std.heap.page_allocator;"), "{code}");
        assert!(code.contains("xs.append(alloc1, 1) catch @panic(\"OOM\");"), "{code}");
        assert!(code.contains("_ = alloc;"), "{code}");
    }

    #[test]
    fn test_value_result_is_discarded() {
        let b = AstBuilder::new();
        let code = emit(vec![b.expr_stmt(b.method(b.ident("xs"), "remove", vec![], StructureKind::Sequence))]);
        assert!(code.contains("    _ = xs.pop();\n"));
    }

    #[test]
    fn test_catch_is_unsupported() {
        let b = AstBuilder::new();
        let result = generate(vec![Stmt::Try {
            body: b.block(vec![]),
            catch: Some(faber_ast::CatchClause {
                binding: "e".into(),
                body: b.block(vec![]),
            }),
            finally: None,
            span: b.span(),
        }]);
        assert!(matches!(result, Err(CodegenError::Unsupported { .. })));
    }

    #[test]
    fn test_resource_scope_defers_release() {
        let b = AstBuilder::new();
        let code = emit(vec![b.resource_scope(
            b.call(b.ident("aperi"), vec![b.text("data.txt")]),
            "fh",
            vec![],
        )]);
        assert!(code.contains("    {\n        const fh = aperi(\"data.txt\");\n        defer fh.close();\n    }\n"));
    }
}
